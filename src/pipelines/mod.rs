//! Render pipelines and the bind group layouts they share.
//!
//! Every pipeline renders into the same (possibly multisampled) colour target
//! and depth buffer, so they are all built from [`mk_render_pipeline`] with a
//! common sample count. Bind group slots:
//!
//! | pipeline   | 0        | 1           | 2     | 3           |
//! |------------|----------|-------------|-------|-------------|
//! | mesh       | material | camera      | light | environment |
//! | background | camera   | environment |       |             |
//! | lines      | camera   |             |       |             |

pub mod background;
pub mod light;
pub mod lines;
pub mod mesh;

use crate::data_structures::texture::Texture;

/// Rasterisation settings that differ between the pipelines.
#[derive(Clone, Copy, Debug)]
pub struct RasterState {
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub sample_count: u32,
}

impl RasterState {
    pub fn triangles(sample_count: u32) -> Self {
        Self {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            sample_count,
        }
    }

    /// Triangles with both faces visible.
    pub fn double_sided(sample_count: u32) -> Self {
        Self {
            cull_mode: None,
            ..Self::triangles(sample_count)
        }
    }
}

/// All pipelines used by the renderer.
#[derive(Debug)]
pub struct Pipelines {
    pub mesh: wgpu::RenderPipeline,
    pub mesh_double_sided: wgpu::RenderPipeline,
    pub lines: wgpu::RenderPipeline,
    pub background: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        layouts: &Layouts,
    ) -> Self {
        log::info!("Pipelines ({}x MSAA)", sample_count);
        Self {
            mesh: mesh::mk_mesh_pipeline(device, color_format, layouts, RasterState::triangles(sample_count)),
            mesh_double_sided: mesh::mk_mesh_pipeline(
                device,
                color_format,
                layouts,
                RasterState::double_sided(sample_count),
            ),
            lines: lines::mk_lines_pipeline(device, color_format, sample_count, &layouts.camera),
            background: background::mk_background_pipeline(device, color_format, sample_count, layouts),
        }
    }
}

impl Pipelines {
    pub fn mesh_for(&self, double_sided: bool) -> &wgpu::RenderPipeline {
        if double_sided { &self.mesh_double_sided } else { &self.mesh }
    }
}

/// Borrowed bind group layouts, in the order the table above lists them.
pub struct Layouts<'a> {
    pub material: &'a wgpu::BindGroupLayout,
    pub camera: &'a wgpu::BindGroupLayout,
    pub light: &'a wgpu::BindGroupLayout,
    pub environment: &'a wgpu::BindGroupLayout,
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
    raster: RasterState,
) -> wgpu::RenderPipeline {
    let label = shader.label.map(|l| format!("{} Pipeline", l));
    let shader = device.create_shader_module(shader);

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: label.as_deref(),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: raster.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: raster.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: raster.depth_write,
            depth_compare: raster.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: raster.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

pub(crate) const REPLACE: Option<wgpu::BlendState> = Some(wgpu::BlendState {
    alpha: wgpu::BlendComponent::REPLACE,
    color: wgpu::BlendComponent::REPLACE,
});

pub(crate) const DEPTH: Option<wgpu::TextureFormat> = Some(Texture::DEPTH_FORMAT);
