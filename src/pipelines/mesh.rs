use crate::{
    data_structures::{
        instance::InstanceRaw,
        model::{ModelVertex, Vertex},
    },
    pipelines::{DEPTH, Layouts, REPLACE, RasterState, mk_render_pipeline},
};

/// Lit meshes: the spinning primitives and every loaded model part.
pub fn mk_mesh_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    layouts: &Layouts,
    raster: RasterState,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &[layouts.material, layouts.camera, layouts.light, layouts.environment],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("mesh.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        color_format,
        REPLACE,
        DEPTH,
        &[ModelVertex::desc(), InstanceRaw::desc()],
        shader,
        raster,
    )
}
