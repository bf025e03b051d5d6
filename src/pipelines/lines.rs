use crate::{
    data_structures::model::{LineVertex, Vertex},
    pipelines::{DEPTH, REPLACE, RasterState, mk_render_pipeline},
};

/// Unlit coloured line segments, used by the axes helper.
pub fn mk_lines_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    camera_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lines Pipeline Layout"),
        bind_group_layouts: &[camera_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Lines Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("lines.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        color_format,
        REPLACE,
        DEPTH,
        &[LineVertex::desc()],
        shader,
        RasterState {
            topology: wgpu::PrimitiveTopology::LineList,
            cull_mode: None,
            ..RasterState::triangles(sample_count)
        },
    )
}
