//! Equirectangular backdrop and the environment bind group it shares with
//! the mesh pipeline.
//!
//! The panorama is uploaded as `Rgba32Float`, which is not filterable on
//! every adapter, so both shaders read it with `textureLoad` and no sampler.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    pipelines::{DEPTH, Layouts, REPLACE, RasterState, mk_render_pipeline},
    resources::EnvironmentMap,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EnvironmentUniform {
    size: [f32; 2],
    enabled: f32,
    intensity: f32,
}

impl EnvironmentUniform {
    pub fn disabled() -> Self {
        Self {
            size: [1.0, 1.0],
            enabled: 0.0,
            intensity: 0.0,
        }
    }

    pub fn for_map(map: &EnvironmentMap) -> Self {
        Self {
            size: [map.width as f32, map.height as f32],
            enabled: 1.0,
            intensity: 1.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled > 0.5
    }
}

pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("environment_bind_group_layout"),
    })
}

/// A panorama on the GPU, ready to bind at the environment slot.
#[derive(Debug)]
pub struct EnvironmentBinding {
    pub texture: Texture,
    pub uniform: EnvironmentUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl EnvironmentBinding {
    /// Upload `map`, or a black placeholder with lighting disabled when `None`.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        map: Option<&EnvironmentMap>,
    ) -> Self {
        let (texture, uniform) = match map {
            Some(map) => (
                Texture::from_environment(device, queue, map),
                EnvironmentUniform::for_map(map),
            ),
            None => (
                Texture::placeholder_environment(device, queue),
                EnvironmentUniform::disabled(),
            ),
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some("environment_bind_group"),
        });
        Self {
            texture,
            uniform,
            buffer,
            bind_group,
        }
    }
}

/// Fullscreen triangle behind everything; never writes depth.
pub fn mk_background_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    layouts: &Layouts,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Background Pipeline Layout"),
        bind_group_layouts: &[layouts.camera, layouts.environment],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Background Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("background.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        color_format,
        REPLACE,
        DEPTH,
        &[],
        shader,
        RasterState {
            cull_mode: None,
            depth_write: false,
            depth_compare: wgpu::CompareFunction::Always,
            ..RasterState::triangles(sample_count)
        },
    )
}
