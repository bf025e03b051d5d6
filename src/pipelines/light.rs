use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::data_structures::scene_graph::{NodeKind, Scene};

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Unit vector pointing from the surface towards the light.
    pub direction: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
    /// Colour premultiplied by intensity.
    pub colour: [f32; 3],
    _padding2: u32,
    pub ambient: [f32; 3],
    _padding3: u32,
}

impl LightUniform {
    pub fn new(direction: [f32; 3], colour: [f32; 3], ambient: [f32; 3]) -> Self {
        Self {
            direction,
            _padding: 0,
            colour,
            _padding2: 0,
            ambient,
            _padding3: 0,
        }
    }

    /// Collect the first directional and ambient light of `scene`.
    ///
    /// A missing light contributes black.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut uniform = Self::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 3]);
        if let Some(node) = scene.directional_light() {
            if let NodeKind::DirectionalLight {
                colour,
                intensity,
                target,
            } = &node.kind
            {
                let from = Point3::from_vec(node.transform.position);
                let towards_light: Vector3<f32> = from - *target;
                if towards_light.magnitude2() > f32::EPSILON {
                    uniform.direction = towards_light.normalize().into();
                }
                uniform.colour = colour.map(|c| c * intensity);
            }
        }
        if let Some(node) = scene.ambient_light() {
            if let NodeKind::AmbientLight { colour, intensity } = &node.kind {
                uniform.ambient = colour.map(|c| c * intensity);
            }
        }
        uniform
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

impl LightResources {
    pub fn new(device: &wgpu::Device, uniform: LightUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("light_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Upload `uniform` if it differs from what the GPU already has.
    pub fn write(&mut self, queue: &wgpu::Queue, uniform: LightUniform) {
        if uniform != self.uniform {
            self.uniform = uniform;
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }
}
