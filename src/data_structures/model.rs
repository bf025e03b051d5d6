//! GPU-resident meshes, materials and models.
//!
//! Everything here owns wgpu buffers. CPU data comes from
//! [`geometry`](crate::data_structures::geometry) (primitives) and
//! [`fragment`](crate::data_structures::fragment) (glTF).

use std::{collections::HashMap, sync::Arc};

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        fragment::{MaterialData, ModelFragment},
        geometry::{GeometryData, LineData},
        instance::InstanceRaw,
        scene_graph::PhongMaterial,
        texture::Texture,
    },
    pipelines::Pipelines,
};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Interleave a [`GeometryData`] into vertices. Missing attributes become zero.
pub fn interleave(geometry: &GeometryData) -> Vec<ModelVertex> {
    geometry
        .positions
        .iter()
        .enumerate()
        .map(|(i, position)| ModelVertex {
            position: *position,
            tex_coords: geometry.tex_coords.get(i).copied().unwrap_or_default(),
            normal: geometry.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
        })
        .collect()
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub colour: [f32; 3],
}

impl LineVertex {
    pub fn from_lines(lines: &LineData) -> Vec<LineVertex> {
        lines
            .positions
            .iter()
            .zip(&lines.colours)
            .map(|(position, colour)| LineVertex {
                position: *position,
                colour: *colour,
            })
            .collect()
    }
}

impl Vertex for LineVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Mesh {
    pub fn from_geometry(device: &wgpu::Device, name: &str, geometry: &GeometryData) -> Self {
        let vertices = interleave(geometry);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: geometry.indices.len() as u32,
        }
    }
}

/// `params`: x metallic, y roughness, z 1.0 for environment-lit materials.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_colour: [f32; 4],
    // rgb specular colour, w shininess
    specular: [f32; 4],
    params: [f32; 4],
}

impl MaterialUniform {
    pub fn phong(material: &PhongMaterial) -> Self {
        let [r, g, b] = material.colour;
        let [sr, sg, sb] = material.specular;
        Self {
            base_colour: [r, g, b, 1.0],
            specular: [sr, sg, sb, material.shininess],
            params: [0.0, 1.0, 0.0, 0.0],
        }
    }

    pub fn standard(material: &MaterialData) -> Self {
        Self {
            base_colour: material.base_colour,
            specular: [0.0, 0.0, 0.0, 1.0],
            params: [material.metallic, material.roughness, 1.0, 0.0],
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        uniform: MaterialUniform,
        texture: &Texture,
        layout: &wgpu::BindGroupLayout,
    ) -> anyhow::Result<Self> {
        let Some(sampler) = texture.sampler.as_ref() else {
            anyhow::bail!("material {} needs a sampled texture", name);
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} material", name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some(name),
        });
        Ok(Self {
            name: name.to_string(),
            buffer,
            bind_group,
        })
    }
}

/// One drawable piece: a mesh, its material and a single-entry instance buffer.
#[derive(Debug)]
pub struct GpuPart {
    pub mesh: Mesh,
    pub material: Material,
    /// Transform relative to the owning scene node.
    pub local: Matrix4<f32>,
    pub instance_buffer: wgpu::Buffer,
    pub double_sided: bool,
}

impl GpuPart {
    pub fn new(device: &wgpu::Device, mesh: Mesh, material: Material, local: Matrix4<f32>) -> Self {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Instance Buffer", mesh.name)),
            contents: bytemuck::cast_slice(&[InstanceRaw::from_matrix(local)]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            mesh,
            material,
            local,
            instance_buffer,
            double_sided: false,
        }
    }

    pub fn write_transform(&self, queue: &wgpu::Queue, node: Matrix4<f32>) {
        let raw = InstanceRaw::from_matrix(node * self.local);
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&[raw]));
    }
}

#[derive(Debug)]
pub struct GpuModel {
    pub name: String,
    pub parts: Vec<GpuPart>,
}

impl GpuModel {
    /// Upload every mesh, material and texture of `fragment`.
    ///
    /// Images shared between materials are uploaded once.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        white: &Texture,
        fragment: &ModelFragment,
    ) -> anyhow::Result<Self> {
        let mut textures: HashMap<*const image::RgbaImage, Texture> = HashMap::new();
        let mut parts = Vec::new();
        for (idx, (local, mesh)) in fragment.flatten().into_iter().enumerate() {
            let name = format!("{}#{}", fragment.name, idx);
            let texture = match &mesh.material.base_colour_texture {
                Some(img) => textures
                    .entry(Arc::as_ptr(img))
                    .or_insert_with(|| Texture::from_rgba(device, queue, img, Some(name.as_str()), true))
                    .clone(),
                None => white.clone(),
            };
            let material = Material::new(
                device,
                &name,
                MaterialUniform::standard(&mesh.material),
                &texture,
                layout,
            )?;
            let gpu_mesh = Mesh::from_geometry(device, &name, &mesh.geometry);
            let mut part = GpuPart::new(device, gpu_mesh, material, local);
            part.double_sided = mesh.material.double_sided;
            parts.push(part);
        }
        Ok(Self {
            name: fragment.name.clone(),
            parts,
        })
    }

    pub fn write_transform(&self, queue: &wgpu::Queue, node: Matrix4<f32>) {
        for part in &self.parts {
            part.write_transform(queue, node);
        }
    }
}

/// A scene primitive uploaded as a one-part model.
pub fn upload_primitive(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    white: &Texture,
    name: &str,
    geometry: &GeometryData,
    material: &PhongMaterial,
) -> anyhow::Result<GpuPart> {
    let mesh = Mesh::from_geometry(device, name, geometry);
    let material = Material::new(device, name, MaterialUniform::phong(material), white, layout)?;
    Ok(GpuPart::new(device, mesh, material, Matrix4::identity()))
}

pub trait DrawModel<'a> {
    fn draw_part(&mut self, part: &'a GpuPart);
    /// Draw every part, switching to the no-cull mesh pipeline for double-sided parts.
    fn draw_model(&mut self, model: &'a GpuModel, pipelines: &'a Pipelines);
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_part(&mut self, part: &'b GpuPart) {
        self.set_vertex_buffer(0, part.mesh.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, part.instance_buffer.slice(..));
        self.set_index_buffer(part.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &part.material.bind_group, &[]);
        self.draw_indexed(0..part.mesh.num_elements, 0, 0..1);
    }

    fn draw_model(&mut self, model: &'b GpuModel, pipelines: &'b Pipelines) {
        for part in &model.parts {
            self.set_pipeline(pipelines.mesh_for(part.double_sided));
            self.draw_part(part);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::geometry::{axes, box_geometry};

    #[test]
    fn interleave_keeps_vertex_order() {
        let geometry = box_geometry(1.0, 2.0, 3.0);
        let vertices = interleave(&geometry);
        assert_eq!(vertices.len(), 24);
        assert_eq!(vertices[5].position, geometry.positions[5]);
        assert_eq!(vertices[5].normal, geometry.normals[5]);
        assert_eq!(std::mem::size_of::<ModelVertex>(), 32);
    }

    #[test]
    fn line_vertices_pair_colours() {
        let vertices = LineVertex::from_lines(&axes(5.0));
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[1].position, [5.0, 0.0, 0.0]);
        assert_eq!(vertices[1].colour, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn standard_materials_opt_into_environment_light() {
        let uniform = MaterialUniform::standard(&MaterialData {
            metallic: 0.25,
            roughness: 0.5,
            ..Default::default()
        });
        assert_eq!(uniform.params, [0.25, 0.5, 1.0, 0.0]);
        let phong = MaterialUniform::phong(&PhongMaterial::new([1.0, 0.0, 1.0]));
        assert_eq!(phong.params[2], 0.0);
        assert_eq!(phong.base_colour, [1.0, 0.0, 1.0, 1.0]);
    }
}
