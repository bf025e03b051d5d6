//! Node transforms and their GPU representation.
//!
//! Scene nodes carry an [`Instance`] (position, Euler rotation, scale). The
//! renderer flattens it, together with any parent transform, into an
//! [`InstanceRaw`] that is bound as a per-instance vertex buffer.

use std::f32::consts::TAU;

use cgmath::{Matrix, Matrix3, Matrix4, Rad, SquareMatrix, Vector3};

use crate::data_structures::model;

/// Position, rotation and scale of a scene node.
///
/// `rotation` holds Euler angles in radians, applied in X, then Y, then Z
/// order (the matrix is `Rx * Ry * Rz`). Each component stays in `[0, 2π)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Instance {
    /// Identity transform.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(position: impl Into<Vector3<f32>>) -> Self {
        Self {
            position: position.into(),
            ..Self::new()
        }
    }

    /// Add `delta` to the x and y rotation angles.
    ///
    /// The result is wrapped into `[0, 2π)`; below 2π this is bit-identical
    /// to plain accumulation.
    pub fn spin(&mut self, delta: f32) {
        self.rotation.x = wrap_angle(self.rotation.x + delta);
        self.rotation.y = wrap_angle(self.rotation.y + delta);
    }

    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        Matrix3::from_angle_x(Rad(self.rotation.x))
            * Matrix3::from_angle_y(Rad(self.rotation.y))
            * Matrix3::from_angle_z(Rad(self.rotation.z))
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation_matrix())
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn to_raw(&self) -> InstanceRaw {
        InstanceRaw::from_matrix(self.to_matrix())
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Instance {
    fn from(position: Vector3<f32>) -> Self {
        Self::at(position)
    }
}

fn wrap_angle(angle: f32) -> f32 {
    if angle < TAU && angle >= 0.0 {
        angle
    } else {
        angle.rem_euclid(TAU)
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl InstanceRaw {
    /// World matrix plus the inverse-transpose normal matrix derived from it.
    pub fn from_matrix(world: Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(
            world.x.truncate(),
            world.y.truncate(),
            world.z.truncate(),
        );
        let normal = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear);
        Self {
            model: world.into(),
            normal: normal.into(),
        }
    }
}

/**
 * Four vec4 columns for the world matrix (locations 5-8) followed by three
 * vec3 columns for the normal matrix (locations 9-11). The step mode is
 * per-instance so one buffer entry covers a whole draw.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
