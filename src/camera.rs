//! Perspective camera, projection and the matching GPU uniform.
//!
//! The camera is a look-at camera: a position, a target and an up vector. The
//! projection matrix is cached and only recomputed through
//! [`Projection::update_projection_matrix`], so callers that change the aspect
//! ratio must refresh it explicitly (the resize path does).
//!
//! # Key types
//!
//! - [`Camera`] holds the eye, target and projection
//! - [`Projection`] holds fov/aspect/near/far and the cached matrix
//! - [`CameraUniform`] is the `#[repr(C)]` block uploaded to the shaders
//! - [`CameraResources`] owns the uniform buffer and its bind group

use anyhow::ensure;
use cgmath::{Deg, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use wgpu::util::DeviceExt;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub projection: Projection,
}

impl Camera {
    pub fn new(position: impl Into<Point3<f32>>, projection: Projection) -> Self {
        Self {
            position: position.into(),
            target: Point3::origin(),
            up: Vector3::unit_y(),
            projection,
        }
    }

    /// Aim the camera at `target` without moving it.
    pub fn look_at(&mut self, target: impl Into<Point3<f32>>) {
        self.target = target.into();
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection.matrix() * self.view_matrix()
    }

    /// Unit vector from the eye towards the target.
    pub fn forward(&self) -> Vector3<f32> {
        let dir = self.target - self.position;
        if dir.magnitude2() > f32::EPSILON {
            dir.normalize()
        } else {
            -Vector3::unit_z()
        }
    }

    /// Unit vector pointing to the right of the view direction.
    pub fn right(&self) -> Vector3<f32> {
        let right = self.forward().cross(self.up);
        if right.magnitude2() > f32::EPSILON {
            right.normalize()
        } else {
            Vector3::unit_x()
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    matrix: Matrix4<f32>,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
            matrix: Matrix4::identity(),
        };
        projection.update_projection_matrix();
        projection
    }

    /// Set the aspect ratio to `width / height` and refresh the matrix.
    pub fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        ensure!(
            width > 0 && height > 0,
            "cannot project onto a {}x{} viewport",
            width,
            height
        );
        self.aspect = width as f32 / height as f32;
        self.update_projection_matrix();
        Ok(())
    }

    pub fn update_projection_matrix(&mut self) {
        self.matrix = OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar);
    }

    /// The cached matrix as of the last [`update_projection_matrix`](Self::update_projection_matrix).
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    pub fn fovy_degrees(&self) -> f32 {
        Deg::from(self.fovy).0
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    // vec4 for 16 byte alignment
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        let view_proj = camera.view_proj();
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = view_proj.into();
        self.inv_view_proj = view_proj.invert().unwrap_or(Matrix4::identity()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, camera: &Camera) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(camera);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
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
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        self.uniform.update_view_proj(camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn camera() -> Camera {
        let mut camera = Camera::new((2.0, 2.0, 2.0), Projection::new(800, 600, Deg(75.0), 0.1, 1000.0));
        camera.look_at((0.0, 0.0, 0.0));
        camera
    }

    #[test]
    fn origin_projects_to_screen_centre() {
        let clip = camera().view_proj() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(close(ndc.x, 0.0));
        assert!(close(ndc.y, 0.0));
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn aspect_change_needs_explicit_update() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        let before = projection.matrix();
        projection.aspect = 2.0;
        assert_eq!(projection.matrix(), before);
        projection.update_projection_matrix();
        assert_ne!(projection.matrix(), before);
    }

    #[test]
    fn resize_sets_aspect_and_rejects_zero() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        projection.resize(1024, 768).unwrap();
        assert!(close(projection.aspect, 1024.0 / 768.0));
        assert!(projection.resize(0, 768).is_err());
        assert!(close(projection.aspect, 1024.0 / 768.0));
    }

    #[test]
    fn right_is_perpendicular_to_forward() {
        let camera = camera();
        assert!(close(camera.right().dot(camera.forward()), 0.0));
        assert!(close(camera.distance(), 12.0f32.sqrt()));
    }
}
