//! CPU-side primitive tessellation.
//!
//! Every generator returns a [`GeometryData`] with one normal and one texture
//! coordinate per position and counter-clockwise triangles seen from outside,
//! which is what the mesh pipeline culls against.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Vector3};

/// Indexed triangle soup ready to be turned into vertex/index buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_vertex(&mut self, position: Vector3<f32>, normal: Vector3<f32>, uv: [f32; 2]) {
        self.positions.push(position.into());
        self.normals.push(normal.into());
        self.tex_coords.push(uv);
    }

    /// Replace the normals by area-weighted face normals.
    ///
    /// Used for glTF primitives that ship without a `NORMAL` attribute.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vector3::new(0.0f32, 0.0, 0.0); self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if a >= acc.len() || b >= acc.len() || c >= acc.len() {
                continue;
            }
            let pa: Vector3<f32> = self.positions[a].into();
            let pb: Vector3<f32> = self.positions[b].into();
            let pc: Vector3<f32> = self.positions[c].into();
            let face = (pb - pa).cross(pc - pa);
            acc[a] += face;
            acc[b] += face;
            acc[c] += face;
        }
        self.normals = acc
            .into_iter()
            .map(|n| {
                if n.magnitude2() > f32::EPSILON {
                    n.normalize().into()
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
    }
}

/// Parametric description of the three demo primitives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    TorusKnot {
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
    },
}

impl Shape {
    pub fn tessellate(&self) -> GeometryData {
        match *self {
            Shape::Box {
                width,
                height,
                depth,
            } => box_geometry(width, height, depth),
            Shape::TorusKnot {
                radius,
                tube,
                tubular_segments,
                radial_segments,
                p,
                q,
            } => torus_knot(radius, tube, tubular_segments, radial_segments, p, q),
            Shape::Cylinder {
                radius_top,
                radius_bottom,
                height,
                radial_segments,
            } => cylinder(radius_top, radius_bottom, height, radial_segments),
        }
    }
}

/// Axis-aligned box centred at the origin, four vertices per face.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> GeometryData {
    let half = Vector3::new(width * 0.5, height * 0.5, depth * 0.5);
    // (normal, u, v) with u x v == normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [
        (-1.0, -1.0, [0.0, 1.0]),
        (1.0, -1.0, [1.0, 1.0]),
        (1.0, 1.0, [1.0, 0.0]),
        (-1.0, 1.0, [0.0, 0.0]),
    ];

    let mut data = GeometryData::default();
    for (normal, u, v) in faces {
        let normal: Vector3<f32> = normal.into();
        let u: Vector3<f32> = u.into();
        let v: Vector3<f32> = v.into();
        let base = data.positions.len() as u32;
        for (su, sv, uv) in corners {
            let unit = normal + u * su + v * sv;
            let position = Vector3::new(unit.x * half.x, unit.y * half.y, unit.z * half.z);
            data.push_vertex(position, normal, uv);
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    data
}

fn knot_curve(u: f32, p: f32, q: f32, radius: f32) -> Vector3<f32> {
    let qu_over_p = q / p * u;
    let cs = qu_over_p.cos();
    Vector3::new(
        radius * (2.0 + cs) * 0.5 * u.cos(),
        radius * (2.0 + cs) * u.sin() * 0.5,
        radius * qu_over_p.sin() * 0.5,
    )
}

/// A (p, q) torus knot: a tube of radius `tube` swept along a knot curve.
pub fn torus_knot(
    radius: f32,
    tube: f32,
    tubular_segments: u32,
    radial_segments: u32,
    p: u32,
    q: u32,
) -> GeometryData {
    let tubular_segments = tubular_segments.max(3);
    let radial_segments = radial_segments.max(3);
    let (pf, qf) = (p.max(1) as f32, q as f32);
    let mut data = GeometryData::default();

    for i in 0..=tubular_segments {
        let u = i as f32 / tubular_segments as f32 * pf * TAU;
        let p1 = knot_curve(u, pf, qf, radius);
        let p2 = knot_curve(u + 0.01, pf, qf, radius);

        // Frenet-like frame along the curve
        let t = p2 - p1;
        let n = p2 + p1;
        let b = t.cross(n);
        let n = b.cross(t).normalize();
        let b = b.normalize();

        for j in 0..=radial_segments {
            let v = j as f32 / radial_segments as f32 * TAU;
            let cx = -tube * v.cos();
            let cy = tube * v.sin();
            let position = p1 + n * cx + b * cy;
            let normal = (position - p1).normalize();
            data.push_vertex(
                position,
                normal,
                [
                    i as f32 / tubular_segments as f32,
                    j as f32 / radial_segments as f32,
                ],
            );
        }
    }

    let stride = radial_segments + 1;
    for j in 1..=tubular_segments {
        for i in 1..=radial_segments {
            let a = stride * (j - 1) + (i - 1);
            let b = stride * j + (i - 1);
            let c = stride * j + i;
            let d = stride * (j - 1) + i;
            data.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    data
}

/// A Y-up cylinder (or truncated cone) centred at the origin, with both caps.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> GeometryData {
    let radial_segments = radial_segments.max(3);
    let half_height = height * 0.5;
    let slope = if height.abs() > f32::EPSILON {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };
    let mut data = GeometryData::default();

    // torso: two rings, top (row 0) and bottom (row 1)
    for row in 0..=1u32 {
        let v = row as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let theta = u * TAU;
            let (sin, cos) = theta.sin_cos();
            data.push_vertex(
                Vector3::new(radius * sin, -v * height + half_height, radius * cos),
                Vector3::new(sin, slope, cos).normalize(),
                [u, 1.0 - v],
            );
        }
    }
    let stride = radial_segments + 1;
    for x in 0..radial_segments {
        let a = x;
        let b = stride + x;
        let c = stride + x + 1;
        let d = x + 1;
        data.indices.extend_from_slice(&[a, b, d, b, c, d]);
    }

    push_cap(&mut data, radius_top, half_height, radial_segments, true);
    push_cap(&mut data, radius_bottom, half_height, radial_segments, false);
    data
}

fn push_cap(data: &mut GeometryData, radius: f32, half_height: f32, radial_segments: u32, top: bool) {
    let sign = if top { 1.0 } else { -1.0 };
    let normal = Vector3::new(0.0, sign, 0.0);
    let y = half_height * sign;

    // one centre vertex per segment keeps the cap UVs seam-free
    let centre_start = data.positions.len() as u32;
    for _ in 0..radial_segments {
        data.push_vertex(Vector3::new(0.0, y, 0.0), normal, [0.5, 0.5]);
    }
    let ring_start = data.positions.len() as u32;
    for x in 0..=radial_segments {
        let theta = x as f32 / radial_segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        data.push_vertex(
            Vector3::new(radius * sin, y, radius * cos),
            normal,
            [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
        );
    }
    for x in 0..radial_segments {
        let c = centre_start + x;
        let i = ring_start + x;
        if top {
            data.indices.extend_from_slice(&[i, i + 1, c]);
        } else {
            data.indices.extend_from_slice(&[i + 1, i, c]);
        }
    }
}

/// Line segments for an axes helper: x red, y green, z blue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineData {
    pub positions: Vec<[f32; 3]>,
    pub colours: Vec<[f32; 3]>,
}

pub fn axes(size: f32) -> LineData {
    let axes = [
        ([size, 0.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, size, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, size], [0.0, 0.0, 1.0]),
    ];
    let mut lines = LineData::default();
    for (end, colour) in axes {
        lines.positions.push([0.0, 0.0, 0.0]);
        lines.positions.push(end);
        lines.colours.push(colour);
        lines.colours.push(colour);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(data: &GeometryData, tri: &[u32]) -> Vector3<f32> {
        let p = |i: u32| -> Vector3<f32> { data.positions[i as usize].into() };
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    #[test]
    fn box_has_outward_ccw_faces() {
        let data = box_geometry(0.5, 0.5, 0.5);
        assert_eq!(data.vertex_count(), 24);
        assert_eq!(data.indices.len(), 36);
        for tri in data.indices.chunks_exact(3) {
            let n: Vector3<f32> = data.normals[tri[0] as usize].into();
            assert!(face_normal(&data, tri).dot(n) > 0.0);
        }
        for p in &data.positions {
            assert!(p.iter().all(|c| (c.abs() - 0.25).abs() < 1e-6));
        }
    }

    #[test]
    fn torus_knot_counts() {
        let data = torus_knot(0.3, 0.1, 100, 16, 2, 3);
        assert_eq!(data.vertex_count(), 101 * 17);
        assert_eq!(data.indices.len(), 100 * 16 * 6);
        assert_eq!(data.normals.len(), data.positions.len());
        let max_index = *data.indices.iter().max().unwrap();
        assert!((max_index as usize) < data.vertex_count());
    }

    #[test]
    fn cylinder_counts_and_caps() {
        let data = cylinder(0.3, 0.3, 1.5, 32);
        // torso 2 rings of 33, two caps of 32 centres + 33 ring vertices
        assert_eq!(data.vertex_count(), 66 + 2 * 65);
        assert_eq!(data.indices.len(), 32 * 6 + 2 * 32 * 3);
        let top = &data.indices[32 * 6..32 * 6 + 3];
        assert!(face_normal(&data, top).y > 0.0);
        let bottom = &data.indices[32 * 9..32 * 9 + 3];
        assert!(face_normal(&data, bottom).y < 0.0);
        assert!(data.positions.iter().all(|p| p[1].abs() <= 0.75 + 1e-6));
    }

    #[test]
    fn computed_normals_follow_winding() {
        let mut data = GeometryData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Vec::new(),
            tex_coords: vec![[0.0; 2]; 3],
            indices: vec![0, 1, 2],
        };
        data.compute_normals();
        assert_eq!(data.normals, vec![[0.0, 0.0, 1.0]; 3]);
    }

    #[test]
    fn axes_are_three_coloured_segments() {
        let lines = axes(5.0);
        assert_eq!(lines.positions.len(), 6);
        assert_eq!(lines.positions[3], [0.0, 5.0, 0.0]);
        assert_eq!(lines.colours[4], [0.0, 0.0, 1.0]);
    }
}
