//! Decoded model data, before anything touches the GPU.
//!
//! A [`ModelFragment`] is what the glTF loader produces: a small node tree with
//! local transforms, triangle meshes and materials. Keeping it CPU-only lets
//! the loader run on any thread and be tested without a device; the renderer
//! turns it into a [`GpuModel`](crate::data_structures::model::GpuModel) in the
//! precompile step.

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix};
use image::RgbaImage;

use crate::data_structures::geometry::GeometryData;

#[derive(Clone, Debug)]
pub struct ModelFragment {
    pub name: String,
    pub roots: Vec<FragmentNode>,
}

#[derive(Clone, Debug)]
pub struct FragmentNode {
    pub name: Option<String>,
    /// Transform relative to the parent node.
    pub local: Matrix4<f32>,
    pub meshes: Vec<MeshData>,
    pub children: Vec<FragmentNode>,
}

impl FragmentNode {
    pub fn empty() -> Self {
        Self {
            name: None,
            local: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshData {
    pub geometry: GeometryData,
    pub material: MaterialData,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    /// Linear RGBA.
    pub base_colour: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// sRGB-encoded texels, shared between primitives that use the same image.
    pub base_colour_texture: Option<Arc<RgbaImage>>,
    /// Back faces are drawn too.
    pub double_sided: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_colour: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            base_colour_texture: None,
            double_sided: false,
        }
    }
}

impl ModelFragment {
    /// Every mesh in the tree with its accumulated world-from-model matrix.
    pub fn flatten(&self) -> Vec<(Matrix4<f32>, &MeshData)> {
        let mut out = Vec::new();
        for root in &self.roots {
            collect(root, Matrix4::identity(), &mut out);
        }
        out
    }

    pub fn mesh_count(&self) -> usize {
        self.flatten().len()
    }

    pub fn triangle_count(&self) -> usize {
        self.flatten()
            .iter()
            .map(|(_, mesh)| mesh.geometry.triangle_count())
            .sum()
    }
}

fn collect<'a>(node: &'a FragmentNode, parent: Matrix4<f32>, out: &mut Vec<(Matrix4<f32>, &'a MeshData)>) {
    let world = parent * node.local;
    for mesh in &node.meshes {
        out.push((world, mesh));
    }
    for child in &node.children {
        collect(child, world, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector3, Vector4};

    fn mesh() -> MeshData {
        MeshData {
            geometry: crate::data_structures::geometry::box_geometry(1.0, 1.0, 1.0),
            material: MaterialData::default(),
        }
    }

    #[test]
    fn flatten_composes_parent_transforms() {
        let mut child = FragmentNode::empty();
        child.local = Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0));
        child.meshes.push(mesh());
        let mut root = FragmentNode::empty();
        root.local = Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0));
        root.meshes.push(mesh());
        root.children.push(child);
        let fragment = ModelFragment {
            name: "pair".into(),
            roots: vec![root],
        };

        let flat = fragment.flatten();
        assert_eq!(flat.len(), 2);
        let child_origin = flat[1].0 * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(child_origin, Vector4::new(2.0, 1.0, 0.0, 1.0));
        assert_eq!(fragment.triangle_count(), 24);
    }
}
