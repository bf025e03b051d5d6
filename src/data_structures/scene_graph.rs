//! Scene graph: a flat, ordered list of positioned nodes plus the scene-wide
//! background and environment slots.
//!
//! Nodes are never removed, so a [`NodeId`] stays valid for the scene's
//! lifetime. Loaded models keep their own internal hierarchy inside their
//! [`ModelFragment`]; at the scene level every node hangs off the root.

use std::sync::Arc;

use cgmath::Point3;

use crate::{
    data_structures::{
        fragment::ModelFragment,
        geometry::{GeometryData, Shape},
        instance::Instance,
    },
    loading::ModelSlot,
    resources::EnvironmentMap,
};

pub type NodeId = usize;

/// What is drawn behind everything else.
#[derive(Clone, Debug)]
pub enum Background {
    Colour(wgpu::Color),
    Texture(Arc<EnvironmentMap>),
}

/// Blinn-Phong surface parameters. `colour` is linear RGB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhongMaterial {
    pub colour: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
}

impl PhongMaterial {
    pub fn new(colour: [f32; 3]) -> Self {
        Self {
            colour,
            specular: [0.067, 0.067, 0.067],
            shininess: 30.0,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Mesh {
        shape: Shape,
        geometry: Arc<GeometryData>,
        material: PhongMaterial,
    },
    Axes {
        size: f32,
    },
    /// Shines from the node's position towards `target`.
    DirectionalLight {
        colour: [f32; 3],
        intensity: f32,
        target: Point3<f32>,
    },
    AmbientLight {
        colour: [f32; 3],
        intensity: f32,
    },
    Model {
        slot: ModelSlot,
        fragment: ModelFragment,
    },
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Instance,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Instance, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform,
            kind,
        }
    }

    /// A primitive mesh node, tessellated once here.
    pub fn mesh(name: impl Into<String>, shape: Shape, material: PhongMaterial, transform: Instance) -> Self {
        let geometry = Arc::new(shape.tessellate());
        Self::new(
            name,
            transform,
            NodeKind::Mesh {
                shape,
                geometry,
                material,
            },
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    pub background: Option<Background>,
    pub environment: Option<Arc<EnvironmentMap>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `node` to the root and return its id.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Use one panorama as both backdrop and image-based lighting.
    ///
    /// Both slots hold the same `Arc`, so the texture is decoded and uploaded once.
    pub fn set_environment(&mut self, map: Arc<EnvironmentMap>) {
        self.background = Some(Background::Texture(map.clone()));
        self.environment = Some(map);
    }

    pub fn model(&self, slot: ModelSlot) -> Option<NodeId> {
        self.nodes.iter().position(|node| {
            matches!(&node.kind, NodeKind::Model { slot: s, .. } if *s == slot)
        })
    }

    pub fn directional_light(&self) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .find(|node| matches!(node.kind, NodeKind::DirectionalLight { .. }))
    }

    pub fn ambient_light(&self) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .find(|node| matches!(node.kind, NodeKind::AmbientLight { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::TextureMapping;

    #[test]
    fn environment_is_shared_with_background() {
        let mut scene = Scene::new();
        let map = Arc::new(EnvironmentMap {
            width: 1,
            height: 1,
            texels: vec![0.5; 4],
            mapping: TextureMapping::EquirectangularReflection,
        });
        scene.set_environment(map.clone());
        let Some(Background::Texture(background)) = &scene.background else {
            panic!("background not set");
        };
        assert!(Arc::ptr_eq(background, &map));
        assert!(Arc::ptr_eq(scene.environment.as_ref().unwrap(), &map));
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add(SceneNode::new("axes", Instance::new(), NodeKind::Axes { size: 5.0 }));
        let b = scene.add(SceneNode::mesh(
            "cube",
            Shape::Box {
                width: 0.5,
                height: 0.5,
                depth: 0.5,
            },
            PhongMaterial::new([0.0, 1.0, 0.0]),
            Instance::at([0.0, 3.0, 0.0]),
        ));
        assert_eq!((a, b), (0, 1));
        assert_eq!(scene.find("cube"), Some(1));
        assert!(scene.model(ModelSlot::Shoe).is_none());
    }
}
