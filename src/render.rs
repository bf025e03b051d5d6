//! Frame composition.
//!
//! [`plan_frame`] decides, from the scene alone, what gets drawn and in which
//! order. [`Renderer`] owns the GPU copies of scene nodes and turns a plan into
//! one render pass. Splitting the two keeps the ordering rules testable
//! without a device.
//!
//! # Key types
//!
//! - [`DrawItem`] is one entry of a frame plan
//! - [`Renderer`] caches uploaded primitives, models, axes and the environment

use std::{collections::HashMap, iter, sync::Arc};

use cgmath::Transform;
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    data_structures::{
        geometry,
        model::{DrawModel, GpuModel, GpuPart, LineVertex, upload_primitive},
        scene_graph::{Background, NodeId, NodeKind, Scene},
    },
    pipelines::{background::EnvironmentBinding, light::LightUniform},
    resources::EnvironmentMap,
    scene::SceneContext,
};

/// One step of a frame, in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawItem {
    Background,
    Primitive(NodeId),
    Model(NodeId),
    Lines(NodeId),
}

/// Order the scene for drawing: backdrop, primitives, models, then lines.
///
/// Model nodes are skipped until `is_compiled` reports their GPU data present.
/// Lights produce no draw.
pub fn plan_frame(scene: &Scene, is_compiled: impl Fn(NodeId) -> bool) -> Vec<DrawItem> {
    let mut primitives = Vec::new();
    let mut models = Vec::new();
    let mut lines = Vec::new();
    for (id, node) in scene.nodes() {
        match node.kind {
            NodeKind::Mesh { .. } => primitives.push(DrawItem::Primitive(id)),
            NodeKind::Model { .. } if is_compiled(id) => models.push(DrawItem::Model(id)),
            NodeKind::Axes { .. } => lines.push(DrawItem::Lines(id)),
            _ => {}
        }
    }
    let backdrop = matches!(scene.background, Some(Background::Texture(_)));
    backdrop
        .then_some(DrawItem::Background)
        .into_iter()
        .chain(primitives)
        .chain(models)
        .chain(lines)
        .collect()
}

/// Clear colour for a frame: the background colour if one is set.
pub fn clear_colour(scene: &Scene, fallback: wgpu::Color) -> wgpu::Color {
    match scene.background {
        Some(Background::Colour(colour)) => colour,
        _ => fallback,
    }
}

#[derive(Debug)]
struct LineBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

#[derive(Debug)]
pub struct Renderer {
    primitives: HashMap<NodeId, GpuPart>,
    models: HashMap<NodeId, GpuModel>,
    lines: HashMap<NodeId, LineBuffer>,
    environment: EnvironmentBinding,
    environment_source: Option<Arc<EnvironmentMap>>,
}

impl Renderer {
    /// Upload every static node of the scene. Models arrive later through
    /// [`insert_model`](Self::insert_model).
    pub fn new(ctx: &Context, scene: &SceneContext) -> anyhow::Result<Self> {
        let mut primitives = HashMap::new();
        let mut lines = HashMap::new();
        for (id, node) in scene.scene.nodes() {
            match &node.kind {
                NodeKind::Mesh {
                    geometry, material, ..
                } => {
                    let part = upload_primitive(
                        &ctx.device,
                        &ctx.material_layout,
                        &ctx.white,
                        &node.name,
                        geometry,
                        material,
                    )?;
                    primitives.insert(id, part);
                }
                NodeKind::Axes { size } => {
                    let world = node.transform.to_matrix();
                    let mut vertices = LineVertex::from_lines(&geometry::axes(*size));
                    for vertex in &mut vertices {
                        vertex.position = world.transform_point(vertex.position.into()).into();
                    }
                    let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{} Line Buffer", node.name)),
                        contents: bytemuck::cast_slice(&vertices),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                    lines.insert(
                        id,
                        LineBuffer {
                            buffer,
                            count: vertices.len() as u32,
                        },
                    );
                }
                _ => {}
            }
        }
        log::info!(
            "Renderer ready: {} primitives, {} line sets",
            primitives.len(),
            lines.len()
        );
        Ok(Self {
            primitives,
            models: HashMap::new(),
            lines,
            environment: EnvironmentBinding::new(&ctx.device, &ctx.queue, &ctx.environment_layout, None),
            environment_source: None,
        })
    }

    /// Register the GPU copy of a model node. It is drawn from the next frame on.
    pub fn insert_model(&mut self, id: NodeId, model: GpuModel) {
        if self.models.insert(id, model).is_some() {
            log::warn!("Node {} already had a model, replaced", id);
        }
    }

    pub fn has_model(&self, id: NodeId) -> bool {
        self.models.contains_key(&id)
    }

    fn sync_environment(&mut self, ctx: &Context, scene: &Scene) {
        let Some(map) = &scene.environment else {
            return;
        };
        let current = self
            .environment_source
            .as_ref()
            .is_some_and(|uploaded| Arc::ptr_eq(uploaded, map));
        if !current {
            log::debug!("Uploading environment ({} bytes)", map.byte_len());
            self.environment =
                EnvironmentBinding::new(&ctx.device, &ctx.queue, &ctx.environment_layout, Some(map));
            self.environment_source = Some(map.clone());
        }
    }

    fn write_transforms(&self, ctx: &Context, scene: &Scene) {
        for (id, part) in &self.primitives {
            if let Some(node) = scene.node(*id) {
                part.write_transform(&ctx.queue, node.transform.to_matrix());
            }
        }
        for (id, model) in &self.models {
            if let Some(node) = scene.node(*id) {
                model.write_transform(&ctx.queue, node.transform.to_matrix());
            }
        }
    }

    pub fn render(&mut self, ctx: &mut Context, scene: &SceneContext) -> Result<(), wgpu::SurfaceError> {
        self.sync_environment(ctx, &scene.scene);
        ctx.camera.write(&ctx.queue, &scene.camera);
        ctx.light.write(&ctx.queue, LightUniform::from_scene(&scene.scene));
        self.write_transforms(ctx, &scene.scene);

        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (target, resolve_target) = match &ctx.msaa_target {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };

        let plan = plan_frame(&scene.scene, |id| self.models.contains_key(&id));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour(&scene.scene, ctx.clear_colour)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for item in plan {
                match item {
                    DrawItem::Background => {
                        render_pass.set_pipeline(&ctx.pipelines.background);
                        render_pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
                        render_pass.set_bind_group(1, &self.environment.bind_group, &[]);
                        render_pass.draw(0..3, 0..1);
                    }
                    DrawItem::Primitive(id) | DrawItem::Model(id) => {
                        render_pass.set_pipeline(&ctx.pipelines.mesh);
                        render_pass.set_bind_group(1, &ctx.camera.bind_group, &[]);
                        render_pass.set_bind_group(2, &ctx.light.bind_group, &[]);
                        render_pass.set_bind_group(3, &self.environment.bind_group, &[]);
                        if let Some(part) = self.primitives.get(&id) {
                            render_pass.draw_part(part);
                        } else if let Some(model) = self.models.get(&id) {
                            render_pass.draw_model(model, &ctx.pipelines);
                        }
                    }
                    DrawItem::Lines(id) => {
                        let Some(lines) = self.lines.get(&id) else {
                            continue;
                        };
                        render_pass.set_pipeline(&ctx.pipelines.lines);
                        render_pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
                        render_pass.set_vertex_buffer(0, lines.buffer.slice(..));
                        render_pass.draw(0..lines.count, 0..1);
                    }
                }
            }
        }

        ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SceneConfig,
        data_structures::{fragment::ModelFragment, instance::Instance, scene_graph::SceneNode},
        loading::ModelSlot,
        resources::TextureMapping,
    };

    fn with_model(ctx: &mut SceneContext) -> NodeId {
        ctx.scene.add(SceneNode::new(
            "shoe",
            Instance::new(),
            NodeKind::Model {
                slot: ModelSlot::Shoe,
                fragment: ModelFragment {
                    name: "shoe".into(),
                    roots: Vec::new(),
                },
            },
        ))
    }

    #[test]
    fn models_wait_for_their_gpu_data() {
        let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
        let id = with_model(&mut ctx);
        let plan = plan_frame(&ctx.scene, |_| false);
        assert!(!plan.contains(&DrawItem::Model(id)));
        let plan = plan_frame(&ctx.scene, |candidate| candidate == id);
        assert!(plan.contains(&DrawItem::Model(id)));
    }

    #[test]
    fn backdrop_comes_first_and_lines_last() {
        let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
        assert_eq!(plan_frame(&ctx.scene, |_| true).len(), 4);
        ctx.scene.set_environment(Arc::new(EnvironmentMap {
            width: 1,
            height: 1,
            texels: vec![0.0; 4],
            mapping: TextureMapping::EquirectangularReflection,
        }));
        let plan = plan_frame(&ctx.scene, |_| true);
        assert_eq!(plan.first(), Some(&DrawItem::Background));
        assert!(matches!(plan.last(), Some(DrawItem::Lines(_))));
        assert_eq!(
            &plan[1..4],
            &[
                DrawItem::Primitive(ctx.primitives.cube),
                DrawItem::Primitive(ctx.primitives.torus_knot),
                DrawItem::Primitive(ctx.primitives.cylinder),
            ]
        );
    }

    #[test]
    fn colour_background_sets_the_clear_colour() {
        let ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
        let fallback = wgpu::Color::RED;
        assert_eq!(clear_colour(&ctx.scene, fallback), SceneConfig::default().clear_colour);
        assert_eq!(clear_colour(&Scene::new(), fallback), fallback);
    }
}
