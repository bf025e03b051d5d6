//! The demo scene and its application context.
//!
//! [`SceneContext`] owns everything the frame loop, the resize handler and the
//! asset channel mutate: the scene graph, the camera, the orbit controls and
//! the load states. It is created once by [`SceneContext::bootstrap`] and then
//! handed by reference to whoever needs it. It has no GPU state, so the whole
//! update protocol runs in plain unit tests.

use cgmath::{Deg, Point3};
use winit::event::WindowEvent;

use crate::{
    camera::{Camera, Projection},
    config::SceneConfig,
    controls::OrbitControls,
    data_structures::{
        geometry::Shape,
        instance::Instance,
        scene_graph::{Background, NodeId, NodeKind, PhongMaterial, Scene, SceneNode},
    },
    loading::{AssetEvent, AssetId, LoadTracker},
};

pub const FOV_DEGREES: f32 = 75.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 1000.0;
pub const CAMERA_POSITION: [f32; 3] = [2.0, 2.0, 2.0];
pub const AXES_LENGTH: f32 = 5.0;
pub const AMBIENT_COLOUR: u32 = 0x404040;
pub const DIRECTIONAL_LIGHT_POSITION: [f32; 3] = [0.0, 1.0, 0.0];

/// One of the three spinning primitives.
#[derive(Clone, Copy, Debug)]
pub struct PrimitiveSpec {
    pub name: &'static str,
    pub shape: Shape,
    /// sRGB hex colour.
    pub colour: u32,
    pub position: [f32; 3],
    /// Radians added to the x and y rotation every frame.
    pub spin: f32,
}

pub const CUBE: PrimitiveSpec = PrimitiveSpec {
    name: "cube",
    shape: Shape::Box {
        width: 0.5,
        height: 0.5,
        depth: 0.5,
    },
    colour: 0x00ff00,
    position: [0.0, 3.0, 0.0],
    spin: 0.01,
};

pub const TORUS_KNOT: PrimitiveSpec = PrimitiveSpec {
    name: "torus_knot",
    shape: Shape::TorusKnot {
        radius: 0.3,
        tube: 0.1,
        tubular_segments: 100,
        radial_segments: 16,
        p: 2,
        q: 3,
    },
    colour: 0xffff00,
    position: [3.0, 0.0, 0.0],
    spin: 0.02,
};

pub const CYLINDER: PrimitiveSpec = PrimitiveSpec {
    name: "cylinder",
    shape: Shape::Cylinder {
        radius_top: 0.3,
        radius_bottom: 0.3,
        height: 1.5,
        radial_segments: 32,
    },
    colour: 0xff00ff,
    position: [-3.0, 0.0, 0.0],
    spin: 0.04,
};

/// Convert a packed sRGB hex colour into linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

/// Drawable area in physical pixels. Both dimensions are at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "viewport {}x{} has no area", width, height);
        Ok(Self { width, height })
    }

    /// Like [`new`](Self::new) but raises zero dimensions to 1.
    pub fn clamped(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            log::warn!("Viewport {}x{} has no area, clamping to at least 1x1", width, height);
        }
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Ids of the spinning primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Primitives {
    pub cube: NodeId,
    pub torus_knot: NodeId,
    pub cylinder: NodeId,
}

#[derive(Debug)]
pub struct SceneContext {
    pub scene: Scene,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub primitives: Primitives,
    viewport: Viewport,
    loads: LoadTracker,
    frames: u64,
    summary_logged: bool,
}

impl SceneContext {
    /// Build the static scene: camera, primitives, helpers, lights and controls.
    ///
    /// Asset loading is not started here; the caller kicks it off once the
    /// renderer exists.
    pub fn bootstrap(config: &SceneConfig, width: u32, height: u32) -> Self {
        let viewport = Viewport::clamped(width, height);

        let mut scene = Scene::new();
        scene.background = Some(Background::Colour(config.clear_colour));
        let mut camera = Camera::new(
            CAMERA_POSITION,
            Projection::new(viewport.width(), viewport.height(), Deg(FOV_DEGREES), NEAR, FAR),
        );

        let mut add_primitive = |spec: &PrimitiveSpec| {
            scene.add(SceneNode::mesh(
                spec.name,
                spec.shape,
                PhongMaterial::new(hex_to_linear(spec.colour)),
                Instance::at(spec.position),
            ))
        };
        let primitives = Primitives {
            cube: add_primitive(&CUBE),
            torus_knot: add_primitive(&TORUS_KNOT),
            cylinder: add_primitive(&CYLINDER),
        };

        camera.look_at(Point3::new(0.0, 0.0, 0.0));

        scene.add(SceneNode::new(
            "axes",
            Instance::new(),
            NodeKind::Axes { size: AXES_LENGTH },
        ));
        scene.add(SceneNode::new(
            "sun",
            Instance::at(DIRECTIONAL_LIGHT_POSITION),
            NodeKind::DirectionalLight {
                colour: [1.0, 1.0, 1.0],
                intensity: 1.0,
                target: Point3::new(0.0, 0.0, 0.0),
            },
        ));
        scene.add(SceneNode::new(
            "ambient",
            Instance::new(),
            NodeKind::AmbientLight {
                colour: hex_to_linear(AMBIENT_COLOUR),
                intensity: 1.0,
            },
        ));

        let mut controls = OrbitControls::new(&config.controls);
        controls.set_viewport(viewport.width(), viewport.height());

        log::info!(
            "Scene ready: {} nodes, viewport {}x{}",
            scene.len(),
            viewport.width(),
            viewport.height()
        );

        Self {
            scene,
            camera,
            controls,
            primitives,
            viewport,
            loads: LoadTracker::new(),
            frames: 0,
            summary_logged: false,
        }
    }

    /// One frame of animation: spin the primitives, then step the controls.
    ///
    /// Increments are fixed per call and do not depend on elapsed time.
    /// Returns `true` if the controls moved the camera.
    pub fn advance_frame(&mut self) -> bool {
        for (id, spec) in [
            (self.primitives.cube, &CUBE),
            (self.primitives.torus_knot, &TORUS_KNOT),
            (self.primitives.cylinder, &CYLINDER),
        ] {
            if let Some(node) = self.scene.node_mut(id) {
                node.transform.spin(spec.spin);
            }
        }
        self.frames += 1;
        self.controls.update(&mut self.camera)
    }

    /// Apply a new viewport size: aspect, projection matrix, control scaling.
    ///
    /// Zero-area sizes are rejected and leave the previous state in place.
    pub fn resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let viewport = Viewport::new(width, height)?;
        self.camera.projection.resize(width, height)?;
        self.controls.set_viewport(width, height);
        self.viewport = viewport;
        Ok(())
    }

    pub fn handle_input(&mut self, event: &WindowEvent) -> bool {
        self.controls.handle_window_event(event, &self.camera)
    }

    /// Apply one message from the asset channel.
    ///
    /// A ready model is attached to the scene and its id is returned together
    /// with the precompiled payload, which the caller must hand to the renderer
    /// before the next frame.
    pub fn apply_asset_event<C>(&mut self, event: AssetEvent<C>) -> Option<(NodeId, C)> {
        self.loads.observe(&event);
        let attached = match event {
            AssetEvent::Requested(asset) => {
                log::debug!("Loading {}", asset);
                None
            }
            AssetEvent::EnvironmentReady(map) => {
                log::info!("Environment ready ({}x{})", map.width, map.height);
                self.scene.set_environment(map);
                None
            }
            AssetEvent::ModelReady {
                slot,
                model,
                compiled,
            } => {
                let id = self.scene.add(SceneNode::new(
                    slot.to_string(),
                    Instance::new(),
                    NodeKind::Model {
                        slot,
                        fragment: model,
                    },
                ));
                log::info!("Attached {} model as node {}", slot, id);
                Some((id, compiled))
            }
            AssetEvent::Failed { asset, error } => {
                if asset == AssetId::Environment {
                    log::error!("Environment failed, models will not be loaded: {:#}", error);
                } else {
                    log::error!("{} failed: {:#}", asset, error);
                }
                None
            }
        };
        if !self.summary_logged && self.loads.is_settled() {
            self.summary_logged = true;
            log::info!("Assets settled: {}", self.loads.summary());
        }
        attached
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn loads(&self) -> &LoadTracker {
        &self.loads
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn rotation(&self, id: NodeId) -> Option<cgmath::Vector3<f32>> {
        self.scene.node(id).map(|node| node.transform.rotation)
    }

    pub fn position(&self, id: NodeId) -> Option<cgmath::Vector3<f32>> {
        self.scene.node(id).map(|node| node.transform.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_are_linearised() {
        let [r, g, b] = hex_to_linear(0x00ff00);
        assert_eq!((r, b), (0.0, 0.0));
        assert!((g - 1.0).abs() < 1e-6);
        let [r, g, b] = hex_to_linear(AMBIENT_COLOUR);
        assert!((r - 0.0513).abs() < 1e-3);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn bootstrap_builds_one_of_everything() {
        let ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
        assert_eq!(ctx.scene.len(), 6);
        assert!(ctx.scene.directional_light().is_some());
        assert!(ctx.scene.ambient_light().is_some());
        assert_eq!(ctx.camera.position, Point3::new(2.0, 2.0, 2.0));
        assert_eq!(ctx.camera.target, Point3::new(0.0, 0.0, 0.0));
        assert!((ctx.camera.projection.fovy_degrees() - 75.0).abs() < 1e-4);
        assert_eq!(ctx.camera.projection.znear, 0.1);
        assert_eq!(ctx.camera.projection.zfar, 1000.0);
        let Some(node) = ctx.scene.node(ctx.scene.find("axes").unwrap()) else {
            unreachable!()
        };
        assert!(matches!(node.kind, NodeKind::Axes { size } if size == 5.0));
    }

    #[test]
    fn zero_viewport_is_clamped_at_bootstrap() {
        let ctx = SceneContext::bootstrap(&SceneConfig::default(), 0, 600);
        assert_eq!(ctx.viewport().width(), 1);
        assert!(ctx.camera.projection.aspect.is_finite());
    }
}
