//! orbit-demo
//!
//! A small wgpu scene: three spinning primitives, an axes helper, a sun and
//! an ambient light, viewed through damped orbit controls. An HDR panorama is
//! loaded in the background and, once decoded, becomes both the backdrop and
//! the image-based lighting for three glTF models that load concurrently
//! after it.
//!
//! High-level modules
//! - `camera`: perspective camera, projection and the camera uniform
//! - `config`: runtime configuration and the asset manifest
//! - `context`: GPU device, surface and shared render resources
//! - `controls`: orbit controls with damping, panning and dolly limits
//! - `data_structures`: geometry, instances, scene graph and GPU models
//! - `flow`: the winit event loop
//! - `loading`: asset sequencing and load-state tracking
//! - `pipelines`: mesh, line and background render pipelines
//! - `render`: frame planning and submission
//! - `resources`: HDR and glTF decoding
//! - `scene`: the demo scene and its per-frame update
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod loading;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
