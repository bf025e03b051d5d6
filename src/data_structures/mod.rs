//! Scene data: CPU geometry and model fragments, instances, the scene graph,
//! and their GPU counterparts.
//!
//! - `geometry` tessellates the primitives and the axes helper
//! - `fragment` holds decoded glTF data before upload
//! - `instance` holds per-node transforms and their GPU layout
//! - `scene_graph` is the flat node list with background and environment
//! - `model` contains GPU meshes, materials and uploaded models
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod fragment;
pub mod geometry;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
