//! Runtime configuration for the demo.
//!
//! Everything here has a sensible [`Default`]; [`SceneConfig::from_env`] layers a
//! couple of environment overrides on top so the binary can be pointed at a
//! different asset directory without recompiling.
//!
//! # Key types
//!
//! - [`SceneConfig`] bundles renderer, controls and asset settings
//! - [`ControlsConfig`] holds the orbit-control tuning
//! - [`AssetManifest`] lists the environment map and the model slots to load

use std::path::PathBuf;

use crate::loading::ModelSlot;

/// Environment variable naming the asset root directory.
pub const ASSETS_ENV: &str = "ORBIT_DEMO_ASSETS";
/// Environment variable toggling multisampling (`0`, `off` or `false` disables it).
pub const ANTIALIAS_ENV: &str = "ORBIT_DEMO_ANTIALIAS";

#[derive(Clone, Debug)]
pub struct SceneConfig {
    /// Enables 4x MSAA on the surface.
    pub antialias: bool,
    pub clear_colour: wgpu::Color,
    pub controls: ControlsConfig,
    pub assets: AssetManifest,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            clear_colour: wgpu::Color::BLACK,
            controls: ControlsConfig::default(),
            assets: AssetManifest::default(),
        }
    }
}

impl SceneConfig {
    /// Defaults overridden by `ORBIT_DEMO_ASSETS` and `ORBIT_DEMO_ANTIALIAS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ASSETS_ENV).filter(|root| !root.trim().is_empty()) {
            config.assets.root = PathBuf::from(root);
        }
        if let Some(flag) = lookup(ANTIALIAS_ENV) {
            match parse_flag(&flag) {
                Some(antialias) => config.antialias = antialias,
                None => log::warn!("Ignoring {}={:?}, expected on/off", ANTIALIAS_ENV, flag),
            }
        }
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Tuning for [`OrbitControls`](crate::controls::OrbitControls).
#[derive(Clone, Debug, PartialEq)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    /// Fraction of the pending motion applied per frame while damping.
    pub damping_factor: f32,
    /// Pan in the camera's screen plane instead of the world's horizontal plane.
    pub screen_space_panning: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            screen_space_panning: false,
            min_distance: 1.0,
            max_distance: 8.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

/// Where the demo finds its external assets. Paths are relative to `root`.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetManifest {
    pub root: PathBuf,
    pub environment: String,
    pub models: Vec<(ModelSlot, String)>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./assets"),
            environment: "hdri/goegap_road_1k.hdr".to_string(),
            models: vec![
                (ModelSlot::Character, "suzanne/eka.gltf".to_string()),
                (ModelSlot::Barrel, "barrel/tynnyri.glb".to_string()),
                (ModelSlot::Shoe, "shoe/kenka.gltf".to_string()),
            ],
        }
    }
}

impl AssetManifest {
    pub fn model_path(&self, slot: ModelSlot) -> Option<&str> {
        self.models
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, path)| path.as_str())
    }
}
