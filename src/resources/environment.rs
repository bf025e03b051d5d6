//! Equirectangular HDR environment maps.

use std::f32::consts::{PI, TAU};

use anyhow::{Context, ensure};
use cgmath::{InnerSpace, Vector3};
use image::ImageFormat;

use crate::resources::AssetSource;

/// How a texture is projected when sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureMapping {
    #[default]
    Uv,
    /// Longitude/latitude panorama looked up by reflection direction.
    EquirectangularReflection,
}

/// A decoded HDR panorama, linear RGBA32F, row-major from the top row.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f32>,
    pub mapping: TextureMapping,
}

impl EnvironmentMap {
    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let idx = (y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize * 4;
        [
            self.texels[idx],
            self.texels[idx + 1],
            self.texels[idx + 2],
            self.texels[idx + 3],
        ]
    }

    /// Nearest-texel lookup for a world-space direction.
    pub fn sample(&self, direction: Vector3<f32>) -> [f32; 4] {
        let [u, v] = direction_to_uv(direction);
        let x = (u * self.width as f32) as u32;
        let y = (v * self.height as f32) as u32;
        self.texel(x, y)
    }

    pub fn byte_len(&self) -> usize {
        self.texels.len() * std::mem::size_of::<f32>()
    }
}

/// Map a direction to equirectangular texture coordinates in `[0, 1]`.
///
/// `u` wraps around +Y starting at -X, `v` runs from the zenith (0) to the nadir (1).
pub fn direction_to_uv(direction: Vector3<f32>) -> [f32; 2] {
    let dir = if direction.magnitude2() > 0.0 {
        direction.normalize()
    } else {
        Vector3::unit_z()
    };
    let u = dir.z.atan2(dir.x) / TAU + 0.5;
    let v = 0.5 - dir.y.clamp(-1.0, 1.0).asin() / PI;
    [u, v]
}

/// Decode Radiance RGBE bytes into a linear float panorama.
pub fn decode_hdr(bytes: &[u8]) -> anyhow::Result<EnvironmentMap> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)
        .context("not a Radiance HDR image")?
        .to_rgba32f();
    let (width, height) = image.dimensions();
    ensure!(width > 0 && height > 0, "HDR image is empty");
    Ok(EnvironmentMap {
        width,
        height,
        texels: image.into_raw(),
        mapping: TextureMapping::Uv,
    })
}

/// Fetch and decode the environment panorama at `path`, mapped for reflections.
pub async fn load_environment<S: AssetSource>(source: &S, path: &str) -> anyhow::Result<EnvironmentMap> {
    let bytes = source.load_binary(path).await?;
    // decoding a 1k panorama takes a few ms; keep it off the runtime's workers
    let mut map = tokio::task::spawn_blocking(move || decode_hdr(&bytes))
        .await
        .context("HDR decode task panicked")?
        .with_context(|| format!("failed to decode {}", path))?;
    map.mapping = TextureMapping::EquirectangularReflection;
    log::info!("Decoded environment {} ({}x{})", path, map.width, map.height);
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn poles_and_horizon_map_to_expected_rows() {
        assert!(close(direction_to_uv(Vector3::unit_y())[1], 0.0));
        assert!(close(direction_to_uv(-Vector3::unit_y())[1], 1.0));
        let [u, v] = direction_to_uv(Vector3::unit_x());
        assert!(close(u, 0.5));
        assert!(close(v, 0.5));
        assert!(close(direction_to_uv(Vector3::new(-1.0, 0.0, 0.0))[0], 1.0));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_hdr(b"definitely not radiance").is_err());
    }

    #[test]
    fn sample_clamps_to_edges() {
        let map = EnvironmentMap {
            width: 2,
            height: 1,
            texels: vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0],
            mapping: TextureMapping::EquirectangularReflection,
        };
        assert_eq!(map.texel(5, 5), [0.0, 0.0, 1.0, 1.0]);
        // -X lands on u == 1.0, i.e. past the last column
        assert_eq!(map.sample(Vector3::new(-1.0, 0.0, 0.0)), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(map.byte_len(), 32);
    }
}
