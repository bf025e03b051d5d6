//! Loading of external assets.
//!
//! Everything here produces CPU-side data ([`EnvironmentMap`](environment::EnvironmentMap),
//! [`ModelFragment`](crate::data_structures::fragment::ModelFragment)); GPU upload happens
//! later. Bytes come from an [`AssetSource`] so tests can serve fixtures from memory.

use std::{future::Future, path::PathBuf};

use anyhow::{Context, bail};
use base64::Engine;

pub mod environment;
pub mod model;

pub use environment::{EnvironmentMap, TextureMapping, load_environment};
pub use model::load_model_gltf;

/// Somewhere asset bytes can be fetched from by relative path.
pub trait AssetSource: Send + Sync + 'static {
    fn load_binary(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

/// Reads assets from a directory on disk.
#[derive(Clone, Debug)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl AssetSource for FsSource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full = self.root.join(path.trim_start_matches('/'));
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read {}", full.display()))
    }
}

/// Resolve `uri` relative to the directory containing `base`.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    let uri = percent_decode(uri);
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri,
    }
}

fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| uri.to_string())
}

/// Decode an RFC 2397 `data:` URI. Returns the media type (if any) and the payload.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<(Option<String>, Vec<u8>)> {
    let Some(rest) = uri.strip_prefix("data:") else {
        bail!("not a data URI");
    };
    let Some((header, payload)) = rest.split_once(',') else {
        bail!("data URI without payload separator");
    };
    let (media, is_base64) = match header.strip_suffix(";base64") {
        Some(media) => (media, true),
        None => (header, false),
    };
    let media = (!media.is_empty()).then(|| media.to_string());
    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("invalid base64 in data URI")?
    } else {
        percent_decode(payload).into_bytes()
    };
    Ok((media, bytes))
}

/// Fetch a URI referenced from the asset at `base`: inline data or a sibling file.
pub async fn load_uri<S: AssetSource>(source: &S, base: &str, uri: &str) -> anyhow::Result<Vec<u8>> {
    if uri.starts_with("data:") {
        let (_, bytes) = decode_data_uri(uri)?;
        Ok(bytes)
    } else {
        source.load_binary(&resolve_relative(base, uri)).await
    }
}
