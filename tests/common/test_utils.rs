use std::{
    collections::HashMap,
    io::Cursor,
    sync::{Arc, Mutex},
};

use base64::Engine;
use orbit_demo::{
    config::AssetManifest, data_structures::fragment::ModelFragment, loading::Precompile,
    resources::AssetSource,
};
use tokio::sync::Notify;

pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serves assets from memory and records every path that was asked for.
///
/// A gated path blocks until its [`Notify`] is triggered, which lets tests
/// choose the order in which concurrent loads finish.
#[derive(Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    gates: HashMap<String, Arc<Notify>>,
    requests: RequestLog,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    /// Hold loads of `path` until the returned handle is notified.
    pub fn gate(&mut self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.insert(path.to_string(), gate.clone());
        gate
    }

    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }
}

impl AssetSource for MemorySource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.requests.lock().unwrap().push(path.to_string());
        if let Some(gate) = self.gates.get(path) {
            gate.notified().await;
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} not found", path))
    }
}

/// A `width` x `height` Radiance file filled with one colour.
pub fn hdr_bytes(width: usize, height: usize, colour: [f32; 3]) -> Vec<u8> {
    let pixels = vec![image::Rgb(colour); width * height];
    let mut out = Cursor::new(Vec::new());
    image::codecs::hdr::HdrEncoder::new(&mut out)
        .encode(&pixels, width, height)
        .expect("encode hdr fixture");
    out.into_inner()
}

/// Index data (three u16, padded to 8 bytes) followed by three vec3 positions.
pub fn triangle_buffer(indices: [u16; 3]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(44);
    for index in indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    for position in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for component in position {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
    }
    bytes
}

/// glTF JSON for one triangle. `uri` is `None` for a GLB binary chunk.
pub fn triangle_json(uri: Option<&str>, byte_length: usize) -> String {
    let buffer = match uri {
        Some(uri) => format!(r#"{{ "byteLength": {}, "uri": "{}" }}"#, byte_length, uri),
        None => format!(r#"{{ "byteLength": {} }}"#, byte_length),
    };
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "name": "tri", "mesh": 0, "translation": [0.0, 2.0, 0.0] }} ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{ "POSITION": 1 }}, "indices": 0, "material": 0 }} ] }} ],
  "materials": [ {{ "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.5, 0.25, 1.0], "metallicFactor": 0.0, "roughnessFactor": 0.5 }} }} ],
  "buffers": [ {} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 6, "target": 34963 }},
    {{ "buffer": 0, "byteOffset": 8, "byteLength": 36, "target": 34962 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }}
  ]
}}"#,
        buffer
    )
}

/// A `.gltf` file with its buffer inlined as a base64 data URI.
pub fn triangle_gltf_embedded() -> Vec<u8> {
    let buffer = triangle_buffer([0, 1, 2]);
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buffer)
    );
    triangle_json(Some(&uri), buffer.len()).into_bytes()
}

/// Pack `json` and `bin` into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

pub fn triangle_glb() -> Vec<u8> {
    let buffer = triangle_buffer([0, 1, 2]);
    glb(&triangle_json(None, buffer.len()), &buffer)
}

/// A source holding a small panorama plus a valid triangle in every default model slot.
pub fn demo_source(manifest: &AssetManifest) -> MemorySource {
    let mut source = MemorySource::new().with(&manifest.environment, hdr_bytes(8, 4, [0.5, 0.25, 1.0]));
    for (_, path) in &manifest.models {
        let bytes = if path.ends_with(".glb") {
            triangle_glb()
        } else {
            triangle_gltf_embedded()
        };
        source = source.with(path, bytes);
    }
    source
}

/// Returns a label per model and remembers what it compiled.
#[derive(Clone, Default)]
pub struct RecordingPrecompiler {
    pub compiled: RequestLog,
    /// Model names whose precompile step fails.
    pub fail: Vec<String>,
}

impl Precompile for RecordingPrecompiler {
    type Output = String;

    async fn precompile(&self, model: &ModelFragment) -> anyhow::Result<String> {
        if self.fail.contains(&model.name) {
            anyhow::bail!("shader compilation failed for {}", model.name);
        }
        self.compiled.lock().unwrap().push(model.name.clone());
        Ok(format!("compiled {}", model.name))
    }
}
