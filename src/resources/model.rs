//! glTF 2.0 loading into [`ModelFragment`]s.
//!
//! Supports `.gltf` files with inline `data:` buffers or sibling `.bin`
//! files, and binary `.glb` files. Only triangle-list primitives are kept;
//! anything else is skipped with a warning.

use std::sync::Arc;

use anyhow::{Context, bail, ensure};
use cgmath::Matrix4;
use image::{ImageFormat, RgbaImage};

use crate::{
    data_structures::{
        fragment::{FragmentNode, MaterialData, MeshData, ModelFragment},
        geometry::GeometryData,
    },
    resources::{AssetSource, load_uri},
};

pub async fn load_model_gltf<S: AssetSource>(source: &S, file_name: &str) -> anyhow::Result<ModelFragment> {
    let bytes = source.load_binary(file_name).await?;
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("{} is not valid glTF", file_name))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => match gltf.blob.as_deref() {
                Some(blob) => blob.to_vec(),
                None => bail!("{} references a GLB binary chunk it does not have", file_name),
            },
            gltf::buffer::Source::Uri(uri) => load_uri(source, file_name, uri)
                .await
                .with_context(|| format!("buffer {} of {}", buffer.index(), file_name))?,
        };
        ensure!(
            data.len() >= buffer.length(),
            "buffer {} of {} holds {} bytes, expected {}",
            buffer.index(),
            file_name,
            data.len(),
            buffer.length()
        );
        buffer_data.push(data);
    }

    // Load images; a broken texture degrades to the plain base colour
    let mut images: Vec<Option<Arc<RgbaImage>>> = Vec::new();
    for image in gltf.images() {
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = &buffer_data[view.buffer().index()];
                let start = view.offset();
                let end = start + view.length();
                match buffer.get(start..end) {
                    Some(slice) => decode_image(slice, Some(mime_type)),
                    None => Err(anyhow::anyhow!("image view out of bounds")),
                }
            }
            gltf::image::Source::Uri { uri, mime_type } => match load_uri(source, file_name, uri).await {
                Ok(bytes) => decode_image(&bytes, mime_type),
                Err(e) => Err(e),
            },
        };
        match decoded {
            Ok(img) => images.push(Some(Arc::new(img))),
            Err(e) => {
                log::warn!("Image {} of {} could not be loaded: {:#}", image.index(), file_name, e);
                images.push(None);
            }
        }
    }

    // Load materials
    let materials: Vec<MaterialData> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let base_colour_texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()).cloned().flatten());
            MaterialData {
                base_colour: pbr.base_color_factor(),
                metallic: pbr.metallic_factor(),
                roughness: pbr.roughness_factor(),
                base_colour_texture,
                double_sided: material.double_sided(),
            }
        })
        .collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{} contains no scene", file_name))?;

    let mut roots = Vec::new();
    for node in scene.nodes() {
        let mut ancestors = Vec::new();
        roots.push(to_fragment_node(&node, &buffer_data, &materials, file_name, &mut ancestors)?);
    }

    let name = file_name
        .rsplit('/')
        .next()
        .and_then(|base| base.split('.').next())
        .unwrap_or(file_name)
        .to_string();
    let fragment = ModelFragment { name, roots };
    log::info!(
        "Loaded {}: {} meshes, {} triangles",
        file_name,
        fragment.mesh_count(),
        fragment.triangle_count()
    );
    Ok(fragment)
}

fn decode_image(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<RgbaImage> {
    let image = match mime_type.and_then(ImageFormat::from_mime_type) {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(image.to_rgba8())
}

fn to_fragment_node(
    node: &gltf::scene::Node,
    buffers: &[Vec<u8>],
    materials: &[MaterialData],
    file_name: &str,
    ancestors: &mut Vec<usize>,
) -> anyhow::Result<FragmentNode> {
    if ancestors.contains(&node.index()) {
        bail!("node {} of {} is its own ancestor", node.index(), file_name);
    }
    let mut meshes = Vec::new();
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping {:?} primitive {} of mesh {} in {}",
                    primitive.mode(),
                    primitive.index(),
                    mesh.index(),
                    file_name
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.as_slice()));

            let Some(positions) = reader.read_positions() else {
                log::warn!("Primitive {} of mesh {} has no positions", primitive.index(), mesh.index());
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let vertex_count = positions.len();

            let tex_coords: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().collect())
                .filter(|coords: &Vec<[f32; 2]>| coords.len() == vertex_count)
                .unwrap_or_else(|| vec![[0.0, 0.0]; vertex_count]);

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertex_count as u32).collect(),
            };
            ensure!(
                indices.iter().all(|&i| (i as usize) < vertex_count),
                "mesh {} of {} indexes past its {} vertices",
                mesh.index(),
                file_name,
                vertex_count
            );

            let mut geometry = GeometryData {
                positions,
                normals: Vec::new(),
                tex_coords,
                indices,
            };
            match reader.read_normals() {
                Some(normals) => geometry.normals = normals.collect(),
                None => geometry.compute_normals(),
            }
            if geometry.normals.len() != vertex_count {
                geometry.compute_normals();
            }

            let material = primitive
                .material()
                .index()
                .and_then(|idx| materials.get(idx).cloned())
                .unwrap_or_default();
            meshes.push(MeshData { geometry, material });
        }
    }

    ancestors.push(node.index());
    let mut children = Vec::new();
    for child in node.children() {
        children.push(to_fragment_node(&child, buffers, materials, file_name, ancestors)?);
    }
    ancestors.pop();

    Ok(FragmentNode {
        name: node.name().map(str::to_string),
        local: Matrix4::from(node.transform().matrix()),
        meshes,
        children,
    })
}
