use std::sync::Arc;

use futures::{StreamExt, channel::mpsc};
use orbit_demo::{
    config::{AssetManifest, SceneConfig},
    data_structures::scene_graph::{Background, NodeKind},
    loading::{AssetEvent, AssetId, LoadReport, LoadState, ModelSlot, load_assets},
    resources::TextureMapping,
    scene::SceneContext,
};

mod common;

use crate::common::test_utils::{RecordingPrecompiler, demo_source, hdr_bytes};

async fn collect(
    source: common::test_utils::MemorySource,
    manifest: AssetManifest,
    precompiler: RecordingPrecompiler,
) -> (LoadReport, Vec<AssetEvent<String>>) {
    let (tx, rx) = mpsc::unbounded();
    let report = load_assets(source, manifest, precompiler, tx).await;
    (report, rx.collect().await)
}

#[tokio::test]
async fn environment_is_requested_before_any_model() {
    let manifest = AssetManifest::default();
    let source = demo_source(&manifest);
    let requests = source.requests();

    let (report, events) = collect(source, manifest.clone(), RecordingPrecompiler::default()).await;

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.first(), Some(&manifest.environment));
    assert_eq!(requests.len(), 4);
    assert_eq!(report.ready.len(), 4);
    assert!(report.failed.is_empty());

    assert!(matches!(events[0], AssetEvent::Requested(AssetId::Environment)));
    assert!(matches!(events[1], AssetEvent::EnvironmentReady(_)));
    assert!(
        events[2..]
            .iter()
            .all(|event| !matches!(event, AssetEvent::Requested(AssetId::Environment)))
    );
}

#[tokio::test]
async fn failed_environment_skips_the_models() {
    let manifest = AssetManifest::default();
    let source = demo_source(&manifest).with(&manifest.environment, b"not an hdr".to_vec());
    let requests = source.requests();

    let (report, events) = collect(source, manifest.clone(), RecordingPrecompiler::default()).await;

    assert_eq!(*requests.lock().unwrap(), vec![manifest.environment.clone()]);
    assert_eq!(report.failed, vec![AssetId::Environment]);
    assert_eq!(report.skipped, ModelSlot::ALL.to_vec());

    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    for event in events {
        assert!(ctx.apply_asset_event(event).is_none());
    }
    assert!(matches!(ctx.loads().state(AssetId::Environment), LoadState::Failed(_)));
    assert!(ctx.loads().is_settled());
    assert!(ctx.scene.environment.is_none());
    assert!(matches!(ctx.scene.background, Some(Background::Colour(_))));
}

#[tokio::test]
async fn models_attach_in_completion_order() {
    let manifest = AssetManifest::default();
    let mut source = demo_source(&manifest);
    let character = manifest.model_path(ModelSlot::Character).unwrap().to_string();
    let gate = source.gate(&character);

    let (tx, mut rx) = mpsc::unbounded();
    let task = tokio::spawn(load_assets(
        source,
        manifest.clone(),
        RecordingPrecompiler::default(),
        tx,
    ));

    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    let mut attached = Vec::new();
    while let Some(event) = rx.next().await {
        if let AssetEvent::ModelReady { slot, .. } = &event {
            attached.push(*slot);
        }
        ctx.apply_asset_event(event);
        if attached.len() == 2 {
            gate.notify_one();
        }
    }
    task.await.unwrap();

    assert_eq!(attached.len(), 3);
    assert_eq!(attached.last(), Some(&ModelSlot::Character));
    assert!(ctx.loads().ordering_violations().is_empty());
    assert!(ctx.loads().is_settled());
    assert_eq!(ctx.loads().ready_models().count(), 3);
    for slot in ModelSlot::ALL {
        assert!(ctx.scene.model(slot).is_some(), "{} not attached", slot);
    }
}

#[tokio::test]
async fn one_failure_leaves_the_other_models_ready() {
    let manifest = AssetManifest::default();
    let barrel = manifest.model_path(ModelSlot::Barrel).unwrap().to_string();
    let source = demo_source(&manifest).with(&barrel, b"glTF but truncated".to_vec());

    let (report, events) = collect(source, manifest, RecordingPrecompiler::default()).await;
    assert_eq!(report.failed, vec![AssetId::Model(ModelSlot::Barrel)]);

    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    let nodes_before = ctx.scene.len();
    for event in events {
        ctx.apply_asset_event(event);
    }
    assert_eq!(ctx.scene.len(), nodes_before + 2);
    assert!(matches!(
        ctx.loads().state(AssetId::Model(ModelSlot::Barrel)),
        LoadState::Failed(_)
    ));
    assert_eq!(*ctx.loads().state(AssetId::Model(ModelSlot::Shoe)), LoadState::Ready);
    assert_eq!(*ctx.loads().state(AssetId::Model(ModelSlot::Character)), LoadState::Ready);
    assert!(ctx.scene.model(ModelSlot::Barrel).is_none());
}

#[tokio::test]
async fn environment_becomes_background_and_lighting() {
    let manifest = AssetManifest::default();
    let source = demo_source(&manifest);

    let (_, events) = collect(source, manifest, RecordingPrecompiler::default()).await;

    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    for event in events {
        ctx.apply_asset_event(event);
    }
    let environment = ctx.scene.environment.clone().expect("environment set");
    let Some(Background::Texture(background)) = &ctx.scene.background else {
        panic!("background is not the panorama");
    };
    assert!(Arc::ptr_eq(background, &environment));
    assert_eq!(environment.mapping, TextureMapping::EquirectangularReflection);
    assert_eq!((environment.width, environment.height), (8, 4));
    let [r, g, b, a] = environment.texel(3, 2);
    assert!((r - 0.5).abs() < 0.01 && (g - 0.25).abs() < 0.01 && (b - 1.0).abs() < 0.02);
    assert_eq!(a, 1.0);
}

#[tokio::test]
async fn models_are_precompiled_before_they_are_announced() {
    let manifest = AssetManifest::default();
    let source = demo_source(&manifest);
    let precompiler = RecordingPrecompiler::default();
    let compiled = precompiler.compiled.clone();

    let (tx, mut rx) = mpsc::unbounded();
    let task = tokio::spawn(load_assets(source, manifest, precompiler, tx));

    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    while let Some(event) = rx.next().await {
        if let AssetEvent::ModelReady { model, compiled: payload, .. } = &event {
            assert!(compiled.lock().unwrap().contains(&model.name));
            assert_eq!(payload, &format!("compiled {}", model.name));
        }
        if let Some((id, payload)) = ctx.apply_asset_event(event) {
            let node = ctx.scene.node(id).unwrap();
            let NodeKind::Model { fragment, .. } = &node.kind else {
                panic!("attached node is not a model");
            };
            assert_eq!(payload, format!("compiled {}", fragment.name));
        }
    }
    task.await.unwrap();
    assert_eq!(compiled.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn precompile_failure_is_reported_not_attached() {
    let manifest = AssetManifest::default();
    let source = demo_source(&manifest);
    let precompiler = RecordingPrecompiler {
        fail: vec!["kenka".to_string()],
        ..Default::default()
    };

    let (report, events) = collect(source, manifest, precompiler).await;
    assert_eq!(report.failed, vec![AssetId::Model(ModelSlot::Shoe)]);
    let failure = events
        .iter()
        .find_map(|event| match event {
            AssetEvent::Failed { error, .. } => Some(format!("{:#}", error)),
            _ => None,
        })
        .unwrap();
    assert!(failure.contains("precompile"));
    assert!(failure.contains("shader compilation failed"));
}

#[test]
fn early_model_requests_are_flagged() {
    let mut ctx = SceneContext::bootstrap(&SceneConfig::default(), 800, 600);
    ctx.apply_asset_event::<()>(AssetEvent::Requested(AssetId::Environment));
    ctx.apply_asset_event::<()>(AssetEvent::Requested(AssetId::Model(ModelSlot::Barrel)));
    assert_eq!(ctx.loads().ordering_violations(), &[ModelSlot::Barrel]);
}

#[test]
fn hdr_fixture_decodes() {
    let map = orbit_demo::resources::environment::decode_hdr(&hdr_bytes(2, 2, [1.0, 1.0, 1.0])).unwrap();
    assert_eq!(map.texels.len(), 16);
}
