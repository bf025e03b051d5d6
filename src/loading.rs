//! Asynchronous asset sequencing.
//!
//! [`load_assets`] runs the whole loading chain as one task: the environment
//! panorama first, then (only once it is decoded) the three models
//! concurrently. Each model is precompiled before it is announced, so the
//! scene never sees a model whose GPU resources are not ready yet.
//!
//! The task never touches the scene. It reports progress as [`AssetEvent`]s
//! through an [`AssetSink`]; the owner of the scene applies them on its own
//! thread. Failures are events too, so nothing is silently dropped.
//!
//! # Key types
//!
//! - [`ModelSlot`] names the three model slots
//! - [`LoadState`] / [`LoadTracker`] record where every asset is in its lifecycle
//! - [`AssetEvent`] is the message type of the observable event channel
//! - [`Precompile`] is the seam where GPU upload plugs in

use std::{fmt, future::Future, sync::Arc};

use anyhow::Context;
use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    config::AssetManifest,
    data_structures::fragment::ModelFragment,
    resources::{AssetSource, EnvironmentMap, load_environment, load_model_gltf},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelSlot {
    Character,
    Barrel,
    Shoe,
}

impl ModelSlot {
    pub const ALL: [ModelSlot; 3] = [ModelSlot::Character, ModelSlot::Barrel, ModelSlot::Shoe];
}

impl fmt::Display for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelSlot::Character => "character",
            ModelSlot::Barrel => "barrel",
            ModelSlot::Shoe => "shoe",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetId {
    Environment,
    Model(ModelSlot),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Environment => f.write_str("environment"),
            AssetId::Model(slot) => write!(f, "{} model", slot),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    NotRequested,
    Loading,
    Ready,
    Failed(String),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed(_))
    }
}

/// Progress messages from the loading task.
pub enum AssetEvent<C> {
    /// The load of `AssetId` is about to be issued.
    Requested(AssetId),
    EnvironmentReady(Arc<EnvironmentMap>),
    /// A model finished loading and precompiling.
    ModelReady {
        slot: ModelSlot,
        model: ModelFragment,
        compiled: C,
    },
    Failed {
        asset: AssetId,
        error: anyhow::Error,
    },
}

impl<C> fmt::Debug for AssetEvent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested(asset) => f.debug_tuple("Requested").field(asset).finish(),
            Self::EnvironmentReady(map) => f
                .debug_struct("EnvironmentReady")
                .field("width", &map.width)
                .field("height", &map.height)
                .finish(),
            Self::ModelReady { slot, model, .. } => f
                .debug_struct("ModelReady")
                .field("slot", slot)
                .field("model", &model.name)
                .finish(),
            Self::Failed { asset, error } => f
                .debug_struct("Failed")
                .field("asset", asset)
                .field("error", &format_args!("{:#}", error))
                .finish(),
        }
    }
}

/// Per-asset load states, plus a record of any model issued too early.
#[derive(Clone, Debug, Default)]
pub struct LoadTracker {
    environment: LoadState,
    models: [LoadState; 3],
    violations: Vec<ModelSlot>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_index(slot: ModelSlot) -> usize {
        match slot {
            ModelSlot::Character => 0,
            ModelSlot::Barrel => 1,
            ModelSlot::Shoe => 2,
        }
    }

    pub fn state(&self, asset: AssetId) -> &LoadState {
        match asset {
            AssetId::Environment => &self.environment,
            AssetId::Model(slot) => &self.models[Self::slot_index(slot)],
        }
    }

    fn state_mut(&mut self, asset: AssetId) -> &mut LoadState {
        match asset {
            AssetId::Environment => &mut self.environment,
            AssetId::Model(slot) => &mut self.models[Self::slot_index(slot)],
        }
    }

    pub fn mark_requested(&mut self, asset: AssetId) {
        if let AssetId::Model(slot) = asset {
            if self.environment != LoadState::Ready {
                log::error!("{} requested before the environment was ready", asset);
                self.violations.push(slot);
            }
        }
        *self.state_mut(asset) = LoadState::Loading;
    }

    pub fn mark_ready(&mut self, asset: AssetId) {
        *self.state_mut(asset) = LoadState::Ready;
    }

    pub fn mark_failed(&mut self, asset: AssetId, error: &anyhow::Error) {
        *self.state_mut(asset) = LoadState::Failed(format!("{:#}", error));
    }

    /// Update the states from an event on the asset channel.
    pub fn observe<C>(&mut self, event: &AssetEvent<C>) {
        match event {
            AssetEvent::Requested(asset) => self.mark_requested(*asset),
            AssetEvent::EnvironmentReady(_) => self.mark_ready(AssetId::Environment),
            AssetEvent::ModelReady { slot, .. } => self.mark_ready(AssetId::Model(*slot)),
            AssetEvent::Failed { asset, error } => self.mark_failed(*asset, error),
        }
    }

    /// Model slots that were requested while the environment was not ready.
    pub fn ordering_violations(&self) -> &[ModelSlot] {
        &self.violations
    }

    /// No load is in flight and none will be issued any more.
    pub fn is_settled(&self) -> bool {
        match &self.environment {
            LoadState::Failed(_) => self.models.iter().all(|m| *m != LoadState::Loading),
            LoadState::Ready => self.models.iter().all(LoadState::is_terminal),
            _ => false,
        }
    }

    pub fn ready_models(&self) -> impl Iterator<Item = ModelSlot> + '_ {
        ModelSlot::ALL
            .into_iter()
            .filter(|slot| self.models[Self::slot_index(*slot)] == LoadState::Ready)
    }

    pub fn summary(&self) -> String {
        let describe = |state: &LoadState| match state {
            LoadState::NotRequested => "not requested".to_string(),
            LoadState::Loading => "loading".to_string(),
            LoadState::Ready => "ready".to_string(),
            LoadState::Failed(e) => format!("failed ({})", e),
        };
        let mut parts = vec![format!("environment: {}", describe(&self.environment))];
        for slot in ModelSlot::ALL {
            parts.push(format!("{}: {}", slot, describe(&self.models[Self::slot_index(slot)])));
        }
        parts.join(", ")
    }
}

/// Receiver side of the asset channel as seen by the loading task.
pub trait AssetSink<C>: Send + 'static {
    /// Fails once nobody is listening any more.
    fn send(&self, event: AssetEvent<C>) -> anyhow::Result<()>;
}

impl<C: Send + 'static> AssetSink<C> for futures::channel::mpsc::UnboundedSender<AssetEvent<C>> {
    fn send(&self, event: AssetEvent<C>) -> anyhow::Result<()> {
        self.unbounded_send(event)
            .map_err(|_| anyhow::anyhow!("asset channel closed"))
    }
}

/// Turns a decoded model into whatever the renderer needs to draw it.
pub trait Precompile: Send + Sync + 'static {
    type Output: Send + 'static;

    fn precompile(&self, model: &ModelFragment) -> impl Future<Output = anyhow::Result<Self::Output>> + Send;
}

/// What happened to each asset, as seen by the loading task.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub ready: Vec<AssetId>,
    pub failed: Vec<AssetId>,
    /// Models never issued because the environment failed.
    pub skipped: Vec<ModelSlot>,
}

/// Load the environment, then all models concurrently, reporting through `sink`.
///
/// Model loads are issued only after the environment has been decoded and
/// announced. If the environment fails the models are skipped. Models finish
/// in whatever order their I/O completes.
pub async fn load_assets<S, P, K>(source: S, manifest: AssetManifest, precompiler: P, sink: K) -> LoadReport
where
    S: AssetSource,
    P: Precompile,
    K: AssetSink<P::Output>,
{
    let mut report = LoadReport::default();

    if let Err(e) = sink.send(AssetEvent::Requested(AssetId::Environment)) {
        log::warn!("Not loading assets: {}", e);
        return report;
    }
    let environment = match load_environment(&source, &manifest.environment).await {
        Ok(map) => Arc::new(map),
        Err(error) => {
            log::error!("Environment {} failed to load: {:#}", manifest.environment, error);
            report.failed.push(AssetId::Environment);
            report.skipped = manifest.models.iter().map(|(slot, _)| *slot).collect();
            let _ = sink.send(AssetEvent::Failed {
                asset: AssetId::Environment,
                error,
            });
            return report;
        }
    };
    if sink.send(AssetEvent::EnvironmentReady(environment)).is_err() {
        return report;
    }
    report.ready.push(AssetId::Environment);

    for (slot, _) in &manifest.models {
        if sink.send(AssetEvent::Requested(AssetId::Model(*slot))).is_err() {
            return report;
        }
    }

    let source = &source;
    let precompiler = &precompiler;
    let mut pending: FuturesUnordered<_> = manifest
        .models
        .iter()
        .map(|(slot, path)| async move {
            let result = async {
                let model = load_model_gltf(source, path).await?;
                let compiled = precompiler
                    .precompile(&model)
                    .await
                    .with_context(|| format!("failed to precompile {}", path))?;
                anyhow::Ok((model, compiled))
            }
            .await;
            (*slot, path, result)
        })
        .collect();

    while let Some((slot, path, result)) = pending.next().await {
        let asset = AssetId::Model(slot);
        let event = match result {
            Ok((model, compiled)) => {
                log::info!("{} ready ({})", asset, path);
                report.ready.push(asset);
                AssetEvent::ModelReady {
                    slot,
                    model,
                    compiled,
                }
            }
            Err(error) => {
                log::error!("{} failed to load from {}: {:#}", asset, path, error);
                report.failed.push(asset);
                AssetEvent::Failed { asset, error }
            }
        };
        if let Err(e) = sink.send(event) {
            log::warn!("Dropping remaining asset events: {}", e);
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_requested_early_is_a_violation() {
        let mut tracker = LoadTracker::new();
        tracker.mark_requested(AssetId::Environment);
        tracker.mark_requested(AssetId::Model(ModelSlot::Shoe));
        assert_eq!(tracker.ordering_violations(), &[ModelSlot::Shoe]);

        tracker.mark_ready(AssetId::Environment);
        tracker.mark_requested(AssetId::Model(ModelSlot::Barrel));
        assert_eq!(tracker.ordering_violations().len(), 1);
        assert_eq!(*tracker.state(AssetId::Model(ModelSlot::Barrel)), LoadState::Loading);
    }

    #[test]
    fn settles_once_every_issued_load_terminates() {
        let mut tracker = LoadTracker::new();
        assert!(!tracker.is_settled());
        tracker.mark_requested(AssetId::Environment);
        tracker.mark_ready(AssetId::Environment);
        for slot in ModelSlot::ALL {
            tracker.mark_requested(AssetId::Model(slot));
        }
        tracker.mark_ready(AssetId::Model(ModelSlot::Character));
        tracker.mark_failed(AssetId::Model(ModelSlot::Barrel), &anyhow::anyhow!("truncated"));
        assert!(!tracker.is_settled());
        tracker.mark_ready(AssetId::Model(ModelSlot::Shoe));
        assert!(tracker.is_settled());
        assert_eq!(
            tracker.ready_models().collect::<Vec<_>>(),
            vec![ModelSlot::Character, ModelSlot::Shoe]
        );
        assert!(tracker.summary().contains("barrel: failed (truncated)"));
    }

    #[test]
    fn failed_environment_settles_without_models() {
        let mut tracker = LoadTracker::new();
        tracker.mark_requested(AssetId::Environment);
        tracker.mark_failed(AssetId::Environment, &anyhow::anyhow!("404"));
        assert!(tracker.is_settled());
        assert_eq!(
            *tracker.state(AssetId::Model(ModelSlot::Character)),
            LoadState::NotRequested
        );
    }
}
