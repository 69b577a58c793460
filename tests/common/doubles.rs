//! Scripted stand-ins for the pipeline's pluggable collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use citeline_core::dedup::ExternalRecordGateway;
use citeline_core::models::{CapabilitySnapshot, TrackedItem};
use citeline_core::orchestration::{
    CapabilityAnalyzer, HttpStatusError, StageExecutor, StageResolution, StageSuccess,
};
use citeline_core::state_machine::PipelineStage;

/// One scripted stage response
#[derive(Debug, Clone)]
pub enum StageScript {
    Succeed(StageResolution),
    /// Connectivity-style failure, classified as a network error
    FailNetwork(&'static str),
    /// Typed HTTP failure carried as a status code
    FailHttp(u16),
    /// Non-transient failure, classified as permanent
    FailPermanent(&'static str),
}

impl StageScript {
    fn produce(&self) -> anyhow::Result<StageSuccess> {
        match self {
            Self::Succeed(resolution) => Ok(StageSuccess::new(resolution.clone())),
            Self::FailNetwork(detail) => Err(anyhow::anyhow!("connection failed: {detail}")),
            Self::FailHttp(status) => {
                Err(HttpStatusError::new(*status, "upstream rejected the request").into())
            }
            Self::FailPermanent(detail) => Err(anyhow::anyhow!("unsupported: {detail}")),
        }
    }
}

/// Stage executor driven by per-item scripts.
///
/// Each call pops the front of the calling item's script; items without one
/// fall back to the `otherwise` entry. Running dry settles the item with a
/// permanent failure instead of hanging the test.
pub struct ScriptedExecutor {
    stage: PipelineStage,
    plans: Mutex<HashMap<Uuid, VecDeque<StageScript>>>,
    fallback: Option<StageScript>,
    seen: Mutex<Vec<Uuid>>,
}

impl ScriptedExecutor {
    pub fn new(stage: PipelineStage) -> Self {
        Self {
            stage,
            plans: Mutex::new(HashMap::new()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Script every call for one item, in order
    #[must_use]
    pub fn for_item(self, item_id: Uuid, script: Vec<StageScript>) -> Self {
        self.plans.lock().insert(item_id, script.into());
        self
    }

    /// Response for any call without a matching script entry
    #[must_use]
    pub fn otherwise(mut self, script: StageScript) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Item ids in the order this executor saw them
    pub fn seen_order(&self) -> Vec<Uuid> {
        self.seen.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    fn stage(&self) -> PipelineStage {
        self.stage
    }

    async fn execute(&self, item: &TrackedItem) -> anyhow::Result<StageSuccess> {
        self.seen.lock().push(item.item_id);
        let next = self
            .plans
            .lock()
            .get_mut(&item.item_id)
            .and_then(VecDeque::pop_front);
        match next.or_else(|| self.fallback.clone()) {
            Some(script) => script.produce(),
            None => Err(anyhow::anyhow!(
                "unsupported: no scripted response left for item {}",
                item.item_id
            )),
        }
    }
}

/// Executor that links every item under a key derived from its id, so
/// batch tests get distinct external records without scripting.
pub struct LinkingExecutor {
    stage: PipelineStage,
}

impl LinkingExecutor {
    pub fn new(stage: PipelineStage) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageExecutor for LinkingExecutor {
    fn stage(&self) -> PipelineStage {
        self.stage
    }

    async fn execute(&self, item: &TrackedItem) -> anyhow::Result<StageSuccess> {
        Ok(StageSuccess::new(StageResolution::Linked {
            external_key: generated_key(item.item_id),
            complete: true,
            created: true,
        }))
    }
}

/// Executor that parks each call on a gate until the test releases it.
///
/// Entry is announced on the channel before parking, so a test can hold a
/// worker mid-item: wait for the announcement, flip batch controls, then
/// release the gate with `add_permits`.
pub struct GatedExecutor {
    stage: PipelineStage,
    entered: mpsc::UnboundedSender<Uuid>,
    gate: Arc<Semaphore>,
}

impl GatedExecutor {
    pub fn new(
        stage: PipelineStage,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Uuid>, Arc<Semaphore>) {
        let (entered, entries) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        let executor = Arc::new(Self {
            stage,
            entered,
            gate: Arc::clone(&gate),
        });
        (executor, entries, gate)
    }
}

#[async_trait]
impl StageExecutor for GatedExecutor {
    fn stage(&self) -> PipelineStage {
        self.stage
    }

    async fn execute(&self, item: &TrackedItem) -> anyhow::Result<StageSuccess> {
        let _ = self.entered.send(item.item_id);
        match self.gate.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => anyhow::bail!("unsupported: gate closed while waiting"),
        }
        Ok(StageSuccess::new(StageResolution::Linked {
            external_key: generated_key(item.item_id),
            complete: true,
            created: true,
        }))
    }
}

/// Analyzer that reports the same snapshot for every item
pub struct FixedAnalyzer(pub CapabilitySnapshot);

#[async_trait]
impl CapabilityAnalyzer for FixedAnalyzer {
    async fn analyze(&self, _item: &TrackedItem) -> CapabilitySnapshot {
        self.0
    }
}

/// Gateway double that records deletions and can refuse chosen keys
#[derive(Default)]
pub struct RecordingGateway {
    deleted: Mutex<Vec<String>>,
    refuse: HashSet<String>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(keys: &[&str]) -> Self {
        Self {
            deleted: Mutex::new(Vec::new()),
            refuse: keys.iter().map(|key| (*key).to_string()).collect(),
        }
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ExternalRecordGateway for RecordingGateway {
    async fn delete_record(&self, external_key: &str) -> anyhow::Result<()> {
        if self.refuse.contains(external_key) {
            anyhow::bail!("reference manager refused to delete '{external_key}'");
        }
        self.deleted.lock().push(external_key.to_string());
        Ok(())
    }
}

/// External key a [`LinkingExecutor`] or [`GatedExecutor`] produces for an item
pub fn generated_key(item_id: Uuid) -> String {
    format!("GEN-{}", item_id.simple())
}
