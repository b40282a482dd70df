//! The session controller.
//!
//! [`Explorer`] is the single owner of session state. Every user action runs
//! through it: explore requests are resolved from memory or sent through the
//! [`Pipeline`], results are merged with the reducer in [`state`], and the
//! affected root is written to storage by a detached task that the caller
//! never waits on.
//!
//! One explore request may be in flight at a time. A second one is rejected
//! with [`ExploreError::Busy`]; navigation and reads stay available meanwhile.

mod state;

pub use state::{Action, Effect, SessionState};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ai::AiCapability;
use crate::db::ItemStore;
use crate::error::{ExploreError, Result};
use crate::models::{GenerationConfig, GenerationStatus, Image, Item};
use crate::pipeline::{ExploreRequest, Pipeline};
use crate::tree;

/// Cheap-to-clone handle to one exploration session.
#[derive(Clone)]
pub struct Explorer {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<SessionState>,
    status: watch::Sender<GenerationStatus>,
    generating: AtomicBool,
    ai: RwLock<Option<Arc<dyn AiCapability>>>,
    config: GenerationConfig,
    store: Arc<dyn ItemStore>,
    /// Latest storage task per root. Each task waits for the one it replaced.
    pending_writes: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

/// Clears the in-flight flag when an explore request ends, however it ends.
struct GeneratingGuard<'a>(&'a AtomicBool);

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Explorer {
    /// Create a session with an empty collection. `ai = None` runs offline.
    pub fn new(
        store: Arc<dyn ItemStore>,
        ai: Option<Arc<dyn AiCapability>>,
        config: GenerationConfig,
    ) -> Self {
        let (status, _) = watch::channel(GenerationStatus::idle());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::default()),
                status,
                generating: AtomicBool::new(false),
                ai: RwLock::new(ai),
                config,
                store,
                pending_writes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a session and load the collection from storage.
    pub async fn open(
        store: Arc<dyn ItemStore>,
        ai: Option<Arc<dyn AiCapability>>,
        config: GenerationConfig,
    ) -> Self {
        let explorer = Self::new(store, ai, config);
        explorer.reload_collection().await;
        explorer
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn snapshot(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn current_item(&self) -> Option<Item> {
        self.lock_state().current_item.clone()
    }

    pub fn history(&self) -> Vec<Item> {
        self.lock_state().history.clone()
    }

    pub fn collection(&self) -> Vec<Item> {
        self.lock_state().collection.clone()
    }

    pub fn status(&self) -> GenerationStatus {
        self.lock_state().status.clone()
    }

    /// Follow status changes as they are committed.
    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_generating(&self) -> bool {
        self.inner.generating.load(Ordering::Acquire)
    }

    pub fn is_offline(&self) -> bool {
        self.capability().is_none()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.inner.config
    }

    // ============================================================
    // Actions
    // ============================================================

    /// Explore `query`, as a new root or as a part of `parent_id`.
    ///
    /// With a parent, an existing child whose name contains the query (or is
    /// contained by it) is reused without generating anything. Otherwise the
    /// pipeline runs, which needs an AI capability.
    pub async fn explore(
        &self,
        query: &str,
        parent_id: Option<Uuid>,
        reference_image: Option<Image>,
    ) -> Result<Item> {
        let _guard = self.begin()?;

        let (lineage, depth) = match parent_id {
            Some(parent_id) => {
                let hit = self.lock_state().memory_hit(parent_id, query);
                match hit {
                    Ok(Some(target)) => {
                        tracing::info!("Memory hit for '{}' under {}", query, parent_id);
                        self.dispatch(Action::MemoryHit { target })?;
                        return self.current_item().ok_or(ExploreError::NotFound(target));
                    }
                    Ok(None) => {}
                    Err(e) => return Err(self.fail(e)),
                }
                let lineage = self.lock_state().lineage(parent_id);
                match lineage {
                    Ok(lineage) => lineage,
                    Err(e) => return Err(self.fail(e)),
                }
            }
            None => (Vec::new(), 0),
        };

        let Some(ai) = self.capability() else {
            return Err(self.fail(ExploreError::OfflineBlocked));
        };

        let request = ExploreRequest {
            query: query.to_string(),
            lineage,
            reference_image,
            depth,
        };
        let pipeline = Pipeline::new(ai, self.inner.config.clone());
        let progress = |status: GenerationStatus| {
            if let Err(e) = self.dispatch(Action::Progress(status)) {
                tracing::warn!("Dropped progress update: {}", e);
            }
        };

        let item = match pipeline.run(request, &progress).await {
            Ok(item) => item,
            Err(e) => return Err(self.fail(e)),
        };
        let item_id = item.id;

        let effect = match self.dispatch(Action::Compiled { item, parent_id }) {
            Ok(effect) => effect,
            Err(e) => return Err(self.fail(e)),
        };
        self.run_effect(effect);

        self.current_item().ok_or(ExploreError::NotFound(item_id))
    }

    /// Move to another item of the tree being viewed (or any stored tree).
    pub fn navigate_to(&self, id: Uuid) -> Result<Item> {
        self.dispatch(Action::Navigate(id))?;
        self.current_item().ok_or(ExploreError::NotFound(id))
    }

    /// Open the stored exploration holding `id`, positioned at that item.
    ///
    /// Only the session moves; the collection is left as it is.
    pub fn load_exploration(&self, id: Uuid) -> Result<Item> {
        self.dispatch(Action::Load(id))?;
        self.current_item().ok_or(ExploreError::NotFound(id))
    }

    /// Open a stored exploration at its root.
    pub fn open_exploration(&self, id: Uuid) -> Result<Item> {
        let is_root = self.lock_state().collection.iter().any(|root| root.id == id);
        if !is_root {
            return Err(ExploreError::NotFound(id));
        }
        self.load_exploration(id)
    }

    /// Delete a root with its whole tree from the collection and storage.
    ///
    /// Returns whether the root was in the collection. Deleting the active
    /// root resets the session.
    pub async fn remove_exploration(&self, id: Uuid) -> bool {
        let existed = self.lock_state().collection.iter().any(|root| root.id == id);
        // A save still in flight would bring the root back.
        self.settle().await;
        match self.dispatch(Action::Remove(id)) {
            Ok(Effect::Delete(id)) => self.delete_from_store(id).await,
            Ok(_) => {}
            Err(e) => tracing::warn!("Remove failed: {}", e),
        }
        existed
    }

    /// Return to idle, leaving the collection as it is.
    pub fn reset(&self) {
        if let Err(e) = self.dispatch(Action::Reset) {
            tracing::warn!("Reset failed: {}", e);
        }
    }

    /// Connect or disconnect the AI capability.
    pub fn set_capability(&self, ai: Option<Arc<dyn AiCapability>>) {
        *self.inner.ai.write().expect("capability lock poisoned") = ai;
    }

    /// Every root in the collection.
    pub fn export_all(&self) -> Vec<Item> {
        self.collection()
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export_all())
            .map_err(|e| ExploreError::PersistenceFailed(e.to_string()))
    }

    /// Parse an export and import it.
    pub async fn import_json(&self, json: &str) -> Result<usize> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ExploreError::ImportMalformed(format!("not JSON: {}", e)))?;
        if !value.is_array() {
            return Err(ExploreError::ImportMalformed(
                "expected an array of explorations".to_string(),
            ));
        }
        let items: Vec<Item> = serde_json::from_value(value)
            .map_err(|e| ExploreError::ImportMalformed(e.to_string()))?;
        self.import_all(items).await
    }

    /// Write roots to storage, then reload the collection from storage.
    ///
    /// Every tree is validated first; one invalid tree rejects the whole
    /// import. Imported roots replace stored roots with the same id, and no
    /// item id may be shared with another tree.
    pub async fn import_all(&self, items: Vec<Item>) -> Result<usize> {
        let count = items.len();

        // Earlier saves must not land on top of the imported data.
        self.settle().await;

        tree::validate_forest(&items, &self.collection())
            .map_err(ExploreError::ImportMalformed)?;

        let store = self.inner.store.clone();
        match tokio::task::spawn_blocking(move || store.bulk_put(&items)).await {
            Ok(Ok(())) => tracing::info!("Imported {} explorations", count),
            Ok(Err(e)) => tracing::error!("{}", ExploreError::PersistenceFailed(e.to_string())),
            Err(e) => tracing::error!("Import task failed: {}", e),
        }

        self.reload_collection().await;
        Ok(count)
    }

    /// Replace the collection with the stored roots.
    pub async fn reload_collection(&self) -> Vec<Item> {
        let store = self.inner.store.clone();
        match tokio::task::spawn_blocking(move || store.get_all()).await {
            Ok(Ok(items)) => {
                if let Err(e) = self.dispatch(Action::CollectionLoaded(items)) {
                    tracing::warn!("Collection reload failed: {}", e);
                }
            }
            Ok(Err(e)) => tracing::error!("{}", ExploreError::PersistenceFailed(e.to_string())),
            Err(e) => tracing::error!("Load task failed: {}", e),
        }
        self.collection()
    }

    /// Wait for every save issued so far.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self
                .inner
                .pending_writes
                .lock()
                .expect("pending writes lock poisoned");
            pending.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Save task failed: {}", e);
            }
        }
    }

    // ============================================================
    // Internals
    // ============================================================

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner.state.lock().expect("session lock poisoned")
    }

    fn capability(&self) -> Option<Arc<dyn AiCapability>> {
        self.inner
            .ai
            .read()
            .expect("capability lock poisoned")
            .clone()
    }

    fn begin(&self) -> Result<GeneratingGuard<'_>> {
        self.inner
            .generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExploreError::Busy)?;
        Ok(GeneratingGuard(&self.inner.generating))
    }

    /// Apply one action and publish the resulting status.
    fn dispatch(&self, action: Action) -> Result<Effect> {
        let mut state = self.lock_state();
        let effect = state.apply(action)?;
        self.inner.status.send_replace(state.status.clone());
        Ok(effect)
    }

    /// Record a failed request as the terminal `error` status.
    fn fail(&self, error: ExploreError) -> ExploreError {
        tracing::error!("Exploration failed: {}", error);
        if let Err(e) = self.dispatch(Action::Failed(error.to_string())) {
            tracing::warn!("Could not record failure: {}", e);
        }
        error
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Persist(root) => self.persist_detached(root),
            Effect::Delete(id) => {
                let store = self.inner.store.clone();
                self.chain(id, move |previous| async move {
                    await_previous(previous).await;
                    delete_blocking(store, id).await;
                });
            }
        }
    }

    /// Save a root without making the caller wait for it.
    ///
    /// Saves of one root land in the order they were issued.
    fn persist_detached(&self, root: Item) {
        let store = self.inner.store.clone();
        self.chain(root.id, move |previous| async move {
            await_previous(previous).await;
            let id = root.id;
            let name = root.name.clone();
            match tokio::task::spawn_blocking(move || store.put(&root)).await {
                Ok(Ok(())) => tracing::info!("Saved exploration '{}' ({})", name, id),
                Ok(Err(e)) => {
                    tracing::error!("{}", ExploreError::PersistenceFailed(e.to_string()))
                }
                Err(e) => tracing::error!("Save task for {} failed: {}", id, e),
            }
        });
    }

    async fn delete_from_store(&self, id: Uuid) {
        delete_blocking(self.inner.store.clone(), id).await;
    }

    /// Spawn storage work for `root_id` behind the task already queued for it.
    fn chain<F, Fut>(&self, root_id: Uuid, work: F)
    where
        F: FnOnce(Option<JoinHandle<()>>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut pending = self
            .inner
            .pending_writes
            .lock()
            .expect("pending writes lock poisoned");
        pending.retain(|_, handle| !handle.is_finished());
        let previous = pending.remove(&root_id);
        pending.insert(root_id, tokio::spawn(work(previous)));
    }
}

async fn await_previous(previous: Option<JoinHandle<()>>) {
    if let Some(handle) = previous {
        if let Err(e) = handle.await {
            tracing::error!("Earlier save task failed: {}", e);
        }
    }
}

async fn delete_blocking(store: Arc<dyn ItemStore>, id: Uuid) {
    match tokio::task::spawn_blocking(move || store.delete(id)).await {
        Ok(Ok(_)) => tracing::info!("Deleted exploration {}", id),
        Ok(Err(e)) => tracing::error!("{}", ExploreError::PersistenceFailed(e.to_string())),
        Err(e) => tracing::error!("Delete task for {} failed: {}", id, e),
    }
}
