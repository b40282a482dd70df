//! Shared fixtures: a scripted AI capability and storage helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use teardown::ai::{AiCapability, AiError, AnalysisResult, DetectedPart};
use teardown::db::{Database, ItemStore};
use teardown::models::*;
use teardown::session::Explorer;
use tokio::sync::Notify;
use uuid::Uuid;

/// Which view a generation prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Assembled,
    Cutaway,
    Exploded,
}

impl View {
    fn of_prompt(prompt: &str) -> Self {
        if prompt.starts_with("A cutaway") {
            View::Cutaway
        } else if prompt.starts_with("An exploded-view") {
            View::Exploded
        } else {
            View::Assembled
        }
    }

    fn label(&self) -> &'static str {
        match self {
            View::Assembled => "assembled",
            View::Cutaway => "cutaway",
            View::Exploded => "exploded",
        }
    }
}

/// The image [`FakeAi`] renders for a view.
pub fn rendered(view: View) -> Image {
    Image::from_bytes("image/png", view.label().as_bytes())
}

/// In-process [`AiCapability`] with scripted answers.
///
/// Analysis names the object after the first segment of the query, so
/// "Engine from Car" is analyzed as "Engine". Parts come from
/// [`FakeAi::with_parts`] or a generic default list.
pub struct FakeAi {
    identified: Mutex<Option<String>>,
    parts: Mutex<HashMap<String, Vec<String>>>,
    failing_views: Mutex<Vec<View>>,
    detections: Mutex<Option<Vec<DetectedPart>>>,
    fail_analysis: AtomicBool,
    detect: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
    render_delay: Duration,

    pub queries: Mutex<Vec<String>>,
    pub views: Mutex<Vec<View>>,
    pub detected_for: Mutex<Vec<Vec<String>>>,
    pub analyze_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Default for FakeAi {
    fn default() -> Self {
        Self {
            identified: Mutex::new(None),
            parts: Mutex::new(HashMap::new()),
            failing_views: Mutex::new(Vec::new()),
            detections: Mutex::new(None),
            fail_analysis: AtomicBool::new(false),
            detect: AtomicBool::new(true),
            gate: Mutex::new(None),
            render_delay: Duration::from_millis(20),
            queries: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            detected_for: Mutex::new(Vec::new()),
            analyze_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeAi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_parts(&self, name: &str, parts: &[&str]) {
        self.parts.lock().unwrap().insert(
            name.to_lowercase(),
            parts.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn identifies_as(&self, name: &str) {
        *self.identified.lock().unwrap() = Some(name.to_string());
    }

    pub fn fail_analysis(&self) {
        self.fail_analysis.store(true, Ordering::SeqCst);
    }

    pub fn fail_view(&self, view: View) {
        self.failing_views.lock().unwrap().push(view);
    }

    pub fn disable_detection(&self) {
        self.detect.store(false, Ordering::SeqCst);
    }

    pub fn detections(&self, detections: Vec<DetectedPart>) {
        *self.detections.lock().unwrap() = Some(detections);
    }

    /// Hold every analysis until the returned handle is notified.
    pub fn hold_analysis(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst) + self.image_calls.load(Ordering::SeqCst)
    }

    fn default_parts(name: &str) -> Vec<String> {
        vec![
            format!("{} Housing", name),
            format!("{} Core", name),
            "Fastener".to_string(),
            "Seal".to_string(),
            "Spring".to_string(),
        ]
    }
}

#[async_trait]
impl AiCapability for FakeAi {
    async fn identify_object(&self, _image: &Image) -> Result<String, AiError> {
        self.identified
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AiError::Api("nothing recognized".to_string()))
    }

    async fn analyze(
        &self,
        query: &str,
        _config: &GenerationConfig,
    ) -> Result<AnalysisResult, AiError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_analysis.load(Ordering::SeqCst) {
            return Err(AiError::Malformed("missing field `name`".to_string()));
        }

        let name = query.split(" from ").next().unwrap_or(query).trim().to_string();
        let part_names = self
            .parts
            .lock()
            .unwrap()
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| Self::default_parts(&name));

        Ok(AnalysisResult {
            category: "Test Object".to_string(),
            description: format!("A {} for testing.", name),
            part_names,
            facts: vec![
                format!("{} fact one", name),
                format!("{} fact two", name),
                format!("{} fact three", name),
            ],
            characteristics: vec![Characteristic {
                label: "Material".to_string(),
                value: "Steel".to_string(),
            }],
            name,
        })
    }

    async fn generate_image(&self, prompt: &str, _reference: Option<&Image>) -> Option<Image> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let view = View::of_prompt(prompt);
        self.views.lock().unwrap().push(view);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.render_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_views.lock().unwrap().contains(&view) {
            return None;
        }
        Some(rendered(view))
    }

    async fn detect_coordinates(&self, _image: &Image, part_names: &[String]) -> Vec<DetectedPart> {
        self.detected_for.lock().unwrap().push(part_names.to_vec());
        if !self.detect.load(Ordering::SeqCst) {
            return Vec::new();
        }
        if let Some(scripted) = self.detections.lock().unwrap().clone() {
            return scripted;
        }
        part_names
            .iter()
            .enumerate()
            .map(|(i, name)| DetectedPart {
                name: name.clone(),
                description: format!("The {}", name.to_lowercase()),
                x: 10.0 * (i + 1) as f32,
                y: 20.0,
            })
            .collect()
    }
}

/// A store whose writes always fail.
pub struct FailingStore;

impl ItemStore for FailingStore {
    fn put(&self, _item: &Item) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn bulk_put(&self, _items: &[Item]) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn delete(&self, _id: Uuid) -> anyhow::Result<bool> {
        anyhow::bail!("disk full")
    }

    fn get(&self, _id: Uuid) -> anyhow::Result<Option<Item>> {
        Ok(None)
    }

    fn get_all(&self) -> anyhow::Result<Vec<Item>> {
        Ok(Vec::new())
    }
}

/// Delegates to a database, holding back saves of trees without children.
///
/// An early save of a root then finishes after a later save of the same root
/// unless the saves are ordered.
pub struct SlowLeafStore {
    pub db: Arc<Database>,
}

impl ItemStore for SlowLeafStore {
    fn put(&self, item: &Item) -> anyhow::Result<()> {
        if item.children.is_empty() {
            std::thread::sleep(Duration::from_millis(150));
        }
        self.db.put(item)
    }

    fn bulk_put(&self, items: &[Item]) -> anyhow::Result<()> {
        self.db.bulk_put(items)
    }

    fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        self.db.delete(id)
    }

    fn get(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        self.db.get(id)
    }

    fn get_all(&self) -> anyhow::Result<Vec<Item>> {
        self.db.get_all()
    }
}

pub fn memory_db() -> Arc<Database> {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    Arc::new(db)
}

/// An explorer over an in-memory database, generating with `ai`.
pub async fn explorer(ai: &Arc<FakeAi>, mode: GenerationMode) -> (Explorer, Arc<Database>) {
    let db = memory_db();
    let capability: Arc<dyn AiCapability> = ai.clone();
    let explorer = Explorer::open(db.clone(), Some(capability), GenerationConfig::with_mode(mode)).await;
    (explorer, db)
}

/// An explorer over `db` with no AI capability.
pub async fn offline_explorer(db: Arc<Database>) -> Explorer {
    Explorer::open(db, None, GenerationConfig::default()).await
}

/// A bare item, its own root.
pub fn item(name: &str) -> Item {
    let id = Uuid::new_v4();
    Item {
        id,
        root_id: id,
        parent_id: None,
        name: name.to_string(),
        category: String::new(),
        description: String::new(),
        facts: vec![],
        characteristics: vec![],
        images: None,
        parts: vec![],
        depth: 0,
        timestamp: chrono::Utc::now(),
        children: vec![],
    }
}

/// `child` attached under `parent`, with links and depth set.
pub fn child_of(parent: &Item, name: &str) -> Item {
    let mut child = item(name);
    child.root_id = parent.root_id;
    child.parent_id = Some(parent.id);
    child.depth = parent.depth + 1;
    child
}
