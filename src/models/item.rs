use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One node of an exploration tree.
///
/// Items are compiled by the pipeline and then treated as immutable values;
/// the only change an item sees after compilation is gaining children, and
/// even that produces a new value (see [`crate::tree::attach_child`]).
///
/// # Lineage
/// `root_id` names the top-level ancestor (an item's own id when it is a
/// root), `parent_id` is `None` only for roots, and `depth` counts ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub root_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub images: Option<ImageSet>,
    #[serde(default)]
    pub parts: Vec<Part>,
    pub depth: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub children: Vec<Item>,
}

impl Item {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A labelled attribute such as "Weight: 1.2 kg".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub label: String,
    pub value: String,
}

/// A component located on the exploded view.
///
/// Coordinates are percentages of the image size, origin top-left:
/// `x = 0` is the left edge and `y = 0` the top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub x: f32,
    pub y: f32,
}

/// Generated views of an item.
///
/// `exploded` is the view parts are located on. In fast mode it is the only
/// view produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutaway: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploded: Option<Image>,
}

/// An inline image encoded as a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Image(String);

impl Image {
    /// Wrap raw bytes with the given MIME type.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("data:{};base64,{}", mime_type, encoded))
    }

    /// Wrap an already-encoded base64 payload.
    pub fn from_base64(mime_type: &str, data: &str) -> Self {
        Self(format!("data:{};base64,{}", mime_type, data))
    }

    /// Accept a `data:` URL, rejecting anything that is not base64-encoded.
    pub fn from_data_url(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let image = Self(url);
        image.parts()?;
        Some(image)
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.parts().map(|(mime, _)| mime)
    }

    /// The base64 payload without the `data:` prefix.
    pub fn base64_data(&self) -> Option<&str> {
        self.parts().map(|(_, data)| data)
    }

    fn parts(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        if mime.is_empty() {
            return None;
        }
        Some((mime, data))
    }
}

/// Collection listing entry, without images or children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    /// Items in the tree, root included.
    pub item_count: usize,
}

impl From<&Item> for ExplorationSummary {
    fn from(root: &Item) -> Self {
        Self {
            id: root.id,
            name: root.name.clone(),
            category: root.category.clone(),
            timestamp: root.timestamp,
            item_count: crate::tree::count_items(root),
        }
    }
}
