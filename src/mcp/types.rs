//! Request and response types for MCP tools.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::Item;

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExploreRequest {
    #[schemars(description = "What to break down, e.g. 'Mechanical watch' or a part name like 'Escapement'")]
    pub query: String,
    #[schemars(
        description = "UUID of the item this is a part of. Omit to start a new exploration."
    )]
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NavigateRequest {
    #[schemars(description = "UUID of an item in a stored exploration")]
    pub item_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenderTreeRequest {
    #[schemars(
        description = "UUID of the exploration root to render. Defaults to the exploration being viewed."
    )]
    #[serde(default)]
    pub root_id: Option<String>,
}

// ============================================================
// Response Types
// ============================================================

/// An item without its images, sized for a tool response.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ItemInfo {
    pub id: String,
    pub root_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    pub depth: u32,
    pub facts: Vec<String>,
    pub characteristics: Vec<CharacteristicInfo>,
    /// Components that can be explored next
    pub parts: Vec<PartInfo>,
    /// Names of parts already explored
    pub explored_parts: Vec<String>,
    /// Which generated views exist
    pub views: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CharacteristicInfo {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PartInfo {
    pub name: String,
    pub description: String,
    /// Horizontal position on the exploded view, 0-100 from the left
    pub x: f32,
    /// Vertical position on the exploded view, 0-100 from the top
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CurrentItemResponse {
    /// Names from the exploration root down to the current item
    pub breadcrumb: Vec<String>,
    pub item: Option<ItemInfo>,
    pub stage: String,
    pub message: String,
}

impl From<&Item> for ItemInfo {
    fn from(item: &Item) -> Self {
        let mut views = Vec::new();
        if let Some(images) = &item.images {
            if images.assembled.is_some() {
                views.push("assembled".to_string());
            }
            if images.cutaway.is_some() {
                views.push("cutaway".to_string());
            }
            if images.exploded.is_some() {
                views.push("exploded".to_string());
            }
        }

        Self {
            id: item.id.to_string(),
            root_id: item.root_id.to_string(),
            parent_id: item.parent_id.map(|id| id.to_string()),
            name: item.name.clone(),
            category: item.category.clone(),
            description: item.description.clone(),
            depth: item.depth,
            facts: item.facts.clone(),
            characteristics: item
                .characteristics
                .iter()
                .map(|c| CharacteristicInfo {
                    label: c.label.clone(),
                    value: c.value.clone(),
                })
                .collect(),
            parts: item
                .parts
                .iter()
                .map(|p| PartInfo {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    x: p.x,
                    y: p.y,
                })
                .collect(),
            explored_parts: item.children.iter().map(|c| c.name.clone()).collect(),
            views,
        }
    }
}
