//! The session reducer.
//!
//! [`SessionState`] changes only through [`SessionState::apply`]. Each
//! [`Action`] is applied synchronously and may ask the caller to perform one
//! storage [`Effect`] afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExploreError, Result};
use crate::models::{GenerationStage, GenerationStatus, Item};
use crate::tree;

/// Everything the rendering surface reads.
///
/// `history` runs from the active root to `current_item`; it is empty exactly
/// when `current_item` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_item: Option<Item>,
    pub history: Vec<Item>,
    pub collection: Vec<Item>,
    pub status: GenerationStatus,
}

/// A named state transition.
#[derive(Debug, Clone)]
pub enum Action {
    /// The pipeline reported progress.
    Progress(GenerationStatus),
    /// The request failed; the message is shown to the user.
    Failed(String),
    /// An explore request resolved to an existing item.
    MemoryHit { target: Uuid },
    /// The pipeline compiled `item`; attach it under `parent_id` or make it a root.
    Compiled { item: Item, parent_id: Option<Uuid> },
    /// Move within the active tree.
    Navigate(Uuid),
    /// Open the stored tree holding this id, at that item.
    Load(Uuid),
    /// Delete a root and its tree.
    Remove(Uuid),
    /// Leave the current tree and clear any error.
    Reset,
    /// Replace the collection with what storage holds.
    CollectionLoaded(Vec<Item>),
}

/// Storage work requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Persist(Item),
    Delete(Uuid),
}

impl SessionState {
    pub fn with_collection(collection: Vec<Item>) -> Self {
        Self {
            collection,
            ..Default::default()
        }
    }

    /// The root of the tree being viewed.
    pub fn active_root(&self) -> Option<&Item> {
        self.history.first()
    }

    /// Find the root holding `id`, preferring the active tree.
    pub fn root_containing(&self, id: Uuid) -> Option<&Item> {
        self.active_root()
            .filter(|root| tree::contains(root, id))
            .or_else(|| self.collection.iter().find(|root| tree::contains(root, id)))
    }

    /// Names from the root down to `parent_id`, and the depth below it.
    pub fn lineage(&self, parent_id: Uuid) -> Result<(Vec<String>, u32)> {
        let root = self
            .root_containing(parent_id)
            .ok_or(ExploreError::NotFound(parent_id))?;
        let path = tree::find_path(root, parent_id).ok_or(ExploreError::NotFound(parent_id))?;
        let depth = path.last().map(|parent| parent.depth + 1).unwrap_or(0);
        Ok((path.into_iter().map(|item| item.name).collect(), depth))
    }

    /// An existing child of `parent_id` that already answers `query`.
    pub fn memory_hit(&self, parent_id: Uuid, query: &str) -> Result<Option<Uuid>> {
        let root = self
            .root_containing(parent_id)
            .ok_or(ExploreError::NotFound(parent_id))?;
        let parent = tree::find_item(root, parent_id).ok_or(ExploreError::NotFound(parent_id))?;
        Ok(tree::find_child_matching(parent, query).map(|child| child.id))
    }

    pub fn apply(&mut self, action: Action) -> Result<Effect> {
        match action {
            Action::Progress(status) => {
                self.status = status;
                Ok(Effect::None)
            }
            Action::Failed(message) => {
                self.status = GenerationStatus::error(message);
                Ok(Effect::None)
            }
            Action::MemoryHit { target } => {
                self.navigate(target)?;
                let name = self
                    .current_item
                    .as_ref()
                    .map(|item| item.name.clone())
                    .unwrap_or_default();
                self.status = GenerationStatus::new(
                    GenerationStage::Complete,
                    format!("Found {} in this exploration", name),
                );
                Ok(Effect::None)
            }
            Action::Compiled { item, parent_id } => self.compiled(item, parent_id),
            Action::Navigate(target) => {
                self.navigate(target)?;
                Ok(Effect::None)
            }
            Action::Load(id) => {
                let root = self
                    .collection
                    .iter()
                    .find(|root| tree::contains(root, id))
                    .ok_or(ExploreError::NotFound(id))?;
                let path = tree::find_path(root, id).ok_or(ExploreError::NotFound(id))?;
                self.current_item = path.last().cloned();
                self.history = path;
                self.status = GenerationStatus::idle();
                Ok(Effect::None)
            }
            Action::Remove(id) => {
                self.collection = tree::remove_root(&self.collection, id);
                if self.active_root().map(|root| root.id) == Some(id) {
                    self.clear();
                }
                Ok(Effect::Delete(id))
            }
            Action::Reset => {
                self.clear();
                Ok(Effect::None)
            }
            Action::CollectionLoaded(collection) => {
                self.collection = collection;
                self.refresh_history();
                Ok(Effect::None)
            }
        }
    }

    fn compiled(&mut self, mut item: Item, parent_id: Option<Uuid>) -> Result<Effect> {
        let root = match parent_id {
            Some(parent_id) => {
                let root = self
                    .root_containing(parent_id)
                    .ok_or(ExploreError::NotFound(parent_id))?;
                let parent =
                    tree::find_item(root, parent_id).ok_or(ExploreError::NotFound(parent_id))?;

                item.root_id = root.id;
                item.parent_id = Some(parent_id);
                item.depth = parent.depth + 1;
                item.children.clear();

                let new_root = tree::attach_child(root, parent_id, item.clone());
                self.history =
                    tree::find_path(&new_root, item.id).ok_or(ExploreError::NotFound(item.id))?;
                new_root
            }
            None => {
                item.root_id = item.id;
                item.parent_id = None;
                item.depth = 0;
                self.history = vec![item.clone()];
                item.clone()
            }
        };

        self.collection = tree::upsert_root(&self.collection, root.clone());
        self.status = GenerationStatus::new(
            GenerationStage::Complete,
            format!("Explored {}", item.name),
        );
        self.current_item = Some(item);
        Ok(Effect::Persist(root))
    }

    fn navigate(&mut self, target: Uuid) -> Result<()> {
        let root = self
            .root_containing(target)
            .ok_or(ExploreError::NotFound(target))?;
        let path = tree::find_path(root, target).ok_or(ExploreError::NotFound(target))?;
        self.current_item = path.last().cloned();
        self.history = path;
        Ok(())
    }

    /// Re-derive `history` after the collection changed underneath it.
    fn refresh_history(&mut self) {
        let (Some(root_id), Some(current_id)) = (
            self.active_root().map(|root| root.id),
            self.current_item.as_ref().map(|item| item.id),
        ) else {
            return;
        };

        let path = self
            .collection
            .iter()
            .find(|root| root.id == root_id)
            .and_then(|root| tree::find_path(root, current_id));
        match path {
            Some(path) => {
                self.current_item = path.last().cloned();
                self.history = path;
            }
            None => self.clear(),
        }
    }

    fn clear(&mut self) {
        self.current_item = None;
        self.history.clear();
        self.status = GenerationStatus::idle();
    }
}
