//! Operations on exploration trees and the collection of roots.
//!
//! Trees are values. Every mutation returns a new root with the spine from the
//! root down to the changed node rebuilt, so any `history` captured before
//! the change still describes the tree as it was.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::Item;

/// Return the chain of items from `root` down to `target`, both included.
pub fn find_path(root: &Item, target: Uuid) -> Option<Vec<Item>> {
    let mut path = Vec::new();
    if collect_path(root, target, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn collect_path(node: &Item, target: Uuid, path: &mut Vec<Item>) -> bool {
    path.push(node.clone());
    if node.id == target {
        return true;
    }
    for child in &node.children {
        if collect_path(child, target, path) {
            return true;
        }
    }
    path.pop();
    false
}

/// Borrow the node with id `target` anywhere under `root`.
pub fn find_item(root: &Item, target: Uuid) -> Option<&Item> {
    if root.id == target {
        return Some(root);
    }
    root.children
        .iter()
        .find_map(|child| find_item(child, target))
}

pub fn contains(root: &Item, target: Uuid) -> bool {
    find_item(root, target).is_some()
}

/// Return a new tree with `child` appended to the children of `parent_id`.
///
/// An existing child with the same id is replaced in place, so attaching the
/// same child twice is the same as attaching it once. If `parent_id` is not in
/// the tree the result equals `root`.
///
/// Callers set `depth`, `root_id` and `parent_id` on `child` before attaching.
pub fn attach_child(root: &Item, parent_id: Uuid, child: Item) -> Item {
    if !contains(root, parent_id) {
        return root.clone();
    }
    rebuild(root, parent_id, child)
}

fn rebuild(node: &Item, parent_id: Uuid, child: Item) -> Item {
    let mut rebuilt = node.clone_shallow();

    if node.id == parent_id {
        rebuilt.children = node.children.clone();
        match rebuilt.children.iter_mut().find(|c| c.id == child.id) {
            Some(existing) => *existing = child,
            None => rebuilt.children.push(child),
        }
        return rebuilt;
    }

    // Ids are unique, so exactly one child subtree holds the parent.
    let mut pending = Some(child);
    for existing in &node.children {
        if contains(existing, parent_id) {
            if let Some(child) = pending.take() {
                rebuilt.children.push(rebuild(existing, parent_id, child));
                continue;
            }
        }
        rebuilt.children.push(existing.clone());
    }
    rebuilt
}

impl Item {
    /// Clone everything except the children.
    fn clone_shallow(&self) -> Item {
        Item {
            id: self.id,
            root_id: self.root_id,
            parent_id: self.parent_id,
            name: self.name.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            facts: self.facts.clone(),
            characteristics: self.characteristics.clone(),
            images: self.images.clone(),
            parts: self.parts.clone(),
            depth: self.depth,
            timestamp: self.timestamp,
            children: Vec::new(),
        }
    }
}

/// Put `root` at the front of the collection, replacing any root with its id.
pub fn upsert_root(collection: &[Item], root: Item) -> Vec<Item> {
    let mut updated = Vec::with_capacity(collection.len() + 1);
    let id = root.id;
    updated.push(root);
    updated.extend(collection.iter().filter(|r| r.id != id).cloned());
    updated
}

/// Drop the root with the given id, and with it every descendant.
pub fn remove_root(collection: &[Item], id: Uuid) -> Vec<Item> {
    collection.iter().filter(|r| r.id != id).cloned().collect()
}

/// Whether two names refer to each other by case-insensitive containment,
/// in either direction.
///
/// "Seed" matches "Avocado Seed" and the reverse. Short generic names match
/// more than intended; a part called "Core" also matches "Apple Core Tool".
pub fn names_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Find a direct child of `parent` that already answers `query`.
pub fn find_child_matching<'a>(parent: &'a Item, query: &str) -> Option<&'a Item> {
    parent
        .children
        .iter()
        .find(|child| names_match(&child.name, query))
}

/// Number of items in the tree, root included.
pub fn count_items(root: &Item) -> usize {
    1 + root.children.iter().map(count_items).sum::<usize>()
}

/// Check the structural invariants of a stored tree.
///
/// `root` must have no parent and `root_id == id`; every descendant must carry
/// the root's id, its parent's id and a depth one greater than its parent.
/// Ids must be unique across the tree.
pub fn validate(root: &Item) -> Result<(), String> {
    if root.parent_id.is_some() {
        return Err(format!("'{}' is not a root (it has a parent)", root.name));
    }
    if root.root_id != root.id {
        return Err(format!("root '{}' does not reference itself", root.name));
    }
    if root.depth != 0 {
        return Err(format!("root '{}' has depth {}", root.name, root.depth));
    }
    let mut seen = HashSet::new();
    validate_node(root, root.id, &mut seen)
}

/// Validate `roots` as additions to `existing`, which they replace by root id.
///
/// Each tree must pass [`validate`], and no id may appear twice across the
/// resulting forest.
pub fn validate_forest(roots: &[Item], existing: &[Item]) -> Result<(), String> {
    let replaced: HashSet<Uuid> = roots.iter().map(|root| root.id).collect();
    let mut seen = HashSet::new();
    for root in existing.iter().filter(|root| !replaced.contains(&root.id)) {
        collect_ids(root, &mut seen);
    }
    for root in roots {
        validate(root)?;
        check_unique(root, &mut seen)?;
    }
    Ok(())
}

fn collect_ids(node: &Item, seen: &mut HashSet<Uuid>) {
    seen.insert(node.id);
    for child in &node.children {
        collect_ids(child, seen);
    }
}

fn check_unique(node: &Item, seen: &mut HashSet<Uuid>) -> Result<(), String> {
    if !seen.insert(node.id) {
        return Err(format!("item id {} ('{}') is already used", node.id, node.name));
    }
    node.children
        .iter()
        .try_for_each(|child| check_unique(child, seen))
}

fn validate_node(node: &Item, root_id: Uuid, seen: &mut HashSet<Uuid>) -> Result<(), String> {
    if !seen.insert(node.id) {
        return Err(format!("duplicate item id {}", node.id));
    }
    for child in &node.children {
        if child.root_id != root_id {
            return Err(format!("'{}' has a foreign root id", child.name));
        }
        if child.parent_id != Some(node.id) {
            return Err(format!("'{}' does not reference its parent", child.name));
        }
        if child.depth != node.depth + 1 {
            return Err(format!(
                "'{}' has depth {} under a parent at depth {}",
                child.name, child.depth, node.depth
            ));
        }
        validate_node(child, root_id, seen)?;
    }
    Ok(())
}
