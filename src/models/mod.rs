//! Domain models for teardown.
//!
//! # Core Concepts
//!
//! ## Persisted Entities
//!
//! - [`Item`]: One analyzed object or sub-part. Items form recursive trees;
//!   a tree is stored and deleted as a unit through its root.
//! - [`Part`]: A hotspot on an item's exploded view, with planar coordinates.
//! - [`ImageSet`]: Up to three generated views of an item.
//!
//! ## Transient Values
//!
//! These are never written to storage:
//!
//! - [`GenerationStatus`]: Progress of the exploration currently in flight.
//! - [`GenerationConfig`]: Options passed through to the generative service.

mod config;
mod item;
mod status;

pub use config::*;
pub use item::*;
pub use status::*;
