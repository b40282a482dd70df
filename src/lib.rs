pub mod ai;
pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod tree;
