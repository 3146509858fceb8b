//! ide-hover: hover popups for code editing surfaces.
//!
//! Pointer movement over a surface is debounced into settled positions,
//! registered providers are queried for content at that position, and a
//! single popup per surface shows the merged result until attention moves on.

pub mod config;
pub mod error;
pub mod geometry;
pub mod lsp;
pub mod popup;
pub mod provider;
pub mod refresh;
pub mod replay;
pub mod signal;
pub mod surface;
pub mod watcher;
