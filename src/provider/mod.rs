//! Hover providers and the registry that orders them.
//!
//! A provider is an opaque async source of content for a text position.
//! The registry keeps providers sorted by descending priority (ties keep
//! registration order) and fans a query out to all of them, merging the
//! results in that order. One provider failing never costs the others
//! their items.

pub mod fixed;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::RwLock;

use crate::error::HoverError;
use crate::surface::{ContentItem, Position, SurfaceHandle};

pub use fixed::FixedProvider;

/// A source of hover content.
#[async_trait]
pub trait HoverProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Higher priorities are queried and listed first.
    fn priority(&self) -> i32 {
        0
    }

    /// Content for `position` on `surface`. An empty list means "nothing here".
    async fn query(
        &self,
        surface: &SurfaceHandle,
        position: Position,
    ) -> anyhow::Result<Vec<ContentItem>>;
}

struct Registered {
    provider: Arc<dyn HoverProvider>,
    priority: i32,
}

/// Shared, ordered set of providers. Cheap to clone; clones see the same set.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Arc<RwLock<Vec<Registered>>>,
}

fn same_provider(a: &Arc<dyn HoverProvider>, b: &Arc<dyn HoverProvider>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider. Registering the same instance again replaces the
    /// earlier registration and moves it behind its priority peers.
    pub async fn register(&self, provider: Arc<dyn HoverProvider>) {
        let mut entries = self.entries.write().await;
        entries.retain(|e| !same_provider(&e.provider, &provider));
        let priority = provider.priority();
        tracing::debug!(provider = provider.name(), priority, "provider registered");
        entries.push(Registered { provider, priority });
        // Stable sort keeps registration order among equal priorities.
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove a provider. Returns true if it was registered.
    pub async fn unregister(&self, provider: &Arc<dyn HoverProvider>) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !same_provider(&e.provider, provider));
        entries.len() != before
    }

    /// Providers in query order.
    pub async fn providers(&self) -> Vec<Arc<dyn HoverProvider>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Query every provider for `position` and merge the results in
    /// registry order.
    pub async fn query(&self, surface: &SurfaceHandle, position: Position) -> Vec<ContentItem> {
        let providers = self.providers().await;
        query_all(&providers, surface, position).await
    }
}

/// Query `providers` concurrently, concatenating their items in slice order.
pub async fn query_all(
    providers: &[Arc<dyn HoverProvider>],
    surface: &SurfaceHandle,
    position: Position,
) -> Vec<ContentItem> {
    let queries = providers
        .iter()
        .map(|p| query_isolated(p.as_ref(), surface, position));
    join_all(queries).await.into_iter().flatten().collect()
}

/// Run one provider, turning an error or a panic into an empty result.
async fn query_isolated(
    provider: &dyn HoverProvider,
    surface: &SurfaceHandle,
    position: Position,
) -> Vec<ContentItem> {
    let outcome = AssertUnwindSafe(provider.query(surface, position))
        .catch_unwind()
        .await;
    let message = match outcome {
        Ok(Ok(items)) => return items,
        Ok(Err(e)) => format!("{e:#}"),
        Err(_) => "panicked during query".to_string(),
    };
    let err = HoverError::ProviderFailure {
        provider: provider.name().to_string(),
        message,
    };
    tracing::warn!(line = position.line, character = position.character, "{err}");
    Vec::new()
}
