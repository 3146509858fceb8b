//! A provider that answers every position with the same items.

use std::time::Duration;

use async_trait::async_trait;

use super::HoverProvider;
use crate::surface::{ContentItem, Position, SurfaceHandle};

#[derive(Debug, Clone)]
pub struct FixedProvider {
    name: String,
    priority: i32,
    items: Vec<ContentItem>,
    delay: Duration,
    failure: Option<String>,
}

impl FixedProvider {
    pub fn new<I, T>(name: impl Into<String>, priority: i32, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ContentItem>,
    {
        Self {
            name: name.into(),
            priority,
            items: items.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            failure: None,
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every query with `message` (after the delay).
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait]
impl HoverProvider for FixedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn query(
        &self,
        _surface: &SurfaceHandle,
        _position: Position,
    ) -> anyhow::Result<Vec<ContentItem>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(self.items.clone()),
        }
    }
}
