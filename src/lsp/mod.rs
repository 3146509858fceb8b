//! Language-service hover providers.
//!
//! In-process language services answer hover requests synchronously over
//! the surface text, using `lsp-types` for the standard hover structures.
//! [`LanguageServiceProvider`] adapts any such service into a
//! [`HoverProvider`] so it can sit in a [`ProviderRegistry`] next to the
//! host's own providers.
//!
//! [`ProviderRegistry`]: crate::provider::ProviderRegistry

pub mod glossary;

use async_trait::async_trait;
use lsp_types::{Hover, HoverContents, MarkedString, MarkupContent, MarkupKind, Position};

use crate::provider::HoverProvider;
use crate::surface::{ContentItem, SurfaceHandle};

pub use glossary::GlossaryService;

/// Hover information for a position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    /// Markdown to display.
    pub content: String,
    /// Optional range the hover applies to.
    pub range: Option<lsp_types::Range>,
}

impl From<HoverInfo> for Hover {
    fn from(info: HoverInfo) -> Self {
        Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: info.content,
            }),
            range: info.range,
        }
    }
}

/// In-process language service: pure functions, no transport.
pub trait LanguageService: Send + Sync {
    /// Compute hover information at the given position.
    fn hover(&self, content: &str, pos: Position) -> Option<HoverInfo>;
}

/// Flatten an LSP hover into popup content, one item per block.
/// Blank blocks are dropped.
pub fn items_from_hover(hover: Hover) -> Vec<ContentItem> {
    let blocks = match hover.contents {
        HoverContents::Scalar(marked) => vec![marked_to_markup(marked)],
        HoverContents::Array(marked) => marked.into_iter().map(marked_to_markup).collect(),
        HoverContents::Markup(markup) => vec![markup.value],
    };
    blocks
        .into_iter()
        .filter(|block| !block.trim().is_empty())
        .map(ContentItem::Markup)
        .collect()
}

fn marked_to_markup(marked: MarkedString) -> String {
    match marked {
        MarkedString::String(text) => text,
        MarkedString::LanguageString(code) => {
            if code.value.trim().is_empty() {
                String::new()
            } else {
                format!("```{}\n{}\n```", code.language, code.value)
            }
        }
    }
}

/// A [`LanguageService`] exposed as a hover provider.
pub struct LanguageServiceProvider<S> {
    name: String,
    priority: i32,
    service: S,
}

impl<S: LanguageService> LanguageServiceProvider<S> {
    pub fn new(name: impl Into<String>, priority: i32, service: S) -> Self {
        Self {
            name: name.into(),
            priority,
            service,
        }
    }
}

#[async_trait]
impl<S: LanguageService> HoverProvider for LanguageServiceProvider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn query(
        &self,
        surface: &SurfaceHandle,
        position: Position,
    ) -> anyhow::Result<Vec<ContentItem>> {
        let text = surface.text();
        Ok(self
            .service
            .hover(&text, position)
            .map(|info| items_from_hover(info.into()))
            .unwrap_or_default())
    }
}
