//! Host surface model: the editor view a watcher is attached to,
//! the events it produces and the content shown about it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use lsp_types::Position;

/// Identity of a host surface (one editor view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The editor view a popup is bound to. Providers and the geometry oracle
/// receive it to read whatever they need.
pub trait HostSurface: Send + Sync {
    fn id(&self) -> SurfaceId;

    /// Full text currently displayed by the surface.
    fn text(&self) -> String;

    /// Number of characters on `line`, or `None` past the last line.
    fn line_len(&self, line: u32) -> Option<u32> {
        self.text()
            .lines()
            .nth(line as usize)
            .map(|l| l.chars().count() as u32)
    }

    fn line_count(&self) -> u32 {
        self.text().lines().count() as u32
    }
}

pub type SurfaceHandle = Arc<dyn HostSurface>;

/// A surface over a fixed piece of text.
#[derive(Debug, Clone)]
pub struct StaticSurface {
    id: SurfaceId,
    text: String,
}

impl StaticSurface {
    pub fn new(id: SurfaceId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    pub fn handle(self) -> SurfaceHandle {
        Arc::new(self)
    }
}

impl HostSurface for StaticSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn line_len(&self, line: u32) -> Option<u32> {
        self.text
            .lines()
            .nth(line as usize)
            .map(|l| l.chars().count() as u32)
    }

    fn line_count(&self) -> u32 {
        self.text.lines().count() as u32
    }
}

/// One unit of popup content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Pre-rendered markup, sanitized by the renderer.
    Markup(String),
    /// Something the renderer knows how to draw.
    Element(ElementHandle),
}

impl ContentItem {
    pub fn as_markup(&self) -> Option<&str> {
        match self {
            ContentItem::Markup(s) => Some(s),
            ContentItem::Element(_) => None,
        }
    }
}

impl From<&str> for ContentItem {
    fn from(s: &str) -> Self {
        ContentItem::Markup(s.to_string())
    }
}

impl From<String> for ContentItem {
    fn from(s: String) -> Self {
        ContentItem::Markup(s)
    }
}

/// Opaque renderable value. Two handles are equal only when they share
/// the same allocation.
#[derive(Clone)]
pub struct ElementHandle(Arc<dyn Any + Send + Sync>);

impl ElementHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ElementHandle(..)")
    }
}

/// Pointer location in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Raw events a host forwards to its watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Pointer moved over the surface (including over the popup above it).
    PointerMove(PointerEvent),
    /// Pointer entered the surface.
    PointerEnter,
    /// Pointer left the surface.
    PointerLeave,
    /// Pointer entered the popup.
    PopupEnter,
    /// Pointer left the popup.
    PopupLeave,
    /// A key was pressed while the surface had focus.
    KeyPress,
    /// The surface text changed.
    ContentChanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_surface_line_lengths() {
        let surface = StaticSurface::new(SurfaceId(3), "fn main() {\n    print();\n}");
        assert_eq!(surface.line_count(), 3);
        assert_eq!(surface.line_len(0), Some(11));
        assert_eq!(surface.line_len(1), Some(12));
        assert_eq!(surface.line_len(3), None);
    }

    #[test]
    fn line_len_counts_chars_not_bytes() {
        let surface = StaticSurface::new(SurfaceId(1), "héllo");
        assert_eq!(surface.line_len(0), Some(5));
    }

    #[test]
    fn element_handles_compare_by_identity() {
        let a = ElementHandle::new(42u32);
        let b = ElementHandle::new(42u32);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<u32>(), Some(&42));
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[test]
    fn markup_from_str() {
        let item = ContentItem::from("<b>x</b>");
        assert_eq!(item.as_markup(), Some("<b>x</b>"));
        let el = ContentItem::Element(ElementHandle::new(()));
        assert_eq!(el.as_markup(), None);
    }
}
