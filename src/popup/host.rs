//! Collaborators the popup drives but does not implement: the editor's
//! marker/decoration API and the renderer that draws popup contents.

use crate::surface::Position;

use super::PopupView;

/// A marker placed at a text position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// An overlay decoration attached to a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecorationHandle(pub u64);

/// The popup's visual element, created once per popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Editor marker/decoration placement.
pub trait Decorations: Send {
    fn place_marker(&mut self, position: Position) -> MarkerHandle;

    fn attach_overlay(&mut self, marker: MarkerHandle, element: ElementId) -> DecorationHandle;

    /// Detach and destroy an overlay created by `attach_overlay`.
    fn remove_overlay(&mut self, decoration: DecorationHandle);

    /// Destroy `marker`. Its overlay has already been removed.
    fn destroy(&mut self, marker: MarkerHandle);
}

/// Draws popup contents.
pub trait PopupRenderer: Send {
    /// Build the popup's element. Failure makes the popup unusable.
    fn create_element(&mut self) -> anyhow::Result<ElementId>;

    /// Redraw `element` from `view`.
    fn render(&mut self, element: ElementId, view: &PopupView);
}

/// Observer told whenever the popup gains or loses the pointer.
pub type HoverObserver = Box<dyn FnMut(bool) + Send>;
