//! Popup lifecycle state machine.
//!
//! ## States
//!
//! ```text
//!            update(p)                results + min progress
//! Closed ──────────────→ Loading ─────────────────────────→ Showing
//!    ▲                      │  ▲                               │
//!    │                      │  └──────── update(p') ───────────┘
//!    └──── close() ─────────┴──────────── close() ─────────────┘
//! ```
//!
//! Orthogonal to the state, a hide timer may be scheduled. It starts when
//! the pointer moves while the popup is up, is cancelled by hovering the
//! popup or by a new `update`, and closes the popup when it elapses.
//!
//! The popup owns the marker/decoration for its lifetime. `update` never
//! talks to providers; it hands back a [`Ticket`] for the refresh
//! coordinator, and results come back through [`Popup::on_refresh`].

pub mod host;

use std::time::Duration;

use tokio::time::Instant;

use crate::config::HoverConfig;
use crate::error::{HoverError, HoverResult};
use crate::refresh::{RefreshResult, RequestId, Ticket};
use crate::surface::{ContentItem, Position, SurfaceId};

pub use host::{
    DecorationHandle, Decorations, ElementId, HoverObserver, MarkerHandle, PopupRenderer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopupState {
    #[default]
    Closed,
    /// A query is in flight, or its results wait out the minimum progress time.
    Loading,
    /// Content (or the empty placeholder) is on screen.
    Showing,
}

/// Text shown in place of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Waiting,
    NothingFound,
}

impl Placeholder {
    pub fn text(self) -> &'static str {
        match self {
            Placeholder::Waiting => "Wait... :)",
            Placeholder::NothingFound => "Nothing to show :(",
        }
    }
}

/// What the renderer draws. A pure projection of the popup state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopupView {
    pub state: PopupState,
    pub position: Option<Position>,
    pub items: Vec<ContentItem>,
    pub placeholder: Option<Placeholder>,
    /// Loading indicator visible.
    pub progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupTimings {
    pub hide_delay: Duration,
    pub min_progress: Duration,
}

impl From<&HoverConfig> for PopupTimings {
    fn from(config: &HoverConfig) -> Self {
        Self {
            hide_delay: config.hide_delay(),
            min_progress: config.min_progress(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mount {
    marker: MarkerHandle,
    decoration: DecorationHandle,
}

pub struct Popup {
    surface: SurfaceId,
    timings: PopupTimings,
    element: ElementId,
    decorations: Box<dyn Decorations>,
    renderer: Box<dyn PopupRenderer>,
    on_hover: Option<HoverObserver>,

    state: PopupState,
    mount: Option<Mount>,
    position: Option<Position>,
    items: Vec<ContentItem>,
    hovered: bool,

    last_request: RequestId,
    awaiting: Option<RequestId>,
    /// Results that arrived before the minimum progress time ran out.
    ready: Option<Vec<ContentItem>>,
    progress_until: Option<Instant>,
    hide_at: Option<Instant>,
}

impl Popup {
    /// Create a popup bound to `surface`. Fails if the renderer cannot
    /// build the popup element.
    pub fn new(
        surface: SurfaceId,
        timings: PopupTimings,
        mut renderer: Box<dyn PopupRenderer>,
        decorations: Box<dyn Decorations>,
    ) -> HoverResult<Self> {
        let element = renderer
            .create_element()
            .map_err(|e| HoverError::Initialization(format!("{e:#}")))?;
        Ok(Self {
            surface,
            timings,
            element,
            decorations,
            renderer,
            on_hover: None,
            state: PopupState::Closed,
            mount: None,
            position: None,
            items: Vec::new(),
            hovered: false,
            last_request: 0,
            awaiting: None,
            ready: None,
            progress_until: None,
            hide_at: None,
        })
    }

    /// Register the observer told about popup hover changes.
    pub fn on_hover(&mut self, observer: HoverObserver) {
        self.on_hover = Some(observer);
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// A popup belongs to one surface for its whole life.
    pub fn bind_surface(&self, surface: SurfaceId) -> HoverResult<()> {
        if surface == self.surface {
            Ok(())
        } else {
            Err(HoverError::InvalidTransition {
                bound: self.surface,
                requested: surface,
            })
        }
    }

    pub fn state(&self) -> PopupState {
        self.state
    }

    /// True while a marker/decoration exists.
    pub fn is_visible(&self) -> bool {
        self.mount.is_some()
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn hide_scheduled(&self) -> bool {
        self.hide_at.is_some()
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Show the popup for `position`. Returns the refresh to issue, or
    /// `None` when the popup already shows that position.
    pub fn update(&mut self, position: Position, now: Instant) -> Option<Ticket> {
        if self.mount.is_some() && self.position == Some(position) {
            return None;
        }

        self.hide_at = None;
        if let Some(old) = self.mount.take() {
            self.unmount(old);
        }
        let marker = self.decorations.place_marker(position);
        let decoration = self.decorations.attach_overlay(marker, self.element);
        self.mount = Some(Mount { marker, decoration });
        self.position = Some(position);
        self.state = PopupState::Loading;

        self.last_request += 1;
        self.awaiting = Some(self.last_request);
        self.ready = None;
        self.progress_until = Some(now + self.timings.min_progress);

        tracing::debug!(
            request = self.last_request,
            line = position.line,
            character = position.character,
            "popup loading"
        );
        self.render();
        Some(Ticket {
            request: self.last_request,
            position,
        })
    }

    /// Accept merged provider output. Results for anything but the latest
    /// request are dropped.
    pub fn on_refresh(&mut self, result: RefreshResult, now: Instant) {
        if self.awaiting != Some(result.request) {
            tracing::debug!(
                request = result.request,
                latest = self.last_request,
                "stale refresh result discarded"
            );
            return;
        }
        self.awaiting = None;
        match self.progress_until {
            Some(until) if now < until => self.ready = Some(result.items),
            _ => self.show(result.items),
        }
    }

    /// A filtered pointer move happened on the surface.
    pub fn pointer_moved(&mut self, now: Instant) {
        if self.is_visible() && self.hide_at.is_none() && !self.hovered {
            self.hide_at = Some(now + self.timings.hide_delay);
            tracing::trace!("hide scheduled");
        }
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        if self.hovered == hovered {
            return;
        }
        self.hovered = hovered;
        if hovered && self.hide_at.take().is_some() {
            tracing::trace!("hide cancelled, popup hovered");
        }
        self.notify_hover(hovered);
    }

    /// Earliest instant at which [`Popup::fire_due`] has work.
    pub fn deadline(&self) -> Option<Instant> {
        let reveal = self.ready.as_ref().and(self.progress_until);
        [reveal, self.hide_at].into_iter().flatten().min()
    }

    /// Run whatever timers are due. Returns true if the popup closed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        if self.ready.is_some() && self.progress_until.is_some_and(|t| now >= t) {
            let items = self.ready.take().unwrap_or_default();
            self.show(items);
        }
        if self.hide_at.is_some_and(|t| now >= t) {
            self.hide_at = None;
            tracing::debug!("hide delay elapsed");
            return self.close();
        }
        false
    }

    /// Tear the popup down. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        self.hide_at = None;
        if self.state == PopupState::Closed {
            return false;
        }
        if let Some(mount) = self.mount.take() {
            self.unmount(mount);
        }
        self.items.clear();
        self.position = None;
        self.awaiting = None;
        self.ready = None;
        self.progress_until = None;
        self.hovered = false;
        self.state = PopupState::Closed;

        tracing::debug!("popup closed");
        self.notify_hover(false);
        self.render();
        true
    }

    pub fn view(&self) -> PopupView {
        let placeholder = match self.state {
            _ if !self.items.is_empty() => None,
            PopupState::Closed => None,
            PopupState::Loading => Some(Placeholder::Waiting),
            PopupState::Showing => Some(Placeholder::NothingFound),
        };
        PopupView {
            state: self.state,
            position: self.position,
            items: self.items.clone(),
            placeholder,
            progress: self.state == PopupState::Loading,
        }
    }

    fn show(&mut self, items: Vec<ContentItem>) {
        self.items = items;
        self.state = PopupState::Showing;
        self.ready = None;
        self.progress_until = None;
        tracing::debug!(items = self.items.len(), "popup showing");
        self.render();
    }

    fn unmount(&mut self, mount: Mount) {
        tracing::trace!(
            marker = mount.marker.0,
            decoration = mount.decoration.0,
            "marker destroyed"
        );
        self.decorations.remove_overlay(mount.decoration);
        self.decorations.destroy(mount.marker);
    }

    fn notify_hover(&mut self, hovered: bool) {
        if let Some(observer) = self.on_hover.as_mut() {
            observer(hovered);
        }
    }

    fn render(&mut self) {
        let view = self.view();
        self.renderer.render(self.element, &view);
    }
}
