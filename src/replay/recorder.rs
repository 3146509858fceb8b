//! Host collaborators that record every call on a channel.

use tokio::sync::mpsc;

use crate::popup::{
    DecorationHandle, Decorations, ElementId, HoverObserver, MarkerHandle, PopupRenderer,
    PopupView,
};
use crate::surface::Position;

/// A call the popup made into its host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    MarkerPlaced {
        marker: MarkerHandle,
        position: Position,
    },
    OverlayAttached {
        marker: MarkerHandle,
        decoration: DecorationHandle,
    },
    OverlayRemoved(DecorationHandle),
    MarkerDestroyed(MarkerHandle),
    Rendered(PopupView),
    Hover(bool),
}

/// Hands out recording collaborators that share one call channel.
#[derive(Debug, Clone)]
pub struct Recorder {
    tx: mpsc::UnboundedSender<HostCall>,
}

impl Recorder {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn decorations(&self) -> RecordingDecorations {
        RecordingDecorations {
            tx: self.tx.clone(),
            next_id: 0,
        }
    }

    pub fn renderer(&self) -> RecordingRenderer {
        RecordingRenderer {
            tx: self.tx.clone(),
        }
    }

    pub fn observer(&self) -> HoverObserver {
        let tx = self.tx.clone();
        Box::new(move |hovered| {
            let _ = tx.send(HostCall::Hover(hovered));
        })
    }
}

#[derive(Debug)]
pub struct RecordingDecorations {
    tx: mpsc::UnboundedSender<HostCall>,
    next_id: u64,
}

impl RecordingDecorations {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Decorations for RecordingDecorations {
    fn place_marker(&mut self, position: Position) -> MarkerHandle {
        let marker = MarkerHandle(self.next());
        let _ = self.tx.send(HostCall::MarkerPlaced { marker, position });
        marker
    }

    fn attach_overlay(&mut self, marker: MarkerHandle, _element: ElementId) -> DecorationHandle {
        let decoration = DecorationHandle(self.next());
        let _ = self.tx.send(HostCall::OverlayAttached { marker, decoration });
        decoration
    }

    fn remove_overlay(&mut self, decoration: DecorationHandle) {
        let _ = self.tx.send(HostCall::OverlayRemoved(decoration));
    }

    fn destroy(&mut self, marker: MarkerHandle) {
        let _ = self.tx.send(HostCall::MarkerDestroyed(marker));
    }
}

#[derive(Debug)]
pub struct RecordingRenderer {
    tx: mpsc::UnboundedSender<HostCall>,
}

impl PopupRenderer for RecordingRenderer {
    fn create_element(&mut self) -> anyhow::Result<ElementId> {
        Ok(ElementId(1))
    }

    fn render(&mut self, _element: ElementId, view: &PopupView) {
        let _ = self.tx.send(HostCall::Rendered(view.clone()));
    }
}
