//! Hover signal bus: raw surface events in, hover intents out.
//!
//! Tracks two attention flags, whether the pointer is on the host surface
//! and whether it is on the popup, and debounces pointer movement into a
//! single "settled" position per quiet period.
//!
//! ```text
//! move ──[popup hovered? drop]──[same sample? drop]──→ Moved(p)
//!                                         │
//!                                  restart quiet timer
//!                                         │
//!                              timer fires ▼
//!              surface hovered, popup not, near text? ──→ Settled(p)
//!
//! key press / surface leave ──────────────────────────→ Close
//! popup enter / leave ────────────────────────────────→ PopupHover(b)
//! ```
//!
//! The bus owns no timers. It exposes the instant its debounce window
//! closes through [`SignalBus::deadline`]; the dispatch loop sleeps until
//! then and calls [`SignalBus::fire_due`].

use std::time::Duration;

use tokio::time::Instant;

use crate::surface::Position;

/// What the bus asks the popup layer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverIntent {
    /// The pointer moved to a new sample over the surface.
    Moved(Position),
    /// The pointer rested on `Position` for a full quiet period.
    Settled(Position),
    /// Attention left the surface; close immediately.
    Close,
    /// The pointer entered (`true`) or left (`false`) the popup.
    PopupHover(bool),
}

/// A pointer move resolved to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub position: Position,
    pub near_text: bool,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    sample: PointerSample,
    due: Instant,
}

#[derive(Debug)]
pub struct SignalBus {
    quiet_period: Duration,
    surface_hovered: bool,
    popup_hovered: bool,
    last_sample: Option<PointerSample>,
    candidate: Option<Candidate>,
}

impl SignalBus {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            surface_hovered: true,
            popup_hovered: false,
            last_sample: None,
            candidate: None,
        }
    }

    pub fn surface_hovered(&self) -> bool {
        self.surface_hovered
    }

    pub fn popup_hovered(&self) -> bool {
        self.popup_hovered
    }

    /// Feed a pointer move. Returns `Moved` when the move survives the
    /// popup filter and deduplication; such a move restarts the quiet period.
    pub fn pointer_moved(&mut self, sample: PointerSample, now: Instant) -> Option<HoverIntent> {
        if self.popup_hovered {
            return None;
        }
        if self.last_sample == Some(sample) {
            return None;
        }
        self.last_sample = Some(sample);
        self.candidate = Some(Candidate {
            sample,
            due: now + self.quiet_period,
        });
        Some(HoverIntent::Moved(sample.position))
    }

    pub fn surface_entered(&mut self) {
        self.surface_hovered = true;
    }

    pub fn surface_left(&mut self) -> HoverIntent {
        self.surface_hovered = false;
        self.last_sample = None;
        HoverIntent::Close
    }

    pub fn popup_entered(&mut self) -> Option<HoverIntent> {
        if self.popup_hovered {
            return None;
        }
        self.popup_hovered = true;
        Some(HoverIntent::PopupHover(true))
    }

    pub fn popup_left(&mut self) -> Option<HoverIntent> {
        if !self.popup_hovered {
            return None;
        }
        self.popup_hovered = false;
        Some(HoverIntent::PopupHover(false))
    }

    /// The popup went away underneath the pointer; no leave event will come.
    pub fn reset_popup_hover(&mut self) {
        self.popup_hovered = false;
    }

    pub fn key_pressed(&mut self) -> HoverIntent {
        self.last_sample = None;
        HoverIntent::Close
    }

    /// When the pending debounce window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.map(|c| c.due)
    }

    /// Close the debounce window if it is due. Attention is sampled now:
    /// a position the pointer has already left is never reported.
    pub fn fire_due(&mut self, now: Instant) -> Option<HoverIntent> {
        let candidate = self.candidate?;
        if now < candidate.due {
            return None;
        }
        self.candidate = None;

        let sample = candidate.sample;
        if !self.surface_hovered || self.popup_hovered {
            tracing::trace!(
                surface_hovered = self.surface_hovered,
                popup_hovered = self.popup_hovered,
                "settled position suppressed, attention moved"
            );
            return None;
        }
        if !sample.near_text {
            tracing::trace!("settled position suppressed, pointer not on text");
            return None;
        }
        Some(HoverIntent::Settled(sample.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    fn at(line: u32, character: u32) -> PointerSample {
        PointerSample {
            position: Position::new(line, character),
            near_text: true,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn initial_attention_flags() {
        let bus = SignalBus::new(QUIET);
        assert!(bus.surface_hovered());
        assert!(!bus.popup_hovered());
        assert_eq!(bus.deadline(), None);
    }

    #[test]
    fn burst_settles_once_on_last_position() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        let mut settled = Vec::new();

        for (i, t) in [0u64, 100, 250, 400, 899].into_iter().enumerate() {
            let now = t0 + ms(t);
            if let Some(intent) = bus.fire_due(now) {
                settled.push(intent);
            }
            assert_eq!(
                bus.pointer_moved(at(0, i as u32), now),
                Some(HoverIntent::Moved(Position::new(0, i as u32)))
            );
        }
        assert!(settled.is_empty());
        assert_eq!(bus.deadline(), Some(t0 + ms(1399)));
        assert_eq!(bus.fire_due(t0 + ms(1398)), None);
        assert_eq!(
            bus.fire_due(t0 + ms(1399)),
            Some(HoverIntent::Settled(Position::new(0, 4)))
        );
        assert_eq!(bus.fire_due(t0 + ms(5000)), None);
        assert_eq!(bus.deadline(), None);
    }

    #[test]
    fn duplicate_samples_do_not_restart_quiet_period() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(1, 1), t0);
        assert_eq!(bus.pointer_moved(at(1, 1), t0 + ms(300)), None);
        assert_eq!(bus.deadline(), Some(t0 + QUIET));
    }

    #[test]
    fn leaving_surface_suppresses_settle() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(2, 3), t0);
        assert_eq!(bus.surface_left(), HoverIntent::Close);
        assert_eq!(bus.fire_due(t0 + QUIET), None);
    }

    #[test]
    fn attention_is_sampled_at_fire_time() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(2, 3), t0);
        bus.surface_left();
        bus.surface_entered();
        assert_eq!(
            bus.fire_due(t0 + QUIET),
            Some(HoverIntent::Settled(Position::new(2, 3)))
        );
    }

    #[test]
    fn moves_over_popup_are_ignored() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        assert_eq!(bus.popup_entered(), Some(HoverIntent::PopupHover(true)));
        assert_eq!(bus.pointer_moved(at(4, 4), t0), None);
        assert_eq!(bus.deadline(), None);
    }

    #[test]
    fn entering_popup_before_settle_suppresses() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(4, 4), t0);
        bus.popup_entered();
        assert_eq!(bus.fire_due(t0 + QUIET), None);
    }

    #[test]
    fn popup_hover_edges_only() {
        let mut bus = SignalBus::new(QUIET);
        assert_eq!(bus.popup_left(), None);
        assert_eq!(bus.popup_entered(), Some(HoverIntent::PopupHover(true)));
        assert_eq!(bus.popup_entered(), None);
        assert_eq!(bus.popup_left(), Some(HoverIntent::PopupHover(false)));
    }

    #[test]
    fn far_from_text_never_settles() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        let sample = PointerSample {
            position: Position::new(0, 9),
            near_text: false,
        };
        assert!(bus.pointer_moved(sample, t0).is_some());
        assert_eq!(bus.fire_due(t0 + QUIET), None);
    }

    #[test]
    fn key_press_closes_and_rearms_same_position() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(1, 1), t0);
        assert_eq!(bus.key_pressed(), HoverIntent::Close);
        assert_eq!(
            bus.pointer_moved(at(1, 1), t0 + ms(10)),
            Some(HoverIntent::Moved(Position::new(1, 1)))
        );
    }

    #[test]
    fn separate_bursts_settle_separately() {
        let mut bus = SignalBus::new(QUIET);
        let t0 = Instant::now();
        bus.pointer_moved(at(0, 0), t0);
        assert_eq!(
            bus.fire_due(t0 + QUIET),
            Some(HoverIntent::Settled(Position::new(0, 0)))
        );
        bus.pointer_moved(at(3, 0), t0 + ms(600));
        assert_eq!(
            bus.fire_due(t0 + ms(1100)),
            Some(HoverIntent::Settled(Position::new(3, 0)))
        );
    }
}
