//! Pointer-to-text geometry.
//!
//! The engine never measures glyphs itself. A `GeometryOracle` resolves a
//! pointer event to a text position and says whether the pointer is close
//! enough to that position to count as hovering it.

use crate::surface::{HostSurface, PointerEvent, Position};

pub trait GeometryOracle: Send + Sync {
    /// Text position under the pointer, capped to the end of its line.
    fn position_for_pointer_event(
        &self,
        surface: &dyn HostSurface,
        event: &PointerEvent,
    ) -> Position;

    /// Whether the pointer is near enough to `position` to show a hover for it.
    fn is_near_text(
        &self,
        surface: &dyn HostSurface,
        position: Position,
        event: &PointerEvent,
    ) -> bool;
}

/// A capped position is only trustworthy when the pointer sits within
/// `reach` pixels of the glyph it was capped to.
pub fn within_reach(pointer_x: f64, glyph_x: f64, reach: f64) -> bool {
    (pointer_x - glyph_x).abs() <= reach
}

/// Geometry for a monospace grid with fixed cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    char_width: f64,
    line_height: f64,
    reach: f64,
}

impl GridGeometry {
    pub fn new(char_width: f64, line_height: f64, reach: f64) -> Self {
        Self {
            char_width,
            line_height,
            reach,
        }
    }

    fn glyph_x(&self, position: Position) -> f64 {
        position.character as f64 * self.char_width
    }
}

impl GeometryOracle for GridGeometry {
    fn position_for_pointer_event(
        &self,
        surface: &dyn HostSurface,
        event: &PointerEvent,
    ) -> Position {
        let last_line = surface.line_count().saturating_sub(1);
        let line = ((event.y.max(0.0) / self.line_height).floor() as u32).min(last_line);
        let line_len = surface.line_len(line).unwrap_or(0);
        let character = ((event.x.max(0.0) / self.char_width).floor() as u32).min(line_len);
        Position::new(line, character)
    }

    fn is_near_text(
        &self,
        _surface: &dyn HostSurface,
        position: Position,
        event: &PointerEvent,
    ) -> bool {
        within_reach(event.x, self.glyph_x(position), self.reach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{StaticSurface, SurfaceId};

    fn surface() -> StaticSurface {
        StaticSurface::new(SurfaceId(1), "let x = 1;\nx\n")
    }

    fn grid() -> GridGeometry {
        GridGeometry::new(8.0, 16.0, 10.0)
    }

    #[test]
    fn pointer_maps_to_cell() {
        let s = surface();
        let pos = grid().position_for_pointer_event(&s, &PointerEvent::new(33.0, 5.0));
        assert_eq!(pos, Position::new(0, 4));
        assert!(grid().is_near_text(&s, pos, &PointerEvent::new(33.0, 5.0)));
    }

    #[test]
    fn column_capped_to_line_end() {
        let s = surface();
        let event = PointerEvent::new(200.0, 20.0);
        let pos = grid().position_for_pointer_event(&s, &event);
        assert_eq!(pos, Position::new(1, 1));
        // Far to the right of the single character on line 1.
        assert!(!grid().is_near_text(&s, pos, &event));
    }

    #[test]
    fn just_past_line_end_still_near() {
        let s = surface();
        let event = PointerEvent::new(15.0, 20.0);
        let pos = grid().position_for_pointer_event(&s, &event);
        assert_eq!(pos, Position::new(1, 1));
        assert!(grid().is_near_text(&s, pos, &event));
    }

    #[test]
    fn rows_below_text_clamp_to_last_line() {
        let s = surface();
        let pos = grid().position_for_pointer_event(&s, &PointerEvent::new(0.0, 500.0));
        assert_eq!(pos.line, 1);
    }

    #[test]
    fn negative_coordinates_clamp_to_origin() {
        let s = surface();
        let pos = grid().position_for_pointer_event(&s, &PointerEvent::new(-4.0, -9.0));
        assert_eq!(pos, Position::new(0, 0));
    }

    #[test]
    fn reach_is_inclusive() {
        assert!(within_reach(10.0, 0.0, 10.0));
        assert!(!within_reach(10.5, 0.0, 10.0));
        assert!(within_reach(0.0, 10.0, 10.0));
    }
}
