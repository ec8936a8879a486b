//! Canvas geometry: the responsive canvas and the card rectangle.
//!
//! The card rect is the single source of truth for clipping, pointer
//! coordinate conversion and the export crop. All layer content (stroke
//! points, sticker positions, the background transform) lives in card-local
//! space, so it is independent of the padding around the card.

use egui::{Pos2, Rect, pos2, vec2};

/// Height = width × 3/2 — fixed 2:3 portrait card.
pub const CARD_ASPECT: f32 = 1.5;

/// Padding between the canvas edge and the card on every side.
pub const CARD_PAD: f32 = 12.0;

/// Corner radius of the card's rounded clip shape.
pub const CARD_CORNER_RADIUS: f32 = 28.0;

/// Canvas width used before the container has been measured (or when the
/// measured width is zero/negative, which happens for one frame at startup).
pub const FALLBACK_CANVAS_WIDTH: f32 = 360.0;

/// Derived canvas geometry. Recomputed whenever the container width changes;
/// cheap enough to rebuild every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardLayout {
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Card rectangle in canvas coordinates.
    pub card: Rect,
}

impl CardLayout {
    pub fn from_width(container_width: f32) -> Self {
        let canvas_width = if container_width > 0.0 {
            container_width
        } else {
            FALLBACK_CANVAS_WIDTH
        };
        let canvas_height = (canvas_width * CARD_ASPECT).round();
        let card = Rect::from_min_size(
            pos2(CARD_PAD, CARD_PAD),
            vec2(canvas_width - 2.0 * CARD_PAD, canvas_height - 2.0 * CARD_PAD),
        );
        Self {
            canvas_width,
            canvas_height,
            card,
        }
    }

    /// Canvas position → card-local position. Every pointer event is passed
    /// through here before being recorded by a layer.
    pub fn to_card(&self, canvas_pos: Pos2) -> Pos2 {
        pos2(canvas_pos.x - self.card.min.x, canvas_pos.y - self.card.min.y)
    }

    /// Card-local position → canvas position (used when painting overlays).
    pub fn from_card(&self, card_pos: Pos2) -> Pos2 {
        pos2(card_pos.x + self.card.min.x, card_pos.y + self.card.min.y)
    }

    /// Center of the card in card-local space.
    pub fn card_center(&self) -> Pos2 {
        pos2(self.card.width() / 2.0, self.card.height() / 2.0)
    }

    pub fn card_width(&self) -> f32 {
        self.card.width()
    }

    pub fn card_height(&self) -> f32 {
        self.card.height()
    }

    /// True if a canvas position falls inside the card rect (corner rounding
    /// is ignored for hit testing — matching how the clip shape only affects
    /// painting, not interaction).
    pub fn contains(&self, canvas_pos: Pos2) -> bool {
        self.card.contains(canvas_pos)
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        Self::from_width(FALLBACK_CANVAS_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_and_padding() {
        let layout = CardLayout::from_width(360.0);
        assert_eq!(layout.canvas_width, 360.0);
        assert_eq!(layout.canvas_height, 540.0);
        assert_eq!(layout.card.min, pos2(12.0, 12.0));
        assert_eq!(layout.card.width(), 336.0);
        assert_eq!(layout.card.height(), 516.0);
    }

    #[test]
    fn zero_width_falls_back() {
        let layout = CardLayout::from_width(0.0);
        assert_eq!(layout.canvas_width, FALLBACK_CANVAS_WIDTH);
        let layout = CardLayout::from_width(-50.0);
        assert_eq!(layout.canvas_width, FALLBACK_CANVAS_WIDTH);
    }

    #[test]
    fn card_local_round_trip() {
        let layout = CardLayout::from_width(420.0);
        let p = pos2(100.0, 200.0);
        assert_eq!(layout.to_card(layout.from_card(p)), p);
        assert_eq!(layout.to_card(pos2(112.0, 212.0)), pos2(100.0, 200.0));
    }
}
