//! Editor state: tool modes, brush configuration, stroke capture, sticker
//! objects and the background transform.
//!
//! All mutation happens synchronously on the UI thread in response to discrete
//! input events. Pointer drags are modal: `pointer_down` records a gesture and
//! every subsequent `pointer_move` is routed by that gesture — not by whatever
//! is under the pointer or by the currently active tool — until `pointer_up`.

use std::sync::Arc;

use egui::{Color32, Pos2, pos2};
use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::BlendMode;
use crate::components::history::StrokeHistory;
use crate::layout::CardLayout;

/// Background zoom bounds.
pub const MIN_BG_SCALE: f32 = 0.1;
pub const MAX_BG_SCALE: f32 = 8.0;

/// Scale a freshly added sticker starts at.
pub const STICKER_DEFAULT_SCALE: f32 = 0.6;

/// Batch uploads fan out by this many pixels from the card center,
/// alternating sign by index parity, so simultaneous uploads don't stack.
pub const STICKER_BATCH_OFFSET: f32 = 60.0;

/// Sticker scale bounds enforced by the transform handle.
pub const MIN_STICKER_SCALE: f32 = 0.05;
pub const MAX_STICKER_SCALE: f32 = 10.0;

/// Hit radius around the transform handle, in canvas pixels.
pub const HANDLE_HIT_RADIUS: f32 = 12.0;

// ============================================================================
// TOOL MODE + BRUSH CONFIGURATION
// ============================================================================

/// The single active interaction mode. Gates which layer receives pointer
/// input: background pan in Move, stroke capture in Draw, sticker
/// select/drag/transform in Sticker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Move,
    Draw,
    Sticker,
}

impl ToolMode {
    pub fn all() -> &'static [ToolMode] {
        &[ToolMode::Move, ToolMode::Draw, ToolMode::Sticker]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolMode::Move => "Move",
            ToolMode::Draw => "Draw",
            ToolMode::Sticker => "Sticker",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushKind {
    #[default]
    Pen,
    Highlight,
    Eraser,
}

impl BrushKind {
    pub fn all() -> &'static [BrushKind] {
        &[BrushKind::Pen, BrushKind::Highlight, BrushKind::Eraser]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrushKind::Pen => "Pen",
            BrushKind::Highlight => "Highlight",
            BrushKind::Eraser => "Eraser",
        }
    }
}

/// Session-wide brush configuration. Resolved into a frozen [`StrokeStyle`]
/// when a stroke starts, so later edits never retroactively restyle strokes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub kind: BrushKind,
    pub color: Color32,
    pub thickness: f32,
    pub opacity: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            kind: BrushKind::Pen,
            color: Color32::WHITE,
            thickness: 8.0,
            opacity: 1.0,
        }
    }
}

impl BrushSettings {
    /// Freeze the active configuration into a per-stroke style.
    ///
    /// Eraser strokes always paint at full strength (their color is
    /// irrelevant — only alpha removal matters). Highlight strokes get an
    /// additive blend plus a same-color glow whose radius tracks thickness
    /// with a floor of 10.
    pub fn resolve(&self) -> StrokeStyle {
        match self.kind {
            BrushKind::Eraser => StrokeStyle {
                color: self.color,
                width: self.thickness,
                opacity: 1.0,
                blend: BlendMode::Erase,
                glow: None,
            },
            BrushKind::Highlight => StrokeStyle {
                color: self.color,
                width: self.thickness,
                opacity: self.opacity,
                blend: BlendMode::Additive,
                glow: Some(GlowStyle {
                    radius: (self.thickness * 1.2).round().max(10.0),
                    color: self.color,
                }),
            },
            BrushKind::Pen => StrokeStyle {
                color: self.color,
                width: self.thickness,
                opacity: self.opacity,
                blend: BlendMode::Normal,
                glow: None,
            },
        }
    }
}

/// Soft halo rendered beneath a highlight stroke's core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlowStyle {
    pub radius: f32,
    pub color: Color32,
}

/// Style baked into a stroke at pointer-down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Color32,
    pub width: f32,
    pub opacity: f32,
    pub blend: BlendMode,
    pub glow: Option<GlowStyle>,
}

// ============================================================================
// STROKES
// ============================================================================

/// One freehand polyline. Points are flat x,y pairs in card-local space,
/// append-only while the pointer is down.
#[derive(Clone, Debug)]
pub struct DrawLine {
    pub id: Uuid,
    pub points: Vec<f32>,
    pub style: StrokeStyle,
}

impl DrawLine {
    pub fn new(style: StrokeStyle, x: f32, y: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: vec![x, y],
            style,
        }
    }

    pub fn push_point(&mut self, x: f32, y: f32) {
        self.points.push(x);
        self.points.push(y);
    }

    pub fn point_count(&self) -> usize {
        self.points.len() / 2
    }
}

// ============================================================================
// STICKERS
// ============================================================================

/// An independently transformable raster object. `pos` is the sticker's
/// center in card-local space; insertion order is paint order.
#[derive(Clone)]
pub struct StickerItem {
    pub id: Uuid,
    pub image: Arc<RgbaImage>,
    pub pos: Pos2,
    pub scale: f32,
    pub rotation_deg: f32,
}

impl StickerItem {
    pub fn new(image: Arc<RgbaImage>, pos: Pos2) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            pos,
            scale: STICKER_DEFAULT_SCALE,
            rotation_deg: 0.0,
        }
    }

    /// Half extents of the scaled (unrotated) bounds.
    pub fn half_extents(&self) -> (f32, f32) {
        (
            self.image.width() as f32 * self.scale / 2.0,
            self.image.height() as f32 * self.scale / 2.0,
        )
    }

    /// The four corners of the rotated bounds, card-local, in
    /// top-left/top-right/bottom-right/bottom-left order.
    pub fn corners(&self) -> [Pos2; 4] {
        let (hw, hh) = self.half_extents();
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let rot = |x: f32, y: f32| {
            pos2(
                self.pos.x + x * cos - y * sin,
                self.pos.y + x * sin + y * cos,
            )
        };
        [rot(-hw, -hh), rot(hw, -hh), rot(hw, hh), rot(-hw, hh)]
    }

    /// The scale/rotate handle sits on the bottom-right corner of the
    /// rotated bounds.
    pub fn handle_pos(&self) -> Pos2 {
        self.corners()[2]
    }

    /// Hit test against the rotated bounds (card-local point).
    pub fn contains(&self, p: Pos2) -> bool {
        let (hw, hh) = self.half_extents();
        let (sin, cos) = (-self.rotation_deg.to_radians()).sin_cos();
        let dx = p.x - self.pos.x;
        let dy = p.y - self.pos.y;
        let local_x = dx * cos - dy * sin;
        let local_y = dx * sin + dy * cos;
        local_x.abs() <= hw && local_y.abs() <= hh
    }
}

// ============================================================================
// BACKGROUND
// ============================================================================

/// Largest scale at which the whole image is contained in the card.
pub fn fit_scale(img_w: f32, img_h: f32, card_w: f32, card_h: f32) -> f32 {
    (card_w / img_w).min(card_h / img_h)
}

/// Smallest scale at which the image fully covers the card.
pub fn fill_scale(img_w: f32, img_h: f32, card_w: f32, card_h: f32) -> f32 {
    (card_w / img_w).max(card_h / img_h)
}

/// Offset that centers a `scale`-sized image in the card.
pub fn centered_offset(img_w: f32, img_h: f32, scale: f32, card_w: f32, card_h: f32) -> (f32, f32) {
    (
        (card_w - img_w * scale) / 2.0,
        (card_h - img_h * scale) / 2.0,
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalePreset {
    Fit,
    Fill,
    Actual,
}

/// The background raster and its card-local affine transform
/// (translate + uniform scale).
#[derive(Clone)]
pub struct BackgroundState {
    pub image: Arc<RgbaImage>,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl BackgroundState {
    /// A freshly loaded background always opens centered-and-fit.
    pub fn new_fitted(image: Arc<RgbaImage>, layout: &CardLayout) -> Self {
        let (img_w, img_h) = (image.width() as f32, image.height() as f32);
        let scale = fit_scale(img_w, img_h, layout.card_width(), layout.card_height());
        let (x, y) = centered_offset(img_w, img_h, scale, layout.card_width(), layout.card_height());
        Self { image, x, y, scale }
    }

    /// Clamp-and-store. Does not touch position — only the presets re-center.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_BG_SCALE, MAX_BG_SCALE);
    }

    /// Recompute scale for the preset and re-center the image in the card.
    pub fn apply_preset(&mut self, preset: ScalePreset, layout: &CardLayout) {
        let (img_w, img_h) = (self.image.width() as f32, self.image.height() as f32);
        let (card_w, card_h) = (layout.card_width(), layout.card_height());
        let scale = match preset {
            ScalePreset::Fit => fit_scale(img_w, img_h, card_w, card_h),
            ScalePreset::Fill => fill_scale(img_w, img_h, card_w, card_h),
            ScalePreset::Actual => 1.0,
        };
        self.set_scale(scale);
        let (x, y) = centered_offset(img_w, img_h, self.scale, card_w, card_h);
        self.x = x;
        self.y = y;
    }
}

// ============================================================================
// MODAL DRAG GESTURES
// ============================================================================

/// The gesture recorded at pointer-down. Owns the pointer until release:
/// moves are routed here regardless of mid-drag tool switches, and a release
/// anywhere (including outside the canvas) ends it.
#[derive(Clone, Copy, Debug)]
pub enum DragGesture {
    PanBackground,
    DrawStroke,
    MoveSticker {
        id: Uuid,
        /// Selected before this pointer-down? A press-and-release on an
        /// already-selected sticker toggles it off; a drag does not.
        was_selected: bool,
        moved: bool,
    },
    TransformSticker {
        id: Uuid,
        base_scale: f32,
        base_rotation: f32,
        base_dist: f32,
        base_angle: f32,
    },
}

// ============================================================================
// EDITOR STATE
// ============================================================================

pub struct EditorState {
    pub tool: ToolMode,
    pub brush: BrushSettings,
    pub background: Option<BackgroundState>,
    pub history: StrokeHistory,
    pub stickers: Vec<StickerItem>,
    pub selected_sticker: Option<Uuid>,
    pub frame: Option<Arc<RgbaImage>>,

    drawing: bool,
    gesture: Option<DragGesture>,
    last_pointer: Option<Pos2>,
    dirty: bool,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            tool: ToolMode::Move,
            brush: BrushSettings::default(),
            background: None,
            history: StrokeHistory::new(),
            stickers: Vec::new(),
            selected_sticker: None,
            frame: None,
            drawing: false,
            gesture: None,
            last_pointer: None,
            dirty: true,
        }
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- dirty tracking -----------------------------------------------------

    /// True once anything that affects composited pixels changed.
    /// Cleared by the render path via [`take_dirty`](Self::take_dirty).
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // ---- tool mode ----------------------------------------------------------

    /// Switch the active tool. Leaves background position, strokes, stickers
    /// and the selection untouched — selection simply stops being shown and
    /// interactive outside Sticker mode.
    pub fn set_tool(&mut self, tool: ToolMode) {
        self.tool = tool;
    }

    // ---- background ---------------------------------------------------------

    pub fn set_background(&mut self, image: Arc<RgbaImage>, layout: &CardLayout) {
        self.background = Some(BackgroundState::new_fitted(image, layout));
        self.mark_dirty();
    }

    /// Drag the background. Only valid in Move mode with an image loaded;
    /// anything else is a no-op. Unconstrained — the image may be panned
    /// entirely outside the visible card.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if self.tool != ToolMode::Move {
            return;
        }
        self.pan_unchecked(dx, dy);
    }

    fn pan_unchecked(&mut self, dx: f32, dy: f32) {
        if let Some(bg) = self.background.as_mut() {
            bg.x += dx;
            bg.y += dy;
            self.dirty = true;
        }
    }

    pub fn set_background_scale(&mut self, scale: f32) {
        if let Some(bg) = self.background.as_mut() {
            bg.set_scale(scale);
            self.dirty = true;
        }
    }

    pub fn apply_background_preset(&mut self, preset: ScalePreset, layout: &CardLayout) {
        if let Some(bg) = self.background.as_mut() {
            bg.apply_preset(preset, layout);
            self.dirty = true;
        }
    }

    // ---- drawing ------------------------------------------------------------

    /// Start a stroke at a canvas position. Draw mode only. The current
    /// brush configuration is frozen into the stroke's style, and the redo
    /// stack is invalidated.
    pub fn begin_stroke(&mut self, canvas_pos: Pos2, layout: &CardLayout) {
        if self.tool != ToolMode::Draw {
            return;
        }
        let p = layout.to_card(canvas_pos);
        self.history.push(DrawLine::new(self.brush.resolve(), p.x, p.y));
        self.drawing = true;
        self.mark_dirty();
    }

    /// Append a point to the in-progress stroke. No-op unless a stroke is
    /// active.
    pub fn extend_stroke(&mut self, canvas_pos: Pos2, layout: &CardLayout) {
        if !self.drawing {
            return;
        }
        let p = layout.to_card(canvas_pos);
        if let Some(stroke) = self.history.active_mut() {
            stroke.push_point(p.x, p.y);
            self.dirty = true;
        }
    }

    /// Freeze the in-progress stroke. It stays in the committed list.
    pub fn end_stroke(&mut self) {
        self.drawing = false;
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn undo(&mut self) {
        if self.drawing {
            return;
        }
        if self.history.undo() {
            self.mark_dirty();
        }
    }

    pub fn redo(&mut self) {
        if self.drawing {
            return;
        }
        if self.history.redo() {
            self.mark_dirty();
        }
    }

    // ---- stickers -----------------------------------------------------------

    /// Add a batch of stickers at the card center, fanned out by index
    /// parity: even indices land at center − 60 on both axes, odd at
    /// center + 60.
    pub fn add_stickers(&mut self, images: Vec<Arc<RgbaImage>>, layout: &CardLayout) {
        let center = layout.card_center();
        for (i, image) in images.into_iter().enumerate() {
            let offset = if i % 2 == 0 {
                -STICKER_BATCH_OFFSET
            } else {
                STICKER_BATCH_OFFSET
            };
            let pos = pos2(center.x + offset, center.y + offset);
            self.stickers.push(StickerItem::new(image, pos));
        }
        self.mark_dirty();
    }

    pub fn sticker(&self, id: Uuid) -> Option<&StickerItem> {
        self.stickers.iter().find(|s| s.id == id)
    }

    fn sticker_mut(&mut self, id: Uuid) -> Option<&mut StickerItem> {
        self.stickers.iter_mut().find(|s| s.id == id)
    }

    /// Topmost sticker under a card-local point (later entries paint on top,
    /// so they hit-test first).
    pub fn sticker_at(&self, card_pos: Pos2) -> Option<Uuid> {
        self.stickers
            .iter()
            .rev()
            .find(|s| s.contains(card_pos))
            .map(|s| s.id)
    }

    /// Toggle selection. Sticker mode only; selecting the already-selected
    /// sticker deselects it.
    pub fn toggle_select(&mut self, id: Uuid) {
        if self.tool != ToolMode::Sticker {
            return;
        }
        if self.sticker(id).is_none() {
            return;
        }
        self.selected_sticker = if self.selected_sticker == Some(id) {
            None
        } else {
            Some(id)
        };
    }

    pub fn clear_selection(&mut self) {
        self.selected_sticker = None;
    }

    /// Move a sticker by a delta. Sticker mode only.
    pub fn drag_sticker(&mut self, id: Uuid, dx: f32, dy: f32) {
        if self.tool != ToolMode::Sticker {
            return;
        }
        self.drag_sticker_unchecked(id, dx, dy);
    }

    fn drag_sticker_unchecked(&mut self, id: Uuid, dx: f32, dy: f32) {
        if let Some(sticker) = self.sticker_mut(id) {
            sticker.pos.x += dx;
            sticker.pos.y += dy;
            self.dirty = true;
        }
    }

    /// Set scale and rotation together. Sticker mode only — driven by the
    /// transform handle, which is only attached in that mode.
    pub fn transform_sticker(&mut self, id: Uuid, scale: f32, rotation_deg: f32) {
        if self.tool != ToolMode::Sticker {
            return;
        }
        self.transform_sticker_unchecked(id, scale, rotation_deg);
    }

    fn transform_sticker_unchecked(&mut self, id: Uuid, scale: f32, rotation_deg: f32) {
        if let Some(sticker) = self.sticker_mut(id) {
            sticker.scale = scale.clamp(MIN_STICKER_SCALE, MAX_STICKER_SCALE);
            sticker.rotation_deg = rotation_deg;
            self.dirty = true;
        }
    }

    /// Remove the selected sticker (exactly one entry, by id) and clear the
    /// selection. No-op without a selection.
    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_sticker.take() else {
            return;
        };
        self.stickers.retain(|s| s.id != id);
        self.mark_dirty();
    }

    // ---- frame --------------------------------------------------------------

    /// Single slot — replaces any previous frame.
    pub fn set_frame(&mut self, image: Arc<RgbaImage>) {
        self.frame = Some(image);
        self.mark_dirty();
    }

    pub fn clear_frame(&mut self) {
        if self.frame.take().is_some() {
            self.mark_dirty();
        }
    }

    // ---- pointer routing ----------------------------------------------------

    /// Pointer pressed inside the canvas. Starts the gesture the active tool
    /// dictates; the gesture then owns the pointer until `pointer_up`.
    pub fn pointer_down(&mut self, canvas_pos: Pos2, layout: &CardLayout) {
        self.last_pointer = Some(canvas_pos);
        match self.tool {
            ToolMode::Move => {
                self.clear_selection();
                if self.background.is_some() {
                    self.gesture = Some(DragGesture::PanBackground);
                }
            }
            ToolMode::Draw => {
                self.clear_selection();
                self.begin_stroke(canvas_pos, layout);
                self.gesture = Some(DragGesture::DrawStroke);
            }
            ToolMode::Sticker => {
                let card_pos = layout.to_card(canvas_pos);
                if let Some(gesture) = self.transform_gesture_at(card_pos) {
                    self.gesture = Some(gesture);
                    return;
                }
                if let Some(id) = self.sticker_at(card_pos) {
                    let was_selected = self.selected_sticker == Some(id);
                    if !was_selected {
                        self.selected_sticker = Some(id);
                    }
                    self.gesture = Some(DragGesture::MoveSticker {
                        id,
                        was_selected,
                        moved: false,
                    });
                } else {
                    self.clear_selection();
                }
            }
        }
    }

    /// If the press landed on the selected sticker's transform handle,
    /// capture the baseline for the scale+rotate gesture.
    fn transform_gesture_at(&self, card_pos: Pos2) -> Option<DragGesture> {
        let id = self.selected_sticker?;
        let sticker = self.sticker(id)?;
        let handle = sticker.handle_pos();
        let dx = card_pos.x - handle.x;
        let dy = card_pos.y - handle.y;
        if dx * dx + dy * dy > HANDLE_HIT_RADIUS * HANDLE_HIT_RADIUS {
            return None;
        }
        let vx = card_pos.x - sticker.pos.x;
        let vy = card_pos.y - sticker.pos.y;
        Some(DragGesture::TransformSticker {
            id,
            base_scale: sticker.scale,
            base_rotation: sticker.rotation_deg,
            base_dist: (vx * vx + vy * vy).sqrt().max(1.0),
            base_angle: vy.atan2(vx),
        })
    }

    /// Pointer moved while down. Routed entirely by the recorded gesture.
    pub fn pointer_move(&mut self, canvas_pos: Pos2, layout: &CardLayout) {
        let Some(gesture) = self.gesture else {
            return;
        };
        let prev = self.last_pointer.unwrap_or(canvas_pos);
        let (dx, dy) = (canvas_pos.x - prev.x, canvas_pos.y - prev.y);
        self.last_pointer = Some(canvas_pos);

        match gesture {
            DragGesture::PanBackground => self.pan_unchecked(dx, dy),
            DragGesture::DrawStroke => self.extend_stroke(canvas_pos, layout),
            DragGesture::MoveSticker {
                id,
                was_selected,
                moved,
            } => {
                self.drag_sticker_unchecked(id, dx, dy);
                if !moved && (dx != 0.0 || dy != 0.0) {
                    self.gesture = Some(DragGesture::MoveSticker {
                        id,
                        was_selected,
                        moved: true,
                    });
                }
            }
            DragGesture::TransformSticker {
                id,
                base_scale,
                base_rotation,
                base_dist,
                base_angle,
            } => {
                let Some(sticker) = self.sticker(id) else {
                    return;
                };
                let card_pos = layout.to_card(canvas_pos);
                let vx = card_pos.x - sticker.pos.x;
                let vy = card_pos.y - sticker.pos.y;
                let dist = (vx * vx + vy * vy).sqrt();
                let angle = vy.atan2(vx);
                let scale = base_scale * dist / base_dist;
                let rotation = base_rotation + (angle - base_angle).to_degrees();
                self.transform_sticker_unchecked(id, scale, rotation);
            }
        }
    }

    /// Pointer released — anywhere. The universal drag-release signal; there
    /// is no other way a gesture ends, so stuck drags cannot occur.
    pub fn pointer_up(&mut self) {
        match self.gesture.take() {
            Some(DragGesture::DrawStroke) => self.end_stroke(),
            Some(DragGesture::MoveSticker {
                was_selected,
                moved,
                ..
            }) => {
                // Press-and-release on an already-selected sticker toggles
                // it off; any movement makes it a drag instead.
                if was_selected && !moved {
                    self.selected_sticker = None;
                }
            }
            _ => {}
        }
        self.last_pointer = None;
    }

    pub fn active_gesture(&self) -> Option<DragGesture> {
        self.gesture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn brush_resolution_rules() {
        let mut brush = BrushSettings {
            kind: BrushKind::Eraser,
            color: Color32::RED,
            thickness: 12.0,
            opacity: 0.4,
        };
        let style = brush.resolve();
        assert_eq!(style.blend, BlendMode::Erase);
        assert_eq!(style.opacity, 1.0);
        assert!(style.glow.is_none());

        brush.kind = BrushKind::Highlight;
        let style = brush.resolve();
        assert_eq!(style.blend, BlendMode::Additive);
        assert_eq!(style.opacity, 0.4);
        let glow = style.glow.expect("highlight carries a glow");
        // round(12 * 1.2) = 14, above the floor of 10
        assert_eq!(glow.radius, 14.0);
        assert_eq!(glow.color, Color32::RED);

        brush.thickness = 4.0;
        let glow = brush.resolve().glow.unwrap();
        // round(4 * 1.2) = 5 — clamped up to the floor
        assert_eq!(glow.radius, 10.0);

        brush.kind = BrushKind::Pen;
        let style = brush.resolve();
        assert_eq!(style.blend, BlendMode::Normal);
        assert_eq!(style.opacity, 0.4);
        assert!(style.glow.is_none());
    }

    #[test]
    fn stroke_style_frozen_at_begin() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.set_tool(ToolMode::Draw);
        editor.brush.color = Color32::RED;
        editor.begin_stroke(pos2(50.0, 50.0), &layout);
        editor.end_stroke();

        editor.brush.color = Color32::BLUE;
        assert_eq!(editor.history.strokes()[0].style.color, Color32::RED);
    }

    #[test]
    fn scale_clamps_to_bounds() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.set_background(test_image(100, 100), &layout);
        editor.set_background_scale(100.0);
        assert_eq!(editor.background.as_ref().unwrap().scale, MAX_BG_SCALE);
        editor.set_background_scale(0.0001);
        assert_eq!(editor.background.as_ref().unwrap().scale, MIN_BG_SCALE);
    }

    #[test]
    fn pan_requires_move_mode() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.set_background(test_image(100, 100), &layout);
        let before = editor.background.as_ref().unwrap().x;

        editor.set_tool(ToolMode::Sticker);
        editor.pan(25.0, 25.0);
        assert_eq!(editor.background.as_ref().unwrap().x, before);

        editor.set_tool(ToolMode::Move);
        editor.pan(25.0, 0.0);
        assert_eq!(editor.background.as_ref().unwrap().x, before + 25.0);
    }

    #[test]
    fn tool_switch_keeps_background_position() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.set_background(test_image(100, 100), &layout);
        editor.pan(30.0, -10.0);
        let (x, y) = {
            let bg = editor.background.as_ref().unwrap();
            (bg.x, bg.y)
        };
        editor.set_tool(ToolMode::Draw);
        editor.set_tool(ToolMode::Move);
        let bg = editor.background.as_ref().unwrap();
        assert_eq!((bg.x, bg.y), (x, y));
    }

    #[test]
    fn sticker_batch_fans_out_by_parity() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.add_stickers(vec![test_image(40, 40), test_image(40, 40)], &layout);

        let center = layout.card_center();
        assert_eq!(editor.stickers.len(), 2);
        assert_eq!(
            editor.stickers[0].pos,
            pos2(center.x - STICKER_BATCH_OFFSET, center.y - STICKER_BATCH_OFFSET)
        );
        assert_eq!(
            editor.stickers[1].pos,
            pos2(center.x + STICKER_BATCH_OFFSET, center.y + STICKER_BATCH_OFFSET)
        );
        assert_eq!(editor.stickers[0].scale, STICKER_DEFAULT_SCALE);
        assert_eq!(editor.stickers[0].rotation_deg, 0.0);
    }

    #[test]
    fn selection_toggles_and_respects_mode() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.add_stickers(vec![test_image(40, 40)], &layout);
        let id = editor.stickers[0].id;

        // Not in Sticker mode — select is a no-op
        editor.toggle_select(id);
        assert_eq!(editor.selected_sticker, None);

        editor.set_tool(ToolMode::Sticker);
        editor.toggle_select(id);
        assert_eq!(editor.selected_sticker, Some(id));
        editor.toggle_select(id);
        assert_eq!(editor.selected_sticker, None);
    }

    #[test]
    fn delete_selected_removes_one_and_clears() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.add_stickers(vec![test_image(40, 40), test_image(40, 40)], &layout);
        editor.set_tool(ToolMode::Sticker);
        let id = editor.stickers[0].id;
        editor.toggle_select(id);

        editor.delete_selected();
        assert_eq!(editor.stickers.len(), 1);
        assert!(editor.stickers.iter().all(|s| s.id != id));
        assert_eq!(editor.selected_sticker, None);

        // No selection → collection untouched
        editor.delete_selected();
        assert_eq!(editor.stickers.len(), 1);
    }

    #[test]
    fn rotated_sticker_hit_test() {
        let mut sticker = StickerItem::new(test_image(100, 50), pos2(0.0, 0.0));
        sticker.scale = 1.0;
        // Axis-aligned: inside horizontally, outside vertically
        assert!(sticker.contains(pos2(45.0, 0.0)));
        assert!(!sticker.contains(pos2(0.0, 40.0)));
        // After 90° the extents swap
        sticker.rotation_deg = 90.0;
        assert!(!sticker.contains(pos2(45.0, 0.0)));
        assert!(sticker.contains(pos2(0.0, 40.0)));
    }

    #[test]
    fn gesture_owns_pointer_across_mode_switch() {
        let layout = CardLayout::from_width(360.0);
        let mut editor = EditorState::new();
        editor.set_background(test_image(100, 100), &layout);
        editor.add_stickers(vec![test_image(40, 40)], &layout);
        editor.set_tool(ToolMode::Sticker);

        let sticker_canvas = layout.from_card(editor.stickers[0].pos);
        let bg_before = (
            editor.background.as_ref().unwrap().x,
            editor.background.as_ref().unwrap().y,
        );

        // Drag starting on a sticker in Sticker mode moves the sticker only,
        // even after a mid-drag tool switch.
        editor.pointer_down(sticker_canvas, &layout);
        editor.pointer_move(sticker_canvas + egui::vec2(15.0, 5.0), &layout);
        editor.set_tool(ToolMode::Move);
        editor.pointer_move(sticker_canvas + egui::vec2(30.0, 10.0), &layout);
        editor.pointer_up();

        let bg = editor.background.as_ref().unwrap();
        assert_eq!((bg.x, bg.y), bg_before);
        let moved = editor.stickers[0].pos;
        let start = layout.to_card(sticker_canvas);
        assert_eq!(moved, pos2(start.x + 30.0, start.y + 10.0));
    }
}
