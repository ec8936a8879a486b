//! CPU compositor for the card.
//!
//! Each content layer rasterizes into RGBA pixel buffers and the stack merges
//! bottom-to-top: background → drawing → stickers → frame, then the rounded
//! card mask clips the result. The drawing layer accumulates in its own
//! buffer before merging, so eraser strokes (destination-out) can only remove
//! ink — never background, sticker or frame pixels beneath.
//!
//! `render_card` is the single rasterization entry point. The on-screen path
//! calls it at density 1 and uploads the result as an egui texture; export
//! and the headless CLI call it at higher densities. Guide overlays are drawn
//! by the UI on top of the displayed texture and do not exist here, which is
//! what keeps them out of every export.

use egui::Color32;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::editor::{BackgroundState, DrawLine, EditorState, StickerItem};
use crate::layout::{CARD_CORNER_RADIUS, CardLayout};

/// Width of the anti-aliased edge band on stroke cores, in output pixels.
const STROKE_AA: f32 = 0.75;

// ============================================================================
// BLEND MODES
// ============================================================================

/// Per-stroke composite op within the drawing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Normal,
    /// "lighter" — channel sums accumulate toward white.
    Additive,
    /// Destination-out — new pixels remove opacity from the layer buffer.
    Erase,
}

impl BlendMode {
    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Additive => "Additive",
            BlendMode::Erase => "Erase",
        }
    }
}

/// Blend one pixel onto a base pixel. `opacity` scales the top pixel's alpha.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to composite
    if top[3] == 0 {
        return base;
    }
    // Fast path: opaque Normal overwrite
    if matches!(mode, BlendMode::Normal) && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let base_a = base[3] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    match mode {
        BlendMode::Erase => {
            // Alpha removal only; color channels stay untouched so partially
            // erased ink keeps its hue.
            let out_a = base_a * (1.0 - top_a);
            Rgba([base[0], base[1], base[2], (out_a * 255.0).round() as u8])
        }
        BlendMode::Normal => {
            let out_a = top_a + base_a * (1.0 - top_a);
            if out_a <= 0.0 {
                return Rgba([0, 0, 0, 0]);
            }
            let channel = |b: u8, t: u8| -> u8 {
                let b = b as f32 / 255.0;
                let t = t as f32 / 255.0;
                let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
                (c * 255.0).round().clamp(0.0, 255.0) as u8
            };
            Rgba([
                channel(base[0], top[0]),
                channel(base[1], top[1]),
                channel(base[2], top[2]),
                (out_a * 255.0).round() as u8,
            ])
        }
        BlendMode::Additive => {
            let out_a = (base_a + top_a).min(1.0);
            if out_a <= 0.0 {
                return Rgba([0, 0, 0, 0]);
            }
            // Premultiplied channel sums, un-premultiplied by the summed alpha
            let channel = |b: u8, t: u8| -> u8 {
                let b = b as f32 / 255.0;
                let t = t as f32 / 255.0;
                let c = (b * base_a + t * top_a) / out_a;
                (c * 255.0).round().clamp(0.0, 255.0) as u8
            };
            Rgba([
                channel(base[0], top[0]),
                channel(base[1], top[1]),
                channel(base[2], top[2]),
                (out_a * 255.0).round() as u8,
            ])
        }
    }
}

// ============================================================================
// SAMPLING
// ============================================================================

/// Bilinear sample at continuous image coordinates. Transparent outside the
/// image — content never smears past its own edge.
fn sample_bilinear(img: &RgbaImage, u: f32, v: f32) -> Rgba<u8> {
    let (iw, ih) = (img.width(), img.height());
    if u < 0.0 || v < 0.0 || u >= iw as f32 || v >= ih as f32 {
        return Rgba([0, 0, 0, 0]);
    }
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(iw - 1);
    let y1 = (y0 + 1).min(ih - 1);

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let lerp2 = |c: usize| -> u8 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        (top * (1.0 - fy) + bottom * fy).round() as u8
    };
    Rgba([lerp2(0), lerp2(1), lerp2(2), lerp2(3)])
}

// ============================================================================
// STROKE RASTERIZATION
// ============================================================================

/// Catmull-Rom interpolation between p1 and p2.
fn catmull_rom(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), p3: (f32, f32), t: f32) -> (f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    let spline = |a: f32, b: f32, c: f32, d: f32| -> f32 {
        0.5 * ((2.0 * b)
            + (-a + c) * t
            + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2
            + (-a + 3.0 * b - 3.0 * c + d) * t3)
    };
    (
        spline(p0.0, p1.0, p2.0, p3.0),
        spline(p0.1, p1.1, p2.1, p3.1),
    )
}

/// Resample the recorded polyline into a dense smoothed path (card-local
/// units, roughly one sample per pixel). Endpoint tangents are clamped by
/// repeating the first/last points.
fn smoothed_path(points: &[f32]) -> Vec<(f32, f32)> {
    let n = points.len() / 2;
    if n == 0 {
        return Vec::new();
    }
    let pt = |i: isize| -> (f32, f32) {
        let i = i.clamp(0, n as isize - 1) as usize;
        (points[2 * i], points[2 * i + 1])
    };
    let mut out = Vec::with_capacity(n * 4);
    out.push(pt(0));
    for i in 0..n.saturating_sub(1) {
        let i = i as isize;
        let (p0, p1, p2, p3) = (pt(i - 1), pt(i), pt(i + 1), pt(i + 2));
        let seg = ((p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2)).sqrt();
        let steps = (seg.ceil() as usize).clamp(1, 64);
        for s in 1..=steps {
            out.push(catmull_rom(p0, p1, p2, p3, s as f32 / steps as f32));
        }
    }
    out
}

/// Scalar coverage buffer for one stroke, restricted to the stroke's
/// bounding box. Stamps max-combine so overlapping dabs never exceed the
/// stroke's configured opacity.
struct StrokeMask {
    x0: i32,
    y0: i32,
    w: i32,
    h: i32,
    data: Vec<f32>,
}

impl StrokeMask {
    fn for_path(path: &[(f32, f32)], reach: f32, clip_w: u32, clip_h: u32) -> Option<Self> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for &(x, y) in path {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let x0 = ((min_x - reach).floor() as i32).max(0);
        let y0 = ((min_y - reach).floor() as i32).max(0);
        let x1 = ((max_x + reach).ceil() as i32 + 1).min(clip_w as i32);
        let y1 = ((max_y + reach).ceil() as i32 + 1).min(clip_h as i32);
        let (w, h) = (x1 - x0, y1 - y0);
        if w <= 0 || h <= 0 {
            return None;
        }
        Some(Self {
            x0,
            y0,
            w,
            h,
            data: vec![0.0; (w * h) as usize],
        })
    }

    /// Stamp a disc: coverage 1 inside `inner`, linear falloff to 0 at
    /// `outer`, combined with max.
    fn stamp(&mut self, cx: f32, cy: f32, inner: f32, outer: f32) {
        let px0 = ((cx - outer).floor() as i32).max(self.x0);
        let py0 = ((cy - outer).floor() as i32).max(self.y0);
        let px1 = ((cx + outer).ceil() as i32 + 1).min(self.x0 + self.w);
        let py1 = ((cy + outer).ceil() as i32 + 1).min(self.y0 + self.h);
        let band = (outer - inner).max(1e-3);
        for y in py0..py1 {
            for x in px0..px1 {
                let dx = (x as f32 + 0.5) - cx;
                let dy = (y as f32 + 0.5) - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d >= outer {
                    continue;
                }
                let c = if d <= inner {
                    1.0
                } else {
                    (outer - d) / band
                };
                let idx = ((y - self.y0) * self.w + (x - self.x0)) as usize;
                if c > self.data[idx] {
                    self.data[idx] = c;
                }
            }
        }
    }

    /// Walk the path (already in output pixels) stamping at ≤1 px spacing.
    fn stamp_path(&mut self, path: &[(f32, f32)], inner: f32, outer: f32) {
        let mut last: Option<(f32, f32)> = None;
        for &(x, y) in path {
            match last {
                None => self.stamp(x, y, inner, outer),
                Some((lx, ly)) => {
                    let dx = x - lx;
                    let dy = y - ly;
                    let dist = (dx * dx + dy * dy).sqrt();
                    let steps = dist.ceil().max(1.0) as usize;
                    for s in 1..=steps {
                        let t = s as f32 / steps as f32;
                        self.stamp(lx + dx * t, ly + dy * t, inner, outer);
                    }
                }
            }
            last = Some((x, y));
        }
    }
}

/// Composite a coverage mask into the target. `squared` turns the linear
/// falloff into a softer quadratic one (used for glow halos).
fn composite_mask(
    target: &mut RgbaImage,
    mask: &StrokeMask,
    color: Color32,
    opacity: f32,
    blend: BlendMode,
    squared: bool,
) {
    for y in 0..mask.h {
        for x in 0..mask.w {
            let c = mask.data[(y * mask.w + x) as usize];
            if c <= 0.0 {
                continue;
            }
            let c = if squared { c * c } else { c };
            let a = (c * opacity * 255.0).round().clamp(0.0, 255.0) as u8;
            if a == 0 {
                continue;
            }
            let (tx, ty) = ((mask.x0 + x) as u32, (mask.y0 + y) as u32);
            let top = Rgba([color.r(), color.g(), color.b(), a]);
            let base = *target.get_pixel(tx, ty);
            target.put_pixel(tx, ty, blend_pixel(base, top, blend, 1.0));
        }
    }
}

/// Rasterize one stroke into the drawing layer buffer. Glow first (so the
/// halo sits beneath the core), then the anti-aliased core with the stroke's
/// frozen blend mode.
fn composite_stroke(target: &mut RgbaImage, stroke: &DrawLine, density: f32) {
    let path: Vec<(f32, f32)> = smoothed_path(&stroke.points)
        .into_iter()
        .map(|(x, y)| (x * density, y * density))
        .collect();
    if path.is_empty() {
        return;
    }
    let (w, h) = target.dimensions();
    let radius = (stroke.style.width / 2.0 * density).max(0.5);

    if let Some(glow) = stroke.style.glow {
        let glow_outer = radius + glow.radius * density;
        if let Some(mut mask) = StrokeMask::for_path(&path, glow_outer, w, h) {
            mask.stamp_path(&path, radius, glow_outer);
            composite_mask(
                target,
                &mask,
                glow.color,
                stroke.style.opacity,
                stroke.style.blend,
                true,
            );
        }
    }

    let outer = radius + STROKE_AA;
    let inner = (radius - STROKE_AA).max(0.0);
    if let Some(mut mask) = StrokeMask::for_path(&path, outer, w, h) {
        mask.stamp_path(&path, inner, outer);
        composite_mask(
            target,
            &mask,
            stroke.style.color,
            stroke.style.opacity,
            stroke.style.blend,
            false,
        );
    }
}

// ============================================================================
// LAYER PASSES
// ============================================================================

/// Background pass: affine sample (translate + uniform scale) of the raster
/// into the bottom of the stack. The target is still transparent here, so
/// samples are written directly.
fn render_background(target: &mut RgbaImage, bg: &BackgroundState, density: f32) {
    let (w, _h) = target.dimensions();
    let img = bg.image.as_ref();
    let row_bytes = w as usize * 4;
    target
        .par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w as usize {
                let card_x = (x as f32 + 0.5) / density;
                let card_y = (y as f32 + 0.5) / density;
                let u = (card_x - bg.x) / bg.scale;
                let v = (card_y - bg.y) / bg.scale;
                let px = sample_bilinear(img, u, v);
                row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
            }
        });
}

/// Drawing pass: strokes accumulate in an isolated buffer in commit order.
fn render_drawing(strokes: &[DrawLine], density: f32, w: u32, h: u32) -> RgbaImage {
    let mut buf = RgbaImage::new(w, h);
    for stroke in strokes {
        composite_stroke(&mut buf, stroke, density);
    }
    buf
}

/// Source-over merge of a full layer buffer onto the stack.
fn composite_over(target: &mut RgbaImage, layer: &RgbaImage) {
    let w = target.width() as usize;
    let row_bytes = w * 4;
    let layer_buf = layer.as_raw();
    target
        .par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &layer_buf[y * row_bytes..(y + 1) * row_bytes];
            for x in 0..w {
                let i = x * 4;
                let top = Rgba([src_row[i], src_row[i + 1], src_row[i + 2], src_row[i + 3]]);
                if top[3] == 0 {
                    continue;
                }
                let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                let out = blend_pixel(base, top, BlendMode::Normal, 1.0);
                row[i..i + 4].copy_from_slice(&out.0);
            }
        });
}

/// Sticker pass: each sticker samples through its inverse transform
/// (rotate + uniform scale about its center), source-over, insertion order.
fn render_stickers(target: &mut RgbaImage, stickers: &[StickerItem], density: f32) {
    let (tw, th) = target.dimensions();
    for sticker in stickers {
        let img = sticker.image.as_ref();
        let (iw, ih) = (img.width() as f32, img.height() as f32);
        let cx = sticker.pos.x * density;
        let cy = sticker.pos.y * density;
        let scale = sticker.scale * density;

        // Bounding box of the rotated corners, clamped to the target
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for corner in sticker.corners() {
            min_x = min_x.min(corner.x * density);
            min_y = min_y.min(corner.y * density);
            max_x = max_x.max(corner.x * density);
            max_y = max_y.max(corner.y * density);
        }
        let x0 = (min_x.floor() as i32).max(0);
        let y0 = (min_y.floor() as i32).max(0);
        let x1 = ((max_x.ceil() as i32) + 1).min(tw as i32);
        let y1 = ((max_y.ceil() as i32) + 1).min(th as i32);
        if x0 >= x1 || y0 >= y1 {
            continue;
        }

        let (sin, cos) = (-sticker.rotation_deg.to_radians()).sin_cos();
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = (x as f32 + 0.5) - cx;
                let dy = (y as f32 + 0.5) - cy;
                // Into unrotated sticker-local space, then into image coords
                let local_x = dx * cos - dy * sin;
                let local_y = dx * sin + dy * cos;
                let u = local_x / scale + iw / 2.0;
                let v = local_y / scale + ih / 2.0;
                let top = sample_bilinear(img, u, v);
                if top[3] == 0 {
                    continue;
                }
                let base = *target.get_pixel(x as u32, y as u32);
                target.put_pixel(x as u32, y as u32, blend_pixel(base, top, BlendMode::Normal, 1.0));
            }
        }
    }
}

/// Frame pass: stretched exactly to the card, source-over, topmost.
fn render_frame(target: &mut RgbaImage, frame: &RgbaImage) {
    let (w, h) = target.dimensions();
    let (iw, ih) = (frame.width() as f32, frame.height() as f32);
    let row_bytes = w as usize * 4;
    target
        .par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let v = (y as f32 + 0.5) / h as f32 * ih - 0.5;
            for x in 0..w as usize {
                let u = (x as f32 + 0.5) / w as f32 * iw - 0.5;
                let top = sample_bilinear(frame, u.max(0.0), v.max(0.0));
                if top[3] == 0 {
                    continue;
                }
                let i = x * 4;
                let base = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                let out = blend_pixel(base, top, BlendMode::Normal, 1.0);
                row[i..i + 4].copy_from_slice(&out.0);
            }
        });
}

/// Clip the stack to the rounded card shape by scaling alpha with the
/// rounded-rect coverage (anti-aliased over a one-pixel band).
fn apply_rounded_mask(target: &mut RgbaImage, radius: f32) {
    let (w, h) = target.dimensions();
    let (half_w, half_h) = (w as f32 / 2.0, h as f32 / 2.0);
    let radius = radius.min(half_w).min(half_h);
    let row_bytes = w as usize * 4;
    target
        .par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let py = (y as f32 + 0.5) - half_h;
            for x in 0..w as usize {
                let px = (x as f32 + 0.5) - half_w;
                // Signed distance to the rounded rectangle
                let qx = px.abs() - (half_w - radius);
                let qy = py.abs() - (half_h - radius);
                let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
                let dist = outside + qx.max(qy).min(0.0) - radius;
                let coverage = (0.5 - dist).clamp(0.0, 1.0);
                if coverage >= 1.0 {
                    continue;
                }
                let i = x * 4;
                row[i + 3] = (row[i + 3] as f32 * coverage).round() as u8;
            }
        });
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Rasterize the card rectangle at `density` output pixels per card-local
/// unit. Shared by display, export and the CLI — there is exactly one way
/// pixels get composited.
pub fn render_card(state: &EditorState, layout: &CardLayout, density: f32) -> RgbaImage {
    let w = (layout.card_width() * density).round().max(1.0) as u32;
    let h = (layout.card_height() * density).round().max(1.0) as u32;
    let mut out = RgbaImage::new(w, h);

    if let Some(bg) = &state.background {
        render_background(&mut out, bg, density);
    }
    if !state.history.strokes().is_empty() {
        let drawing = render_drawing(state.history.strokes(), density, w, h);
        composite_over(&mut out, &drawing);
    }
    if !state.stickers.is_empty() {
        render_stickers(&mut out, &state.stickers, density);
    }
    if let Some(frame) = &state.frame {
        render_frame(&mut out, frame);
    }
    apply_rounded_mask(&mut out, CARD_CORNER_RADIUS * density);
    out
}

/// Convert a composited buffer into an egui texture image.
pub fn to_color_image(img: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [img.width() as usize, img.height() as usize],
        img.as_raw(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{ScalePreset, ToolMode};
    use crate::layout::CardLayout;
    use egui::pos2;
    use std::sync::Arc;

    #[test]
    fn erase_removes_alpha_keeps_color() {
        let base = Rgba([200, 40, 40, 255]);
        let top = Rgba([0, 0, 0, 255]);
        let out = blend_pixel(base, top, BlendMode::Erase, 1.0);
        assert_eq!(out, Rgba([200, 40, 40, 0]));

        // Half-strength erase halves the alpha
        let out = blend_pixel(base, Rgba([0, 0, 0, 128]), BlendMode::Erase, 1.0);
        assert_eq!(out[0], 200);
        assert!((out[3] as i32 - 127).abs() <= 1);
    }

    #[test]
    fn additive_accumulates_alpha() {
        let base = Rgba([255, 255, 255, 100]);
        let top = Rgba([255, 255, 255, 100]);
        let out = blend_pixel(base, top, BlendMode::Additive, 1.0);
        assert_eq!(out[3], 200);
    }

    #[test]
    fn normal_over_transparent_is_source() {
        let out = blend_pixel(Rgba([0, 0, 0, 0]), Rgba([10, 20, 30, 200]), BlendMode::Normal, 1.0);
        assert_eq!(out, Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn render_dimensions_scale_with_density() {
        let layout = CardLayout::from_width(360.0);
        let state = EditorState::new();
        let img = render_card(&state, &layout, 2.0);
        assert_eq!(img.width(), (layout.card_width() * 2.0).round() as u32);
        assert_eq!(img.height(), (layout.card_height() * 2.0).round() as u32);
    }

    #[test]
    fn rounded_mask_clips_corners_not_center() {
        let layout = CardLayout::from_width(360.0);
        let mut state = EditorState::new();
        let bg = Arc::new(RgbaImage::from_pixel(
            100,
            150,
            Rgba([250, 10, 10, 255]),
        ));
        state.set_background(bg, &layout);
        state.apply_background_preset(ScalePreset::Fill, &layout);

        let img = render_card(&state, &layout, 1.0);
        // Corner pixel is outside the rounded shape
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        // Center is fully covered
        let center = img.get_pixel(img.width() / 2, img.height() / 2);
        assert_eq!(center[3], 255);
        assert_eq!(center[0], 250);
    }

    #[test]
    fn eraser_only_affects_drawing_layer() {
        let layout = CardLayout::from_width(360.0);
        let mut state = EditorState::new();
        let bg = Arc::new(RgbaImage::from_pixel(
            100,
            150,
            Rgba([250, 10, 10, 255]),
        ));
        state.set_background(bg, &layout);
        state.apply_background_preset(ScalePreset::Fill, &layout);
        state.set_tool(ToolMode::Draw);

        let center = layout.from_card(layout.card_center());
        state.brush.color = Color32::WHITE;
        state.brush.thickness = 24.0;

        // Pen stroke through the center…
        state.begin_stroke(pos2(center.x - 40.0, center.y), &layout);
        state.extend_stroke(pos2(center.x + 40.0, center.y), &layout);
        state.end_stroke();

        let painted = render_card(&state, &layout, 1.0);
        let p = painted.get_pixel(painted.width() / 2, painted.height() / 2);
        assert_eq!([p[0], p[1], p[2]], [255, 255, 255], "pen ink covers center");

        // …erased again: the background must survive untouched.
        state.brush.kind = crate::editor::BrushKind::Eraser;
        state.brush.thickness = 40.0;
        state.begin_stroke(pos2(center.x - 50.0, center.y), &layout);
        state.extend_stroke(pos2(center.x + 50.0, center.y), &layout);
        state.end_stroke();

        let erased = render_card(&state, &layout, 1.0);
        let p = erased.get_pixel(erased.width() / 2, erased.height() / 2);
        assert_eq!(p[3], 255, "background alpha intact after erase");
        assert_eq!(p[0], 250, "background color intact after erase");
    }
}
