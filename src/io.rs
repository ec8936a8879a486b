//! Image loading and export.
//!
//! Decodes run on spawned worker threads and report back over an mpsc
//! channel that the app drains once per frame. Every load carries a
//! monotonic per-slot token; a decode that finishes after its slot was
//! re-requested (or replaced) is dropped on arrival — last write wins, stale
//! results can never clobber a newer image.
//!
//! Failures follow the contained-and-local policy: a file that won't decode
//! leaves its slot unpopulated and a WARN in the session log, nothing more.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use image::RgbaImage;

use crate::canvas;
use crate::editor::EditorState;
use crate::layout::CardLayout;
use crate::{log_info, log_warn};

/// Default file name offered by the export save dialog.
pub const EXPORT_FILE_NAME: &str = "photocard.png";

/// Export renders at `pixels_per_point × EXPORT_UPSCALE` output pixels per
/// card unit, capped at [`EXPORT_MAX_DENSITY`].
pub const EXPORT_UPSCALE: f32 = 2.0;
pub const EXPORT_MAX_DENSITY: f32 = 3.0;

pub fn export_density(pixels_per_point: f32) -> f32 {
    (pixels_per_point.max(1.0) * EXPORT_UPSCALE).min(EXPORT_MAX_DENSITY)
}

// ============================================================================
// ASYNC DECODE PIPELINE
// ============================================================================

/// Which model slot a load is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeSlot {
    Background,
    Frame,
    Stickers,
}

impl DecodeSlot {
    fn index(self) -> usize {
        match self {
            DecodeSlot::Background => 0,
            DecodeSlot::Frame => 1,
            DecodeSlot::Stickers => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DecodeSlot::Background => "background",
            DecodeSlot::Frame => "frame",
            DecodeSlot::Stickers => "sticker",
        }
    }
}

/// A pending decode input. Dropped files may arrive as raw bytes (no path),
/// picked files always have one.
pub enum DecodeSource {
    Path(PathBuf),
    Bytes { name: String, bytes: Vec<u8> },
}

impl DecodeSource {
    fn describe(&self) -> String {
        match self {
            DecodeSource::Path(p) => p.display().to_string(),
            DecodeSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Delivered from a worker thread. `images` holds every input that decoded;
/// failed inputs are simply absent.
pub struct DecodeResult {
    pub slot: DecodeSlot,
    pub token: u64,
    pub images: Vec<RgbaImage>,
}

/// Owns the decode worker channel and the per-slot freshness tokens.
pub struct ImageLoader {
    tx: Sender<DecodeResult>,
    rx: Receiver<DecodeResult>,
    tokens: [u64; 3],
    /// Requests spawned but not yet drained (stale ones included).
    pending: usize,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            tokens: [0; 3],
            pending: 0,
        }
    }

    /// True while any worker thread is still owed a `poll` pickup — the UI
    /// keeps scheduling repaints until this drains.
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    pub fn current_token(&self, slot: DecodeSlot) -> u64 {
        self.tokens[slot.index()]
    }

    /// True when a result is still the newest request for its slot.
    pub fn accepts(&self, result: &DecodeResult) -> bool {
        result.token == self.tokens[result.slot.index()]
    }

    /// Kick off an async decode for `slot`. Supersedes any outstanding
    /// request for the same slot.
    pub fn request(&mut self, slot: DecodeSlot, sources: Vec<DecodeSource>) {
        if sources.is_empty() {
            return;
        }
        self.tokens[slot.index()] += 1;
        self.pending += 1;
        let token = self.tokens[slot.index()];
        let tx = self.tx.clone();
        thread::spawn(move || {
            let mut images = Vec::with_capacity(sources.len());
            for source in &sources {
                match decode_source(source) {
                    Ok(img) => images.push(img),
                    Err(e) => {
                        log_warn!("failed to decode {} image {}: {}", slot.label(), source.describe(), e);
                    }
                }
            }
            // Receiver gone means the app is shutting down — nothing to do.
            let _ = tx.send(DecodeResult {
                slot,
                token,
                images,
            });
        });
    }

    /// Drain completed decodes, silently dropping any that were superseded
    /// while in flight.
    pub fn poll(&mut self) -> Vec<DecodeResult> {
        let mut fresh = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            if self.accepts(&result) && !result.images.is_empty() {
                fresh.push(result);
            }
        }
        fresh
    }
}

fn decode_source(source: &DecodeSource) -> Result<RgbaImage, String> {
    let decoded = match source {
        DecodeSource::Path(path) => image::open(path).map_err(|e| e.to_string())?,
        DecodeSource::Bytes { bytes, .. } => {
            image::load_from_memory(bytes).map_err(|e| e.to_string())?
        }
    };
    Ok(decoded.into_rgba8())
}

// ============================================================================
// FILE DIALOGS
// ============================================================================

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

pub fn pick_image_file(title: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

pub fn pick_image_files(title: &str) -> Option<Vec<PathBuf>> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_files()
}

// ============================================================================
// EXPORT
// ============================================================================

/// Rasterize the card and write it to `path` as PNG.
pub fn compose_to_file(
    state: &EditorState,
    layout: &CardLayout,
    density: f32,
    path: &std::path::Path,
) -> Result<(), String> {
    let img = canvas::render_card(state, layout, density);
    img.save(path)
        .map_err(|e| format!("failed to write {}: {}", path.display(), e))
}

/// Export the card through a save dialog. Returns `Ok(None)` when the user
/// cancels the dialog.
pub fn export_card(
    state: &EditorState,
    layout: &CardLayout,
    pixels_per_point: f32,
) -> Result<Option<PathBuf>, String> {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export card")
        .set_file_name(EXPORT_FILE_NAME)
        .add_filter("PNG image", &["png"])
        .save_file()
    else {
        return Ok(None);
    };
    let density = export_density(pixels_per_point);
    compose_to_file(state, layout, density, &path)?;
    log_info!(
        "exported card to {} at density {:.2}",
        path.display(),
        density
    );
    Ok(Some(path))
}

// ============================================================================
// CLIPBOARD
// ============================================================================

/// Grab an image off the system clipboard, if there is one.
pub fn clipboard_image() -> Option<RgbaImage> {
    let mut clipboard = arboard::Clipboard::new().ok()?;
    let data = clipboard.get_image().ok()?;
    RgbaImage::from_raw(
        data.width as u32,
        data.height as u32,
        data.bytes.into_owned(),
    )
}
