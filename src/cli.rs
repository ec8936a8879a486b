// ============================================================================
// CardCraft CLI — headless card composition via command-line arguments
// ============================================================================
//
// Usage examples:
//   cardcraft --input photo.jpg --output card.png
//   cardcraft -i photo.jpg --frame frame.png --sticker a.png --sticker b.png -o card.png
//   cardcraft -i photo.jpg --width 480 --density 3 -o card.png
//
// No GUI is opened in CLI mode. The compose path is the same compositor the
// editor uses: background fit-and-centered, stickers fanned out from the
// card center, the frame stretched over the card, rounded-corner crop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;

use crate::editor::EditorState;
use crate::io::{EXPORT_MAX_DENSITY, compose_to_file};
use crate::layout::CardLayout;

/// CardCraft headless card composer.
#[derive(Parser, Debug)]
#[command(
    name = "cardcraft",
    about = "CardCraft headless card composer",
    long_about = "Compose a photo card from a background, optional stickers and an\n\
                  optional frame overlay without opening the GUI.\n\n\
                  Example:\n  \
                  cardcraft --input photo.jpg --frame frame.png -o card.png\n  \
                  cardcraft -i photo.jpg --sticker star.png --sticker heart.png -o card.png"
)]
pub struct CliArgs {
    /// Background image for the card.
    #[arg(short, long, value_name = "IMAGE")]
    pub input: PathBuf,

    /// Frame overlay, stretched exactly to the card rectangle.
    #[arg(long, value_name = "IMAGE")]
    pub frame: Option<PathBuf>,

    /// Sticker image(s), placed at the card-center fan-out. Repeatable.
    #[arg(long = "sticker", value_name = "IMAGE")]
    pub stickers: Vec<PathBuf>,

    /// Canvas width the card is laid out at, in layout units.
    #[arg(long, default_value_t = 360.0, value_name = "PX")]
    pub width: f32,

    /// Output pixels per layout unit (capped at 3).
    #[arg(short, long, default_value_t = 2.0, value_name = "1-3")]
    pub density: f32,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process
    /// arguments. Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

/// Run the compose and return an OS exit code: 0 = card written, 1 = failure.
pub fn run(args: CliArgs) -> i32 {
    let start = Instant::now();
    let layout = CardLayout::from_width(args.width);
    let mut editor = EditorState::new();

    // Background is mandatory — without it there is nothing to compose
    match load_image(&args.input) {
        Ok(img) => editor.set_background(img, &layout),
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    }

    // Stickers and frame follow the editor's silent-failure policy: a bad
    // file is skipped with a warning, the card still composes.
    let mut stickers = Vec::new();
    for path in &args.stickers {
        match load_image(path) {
            Ok(img) => stickers.push(img),
            Err(e) => eprintln!("warning: skipping sticker: {}", e),
        }
    }
    editor.add_stickers(stickers, &layout);

    if let Some(path) = &args.frame {
        match load_image(path) {
            Ok(img) => editor.set_frame(img),
            Err(e) => eprintln!("warning: skipping frame: {}", e),
        }
    }

    let density = args.density.clamp(1.0, EXPORT_MAX_DENSITY);
    if let Err(e) = compose_to_file(&editor, &layout, density, &args.output) {
        eprintln!("error: {}", e);
        return 1;
    }

    if args.verbose {
        println!(
            "{} → {} ({}×{} at density {:.1}) in {:.0?}",
            args.input.display(),
            args.output.display(),
            (layout.card_width() * density).round() as u32,
            (layout.card_height() * density).round() as u32,
            density,
            start.elapsed(),
        );
    }
    0
}

fn load_image(path: &Path) -> Result<Arc<RgbaImage>, String> {
    image::open(path)
        .map(|img| Arc::new(img.into_rgba8()))
        .map_err(|e| format!("cannot decode {}: {}", path.display(), e))
}
