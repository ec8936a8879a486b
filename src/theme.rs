//! Light/dark theme applied to egui's visuals.

use egui::{Color32, Visuals};

/// Accent used for selection boxes, transform handles and active tool
/// buttons.
pub const ACCENT: Color32 = Color32::from_rgb(0x4f, 0x8c, 0xff);

/// Dashed inner-margin guide color. Lives only in the UI overlay pass —
/// the compositor never paints it.
pub const GUIDE_COLOR: Color32 = Color32::from_rgb(0xff, 0x2e, 0xc4);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn label(&self) -> &'static str {
        match self {
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
        }
    }

    pub fn apply(&self, ctx: &egui::Context) {
        let mut visuals = match self {
            ThemeMode::Light => Visuals::light(),
            ThemeMode::Dark => Visuals::dark(),
        };
        visuals.selection.bg_fill = ACCENT.linear_multiply(0.4);
        visuals.selection.stroke.color = ACCENT;
        visuals.slider_trailing_fill = true;
        ctx.set_visuals(visuals);
    }
}
