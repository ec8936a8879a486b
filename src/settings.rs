//! Application settings, persisted as a plain `key=value` file next to the
//! session log. Unknown keys and malformed values are ignored on load so old
//! or hand-edited files never prevent startup.

use std::fs;
use std::path::PathBuf;

use egui::Color32;

use crate::editor::BrushSettings;
use crate::log_warn;
use crate::logger;
use crate::theme::ThemeMode;

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Theme mode (Light or Dark)
    pub theme_mode: ThemeMode,
    /// Show the padding/margin guide overlay on the canvas
    pub show_guides: bool,
    /// Brush configuration restored at launch
    pub brush_color: Color32,
    pub brush_thickness: f32,
    pub brush_opacity: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        let brush = BrushSettings::default();
        Self {
            theme_mode: ThemeMode::Dark,
            show_guides: true,
            brush_color: brush.color,
            brush_thickness: brush.thickness,
            brush_opacity: brush.opacity,
        }
    }
}

impl AppSettings {
    pub(crate) fn settings_path() -> PathBuf {
        logger::data_dir().join("CardCraft").join("cardcraft.conf")
    }

    /// Persist to disk. Failures are logged and otherwise ignored — losing a
    /// preference is not worth interrupting the user.
    pub fn save(&self) {
        let path = Self::settings_path();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let contents = format!(
            "theme={}\n\
             show_guides={}\n\
             brush_color={}\n\
             brush_thickness={}\n\
             brush_opacity={}\n",
            match self.theme_mode {
                ThemeMode::Light => "light",
                ThemeMode::Dark => "dark",
            },
            self.show_guides,
            color_to_str(self.brush_color),
            self.brush_thickness,
            self.brush_opacity,
        );
        if let Err(e) = fs::write(&path, contents) {
            log_warn!("could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn load() -> Self {
        let path = Self::settings_path();
        let Ok(contents) = fs::read_to_string(&path) else {
            return Self::default();
        };
        let mut s = Self::default();
        for line in contents.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "theme" => {
                    s.theme_mode = match val.trim() {
                        "light" => ThemeMode::Light,
                        _ => ThemeMode::Dark,
                    }
                }
                "show_guides" => {
                    if let Ok(v) = val.trim().parse() {
                        s.show_guides = v;
                    }
                }
                "brush_color" => {
                    if let Some(c) = str_to_color(val.trim()) {
                        s.brush_color = c;
                    }
                }
                "brush_thickness" => {
                    if let Ok(v) = val.trim().parse::<f32>() {
                        s.brush_thickness = v.clamp(1.0, 64.0);
                    }
                }
                "brush_opacity" => {
                    if let Ok(v) = val.trim().parse::<f32>() {
                        s.brush_opacity = v.clamp(0.05, 1.0);
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Apply the persisted brush defaults onto a live brush.
    pub fn apply_brush_defaults(&self, brush: &mut BrushSettings) {
        brush.color = self.brush_color;
        brush.thickness = self.brush_thickness;
        brush.opacity = self.brush_opacity;
    }
}

fn color_to_str(c: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
}

fn str_to_color(s: &str) -> Option<Color32> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}
