use eframe::egui;
use egui::RichText;

use crate::editor::{BrushKind, EditorState, MAX_BG_SCALE, MIN_BG_SCALE, ScalePreset, ToolMode};
use crate::io::{DecodeSlot, DecodeSource, ImageLoader, pick_image_file, pick_image_files};
use crate::layout::CardLayout;
use crate::settings::AppSettings;
use crate::theme::ThemeMode;

// ============================================================================
// TOOLS PANEL - tool mode, layer controls, export
// ============================================================================

/// Action the app must handle after the panel was drawn (export needs the
/// current pixels-per-point, which the panel doesn't own).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolsPanelAction {
    #[default]
    None,
    ExportCard,
}

#[derive(Default)]
pub struct ToolsPanel;

impl ToolsPanel {
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        editor: &mut EditorState,
        loader: &mut ImageLoader,
        layout: &CardLayout,
        settings: &mut AppSettings,
    ) -> ToolsPanelAction {
        let mut action = ToolsPanelAction::None;

        ui.add_space(4.0);
        ui.label(RichText::new("Tool").strong());
        ui.horizontal(|ui| {
            for &mode in ToolMode::all() {
                if ui
                    .selectable_label(editor.tool == mode, mode.label())
                    .clicked()
                {
                    editor.set_tool(mode);
                }
            }
        });

        ui.separator();
        self.background_section(ui, editor, loader, layout);

        ui.separator();
        self.brush_section(ui, editor);

        ui.separator();
        self.sticker_section(ui, editor, loader);

        ui.separator();
        self.frame_section(ui, editor, loader);

        ui.separator();
        ui.label(RichText::new("View").strong());
        ui.checkbox(&mut settings.show_guides, "Show guides");
        ui.horizontal(|ui| {
            ui.label("Theme:");
            for &mode in &[ThemeMode::Light, ThemeMode::Dark] {
                if ui
                    .selectable_label(settings.theme_mode == mode, mode.label())
                    .clicked()
                    && settings.theme_mode != mode
                {
                    settings.theme_mode = mode;
                    mode.apply(ui.ctx());
                }
            }
        });

        ui.separator();
        if ui
            .add_sized(
                [ui.available_width(), 28.0],
                egui::Button::new(RichText::new("Export PNG").strong()),
            )
            .clicked()
        {
            action = ToolsPanelAction::ExportCard;
        }

        action
    }

    fn background_section(
        &mut self,
        ui: &mut egui::Ui,
        editor: &mut EditorState,
        loader: &mut ImageLoader,
        layout: &CardLayout,
    ) {
        ui.label(RichText::new("Background").strong());
        if ui.button("Load background…").clicked()
            && let Some(path) = pick_image_file("Choose a background image")
        {
            loader.request(DecodeSlot::Background, vec![DecodeSource::Path(path)]);
        }

        let Some(scale) = editor.background.as_ref().map(|bg| bg.scale) else {
            ui.weak("No image loaded");
            return;
        };

        let mut zoom = scale;
        let response = ui.add(
            egui::Slider::new(&mut zoom, MIN_BG_SCALE..=MAX_BG_SCALE)
                .logarithmic(true)
                .text("Zoom"),
        );
        if response.changed() {
            editor.set_background_scale(zoom);
        }

        ui.horizontal(|ui| {
            if ui.button("Fit").clicked() {
                editor.apply_background_preset(ScalePreset::Fit, layout);
            }
            if ui.button("Fill").clicked() {
                editor.apply_background_preset(ScalePreset::Fill, layout);
            }
            if ui.button("1:1").clicked() {
                editor.apply_background_preset(ScalePreset::Actual, layout);
            }
        });
    }

    fn brush_section(&mut self, ui: &mut egui::Ui, editor: &mut EditorState) {
        ui.label(RichText::new("Brush").strong());
        ui.add_enabled_ui(editor.tool == ToolMode::Draw, |ui| {
            ui.horizontal(|ui| {
                for &kind in BrushKind::all() {
                    if ui
                        .selectable_label(editor.brush.kind == kind, kind.label())
                        .clicked()
                    {
                        editor.brush.kind = kind;
                    }
                }
            });
            ui.horizontal(|ui| {
                ui.label("Color:");
                ui.color_edit_button_srgba(&mut editor.brush.color);
            });
            ui.add(egui::Slider::new(&mut editor.brush.thickness, 1.0..=64.0).text("Size"));
            ui.add(egui::Slider::new(&mut editor.brush.opacity, 0.05..=1.0).text("Opacity"));
        });

        ui.horizontal(|ui| {
            let can_undo = editor.history.can_undo() && !editor.is_drawing();
            let can_redo = editor.history.can_redo() && !editor.is_drawing();
            if ui
                .add_enabled(can_undo, egui::Button::new("⟲ Undo"))
                .clicked()
            {
                editor.undo();
            }
            if ui
                .add_enabled(can_redo, egui::Button::new("⟳ Redo"))
                .clicked()
            {
                editor.redo();
            }
        });
    }

    fn sticker_section(
        &mut self,
        ui: &mut egui::Ui,
        editor: &mut EditorState,
        loader: &mut ImageLoader,
    ) {
        ui.label(RichText::new("Stickers").strong());
        if ui.button("Add stickers…").clicked()
            && let Some(paths) = pick_image_files("Choose sticker images")
        {
            loader.request(
                DecodeSlot::Stickers,
                paths.into_iter().map(DecodeSource::Path).collect(),
            );
        }
        let has_selection = editor.selected_sticker.is_some();
        if ui
            .add_enabled(has_selection, egui::Button::new("Delete selected"))
            .clicked()
        {
            editor.delete_selected();
        }
        if !editor.stickers.is_empty() {
            ui.weak(format!("{} placed", editor.stickers.len()));
        }
    }

    fn frame_section(
        &mut self,
        ui: &mut egui::Ui,
        editor: &mut EditorState,
        loader: &mut ImageLoader,
    ) {
        ui.label(RichText::new("Frame").strong());
        ui.horizontal(|ui| {
            if ui.button("Load frame…").clicked()
                && let Some(path) = pick_image_file("Choose a frame overlay")
            {
                loader.request(DecodeSlot::Frame, vec![DecodeSource::Path(path)]);
            }
            if ui
                .add_enabled(editor.frame.is_some(), egui::Button::new("Remove"))
                .clicked()
            {
                editor.clear_frame();
            }
        });
    }
}
