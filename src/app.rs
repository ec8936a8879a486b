use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use egui::{Color32, Pos2, Rect, RichText, Sense, Stroke, TextureHandle, TextureOptions, pos2, vec2};

use crate::canvas;
use crate::components::tools::{ToolsPanel, ToolsPanelAction};
use crate::editor::{EditorState, ToolMode};
use crate::io::{DecodeSlot, DecodeSource, ImageLoader, clipboard_image, export_card};
use crate::layout::{CARD_ASPECT, CARD_CORNER_RADIUS, CardLayout};
use crate::settings::AppSettings;
use crate::theme::{ACCENT, GUIDE_COLOR};
use crate::{log_err, log_info};

/// Inset of the dashed safe-margin guide from the card edge.
const GUIDE_MARGIN: f32 = 16.0;

/// Radius of the sticker transform handle dot.
const HANDLE_DRAW_RADIUS: f32 = 6.0;

pub struct CardCraftApp {
    editor: EditorState,
    loader: ImageLoader,
    tools_panel: ToolsPanel,
    settings: AppSettings,

    layout: CardLayout,
    /// The composited card, uploaded as a texture whenever the editor is
    /// dirty or the layout changed.
    composited: Option<TextureHandle>,
    status: String,
}

impl CardCraftApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        settings.theme_mode.apply(&cc.egui_ctx);

        let mut editor = EditorState::new();
        settings.apply_brush_defaults(&mut editor.brush);

        Self {
            editor,
            loader: ImageLoader::new(),
            tools_panel: ToolsPanel::default(),
            settings,
            layout: CardLayout::default(),
            composited: None,
            status: "Load a background to get started".to_string(),
        }
    }

    // ---- async load results -------------------------------------------------

    fn pump_decodes(&mut self) {
        for result in self.loader.poll() {
            match result.slot {
                DecodeSlot::Background => {
                    if let Some(img) = result.images.into_iter().next() {
                        self.editor.set_background(Arc::new(img), &self.layout);
                        self.status = "Background loaded".to_string();
                    }
                }
                DecodeSlot::Frame => {
                    if let Some(img) = result.images.into_iter().next() {
                        self.editor.set_frame(Arc::new(img));
                        self.status = "Frame loaded".to_string();
                    }
                }
                DecodeSlot::Stickers => {
                    let count = result.images.len();
                    self.editor.add_stickers(
                        result.images.into_iter().map(Arc::new).collect(),
                        &self.layout,
                    );
                    self.status = if count == 1 {
                        "Sticker added".to_string()
                    } else {
                        format!("{} stickers added", count)
                    };
                }
            }
        }
    }

    /// Files dropped onto the window: sticker batch in Sticker mode,
    /// background otherwise.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }
        let mut sources = Vec::new();
        for file in dropped {
            if let Some(path) = file.path {
                sources.push(DecodeSource::Path(path));
            } else if let Some(bytes) = file.bytes {
                sources.push(DecodeSource::Bytes {
                    name: file.name,
                    bytes: bytes.to_vec(),
                });
            }
        }
        let slot = if self.editor.tool == ToolMode::Sticker {
            DecodeSlot::Stickers
        } else {
            DecodeSlot::Background
        };
        self.loader.request(slot, sources);
    }

    // ---- keyboard shortcuts -------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        // Don't steal Delete/Backspace/Ctrl+Z from focused text fields
        if ctx.wants_keyboard_input() {
            return;
        }
        let (undo, redo, delete, paste) = ctx.input_mut(|i| {
            (
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y),
                i.consume_key(egui::Modifiers::NONE, egui::Key::Delete)
                    || i.consume_key(egui::Modifiers::NONE, egui::Key::Backspace),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::V),
            )
        });
        if undo {
            self.editor.undo();
        }
        if redo {
            self.editor.redo();
        }
        if delete {
            self.editor.delete_selected();
        }
        if paste && let Some(img) = clipboard_image() {
            self.editor.add_stickers(vec![Arc::new(img)], &self.layout);
            self.status = "Sticker pasted from clipboard".to_string();
        }
    }

    // ---- export -------------------------------------------------------------

    fn export(&mut self, ctx: &egui::Context) {
        match export_card(&self.editor, &self.layout, ctx.pixels_per_point()) {
            Ok(Some(path)) => {
                self.status = format!("Exported {}", path.display());
            }
            Ok(None) => {} // dialog cancelled
            Err(e) => {
                self.status = format!("Export failed: {}", e);
                log_err!("export failed: {}", e);
            }
        }
    }

    // ---- canvas -------------------------------------------------------------

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let avail = ui.available_size();
        // The card canvas fills the container width, bounded by the visible
        // height so the whole 2:3 canvas stays on screen.
        let width = avail.x.min(avail.y / CARD_ASPECT).floor();
        let new_layout = CardLayout::from_width(width);
        if new_layout != self.layout {
            self.layout = new_layout;
            self.editor.mark_dirty();
        }

        let size = vec2(self.layout.canvas_width, self.layout.canvas_height);
        let (rect, response) = ui.allocate_exact_size(size, Sense::drag());

        self.handle_canvas_input(&response, rect.min);
        self.refresh_composite(ui.ctx());
        self.paint_canvas(ui, rect);
    }

    fn handle_canvas_input(&mut self, response: &egui::Response, origin: Pos2) {
        let to_canvas = |p: Pos2| pos2(p.x - origin.x, p.y - origin.y);
        if response.drag_started() {
            if let Some(p) = response.interact_pointer_pos() {
                self.editor.pointer_down(to_canvas(p), &self.layout);
            }
        } else if response.dragged() {
            if let Some(p) = response.interact_pointer_pos() {
                self.editor.pointer_move(to_canvas(p), &self.layout);
            }
        }
        // egui reports the release even when the pointer left the window —
        // the universal end-of-drag signal, so gestures can't get stuck.
        if response.drag_released() {
            self.editor.pointer_up();
        }
    }

    fn refresh_composite(&mut self, ctx: &egui::Context) {
        let needs_upload = self.editor.take_dirty() || self.composited.is_none();
        if !needs_upload {
            return;
        }
        let img = canvas::render_card(&self.editor, &self.layout, 1.0);
        let color_image = canvas::to_color_image(&img);
        match &mut self.composited {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                self.composited =
                    Some(ctx.load_texture("card-composite", color_image, TextureOptions::LINEAR));
            }
        }
    }

    fn paint_canvas(&self, ui: &egui::Ui, rect: Rect) {
        let painter = ui.painter();

        // Canvas backdrop + empty-card base
        painter.rect_filled(rect, 6.0, ui.visuals().extreme_bg_color);
        let card_rect = Rect::from_min_size(
            rect.min + self.layout.card.min.to_vec2(),
            self.layout.card.size(),
        );
        painter.rect_filled(card_rect, CARD_CORNER_RADIUS, ui.visuals().faint_bg_color);

        // The composited card content
        if let Some(texture) = &self.composited {
            painter.image(
                texture.id(),
                card_rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // Guide overlays live only here, on top of the displayed texture.
        // The compositor never sees them, so no export can contain them.
        if self.settings.show_guides {
            self.paint_guides(painter, card_rect);
        }

        if self.editor.tool == ToolMode::Sticker {
            self.paint_selection(painter, rect.min);
        }
    }

    fn paint_guides(&self, painter: &egui::Painter, card_rect: Rect) {
        let stroke = Stroke::new(1.0, GUIDE_COLOR);
        painter.rect_stroke(card_rect, CARD_CORNER_RADIUS, stroke);

        let inner = card_rect.shrink(GUIDE_MARGIN);
        let corners = [
            inner.left_top(),
            inner.right_top(),
            inner.right_bottom(),
            inner.left_bottom(),
            inner.left_top(),
        ];
        for pair in corners.windows(2) {
            painter.extend(egui::Shape::dashed_line(pair, stroke, 6.0, 4.0));
        }
    }

    /// Selection box + transform handle for the selected sticker.
    fn paint_selection(&self, painter: &egui::Painter, canvas_origin: Pos2) {
        let Some(id) = self.editor.selected_sticker else {
            return;
        };
        let Some(sticker) = self.editor.sticker(id) else {
            return;
        };
        let to_screen = |card_pos: Pos2| {
            let canvas_pos = self.layout.from_card(card_pos);
            pos2(canvas_origin.x + canvas_pos.x, canvas_origin.y + canvas_pos.y)
        };

        let corners = sticker.corners().map(to_screen);
        let stroke = Stroke::new(1.5, ACCENT);
        for i in 0..4 {
            painter.line_segment([corners[i], corners[(i + 1) % 4]], stroke);
        }

        let handle = to_screen(sticker.handle_pos());
        painter.circle_filled(handle, HANDLE_DRAW_RADIUS, ACCENT);
        painter.circle_stroke(handle, HANDLE_DRAW_RADIUS, Stroke::new(1.5, Color32::WHITE));
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(&self.status);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let hint = match self.editor.tool {
                    ToolMode::Move => "Drag to position the background",
                    ToolMode::Draw => "Drag to draw · Ctrl+Z undo · Ctrl+Y redo",
                    ToolMode::Sticker => "Click to select · drag handle to scale/rotate · Del removes",
                };
                ui.weak(hint);
            });
        });
    }
}

impl eframe::App for CardCraftApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump_decodes();
        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx);

        egui::SidePanel::right("tools_panel")
            .resizable(false)
            .default_width(230.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.add_space(2.0);
                    ui.label(RichText::new("CardCraft").heading());
                    ui.separator();
                    let action = self.tools_panel.show(
                        ui,
                        &mut self.editor,
                        &mut self.loader,
                        &self.layout,
                        &mut self.settings,
                    );
                    if action == ToolsPanelAction::ExportCard {
                        self.export(ctx);
                    }
                });
            });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                self.canvas_ui(ui);
            });
        });

        // Decode workers can't wake the UI themselves; keep polling until
        // their results have been drained.
        if self.loader.has_pending() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.brush_color = self.editor.brush.color;
        self.settings.brush_thickness = self.editor.brush.thickness;
        self.settings.brush_opacity = self.editor.brush.opacity;
        self.settings.save();
        log_info!("session ended");
    }
}
