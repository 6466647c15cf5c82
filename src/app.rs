use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::config::SharedConfig;
use crate::gesture::{GestureMode, CLICK_THRESHOLD_RANGE, SCROLL_SPEED_RANGE};
use crate::utils::{lock_state, SharedState};

pub struct HandScrollApp {
    config: SharedConfig,
    shared_state: SharedState,
    stop: Arc<AtomicBool>,
    // text typed into the entry boxes, applied on Enter
    threshold_entry: String,
    speed_entry: String,
    texture: Option<egui::TextureHandle>,
}

impl HandScrollApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: SharedConfig,
        shared_state: SharedState,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            threshold_entry: config.click_threshold().to_string(),
            speed_entry: config.scroll_speed().to_string(),
            config,
            shared_state,
            stop,
            texture: None,
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let config = self.config.clone();

        ui.horizontal(|ui| {
            let enabled = config.scrolling_enabled();
            let label = if enabled { "Stop Scrolling" } else { "Start Scrolling" };
            if ui.button(label).clicked() {
                config.toggle_scrolling();
            }

            if config.scrolling_enabled() {
                ui.colored_label(egui::Color32::GREEN, "Scrolling: ON");
            } else {
                ui.colored_label(egui::Color32::RED, "Scrolling: OFF");
            }
        });

        let mut show_video = config.show_video();
        if ui.checkbox(&mut show_video, "Show Video").changed() {
            config.set_show_video(show_video);
        }

        ui.separator();

        // threshold
        let mut threshold = config.click_threshold();
        if ui
            .add(
                egui::Slider::new(&mut threshold, CLICK_THRESHOLD_RANGE)
                    .clamp_to_range(false)
                    .text("Threshold (px)"),
            )
            .changed()
        {
            if let Err(e) = config.set_click_threshold(threshold) {
                warn!("{}", e);
            }
            self.threshold_entry = config.click_threshold().to_string();
        }
        if entry_submitted(ui, &mut self.threshold_entry) {
            if let Err(e) = config.set_click_threshold_entry(&self.threshold_entry) {
                warn!("Ignoring threshold: {}", e);
            }
            self.threshold_entry = config.click_threshold().to_string();
        }

        // speed
        let mut speed = config.scroll_speed();
        if ui
            .add(
                egui::Slider::new(&mut speed, SCROLL_SPEED_RANGE)
                    .clamp_to_range(false)
                    .text("Speed (px/step)"),
            )
            .changed()
        {
            if let Err(e) = config.set_scroll_speed(speed) {
                warn!("{}", e);
            }
            self.speed_entry = config.scroll_speed().to_string();
        }
        if entry_submitted(ui, &mut self.speed_entry) {
            if let Err(e) = config.set_scroll_speed_entry(&self.speed_entry) {
                warn!("Ignoring speed: {}", e);
            }
            self.speed_entry = config.scroll_speed().to_string();
        }

        // gesture mode dropdown
        let mut mode = config.mode();
        egui::ComboBox::from_label("Mode")
            .selected_text(mode.name())
            .show_ui(ui, |ui| {
                for option in GestureMode::ALL {
                    ui.selectable_value(&mut mode, option, option.name());
                }
            });
        if mode != config.mode() {
            config.set_mode(mode);
        }
    }

    fn status(&self, ui: &mut egui::Ui) {
        let state = lock_state(&self.shared_state);

        ui.label(format!(
            "Camera: {}",
            state.camera_name.as_deref().unwrap_or("-")
        ));
        let resolution = state.resolution.unwrap_or((0, 0));
        ui.label(format!("Resolution: {}x{}", resolution.0, resolution.1));
        ui.label(format!("FPS: {}", state.fps.unwrap_or(0.0)));
        ui.label(if state.landmarks.is_some() {
            "Hand: detected"
        } else {
            "Hand: -"
        });
        ui.label(if state.pinching { "Pinch: active" } else { "Pinch: -" });
        if let Some(units) = state.last_scroll {
            ui.label(format!("Last scroll: {:+}", units));
        }
    }

    fn preview(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        if !self.config.show_video() {
            self.texture = None;
            return;
        }

        let image = lock_state(&self.shared_state).image.clone();
        let Some(image) = image else {
            ui.label("Waiting for camera...");
            return;
        };

        let size = [image.width() as usize, image.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, image.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, egui::TextureOptions::default()),
            None => {
                self.texture =
                    Some(ctx.load_texture("preview", color_image, egui::TextureOptions::default()))
            }
        }

        if let Some(texture) = &self.texture {
            // fit the frame to the panel width
            let width = ui.available_width();
            let height = width * image.height() as f32 / image.width() as f32;
            ui.image(texture, egui::Vec2::new(width, height));
        }
    }
}

// single line entry that reports true when Enter was pressed in it
fn entry_submitted(ui: &mut egui::Ui, text: &mut String) -> bool {
    let response = ui.add(egui::TextEdit::singleline(text).desired_width(60.0));
    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter))
}

impl eframe::App for HandScrollApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        frame.close();
                    }
                });
            });
        });

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.controls(ui);
                ui.separator();
                self.status(ui);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.preview(ctx, ui);
        });

        // the tracker runs at camera speed, repaint at roughly 30 fps
        ctx.request_repaint_after(Duration::from_millis(33));
    }

    fn on_close_event(&mut self) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        true
    }
}
