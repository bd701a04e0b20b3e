// src/gui.rs
use crate::config::{AppConfig, CONFIG_FILE, MAX_SAMPLE_FREQUENCY, MIN_SAMPLE_FREQUENCY};
use crate::recorder::Recorder;
use crate::scope::{ChannelId, ScopeDevice, Session, POLL_INTERVAL};
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::path::{Path, PathBuf};
use std::time::Instant;

// One trace color per input line, matching the front-panel button colors.
const CHANNEL_COLORS: [Color32; 8] = [
    Color32::from_rgb(0xd9, 0xf1, 0x75),
    Color32::from_rgb(0x1a, 0xbc, 0x9c),
    Color32::from_rgb(0xe6, 0x7e, 0x22),
    Color32::from_rgb(0x34, 0x98, 0xdb),
    Color32::from_rgb(0x9b, 0x59, 0xb6),
    Color32::from_rgb(0xe7, 0x4c, 0x3c),
    Color32::from_rgb(0xf1, 0xc4, 0x0f),
    Color32::from_rgb(0x2e, 0xcc, 0x71),
];

pub struct StreamApp<D: ScopeDevice> {
    session: Session<D>,
    recorder: Recorder,
    logging_directory: PathBuf,
    sample_frequency: u32,
    selected: Option<ChannelId>,
    last_poll: Instant,
}

impl<D: ScopeDevice> StreamApp<D> {
    pub fn new(session: Session<D>, config: &AppConfig) -> Self {
        Self {
            session,
            recorder: Recorder::new(),
            logging_directory: config.logging_directory.clone(),
            sample_frequency: config.sample_frequency,
            selected: None,
            last_poll: Instant::now(),
        }
    }

    /// Pushes the current settings to the hardware and persists them, exactly
    /// once per user-visible change.
    fn refresh_hardware(&mut self) {
        if let Err(error) = self.session.reconfigure(f64::from(self.sample_frequency)) {
            log::error!("reconfiguration failed: {error}");
        }
        self.save_config();
    }

    fn save_config(&self) {
        let config = AppConfig::capture(&self.session, &self.logging_directory);
        if let Err(error) = config.save(Path::new(CONFIG_FILE)) {
            log::warn!("failed to save configuration: {error:#}");
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Sample rate");
            let drag = egui::DragValue::new(&mut self.sample_frequency)
                .clamp_range(MIN_SAMPLE_FREQUENCY..=MAX_SAMPLE_FREQUENCY)
                .speed(100)
                .suffix(" Hz");
            if ui.add(drag).changed() {
                self.refresh_hardware();
            }

            ui.separator();

            let recording = self.recorder.is_recording();
            if ui.add_enabled(!recording, egui::Button::new("⏺ Record")).clicked() {
                let result = self.recorder.start(
                    &self.logging_directory,
                    self.session.channels(),
                    self.session.interval_seconds(),
                );
                if let Err(error) = result {
                    log::error!("failed to start recording: {error:#}");
                }
            }
            if ui.add_enabled(recording, egui::Button::new("⏹ Stop")).clicked() {
                self.recorder.stop();
            }

            let mut directory = self.logging_directory.display().to_string();
            if ui.text_edit_singleline(&mut directory).changed() {
                self.logging_directory = PathBuf::from(directory);
                self.save_config();
            }

            if self.session.overflowed() {
                ui.label(RichText::new("⚠ overflow").color(Color32::YELLOW).strong());
            }
        });
    }

    fn channel_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(6.0);
        ui.heading("Channels");
        ui.separator();

        let mut activation: Option<(ChannelId, bool)> = None;
        let mut clicked: Option<ChannelId> = None;
        for id in ChannelId::ALL {
            let channel = self.session.channel(id);
            let mut active = channel.active();
            let title = format!("{}: {}", id.label(), channel.range().label());
            let overflowed = self.session.channel_overflowed(id);
            let is_selected = self.selected == Some(id);
            let color = CHANNEL_COLORS[id.index()];
            ui.horizontal(|ui| {
                if ui.checkbox(&mut active, "").changed() {
                    activation = Some((id, active));
                }
                if ui
                    .selectable_label(is_selected, RichText::new(title).color(color))
                    .clicked()
                {
                    clicked = Some(id);
                }
                if overflowed {
                    ui.label(RichText::new("⚠").color(Color32::YELLOW));
                }
            });
        }
        if let Some(id) = clicked {
            // Clicking the selected channel again closes its settings.
            self.selected = if self.selected == Some(id) { None } else { Some(id) };
        }
        if let Some((id, active)) = activation {
            self.session.set_active(id, active);
            self.refresh_hardware();
        }

        if let Some(id) = self.selected {
            ui.add_space(12.0);
            ui.separator();
            ui.heading(format!("Channel {} settings", id.label()));
            self.range_controls(ui, id);
            self.offset_controls(ui, id);
        }
    }

    fn range_controls(&mut self, ui: &mut egui::Ui, id: ChannelId) {
        let range = self.session.channel(id).range();
        let mut widen = false;
        let mut narrow = false;
        ui.horizontal(|ui| {
            if ui
                .add_enabled(!range.is_narrowest(), egui::Button::new("Narrower"))
                .clicked()
            {
                narrow = true;
            }
            ui.label(range.label());
            if ui
                .add_enabled(!range.is_widest(), egui::Button::new("Wider"))
                .clicked()
            {
                widen = true;
            }
        });
        if widen {
            self.session.widen_range(id);
            self.refresh_hardware();
        }
        if narrow {
            self.session.narrow_range(id);
            self.refresh_hardware();
        }
    }

    fn offset_controls(&mut self, ui: &mut egui::Ui, id: ChannelId) {
        match self.session.offset_bounds(id) {
            Ok(bounds) => {
                let mut offset = self.session.channel(id).offset();
                let slider = egui::Slider::new(&mut offset, bounds.min..=bounds.max)
                    .text("Offset (V)");
                if ui.add(slider).changed() {
                    self.session.set_offset(id, offset);
                    self.refresh_hardware();
                }
            }
            Err(error) => {
                ui.label(format!("offset bounds unavailable: {error}"));
            }
        }
    }

    fn scope_plot(&self, ui: &mut egui::Ui) {
        let dt = self.session.interval_seconds();
        Plot::new("scope")
            .legend(Legend::default())
            .include_y(-10.0)
            .include_y(10.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .x_axis_label("Time (s)")
            .show(ui, |plot_ui| {
                for id in ChannelId::ALL {
                    let channel = self.session.channel(id);
                    if !channel.active() || channel.sample_count() == 0 {
                        continue;
                    }
                    let points: PlotPoints = channel
                        .samples()
                        .enumerate()
                        .map(|(i, value)| [i as f64 * dt, f64::from(value)])
                        .collect();
                    plot_ui.line(
                        Line::new(points)
                            .name(format!("{}: {} V/div", id.label(), channel.scale() / 10.0))
                            .color(CHANNEL_COLORS[id.index()]),
                    );
                }
            });
    }
}

impl<D: ScopeDevice> eframe::App for StreamApp<D> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // The polling cadence governs latency only; the sample rate itself is
        // governed by the device clock.
        if self.last_poll.elapsed() >= POLL_INTERVAL {
            self.session.poll_tick(&mut self.recorder);
            self.last_poll = Instant::now();
        }
        ctx.request_repaint_after(POLL_INTERVAL);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| self.top_bar(ui));
        egui::SidePanel::left("channels")
            .min_width(230.0)
            .show(ctx, |ui| self.channel_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.scope_plot(ui));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if self.recorder.is_recording() {
            self.recorder.stop();
        }
        self.session.shutdown();
    }
}
