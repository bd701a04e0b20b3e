mod config;
mod gui;
mod recorder;
mod scope;

use config::{AppConfig, CONFIG_FILE};
use eframe::egui;
use gui::StreamApp;
use scope::{Session, SimScope};
use std::path::Path;
use std::process;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = AppConfig::load(Path::new(CONFIG_FILE));

    let device = match SimScope::open() {
        Ok(device) => device,
        Err(error) => {
            log::error!("no oscilloscope available: {error}");
            process::exit(1);
        }
    };

    let mut session = Session::new(device);
    config.apply_channels(&mut session);
    if let Err(error) = session.reconfigure(f64::from(config.sample_frequency)) {
        log::error!("initial configuration failed: {error}");
        process::exit(1);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("Picostream"),
        ..Default::default()
    };
    eframe::run_native(
        "Picostream",
        options,
        Box::new(move |_cc| Box::new(StreamApp::new(session, &config))),
    )
}
