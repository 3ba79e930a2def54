mod app;
mod color;
mod state;
mod ui;

use app::SurveyLensApp;
use eframe::egui;
use survey_lens::config::NarrativeConfig;

fn main() -> eframe::Result {
    env_logger::init();

    let config = NarrativeConfig::from_env();
    log::debug!("narrative config: {config:?}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Analizador de Datos con IA",
        options,
        Box::new(|_cc| Ok(Box::new(SurveyLensApp::new(config)))),
    )
}
