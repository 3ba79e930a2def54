use std::time::Duration;

use eframe::egui::{self, Ui};
use survey_lens::config::NarrativeConfig;

use crate::state::AppState;
use crate::ui::{dialogs, heatmap, panels};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SurveyLensApp {
    pub state: AppState,
}

impl SurveyLensApp {
    pub fn new(config: NarrativeConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for SurveyLensApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Keep frames coming while the worker thread is busy.
        if self.state.poll_narrative() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: variable picker ----
        egui::SidePanel::left("variable_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: ranked pairs ----
        egui::CentralPanel::default().show(ctx, |ui| {
            let state = &self.state;
            match (&state.source, &state.summary) {
                (None, _) => {
                    ui.centered_and_justified(|ui: &mut Ui| {
                        ui.heading("Abre un archivo para comenzar  (Archivo → Abrir…)");
                    });
                }
                (Some(_), None) => {
                    ui.centered_and_justified(|ui: &mut Ui| {
                        ui.heading("Selecciona al menos dos variables y pulsa «Analizar correlaciones»");
                    });
                }
                (Some(source), Some(summary)) => heatmap::ranked_table(ui, summary, &source.labels),
            }
        });

        // ---- Floating windows ----
        heatmap::heatmap_window(ctx, &mut self.state);
        dialogs::text_dialogs(ctx, &mut self.state);
    }
}
