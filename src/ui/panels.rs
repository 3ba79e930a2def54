use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use survey_lens::data::filter::visible_labels;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – variable picker
// ---------------------------------------------------------------------------

/// Render the left variable panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Variables");
    ui.separator();

    let Some(source) = &state.source else {
        ui.label("Ningún archivo cargado.");
        return;
    };

    // Owned copy so the selection can be mutated while listing.
    let visible: Vec<String> = visible_labels(&source.labels, &state.search)
        .into_iter()
        .map(str::to_string)
        .collect();
    let total = source.labels.len();

    ui.add(
        egui::TextEdit::singleline(&mut state.search)
            .hint_text("Buscar…")
            .desired_width(f32::INFINITY),
    );

    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("Todas").clicked() {
            state.select_all(visible.as_slice());
        }
        if ui.small_button("Ninguna").clicked() {
            state.select_none(visible.as_slice());
        }
        ui.label(format!("{}/{total} seleccionadas", state.selected.len()));
    });
    ui.separator();

    let button_height = 32.0;
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .max_height((ui.available_height() - button_height).max(0.0))
        .show(ui, |ui: &mut Ui| {
            for label in &visible {
                let is_selected = state.selected.contains(label);
                if ui.selectable_label(is_selected, label).clicked() {
                    state.toggle_label(label);
                }
            }
        });

    ui.separator();
    if ui.button(RichText::new("Analizar correlaciones").strong()).clicked() {
        state.analyze();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("Archivo", |ui: &mut Ui| {
            if ui.button("Abrir…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.source.is_some(), egui::Button::new("Exportar etiquetas…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(source) = &state.source {
            ui.label(format!(
                "{} filas, {} variables",
                source.dataset.len(),
                source.labels.len()
            ));
            ui.separator();
        }

        if state.summary.is_some() && !state.show_heatmap && ui.button("Mapa de calor").clicked() {
            state.show_heatmap = true;
        }

        if state.narrative.is_some() {
            ui.spinner();
            ui.label("Generando interpretación…");
            if ui.small_button("Cancelar").clicked() {
                state.cancel_narrative();
            }
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::GRAY));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Abrir encuesta")
        .add_filter("Archivos soportados", &["csv", "xlsx", "sav"])
        .add_filter("CSV", &["csv"])
        .add_filter("Excel", &["xlsx"])
        .add_filter("SPSS", &["sav"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}

pub fn export_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Exportar etiquetas de variables")
        .add_filter("CSV", &["csv"])
        .set_file_name("variables_info.csv")
        .save_file();

    if let Some(path) = file {
        state.export_labels(&path);
    }
}
