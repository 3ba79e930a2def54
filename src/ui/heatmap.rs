use eframe::egui::{self, Color32, RichText, Stroke, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{GridMark, Plot, PlotPoint, PlotPoints, Polygon, Text};
use survey_lens::analysis::CorrelationSummary;
use survey_lens::data::labels::LabelMapping;

use crate::color::{annotation_color, correlation_color};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Heatmap window
// ---------------------------------------------------------------------------

/// Annotated correlation heatmap of the last analysis, in its own window.
pub fn heatmap_window(ctx: &egui::Context, state: &mut AppState) {
    let Some(summary) = &state.summary else {
        return;
    };

    egui::Window::new("Mapa de calor de correlaciones")
        .open(&mut state.show_heatmap)
        .default_size([640.0, 560.0])
        .resizable(true)
        .show(ctx, |ui: &mut Ui| {
            if !summary.skipped.is_empty() {
                ui.label(
                    RichText::new(format!("Omitidas (no numéricas): {}", summary.skipped.join(", ")))
                        .color(Color32::GRAY),
                );
            }
            heatmap_plot(ui, summary);
        });
}

/// Cell (row i, column j) is a unit square centred at (j, -i), so the first
/// variable sits in the top-left corner.
fn heatmap_plot(ui: &mut Ui, summary: &CorrelationSummary) {
    let matrix = &summary.matrix;
    let names = matrix.names().to_vec();
    let n = matrix.size();

    let x_names = names.clone();
    let y_names = names;

    Plot::new("correlation_heatmap")
        .data_aspect(1.0)
        .show_grid(false)
        .allow_drag(true)
        .allow_zoom(true)
        .allow_scroll(false)
        .show_x(false)
        .show_y(false)
        .x_axis_formatter(move |mark: GridMark, _range| axis_name(&x_names, mark.value))
        .y_axis_formatter(move |mark: GridMark, _range| axis_name(&y_names, -mark.value))
        .show(ui, |plot_ui| {
            for i in 0..n {
                for j in 0..n {
                    let r = matrix.get(i, j);
                    let (x, y) = (j as f64, -(i as f64));
                    let square: PlotPoints = vec![
                        [x - 0.5, y - 0.5],
                        [x + 0.5, y - 0.5],
                        [x + 0.5, y + 0.5],
                        [x - 0.5, y + 0.5],
                    ]
                    .into();

                    plot_ui.polygon(
                        Polygon::new(square)
                            .fill_color(correlation_color(r))
                            .stroke(Stroke::new(0.5, Color32::WHITE)),
                    );

                    let annotation = if r.is_nan() { "–".to_string() } else { format!("{r:.2}") };
                    plot_ui.text(Text::new(
                        PlotPoint::new(x, y),
                        RichText::new(annotation).color(annotation_color(r)),
                    ));
                }
            }
        });
}

/// Variable name for an integral tick inside the matrix, blank elsewhere.
fn axis_name(names: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    names.get(rounded as usize).cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Ranked pair table (central panel)
// ---------------------------------------------------------------------------

/// Strongest pairs of the last analysis, labelled for the reader.
pub fn ranked_table(ui: &mut Ui, summary: &CorrelationSummary, labels: &LabelMapping) {
    ui.heading("Correlaciones más fuertes");
    ui.add_space(4.0);

    if summary.ranked.is_empty() {
        ui.label("Se necesitan al menos dos variables numéricas para formar pares.");
        return;
    }

    let shown = |id: &str| labels.label_for(id).unwrap_or(id).to_string();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto())
        .column(Column::remainder().at_least(120.0))
        .column(Column::remainder().at_least(120.0))
        .column(Column::auto())
        .header(20.0, |mut header| {
            for title in ["#", "Variable A", "Variable B", "r"] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for (rank, pair) in summary.ranked.iter().enumerate() {
                body.row(18.0, |mut row| {
                    row.col(|ui: &mut Ui| {
                        ui.label((rank + 1).to_string());
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(shown(&pair.left));
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(shown(&pair.right));
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(
                            RichText::new(format!("{:.4}", pair.coefficient))
                                .color(correlation_color(pair.coefficient)),
                        );
                    });
                });
            }
        });
}
