use eframe::egui::{self, ScrollArea, TextEdit, Ui};

use crate::state::AppState;

/// Show every queued text window; drop the ones the user closed.
pub fn text_dialogs(ctx: &egui::Context, state: &mut AppState) {
    state.dialogs.retain(|dialog| {
        let mut open = true;
        let mut dismissed = false;

        egui::Window::new(dialog.title.as_str())
            .id(egui::Id::new(("text_dialog", dialog.id)))
            .collapsible(false)
            .resizable(true)
            .default_width(520.0)
            .open(&mut open)
            .show(ctx, |ui: &mut Ui| {
                ScrollArea::vertical().max_height(420.0).show(ui, |ui: &mut Ui| {
                    // Read-only: a &str buffer cannot be edited.
                    let mut text = dialog.body.as_str();
                    ui.add(TextEdit::multiline(&mut text).desired_width(f32::INFINITY));
                });
                ui.separator();
                if ui.button("Cerrar").clicked() {
                    dismissed = true;
                }
            });

        open && !dismissed
    });
}
