use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use survey_lens::analysis::{summarize, CorrelationSummary};
use survey_lens::config::NarrativeConfig;
use survey_lens::data::export::write_label_csv;
use survey_lens::data::loader::{load_file, LoadedSource};
use survey_lens::error::{ConfigError, LoadError, NarrativeError, PipelineError};
use survey_lens::narrative::{build_prompt, CompletionClient, CompletionService, NarrativeTask, TaskStatus};

/// Title of the window showing a finished interpretation.
pub const NARRATIVE_TITLE: &str = "Interpretación IA";

/// A modal text window queued for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDialog {
    pub id: u64,
    pub title: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded file (None until the user opens one). Replaced only on success.
    pub source: Option<LoadedSource>,

    /// Display labels the user has ticked.
    pub selected: BTreeSet<String>,

    /// Search box contents for the label list.
    pub search: String,

    /// Result of the last successful analysis.
    pub summary: Option<CorrelationSummary>,

    /// Whether the heatmap window is open.
    pub show_heatmap: bool,

    /// In-flight interpretation request.
    pub narrative: Option<NarrativeTask>,

    /// Text windows waiting to be closed by the user.
    pub dialogs: Vec<TextDialog>,

    /// Status line shown in the top bar.
    pub status_message: Option<String>,

    pub config: NarrativeConfig,

    next_dialog_id: u64,
}

impl AppState {
    pub fn new(config: NarrativeConfig) -> Self {
        Self {
            source: None,
            selected: BTreeSet::new(),
            search: String::new(),
            summary: None,
            show_heatmap: false,
            narrative: None,
            dialogs: Vec::new(),
            status_message: None,
            config,
            next_dialog_id: 0,
        }
    }

    /// Load a file, replacing the current dataset only if loading succeeds.
    pub fn load_path(&mut self, path: &Path) {
        match load_file(path) {
            Ok(source) => {
                self.status_message = Some(format!(
                    "{}: {} filas, {} variables",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                    source.dataset.len(),
                    source.labels.len()
                ));
                self.source = Some(source);
                self.selected.clear();
                self.search.clear();
                self.summary = None;
                self.show_heatmap = false;
                self.cancel_narrative();
            }
            Err(LoadError::UnsupportedFormat(ext)) => {
                log::warn!("ignoring {}: unsupported extension .{ext}", path.display());
                self.status_message = Some(format!("Formato no soportado: .{ext}"));
            }
            Err(e) => self.report(e.into()),
        }
    }

    /// Write the `Variable`/`Descripción` listing of the loaded file.
    pub fn export_labels(&mut self, path: &Path) {
        let Some(source) = &self.source else {
            return;
        };
        let written = File::create(path)
            .with_context(|| format!("creating {}", path.display()))
            .and_then(|file| write_label_csv(file, source.labels.iter()));
        match written {
            Ok(n) => {
                log::info!("exported {n} variable labels to {}", path.display());
                self.status_message = Some(format!("{n} etiquetas exportadas"));
            }
            Err(e) => {
                log::warn!("label export failed: {e:#}");
                self.push_dialog("Error al exportar", format!("{e:#}"));
            }
        }
    }

    // ---- selection ---------------------------------------------------------

    /// Selected labels in the order the file declares them.
    pub fn selected_labels(&self) -> Vec<String> {
        let Some(source) = &self.source else {
            return Vec::new();
        };
        source
            .labels
            .labels()
            .filter(|l| self.selected.contains(*l))
            .map(str::to_string)
            .collect()
    }

    pub fn toggle_label(&mut self, label: &str) {
        if !self.selected.remove(label) {
            self.selected.insert(label.to_string());
        }
    }

    pub fn select_all<S: AsRef<str>>(&mut self, labels: &[S]) {
        self.selected
            .extend(labels.iter().map(|l| l.as_ref().to_string()));
    }

    pub fn select_none<S: AsRef<str>>(&mut self, labels: &[S]) {
        for label in labels {
            self.selected.remove(label.as_ref());
        }
    }

    // ---- analysis ----------------------------------------------------------

    /// Correlate the selection and ask the completion service about it.
    pub fn analyze(&mut self) {
        self.analyze_with(CompletionClient::new);
    }

    /// [`AppState::analyze`] with a caller-chosen completion service.
    pub fn analyze_with<S, F>(&mut self, connect: F)
    where
        S: CompletionService + 'static,
        F: FnOnce(&NarrativeConfig) -> Result<S, ConfigError>,
    {
        if let Err(e) = self.run_analysis(connect) {
            self.report(e);
        }
    }

    fn run_analysis<S, F>(&mut self, connect: F) -> Result<(), PipelineError>
    where
        S: CompletionService + 'static,
        F: FnOnce(&NarrativeConfig) -> Result<S, ConfigError>,
    {
        let labels = self.selected_labels();
        let Some(source) = &self.source else {
            return Ok(());
        };

        let identifiers = source.labels.resolve(&labels)?;
        let summary = summarize(&source.dataset, &identifiers)?;
        let prompt = build_prompt(&summary.ranked, &source.labels);

        if !summary.skipped.is_empty() {
            self.status_message = Some(format!(
                "Variables no numéricas omitidas: {}",
                summary.skipped.join(", ")
            ));
        }
        self.summary = Some(summary);
        self.show_heatmap = true;

        if let Some(previous) = self.narrative.take() {
            previous.cancel();
        }
        let service = connect(&self.config)?;
        log::info!("requesting interpretation for {} variables", identifiers.len());
        self.narrative = Some(NarrativeTask::spawn(service, prompt));
        Ok(())
    }

    /// Pick up a finished interpretation. Returns true while one is pending.
    pub fn poll_narrative(&mut self) -> bool {
        let Some(task) = &self.narrative else {
            return false;
        };
        match task.poll() {
            TaskStatus::Pending => return true,
            TaskStatus::Complete(text) => {
                log::info!("interpretation received ({} chars)", text.len());
                self.push_dialog(NARRATIVE_TITLE, text);
            }
            TaskStatus::Failed(NarrativeError::Cancelled) => {
                self.status_message = Some("Interpretación cancelada".into());
            }
            TaskStatus::Failed(e) => self.report(e.into()),
        }
        self.narrative = None;
        false
    }

    pub fn cancel_narrative(&mut self) {
        if let Some(task) = self.narrative.take() {
            task.cancel();
            log::info!("interpretation cancelled");
            self.status_message = Some("Interpretación cancelada".into());
        }
    }

    // ---- dialogs -----------------------------------------------------------

    fn report(&mut self, err: PipelineError) {
        log::warn!("{}: {err}", err.title());
        self.push_dialog(err.title(), err.to_string());
    }

    pub fn push_dialog(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.next_dialog_id += 1;
        self.dialogs.push(TextDialog {
            id: self.next_dialog_id,
            title: title.into(),
            body: body.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};

    use survey_lens::narrative::NarrativePrompt;
    use tempfile::TempDir;

    use super::*;

    /// Echoes the user prompt back as the interpretation.
    struct Echo;

    impl CompletionService for Echo {
        fn complete(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
            Ok(prompt.user.clone())
        }
    }

    struct Down;

    impl CompletionService for Down {
        fn complete(&self, _: &NarrativePrompt) -> Result<String, NarrativeError> {
            Err(NarrativeError::ServiceUnavailable("HTTP 503".into()))
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn loaded() -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "survey.csv",
            "edad,ingreso,horas,ciudad\n18,900,3,Lima\n22,1500,5,Cusco\n25,2100,4,Lima\n30,2600,8,Piura\n",
        );
        let mut state = AppState::new(NarrativeConfig::default());
        state.load_path(&path);
        assert!(state.source.is_some());
        (dir, state)
    }

    fn settle(state: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while state.poll_narrative() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn missing_credential_still_produces_summary() {
        let (_dir, mut state) = loaded();
        state.select_all(&["edad", "ingreso", "horas"]);
        state.analyze();

        let summary = state.summary.as_ref().unwrap();
        assert_eq!(summary.matrix.size(), 3);
        assert!(state.show_heatmap);
        assert!(state.narrative.is_none());
        assert_eq!(state.dialogs.len(), 1);
        assert_eq!(state.dialogs[0].title, "Error en IA");
        assert!(state.dialogs[0].body.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn single_label_is_a_selection_error() {
        let (_dir, mut state) = loaded();
        state.toggle_label("edad");
        state.analyze_with(|_| Ok(Echo));

        assert!(state.summary.is_none());
        assert!(state.narrative.is_none());
        assert_eq!(state.dialogs[0].title, "Error");
    }

    #[test]
    fn completed_interpretation_opens_a_window() {
        let (_dir, mut state) = loaded();
        state.select_all(&["ingreso", "edad"]);
        state.analyze_with(|_| Ok(Echo));
        settle(&mut state);

        assert!(state.narrative.is_none());
        let dialog = state.dialogs.last().unwrap();
        assert_eq!(dialog.title, NARRATIVE_TITLE);
        assert!(dialog.body.contains("edad ↔ ingreso: "));
    }

    #[test]
    fn service_failure_is_reported_after_summary() {
        let (_dir, mut state) = loaded();
        state.select_all(&["edad", "horas"]);
        state.analyze_with(|_| Ok(Down));
        settle(&mut state);

        assert!(state.summary.is_some());
        assert_eq!(state.dialogs.last().unwrap().title, "Error en IA");
    }

    #[test]
    fn non_numeric_selection_is_skipped() {
        let (_dir, mut state) = loaded();
        state.select_all(&["edad", "ingreso", "ciudad"]);
        state.analyze_with(|_| Ok(Echo));
        settle(&mut state);

        let summary = state.summary.as_ref().unwrap();
        assert_eq!(summary.skipped, vec!["ciudad".to_string()]);
        assert_eq!(summary.ranked.len(), 1);
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let (dir, mut state) = loaded();
        let before = state.source.as_ref().unwrap().path.clone();

        state.load_path(&dir.path().join("missing.csv"));
        assert_eq!(state.source.as_ref().unwrap().path, before);
        assert_eq!(state.dialogs.last().unwrap().title, "Error al cargar");

        let dialogs = state.dialogs.len();
        state.load_path(&write(&dir, "notes.txt", "hola"));
        assert_eq!(state.source.as_ref().unwrap().path, before);
        assert_eq!(state.dialogs.len(), dialogs);
        assert!(state.status_message.as_deref().unwrap().contains(".txt"));
    }

    #[test]
    fn selection_follows_file_order() {
        let (_dir, mut state) = loaded();
        state.toggle_label("horas");
        state.toggle_label("edad");
        assert_eq!(state.selected_labels(), vec!["edad", "horas"]);
        state.toggle_label("edad");
        assert_eq!(state.selected_labels(), vec!["horas"]);
    }

    #[test]
    fn exported_labels_are_written() {
        let (dir, mut state) = loaded();
        let out = dir.path().join("labels.csv");
        state.export_labels(&out);
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.starts_with("Variable,Descripción\n"));
        assert!(text.contains("ciudad,ciudad\n"));
    }
}
