use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy – one enum per pipeline stage
// ---------------------------------------------------------------------------

/// Failure to turn a file on disk into a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed file: {0}")]
    Malformed(String),

    #[error("file declares {names} variable names but {labels} labels")]
    MetadataMismatch { names: usize, labels: usize },

    #[error("two variables share the display label \"{0}\"")]
    DuplicateLabel(String),
}

impl LoadError {
    /// Flatten an `anyhow` chain (parser context included) into `Malformed`.
    pub fn malformed(err: anyhow::Error) -> Self {
        LoadError::Malformed(format!("{err:#}"))
    }
}

/// The user's label selection did not resolve to enough columns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("select at least two variables ({resolved} resolved)")]
    InsufficientVariables { resolved: usize },
}

/// The selected columns cannot be correlated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("none of the selected variables is numeric")]
    NoNumericVariables,

    #[error("column \"{0}\" is not part of the loaded dataset")]
    UnknownColumn(String),
}

/// Required configuration is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no API key configured (set the OPENAI_API_KEY environment variable)")]
    NoCredential,
}

/// The remote completion service did not produce a narrative.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NarrativeError {
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("interpretation cancelled")]
    Cancelled,
}

/// Any failure of a user-triggered pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Narrative(#[from] NarrativeError),
}

impl PipelineError {
    /// Title of the modal window the GUI shows for this error.
    pub fn title(&self) -> &'static str {
        match self {
            PipelineError::Load(_) => "Error al cargar",
            PipelineError::Selection(_) | PipelineError::Analysis(_) => "Error",
            PipelineError::Config(_) | PipelineError::Narrative(_) => "Error en IA",
        }
    }
}
