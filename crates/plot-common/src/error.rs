//! Error types for plot extraction and analysis.

use thiserror::Error;

/// Result type alias using PlotError.
pub type PlotResult<T> = Result<T, PlotError>;

/// Primary error type for the extraction pipeline and the project API.
#[derive(Debug, Error)]
pub enum PlotError {
    // === Input Errors ===
    #[error("Unsupported grid format: {0}")]
    Format(String),

    // === Pipeline Errors ===
    #[error("Extraction failed{} in '{file}': {message}", plot_label(.plot))]
    Extraction {
        plot: Option<String>,
        file: String,
        message: String,
    },

    #[error("Alignment failed for plot '{plot}': {message}")]
    Alignment { plot: String, message: String },

    // === Storage Errors ===
    #[error("Store error: {0}")]
    Store(String),

    // === API Errors ===
    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("Join changed the row count: {0}")]
    Join(String),

    #[error("Unknown project field: {0}")]
    FieldNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlotError {
    /// Create an Extraction error for a plot within a raster file.
    pub fn extraction(
        plot: impl Into<String>,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Extraction {
            plot: Some(plot.into()),
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an Extraction error that affects a whole raster file.
    pub fn raster(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            plot: None,
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an Alignment error.
    pub fn alignment(plot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Alignment {
            plot: plot.into(),
            message: message.into(),
        }
    }

    /// Create a Usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Short category label, used when failures are collected into reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PlotError::Format(_) => "format",
            PlotError::Extraction { .. } => "extraction",
            PlotError::Alignment { .. } => "alignment",
            PlotError::Store(_) => "store",
            PlotError::Usage(_) => "usage",
            PlotError::Join(_) => "join",
            PlotError::FieldNotFound(_) => "field",
            PlotError::Io(_) => "io",
        }
    }
}

fn plot_label(plot: &Option<String>) -> String {
    plot.as_ref()
        .map(|p| format!(" for plot '{}'", p))
        .unwrap_or_default()
}

impl From<serde_json::Error> for PlotError {
    fn from(err: serde_json::Error) -> Self {
        PlotError::Format(format!("JSON error: {}", err))
    }
}
