//! Error types for the standardization workflow.
//!
//! Only conditions that block forward progress are errors. Everything the
//! workflow can repair on its own (missing values, hallucinated columns,
//! failed tasks) is reported as a [`Warning`](crate::types::Warning) on the
//! outcome instead.
//!
//! Errors serialize as `{code, message}` so a front end can branch on the
//! code without parsing the message.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the standardizer.
#[derive(Error, Debug)]
pub enum StandardizerError {
    /// Work was cancelled through a cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// No dataset has been loaded into the session.
    #[error("No datasets loaded")]
    NoDatasetsLoaded,

    /// None of the loaded columns hold predominantly string values.
    #[error("No eligible string columns found in the loaded datasets")]
    NoEligibleColumns,

    /// No group is selected for mapping generation.
    #[error("No column groups selected for mapping generation")]
    NoGroupsSelected,

    /// An operation needed mappings before they were generated.
    #[error("Mappings have not been generated yet")]
    MappingsNotGenerated,

    /// Groups can no longer be edited because generation has started.
    #[error("Column groups are frozen once mapping generation has started")]
    GroupsFrozen,

    /// Regeneration is only allowed before the first feedback round.
    #[error("Mappings cannot be regenerated after feedback has been processed")]
    RegenerationLocked,

    /// The session was already finished.
    #[error("Session is finished; start a new session to continue")]
    SessionFinished,

    /// Export requires a finished session.
    #[error("Session is not finished; apply and finish before exporting")]
    SessionNotFinished,

    /// Dataset was not found in the session.
    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    /// Column was not found in a dataset.
    #[error("Column '{column}' not found in dataset '{dataset}'")]
    ColumnNotFound { dataset: String, column: String },

    /// A column label could not be split into dataset and column.
    #[error("'{0}' is not a column label (expected dataset::column)")]
    InvalidColumnLabel(String),

    /// Group was not found in the session.
    #[error("Column group '{0}' not found")]
    GroupNotFound(String),

    /// No mapping exists under the identity.
    #[error("No mapping for '{0}'")]
    MappingNotFound(String),

    /// A feedback entry referenced a value outside the mapping.
    #[error("Value '{value}' is not an original value of '{mapping}'")]
    ValueNotInMapping { mapping: String, value: String },

    /// File extension is not a supported tabular format.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A workbook could not be written.
    #[error("Failed to export '{artifact}': {reason}")]
    ExportFailed { artifact: String, reason: String },

    /// Internal error (e.g., worker thread failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Spreadsheet read error.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Spreadsheet write error.
    #[error("Workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StandardizerError>,
    },
}

impl StandardizerError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StandardizerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::NoDatasetsLoaded => "NO_DATASETS_LOADED",
            Self::NoEligibleColumns => "NO_ELIGIBLE_COLUMNS",
            Self::NoGroupsSelected => "NO_GROUPS_SELECTED",
            Self::MappingsNotGenerated => "MAPPINGS_NOT_GENERATED",
            Self::GroupsFrozen => "GROUPS_FROZEN",
            Self::RegenerationLocked => "REGENERATION_LOCKED",
            Self::SessionFinished => "SESSION_FINISHED",
            Self::SessionNotFinished => "SESSION_NOT_FINISHED",
            Self::DatasetNotFound(_) => "DATASET_NOT_FOUND",
            Self::ColumnNotFound { .. } => "COLUMN_NOT_FOUND",
            Self::InvalidColumnLabel(_) => "INVALID_COLUMN_LABEL",
            Self::GroupNotFound(_) => "GROUP_NOT_FOUND",
            Self::MappingNotFound(_) => "MAPPING_NOT_FOUND",
            Self::ValueNotInMapping { .. } => "VALUE_NOT_IN_MAPPING",
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ExportFailed { .. } => "EXPORT_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::Xlsx(_) => "XLSX_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error means there is no usable data to work with.
    ///
    /// These need user action (load a file, pick columns) before the
    /// workflow can continue.
    pub fn is_blocking(&self) -> bool {
        match self {
            Self::NoDatasetsLoaded
            | Self::NoEligibleColumns
            | Self::NoGroupsSelected
            | Self::MappingsNotGenerated => true,
            Self::WithContext { source, .. } => source.is_blocking(),
            _ => false,
        }
    }
}

impl Serialize for StandardizerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("StandardizerError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<crate::config::ConfigValidationError> for StandardizerError {
    fn from(error: crate::config::ConfigValidationError) -> Self {
        Self::InvalidConfig(error.to_string())
    }
}

/// Result type alias for standardizer operations.
pub type Result<T> = std::result::Result<T, StandardizerError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| StandardizerError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| StandardizerError::Io(e).with_context(context))
    }
}
