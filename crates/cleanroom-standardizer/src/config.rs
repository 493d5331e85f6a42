//! Configuration for the standardization workflow.
//!
//! Uses the builder pattern; every builder call is optional and falls back
//! to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_MAX_WORKERS: usize = 5;
const DEFAULT_CLUSTER_SAMPLE_SIZE: usize = 30;
const DEFAULT_PROMPT_SAMPLE_SIZE: usize = 20;
const DEFAULT_ELIGIBILITY_SAMPLE_SIZE: usize = 10;
const DEFAULT_MIN_AUTO_GROUP_SIZE: usize = 2;
const DEFAULT_SHEET_NAME_MAX_LEN: usize = 31;
const DEFAULT_MAPPINGS_FILE_NAME: &str = "final_mappings_only.xlsx";
const DEFAULT_CLEANED_FILE_NAME: &str = "cleaned_data_with_mappings.xlsx";

/// Excel refuses sheet names longer than this.
const EXCEL_SHEET_NAME_LIMIT: usize = 31;

/// Configuration for a [`Standardizer`](crate::Standardizer).
///
/// # Example
///
/// ```rust,ignore
/// use cleanroom_standardizer::StandardizerConfig;
///
/// let config = StandardizerConfig::builder()
///     .max_workers(3)
///     .min_auto_group_size(1)
///     .output_dir("exports")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardizerConfig {
    /// Upper bound of concurrent mapping requests.
    /// Default: 5
    pub max_workers: usize,

    /// Number of canonicalized samples collected per column for clustering.
    /// Default: 30
    pub cluster_sample_size: usize,

    /// Number of samples shown inline in the clustering prompt; the rest are
    /// summarized by count.
    /// Default: 20
    pub prompt_sample_size: usize,

    /// Number of non-null values checked when deciding whether a column
    /// holds text.
    /// Default: 10
    pub eligibility_sample_size: usize,

    /// Auto-detected groups with fewer columns than this are not selected
    /// for mapping generation. Custom groups are always selected.
    /// Default: 2
    pub min_auto_group_size: usize,

    /// Re-apply the reviewer's corrections after a refinement response.
    /// Default: true
    pub enforce_feedback: bool,

    /// Maximum length of exported sheet names.
    /// Default: 31
    pub sheet_name_max_len: usize,

    /// Directory the export workbooks are written to.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// File name of the mappings workbook.
    /// Default: "final_mappings_only.xlsx"
    pub mappings_file_name: String,

    /// File name of the cleaned data workbook.
    /// Default: "cleaned_data_with_mappings.xlsx"
    pub cleaned_file_name: String,
}

impl Default for StandardizerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            cluster_sample_size: DEFAULT_CLUSTER_SAMPLE_SIZE,
            prompt_sample_size: DEFAULT_PROMPT_SAMPLE_SIZE,
            eligibility_sample_size: DEFAULT_ELIGIBILITY_SAMPLE_SIZE,
            min_auto_group_size: DEFAULT_MIN_AUTO_GROUP_SIZE,
            enforce_feedback: true,
            sheet_name_max_len: DEFAULT_SHEET_NAME_MAX_LEN,
            output_dir: PathBuf::from("output"),
            mappings_file_name: DEFAULT_MAPPINGS_FILE_NAME.to_string(),
            cleaned_file_name: DEFAULT_CLEANED_FILE_NAME.to_string(),
        }
    }
}

impl StandardizerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> StandardizerConfigBuilder {
        StandardizerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_workers == 0 {
            return Err(ConfigValidationError::InvalidWorkerCount(self.max_workers));
        }

        if self.cluster_sample_size == 0 {
            return Err(ConfigValidationError::ZeroSampleSize(
                "cluster_sample_size".to_string(),
            ));
        }

        if self.eligibility_sample_size == 0 {
            return Err(ConfigValidationError::ZeroSampleSize(
                "eligibility_sample_size".to_string(),
            ));
        }

        if self.prompt_sample_size > self.cluster_sample_size {
            return Err(ConfigValidationError::PromptSampleTooLarge {
                prompt: self.prompt_sample_size,
                cluster: self.cluster_sample_size,
            });
        }

        if self.sheet_name_max_len == 0 || self.sheet_name_max_len > EXCEL_SHEET_NAME_LIMIT {
            return Err(ConfigValidationError::InvalidSheetNameLength(
                self.sheet_name_max_len,
            ));
        }

        if self.mappings_file_name.trim().is_empty() || self.cleaned_file_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyFileName);
        }

        if self.mappings_file_name == self.cleaned_file_name {
            return Err(ConfigValidationError::DuplicateFileName(
                self.mappings_file_name.clone(),
            ));
        }

        Ok(())
    }

    /// Full path of the mappings workbook.
    pub fn mappings_path(&self) -> PathBuf {
        self.output_dir.join(&self.mappings_file_name)
    }

    /// Full path of the cleaned data workbook.
    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join(&self.cleaned_file_name)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid worker count: {0} (must be at least 1)")]
    InvalidWorkerCount(usize),

    #[error("Sample size '{0}' must be at least 1")]
    ZeroSampleSize(String),

    #[error("Prompt sample size {prompt} exceeds cluster sample size {cluster}")]
    PromptSampleTooLarge { prompt: usize, cluster: usize },

    #[error("Invalid sheet name length: {0} (must be between 1 and 31)")]
    InvalidSheetNameLength(usize),

    #[error("Export file names must not be empty")]
    EmptyFileName,

    #[error("Both export workbooks would be written to '{0}'")]
    DuplicateFileName(String),
}

/// Builder for [`StandardizerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct StandardizerConfigBuilder {
    max_workers: Option<usize>,
    cluster_sample_size: Option<usize>,
    prompt_sample_size: Option<usize>,
    eligibility_sample_size: Option<usize>,
    min_auto_group_size: Option<usize>,
    enforce_feedback: Option<bool>,
    sheet_name_max_len: Option<usize>,
    output_dir: Option<PathBuf>,
    mappings_file_name: Option<String>,
    cleaned_file_name: Option<String>,
}

impl StandardizerConfigBuilder {
    /// Set the maximum number of concurrent mapping requests.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Set how many samples per column are collected for clustering.
    pub fn cluster_sample_size(mut self, size: usize) -> Self {
        self.cluster_sample_size = Some(size);
        self
    }

    /// Set how many samples per column are listed in the clustering prompt.
    pub fn prompt_sample_size(mut self, size: usize) -> Self {
        self.prompt_sample_size = Some(size);
        self
    }

    /// Set how many values are checked for the text-column test.
    pub fn eligibility_sample_size(mut self, size: usize) -> Self {
        self.eligibility_sample_size = Some(size);
        self
    }

    /// Set the minimum size of auto-detected groups selected for generation.
    ///
    /// Use 1 to also generate mappings for columns that matched nothing.
    pub fn min_auto_group_size(mut self, size: usize) -> Self {
        self.min_auto_group_size = Some(size);
        self
    }

    /// Enable or disable re-applying reviewer corrections after refinement.
    pub fn enforce_feedback(mut self, enforce: bool) -> Self {
        self.enforce_feedback = Some(enforce);
        self
    }

    /// Set the maximum exported sheet name length.
    pub fn sheet_name_max_len(mut self, len: usize) -> Self {
        self.sheet_name_max_len = Some(len);
        self
    }

    /// Set the export directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the mappings workbook file name.
    pub fn mappings_file_name(mut self, name: impl Into<String>) -> Self {
        self.mappings_file_name = Some(name.into());
        self
    }

    /// Set the cleaned data workbook file name.
    pub fn cleaned_file_name(mut self, name: impl Into<String>) -> Self {
        self.cleaned_file_name = Some(name.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `StandardizerConfig` or an error if validation fails.
    pub fn build(self) -> Result<StandardizerConfig, ConfigValidationError> {
        let config = StandardizerConfig {
            max_workers: self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            cluster_sample_size: self
                .cluster_sample_size
                .unwrap_or(DEFAULT_CLUSTER_SAMPLE_SIZE),
            prompt_sample_size: self.prompt_sample_size.unwrap_or(DEFAULT_PROMPT_SAMPLE_SIZE),
            eligibility_sample_size: self
                .eligibility_sample_size
                .unwrap_or(DEFAULT_ELIGIBILITY_SAMPLE_SIZE),
            min_auto_group_size: self
                .min_auto_group_size
                .unwrap_or(DEFAULT_MIN_AUTO_GROUP_SIZE),
            enforce_feedback: self.enforce_feedback.unwrap_or(true),
            sheet_name_max_len: self.sheet_name_max_len.unwrap_or(DEFAULT_SHEET_NAME_MAX_LEN),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("output")),
            mappings_file_name: self
                .mappings_file_name
                .unwrap_or_else(|| DEFAULT_MAPPINGS_FILE_NAME.to_string()),
            cleaned_file_name: self
                .cleaned_file_name
                .unwrap_or_else(|| DEFAULT_CLEANED_FILE_NAME.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StandardizerConfig::default();
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.cluster_sample_size, 30);
        assert_eq!(config.prompt_sample_size, 20);
        assert_eq!(config.min_auto_group_size, 2);
        assert!(config.enforce_feedback);
        assert_eq!(config.mappings_file_name, "final_mappings_only.xlsx");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = StandardizerConfig::builder()
            .max_workers(2)
            .min_auto_group_size(1)
            .enforce_feedback(false)
            .output_dir("exports")
            .build()
            .unwrap();

        assert_eq!(config.max_workers, 2);
        assert_eq!(config.min_auto_group_size, 1);
        assert!(!config.enforce_feedback);
        assert_eq!(
            config.mappings_path(),
            PathBuf::from("exports").join("final_mappings_only.xlsx")
        );
    }

    #[test]
    fn test_validation_zero_workers() {
        let result = StandardizerConfig::builder().max_workers(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidWorkerCount(0)
        ));
    }

    #[test]
    fn test_validation_prompt_sample_too_large() {
        let result = StandardizerConfig::builder()
            .cluster_sample_size(10)
            .prompt_sample_size(20)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::PromptSampleTooLarge { .. }
        ));
    }

    #[test]
    fn test_validation_sheet_name_length() {
        let result = StandardizerConfig::builder().sheet_name_max_len(40).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidSheetNameLength(40)
        ));
    }

    #[test]
    fn test_validation_duplicate_file_names() {
        let result = StandardizerConfig::builder()
            .mappings_file_name("out.xlsx")
            .cleaned_file_name("out.xlsx")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateFileName(_)
        ));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "max_workers": 3,
            "cluster_sample_size": 25,
            "prompt_sample_size": 15,
            "eligibility_sample_size": 8,
            "min_auto_group_size": 1,
            "enforce_feedback": false,
            "sheet_name_max_len": 28,
            "output_dir": "custom_output",
            "mappings_file_name": "maps.xlsx",
            "cleaned_file_name": "clean.xlsx"
        }"#;

        let config: StandardizerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.prompt_sample_size, 15);
        assert!(!config.enforce_feedback);
        assert_eq!(config.output_dir.to_str().unwrap(), "custom_output");
        assert!(config.validate().is_ok());
    }
}
