use crate::request::{MatchOptions, ReplaceRequest, ScanFilter};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// A bulk replace job as written in a TOML file.
///
/// ```toml
/// root = "./site"
/// find = "colour"
/// replace = "color"
///
/// [options]
/// whole_word = true
///
/// [filters]
/// ignored_paths = ["vendor"]
/// ignored_extensions = ["lock"]
/// ```
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct JobConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub find: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default)]
    pub options: MatchOptions,
    #[serde(default)]
    pub filters: ScanFilter,
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.find.is_empty() {
            issues.push(ValidationIssue::MissingField { field: "find" });
        }
        if let Some(root) = &self.root {
            if root.as_os_str().is_empty() {
                issues.push(ValidationIssue::MissingField { field: "root" });
            }
        }
        if self.filters.ignored_words.iter().any(|w| w.trim().is_empty()) {
            issues.push(ValidationIssue::BlankEntry {
                field: "filters.ignored_words",
            });
        }
        if self
            .filters
            .ignored_extensions
            .iter()
            .any(|e| e.trim().trim_start_matches('.').is_empty())
        {
            issues.push(ValidationIssue::BlankEntry {
                field: "filters.ignored_extensions",
            });
        }
        if !self.options.include_names && !self.options.include_contents {
            issues.push(ValidationIssue::InvalidCombo {
                message: "include_names and include_contents are both false, nothing to do"
                    .to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Build the request, preferring `root` over the job's own root.
    pub fn to_request(&self, root: Option<PathBuf>) -> Result<ReplaceRequest, ValidationError> {
        let root = root
            .or_else(|| self.root.clone())
            .ok_or_else(|| ValidationError {
                issues: vec![ValidationIssue::MissingField { field: "root" }],
            })?;

        Ok(ReplaceRequest::new(root, self.find.clone(), self.replace.clone())
            .with_options(self.options)
            .with_filter(self.filters.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    BlankEntry { field: &'static str },
    InvalidCombo { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "job missing required field '{field}'")
            }
            ValidationIssue::BlankEntry { field } => {
                write!(f, "job field '{field}' contains a blank entry")
            }
            ValidationIssue::InvalidCombo { message } => {
                write!(f, "invalid job configuration: {message}")
            }
        }
    }
}
