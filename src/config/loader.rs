use crate::config::schema::{JobConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading a job file. `path` is `None` when the job
/// was parsed from a string.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read job file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse job file{}: {source}", located(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid job file{}: {source}", located(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

pub fn load_from_str(input: &str) -> Result<JobConfig, ConfigError> {
    parse(input, None)
}

/// Load a job file. A relative `root` is resolved against the job file's
/// directory; relative `ignored_paths` stay relative to that root.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<JobConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse(&contents, Some(path))?;

    if let (Some(root), Some(dir)) = (&config.root, path.parent()) {
        if root.is_relative() {
            config.root = Some(dir.join(root));
        }
    }

    Ok(config)
}

fn parse(input: &str, path: Option<&Path>) -> Result<JobConfig, ConfigError> {
    let config: JobConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: path.map(Path::to_path_buf),
        source,
    })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation {
            path: path.map(Path::to_path_buf),
            source,
        })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ValidationIssue;

    #[test]
    fn test_load_minimal_job() {
        let config = load_from_str("find = \"foo\"\nreplace = \"bar\"\n").unwrap();
        assert_eq!(config.find, "foo");
        assert_eq!(config.replace, "bar");
        assert!(config.root.is_none());
        assert!(config.options.recursive);
        assert!(config.filters.skip_binary_extensions);
    }

    #[test]
    fn test_missing_find_is_reported() {
        let err = load_from_str("replace = \"bar\"\n").unwrap_err();
        match err {
            ConfigError::Validation { source, .. } => {
                assert_eq!(
                    source.issues,
                    vec![ValidationIssue::MissingField { field: "find" }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_all_issues_reported_at_once() {
        let toml = r#"
find = ""
[options]
include_names = false
include_contents = false
[filters]
ignored_words = [" "]
"#;
        let err = load_from_str(toml).unwrap_err();
        match err {
            ConfigError::Validation { source, .. } => assert_eq!(source.issues.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_toml_carries_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let job = temp_dir.path().join("job.toml");
        fs::write(&job, "find = [").unwrap();

        let err = load_from_path(&job).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("job.toml"));
    }

    #[test]
    fn test_relative_root_resolved_against_job_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let job = temp_dir.path().join("job.toml");
        fs::write(&job, "root = \"site\"\nfind = \"a\"\n").unwrap();

        let config = load_from_path(&job).unwrap();
        assert_eq!(config.root, Some(temp_dir.path().join("site")));
    }

    #[test]
    fn test_validation_error_names_job_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let job = temp_dir.path().join("empty-find.toml");
        fs::write(&job, "find = \"\"\n").unwrap();

        let err = load_from_path(&job).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("invalid job file ("));
        assert!(message.contains("empty-find.toml"));
        assert!(message.contains("'find'"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_string_errors_have_no_location() {
        let err = load_from_str("find = [").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse job file: "));
    }
}
