//! Atlas API configuration
//!
//! Loaded once at startup and shared read-only (`Arc<AtlasConfig>`) by every
//! component. The file is either `KEY=VALUE` lines:
//!
//! ```text
//! # Atlas programmatic API key
//! PUBLIC_KEY=abcdefgh
//! PRIVATE_KEY=00000000-0000-0000-0000-000000000000
//! PROJECT_ID=5f0000000000000000000000
//! SP_WORKSPACE_NAME=analytics
//! ```
//!
//! or a flat TOML table with the same keys when the path ends in `.toml`.

use crate::error::{ApiError, ConfigError};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_BASE_URL: &str = "https://cloud.mongodb.com/api/atlas/v2";
pub const DEFAULT_PROCESSORS_DIR: &str = "processors";

const REQUIRED_KEYS: [&str; 3] = ["PUBLIC_KEY", "PRIVATE_KEY", "PROJECT_ID"];

static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("PLACEHOLDER_PATTERN regex should compile")
});

#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub public_key: String,
    pub private_key: String,
    pub project_id: String,
    /// `SP_WORKSPACE_NAME`, or the legacy `SP_INSTANCE_NAME`.
    pub workspace: Option<String>,
    pub base_url: String,
    pub processors_dir: PathBuf,
    /// Every key from the file, used for `${VAR}` substitution.
    values: BTreeMap<String, String>,
}

impl AtlasConfig {
    /// Load from a `KEY=VALUE` file, or a TOML file when the extension is `.toml`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let values = if path.extension().is_some_and(|ext| ext == "toml") {
            parse_toml(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            parse_key_values(&text)
        };

        let config = Self::from_values(values)?;
        tracing::debug!(
            path = %path.display(),
            project = %config.project_id,
            workspace = config.workspace.as_deref().unwrap_or("-"),
            "Loaded Atlas configuration"
        );
        Ok(config)
    }

    /// Build from already-parsed key/value pairs.
    pub fn from_values(values: BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !values.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let non_empty = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            public_key: values["PUBLIC_KEY"].clone(),
            private_key: values["PRIVATE_KEY"].clone(),
            project_id: values["PROJECT_ID"].clone(),
            workspace: non_empty("SP_WORKSPACE_NAME").or_else(|| non_empty("SP_INSTANCE_NAME")),
            base_url: non_empty("ATLAS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            processors_dir: non_empty("PROCESSORS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROCESSORS_DIR)),
            values,
        })
    }

    /// Raw value of any configuration key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Replace `${VAR}` placeholders with configuration values. Unknown
    /// placeholders are left as written.
    pub fn substitute_variables(&self, text: &str) -> String {
        PLACEHOLDER_PATTERN
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.values
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// `{base}/groups/{project}`
    pub fn project_url(&self) -> String {
        format!("{}/groups/{}", self.base_url, self.project_id)
    }

    /// `{project}/streams/{workspace}`, which processor and connection
    /// operations require.
    pub fn workspace_url(&self) -> Result<String, ApiError> {
        let workspace = self
            .workspace
            .as_deref()
            .ok_or(ApiError::WorkspaceNotConfigured)?;
        Ok(format!("{}/streams/{}", self.project_url(), workspace))
    }
}

/// Parse `KEY=VALUE` lines. Blank lines, `#` comments and lines without `=`
/// are skipped; the split is on the first `=` and both sides are trimmed.
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn parse_toml(text: &str) -> Result<BTreeMap<String, String>, toml::de::Error> {
    let table: toml::Table = text.parse()?;
    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn minimal() -> BTreeMap<String, String> {
        values(&[
            ("PUBLIC_KEY", "pub"),
            ("PRIVATE_KEY", "priv"),
            ("PROJECT_ID", "proj"),
        ])
    }

    #[test]
    fn test_parse_key_values() {
        let parsed = parse_key_values(
            "# comment\n\nPUBLIC_KEY = abc \nURL=https://x/?a=b\nnot a pair\n  # indented comment\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["PUBLIC_KEY"], "abc");
        assert_eq!(parsed["URL"], "https://x/?a=b");
    }

    #[test]
    fn test_missing_keys_are_reported_together() {
        let err = AtlasConfig::from_values(values(&[("PUBLIC_KEY", "x")])).unwrap_err();
        match err {
            ConfigError::MissingKeys(keys) => assert_eq!(keys, vec!["PRIVATE_KEY", "PROJECT_ID"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = AtlasConfig::from_values(minimal()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.processors_dir, PathBuf::from("processors"));
        assert!(config.workspace.is_none());
        assert_eq!(
            config.project_url(),
            "https://cloud.mongodb.com/api/atlas/v2/groups/proj"
        );
        assert!(matches!(
            config.workspace_url(),
            Err(ApiError::WorkspaceNotConfigured)
        ));
    }

    #[test]
    fn test_workspace_prefers_new_key() {
        let mut v = minimal();
        v.insert("SP_INSTANCE_NAME".into(), "legacy".into());
        assert_eq!(
            AtlasConfig::from_values(v.clone()).unwrap().workspace.as_deref(),
            Some("legacy")
        );

        v.insert("SP_WORKSPACE_NAME".into(), "primary".into());
        let config = AtlasConfig::from_values(v).unwrap();
        assert_eq!(config.workspace.as_deref(), Some("primary"));
        assert!(config.workspace_url().unwrap().ends_with("/groups/proj/streams/primary"));
    }

    #[test]
    fn test_empty_workspace_counts_as_unset() {
        let mut v = minimal();
        v.insert("SP_WORKSPACE_NAME".into(), String::new());
        assert!(AtlasConfig::from_values(v).unwrap().workspace.is_none());
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let mut v = minimal();
        v.insert("ATLAS_BASE_URL".into(), "http://localhost:8080/api/".into());
        let config = AtlasConfig::from_values(v).unwrap();
        assert_eq!(config.project_url(), "http://localhost:8080/api/groups/proj");
    }

    #[test]
    fn test_substitute_variables() {
        let mut v = minimal();
        v.insert("KAFKA_HOST".into(), "broker:9092".into());
        let config = AtlasConfig::from_values(v).unwrap();
        assert_eq!(
            config.substitute_variables(r#"{"bootstrap": "${KAFKA_HOST}", "x": "${NOPE}"}"#),
            r#"{"bootstrap": "broker:9092", "x": "${NOPE}"}"#
        );
    }

    #[test]
    fn test_parse_toml_stringifies_scalars() {
        let parsed = parse_toml("PUBLIC_KEY = \"a\"\nPORT = 8080\n").unwrap();
        assert_eq!(parsed["PUBLIC_KEY"], "a");
        assert_eq!(parsed["PORT"], "8080");
    }
}
