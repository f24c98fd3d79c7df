use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const GITHUB_API_URL: &str = "https://api.github.com/graphql";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub linear: LinearConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LinearConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct GitHubConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedUsers {
    /// Show comments under a placeholder carrying the source name and avatar.
    #[default]
    Placeholder,
    /// Post comments as the owner of the destination API key.
    Importer,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    pub page_size: u32,
    pub max_page_retries: u32,
    pub concurrency: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub unmatched_users: UnmatchedUsers,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            max_page_retries: 5,
            concurrency: 4,
            max_retries: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            unmatched_users: UnmatchedUsers::Placeholder,
        }
    }
}

impl ImportConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.initial_backoff_ms,
            self.max_backoff_ms,
        )
    }
}

impl AppConfig {
    /// Destination API key. Checked before an importer is even selected.
    pub fn linear_api_key(&self) -> Result<&str, ConfigError> {
        non_empty(self.linear.api_key.as_deref()).ok_or_else(|| ConfigError::MissingCredential {
            var: "LINEAR_API_KEY",
            file: config_path().display().to_string(),
        })
    }

    pub fn github_api_key(&self) -> Result<&str, ConfigError> {
        non_empty(self.github.api_key.as_deref()).ok_or_else(|| ConfigError::MissingCredential {
            var: "GITHUB_API_KEY",
            file: config_path().display().to_string(),
        })
    }

    pub fn linear_api_url(&self) -> &str {
        self.linear.api_url.as_deref().unwrap_or(LINEAR_API_URL)
    }

    pub fn github_api_url(&self) -> &str {
        self.github.api_url.as_deref().unwrap_or(GITHUB_API_URL)
    }

    /// Overlay values from the environment on top of the file config.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("LINEAR_API_KEY") {
            self.linear.api_key = Some(key);
        }
        if let Some(key) = lookup("GITHUB_API_KEY") {
            self.github.api_key = Some(key);
        }
        if let Some(value) = lookup("TRACKER_IMPORT_UNMATCHED_USERS") {
            self.import.unmatched_users = match value.to_ascii_lowercase().as_str() {
                "placeholder" => UnmatchedUsers::Placeholder,
                "importer" => UnmatchedUsers::Importer,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "TRACKER_IMPORT_UNMATCHED_USERS",
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tracker-import")
        .join("config.toml")
}

pub fn parse_config(contents: &str, path: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Load the config file (if any), then `.env`, then the process environment.
/// This is the only place the environment is read.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_path();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        parse_config(&contents, &path.display().to_string())?
    } else {
        AppConfig::default()
    };

    dotenvy::dotenv().ok();
    config.apply_env(|var| std::env::var(var).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("", "config.toml").unwrap();
        assert_eq!(config.import.page_size, 25);
        assert_eq!(config.import.max_page_retries, 5);
        assert_eq!(config.import.unmatched_users, UnmatchedUsers::Placeholder);
        assert_eq!(config.linear_api_url(), LINEAR_API_URL);
        assert_eq!(config.github_api_url(), GITHUB_API_URL);
    }

    #[test]
    fn file_values_are_read() {
        let toml = r#"
[linear]
api_key = "lin_api_123"

[github]
api_key = "ghp_abc"
api_url = "http://localhost:9000/graphql"

[import]
max_page_retries = 2
unmatched_users = "importer"
"#;
        let config = parse_config(toml, "config.toml").unwrap();
        assert_eq!(config.linear_api_key().unwrap(), "lin_api_123");
        assert_eq!(config.github_api_key().unwrap(), "ghp_abc");
        assert_eq!(config.github_api_url(), "http://localhost:9000/graphql");
        assert_eq!(config.import.max_page_retries, 2);
        assert_eq!(config.import.page_size, 25);
        assert_eq!(config.import.unmatched_users, UnmatchedUsers::Importer);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = parse_config("[import\npage_size = 1", "bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = parse_config("[linear]\napi_key = \"from_file\"", "c").unwrap();
        let env: HashMap<&str, &str> = [
            ("LINEAR_API_KEY", "from_env"),
            ("GITHUB_API_KEY", "gh_env"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.linear_api_key().unwrap(), "from_env");
        assert_eq!(config.github_api_key().unwrap(), "gh_env");
    }

    #[test]
    fn missing_or_blank_credentials_are_errors() {
        let mut config = AppConfig::default();
        let err = config.linear_api_key().unwrap_err();
        assert!(err.to_string().contains("LINEAR_API_KEY"));

        config.github.api_key = Some("   ".into());
        let err = config.github_api_key().unwrap_err();
        assert!(err.to_string().contains("GITHUB_API_KEY"));
    }

    #[test]
    fn invalid_user_policy_in_env_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|var| {
            (var == "TRACKER_IMPORT_UNMATCHED_USERS").then(|| "nobody".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
