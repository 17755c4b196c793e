use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

pub(crate) const CONFIG_FILE_NAME: &str = "config.json";
pub(crate) const CREDENTIALS_FILE_NAME: &str = "credentials.json";

const APP_TOKEN_PREFIX: &str = "xapp-";
const BOT_TOKEN_PREFIX: &str = "xoxb-";

#[derive(Debug, Default, Deserialize)]
struct BridgeConfigFile {
    #[serde(default)]
    app_token: String,
    #[serde(default)]
    bot_token: String,
    #[serde(default)]
    debug: bool,
    #[serde(default, rename = "baseDir")]
    base_dir: String,
    #[serde(default)]
    author_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ConfigIssue {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must start with {prefix}")]
    BadPrefix {
        field: &'static str,
        prefix: &'static str,
    },
}

#[derive(Debug, Error)]
#[error("invalid configuration in {}: {}", .path.display(), render_issues(.issues))]
pub(crate) struct ConfigError {
    pub(crate) path: PathBuf,
    pub(crate) issues: Vec<ConfigIssue>,
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    let mut rendered = String::new();
    for (index, issue) in issues.iter().enumerate() {
        if index > 0 {
            rendered.push_str("; ");
        }
        let _ = write!(rendered, "{issue}");
    }
    rendered
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BridgeConfig {
    pub(crate) app_token: String,
    pub(crate) bot_token: String,
    pub(crate) debug: bool,
    pub(crate) base_dir: PathBuf,
    pub(crate) author_id: String,
}

pub(crate) fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

pub(crate) fn credentials_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CREDENTIALS_FILE_NAME)
}

pub(crate) fn load_bridge_config(config_dir: &Path) -> Result<BridgeConfig> {
    let path = config_path(config_dir);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_bridge_config(&raw, &path)
}

pub(crate) fn parse_bridge_config(raw: &str, path: &Path) -> Result<BridgeConfig> {
    let file = serde_json::from_str::<BridgeConfigFile>(raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(validate(file, path)?)
}

fn check_token(
    issues: &mut Vec<ConfigIssue>,
    field: &'static str,
    value: &str,
    prefix: &'static str,
) {
    if value.is_empty() {
        issues.push(ConfigIssue::Missing(field));
    } else if !value.starts_with(prefix) {
        issues.push(ConfigIssue::BadPrefix { field, prefix });
    }
}

fn validate(file: BridgeConfigFile, path: &Path) -> Result<BridgeConfig, ConfigError> {
    let app_token = file.app_token.trim().to_string();
    let bot_token = file.bot_token.trim().to_string();
    let base_dir = file.base_dir.trim().to_string();
    let author_id = file.author_id.trim().to_string();

    let mut issues = Vec::new();
    check_token(&mut issues, "app_token", &app_token, APP_TOKEN_PREFIX);
    check_token(&mut issues, "bot_token", &bot_token, BOT_TOKEN_PREFIX);
    if base_dir.is_empty() {
        issues.push(ConfigIssue::Missing("baseDir"));
    }
    if author_id.is_empty() {
        issues.push(ConfigIssue::Missing("author_id"));
    }
    if !issues.is_empty() {
        return Err(ConfigError {
            path: path.to_path_buf(),
            issues,
        });
    }

    Ok(BridgeConfig {
        app_token,
        bot_token,
        debug: file.debug,
        base_dir: PathBuf::from(base_dir),
        author_id,
    })
}
