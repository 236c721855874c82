use std::{env, fs};

use anyhow::Context;
use serde::Deserialize;

/// Typed view of the JSON configuration file. The path comes from the
/// `APP_CONFIG` env var and defaults to `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors")]
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_prefix")]
    pub base_prefix: String,
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    pub expose_tables: Vec<String>,
    #[serde(default)]
    pub read_only_tables: Vec<String>,
    #[serde(default)]
    pub log_sql: bool,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_docs_title")]
    pub title: String,
    #[serde(default = "default_docs_version")]
    pub version: String,
    #[serde(default = "default_docs_path")]
    pub docs_path: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        DocsConfig {
            enabled: false,
            title: default_docs_title(),
            version: default_docs_version(),
            docs_path: default_docs_path(),
        }
    }
}

impl ApiConfig {
    /// Base prefix with any trailing slash removed, ready for route paths.
    pub fn prefix(&self) -> &str {
        self.base_prefix.trim_end_matches('/')
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_cors() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_pool_size() -> u32 {
    5
}
fn default_base_prefix() -> String {
    "/api".to_string()
}
fn default_limit() -> i64 {
    100
}
fn default_max_limit() -> i64 {
    1000
}
fn default_docs_title() -> String {
    "API".to_string()
}
fn default_docs_version() -> String {
    "1.0.0".to_string()
}
fn default_docs_path() -> String {
    "/docs".to_string()
}

pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = env::var("APP_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let raw = fs::read_to_string(&path).with_context(|| format!("reading config file '{path}'"))?;
    let cfg: AppConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing config file '{path}'"))?;
    Ok(cfg)
}
