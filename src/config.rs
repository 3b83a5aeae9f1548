use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for the S3-compatible backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Optional TOML file layer; every field may be overridden from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub storage: FileStorageConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStorageConfig {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub secure: Option<bool>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: FileConfig = toml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(config)
    }
}

impl StorageConfig {
    /// Resolves settings from the process environment, then `env_file`, then
    /// the optional TOML file.
    pub fn load(env_file: &Path, config_file: Option<&Path>) -> Result<Self> {
        Self::load_with(env_file, config_file, |key| std::env::var(key).ok())
    }

    fn load_with<E>(env_file: &Path, config_file: Option<&Path>, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let dotenv = read_env_file(env_file)?;
        let file = match config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let config = Self::resolve(&file, |key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| dotenv.get(key).cloned())
        })?;
        Ok(config)
    }

    pub fn resolve<F>(file: &FileConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = &file.storage;
        let value = |key: &'static str, fallback: &Option<String>| {
            let present = |v: &String| !v.trim().is_empty();
            lookup(key)
                .filter(present)
                .or_else(|| fallback.clone().filter(present))
        };

        let endpoint = value("MINIO_ENDPOINT", &file.endpoint)
            .ok_or(ConfigError::Missing("MINIO_ENDPOINT"))?;
        let access_key = value("MINIO_ACCESS_KEY", &file.access_key)
            .ok_or(ConfigError::Missing("MINIO_ACCESS_KEY"))?;
        let secret_key = value("MINIO_SECRET_KEY", &file.secret_key)
            .ok_or(ConfigError::Missing("MINIO_SECRET_KEY"))?;
        let region = value("MINIO_REGION", &file.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let secure = match lookup("MINIO_SECURE") {
            Some(raw) => parse_bool("MINIO_SECURE", &raw)?,
            None => file.secure.unwrap_or(false),
        };

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint, secure),
            access_key,
            secret_key,
            region,
        })
    }

    pub fn default_config() -> String {
        r#"
[storage]
endpoint = "localhost:9000"      # MINIO_ENDPOINT
access_key = "minioadmin"        # MINIO_ACCESS_KEY
secret_key = "minioadmin"        # MINIO_SECRET_KEY
region = "us-east-1"             # MINIO_REGION, optional
secure = false                   # MINIO_SECURE, https when the endpoint has no scheme
"#
        .to_string()
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let mut vars = HashMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file: {:?}", path))?;
    for item in iter {
        let (key, value) = item.with_context(|| format!("Failed to parse env file: {:?}", path))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

pub(crate) fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn normalize_endpoint(endpoint: &str, secure: bool) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if secure {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}
