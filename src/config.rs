use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL_PATH: &str = "model/vegetable_classifier.onnx";
pub const DEFAULT_NUTRITION_TABLE: &str = "informasi-gizi-sayuran";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub nutrition_table: String,
    pub model_path: PathBuf,
    pub model_sha256: Option<String>,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {}", v))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let nutrition_table =
            lookup("NUTRITION_TABLE").unwrap_or_else(|| DEFAULT_NUTRITION_TABLE.to_string());
        if !is_valid_table_name(&nutrition_table) {
            anyhow::bail!("NUTRITION_TABLE contains invalid characters: {}", nutrition_table);
        }

        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let model_sha256 = lookup("MODEL_SHA256")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            nutrition_table,
            model_path,
            model_sha256,
            bind_addr,
            max_upload_bytes,
        })
    }
}

/// The table name is interpolated into SQL, so only plain identifier characters are allowed.
fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
