use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use larder_core::models::DEFAULT_USER_ID;

pub const DEFAULT_EXTRACT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EXTRACT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Settings for the LLM recipe extractor.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub user_id: String,
    pub extract: ExtractConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "larder").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = env_var("LARDER_DB").map_or_else(|| data_dir.join("larder.db"), PathBuf::from);

        Ok(Config {
            db_path,
            data_dir,
            user_id: env_var("LARDER_USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            extract: ExtractConfig::from_env(),
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        load_or_create_api_key(&self.data_dir.join("api_key"))
    }
}

impl ExtractConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: env_var("OPENAI_API_KEY"),
            model: env_var("LARDER_EXTRACT_MODEL")
                .unwrap_or_else(|| DEFAULT_EXTRACT_MODEL.to_string()),
            endpoint: env_var("LARDER_EXTRACT_URL")
                .unwrap_or_else(|| DEFAULT_EXTRACT_URL.to_string()),
        }
    }
}

fn load_or_create_api_key(path: &std::path::Path) -> Result<(String, bool)> {
    use rand::Rng;
    use std::fmt::Write;

    if path.exists() {
        let key = std::fs::read_to_string(path).context("Failed to read API key file")?;
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok((key, false));
        }
    }

    let bytes: [u8; 32] = rand::rng().random();
    let key = bytes
        .iter()
        .fold(String::with_capacity(64), |mut acc: String, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        });
    std::fs::write(path, &key).context("Failed to write API key file")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to set API key file permissions")?;
    }
    eprintln!("Generated new API key: {key}");
    eprintln!("Include in requests: Authorization: Bearer {key}");
    Ok((key, true))
}
