use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FrankfurterProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GdeltProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub frankfurter: Option<FrankfurterProviderConfig>,
    pub gdelt: Option<GdeltProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            frankfurter: Some(FrankfurterProviderConfig {
                base_url: "https://api.frankfurter.dev".to_string(),
            }),
            gdelt: Some(GdeltProviderConfig {
                base_url: "https://api.gdeltproject.org".to_string(),
            }),
        }
    }
}

/// Optional overrides for the news filter's static sets. When absent, the
/// built-in defaults in `news::NewsFilter` apply.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct NewsFilterConfig {
    pub trusted_domains: Option<Vec<String>>,
    pub allowed_countries: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Currency the stored rates are quoted in (1 unit of base -> this).
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    #[serde(default)]
    pub news_filter: NewsFilterConfig,
    pub data_path: Option<String>,
}

fn default_quote_currency() -> String {
    "KRW".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            quote_currency: default_quote_currency(),
            news_filter: NewsFilterConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "econsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "econsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Upper-cased quote currency code from the config.
    pub fn quote_currency(&self) -> crate::core::error::Result<String> {
        let code = self.quote_currency.trim().to_uppercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(crate::core::error::Error::validation(
                "quote_currency",
                format!("not a currency code: {}", self.quote_currency),
            ));
        }
        Ok(code)
    }
}
