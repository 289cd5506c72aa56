use crate::config::ImportSettings;
use crate::utils::error::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api: Option<ApiConfig>,
    pub import: Option<ImportSection>,
    pub retry: Option<RetryConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSection {
    pub delimiter: Option<char>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: Option<String>,
    pub progress_every: Option<usize>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PHRASE_API_TOKEN})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 把檔案中有設定的值套用到 settings 上
    pub fn apply_to(&self, settings: &mut ImportSettings) {
        if let Some(api) = &self.api {
            if let Some(base_url) = &api.base_url {
                settings.base_url = base_url.clone();
            }
            if let Some(token) = &api.token {
                settings.api_token = Some(token.clone());
            }
            if let Some(timeout) = api.timeout_seconds {
                settings.timeout_seconds = timeout;
            }
        }
        if let Some(import) = &self.import {
            if let Some(delimiter) = import.delimiter {
                settings.delimiter = delimiter;
            }
            if let Some(dry_run) = import.dry_run {
                settings.dry_run = dry_run;
            }
        }
        if let Some(delay) = self.retry.as_ref().and_then(|r| r.delay_ms) {
            settings.retry_delay_ms = delay;
        }
        if let Some(output) = &self.output {
            if let Some(directory) = &output.directory {
                settings.output_dir = directory.clone();
            }
            if let Some(every) = output.progress_every {
                settings.progress_every = every;
            }
        }
    }
}
