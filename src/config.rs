use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// 每单位货币换算的基础积分（默认 1 分 / $0.25）
    #[serde(default = "default_base_rate")]
    pub base_rate: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_base_rate() -> f64 {
    4.0
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 在无配置文件时必须提供
                let database_url = env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(
                        "DATABASE_URL is not set and config.toml was not found".to_string(),
                    )
                })?;

                Config {
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: default_max_connections(),
                    },
                    ledger: LedgerConfig::default(),
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Failed to read config file {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        config.apply_env_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    fn apply_env_overrides<F>(&mut self, get_env: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().map_err(|_| {
                AppError::ConfigError(format!("DB_MAX_CONNECTIONS is not a number: {v}"))
            })?;
        }
        if let Some(v) = get_env("LEDGER_BASE_RATE") {
            self.ledger.base_rate = v.parse().map_err(|_| {
                AppError::ConfigError(format!("LEDGER_BASE_RATE is not a number: {v}"))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> AppResult<()> {
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(
                "database.max_connections must be positive".to_string(),
            ));
        }
        if !self.ledger.base_rate.is_finite() || self.ledger.base_rate <= 0.0 {
            return Err(AppError::ConfigError(
                "ledger.base_rate must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_applies_defaults() {
        let config = Config::parse(
            r#"
            [database]
            url = "postgres://localhost/ledger"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.ledger.base_rate, 4.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::parse(
            r#"
            [database]
            url = "postgres://localhost/ledger"
            max_connections = 5

            [ledger]
            base_rate = 2.0
            "#,
        )
        .unwrap();

        config
            .apply_env_overrides(|name| match name {
                "DB_MAX_CONNECTIONS" => Some("20".to_string()),
                "LEDGER_BASE_RATE" => Some("4".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.database.url, "postgres://localhost/ledger");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.ledger.base_rate, 4.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::parse(
            r#"
            [database]
            url = "sqlite::memory:"
            "#,
        )
        .unwrap();
        let err = config
            .apply_env_overrides(|name| (name == "LEDGER_BASE_RATE").then(|| "abc".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        config.ledger.base_rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_database_section_fails() {
        assert!(Config::parse("[ledger]\nbase_rate = 4.0\n").is_err());
    }
}
