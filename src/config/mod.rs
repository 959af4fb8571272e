use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    /// Каталог для снапшотов сессий; без него снапшоты живут в памяти.
    pub session_dir: Option<String>,
}

// Формат вывода логов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

// Настройки API бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Токен выдаётся сервисом авторизации, клиент только подставляет его в заголовок.
    pub auth_token: Option<String>,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://book-my-show-b544.onrender.com".to_string(),
            timeout_seconds: 10,
            auth_token: None,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Собирает конфигурацию из произвольного источника переменных.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_defaults = ApiConfig::default();
        let breaker_defaults = CircuitBreakerConfig::default();

        Ok(Config {
            app: AppConfig {
                environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
                rust_log: lookup("RUST_LOG")
                    .unwrap_or_else(|| "ticket_booking_client=debug".to_string()),
                log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
                session_dir: lookup("SESSION_DIR").filter(|dir| !dir.is_empty()),
            },
            api: ApiConfig {
                base_url: lookup("BOOKING_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(api_defaults.base_url),
                timeout_seconds: parse_or(
                    &lookup,
                    "BOOKING_API_TIMEOUT_SECONDS",
                    api_defaults.timeout_seconds,
                )?,
                auth_token: lookup("BOOKING_API_TOKEN").filter(|token| !token.is_empty()),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_or(
                    &lookup,
                    "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                    breaker_defaults.failure_threshold,
                )?,
                timeout_seconds: parse_or(
                    &lookup,
                    "CIRCUIT_BREAKER_TIMEOUT_SECONDS",
                    breaker_defaults.timeout_seconds,
                )?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
    }
}
