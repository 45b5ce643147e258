use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use crate::constants::{
    DEFAULT_EXPLAIN_BATCH_DELAY_MS, DEFAULT_EXPLAIN_BATCH_SIZE, DEFAULT_PRACTICE_SIZE,
    DEFAULT_TIME_BUDGET_SECS, MAX_PRACTICE_SIZE,
};

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: u64,
    pub admin_jwt_secret: String,
    pub cors_origin: String,
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
    pub worker: WorkerConfig,
    pub practice: PracticeConfig,
    pub llm: LLMConfig,
    pub explain: ExplainConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_explanation_worker: bool,
}

#[derive(Debug, Clone)]
pub struct PracticeConfig {
    pub time_budget_secs: u32,
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            default_size: DEFAULT_PRACTICE_SIZE,
            max_size: MAX_PRACTICE_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct LLMConfig {
    pub enabled: bool,
    pub mock: bool,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ExplainConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_EXPLAIN_BATCH_SIZE,
            batch_delay_ms: DEFAULT_EXPLAIN_BATCH_DELAY_MS,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("jwt_expires_in_hours", &self.jwt_expires_in_hours)
            .field("admin_jwt_secret", &"***REDACTED***")
            .field("cors_origin", &self.cors_origin)
            .field("trust_proxy", &self.trust_proxy)
            .field("rate_limit", &self.rate_limit)
            .field("worker", &self.worker)
            .field("practice", &self.practice)
            .field("llm", &self.llm)
            .field("explain", &self.explain)
            .finish()
    }
}

impl fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMConfig")
            .field("enabled", &self.enabled)
            .field("mock", &self.mock)
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            log_json: env_or_bool("LOG_JSON", false),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/esg-quiz.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            jwt_expires_in_hours: env_or_parse("JWT_EXPIRES_IN_HOURS", 24_u64),
            admin_jwt_secret: env_or(
                "ADMIN_JWT_SECRET",
                "change_me_to_another_random_64_chars_change_me_to_another",
            ),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            trust_proxy: env_or_bool("TRUST_PROXY", false),
            rate_limit: RateLimitConfig {
                window_secs: env_or_parse("RATE_LIMIT_WINDOW_SECS", 900_u64),
                max_requests: env_or_parse("RATE_LIMIT_MAX", 500_u64),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_explanation_worker: env_or_bool("ENABLE_EXPLANATION_WORKER", false),
            },
            practice: PracticeConfig {
                time_budget_secs: env_or_parse(
                    "PRACTICE_TIME_BUDGET_SECS",
                    DEFAULT_TIME_BUDGET_SECS,
                ),
                default_size: env_or_parse("PRACTICE_DEFAULT_SIZE", DEFAULT_PRACTICE_SIZE),
                max_size: env_or_parse("PRACTICE_MAX_SIZE", MAX_PRACTICE_SIZE),
            },
            llm: LLMConfig {
                enabled: env_or_bool("LLM_ENABLED", false),
                mock: env_or_bool("LLM_MOCK", true),
                api_url: env_or(
                    "LLM_API_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
                api_key: env_or("LLM_API_KEY", ""),
                model: env_or("LLM_MODEL", "gemini-1.5-flash"),
                timeout_secs: env_or_parse("LLM_TIMEOUT_SECS", 30_u64),
            },
            explain: ExplainConfig {
                batch_size: env_or_parse("EXPLAIN_BATCH_SIZE", DEFAULT_EXPLAIN_BATCH_SIZE),
                batch_delay_ms: env_or_parse(
                    "EXPLAIN_BATCH_DELAY_MS",
                    DEFAULT_EXPLAIN_BATCH_DELAY_MS,
                ),
            },
        }
    }

    /// 启动时检查练习与解析批处理参数的取值范围。
    pub fn validate(&self) -> Result<(), String> {
        let p = &self.practice;
        if p.time_budget_secs == 0 {
            return Err("PRACTICE_TIME_BUDGET_SECS must be greater than 0".into());
        }
        if p.max_size == 0 || p.default_size == 0 {
            return Err("PRACTICE_DEFAULT_SIZE and PRACTICE_MAX_SIZE must be greater than 0".into());
        }
        if p.default_size > p.max_size {
            return Err(format!(
                "PRACTICE_DEFAULT_SIZE ({}) exceeds PRACTICE_MAX_SIZE ({})",
                p.default_size, p.max_size
            ));
        }
        if self.explain.batch_size == 0 {
            return Err("EXPLAIN_BATCH_SIZE must be greater than 0".into());
        }
        Ok(())
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
