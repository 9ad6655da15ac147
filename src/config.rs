use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub content_seed_path: Option<String>,
    pub store_timeout_ms: u64,
    pub sessions: SessionConfig,
    pub selection: SelectionEnvConfig,
}

/// 会话空闲过期时间上限（30 天）
pub const MAX_SESSION_IDLE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub const MIN_SESSION_IDLE_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
    pub max_active: usize,
}

/// Optional overrides on top of the built-in selection policy.
#[derive(Debug, Clone, Default)]
pub struct SelectionEnvConfig {
    pub window_size: Option<usize>,
    pub low_accuracy: Option<f64>,
    pub high_accuracy: Option<f64>,
    pub min_global_samples: Option<u64>,
    pub high_confidence_samples: Option<u64>,
    pub min_personal_samples: Option<u64>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("cors_origin", &self.cors_origin)
            .field("content_seed_path", &self.content_seed_path)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("sessions", &self.sessions)
            .field("selection", &self.selection)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/practice.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            content_seed_path: env::var("CONTENT_SEED_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            store_timeout_ms: env_or_parse("STORE_TIMEOUT_MS", 5_000_u64),
            sessions: SessionConfig {
                idle_ttl_secs: clamp_idle_ttl(env_or_parse("SESSION_IDLE_TTL_SECS", 7_200_u64)),
                max_active: env_or_parse("MAX_ACTIVE_SESSIONS", 10_000_usize),
            },
            selection: SelectionEnvConfig {
                window_size: env_opt_parse("SELECTION_WINDOW_SIZE"),
                low_accuracy: env_opt_parse("SELECTION_LOW_ACCURACY"),
                high_accuracy: env_opt_parse("SELECTION_HIGH_ACCURACY"),
                min_global_samples: env_opt_parse("SELECTION_MIN_GLOBAL_SAMPLES"),
                high_confidence_samples: env_opt_parse("SELECTION_HIGH_CONFIDENCE_SAMPLES"),
                min_personal_samples: env_opt_parse("SELECTION_MIN_PERSONAL_SAMPLES"),
            },
        }
    }
}

fn clamp_idle_ttl(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_SESSION_IDLE_TTL_SECS, MAX_SESSION_IDLE_TTL_SECS);
    if clamped != secs {
        tracing::warn!(
            requested = secs,
            applied = clamped,
            "SESSION_IDLE_TTL_SECS out of range, clamped"
        );
    }
    clamped
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    env_opt_parse(key).unwrap_or(default)
}

/// `None` when unset or unparsable; parse failures are logged.
pub fn env_opt_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(
                key,
                value = %raw,
                "Failed to parse env var, using default"
            );
            None
        }
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

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "STORE_TIMEOUT_MS",
            "CONTENT_SEED_PATH",
            "SELECTION_WINDOW_SIZE",
            "SELECTION_LOW_ACCURACY",
            "ENABLE_FILE_LOGS",
            "SESSION_IDLE_TTL_SECS",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.store_timeout_ms, 5_000);
        assert!(cfg.content_seed_path.is_none());
        assert!(cfg.selection.window_size.is_none());
    }

    #[test]
    fn parses_selection_overrides() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("SELECTION_WINDOW_SIZE", "5");
        env::set_var("SELECTION_LOW_ACCURACY", "0.5");

        let cfg = Config::from_env();
        assert_eq!(cfg.selection.window_size, Some(5));
        assert_eq!(cfg.selection.low_accuracy, Some(0.5));
        assert!(cfg.selection.high_accuracy.is_none());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("SELECTION_WINDOW_SIZE", "three");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert!(cfg.selection.window_size.is_none());
    }

    #[test]
    fn session_idle_ttl_is_clamped() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        assert_eq!(Config::from_env().sessions.idle_ttl_secs, 7_200);

        env::set_var("SESSION_IDLE_TTL_SECS", u64::MAX.to_string());
        assert_eq!(
            Config::from_env().sessions.idle_ttl_secs,
            MAX_SESSION_IDLE_TTL_SECS
        );

        env::set_var("SESSION_IDLE_TTL_SECS", "0");
        assert_eq!(
            Config::from_env().sessions.idle_ttl_secs,
            MIN_SESSION_IDLE_TTL_SECS
        );
        env::remove_var("SESSION_IDLE_TTL_SECS");
    }

    #[test]
    fn debug_output_hides_secret() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let rendered = format!("{:?}", Config::from_env());
        assert!(rendered.contains("***REDACTED***"));
        assert!(!rendered.contains("change_me"));
    }
}
