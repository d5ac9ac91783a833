//! Configuration for the Telegram API and the downloader
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const SESSION_NAME: &str = "telegram_session";
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_PART_SIZE_KB: u32 = 512;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Bounds the client library accepts for a download chunk, in KB.
pub const MIN_PART_SIZE_KB: u32 = 4;
pub const MAX_PART_SIZE_KB: u32 = 512;

/// YAML config structures
#[derive(Debug, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
    download: Option<DownloadConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    phone: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DownloadConfig {
    workers: Option<usize>,
    part_size_kb: Option<u32>,
    timeout_secs: Option<u64>,
    output_dir: Option<PathBuf>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Download tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub workers: usize,
    pub part_size_kb: u32,
    pub timeout: Duration,
    pub output_dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            part_size_kb: DEFAULT_PART_SIZE_KB,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output_dir: PathBuf::from("."),
        }
    }
}

impl DownloadSettings {
    /// Chunk size in bytes, as passed to the download iterator.
    pub fn part_size_bytes(&self) -> i32 {
        (normalize_part_size_kb(self.part_size_kb) * 1024) as i32
    }
}

/// Round a part size down to a multiple of 4 KB inside the accepted range.
pub fn normalize_part_size_kb(kb: u32) -> u32 {
    let clamped = kb.clamp(MIN_PART_SIZE_KB, MAX_PART_SIZE_KB);
    clamped - clamped % MIN_PART_SIZE_KB
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
    pub session_name: String,
    pub download: DownloadSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file(CONFIG_FILE)
            .or_else(|_| Self::load_from_file(Path::new("..").join(CONFIG_FILE)))
            .unwrap_or_else(|_| Self::defaults())
    }

    /// Load from an explicit path, which must exist, or fall back to [`Config::new`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigError(format!(
                        "Not found: {}",
                        path.display()
                    )));
                }
                Self::load_from_file(path)
            }
            None => Ok(Self::new()),
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(var_name) = value.as_deref().and_then(placeholder) {
            if let Ok(env_val) = std::env::var(var_name) {
                return env_val;
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value.unwrap_or_default()
    }

    /// Resolve an integer value from string config or env var
    fn resolve_env_i32(value: Option<String>, env_key: &str) -> i32 {
        if let Some(ref v) = value {
            if let Some(var_name) = placeholder(v) {
                let from_env = std::env::var(var_name)
                    .ok()
                    .and_then(|s| s.parse::<i32>().ok());
                if let Some(parsed) = from_env {
                    return parsed;
                }
            }
            // Explicit numbers in YAML win over the environment
            if let Ok(parsed) = v.parse::<i32>() {
                return parsed;
            }
        }
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

        let telegram = yaml.telegram.unwrap_or_default();
        let download = yaml.download.unwrap_or_default();
        let defaults = DownloadSettings::default();

        let api_id = Self::resolve_env_i32(telegram.api_id, "TELEGRAM_API_ID");
        let api_hash = Self::resolve_env_string(telegram.api_hash, "TELEGRAM_API_HASH");
        let phone = Self::resolve_env_string(telegram.phone, "TELEGRAM_PHONE");

        Ok(Self {
            phone,
            api_id,
            api_hash,
            session_name: telegram
                .session_name
                .unwrap_or_else(|| SESSION_NAME.to_string()),
            download: DownloadSettings {
                workers: download.workers.unwrap_or(defaults.workers).max(1),
                part_size_kb: normalize_part_size_kb(
                    download.part_size_kb.unwrap_or(defaults.part_size_kb),
                ),
                timeout: download
                    .timeout_secs
                    .map(|secs| Duration::from_secs(secs.max(1)))
                    .unwrap_or(defaults.timeout),
                output_dir: download.output_dir.unwrap_or(defaults.output_dir),
            },
        })
    }

    /// Config without a file: credentials come from the environment only.
    fn defaults() -> Self {
        Self::load_dotenv();
        Self {
            phone: Self::resolve_env_string(None, "TELEGRAM_PHONE"),
            api_id: Self::resolve_env_i32(None, "TELEGRAM_API_ID"),
            api_hash: Self::resolve_env_string(None, "TELEGRAM_API_HASH"),
            session_name: SESSION_NAME.to_string(),
            download: DownloadSettings::default(),
        }
    }

    /// Path of the session database.
    pub fn session_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.session", self.session_name))
    }

    /// Path of the lock file guarding the session.
    pub fn lock_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.lock", self.session_name))
    }
}

/// Extract `VAR` from a `${VAR}` placeholder.
fn placeholder(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn set_envs(vars: &[(&str, &str)]) -> Vec<EnvGuard> {
        vars.iter().map(|(k, v)| EnvGuard::set(k, v)).collect()
    }

    fn write_config(name: &str, yaml: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), yaml).unwrap();
        dir
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.session_name, SESSION_NAME);
        assert_eq!(config.download, DownloadSettings::default());
        assert_eq!(config.session_file(), PathBuf::from("telegram_session.session"));
        assert_eq!(config.lock_file(), PathBuf::from("telegram_session.lock"));
    }

    #[test]
    fn test_load_download_section() {
        let dir = write_config(
            "config.yml",
            r#"
telegram:
  api_id: 12345
  api_hash: "test_hash"
  session_name: "media"
download:
  workers: 8
  part_size_kb: 256
  timeout_secs: 15
  output_dir: "downloads"
"#,
        );

        let config = Config::load_from_file(dir.path().join("config.yml")).unwrap();

        assert_eq!(config.session_name, "media");
        assert_eq!(config.download.workers, 8);
        assert_eq!(config.download.part_size_kb, 256);
        assert_eq!(config.download.timeout, Duration::from_secs(15));
        assert_eq!(config.download.output_dir, PathBuf::from("downloads"));
        assert_eq!(config.download.part_size_bytes(), 256 * 1024);
    }

    #[test]
    fn zero_workers_become_one() {
        let dir = write_config("config.yml", "download:\n  workers: 0\n");
        let config = Config::load_from_file(dir.path().join("config.yml")).unwrap();
        assert_eq!(config.download.workers, 1);
    }

    #[test]
    fn zero_timeout_becomes_one_second() {
        let dir = write_config("config.yml", "download:\n  timeout_secs: 0\n");
        let config = Config::load_from_file(dir.path().join("config.yml")).unwrap();
        assert_eq!(config.download.timeout, Duration::from_secs(1));
    }

    #[test]
    fn part_size_is_normalized() {
        assert_eq!(normalize_part_size_kb(512), 512);
        assert_eq!(normalize_part_size_kb(1024), 512);
        assert_eq!(normalize_part_size_kb(0), 4);
        assert_eq!(normalize_part_size_kb(130), 128);
        assert_eq!(normalize_part_size_kb(7), 4);
    }

    #[test]
    fn env_placeholders_are_resolved_from_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = write_config(
            "config.yml",
            r#"
telegram:
  api_id: "${TELEGRAM_API_ID}"
  api_hash: "${TELEGRAM_API_HASH}"
  phone: "+should_be_overridden"
"#,
        );

        let _guards = set_envs(&[
            ("TELEGRAM_API_ID", "4242"),
            ("TELEGRAM_API_HASH", "hash_from_env"),
            ("TELEGRAM_PHONE", "+1999"),
        ]);

        let config = Config::load_from_file(dir.path().join("config.yml")).unwrap();

        assert_eq!(config.api_id, 4242);
        assert_eq!(config.api_hash, "hash_from_env");
        assert_eq!(config.phone, "+1999");
    }

    #[test]
    fn env_does_not_override_numeric_yaml_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = write_config(
            "config.yml",
            r#"
telegram:
  api_id: 321
  phone: "from_yaml"
"#,
        );

        let _guards = set_envs(&[("TELEGRAM_API_ID", "9999"), ("TELEGRAM_PHONE", "+8888")]);

        let config = Config::load_from_file(dir.path().join("config.yml")).unwrap();

        assert_eq!(config.api_id, 321);
        assert_eq!(config.phone, "+8888");
    }

    #[test]
    fn defaults_take_credentials_from_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = set_envs(&[("TELEGRAM_API_ID", "777"), ("TELEGRAM_API_HASH", "h")]);

        let config = Config::defaults();
        assert_eq!(config.api_id, 777);
        assert_eq!(config.api_hash, "h");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/path/config.yml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigError(ref m) if m.contains("Not found")));
    }

    #[test]
    fn load_from_file_fails_on_invalid_yaml() {
        let dir = write_config("config.yml", "{ invalid yaml [");
        let result = Config::load_from_file(dir.path().join("config.yml"));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn placeholder_extraction() {
        assert_eq!(placeholder("${VAR}"), Some("VAR"));
        assert_eq!(placeholder("VAR"), None);
        assert_eq!(placeholder("${VAR"), None);
    }
}
