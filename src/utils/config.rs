use crate::backup::error::{BackupError, Result};
use crate::backup::exclusion::ExclusionPolicy;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// First port probed on 127.0.0.1
    pub port: u16,

    /// How many consecutive ports to try
    pub port_attempts: u16,

    /// Directory that gets archived
    pub source_dir: PathBuf,

    /// Extra exclusion tokens on top of the defaults
    pub exclusions: Vec<String>,

    /// Open the UI in a browser once the server is up
    pub open_browser: bool,

    pub browser_delay: Duration,

    /// Grace period between an accepted shutdown request and the server stopping
    pub shutdown_delay: Duration,

    /// Static UI files
    pub static_dir: PathBuf,

    pub log_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            port_attempts: 10,
            source_dir: executable_dir()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
            exclusions: Vec::new(),
            open_browser: true,
            browser_delay: Duration::from_millis(1500),
            shutdown_delay: Duration::from_millis(500),
            static_dir: PathBuf::from("static"),
            log_buffer_size: 1000,
        }
    }
}

impl Config {
    /// Load config from the environment, after reading `.env` if present
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from defaults overridden by `lookup(AUTOZIP_*)`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(port) = lookup("AUTOZIP_PORT") {
            config.port = parse("AUTOZIP_PORT", &port)?;
        }

        if let Some(attempts) = lookup("AUTOZIP_PORT_ATTEMPTS") {
            config.port_attempts = parse("AUTOZIP_PORT_ATTEMPTS", &attempts)?;
        }

        if let Some(source) = lookup("AUTOZIP_SOURCE_DIR") {
            config.source_dir = PathBuf::from(source);
        }

        if let Some(excludes) = lookup("AUTOZIP_EXCLUDE") {
            config.exclusions = split_tokens(&excludes);
        }

        if let Some(open) = lookup("AUTOZIP_OPEN_BROWSER") {
            config.open_browser = parse_bool("AUTOZIP_OPEN_BROWSER", &open)?;
        }

        if let Some(delay) = lookup("AUTOZIP_BROWSER_DELAY") {
            config.browser_delay = parse_duration("AUTOZIP_BROWSER_DELAY", &delay)?;
        }

        if let Some(delay) = lookup("AUTOZIP_SHUTDOWN_DELAY") {
            config.shutdown_delay = parse_duration("AUTOZIP_SHUTDOWN_DELAY", &delay)?;
        }

        if let Some(dir) = lookup("AUTOZIP_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        if let Some(size) = lookup("AUTOZIP_LOG_BUFFER") {
            config.log_buffer_size = parse("AUTOZIP_LOG_BUFFER", &size)?;
        }

        // Surface bad tokens at startup rather than on the first backup
        config.exclusion_policy()?;
        Ok(config)
    }

    /// Default tokens + configured extras. The running executable is excluded
    /// when it sits directly in the source directory.
    pub fn exclusion_policy(&self) -> Result<ExclusionPolicy> {
        let self_name = self_file_name_in(&self.source_dir);
        ExclusionPolicy::with_defaults(self_name.as_deref()).extended(self.exclusions.iter().cloned())
    }
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn self_file_name_in(source_dir: &Path) -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let exe_dir = exe.parent()?.canonicalize().ok()?;
    if source_dir.canonicalize().ok()? != exe_dir {
        return None;
    }
    exe.file_name().map(|n| n.to_string_lossy().to_string())
}

fn split_tokens(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|t| t.trim().to_string()).collect()
}

fn invalid(key: &str, value: &str) -> BackupError {
    BackupError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|_| invalid(key, value))
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
