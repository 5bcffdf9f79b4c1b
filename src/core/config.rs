use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 16;
pub const DEFAULT_CATALOG_PATH: &str = "assets/Public IP VAPT Catalog.xlsx";
pub const DEFAULT_TEMPLATE_DIR: &str = "assets/templates";
pub const DEFAULT_SESSION_TTL_MINUTES: u64 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub vapt_catalog_path: PathBuf,
    pub template_dir: PathBuf,
    pub session_secret: String,
    pub catalog_write_back: bool,
    /// Idle time after which a merge session is discarded.
    pub session_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a closure over a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("BIND_ADDR: {}", e))?;

        let max_upload_mb = match lookup("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("MAX_UPLOAD_MB: {}", e))?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        if max_upload_mb == 0 {
            return Err("MAX_UPLOAD_MB: must be greater than zero".to_string());
        }

        let session_secret = lookup("SESSION_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "SESSION_SECRET: environment variable not found".to_string())?;

        let catalog_write_back = match lookup("CATALOG_WRITE_BACK") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                format!("CATALOG_WRITE_BACK: expected true/false, got '{}'", raw)
            })?,
            None => false,
        };

        let session_ttl_minutes = match lookup("SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("SESSION_TTL_MINUTES: {}", e))?,
            None => DEFAULT_SESSION_TTL_MINUTES,
        };
        if session_ttl_minutes == 0 {
            return Err("SESSION_TTL_MINUTES: must be greater than zero".to_string());
        }

        Ok(Self {
            bind_addr,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            vapt_catalog_path: lookup("VAPT_CATALOG_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH), PathBuf::from),
            template_dir: lookup("TEMPLATE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_DIR), PathBuf::from),
            session_secret,
            catalog_write_back,
            session_ttl: Duration::from_secs(session_ttl_minutes * 60),
        })
    }

    /// Configuration rooted in `dir`, used by the integration tests.
    pub fn for_tests(dir: &Path) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            vapt_catalog_path: dir.join("Public IP VAPT Catalog.xlsx"),
            template_dir: dir.join("templates"),
            session_secret: "test-session-secret".to_string(),
            catalog_write_back: false,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_MINUTES * 60),
        }
    }

    pub fn template_path(&self, file_name: &str) -> PathBuf {
        self.template_dir.join(file_name)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
