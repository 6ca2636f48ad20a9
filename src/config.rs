use std::env;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "league_console";
const DEFAULT_API_URL: &str = "http://localhost:3100/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_PARALLELISM: usize = 4;

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub session_path: Option<PathBuf>,
    pub session_secret: Option<String>,
    pub fetch_parallelism: usize,
    pub demo: bool,
    pub log_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_path: None,
            session_secret: None,
            fetch_parallelism: DEFAULT_FETCH_PARALLELISM,
            demo: false,
            log_path: None,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("LEAGUE_API_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_secs = env::var("LEAGUE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(2, 120);
        let session_path = env_path("LEAGUE_SESSION_PATH")
            .or_else(|| app_cache_dir().map(|dir| dir.join("session.json")));
        let session_secret = env::var("LEAGUE_SESSION_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let fetch_parallelism = env::var("LEAGUE_FETCH_PARALLELISM")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_FETCH_PARALLELISM)
            .clamp(1, 16);
        let log_path = env_path("LEAGUE_LOG_PATH")
            .or_else(|| app_cache_dir().map(|dir| dir.join("console.log")));

        Self {
            api_url,
            timeout: Duration::from_secs(timeout_secs),
            session_path,
            session_secret,
            fetch_parallelism,
            demo: env_bool("LEAGUE_DEMO", false),
            log_path,
        }
    }
}

/// `$XDG_CACHE_HOME/league_console`, else `~/.cache/league_console`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

/// Loads `.env.local` then `.env`; variables already set win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

pub fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
