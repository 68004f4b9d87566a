use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 3000;

/// Two weeks, matching the usual browser-session lifetime.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://127.0.0.1:5173"];

#[derive(Debug, Clone, Parser)]
#[command(name = "todo-server")]
#[command(version)]
#[command(about = "To-do list API with session authentication")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "TODO_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, env = "TODO_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file, or `:memory:` for a throwaway store
    #[arg(long, env = "TODO_DATABASE", default_value = "todo.db")]
    pub database: PathBuf,

    /// Session lifetime in seconds
    #[arg(long, env = "TODO_SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: u64,

    /// Extra origin allowed to make credentialed cross-origin requests
    #[arg(long = "allowed-origin", env = "TODO_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Serve the task endpoints without requiring a session
    #[arg(long)]
    pub public_tasks: bool,

    /// Mark the session cookie `Secure` (HTTPS deployments)
    #[arg(long)]
    pub secure_cookie: bool,
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Default development origins followed by any configured extras.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect();
        for origin in &self.allowed_origins {
            let origin = origin.trim().trim_end_matches('/');
            if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy {
            protect_tasks: !self.public_tasks,
            secure_cookie: self.secure_cookie,
            session_ttl: self.session_ttl(),
        }
    }
}

/// Same as the CLI defaults except for an in-memory database.
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database: PathBuf::from(":memory:"),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            allowed_origins: Vec::new(),
            public_tasks: false,
            secure_cookie: false,
        }
    }
}

/// Request-time switches derived from [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub protect_tasks: bool,
    pub secure_cookie: bool,
    pub session_ttl: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        ServerConfig::default().auth_policy()
    }
}
