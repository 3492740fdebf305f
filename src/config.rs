use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::storage::DurabilityMode;

/// Command-line overrides; anything left out falls back to the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "memoblog", version, about = "Blog server with moderated posts")]
pub struct Cli {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Posts per page
    #[arg(long)]
    pub per_page: Option<u32>,

    /// Directory for the WAL and snapshot; in-memory only when absent
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub per_page: u32,
    pub data_dir: Option<PathBuf>,
    pub durability: DurabilityMode,
    pub checkpoint_every: usize,
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub bcrypt_cost: u32,
    pub admin: Option<AdminAccount>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, which keeps tests off the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("APP_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let per_page = lookup("PER_PAGE")
            .unwrap_or_else(|| "6".to_string())
            .parse::<u32>()
            .context("PER_PAGE must be a valid u32")?;

        let data_dir = lookup("DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let durability = lookup("DURABILITY")
            .unwrap_or_else(|| "async".to_string())
            .parse::<DurabilityMode>()
            .map_err(anyhow::Error::msg)
            .context("DURABILITY must be one of: sync, async, none")?;

        let checkpoint_every = lookup("CHECKPOINT_EVERY")
            .unwrap_or_else(|| "500".to_string())
            .parse::<usize>()
            .context("CHECKPOINT_EVERY must be a valid usize")?;

        let session_ttl_secs = lookup("SESSION_TTL_SECS")
            .unwrap_or_else(|| "1209600".to_string())
            .parse::<u64>()
            .context("SESSION_TTL_SECS must be a valid u64")?;

        let max_sessions = lookup("MAX_SESSIONS")
            .unwrap_or_else(|| "10000".to_string())
            .parse::<usize>()
            .context("MAX_SESSIONS must be a valid usize")?;

        let bcrypt_cost = lookup("BCRYPT_COST")
            .unwrap_or_else(|| "12".to_string())
            .parse::<u32>()
            .context("BCRYPT_COST must be a valid u32")?;

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminAccount { username, password }),
            _ => None,
        };

        let config = Self {
            host,
            port,
            per_page,
            data_dir,
            durability,
            checkpoint_every,
            session_ttl: Duration::from_secs(session_ttl_secs),
            max_sessions,
            bcrypt_cost,
            admin,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(mut self, cli: Cli) -> Result<Self> {
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(per_page) = cli.per_page {
            self.per_page = per_page;
        }
        if let Some(data_dir) = cli.data_dir {
            self.data_dir = Some(data_dir);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.per_page == 0 {
            bail!("PER_PAGE must be at least 1");
        }
        if self.max_sessions == 0 {
            bail!("MAX_SESSIONS must be at least 1");
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}");
        }
        Ok(())
    }
}
