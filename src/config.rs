use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub main_key: Option<String>,
    pub access_key: Option<String>,
    pub touch_interval: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Per-tenant key/value object router")]
pub struct Args {
    /// Host to bind to (overrides DURABLE_OBJECTS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DURABLE_OBJECTS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DURABLE_OBJECTS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Secret required to create objects (overrides DURABLE_OBJECTS_MAIN_KEY)
    #[arg(long)]
    pub main_key: Option<String>,

    /// Secret required to access objects (overrides DURABLE_OBJECTS_ACCESS_KEY)
    #[arg(long)]
    pub access_key: Option<String>,

    /// Seconds between heartbeat write-backs (overrides DURABLE_OBJECTS_TOUCH_INTERVAL_SECS)
    #[arg(long)]
    pub touch_interval_secs: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `var`.
    pub fn merge(
        args: Args,
        var: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<Self> {
        let env_host = var("DURABLE_OBJECTS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&var, "DURABLE_OBJECTS_PORT")?.unwrap_or(8787);
        let env_db = var("DURABLE_OBJECTS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/durable_objects.db".into());
        let env_touch = parse_var(&var, "DURABLE_OBJECTS_TOUCH_INTERVAL_SECS")?.unwrap_or(86_400);

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            main_key: non_empty(args.main_key.or_else(|| var("DURABLE_OBJECTS_MAIN_KEY").ok())),
            access_key: non_empty(
                args.access_key
                    .or_else(|| var("DURABLE_OBJECTS_ACCESS_KEY").ok()),
            ),
            touch_interval: Duration::seconds(i64::from(
                args.touch_interval_secs.unwrap_or(env_touch),
            )),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("main_key", &self.main_key.as_ref().map(|_| "<set>"))
            .field("access_key", &self.access_key.as_ref().map(|_| "<set>"))
            .field("touch_interval", &self.touch_interval)
            .finish()
    }
}

fn parse_var<T>(var: impl Fn(&str) -> Result<String, env::VarError>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
