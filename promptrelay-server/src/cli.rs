use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "promptrelay",
    about = "Promptrelay - Policy-gated forwarding gateway",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PROMPTRELAY_PORT", default_value = "8065")]
    pub port: u16,

    /// Policy file path (defaults to the platform config directory)
    #[arg(short, long, env = "PROMPTRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bearer token required by the /admin endpoints
    #[arg(long, env = "PROMPTRELAY_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Upstream exchange timeout in seconds (headers through last body byte)
    #[arg(long, env = "PROMPTRELAY_UPSTREAM_TIMEOUT_SECS", default_value = "300")]
    pub upstream_timeout_secs: u64,

    /// Disable the policy file watcher (reload only via the admin API)
    #[arg(long, env = "PROMPTRELAY_NO_WATCH")]
    pub no_watch: bool,

    /// Log filter, tracing EnvFilter syntax
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// The policy file path, explicit or platform default.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptrelay")
        .join("config.json")
}
