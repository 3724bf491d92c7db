use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Huddle coordination server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "huddle-server", version, about = "Huddle real-time coordination server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "HUDDLE_PORT", default_value = "4100")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "HUDDLE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./huddle.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "HUDDLE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, keys)
    #[arg(long, env = "HUDDLE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Meeting admission configuration (loaded from [meeting] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub meeting: Option<MeetingConfig>,
}

/// Configuration for meeting-room entry tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingConfig {
    /// Entry token TTL in seconds (default: 300). The token only needs to
    /// survive the hop from admission to the room service handshake.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 300,
        }
    }
}

fn default_token_ttl() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4100,
            bind_address: "0.0.0.0".to_string(),
            config: "./huddle.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            meeting: Some(MeetingConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (HUDDLE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("HUDDLE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Huddle Coordination Server Configuration
# Place this file at ./huddle.toml or specify with --config <path>
# All settings can be overridden via environment variables (HUDDLE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4100)
# port = 4100

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and signing keys
# data_dir = "./data"

# ---- Meeting Admission ----
# [meeting]

# Room-entry token TTL in seconds (default: 300)
# The external room service verifies these tokens independently.
# token_ttl_secs = 300
"#
    .to_string()
}
