use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to <config dir>/wechat-platform/config.toml)
    #[arg(short, long, global = true, env = "WXP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed the session with a previously issued access token
    #[arg(long, global = true, env = "WXP_ACCESS_TOKEN", requires = "refresh_token")]
    pub access_token: Option<String>,

    /// Refresh token paired with --access-token
    #[arg(long, global = true, env = "WXP_REFRESH_TOKEN", requires = "access_token")]
    pub refresh_token: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Request a login QR code
    Qrcode {
        /// Device identifier reported to the platform
        #[arg(long)]
        device_id: String,

        /// Device name reported to the platform
        #[arg(long, default_value = "wxp")]
        device_name: String,
    },

    /// Poll the login progress of a QR code
    CheckLogin {
        /// QR code uuid returned by `qrcode`
        uuid: String,
    },

    /// Log an account out
    Logout { wxid: String },

    /// Show the account safety report
    Safe { wxid: String },

    /// List accounts bound to the application
    Accounts {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },

    /// Show trending channels searches
    FinderHot { wxid: String },

    /// List channels accounts reachable through the assistant
    AssistantMembers { wxid: String },

    /// List promotion console accounts
    PromotionMembers { wxid: String },

    /// List compass (e-commerce) accounts
    CompassMembers { wxid: String },

    /// Send a GET through a cookie-authenticated console session
    Console {
        /// Console to use
        #[arg(value_enum)]
        console: Console,

        wxid: String,

        /// Path relative to the console origin
        path: String,

        /// Finder username (assistant console only)
        #[arg(long, required_if_eq("console", "assistant"))]
        finder: Option<String>,
    },

    /// Decode a webhook message read from stdin and print its events
    Webhook,

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Console {
    Assistant,
    Promotion,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}
