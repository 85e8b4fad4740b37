mod cli;
mod config;
mod output;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{Level, debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use wechat_platform::api::{LoginMeta, scan_token};
use wechat_platform::{
    Config, CookieClient, Envelope, HttpTransport, PlatformClient, TokenPair, TokenSession,
    WebhookMessage,
};

use crate::cli::{Args, Commands, Console};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let format = args.output;

    if let Err(e) = run(args).await {
        output::print_error(&e, format);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let (config, path) = config::load(args.config.as_deref())?;
    debug!(path = %path.display(), "Configuration loaded");
    let format = args.output;

    let client = build_client(&config, args.access_token, args.refresh_token)?;

    match args.command {
        Commands::Qrcode {
            device_id,
            device_name,
        } => {
            let meta = LoginMeta {
                device_id,
                device_name,
                proxy: None,
            };
            output::print(&client.qrcode(&meta).await?, format)?;
        }
        Commands::CheckLogin { uuid } => {
            output::print(&client.check_login(&uuid).await?, format)?;
        }
        Commands::Logout { wxid } => {
            output::print(&client.logout(&wxid).await?, format)?;
        }
        Commands::Safe { wxid } => {
            output::print(&client.is_safe(&wxid).await?, format)?;
        }
        Commands::Accounts { page, size } => {
            output::print(&client.wechat().entries(page, size).await?, format)?;
        }
        Commands::FinderHot { wxid } => {
            output::print(&client.finder().hot(&wxid).await?, format)?;
        }
        Commands::AssistantMembers { wxid } => {
            let token = scan_token();
            output::print(&client.assistant().members(&wxid, &token).await?, format)?;
        }
        Commands::PromotionMembers { wxid } => {
            let token = scan_token();
            output::print(&client.promotion().members(&wxid, &token).await?, format)?;
        }
        Commands::CompassMembers { wxid } => {
            output::print(&client.compass().members(&wxid).await?, format)?;
        }
        Commands::Console {
            console,
            wxid,
            path,
            finder,
        } => {
            let http = config.client.http_client()?;
            let cookie_client = match console {
                Console::Assistant => {
                    let finder = finder.context("--finder is required for the assistant console")?;
                    CookieClient::assistant(&client, wxid, finder, http, &config.assistant)?
                }
                Console::Promotion => {
                    CookieClient::promotion(&client, wxid, http, &config.promotion)?
                }
            };
            let value: Value = cookie_client.get(&path).await?;
            info!(
                acquisitions = cookie_client.gate().acquisitions(),
                "Console request finished"
            );
            output::print(&value, format)?;
        }
        Commands::Webhook => {
            let mut body = String::new();
            tokio::io::stdin()
                .read_to_string(&mut body)
                .await
                .context("Failed to read webhook body from stdin")?;
            let message: WebhookMessage =
                serde_json::from_str(&body).context("Invalid webhook message")?;

            let mut events = client.subscribe_webhooks();
            let delivered = client.receive(message);
            debug!(delivered, "Webhook dispatched");
            while let Ok(event) = events.try_recv() {
                println!("{} {event:?}", event.wxid());
            }
        }
        Commands::Config => {
            let mut shown = config.clone();
            shown.client.app_secret = "<redacted>".to_string();
            output::print(&shown, format)?;
        }
    }

    Ok(())
}

fn build_client(
    config: &Config,
    access_token: Option<String>,
    refresh_token: Option<String>,
) -> Result<PlatformClient> {
    let client = match (access_token, refresh_token) {
        (Some(access_token), Some(refresh_token)) => {
            let session = TokenSession::new(
                config.client.app_id.as_str(),
                config.client.app_secret.as_str(),
            )
            .with_tokens(TokenPair {
                access_token,
                refresh_token,
            });
            let transport = HttpTransport::new(
                config.client.http_client()?,
                config.client.host_url()?,
                Envelope::Gateway,
            );
            PlatformClient::with_session(&config.client, session, Arc::new(transport))
        }
        _ => PlatformClient::new(&config.client)?,
    };
    Ok(client)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
