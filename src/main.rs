mod commands;

mod cli {

    use anyhow::Result;
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    use super::commands;

    #[derive(Parser, Debug)]
    #[clap(author, version, about, long_about = None)]
    pub struct CreviceRelay {
        #[clap(subcommand)]
        cmd: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// Start the websocket relay server.
        Start {
            /// Override the room TTL in seconds.
            #[clap(long)]
            room_ttl: Option<u64>,

            /// Override the membership refresh interval in seconds.
            #[clap(long)]
            refresh_interval: Option<u64>,

            /// Bind to host:port.
            #[clap(short, long, default_value = "0.0.0.0:5000")]
            bind: String,

            /// Config file to load.
            #[clap(short, long)]
            config: Option<PathBuf>,
        },
    }

    pub(super) async fn run() -> Result<()> {
        let args = CreviceRelay::parse();
        match args.cmd {
            Command::Start {
                room_ttl,
                refresh_interval,
                bind,
                config,
            } => {
                commands::server::run(
                    room_ttl,
                    refresh_interval,
                    bind,
                    config,
                )
                .await?
            }
        }
        Ok(())
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "crevice_relay=info,crevice_relay_server=info"
                    .into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(e) = cli::run().await {
        tracing::error!("{}", e);
    }

    Ok(())
}
