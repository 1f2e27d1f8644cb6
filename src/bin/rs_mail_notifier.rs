use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rs_mail_notifier::config::{load_config, resolve_db_path};
use rs_mail_notifier::daemon::notifications_file::default_state_path;
use rs_mail_notifier::daemon::{DaemonConfig, run_daemon};
use rs_mail_notifier::domain::event::Event;
use rs_mail_notifier::ipc::{self, Request};
use rs_mail_notifier::store::sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "rs_mail_notifier")]
#[command(about = "Mail notification daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: watch store/action events and publish notifications
    Daemon {
        /// Override the socket path from the config
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Deliver one event (JSON) to a running daemon
    Send {
        /// e.g. '{"event":"messages_added","ids":[42]}'
        event: String,
    },

    /// Check that the daemon is up
    Ping,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Daemon { socket } => {
            let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
            let db_path = resolve_db_path(&cfg)?;
            let store = SqliteStore::open(&db_path)?;

            let socket_path = match socket.or_else(|| cfg.socket_path.clone().map(PathBuf::from)) {
                Some(p) => p,
                None => ipc::socket_path()?,
            };

            run_daemon(
                store,
                DaemonConfig {
                    settings: cfg.settings(),
                    socket_path,
                    state_path: default_state_path()?,
                },
            )
        }

        Command::Send { event } => {
            let event: Event =
                serde_json::from_str(&event).map_err(|e| anyhow!("Invalid event: {e}"))?;
            let resp = ipc::send(&Request::Dispatch { event })?;
            if !resp.ok {
                return Err(anyhow!(
                    "Daemon refused event: {}",
                    resp.message.unwrap_or_default()
                ));
            }
            Ok(())
        }

        Command::Ping => {
            let resp = ipc::send(&Request::Ping)?;
            println!("{}", resp.message.unwrap_or_else(|| "ok".into()));
            Ok(())
        }
    }
}
