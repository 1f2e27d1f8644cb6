pub mod launcher;
pub mod notifications_file;
pub mod notifier;
pub mod progress;

use anyhow::Result;
use log::{info, warn};
use std::{
    path::PathBuf,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

use crate::config::Settings;
use crate::daemon::launcher::CommandTarget;
use crate::daemon::notifier::DesktopSink;
use crate::daemon::progress::DesktopProgress;
use crate::domain::event::Event;
use crate::store::repo::MailStore;
use crate::sync::engine::Engine;

/// Longest we block without looking at the shutdown flag.
const IDLE_WAIT: Duration = Duration::from_millis(500);

pub struct DaemonConfig {
    pub settings: Settings,
    pub socket_path: PathBuf,
    pub state_path: PathBuf,
}

/// Run the engine on this thread until Ctrl-C. Events arrive from the IPC
/// listener and the notification waiters over one channel.
pub fn run_daemon<S: MailStore>(store: S, cfg: DaemonConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let (tx, rx) = mpsc::channel::<Event>();
    crate::ipc::serve(&cfg.socket_path, tx.clone())?;

    let target = CommandTarget::new(cfg.settings.action_command.clone());
    if !target.is_configured() {
        warn!("No action_command configured, notifications only offer mark as read");
    }
    let sink = DesktopSink::open(cfg.state_path.clone(), tx, target.is_configured());
    let mut engine = Engine::new(
        store,
        sink,
        DesktopProgress::new(),
        target,
        &cfg.settings,
    );
    engine.reload();
    info!("Notifier running, socket {}", cfg.socket_path.display());

    while running.load(Ordering::SeqCst) {
        let wait = engine
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .map_or(IDLE_WAIT, |d| d.min(IDLE_WAIT));

        match rx.recv_timeout(wait) {
            Ok(event) => engine.dispatch(event, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        engine.tick(Instant::now());
    }

    let _ = std::fs::remove_file(&cfg.socket_path);
    info!("Notifier stopped");
    Ok(())
}
