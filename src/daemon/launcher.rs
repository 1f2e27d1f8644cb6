use anyhow::{Result, bail};
use log::{debug, warn};
use std::process::Command;

use crate::domain::notification::RemoteAction;
use crate::sync::sink::RemoteActionTarget;

/// Runs the configured program as `<program> <method> <args>...` for each
/// notification button the engine forwards.
pub struct CommandTarget {
    program: Option<String>,
}

impl CommandTarget {
    pub fn new(program: Option<String>) -> Self {
        Self { program }
    }

    /// Whether there is anything to run the buttons with.
    pub fn is_configured(&self) -> bool {
        self.program.is_some()
    }
}

fn command_for(program: &str, action: &RemoteAction) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg(&action.method)
        .args(action.arguments.iter().map(|a| a.to_string()));
    cmd
}

impl RemoteActionTarget for CommandTarget {
    fn invoke(&mut self, action: &RemoteAction) -> Result<()> {
        let Some(program) = &self.program else {
            bail!("no action_command configured");
        };
        let mut child = command_for(program, action).spawn()?;
        debug!("Started {program} {} (pid {})", action.method, child.id());

        // reap it so it does not linger as a zombie
        let method = action.method.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => warn!("{method} exited with {status}"),
            Ok(_) => {}
            Err(e) => warn!("Could not wait for {method}: {e}"),
        });
        Ok(())
    }
}
