//! Applications backed by a child process.
//!
//! The program is started on demand. While it runs, remote keys are written
//! to its stdin, one hex key code per line.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use cectray_api::Keypress;
use cectray_config::ApplicationConfig;
use cectray_core::{Application, CoreError};

struct Running {
    child: Child,
    stdin: Option<ChildStdin>,
}

pub struct ProcessApplication {
    config: ApplicationConfig,
    running: Mutex<Option<Running>>,
}

impl ProcessApplication {
    pub fn new(config: ApplicationConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    /// Reap the child if it exited; returns whether it is still running.
    fn is_running(running: &mut Option<Running>) -> bool {
        let Some(process) = running.as_mut() else {
            return false;
        };
        match process.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(%status, "application exited");
                *running = None;
                false
            }
            Err(e) => {
                warn!(error = %e, "could not poll application process");
                *running = None;
                false
            }
        }
    }
}

impl Application for ProcessApplication {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn handle_key(&self, key: Keypress, selected: bool) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !Self::is_running(&mut running) {
            return false;
        }
        let Some(stdin) = running.as_mut().and_then(|p| p.stdin.as_mut()) else {
            return false;
        };
        match writeln!(stdin, "{}", key.code) {
            Ok(()) => {
                debug!(app = %self.config.name, key = %key.code, selected, "key forwarded");
                true
            }
            Err(e) => {
                warn!(app = %self.config.name, error = %e, "application stopped reading keys");
                if let Some(process) = running.as_mut() {
                    process.stdin = None;
                }
                false
            }
        }
    }

    fn auto_start(&self) -> bool {
        self.config.auto_start
    }

    fn start(&self) -> Result<(), CoreError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if Self::is_running(&mut running) {
            return Ok(());
        }
        let Some((program, args)) = self.config.command.split_first() else {
            return Err(CoreError::Internal(format!(
                "application '{}' has no command",
                self.config.name
            )));
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::Internal(format!("could not start {program}: {e}")))?;
        info!(app = %self.config.name, pid = child.id(), "application started");
        let stdin = child.stdin.take();
        *running = Some(Running { child, stdin });
        Ok(())
    }
}
