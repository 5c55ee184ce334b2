//! Host signals for a Linux desktop.
//!
//! Idle time and screensaver state come from the X11 MIT-SCREEN-SAVER
//! extension. Suspend goes through `systemctl suspend`.

use std::process::Command;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::ConnectionExt as _;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use cectray_core::{CoreError, HostSample, HostSignals};

/// `state` value of a screensaver query while the saver is on.
const SCREENSAVER_ON: u8 = 1;

fn sample_from_reply(ms_since_user_input: u32, state: u8) -> HostSample {
    HostSample {
        idle_seconds: Some(i64::from(ms_since_user_input / 1000)),
        screensaver_active: Some(state == SCREENSAVER_ON),
    }
}

fn request_system_suspend() -> Result<(), CoreError> {
    let status = Command::new("systemctl")
        .arg("suspend")
        .status()
        .map_err(|e| CoreError::Internal(format!("could not run systemctl: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(CoreError::Internal(format!("systemctl suspend exited with {status}")))
    }
}

// ── X11 ──────────────────────────────────────────────────────────────

pub struct X11HostSignals {
    conn: RustConnection,
    root: Window,
}

impl X11HostSignals {
    /// Connect to the display named by `$DISPLAY`.
    pub fn connect() -> Result<Self, String> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| format!("cannot open X display: {e}"))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| format!("X screen {screen_num} does not exist"))?;
        debug!(screen = screen_num, "connected to X11");
        Ok(Self { conn, root })
    }

    fn query(&self) -> Option<x11rb::protocol::screensaver::QueryInfoReply> {
        match self
            .conn
            .screensaver_query_info(self.root)
            .map_err(|e| e.to_string())
            .and_then(|cookie| cookie.reply().map_err(|e| e.to_string()))
        {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(error = %e, "screensaver query failed");
                None
            }
        }
    }
}

impl HostSignals for X11HostSignals {
    fn idle_seconds(&self) -> Option<i64> {
        self.sample().idle_seconds
    }

    fn screensaver_active(&self) -> Option<bool> {
        self.sample().screensaver_active
    }

    /// One `QueryInfo` round trip answers both reads.
    fn sample(&self) -> HostSample {
        self.query()
            .map(|reply| sample_from_reply(reply.ms_since_user_input, reply.state))
            .unwrap_or_default()
    }

    fn request_suspend(&self) -> Result<(), CoreError> {
        request_system_suspend()
    }
}

// ── Headless ─────────────────────────────────────────────────────────

/// No display: idle and screensaver never change.
pub struct HeadlessHost;

impl HostSignals for HeadlessHost {
    fn idle_seconds(&self) -> Option<i64> {
        None
    }

    fn screensaver_active(&self) -> Option<bool> {
        None
    }

    fn request_suspend(&self) -> Result<(), CoreError> {
        request_system_suspend()
    }
}
