// ── Domain model ──
//
// Small value types shared by the monitor and the controller.

use std::collections::VecDeque;

use cectray_api::Alert;
use serde::Serialize;

/// Host power transition. Edge-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PowerEvent {
    Suspend,
    Resume,
    AwayEnter,
    AwayExit,
}

/// Event emitted by the idle/power monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorEvent {
    /// Emitted every tick while an idle timeout is configured.
    Activity {
        idle_seconds: i64,
        timeout_seconds: i64,
    },
    /// `true` when the idle threshold is crossed, `false` on the first sign
    /// of activity afterwards.
    Idle(bool),
    Screensaver(bool),
    Power(PowerEvent),
}

/// Latest idle reading, published through a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleState {
    pub idle_seconds: i64,
    /// `<= 0` means idle detection is disabled.
    pub timeout_seconds: i64,
    pub idle: bool,
}

impl Default for IdleState {
    fn default() -> Self {
        Self {
            idle_seconds: 0,
            timeout_seconds: -1,
            idle: false,
        }
    }
}

impl IdleState {
    /// Progress towards the idle threshold, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        idle_progress(self.idle_seconds, self.timeout_seconds)
    }
}

/// Idle progress as a percentage of the timeout, clamped to 0..=100.
pub fn idle_progress(idle_seconds: i64, timeout_seconds: i64) -> u8 {
    if timeout_seconds <= 0 || idle_seconds <= 0 {
        0
    } else if idle_seconds >= timeout_seconds {
        100
    } else {
        // < 100 by the branch above
        u8::try_from(idle_seconds * 100 / timeout_seconds).unwrap_or(100)
    }
}

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Connected,
    Suspended,
    Closed,
}

// ── AlertQueue ───────────────────────────────────────────────────

/// Distinct alerts awaiting acknowledgment, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQueue {
    alerts: VecDeque<Alert>,
}

impl AlertQueue {
    /// Enqueue `alert` unless it is already pending. Returns whether it was added.
    pub fn push(&mut self, alert: Alert) -> bool {
        if self.alerts.contains(&alert) {
            return false;
        }
        self.alerts.push_back(alert);
        true
    }

    pub fn first(&self) -> Option<Alert> {
        self.alerts.front().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}
