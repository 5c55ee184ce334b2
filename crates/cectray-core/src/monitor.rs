// ── Idle and power monitor ──
//
// Polls the host for idle time and screensaver state on its own task and
// turns raw power broadcasts into `PowerEvent`s. Everything it observes is
// emitted as `MonitorEvent`s on one unbounded channel; the controller owns
// the receiving end.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{IdleState, MonitorEvent, PowerEvent};

// ── Host signals ─────────────────────────────────────────────────

/// Host facilities the monitor and controller depend on.
///
/// Reads return `None` when the host could not answer; the monitor treats
/// that as "no change" for the current tick.
pub trait HostSignals: Send + Sync {
    /// Seconds since the last user input.
    fn idle_seconds(&self) -> Option<i64>;

    fn screensaver_active(&self) -> Option<bool>;

    /// Both reads for one poll tick. Hosts that answer both from a single
    /// query override this.
    fn sample(&self) -> HostSample {
        HostSample {
            idle_seconds: self.idle_seconds(),
            screensaver_active: self.screensaver_active(),
        }
    }

    /// Ask the host to suspend itself.
    fn request_suspend(&self) -> Result<(), CoreError>;
}

/// One poll tick's view of the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSample {
    pub idle_seconds: Option<i64>,
    pub screensaver_active: Option<bool>,
}

/// Raw power-broadcast notification as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPowerSignal {
    Suspend,
    ResumeSuspend,
    ResumeCritical,
    ResumeAutomatic,
    /// Away-mode setting change with its raw data word.
    AwayMode(i32),
    /// Any other broadcast, identified by its code.
    Other(u32),
}

/// Map a raw broadcast onto a [`PowerEvent`]; unrelated signals yield `None`.
pub fn translate_power_signal(signal: RawPowerSignal) -> Option<PowerEvent> {
    match signal {
        RawPowerSignal::Suspend => Some(PowerEvent::Suspend),
        RawPowerSignal::ResumeSuspend
        | RawPowerSignal::ResumeCritical
        | RawPowerSignal::ResumeAutomatic => Some(PowerEvent::Resume),
        RawPowerSignal::AwayMode(1) => Some(PowerEvent::AwayEnter),
        RawPowerSignal::AwayMode(0) => Some(PowerEvent::AwayExit),
        RawPowerSignal::AwayMode(_) | RawPowerSignal::Other(_) => None,
    }
}

// ── Idle tracking ────────────────────────────────────────────────

/// Edge detector for the idle threshold.
#[derive(Debug, Clone, Default)]
pub struct IdleTracker {
    last_idle_seconds: i64,
    fired: bool,
}

impl IdleTracker {
    /// Feed one idle reading. Returns the events this tick produces.
    pub fn tick(&mut self, idle_seconds: i64, timeout_seconds: i64) -> Vec<MonitorEvent> {
        let last = std::mem::replace(&mut self.last_idle_seconds, idle_seconds);
        if timeout_seconds <= 0 {
            return Vec::new();
        }

        let mut events = vec![MonitorEvent::Activity {
            idle_seconds,
            timeout_seconds,
        }];
        if idle_seconds < last && self.fired {
            self.fired = false;
            events.push(MonitorEvent::Idle(false));
        } else if idle_seconds > last && idle_seconds >= timeout_seconds && !self.fired {
            self.fired = true;
            events.push(MonitorEvent::Idle(true));
        }
        events
    }

    pub fn is_idle(&self) -> bool {
        self.fired
    }
}

// ── Screensaver debounce ─────────────────────────────────────────

/// Reports screensaver flag changes, suppressing activations that follow
/// an accepted activation within `window`.
#[derive(Debug, Clone)]
pub struct ScreensaverDebouncer {
    window: Duration,
    active: bool,
    last_activation: Option<Instant>,
}

impl ScreensaverDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            active: false,
            last_activation: None,
        }
    }

    /// Feed the current flag. Returns the change to report, if any.
    pub fn update(&mut self, active: bool, now: Instant) -> Option<bool> {
        if active == self.active {
            return None;
        }
        self.active = active;
        if !active {
            return Some(false);
        }
        let within_window = self
            .last_activation
            .is_some_and(|last| now.saturating_duration_since(last) <= self.window);
        if within_window {
            debug!("screensaver activation suppressed");
            return None;
        }
        self.last_activation = Some(now);
        Some(true)
    }
}

// ── Monitor handle ───────────────────────────────────────────────

struct PollState {
    idle: IdleTracker,
    screensaver: ScreensaverDebouncer,
}

struct MonitorInner {
    config: MonitorConfig,
    host: Arc<dyn HostSignals>,
    suspended: AtomicBool,
    timeout_seconds: AtomicI64,
    poll: Mutex<PollState>,
    idle_state: watch::Sender<IdleState>,
    event_tx: mpsc::UnboundedSender<MonitorEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<MonitorEvent>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Process-scoped idle/power monitor.
///
/// Cheaply cloneable. Starts suspended: no host reads happen until
/// [`set_suspended(false)`](Self::set_suspended).
#[derive(Clone)]
pub struct IdleAndPowerMonitor {
    inner: Arc<MonitorInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IdleAndPowerMonitor {
    pub fn new(config: MonitorConfig, host: Arc<dyn HostSignals>) -> Self {
        let (idle_state, _) = watch::channel(IdleState::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let screensaver = ScreensaverDebouncer::new(config.screensaver_debounce);

        Self {
            inner: Arc::new(MonitorInner {
                config,
                host,
                suspended: AtomicBool::new(true),
                timeout_seconds: AtomicI64::new(-1),
                poll: Mutex::new(PollState {
                    idle: IdleTracker::default(),
                    screensaver,
                }),
                idle_state,
                event_tx,
                event_rx: Mutex::new(Some(event_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the poll loop on the current runtime. Calling it again while
    /// the loop runs, or after [`stop`](Self::stop), does nothing.
    pub fn start(&self) {
        let mut task = lock(&self.inner.task);
        if task.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let cancel = self.inner.cancel.child_token();
        *task = Some(tokio::spawn(poll_task(inner, cancel)));
        info!(
            interval_ms = self.inner.config.poll_interval.as_millis(),
            "idle monitor started"
        );
    }

    /// Stop the poll loop. The loop observes this at its next iteration.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        lock(&self.inner.task).take();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// While suspended the loop does not read host state.
    pub fn set_suspended(&self, suspended: bool) {
        let was = self.inner.suspended.swap(suspended, Ordering::AcqRel);
        if was != suspended {
            debug!(suspended, "idle monitor suspension changed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::Acquire)
    }

    /// Idle threshold in seconds; `<= 0` disables idle events.
    pub fn set_idle_timeout(&self, seconds: i64) {
        self.inner.timeout_seconds.store(seconds, Ordering::Release);
        self.inner.idle_state.send_modify(|state| {
            state.timeout_seconds = seconds;
        });
        debug!(seconds, "idle timeout updated");
    }

    pub fn idle_timeout(&self) -> i64 {
        self.inner.timeout_seconds.load(Ordering::Acquire)
    }

    pub fn idle_state(&self) -> watch::Receiver<IdleState> {
        self.inner.idle_state.subscribe()
    }

    /// Take the event receiver. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<MonitorEvent>> {
        lock(&self.inner.event_rx).take()
    }

    /// Translate and emit a host power broadcast. Works while suspended.
    pub fn handle_power_signal(&self, signal: RawPowerSignal) -> Option<PowerEvent> {
        let event = translate_power_signal(signal);
        match event {
            Some(event) => {
                info!(%event, "host power event");
                self.inner.emit(MonitorEvent::Power(event));
            }
            None => trace!(?signal, "ignoring power broadcast"),
        }
        event
    }

    /// Run one poll iteration immediately, regardless of the loop.
    pub fn poll_now(&self) {
        self.inner.poll_once();
    }
}

impl MonitorInner {
    fn emit(&self, event: MonitorEvent) {
        if self.event_tx.send(event).is_err() {
            debug!(?event, "monitor event dropped, no receiver");
        }
    }

    fn poll_once(&self) {
        let timeout = self.timeout_seconds.load(Ordering::Acquire);
        let HostSample {
            idle_seconds,
            screensaver_active: screensaver,
        } = self.host.sample();

        let mut events = Vec::new();
        {
            let mut poll = lock(&self.poll);
            if let Some(idle_seconds) = idle_seconds {
                events.extend(poll.idle.tick(idle_seconds, timeout));
                let idle = poll.idle.is_idle();
                self.idle_state.send_replace(IdleState {
                    idle_seconds,
                    timeout_seconds: timeout,
                    idle,
                });
            }
            if let Some(active) = screensaver {
                if let Some(change) = poll.screensaver.update(active, Instant::now()) {
                    events.push(MonitorEvent::Screensaver(change));
                }
            }
        }

        for event in events {
            self.emit(event);
        }
    }
}

async fn poll_task(inner: Arc<MonitorInner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(inner.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if inner.suspended.load(Ordering::Acquire) {
                    continue;
                }
                inner.poll_once();
            }
        }
    }
    debug!("idle monitor stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeHost {
        idle: AtomicI64,
        screensaver: AtomicBool,
        reads: AtomicUsize,
    }

    impl HostSignals for FakeHost {
        fn idle_seconds(&self) -> Option<i64> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Some(self.idle.load(Ordering::SeqCst))
        }

        fn screensaver_active(&self) -> Option<bool> {
            Some(self.screensaver.load(Ordering::SeqCst))
        }

        fn request_suspend(&self) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn idle_flags(events: &[MonitorEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Idle(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn idle_fires_once_per_crossing() {
        let mut tracker = IdleTracker::default();
        let mut fired = Vec::new();
        for (i, idle) in [0, 100, 299, 300, 301, 250].into_iter().enumerate() {
            for flag in idle_flags(&tracker.tick(idle, 300)) {
                fired.push((i, flag));
            }
        }
        assert_eq!(fired, vec![(3, true), (5, false)]);
    }

    #[test]
    fn idle_disabled_emits_nothing() {
        let mut tracker = IdleTracker::default();
        assert!(tracker.tick(500, -1).is_empty());
        assert!(tracker.tick(600, 0).is_empty());
        assert!(!tracker.is_idle());
    }

    #[test]
    fn activity_reported_every_tick_when_enabled() {
        let mut tracker = IdleTracker::default();
        let events = tracker.tick(10, 60);
        assert_eq!(
            events,
            vec![MonitorEvent::Activity {
                idle_seconds: 10,
                timeout_seconds: 60
            }]
        );
    }

    #[test]
    fn screensaver_activation_is_debounced() {
        let start = Instant::now();
        let mut saver = ScreensaverDebouncer::new(Duration::from_secs(60));

        assert_eq!(saver.update(true, start), Some(true));
        assert_eq!(saver.update(true, start), None);
        assert_eq!(saver.update(false, start + Duration::from_secs(5)), Some(false));
        assert_eq!(saver.update(true, start + Duration::from_secs(10)), None);
        assert_eq!(saver.update(false, start + Duration::from_secs(11)), Some(false));
        assert_eq!(saver.update(true, start + Duration::from_secs(61)), Some(true));
    }

    #[test]
    fn power_signals_translate() {
        assert_eq!(
            translate_power_signal(RawPowerSignal::Suspend),
            Some(PowerEvent::Suspend)
        );
        for resume in [
            RawPowerSignal::ResumeSuspend,
            RawPowerSignal::ResumeCritical,
            RawPowerSignal::ResumeAutomatic,
        ] {
            assert_eq!(translate_power_signal(resume), Some(PowerEvent::Resume));
        }
        assert_eq!(
            translate_power_signal(RawPowerSignal::AwayMode(1)),
            Some(PowerEvent::AwayEnter)
        );
        assert_eq!(
            translate_power_signal(RawPowerSignal::AwayMode(0)),
            Some(PowerEvent::AwayExit)
        );
        assert_eq!(translate_power_signal(RawPowerSignal::AwayMode(2)), None);
        assert_eq!(translate_power_signal(RawPowerSignal::Other(0x0A)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_does_not_poll_while_suspended() {
        let host = Arc::new(FakeHost::default());
        let monitor = IdleAndPowerMonitor::new(MonitorConfig::default(), host.clone());
        monitor.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(host.reads.load(Ordering::SeqCst), 0);

        monitor.set_suspended(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(host.reads.load(Ordering::SeqCst) >= 5);

        monitor.stop();
        let reads = host.reads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(host.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_emits_idle_and_screensaver_events() {
        let host = Arc::new(FakeHost::default());
        let monitor = IdleAndPowerMonitor::new(MonitorConfig::default(), host.clone());
        let mut events = monitor.take_events().unwrap();
        assert!(monitor.take_events().is_none());

        monitor.set_idle_timeout(60);
        monitor.set_suspended(false);
        monitor.start();

        host.idle.store(30, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        host.idle.store(61, Ordering::SeqCst);
        host.screensaver.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        monitor.stop();

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(idle_flags(&received), vec![true]);
        assert_eq!(
            received
                .iter()
                .filter(|e| matches!(e, MonitorEvent::Screensaver(true)))
                .count(),
            1
        );
        assert!(monitor.idle_state().borrow().idle);
    }

    #[tokio::test]
    async fn power_signals_flow_while_suspended() {
        let monitor = IdleAndPowerMonitor::new(
            MonitorConfig::default(),
            Arc::new(FakeHost::default()),
        );
        let mut events = monitor.take_events().unwrap();
        assert!(monitor.is_suspended());

        monitor.handle_power_signal(RawPowerSignal::ResumeAutomatic);
        monitor.handle_power_signal(RawPowerSignal::Other(7));

        assert_eq!(
            events.recv().await,
            Some(MonitorEvent::Power(PowerEvent::Resume))
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn failed_reads_change_nothing() {
        struct DeadHost;
        impl HostSignals for DeadHost {
            fn idle_seconds(&self) -> Option<i64> {
                None
            }
            fn screensaver_active(&self) -> Option<bool> {
                None
            }
            fn request_suspend(&self) -> Result<(), CoreError> {
                Err(CoreError::Internal("unsupported".into()))
            }
        }

        let monitor = IdleAndPowerMonitor::new(MonitorConfig::default(), Arc::new(DeadHost));
        let mut events = monitor.take_events().unwrap();
        monitor.set_idle_timeout(10);
        monitor.poll_now();
        assert!(events.try_recv().is_err());
        assert_eq!(monitor.idle_state().borrow().idle_seconds, 0);
    }

    #[test]
    fn one_host_sample_per_tick() {
        #[derive(Default)]
        struct SampledHost {
            samples: AtomicUsize,
        }
        impl HostSignals for SampledHost {
            fn idle_seconds(&self) -> Option<i64> {
                None
            }
            fn screensaver_active(&self) -> Option<bool> {
                None
            }
            fn sample(&self) -> HostSample {
                self.samples.fetch_add(1, Ordering::SeqCst);
                HostSample {
                    idle_seconds: Some(42),
                    screensaver_active: Some(false),
                }
            }
            fn request_suspend(&self) -> Result<(), CoreError> {
                Ok(())
            }
        }

        let host = Arc::new(SampledHost::default());
        let monitor = IdleAndPowerMonitor::new(MonitorConfig::default(), host.clone());
        monitor.set_idle_timeout(600);
        monitor.poll_now();
        monitor.poll_now();

        assert_eq!(host.samples.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.idle_state().borrow().idle_seconds, 42);
    }
}
