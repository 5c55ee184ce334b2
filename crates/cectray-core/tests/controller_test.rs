// Integration tests for `Controller` driven by the simulated adapter.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use cectray_api::{
    AdapterCall, AdapterEvent, AddressingMode, Alert, BusCommand, DeviceConfig, KeyCode,
    Keypress, LogicalAddress, Opcode, PhysicalAddress, PowerStatus, SimulatedAdapter,
    SimulatedDevice, VendorId,
};
use cectray_core::{
    Application, ConnectionState, Controller, ControllerConfig, CoreError, HostSignals,
    IdleAndPowerMonitor, MemoryStore, MonitorConfig, MonitorEvent, PowerEvent, SettingKey,
    SettingValue, SettingsStore, UiCommand,
};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeHost {
    idle: AtomicI64,
    screensaver: AtomicBool,
    suspend_requests: AtomicUsize,
}

impl HostSignals for FakeHost {
    fn idle_seconds(&self) -> Option<i64> {
        Some(self.idle.load(Ordering::SeqCst))
    }

    fn screensaver_active(&self) -> Option<bool> {
        Some(self.screensaver.load(Ordering::SeqCst))
    }

    fn request_suspend(&self) -> Result<(), CoreError> {
        self.suspend_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RecordingApp {
    name: &'static str,
    accepts: bool,
    auto_start: bool,
    keys: Mutex<Vec<(KeyCode, bool)>>,
    starts: AtomicUsize,
}

impl RecordingApp {
    fn new(name: &'static str, accepts: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            accepts,
            auto_start: false,
            keys: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
        })
    }

    fn keys(&self) -> Vec<(KeyCode, bool)> {
        self.keys.lock().unwrap().clone()
    }
}

impl Application for RecordingApp {
    fn name(&self) -> &str {
        self.name
    }

    fn handle_key(&self, key: Keypress, selected: bool) -> bool {
        self.keys.lock().unwrap().push((key.code, selected));
        self.accepts
    }

    fn auto_start(&self) -> bool {
        self.auto_start
    }

    fn start(&self) -> Result<(), CoreError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    adapter: Arc<SimulatedAdapter>,
    host: Arc<FakeHost>,
    store: Arc<MemoryStore>,
    controller: Controller,
}

fn harness_with(adapter: SimulatedAdapter, store: MemoryStore) -> Harness {
    let adapter = Arc::new(adapter);
    let host = Arc::new(FakeHost::default());
    let store = Arc::new(store);
    let monitor = IdleAndPowerMonitor::new(
        MonitorConfig {
            poll_interval: Duration::from_millis(10),
            screensaver_debounce: Duration::from_secs(60),
        },
        host.clone(),
    );
    let controller = Controller::new(
        ControllerConfig::default(),
        adapter.clone(),
        monitor,
        host.clone(),
        store.clone(),
    );
    Harness {
        adapter,
        host,
        store,
        controller,
    }
}

fn harness() -> Harness {
    harness_with(
        SimulatedAdapter::new()
            .with_device(SimulatedDevice::tv(VendorId::SAMSUNG))
            .announcing_configuration(),
        MemoryStore::default(),
    )
}

/// Initialise and wait until the adapter's configuration announcement
/// has been applied.
async fn connected(h: &Harness) {
    h.controller.initialise().await.unwrap();
    let controller = h.controller.clone();
    wait_until(|| controller.device_config().adapter.is_some()).await;
    settle().await;
}

fn pushed_configurations(adapter: &SimulatedAdapter) -> Vec<DeviceConfig> {
    adapter
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            AdapterCall::SetConfiguration(config) => Some(config),
            _ => None,
        })
        .collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Let the orchestration task drain what is queued.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn initialise_twice_connects_once() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.controller.initialise().await.unwrap();

    assert!(h.controller.is_initialised().await);
    assert_eq!(h.controller.connection_state(), ConnectionState::Connected);
    assert_eq!(
        h.adapter.call_count(|c| matches!(c, AdapterCall::Connect(_))),
        1
    );
    assert!(!h.controller.monitor().is_suspended());
    h.controller.shutdown().await;
}

#[tokio::test]
async fn failed_connect_leaves_controller_closed() {
    let h = harness();
    h.adapter.set_fail_connect(true);

    let err = h.controller.initialise().await.unwrap_err();
    assert!(matches!(err, CoreError::DeviceCommand { .. }));
    assert_eq!(h.controller.connection_state(), ConnectionState::Closed);

    h.adapter.set_fail_connect(false);
    h.controller.open().await.unwrap();
    assert_eq!(h.controller.connection_state(), ConnectionState::Connected);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn close_without_open_is_a_no_op() {
    let h = harness();
    h.controller.close().await;
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn concurrent_close_tears_down_once() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.adapter.clear_calls();

    let a = h.controller.clone();
    let b = h.controller.clone();
    tokio::join!(a.close(), b.close());

    assert_eq!(h.adapter.call_count(|c| matches!(c, AdapterCall::Close)), 1);
    assert_eq!(
        h.adapter.call_count(|c| matches!(
            c,
            AdapterCall::StandbyDevices(LogicalAddress::Broadcast)
        )),
        1
    );
    assert_eq!(h.controller.connection_state(), ConnectionState::Closed);
    assert!(h.controller.monitor().is_suspended());
}

#[tokio::test]
async fn resume_reconnects() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.adapter.clear_calls();

    h.controller
        .handle_monitor_event(MonitorEvent::Power(PowerEvent::Resume))
        .await;

    let calls = h.adapter.calls();
    let close = calls.iter().position(|c| matches!(c, AdapterCall::Close));
    let connect = calls.iter().position(|c| matches!(c, AdapterCall::Connect(_)));
    assert!(close.unwrap() < connect.unwrap());
    assert_eq!(h.controller.connection_state(), ConnectionState::Connected);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn suspend_keeps_connection_but_drops_callbacks() {
    let h = harness();
    h.controller.initialise().await.unwrap();

    h.controller
        .handle_monitor_event(MonitorEvent::Power(PowerEvent::Suspend))
        .await;

    assert!(h.adapter.is_connected());
    assert!(!h.adapter.callbacks_enabled());
    assert_eq!(h.controller.connection_state(), ConnectionState::Suspended);
    h.controller.shutdown().await;
}

// ── Adapter configuration ───────────────────────────────────────────

#[tokio::test]
async fn autodetected_configuration_fills_the_graph_without_pushing() {
    let h = harness();
    h.controller.initialise().await.unwrap();

    let controller = h.controller.clone();
    wait_until(|| controller.device_config().adapter.is_some()).await;
    settle().await;

    let graph = h.controller.settings().await;
    assert_eq!(graph.physical_address(), PhysicalAddress(0x1000));
    assert!(graph.flag(SettingKey::DetectPhysicalAddress));
    assert_eq!(graph.connected_device(), LogicalAddress::Unknown);
    assert_eq!(graph.hdmi_port(), 0);
    assert!(!graph.is_enabled(SettingKey::HdmiPort));
    assert_eq!(
        h.adapter
            .call_count(|c| matches!(c, AdapterCall::SetConfiguration(_))),
        0
    );
    h.controller.shutdown().await;
}

#[tokio::test]
async fn configuration_with_known_vendor_enables_vendor_override() {
    let h = harness();
    let mut ui = h.controller.subscribe_ui();
    h.controller.initialise().await.unwrap();
    let controller = h.controller.clone();
    wait_until(|| controller.device_config().adapter.is_some()).await;
    settle().await;

    let mut reported = h.adapter.current_config().unwrap();
    reported.autodetect_address = false;
    reported.base_device = LogicalAddress::Tv;
    reported.hdmi_port = 3;
    reported.physical_address = PhysicalAddress(0x3000);
    reported.tv_vendor = VendorId::LG;
    h.controller
        .handle_adapter_event(AdapterEvent::ConfigurationChanged(reported))
        .await;

    let graph = h.controller.settings().await;
    assert!(graph.flag(SettingKey::OverrideTvVendor));
    assert_eq!(graph.tv_vendor(), VendorId::LG);
    assert_eq!(graph.hdmi_port(), 3);
    assert_eq!(graph.connected_device(), LogicalAddress::Tv);
    assert!(!graph.flag(SettingKey::DetectPhysicalAddress));
    assert_eq!(h.controller.device_config().tv_vendor, VendorId::LG);

    let mut title = None;
    while let Ok(command) = ui.try_recv() {
        if let UiCommand::Title(text) = command {
            title = Some(text);
        }
    }
    assert!(title.unwrap().starts_with("cectray - cectray-simulated"));
    h.controller.shutdown().await;
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn switching_off_autodetect_pushes_configuration() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    let controller = h.controller.clone();
    wait_until(|| controller.device_config().adapter.is_some()).await;
    settle().await;
    h.adapter.clear_calls();

    h.controller
        .set_setting(SettingKey::DetectPhysicalAddress, SettingValue::Bool(false))
        .await
        .unwrap();

    assert_eq!(
        h.adapter
            .call_count(|c| matches!(c, AdapterCall::SetConfiguration(_))),
        1
    );
    assert!(!h.controller.device_config().autodetect_address);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn disabled_setting_rejects_user_edits() {
    let h = harness();
    h.controller.initialise().await.unwrap();

    let err = h
        .controller
        .set_setting(SettingKey::HdmiPort, SettingValue::Byte(2))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    h.controller.shutdown().await;
}

#[tokio::test]
async fn save_persists_only_persistent_settings() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.controller
        .set_setting_str(SettingKey::StandbyScreen, "5m")
        .await
        .unwrap();

    h.controller.save_settings().await.unwrap();

    assert_eq!(
        h.store.load(SettingKey::StandbyScreen).as_deref(),
        Some("5m")
    );
    assert!(h.store.load(SettingKey::PhysicalAddress).is_none());
    assert_eq!(h.controller.monitor().idle_timeout(), 300);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn persisted_settings_are_loaded_on_initialise() {
    let store = MemoryStore::default();
    store.insert_raw(SettingKey::StandbyScreen, "10m");
    store.insert_raw(SettingKey::StopTvStandby, "true");
    let h = harness_with(SimulatedAdapter::new(), store);

    h.controller.initialise().await.unwrap();

    let graph = h.controller.settings().await;
    assert!(graph.flag(SettingKey::StopTvStandby));
    assert_eq!(h.controller.monitor().idle_timeout(), 600);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn reset_defaults_pushes_one_configuration() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.controller
        .set_setting_str(SettingKey::StandbyScreen, "1h")
        .await
        .unwrap();
    h.adapter.clear_calls();

    h.controller.reset_default_settings().await.unwrap();

    assert_eq!(
        h.adapter
            .call_count(|c| matches!(c, AdapterCall::SetConfiguration(_))),
        1
    );
    assert_eq!(h.controller.monitor().idle_timeout(), -1);
    assert!(!h.controller.actions().suppress_updates());
    h.controller.shutdown().await;
}

#[tokio::test]
async fn reset_from_autodetect_restores_every_default() {
    let h = harness();
    connected(&h).await;
    h.adapter.clear_calls();

    h.controller.reset_default_settings().await.unwrap();

    let graph = h.controller.settings().await;
    let changed: Vec<String> = graph
        .iter()
        .filter(|s| !s.is_default())
        .map(|s| format!("{}={}", s.key, s.value))
        .collect();
    assert!(changed.is_empty(), "not at default: {changed:?}");

    let pushed = pushed_configurations(&h.adapter);
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].addressing_mode(), AddressingMode::Autodetect);
    assert!(h.controller.device_config().autodetect_address);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn address_edit_after_full_push_reaches_the_adapter() {
    let h = harness();
    connected(&h).await;
    let pa = PhysicalAddress(0x3000);

    h.controller
        .set_setting(SettingKey::OverridePhysicalAddress, SettingValue::Bool(true))
        .await
        .unwrap();
    h.controller
        .set_setting(SettingKey::PhysicalAddress, SettingValue::PhysicalAddress(pa))
        .await
        .unwrap();
    assert_eq!(h.controller.physical_address().await.unwrap(), pa);

    h.controller.reset_default_settings().await.unwrap();
    assert_ne!(h.controller.physical_address().await.unwrap(), pa);
    h.adapter.clear_calls();

    h.controller
        .set_setting(SettingKey::OverridePhysicalAddress, SettingValue::Bool(true))
        .await
        .unwrap();
    h.controller
        .set_setting(SettingKey::PhysicalAddress, SettingValue::PhysicalAddress(pa))
        .await
        .unwrap();

    assert_eq!(
        h.adapter
            .call_count(|c| *c == AdapterCall::SetPhysicalAddress(pa)),
        1
    );
    assert_eq!(h.controller.physical_address().await.unwrap(), pa);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn enabling_override_pushes_configuration_once() {
    let h = harness();
    connected(&h).await;
    h.adapter.clear_calls();

    h.controller
        .set_setting(SettingKey::OverridePhysicalAddress, SettingValue::Bool(true))
        .await
        .unwrap();

    let graph = h.controller.settings().await;
    assert!(graph.flag(SettingKey::OverridePhysicalAddress));
    assert!(!graph.flag(SettingKey::DetectPhysicalAddress));
    let pushed = pushed_configurations(&h.adapter);
    assert_eq!(pushed.len(), 1);
    assert!(!pushed[0].autodetect_address);
    h.controller.shutdown().await;
}

// ── Callbacks ───────────────────────────────────────────────────────

#[tokio::test]
async fn keypress_goes_to_first_consuming_application() {
    let h = harness();
    let mut ui = h.controller.subscribe_ui();
    let ignores = RecordingApp::new("ignores", false);
    let first = RecordingApp::new("first", true);
    let second = RecordingApp::new("second", true);
    for app in [ignores.clone(), first.clone(), second.clone()] {
        h.controller.register_application(app).await.unwrap();
    }
    h.controller.select_application(Some("first")).await;

    h.controller
        .handle_adapter_event(AdapterEvent::Keypress(Keypress::new(KeyCode::PLAY)))
        .await;

    assert_eq!(ignores.keys(), vec![(KeyCode::PLAY, false)]);
    assert_eq!(first.keys(), vec![(KeyCode::PLAY, true)]);
    assert!(second.keys().is_empty());

    let mut logs = Vec::new();
    while let Ok(command) = ui.try_recv() {
        if let UiCommand::Log(line) = command {
            logs.push(line);
        }
    }
    assert_eq!(logs, vec![format!("sent key '{}' to 'first'", KeyCode::PLAY)]);
}

#[tokio::test]
async fn duplicate_application_is_rejected() {
    let h = harness();
    h.controller
        .register_application(RecordingApp::new("player", true))
        .await
        .unwrap();
    let err = h
        .controller
        .register_application(RecordingApp::new("player", false))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateApplication { .. }));
    assert_eq!(h.controller.applications().await, vec!["player".to_owned()]);
}

#[tokio::test]
async fn source_activation_starts_auto_start_applications() {
    let h = harness();
    let app = Arc::new(RecordingApp {
        name: "kodi",
        accepts: true,
        auto_start: true,
        keys: Mutex::new(Vec::new()),
        starts: AtomicUsize::new(0),
    });
    h.controller.register_application(app.clone()).await.unwrap();

    h.controller
        .handle_adapter_event(AdapterEvent::SourceActivated {
            address: LogicalAddress::RecordingDevice1,
            activated: false,
        })
        .await;
    assert_eq!(app.starts.load(Ordering::SeqCst), 0);

    h.controller
        .handle_adapter_event(AdapterEvent::SourceActivated {
            address: LogicalAddress::RecordingDevice1,
            activated: true,
        })
        .await;
    assert_eq!(app.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn alerts_are_deduplicated_and_acknowledged() {
    let h = harness();
    let mut ui = h.controller.subscribe_ui();
    for kind in [Alert::TvPollFailed, Alert::PortBusy, Alert::TvPollFailed] {
        h.controller
            .handle_adapter_event(AdapterEvent::Alert { kind, data: 0 })
            .await;
    }
    assert_eq!(
        h.controller.alerts().await,
        vec![Alert::TvPollFailed, Alert::PortBusy]
    );

    let mut statuses = Vec::new();
    while let Ok(command) = ui.try_recv() {
        if let UiCommand::Status(text) = command {
            statuses.push(text);
        }
    }
    // One status update per new alert, always showing the oldest.
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0], statuses[1]);

    h.controller.acknowledge_alerts().await;
    assert!(h.controller.alerts().await.is_empty());
    assert!(matches!(
        ui.try_recv(),
        Ok(UiCommand::Status(text)) if text == "Ready"
    ));
}

#[tokio::test]
async fn tv_standby_suspends_host_when_enabled() {
    let store = MemoryStore::default();
    store.insert_raw(SettingKey::StopTvStandby, "true");
    let h = harness_with(
        SimulatedAdapter::new().with_device(SimulatedDevice::tv(VendorId::SONY)),
        store,
    );
    let player = RecordingApp::new("player", false);
    h.controller
        .register_application(player.clone())
        .await
        .unwrap();
    h.controller.initialise().await.unwrap();

    let standby = BusCommand::new(LogicalAddress::Tv, LogicalAddress::Broadcast, Opcode::STANDBY);
    h.controller
        .handle_adapter_event(AdapterEvent::CommandReceived(standby))
        .await;

    assert_eq!(h.host.suspend_requests.load(Ordering::SeqCst), 1);
    assert_eq!(player.keys(), vec![(KeyCode::STOP, false)]);
    assert!(!h.adapter.callbacks_enabled());
    assert_eq!(h.controller.connection_state(), ConnectionState::Suspended);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn tv_standby_ignored_when_disabled_or_not_for_us() {
    let h = harness();
    h.controller.initialise().await.unwrap();

    let standby = BusCommand::new(LogicalAddress::Tv, LogicalAddress::Broadcast, Opcode::STANDBY);
    h.controller
        .handle_adapter_event(AdapterEvent::CommandReceived(standby))
        .await;
    h.controller
        .set_setting(SettingKey::StopTvStandby, SettingValue::Bool(true))
        .await
        .unwrap();
    let elsewhere = BusCommand::new(
        LogicalAddress::Tv,
        LogicalAddress::PlaybackDevice2,
        Opcode::STANDBY,
    );
    h.controller
        .handle_adapter_event(AdapterEvent::CommandReceived(elsewhere))
        .await;

    assert_eq!(h.host.suspend_requests.load(Ordering::SeqCst), 0);
    h.controller.shutdown().await;
}

// ── Monitor events ──────────────────────────────────────────────────

#[tokio::test]
async fn idle_and_screensaver_drive_standby_and_wake() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.adapter.clear_calls();

    h.controller.handle_monitor_event(MonitorEvent::Idle(true)).await;
    assert_eq!(h.adapter.power_status(LogicalAddress::Tv), Some(PowerStatus::Standby));

    h.controller
        .handle_monitor_event(MonitorEvent::Screensaver(false))
        .await;
    assert_eq!(h.adapter.power_status(LogicalAddress::Tv), Some(PowerStatus::On));

    h.controller
        .handle_monitor_event(MonitorEvent::Power(PowerEvent::AwayExit))
        .await;
    assert_eq!(
        h.adapter
            .call_count(|c| matches!(c, AdapterCall::SetActiveSource)),
        1
    );
    h.controller.shutdown().await;
}

#[tokio::test]
async fn away_mode_and_screensaver_put_the_bus_in_standby() {
    let h = harness();
    connected(&h).await;

    for event in [
        MonitorEvent::Power(PowerEvent::AwayEnter),
        MonitorEvent::Screensaver(true),
    ] {
        h.adapter.clear_calls();
        h.controller.handle_monitor_event(event).await;
        assert_eq!(
            h.adapter.calls(),
            vec![AdapterCall::StandbyDevices(LogicalAddress::Broadcast)],
            "{event:?}"
        );
        assert_eq!(
            h.adapter.power_status(LogicalAddress::Tv),
            Some(PowerStatus::Standby)
        );
        h.controller
            .handle_monitor_event(MonitorEvent::Screensaver(false))
            .await;
    }
    h.controller.shutdown().await;
}

#[tokio::test]
async fn monitor_events_ignored_while_closed() {
    let h = harness();
    h.controller.handle_monitor_event(MonitorEvent::Idle(true)).await;
    h.controller
        .handle_monitor_event(MonitorEvent::Screensaver(false))
        .await;
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn host_idle_reaches_the_adapter_through_the_monitor() {
    let store = MemoryStore::default();
    store.insert_raw(SettingKey::StandbyScreen, "1m");
    let h = harness_with(
        SimulatedAdapter::new().with_device(SimulatedDevice::tv(VendorId::PHILIPS)),
        store,
    );
    h.controller.initialise().await.unwrap();

    h.host.idle.store(90, Ordering::SeqCst);
    let adapter = h.adapter.clone();
    wait_until(|| adapter.power_status(LogicalAddress::Tv) == Some(PowerStatus::Standby)).await;

    h.host.idle.store(0, Ordering::SeqCst);
    let adapter = h.adapter.clone();
    wait_until(|| adapter.power_status(LogicalAddress::Tv) == Some(PowerStatus::On)).await;
    h.controller.shutdown().await;
}

// ── Device operations ───────────────────────────────────────────────

#[tokio::test]
async fn active_devices_include_broadcast() {
    let h = harness_with(
        SimulatedAdapter::new()
            .with_device(SimulatedDevice::tv(VendorId::SAMSUNG))
            .with_device(SimulatedDevice::audio_system(PhysicalAddress(0x1000))),
        MemoryStore::default(),
    );
    h.controller.initialise().await.unwrap();

    let devices = h.controller.check_active_devices().await.unwrap();
    assert_eq!(
        devices,
        vec![
            "0 : tv".to_owned(),
            "5 : audio-system".to_owned(),
            "F : broadcast".to_owned(),
        ]
    );
    h.controller.shutdown().await;
}

#[tokio::test]
async fn device_commands_fail_when_not_connected() {
    let h = harness();
    let err = h
        .controller
        .send_standby(LogicalAddress::Tv)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotConnected));
}

#[tokio::test]
async fn manual_commands_reach_the_bus() {
    let h = harness_with(
        SimulatedAdapter::new()
            .with_device(SimulatedDevice::tv(VendorId::SAMSUNG))
            .with_device(SimulatedDevice::audio_system(PhysicalAddress(0x2000))),
        MemoryStore::default(),
    );
    h.controller.initialise().await.unwrap();
    h.controller.send_standby(LogicalAddress::Tv).await.unwrap();
    h.adapter.clear_calls();

    h.controller
        .send_image_view_on(LogicalAddress::Tv)
        .await
        .unwrap();
    h.controller
        .set_stream_path(LogicalAddress::AudioSystem)
        .await
        .unwrap();
    h.controller.volume_down().await.unwrap();

    assert_eq!(h.adapter.power_status(LogicalAddress::Tv), Some(PowerStatus::On));
    let opcodes: Vec<(LogicalAddress, Opcode)> = h
        .adapter
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            AdapterCall::SendCommand(cmd) => Some((cmd.destination, cmd.opcode)),
            _ => None,
        })
        .collect();
    assert_eq!(
        opcodes,
        vec![
            (LogicalAddress::Broadcast, Opcode::SET_STREAM_PATH),
            (LogicalAddress::AudioSystem, Opcode::USER_CONTROL_PRESSED),
            (LogicalAddress::AudioSystem, Opcode::USER_CONTROL_RELEASE),
        ]
    );
    assert!(h.controller.adapter_info().is_some());
    h.controller.shutdown().await;
}

#[tokio::test]
async fn stream_path_rejects_broadcast() {
    let h = harness();
    h.controller.initialise().await.unwrap();
    h.adapter.clear_calls();

    let err = h
        .controller
        .set_stream_path(LogicalAddress::Broadcast)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTarget { .. }));
    assert!(h.adapter.calls().is_empty());
    h.controller.shutdown().await;
}
