// ── Controller ──
//
// Connection lifecycle for one CEC adapter. Reacts to settings edits,
// monitor events and adapter callbacks, and turns them into adapter commands
// through `Actions`. All state transitions and event handling are serialized
// by a single async mutex over the controller core.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use arc_swap::ArcSwap;
use cectray_api::{
    AdapterEvent, AdapterInfo, AdapterType, Alert, BusCommand, CecAdapter, DeviceConfig, DeviceInfo,
    EventSink, KeyCode, Keypress, LogLevel, LogMessage, LogicalAddress, Opcode,
    PhysicalAddress, VendorId,
};
use indexmap::IndexMap;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::Actions;
use crate::app::Application;
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{AlertQueue, ConnectionState, MonitorEvent, PowerEvent, idle_progress};
use crate::monitor::{HostSignals, IdleAndPowerMonitor};
use crate::settings::{
    SettingChange, SettingKey, SettingValue, SettingsGraph, SettingsStore,
    recompute_device_config,
};
use crate::ui::{
    Control, DEVICE_TYPE_CHANGED, STATUS_ALERT, STATUS_READY, STATUS_TV_POLL_FAILED, UiCommand,
};

const UI_CHANNEL_SIZE: usize = 256;
/// Upper bound on change-dispatch rounds for a single edit.
const MAX_CHANGE_ROUNDS: usize = 8;

// ── Controller core ──────────────────────────────────────────────

/// State guarded by the controller lock.
struct Core {
    graph: SettingsGraph,
    device_config: DeviceConfig,
    alerts: AlertQueue,
    applications: IndexMap<String, Arc<dyn Application>>,
    selected_application: Option<String>,
    initialised: bool,
    started: bool,
    device_type_warning_shown: bool,
    /// An addressing switch changed; push once when the pass settles.
    configuration_pending: bool,
}

// ── Controller ───────────────────────────────────────────────────

/// The orchestrator.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construct it once with the
/// adapter, the process-wide monitor, the host and a settings store, then
/// call [`initialise()`](Self::initialise).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    core: Mutex<Core>,
    /// Lock-free snapshot of `Core::device_config` for readers.
    device_config: ArcSwap<DeviceConfig>,
    connection_state: watch::Sender<ConnectionState>,
    ui_tx: broadcast::Sender<UiCommand>,
    actions: Actions,
    monitor: IdleAndPowerMonitor,
    host: Arc<dyn HostSignals>,
    store: Arc<dyn SettingsStore>,
    adapter_tx: EventSink,
    adapter_rx: StdMutex<Option<mpsc::UnboundedReceiver<AdapterEvent>>>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller. Does NOT connect; call
    /// [`initialise()`](Self::initialise).
    pub fn new(
        config: ControllerConfig,
        adapter: Arc<dyn CecAdapter>,
        monitor: IdleAndPowerMonitor,
        host: Arc<dyn HostSignals>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        let graph = SettingsGraph::new();
        let device_config = recompute_device_config(&graph, &config.device_name);
        let (connection_state, _) = watch::channel(ConnectionState::Uninitialized);
        let (ui_tx, _) = broadcast::channel(UI_CHANNEL_SIZE);
        let (adapter_tx, adapter_rx) = mpsc::unbounded_channel();
        let actions = Actions::new(adapter, ui_tx.clone());

        Self {
            inner: Arc::new(ControllerInner {
                config,
                core: Mutex::new(Core {
                    graph,
                    device_config: device_config.clone(),
                    alerts: AlertQueue::default(),
                    applications: IndexMap::new(),
                    selected_application: None,
                    configuration_pending: false,
                    initialised: false,
                    started: false,
                    device_type_warning_shown: false,
                }),
                device_config: ArcSwap::from_pointee(device_config),
                connection_state,
                ui_tx,
                actions,
                monitor,
                host,
                store,
                adapter_tx,
                adapter_rx: StdMutex::new(Some(adapter_rx)),
                cancel: CancellationToken::new(),
                task: StdMutex::new(None),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }

    pub fn monitor(&self) -> &IdleAndPowerMonitor {
        &self.inner.monitor
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    pub fn connection_state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn subscribe_ui(&self) -> broadcast::Receiver<UiCommand> {
        self.inner.ui_tx.subscribe()
    }

    /// Current adapter configuration snapshot.
    pub fn device_config(&self) -> Arc<DeviceConfig> {
        self.inner.device_config.load_full()
    }

    /// Copy of the settings graph.
    pub async fn settings(&self) -> SettingsGraph {
        self.inner.core.lock().await.graph.clone()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.inner.core.lock().await.alerts.iter().copied().collect()
    }

    /// Registered application names, in registration order.
    pub async fn applications(&self) -> Vec<String> {
        self.inner
            .core
            .lock()
            .await
            .applications
            .keys()
            .cloned()
            .collect()
    }

    pub async fn is_initialised(&self) -> bool {
        self.inner.core.lock().await.initialised
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load settings, start the orchestration task and open the adapter.
    /// A second call does nothing.
    pub async fn initialise(&self) -> Result<(), CoreError> {
        {
            let mut core = self.inner.core.lock().await;
            if core.initialised {
                debug!("controller already initialised");
                return Ok(());
            }
            core.initialised = true;
            self.set_state(ConnectionState::Initializing);
            self.set_controls_enabled(&mut core, false);

            let loaded = core.graph.load_from(self.inner.store.as_ref());
            debug!(loaded, "persisted settings applied");
            core.device_config =
                recompute_device_config(&core.graph, &self.inner.config.device_name);
            self.publish_device_config(&core);

            let idle_timeout = core.graph.idle_timeout();
            self.inner.monitor.set_idle_timeout(idle_timeout.seconds());
            self.ui(UiCommand::IdleProgress {
                percent: 0,
                visible: idle_timeout.is_enabled(),
            });
        }

        self.spawn_orchestration();
        self.inner.monitor.start();
        self.open().await
    }

    /// Enable callbacks and, on the first call per connection, connect.
    pub async fn open(&self) -> Result<(), CoreError> {
        let mut core = self.inner.core.lock().await;
        let adapter = self.inner.actions.adapter();
        adapter.enable_callbacks(self.inner.adapter_tx.clone());

        if core.started {
            debug!("adapter already open, callbacks re-enabled");
            self.set_state(ConnectionState::Connected);
            return Ok(());
        }

        core.started = true;
        let config = core.device_config.clone();
        match self.inner.actions.connect_to_device(&config) {
            Ok(()) => {
                info!(name = %config.device_name, "connected to CEC adapter");
                self.set_state(ConnectionState::Connected);
                self.inner.monitor.set_suspended(false);
                self.set_controls_enabled(&mut core, true);
                self.update_alert_status(&core);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not open the CEC adapter");
                core.started = false;
                self.set_state(ConnectionState::Closed);
                Err(e)
            }
        }
    }

    /// Put the bus in standby and close the adapter. Does nothing unless the
    /// adapter was opened.
    pub async fn close(&self) {
        self.inner.monitor.set_suspended(true);
        let mut core = self.inner.core.lock().await;
        if !(core.initialised && core.started) {
            debug!("close: adapter not open");
            return;
        }

        let adapter = self.inner.actions.adapter();
        adapter.disable_callbacks();
        if let Err(e) = adapter.standby_devices(LogicalAddress::Broadcast) {
            debug!(error = %e, "standby on close failed");
        }
        adapter.close();
        core.started = false;
        self.set_state(ConnectionState::Closed);
        info!("CEC adapter closed");
    }

    /// Host is going to sleep: stop receiving callbacks, keep the connection.
    pub async fn suspend(&self) {
        let core = self.inner.core.lock().await;
        self.inner.actions.adapter().disable_callbacks();
        if core.started {
            self.set_state(ConnectionState::Suspended);
        }
        info!("suspended");
    }

    /// Host woke up: reconnect from scratch.
    pub async fn resume(&self) -> Result<(), CoreError> {
        info!("resuming");
        self.close().await;
        self.open().await
    }

    /// Process exit.
    pub async fn shutdown(&self) {
        self.inner.actions.set_suppress_updates(true);
        self.inner.monitor.stop();
        self.close().await;
        self.inner.cancel.cancel();

        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(error = %e, "orchestration task ended abnormally");
            }
        }
        info!("controller shut down");
    }

    fn spawn_orchestration(&self) {
        let adapter_rx = self
            .inner
            .adapter_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(adapter_rx) = adapter_rx else {
            return;
        };
        let monitor_rx = self.inner.monitor.take_events();
        if monitor_rx.is_none() {
            warn!("monitor events already taken, idle and power events will not be handled");
        }
        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(orchestration_task(
            self.clone(),
            adapter_rx,
            monitor_rx,
            cancel,
        ));
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    // ── Settings ─────────────────────────────────────────────────

    /// User edit of one setting. Validation errors leave the graph unchanged.
    pub async fn set_setting(&self, key: SettingKey, value: SettingValue) -> Result<(), CoreError> {
        let mut core = self.inner.core.lock().await;
        core.graph.set(key, value)?;
        self.process_changes(&mut core);
        Ok(())
    }

    /// Like [`set_setting`](Self::set_setting), parsing `text` by the setting's type.
    pub async fn set_setting_str(&self, key: SettingKey, text: &str) -> Result<(), CoreError> {
        let mut core = self.inner.core.lock().await;
        core.graph.set_from_str(key, text)?;
        self.process_changes(&mut core);
        Ok(())
    }

    /// Push the configuration to the adapter, then persist the settings.
    pub async fn save_settings(&self) -> Result<(), CoreError> {
        let core = self.inner.core.lock().await;
        if core.started {
            self.inner.actions.push_configuration(&core.device_config)?;
        }
        core.graph.save_to(self.inner.store.as_ref())?;
        info!("settings saved");
        Ok(())
    }

    /// Reset every setting to its default and push one configuration.
    pub async fn reset_default_settings(&self) -> Result<(), CoreError> {
        let mut core = self.inner.core.lock().await;
        self.set_controls_enabled(&mut core, false);

        let previous = self.inner.actions.set_suppress_updates(true);
        core.graph.reset_all();
        self.process_changes(&mut core);
        // The port pair handlers clear the address switches; the defaults win.
        core.graph.reset_all();
        self.drain_changes(&mut core, false);
        let adapter = core.device_config.adapter.take();
        core.device_config = recompute_device_config(&core.graph, &self.inner.config.device_name);
        core.device_config.adapter = adapter;
        self.publish_device_config(&core);
        self.inner.actions.set_suppress_updates(previous);

        let result = if core.started {
            self.inner.actions.push_configuration(&core.device_config)
        } else {
            Ok(())
        };
        self.set_controls_enabled(&mut core, true);
        result
    }

    fn process_changes(&self, core: &mut Core) {
        self.drain_changes(core, true);
    }

    /// Announce pending changes to the UI, running their handlers when
    /// `dispatch` is set.
    fn drain_changes(&self, core: &mut Core, dispatch: bool) {
        let before: Vec<(SettingKey, bool)> = enabled_states(&core.graph);

        for round in 0.. {
            let changes = core.graph.take_changes();
            if changes.is_empty() {
                break;
            }
            if round >= MAX_CHANGE_ROUNDS {
                warn!(pending = changes.len(), "settings keep changing, giving up");
                break;
            }
            for change in changes {
                debug!(key = %change.key, old = %change.old, new = %change.new, "setting changed");
                if dispatch {
                    self.on_setting_changed(core, change);
                }
                self.ui(UiCommand::SettingChanged {
                    key: change.key,
                    value: change.new,
                    enabled: core.graph.is_enabled(change.key),
                });
            }
        }
        if std::mem::take(&mut core.configuration_pending) {
            log_failure(
                "push configuration",
                self.inner.actions.push_configuration(&core.device_config),
            );
        }

        for ((key, was), (_, now)) in before.into_iter().zip(enabled_states(&core.graph)) {
            if was != now {
                self.ui(UiCommand::ControlEnabled {
                    control: Control::Setting(key),
                    enabled: now,
                });
            }
        }
        self.publish_device_config(core);
    }

    #[allow(clippy::too_many_lines)]
    fn on_setting_changed(&self, core: &mut Core, change: SettingChange) {
        let actions = &self.inner.actions;
        match (change.key, change.new) {
            (SettingKey::HdmiPort, SettingValue::Byte(port)) if port != 0 => {
                self.clear_address_overrides(core);
                core.device_config.hdmi_port = port;
                let device = core.graph.connected_device();
                if device != LogicalAddress::Unknown {
                    log_failure("set HDMI port", actions.set_connected_device(device, port));
                }
            }
            (SettingKey::ConnectedDevice, SettingValue::LogicalAddress(device))
                if device != LogicalAddress::Unknown =>
            {
                self.clear_address_overrides(core);
                core.device_config.base_device = device;
                let port = core.graph.hdmi_port();
                if port != 0 {
                    log_failure(
                        "set connected device",
                        actions.set_connected_device(device, port),
                    );
                }
            }
            (SettingKey::PhysicalAddress, SettingValue::PhysicalAddress(address)) => {
                let overridden = core.graph.flag(SettingKey::OverridePhysicalAddress)
                    && !core.graph.flag(SettingKey::DetectPhysicalAddress);
                if overridden && core.device_config.physical_address != address {
                    core.device_config.physical_address = address;
                    log_failure("set physical address", actions.set_physical_address(address));
                }
            }
            (
                SettingKey::OverridePhysicalAddress | SettingKey::DetectPhysicalAddress,
                SettingValue::Bool(_),
            ) => {
                self.apply_addressing(core);
                core.configuration_pending = true;
            }
            (SettingKey::DeviceType, SettingValue::DeviceType(device_type)) => {
                if core.device_config.primary_type() != Some(device_type) {
                    match core.device_config.device_types.first_mut() {
                        Some(first) => *first = device_type,
                        None => core.device_config.device_types.push(device_type),
                    }
                    if !core.device_type_warning_shown {
                        core.device_type_warning_shown = true;
                        self.ui(UiCommand::Warning(DEVICE_TYPE_CHANGED.into()));
                    }
                }
            }
            (SettingKey::OverrideTvVendor, SettingValue::Bool(enabled)) => {
                let vendor = if !enabled {
                    VendorId::UNKNOWN
                } else if actions.suppress_updates() {
                    core.graph.tv_vendor()
                } else {
                    actions.tv_vendor().unwrap_or_else(|e| {
                        warn!(error = %e, "could not read the TV vendor");
                        VendorId::UNKNOWN
                    })
                };
                if let Err(e) = core
                    .graph
                    .assign(SettingKey::TvVendor, SettingValue::VendorId(vendor))
                {
                    warn!(error = %e, "could not update the TV vendor");
                }
                core.device_config.tv_vendor = vendor;
            }
            (SettingKey::TvVendor, SettingValue::VendorId(vendor)) => {
                if core.graph.flag(SettingKey::OverrideTvVendor) {
                    core.device_config.tv_vendor = vendor;
                }
            }
            (SettingKey::ActivateSource, SettingValue::Bool(enabled)) => {
                core.device_config.activate_source = enabled;
            }
            (SettingKey::WakeDevices, SettingValue::LogicalAddresses(devices)) => {
                core.device_config.wake_devices = devices;
            }
            (SettingKey::PowerOffDevices, SettingValue::LogicalAddresses(devices)) => {
                core.device_config.power_off_devices = devices;
            }
            (SettingKey::TvAutoPowerOn, SettingValue::Bool(enabled)) => {
                core.device_config.auto_power_on = enabled;
            }
            (SettingKey::StandbyScreen, SettingValue::IdleTimeout(timeout)) => {
                self.inner.monitor.set_idle_timeout(timeout.seconds());
                self.ui(UiCommand::IdleProgress {
                    percent: 0,
                    visible: timeout.is_enabled(),
                });
            }
            _ => {}
        }
    }

    /// The HDMI port pair became authoritative.
    fn clear_address_overrides(&self, core: &mut Core) {
        for key in [
            SettingKey::OverridePhysicalAddress,
            SettingKey::DetectPhysicalAddress,
        ] {
            if let Err(e) = core.graph.assign(key, SettingValue::Bool(false)) {
                warn!(error = %e, "could not clear address override");
            }
        }
        self.apply_addressing(core);
    }

    /// Copy the addressing fields the graph currently describes.
    fn apply_addressing(&self, core: &mut Core) {
        let derived = recompute_device_config(&core.graph, &self.inner.config.device_name);
        core.device_config.physical_address = derived.physical_address;
        core.device_config.base_device = derived.base_device;
        core.device_config.hdmi_port = derived.hdmi_port;
        core.device_config.autodetect_address = derived.autodetect_address;
    }

    // ── Adapter callbacks ────────────────────────────────────────

    /// Handle one adapter callback. Normally driven by the orchestration task.
    pub async fn handle_adapter_event(&self, event: AdapterEvent) {
        match event {
            AdapterEvent::ConfigurationChanged(config) => self.on_configuration_changed(&config).await,
            AdapterEvent::Alert { kind, data } => {
                warn!(alert = %kind, data, "adapter alert");
                let mut core = self.inner.core.lock().await;
                if core.alerts.push(kind) {
                    self.update_alert_status(&core);
                }
            }
            AdapterEvent::Keypress(key) => self.route_keypress(key).await,
            AdapterEvent::LogMessage(message) => {
                log_adapter_message(&message);
                self.ui(UiCommand::AdapterLog(message));
            }
            AdapterEvent::SourceActivated { address, activated } => {
                debug!(%address, activated, "source activated");
                if activated {
                    self.start_auto_applications().await;
                }
            }
            AdapterEvent::CommandReceived(command) => self.on_command_received(&command).await,
        }
    }

    async fn on_configuration_changed(&self, config: &DeviceConfig) {
        let mut core = self.inner.core.lock().await;
        let actions = &self.inner.actions;
        let previous = actions.set_suppress_updates(true);

        core.device_config.update(config);
        let merged = core.device_config.clone();
        let graph = &mut core.graph;

        let mut values = vec![(
            SettingKey::PhysicalAddress,
            SettingValue::PhysicalAddress(config.physical_address),
        )];
        if config.autodetect_address {
            values.extend([
                (SettingKey::DetectPhysicalAddress, SettingValue::Bool(true)),
                (
                    SettingKey::ConnectedDevice,
                    SettingValue::LogicalAddress(LogicalAddress::Unknown),
                ),
                (SettingKey::HdmiPort, SettingValue::Byte(0)),
            ]);
        } else {
            let base = if config.base_device == LogicalAddress::AudioSystem {
                LogicalAddress::AudioSystem
            } else {
                LogicalAddress::Tv
            };
            values.extend([
                (SettingKey::ConnectedDevice, SettingValue::LogicalAddress(base)),
                (SettingKey::HdmiPort, SettingValue::Byte(config.hdmi_port)),
                (SettingKey::DetectPhysicalAddress, SettingValue::Bool(false)),
            ]);
        }
        values.extend([
            (
                SettingKey::WakeDevices,
                SettingValue::LogicalAddresses(merged.wake_devices),
            ),
            (
                SettingKey::PowerOffDevices,
                SettingValue::LogicalAddresses(merged.power_off_devices),
            ),
            (
                SettingKey::ActivateSource,
                SettingValue::Bool(merged.activate_source),
            ),
            (
                SettingKey::TvAutoPowerOn,
                SettingValue::Bool(config.auto_power_on),
            ),
        ]);
        if let Some(device_type) = config.primary_type() {
            values.push((SettingKey::DeviceType, SettingValue::DeviceType(device_type)));
        }
        if config.tv_vendor.is_known() {
            values.push((SettingKey::OverrideTvVendor, SettingValue::Bool(true)));
            values.push((SettingKey::TvVendor, SettingValue::VendorId(config.tv_vendor)));
        } else {
            values.push((SettingKey::OverrideTvVendor, SettingValue::Bool(false)));
        }

        for (key, value) in values {
            if let Err(e) = graph.assign(key, value) {
                warn!(error = %e, "could not apply adapter configuration");
            }
        }
        for key in [SettingKey::ConnectedDevice, SettingKey::HdmiPort] {
            self.ui(UiCommand::ControlEnabled {
                control: Control::Setting(key),
                enabled: graph.is_enabled(key),
            });
        }
        self.process_changes(&mut core);
        // Adapter-reported values win over what the handlers derived.
        core.device_config.update(&merged);

        match actions.update_physical_address() {
            Ok(address) => {
                if let Err(e) = core
                    .graph
                    .assign(SettingKey::PhysicalAddress, SettingValue::PhysicalAddress(address))
                {
                    warn!(error = %e, "could not store the physical address");
                }
                self.process_changes(&mut core);
            }
            Err(e) => debug!(error = %e, "physical address not available"),
        }
        actions.set_suppress_updates(previous);

        self.surface_adapter_info(&merged);
        self.publish_device_config(&core);
        info!(
            mode = ?merged.addressing_mode(),
            "adapter configuration changed"
        );
    }

    fn surface_adapter_info(&self, config: &DeviceConfig) {
        let Some(info) = config.adapter.as_ref() else {
            return;
        };
        self.ui(UiCommand::Title(format!(
            "{} - {}",
            self.inner.config.app_name, info.server_version
        )));

        let pulse_eight = matches!(
            info.adapter_type,
            AdapterType::PulseEightExternal | AdapterType::PulseEightDaughterboard
        );
        for control in [Control::FirmwareLabel, Control::FirmwareVersion] {
            self.ui(UiCommand::ControlVisible {
                control,
                visible: pulse_eight,
            });
        }
        if pulse_eight {
            let build_date = chrono::DateTime::from_timestamp(info.firmware_build_date, 0)
                .filter(|_| info.firmware_build_date > 0)
                .map(|date| format!(" {}", date.format("%Y-%m-%d")))
                .unwrap_or_default();
            self.ui(UiCommand::ControlText {
                control: Control::FirmwareVersion,
                text: format!("v{}{build_date}", info.firmware_version),
            });
        }
        self.ui(UiCommand::ControlVisible {
            control: Control::Setting(SettingKey::TvAutoPowerOn),
            visible: info.supports_auto_power_on(),
        });
    }

    async fn route_keypress(&self, key: Keypress) {
        let core = self.inner.core.lock().await;
        for (name, app) in &core.applications {
            let selected = core.selected_application.as_deref() == Some(name.as_str());
            if app.handle_key(key, selected) {
                let line = format!("sent key '{}' to '{name}'", key.code);
                debug!(key = %key.code, app = %name, "key routed");
                self.ui(UiCommand::Log(line));
                return;
            }
        }
        debug!(key = %key.code, "no application took the key");
    }

    async fn start_auto_applications(&self) {
        let apps: Vec<Arc<dyn Application>> = {
            let core = self.inner.core.lock().await;
            core.applications.values().cloned().collect()
        };
        for app in apps.iter().filter(|app| app.auto_start()) {
            match app.start() {
                Ok(()) => info!(app = app.name(), "application started"),
                Err(e) => warn!(app = app.name(), error = %e, "could not start application"),
            }
        }
    }

    async fn on_command_received(&self, command: &BusCommand) {
        if command.opcode != Opcode::STANDBY {
            return;
        }
        let core = self.inner.core.lock().await;
        let adapter = self.inner.actions.adapter();
        let primary = adapter.logical_addresses().iter().next();
        let for_us = command.destination == LogicalAddress::Broadcast
            || Some(command.destination) == primary;
        if !for_us || !core.graph.flag(SettingKey::StopTvStandby) {
            return;
        }

        info!(from = %command.initiator, "TV went to standby, suspending the host");
        let stop = Keypress::new(KeyCode::STOP);
        for app in core.applications.values() {
            app.handle_key(stop, false);
        }
        adapter.disable_callbacks();
        if core.started {
            self.set_state(ConnectionState::Suspended);
        }
        if let Err(e) = self.inner.host.request_suspend() {
            warn!(error = %e, "host suspend request failed");
        }
    }

    // ── Monitor events ───────────────────────────────────────────

    /// Handle one monitor event. Normally driven by the orchestration task.
    pub async fn handle_monitor_event(&self, event: MonitorEvent) {
        match event {
            MonitorEvent::Power(PowerEvent::Suspend) => self.suspend().await,
            MonitorEvent::Power(PowerEvent::Resume) => {
                if let Err(e) = self.resume().await {
                    warn!(error = %e, "reconnect after resume failed");
                }
            }
            MonitorEvent::Power(PowerEvent::AwayExit) => {
                debug!("away mode left, not waking devices");
            }
            MonitorEvent::Idle(true)
            | MonitorEvent::Screensaver(true)
            | MonitorEvent::Power(PowerEvent::AwayEnter) => {
                if self.is_connected().await {
                    info!(?event, "putting devices in standby");
                    log_failure(
                        "standby",
                        self.inner.actions.send_standby(LogicalAddress::Broadcast),
                    );
                }
            }
            MonitorEvent::Idle(false) | MonitorEvent::Screensaver(false) => {
                if self.is_connected().await {
                    info!(?event, "activating source");
                    log_failure("activate source", self.inner.actions.activate_source());
                }
            }
            MonitorEvent::Activity {
                idle_seconds,
                timeout_seconds,
            } => {
                self.ui(UiCommand::IdleProgress {
                    percent: idle_progress(idle_seconds, timeout_seconds),
                    visible: true,
                });
            }
        }
    }

    async fn is_connected(&self) -> bool {
        let core = self.inner.core.lock().await;
        core.started && self.connection_state() == ConnectionState::Connected
    }

    // ── Applications ─────────────────────────────────────────────

    /// Register an application. Names are unique.
    pub async fn register_application(&self, app: Arc<dyn Application>) -> Result<(), CoreError> {
        let mut core = self.inner.core.lock().await;
        let name = app.name().to_owned();
        if core.applications.contains_key(&name) {
            return Err(CoreError::DuplicateApplication { name });
        }
        app.initialise();
        core.applications.insert(name.clone(), app);
        info!(app = %name, "application registered");
        Ok(())
    }

    /// Mark the application the user has selected; it gets priority on keys.
    pub async fn select_application(&self, name: Option<&str>) {
        self.inner.core.lock().await.selected_application = name.map(str::to_owned);
    }

    // ── Device operations ────────────────────────────────────────

    /// List the devices on the bus (plus broadcast) and publish it to the UI.
    pub async fn check_active_devices(&self) -> Result<Vec<String>, CoreError> {
        let _core = self.inner.core.lock().await;
        let active = self
            .inner
            .actions
            .adapter()
            .active_devices()
            .map_err(|e| CoreError::device("list active devices", &e))?;

        let mut list: Vec<String> = active
            .iter()
            .chain(std::iter::once(LogicalAddress::Broadcast))
            .filter_map(|address| {
                address
                    .index()
                    .map(|index| format!("{index:X} : {address}"))
            })
            .collect();
        list.dedup();
        self.ui(UiCommand::ActiveDevices(list.clone()));
        Ok(list)
    }

    pub async fn show_device_info(&self, address: LogicalAddress) -> Result<DeviceInfo, CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.show_device_info(address)
    }

    pub async fn send_standby(&self, address: LogicalAddress) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.send_standby(address)
    }

    pub async fn activate_source(&self) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.activate_source()
    }

    pub async fn rescan_devices(&self) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.rescan_devices()
    }

    /// Power on `address`.
    pub async fn send_image_view_on(&self, address: LogicalAddress) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.send_image_view_on(address)
    }

    /// Route the bus to `address`. Broadcast is not a valid target.
    pub async fn set_stream_path(&self, address: LogicalAddress) -> Result<(), CoreError> {
        if address == LogicalAddress::Broadcast || address == LogicalAddress::Unknown {
            return Err(CoreError::InvalidTarget {
                command: "set stream path".into(),
                address,
            });
        }
        let _core = self.inner.core.lock().await;
        self.inner.actions.set_stream_path(address)
    }

    pub async fn volume_up(&self) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.volume_up()
    }

    pub async fn volume_down(&self) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.volume_down()
    }

    pub async fn mute_audio(&self) -> Result<(), CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.mute_audio()
    }

    /// Library and firmware details of the open adapter.
    pub fn adapter_info(&self) -> Option<AdapterInfo> {
        self.inner.actions.adapter_info()
    }

    /// Physical address the adapter currently uses.
    pub async fn physical_address(&self) -> Result<PhysicalAddress, CoreError> {
        let _core = self.inner.core.lock().await;
        self.inner.actions.update_physical_address()
    }

    // ── Alerts ───────────────────────────────────────────────────

    pub async fn acknowledge_alerts(&self) {
        let mut core = self.inner.core.lock().await;
        core.alerts.clear();
        self.update_alert_status(&core);
    }

    fn update_alert_status(&self, core: &Core) {
        match core.alerts.first() {
            Some(Alert::TvPollFailed) => {
                self.ui(UiCommand::Status(STATUS_TV_POLL_FAILED.into()));
                self.ui(UiCommand::Alert { visible: true });
            }
            Some(alert) => {
                self.ui(UiCommand::Status(format!("{STATUS_ALERT}: {alert}")));
                self.ui(UiCommand::Alert { visible: true });
            }
            None => {
                self.ui(UiCommand::Status(STATUS_READY.into()));
                self.ui(UiCommand::Alert { visible: false });
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn ui(&self, command: UiCommand) {
        let _ = self.inner.ui_tx.send(command);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.inner.connection_state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    fn set_controls_enabled(&self, core: &mut Core, enabled: bool) {
        core.graph.set_all_enabled(enabled);
        self.ui(UiCommand::ControlsEnabled(enabled));
    }

    fn publish_device_config(&self, core: &Core) {
        self.inner
            .device_config
            .store(Arc::new(core.device_config.clone()));
    }
}

fn enabled_states(graph: &SettingsGraph) -> Vec<(SettingKey, bool)> {
    graph
        .iter()
        .map(|setting| (setting.key, graph.is_enabled(setting.key)))
        .collect()
}

fn log_failure(what: &str, result: Result<(), CoreError>) {
    if let Err(e) = result {
        warn!(command = what, error = %e, "device command failed");
    }
}

fn log_adapter_message(message: &LogMessage) {
    match message.level {
        LogLevel::Error | LogLevel::Warning => {
            warn!(level = %message.level, time_ms = message.time_ms, "{}", message.message);
        }
        LogLevel::Notice => info!(time_ms = message.time_ms, "{}", message.message),
        LogLevel::Traffic | LogLevel::Debug => {
            debug!(level = %message.level, time_ms = message.time_ms, "{}", message.message);
        }
    }
}

// ── Orchestration task ───────────────────────────────────────────

async fn next_monitor_event(
    rx: &mut Option<mpsc::UnboundedReceiver<MonitorEvent>>,
) -> Option<MonitorEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Single consumer for adapter callbacks and monitor events.
async fn orchestration_task(
    controller: Controller,
    mut adapter_rx: mpsc::UnboundedReceiver<AdapterEvent>,
    mut monitor_rx: Option<mpsc::UnboundedReceiver<MonitorEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = adapter_rx.recv() => match event {
                Some(event) => controller.handle_adapter_event(event).await,
                None => break,
            },
            event = next_monitor_event(&mut monitor_rx) => match event {
                Some(event) => controller.handle_monitor_event(event).await,
                None => {
                    debug!("monitor channel closed");
                    monitor_rx = None;
                }
            },
        }
    }
    debug!("orchestration task stopped");
}
