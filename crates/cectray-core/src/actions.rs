// ── Device actions ──
//
// Named operations against the adapter. Each intent reports progress and
// failures to the UI and returns a `CoreError` the caller can log. While
// updates are suppressed, commands become local no-ops; queries still run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cectray_api::{
    AdapterInfo, BusCommand, CecAdapter, DeviceConfig, DeviceInfo, KeyCode, LogicalAddress,
    Opcode, PhysicalAddress, VendorId,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::ui::{STATUS_READY, UiCommand};

#[derive(Debug, Default)]
struct Pushed {
    physical_address: Option<PhysicalAddress>,
    connected_device: Option<(LogicalAddress, u8)>,
}

/// Command façade over a [`CecAdapter`].
pub struct Actions {
    adapter: Arc<dyn CecAdapter>,
    ui: broadcast::Sender<UiCommand>,
    suppress: AtomicBool,
    pushed: Mutex<Pushed>,
}

impl Actions {
    pub fn new(adapter: Arc<dyn CecAdapter>, ui: broadcast::Sender<UiCommand>) -> Self {
        Self {
            adapter,
            ui,
            suppress: AtomicBool::new(false),
            pushed: Mutex::new(Pushed::default()),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn CecAdapter> {
        &self.adapter
    }

    /// Returns the previous value.
    pub fn set_suppress_updates(&self, suppress: bool) -> bool {
        self.suppress.swap(suppress, Ordering::AcqRel)
    }

    pub fn suppress_updates(&self) -> bool {
        self.suppress.load(Ordering::Acquire)
    }

    /// Forget what was last pushed, so the next push always goes out.
    pub fn reset_pushed(&self) {
        *self.pushed.lock().unwrap_or_else(PoisonError::into_inner) = Pushed::default();
    }

    fn ui(&self, command: UiCommand) {
        let _ = self.ui.send(command);
    }

    /// Run a command with progress reporting. Skipped while suppressed.
    fn command(
        &self,
        label: &str,
        f: impl FnOnce(&dyn CecAdapter) -> Result<(), cectray_api::Error>,
    ) -> Result<(), CoreError> {
        if self.suppress_updates() {
            debug!(command = label, "updates suppressed, skipping");
            return Ok(());
        }
        self.ui(UiCommand::Progress {
            percent: 0,
            visible: true,
        });
        self.ui(UiCommand::Status(format!("{label}...")));

        let result = f(self.adapter.as_ref());

        self.ui(UiCommand::Progress {
            percent: 100,
            visible: false,
        });
        match result {
            Ok(()) => {
                debug!(command = label, "device command done");
                self.ui(UiCommand::Status(STATUS_READY.into()));
                Ok(())
            }
            Err(e) => {
                warn!(command = label, error = %e, "device command failed");
                let err = CoreError::device(label, &e);
                self.ui(UiCommand::Status(err.to_string()));
                Err(err)
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn connect_to_device(&self, config: &DeviceConfig) -> Result<(), CoreError> {
        self.reset_pushed();
        self.command("Connecting to the CEC adapter", |a| a.connect(config))
    }

    /// Push the full configuration. The adapter may re-address itself, so
    /// the next single-address push always goes out.
    pub fn push_configuration(&self, config: &DeviceConfig) -> Result<(), CoreError> {
        let sending = !self.suppress_updates();
        self.command("Updating the adapter configuration", |a| {
            a.set_configuration(config)
        })?;
        if sending {
            self.reset_pushed();
        }
        Ok(())
    }

    pub fn set_physical_address(&self, address: PhysicalAddress) -> Result<(), CoreError> {
        if self.suppress_updates() {
            return Ok(());
        }
        {
            let pushed = self.pushed.lock().unwrap_or_else(PoisonError::into_inner);
            if pushed.physical_address == Some(address) {
                debug!(%address, "physical address unchanged, skipping");
                return Ok(());
            }
        }
        self.command("Setting the physical address", |a| {
            a.set_physical_address(address)
        })?;
        let mut pushed = self.pushed.lock().unwrap_or_else(PoisonError::into_inner);
        pushed.physical_address = Some(address);
        pushed.connected_device = None;
        Ok(())
    }

    /// Address ourselves as `port` on `device`.
    pub fn set_connected_device(&self, device: LogicalAddress, port: u8) -> Result<(), CoreError> {
        if self.suppress_updates() {
            return Ok(());
        }
        {
            let pushed = self.pushed.lock().unwrap_or_else(PoisonError::into_inner);
            if pushed.connected_device == Some((device, port)) {
                debug!(%device, port, "connected device unchanged, skipping");
                return Ok(());
            }
        }
        self.command("Setting the HDMI port", |a| {
            let base = if device == LogicalAddress::Tv {
                PhysicalAddress::ROOT
            } else {
                a.device_info(device)?.physical_address
            };
            let address = base
                .child(port)
                .ok_or_else(|| cectray_api::Error::Adapter(format!(
                    "cannot address port {port} below {base}"
                )))?;
            a.set_physical_address(address)
        })?;
        let mut pushed = self.pushed.lock().unwrap_or_else(PoisonError::into_inner);
        pushed.connected_device = Some((device, port));
        pushed.physical_address = None;
        Ok(())
    }

    pub fn send_standby(&self, address: LogicalAddress) -> Result<(), CoreError> {
        self.command("Sending the standby command", |a| {
            a.standby_devices(address)
        })
    }

    pub fn activate_source(&self) -> Result<(), CoreError> {
        self.command("Making the computer the active source", |a| {
            a.set_active_source()
        })
    }

    pub fn rescan_devices(&self) -> Result<(), CoreError> {
        self.command("Rescanning the bus", |a| a.rescan_devices())
    }

    /// Power on `address` (image view on for a TV).
    pub fn send_image_view_on(&self, address: LogicalAddress) -> Result<(), CoreError> {
        self.command("Sending the power on command", |a| {
            a.power_on_devices(address)
        })
    }

    /// Broadcast a stream-path request that routes the bus to `address`.
    pub fn set_stream_path(&self, address: LogicalAddress) -> Result<(), CoreError> {
        self.command("Setting the stream path", |a| {
            let target = a.device_info(address)?.physical_address;
            let mut command = BusCommand::new(
                own_address(a),
                LogicalAddress::Broadcast,
                Opcode::SET_STREAM_PATH,
            );
            command.parameters = target.0.to_be_bytes().to_vec();
            a.send_command(&command)
        })
    }

    pub fn volume_up(&self) -> Result<(), CoreError> {
        self.send_key("Volume up", LogicalAddress::AudioSystem, KeyCode::VOLUME_UP)
    }

    pub fn volume_down(&self) -> Result<(), CoreError> {
        self.send_key("Volume down", LogicalAddress::AudioSystem, KeyCode::VOLUME_DOWN)
    }

    pub fn mute_audio(&self) -> Result<(), CoreError> {
        self.send_key("Muting the audio", LogicalAddress::AudioSystem, KeyCode::MUTE)
    }

    /// Press and release `key` on `destination`.
    fn send_key(
        &self,
        label: &str,
        destination: LogicalAddress,
        key: KeyCode,
    ) -> Result<(), CoreError> {
        self.command(label, |a| {
            let initiator = own_address(a);
            let mut pressed =
                BusCommand::new(initiator, destination, Opcode::USER_CONTROL_PRESSED);
            pressed.parameters.push(key.0);
            a.send_command(&pressed)?;
            a.send_command(&BusCommand::new(
                initiator,
                destination,
                Opcode::USER_CONTROL_RELEASE,
            ))
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn show_device_info(&self, address: LogicalAddress) -> Result<DeviceInfo, CoreError> {
        self.adapter
            .device_info(address)
            .map_err(|e| CoreError::device("device info", &e))
    }

    /// Read the physical address currently in effect.
    pub fn update_physical_address(&self) -> Result<PhysicalAddress, CoreError> {
        let address = self
            .adapter
            .physical_address()
            .map_err(|e| CoreError::device("read physical address", &e))?;
        debug!(%address, "physical address read back");
        Ok(address)
    }

    pub fn tv_vendor(&self) -> Result<VendorId, CoreError> {
        self.adapter
            .device_vendor_id(LogicalAddress::Tv)
            .map_err(|e| CoreError::device("query TV vendor", &e))
    }

    /// Library and firmware details, once connected.
    pub fn adapter_info(&self) -> Option<AdapterInfo> {
        self.adapter.lib_info()
    }
}

/// First logical address we hold, or the unregistered address.
fn own_address(adapter: &dyn CecAdapter) -> LogicalAddress {
    adapter
        .logical_addresses()
        .iter()
        .next()
        .unwrap_or(LogicalAddress::Broadcast)
}
