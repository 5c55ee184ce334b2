//! The `run` daemon: wires the controller to the host and the adapter and
//! waits for signals.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use cectray_api::{SimulatedAdapter, SimulatedDevice, VendorId};
use cectray_core::{Controller, HostSignals, IdleAndPowerMonitor, RawPowerSignal, UiCommand};

use crate::app::ProcessApplication;
use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::host::{HeadlessHost, X11HostSignals};

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load_config(global)?;
    let store = Arc::new(super::open_store(global, &config)?);

    let host: Arc<dyn HostSignals> = if args.no_x11 {
        Arc::new(HeadlessHost)
    } else {
        match X11HostSignals::connect() {
            Ok(host) => Arc::new(host),
            Err(reason) => {
                warn!(%reason, "no X11 idle information, only power signals will be handled");
                Arc::new(HeadlessHost)
            }
        }
    };

    let adapter = Arc::new(
        SimulatedAdapter::new()
            .with_device(SimulatedDevice::tv(VendorId::UNKNOWN))
            .announcing_configuration(),
    );
    let monitor = IdleAndPowerMonitor::new(config.monitor_config(), host.clone());
    let controller = Controller::new(
        config.controller_config(),
        adapter,
        monitor.clone(),
        host,
        store,
    );

    for app in &config.applications {
        controller
            .register_application(Arc::new(ProcessApplication::new(app.clone())))
            .await?;
    }

    let ui_task = tokio::spawn(log_ui_commands(controller.subscribe_ui()));

    if let Err(e) = controller.initialise().await {
        warn!(error = %e, "adapter not available, will retry on resume");
    }
    if let Some(adapter) = controller.adapter_info() {
        info!(
            adapter = %adapter.adapter_type,
            firmware = adapter.firmware_version,
            server = %adapter.server_version,
            "adapter ready"
        );
    }
    info!(device = %config.device_name, "cectray running");

    wait_for_shutdown(&monitor).await?;

    if args.save_on_exit {
        if let Err(e) = controller.save_settings().await {
            warn!(error = %e, "could not save settings on exit");
        }
    }
    controller.shutdown().await;
    ui_task.abort();
    Ok(())
}

/// Forward SIGUSR1/SIGUSR2 as suspend/resume until Ctrl-C or SIGTERM.
async fn wait_for_shutdown(monitor: &IdleAndPowerMonitor) -> Result<(), CliError> {
    let mut suspend = signal(SignalKind::user_defined1())?;
    let mut resume = signal(SignalKind::user_defined2())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupted, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("terminated, shutting down");
                return Ok(());
            }
            _ = suspend.recv() => {
                monitor.handle_power_signal(RawPowerSignal::Suspend);
            }
            _ = resume.recv() => {
                monitor.handle_power_signal(RawPowerSignal::ResumeSuspend);
            }
        }
    }
}

/// Headless front end: UI commands become log lines.
async fn log_ui_commands(mut rx: broadcast::Receiver<UiCommand>) {
    loop {
        match rx.recv().await {
            Ok(UiCommand::Status(text) | UiCommand::Log(text)) => info!("{text}"),
            Ok(UiCommand::Warning(text)) => warn!("{text}"),
            Ok(UiCommand::Title(title)) => info!(%title, "adapter identified"),
            Ok(UiCommand::ActiveDevices(devices)) => {
                info!(devices = %devices.join(", "), "active devices");
            }
            // Already traced by the controller.
            Ok(UiCommand::AdapterLog(_)) => {}
            Ok(command) => debug!(?command, "ui"),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "ui log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
