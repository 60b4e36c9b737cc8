use std::{collections::BTreeMap, time::Duration};

use chrono::Local;
use plinky_core::{DeviceExt, ScanOptions, Session, SessionConfig, Transport, scan_with};
use serde_json::json;
use tracing::debug;

use crate::cli::{DeviceCommand, SocketList};
use crate::utils::{
    energy_summary, poll_interval, print_json, print_wifi_join_success, read_password,
    setup_ssid,
};

/// Handle the scan command.
pub async fn handle_scan(
    network: &str,
    timeout: Duration,
    port: u16,
    concurrency: Option<usize>,
) -> Result<(), String> {
    let mut options = ScanOptions::new().with_timeout(timeout).with_port(port);
    if let Some(limit) = concurrency {
        options = options.with_concurrency(limit);
    }

    let found = scan_with(network, options)
        .await
        .map_err(|e| format!("Scan failed: {}", e))?;
    debug!(network, device_count = found.len(), "scan finished");

    if found.is_empty() {
        return Err("no devices found".to_string());
    }
    let sorted: BTreeMap<_, _> = found.into_iter().collect();
    print_json(&sorted)
}

/// Handle the device command.
///
/// Any password is collected before connecting so a slow prompt does not
/// run into the session timeout.
pub async fn handle_device(
    target: &str,
    timeout: Duration,
    command: DeviceCommand,
) -> Result<(), String> {
    let wifi_password = match &command {
        DeviceCommand::Wifi {
            ssid,
            password_stdin,
        } => Some(read_password(
            *password_stdin,
            &format!("Password for {}", ssid),
        )?),
        _ => None,
    };

    let config = SessionConfig::new().with_timeout(timeout);
    let mut session = Session::open(target, config)
        .await
        .map_err(|e| format!("Could not connect to host {}: {}", target, e))?;
    debug!(addr = %session.target(), "connected");

    let result = run_device_command(&mut session, command, wifi_password).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "close failed");
    }
    result
}

async fn run_device_command(
    session: &mut Session,
    command: DeviceCommand,
    wifi_password: Option<String>,
) -> Result<(), String> {
    match command {
        DeviceCommand::Status => print_status(session).await,

        DeviceCommand::On { sockets } => {
            set_power(session, true, sockets).await?;
            print_status(session).await
        }

        DeviceCommand::Off { sockets } => {
            set_power(session, false, sockets).await?;
            print_status(session).await
        }

        DeviceCommand::Time => print_time(session).await,

        DeviceCommand::SetNow => {
            let now = Local::now().naive_local();
            // Keep whatever zone the device already has.
            let zone = match session.get_timezone().await {
                Ok(tz) => tz.index,
                Err(e) => {
                    debug!(error = %e, "zone index unavailable");
                    None
                }
            };
            session
                .set_time(now, zone)
                .await
                .map_err(|e| format!("unable to set current time: {}", e))?;
            print_time(session).await
        }

        DeviceCommand::Alias { name } => {
            session
                .set_alias(&name)
                .await
                .map_err(|e| format!("unable to set device alias: {}", e))?;
            print_status(session).await
        }

        DeviceCommand::FactoryReset => {
            let status = session
                .get_status()
                .await
                .map_err(|e| format!("unable to get status: {}", e))?;
            session
                .factory_reset()
                .await
                .map_err(|e| format!("failed to factory reset device: {}", e))?;
            print_json(&json!({
                "reset": true,
                "setup_ssid": setup_ssid(status.mac_address()),
                "alias": status.alias,
            }))
        }

        DeviceCommand::Wifi { ssid, .. } => {
            let password = wifi_password.unwrap_or_default();
            session
                .set_wifi(&ssid, &password)
                .await
                .map_err(|e| format!("unable to set WiFi to {:?}: {}", ssid, e))?;
            print_json(&json!({ "ssid": ssid, "sent": true }))?;
            print_wifi_join_success(&ssid);
            Ok(())
        }

        DeviceCommand::Wlanscan => {
            let networks = session
                .list_wifi()
                .await
                .map_err(|e| format!("WiFi scan failed: {}", e))?;
            print_json(&networks)
        }

        DeviceCommand::Energy { poll } => {
            let poll = poll_interval(poll);
            loop {
                let reading = session
                    .emeter_read()
                    .await
                    .map_err(|e| format!("failed to read energy meter: {}", e))?;
                print_json(&energy_summary(&reading))?;
                match poll {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => return Ok(()),
                }
            }
        }

        DeviceCommand::EnergyReset => {
            session
                .emeter_reset()
                .await
                .map_err(|e| format!("failed to reset energy meter: {}", e))?;
            print_json(&json!({ "emeter_reset": true }))
        }

        DeviceCommand::Reboot => {
            session
                .reboot()
                .await
                .map_err(|e| format!("failed to reboot device: {}", e))?;
            print_json(&json!({ "reboot": true }))
        }

        DeviceCommand::LedOn => set_led(session, true).await,
        DeviceCommand::LedOff => set_led(session, false).await,
    }
}

async fn set_power(
    session: &mut Session,
    on: bool,
    sockets: Option<SocketList>,
) -> Result<(), String> {
    let state = if on { "on" } else { "off" };
    match sockets {
        Some(SocketList(indices)) => session
            .set_socket_relays(on, &indices)
            .await
            .map_err(|e| format!("failed to turn {} sockets {:?}: {}", state, indices, e)),
        None => session
            .set_relay(on)
            .await
            .map_err(|e| format!("failed to turn {} device: {}", state, e)),
    }
}

async fn set_led(session: &mut Session, on: bool) -> Result<(), String> {
    session
        .set_led(on)
        .await
        .map_err(|e| format!("failed to set LED: {}", e))?;
    print_json(&json!({ "led_on": on }))
}

async fn print_status(session: &mut Session) -> Result<(), String> {
    let status = session
        .get_status()
        .await
        .map_err(|e| format!("failed to get status: {}", e))?;
    print_json(&status)
}

async fn print_time(session: &mut Session) -> Result<(), String> {
    let time = session
        .get_time()
        .await
        .map_err(|e| format!("unable to get time: {}", e))?;
    print_json(&json!({ "time": time }))
}

/// Handle the version command.
pub fn handle_version() {
    println!("plinky {}", env!("CARGO_PKG_VERSION"));
    println!("plinky-core {}", plinky_core::VERSION);
}
