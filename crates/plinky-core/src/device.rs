//! Device operations.
//!
//! [`DeviceExt`] is implemented for every [`Transport`], so the same
//! operations run over a TCP [`Session`](crate::Session) or any other
//! exchange-capable connection. Each operation is exactly one exchange,
//! except the relay operations which read status first. Nothing is retried.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, SubsecRound};
use tracing::debug;

use crate::{
    command::Command,
    control::{all_sockets, plan_socket_writes, relay_needs_write},
    error::Error,
    response::{AccessPoint, EnergyReading, Sysinfo, TimeZone, check_ack, device_result},
    transport::Transport,
};

/// Typed device operations over a [`Transport`].
///
/// # Example
///
/// ```no_run
/// use plinky_core::{DeviceExt, Session, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), plinky_core::Error> {
///     let mut session = Session::open("192.168.1.50", SessionConfig::new()).await?;
///
///     // Turn sockets 0 and 2 of a power strip off, leaving the rest alone.
///     session.set_socket_relays(false, &[0, 2]).await?;
///
///     match session.emeter_read().await {
///         Ok(reading) => println!("{:?} W", reading.power_w()),
///         Err(e) if e.is_unsupported() => println!("no energy meter"),
///         Err(e) => return Err(e),
///     }
///     session.close().await
/// }
/// ```
#[async_trait]
pub trait DeviceExt: Transport {
    /// Reads the device status.
    ///
    /// For power strips `relay_state` is replaced with the OR of the
    /// children's states.
    async fn get_status(&mut self) -> Result<Sysinfo, Error>;

    /// Drives the device to `on`, writing only if the state differs.
    ///
    /// On a power strip this applies to every socket, as
    /// [`set_socket_relays`](Self::set_socket_relays) with all indices.
    async fn set_relay(&mut self, on: bool) -> Result<(), Error>;

    /// Drives the given sockets of a power strip to `on`.
    ///
    /// Indices are validated before any write. Only sockets whose state
    /// differs are written, one request per socket. The first failed write
    /// aborts the rest; earlier writes stay applied.
    async fn set_socket_relays(&mut self, on: bool, sockets: &[usize]) -> Result<(), Error>;

    /// Renames the device.
    async fn set_alias(&mut self, alias: &str) -> Result<(), Error>;

    /// Reads the device clock.
    ///
    /// When the reply has no usable time the error is
    /// [`Error::TimeQueryFailed`], carrying the local clock as a fallback.
    async fn get_time(&mut self) -> Result<NaiveDateTime, Error>;

    /// Reads the device clock together with its opaque zone index.
    async fn get_timezone(&mut self) -> Result<TimeZone, Error>;

    /// Sets the device clock to `at`, truncated to whole seconds.
    ///
    /// `zone_index` is passed through unchanged; `None` leaves it out of the
    /// request.
    async fn set_time(&mut self, at: NaiveDateTime, zone_index: Option<u16>)
    -> Result<(), Error>;

    /// Erases all settings, including WiFi. The device restarts unconfigured.
    async fn factory_reset(&mut self) -> Result<(), Error>;

    /// Restarts the device after a one second delay.
    async fn reboot(&mut self) -> Result<(), Error>;

    /// Turns the indicator LED on or off.
    async fn set_led(&mut self, on: bool) -> Result<(), Error>;

    /// Joins a WPA2 network. The device drops off the current network.
    async fn set_wifi(&mut self, ssid: &str, password: &str) -> Result<(), Error>;

    /// Scans for visible access points.
    async fn list_wifi(&mut self) -> Result<Vec<AccessPoint>, Error>;

    /// Reads the energy meter.
    async fn emeter_read(&mut self) -> Result<EnergyReading, Error>;

    /// Erases the energy meter statistics.
    async fn emeter_reset(&mut self) -> Result<(), Error>;
}

#[async_trait]
impl<T: Transport + ?Sized> DeviceExt for T {
    async fn get_status(&mut self) -> Result<Sysinfo, Error> {
        let response = self.exchange(&Command::get_sysinfo()).await?;
        let mut status = response
            .system
            .and_then(|s| s.get_sysinfo)
            .ok_or(Error::StatusMissing)?;
        status.alias_relay_state();
        Ok(status)
    }

    async fn set_relay(&mut self, on: bool) -> Result<(), Error> {
        let status = self.get_status().await?;
        if status.is_power_strip() {
            let sockets = all_sockets(&status);
            return write_sockets(self, &status, on, &sockets).await;
        }

        if !relay_needs_write(&status, on) {
            debug!(addr = %self.target(), on, "relay already in requested state");
            return Ok(());
        }

        let response = self.exchange(&Command::relay(on)).await?;
        check_ack(
            response
                .system
                .as_ref()
                .and_then(|s| s.set_relay_state.as_ref()),
        )
    }

    async fn set_socket_relays(&mut self, on: bool, sockets: &[usize]) -> Result<(), Error> {
        let status = self.get_status().await?;
        write_sockets(self, &status, on, sockets).await
    }

    async fn set_alias(&mut self, alias: &str) -> Result<(), Error> {
        let response = self.exchange(&Command::set_alias(alias)).await?;
        check_ack(
            response
                .system
                .as_ref()
                .and_then(|s| s.set_dev_alias.as_ref()),
        )
    }

    async fn get_time(&mut self) -> Result<NaiveDateTime, Error> {
        let response = self.exchange(&Command::get_time()).await?;
        response
            .time
            .and_then(|t| t.get_time)
            .filter(|tz| tz.err_code == 0)
            .and_then(|tz| tz.to_datetime())
            .ok_or_else(time_query_failed)
    }

    async fn get_timezone(&mut self) -> Result<TimeZone, Error> {
        let response = self.exchange(&Command::get_timezone()).await?;
        let zone = response
            .time
            .and_then(|t| t.get_timezone)
            .ok_or_else(time_query_failed)?;
        device_result(zone.err_code, zone.err_msg.as_deref())?;
        Ok(zone)
    }

    async fn set_time(
        &mut self,
        at: NaiveDateTime,
        zone_index: Option<u16>,
    ) -> Result<(), Error> {
        debug!(addr = %self.target(), %at, ?zone_index, "setting device time");
        let response = self.exchange(&Command::set_time(at, zone_index)).await?;
        check_ack(response.time.as_ref().and_then(|t| t.set_timezone.as_ref()))
    }

    async fn factory_reset(&mut self) -> Result<(), Error> {
        debug!(addr = %self.target(), "factory reset");
        let response = self.exchange(&Command::factory_reset()).await?;
        check_ack(response.system.as_ref().and_then(|s| s.reset.as_ref()))
    }

    async fn reboot(&mut self) -> Result<(), Error> {
        let response = self.exchange(&Command::reboot()).await?;
        check_ack(response.system.as_ref().and_then(|s| s.reboot.as_ref()))
    }

    async fn set_led(&mut self, on: bool) -> Result<(), Error> {
        let response = self.exchange(&Command::led(on)).await?;
        check_ack(response.system.as_ref().and_then(|s| s.set_led_off.as_ref()))
    }

    async fn set_wifi(&mut self, ssid: &str, password: &str) -> Result<(), Error> {
        debug!(addr = %self.target(), ssid, "joining network");
        let response = self.exchange(&Command::set_wifi(ssid, password)).await?;
        check_ack(response.netif.as_ref().and_then(|n| n.set_stainfo.as_ref()))
    }

    async fn list_wifi(&mut self) -> Result<Vec<AccessPoint>, Error> {
        let response = self.exchange(&Command::scan_wifi()).await?;
        let scan = response
            .netif
            .and_then(|n| n.get_scaninfo)
            .ok_or(Error::ScanUnavailable)?;
        device_result(scan.err_code, scan.err_msg.as_deref())?;
        debug!(addr = %self.target(), count = scan.ap_list.len(), "access points");
        Ok(scan.ap_list)
    }

    async fn emeter_read(&mut self) -> Result<EnergyReading, Error> {
        let response = self.exchange(&Command::emeter_realtime()).await?;
        let reading = response
            .emeter
            .and_then(|e| e.get_realtime)
            .ok_or(Error::NoEnergyMeter)?;
        device_result(reading.err_code, reading.err_msg.as_deref())?;
        Ok(reading)
    }

    async fn emeter_reset(&mut self) -> Result<(), Error> {
        let response = self.exchange(&Command::emeter_erase()).await?;
        let ack = response
            .emeter
            .and_then(|e| e.erase_emeter_stat)
            .ok_or(Error::NoEnergyMeter)?;
        ack.check()
    }
}

/// Applies the socket write plan for `status`, one exchange per socket.
async fn write_sockets<T: Transport + ?Sized>(
    transport: &mut T,
    status: &Sysinfo,
    on: bool,
    sockets: &[usize],
) -> Result<(), Error> {
    let plan = plan_socket_writes(status, on, sockets)?;
    debug!(
        addr = %transport.target(),
        on,
        requested = sockets.len(),
        writes = plan.len(),
        "socket relay plan"
    );

    for child_id in plan {
        let command = Command::relay(on).for_children([child_id]);
        let response = transport.exchange(&command).await?;
        check_ack(
            response
                .system
                .as_ref()
                .and_then(|s| s.set_relay_state.as_ref()),
        )?;
    }
    Ok(())
}

fn time_query_failed() -> Error {
    Error::TimeQueryFailed {
        fallback: Local::now().naive_local().trunc_subsecs(0),
    }
}
