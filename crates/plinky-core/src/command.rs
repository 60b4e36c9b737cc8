//! Typed command tree sent to devices.
//!
//! A [`Command`] has one optional branch per namespace (`system`, `time`,
//! `netif`, `emeter`) plus an optional `context` that targets child sockets
//! of a power strip. Every field is an `Option`; `None` is left out of the
//! JSON entirely, so only the sub-requests that were asked for reach the
//! device.
//!
//! The one exception is the [`Null`] sentinel. Some "get" requests take no
//! parameters and must be sent as a literal `null`, e.g.
//! `{"time":{"get_time":null}}`.
//!
//! # Example
//!
//! ```
//! use plinky_core::command::Command;
//!
//! let json = serde_json::to_string(&Command::relay(true)).unwrap();
//! assert_eq!(json, r#"{"system":{"set_relay_state":{"state":1}}}"#);
//!
//! let json = serde_json::to_string(&Command::get_time()).unwrap();
//! assert_eq!(json, r#"{"time":{"get_time":null}}"#);
//! ```

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::KeyType;

/// Parameterless "get" marker, serialized as literal `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Null;

/// Empty parameter object, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Empty {}

/// Outbound message envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Command {
    /// Child sockets this command applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    /// `system` namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemCommand>,
    /// `time` namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeCommand>,
    /// `netif` (network interface) namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netif: Option<NetifCommand>,
    /// `emeter` (energy meter) namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emeter: Option<EmeterCommand>,
}

/// Selects the child sockets of a power strip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    /// Device-assigned child ids, as reported in sysinfo `children`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
}

/// Requests in the `system` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemCommand {
    /// Query device info and relay state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_sysinfo: Option<Empty>,
    /// Restart the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reboot: Option<Delay>,
    /// Restore factory defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset: Option<Delay>,
    /// Switch the relay, or the sockets named in `context`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_relay_state: Option<RelayState>,
    /// Switch the status LED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_led_off: Option<LedOff>,
    /// Rename the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_dev_alias: Option<Alias>,
}

/// Seconds to wait before a reboot or reset takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delay {
    /// Delay in seconds.
    pub delay: u32,
}

/// Relay state, 1 = on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayState {
    /// Target state, 0 or 1.
    pub state: u8,
}

/// LED indicator flag, 1 = LED off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedOff {
    /// 1 turns the LED off, 0 turns it on.
    pub off: u8,
}

/// Payload of `system.set_dev_alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    /// New device name.
    pub alias: String,
}

/// Requests in the `time` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeCommand {
    /// Read the device clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_time: Option<Null>,
    /// Read the zone index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_timezone: Option<Null>,
    /// Set the device clock and zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_timezone: Option<SetTimezone>,
}

/// Calendar fields for `time.set_timezone`.
///
/// `index` is the device's internal zone number. Its mapping is not
/// documented, so it is passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetTimezone {
    /// Four-digit year.
    pub year: i32,
    /// Month, 1 to 12.
    pub month: u32,
    /// Day of the month, 1 to 31.
    pub mday: u32,
    /// Hour, 0 to 23.
    pub hour: u32,
    /// Minute, 0 to 59.
    pub min: u32,
    /// Second, 0 to 59.
    pub sec: u32,
    /// Zone index; omitted when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u16>,
}

impl SetTimezone {
    /// Builds the calendar fields from a local time, dropping sub-seconds.
    pub fn from_datetime(at: NaiveDateTime, index: Option<u16>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            mday: at.day(),
            hour: at.hour(),
            min: at.minute(),
            sec: at.second(),
            index,
        }
    }
}

/// Requests in the `netif` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetifCommand {
    /// Join a WiFi network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_stainfo: Option<StaInfo>,
    /// List visible access points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_scaninfo: Option<ScanInfo>,
}

/// Station credentials for `netif.set_stainfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaInfo {
    /// Network name.
    pub ssid: String,
    /// Network password.
    pub password: String,
    /// Security type, see [`KeyType`].
    pub key_type: u8,
}

/// Parameters for `netif.get_scaninfo`; `refresh: 1` forces a fresh scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanInfo {
    /// Set to 1 to rescan instead of returning cached results.
    pub refresh: u8,
}

/// Requests in the `emeter` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmeterCommand {
    /// Read instantaneous voltage, current and power.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_realtime: Option<Empty>,
    /// Clear accumulated energy statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erase_emeter_stat: Option<Empty>,
}

impl Command {
    fn system(system: SystemCommand) -> Self {
        Self {
            system: Some(system),
            ..Default::default()
        }
    }

    fn time(time: TimeCommand) -> Self {
        Self {
            time: Some(time),
            ..Default::default()
        }
    }

    fn netif(netif: NetifCommand) -> Self {
        Self {
            netif: Some(netif),
            ..Default::default()
        }
    }

    fn emeter(emeter: EmeterCommand) -> Self {
        Self {
            emeter: Some(emeter),
            ..Default::default()
        }
    }

    /// `{"system":{"get_sysinfo":{}}}`
    pub fn get_sysinfo() -> Self {
        Self::system(SystemCommand {
            get_sysinfo: Some(Empty {}),
            ..Default::default()
        })
    }

    /// `{"system":{"set_relay_state":{"state":0|1}}}`
    pub fn relay(on: bool) -> Self {
        Self::system(SystemCommand {
            set_relay_state: Some(RelayState { state: on.into() }),
            ..Default::default()
        })
    }

    /// `{"system":{"set_led_off":{"off":0|1}}}`
    pub fn led(on: bool) -> Self {
        Self::system(SystemCommand {
            set_led_off: Some(LedOff {
                off: (!on).into(),
            }),
            ..Default::default()
        })
    }

    /// `{"system":{"set_dev_alias":{"alias":...}}}`
    pub fn set_alias(alias: impl Into<String>) -> Self {
        Self::system(SystemCommand {
            set_dev_alias: Some(Alias {
                alias: alias.into(),
            }),
            ..Default::default()
        })
    }

    /// `{"system":{"reboot":{"delay":1}}}`
    pub fn reboot() -> Self {
        Self::system(SystemCommand {
            reboot: Some(Delay { delay: 1 }),
            ..Default::default()
        })
    }

    /// `{"system":{"reset":{"delay":1}}}`
    ///
    /// **Warning:** this erases all settings, including WiFi.
    pub fn factory_reset() -> Self {
        Self::system(SystemCommand {
            reset: Some(Delay { delay: 1 }),
            ..Default::default()
        })
    }

    /// `{"time":{"get_time":null}}`
    pub fn get_time() -> Self {
        Self::time(TimeCommand {
            get_time: Some(Null),
            ..Default::default()
        })
    }

    /// `{"time":{"get_timezone":null}}`
    pub fn get_timezone() -> Self {
        Self::time(TimeCommand {
            get_timezone: Some(Null),
            ..Default::default()
        })
    }

    /// `{"time":{"set_timezone":{...}}}`
    pub fn set_time(at: NaiveDateTime, zone_index: Option<u16>) -> Self {
        Self::time(TimeCommand {
            set_timezone: Some(SetTimezone::from_datetime(at, zone_index)),
            ..Default::default()
        })
    }

    /// `{"netif":{"set_stainfo":{"ssid":...,"password":...,"key_type":3}}}`
    pub fn set_wifi(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self::netif(NetifCommand {
            set_stainfo: Some(StaInfo {
                ssid: ssid.into(),
                password: password.into(),
                key_type: KeyType::Wpa2.into(),
            }),
            ..Default::default()
        })
    }

    /// `{"netif":{"get_scaninfo":{"refresh":1}}}`
    pub fn scan_wifi() -> Self {
        Self::netif(NetifCommand {
            get_scaninfo: Some(ScanInfo { refresh: 1 }),
            ..Default::default()
        })
    }

    /// `{"emeter":{"get_realtime":{}}}`
    pub fn emeter_realtime() -> Self {
        Self::emeter(EmeterCommand {
            get_realtime: Some(Empty {}),
            ..Default::default()
        })
    }

    /// `{"emeter":{"erase_emeter_stat":{}}}`
    pub fn emeter_erase() -> Self {
        Self::emeter(EmeterCommand {
            erase_emeter_stat: Some(Empty {}),
            ..Default::default()
        })
    }

    /// Scopes this command to the given child sockets.
    ///
    /// ```
    /// use plinky_core::command::Command;
    ///
    /// let cmd = Command::relay(false).for_children(["8006...01"]);
    /// let json = serde_json::to_string(&cmd).unwrap();
    /// assert_eq!(
    ///     json,
    ///     r#"{"context":{"child_ids":["8006...01"]},"system":{"set_relay_state":{"state":0}}}"#
    /// );
    /// ```
    pub fn for_children<I, S>(mut self, child_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = Some(Context {
            child_ids: child_ids.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Serializes to compact JSON, the form sent on the wire.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
