//! Typed response tree received from devices.
//!
//! [`Response`] mirrors the namespaces of [`Command`](crate::command::Command).
//! A namespace or field being present is the only signal that the device
//! answered that sub-request, so everything is optional.
//!
//! # Example
//!
//! ```
//! use plinky_core::response::Response;
//!
//! let json = r#"{"system":{"get_sysinfo":{"alias":"Living Room","model":"HS103"}}}"#;
//! let response: Response = serde_json::from_str(json).unwrap();
//! let info = response.system.unwrap().get_sysinfo.unwrap();
//! assert_eq!(info.alias, "Living Room");
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Inbound message envelope.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netif: Option<NetifResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emeter: Option<EmeterResponse>,
}

/// Replies under the `system` namespace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_sysinfo: Option<Sysinfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_relay_state: Option<Ack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_led_off: Option<Ack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_dev_alias: Option<Ack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reboot: Option<Ack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<Ack>,
}

/// Acknowledgement of a set-style request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Ack {
    /// Error code (0 = success).
    #[serde(default)]
    pub err_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl Ack {
    /// Converts a non-zero `err_code` into [`Error::DeviceReported`].
    pub fn check(&self) -> Result<(), Error> {
        device_result(self.err_code, self.err_msg.as_deref())
    }
}

/// Checks an acknowledgement that may be absent; absence is success.
pub(crate) fn check_ack(ack: Option<&Ack>) -> Result<(), Error> {
    ack.map_or(Ok(()), Ack::check)
}

pub(crate) fn device_result(err_code: i32, err_msg: Option<&str>) -> Result<(), Error> {
    if err_code == 0 {
        Ok(())
    } else {
        Err(Error::DeviceReported {
            code: err_code,
            message: err_msg.map(str::to_owned),
        })
    }
}

/// Device status snapshot.
///
/// For power strips the wire value of `relay_state` is not meaningful;
/// [`DeviceExt::get_status`](crate::DeviceExt::get_status) replaces it with
/// the OR of the children's states.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Sysinfo {
    /// Software/firmware version.
    #[serde(default)]
    pub sw_ver: String,

    /// Hardware version.
    #[serde(default)]
    pub hw_ver: String,

    /// Device type identifier (e.g. "IOT.SMARTPLUGSWITCH").
    #[serde(default, rename = "type")]
    pub device_type: String,

    /// Device type on older firmware, which reports `mic_type` instead.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mic_type: String,

    /// Device model (e.g. "HS103(US)", "EP40(US)").
    #[serde(default)]
    pub model: String,

    /// MAC address. Some devices report `mic_mac` instead.
    #[serde(default)]
    pub mac: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mic_mac: String,

    /// Product name.
    #[serde(default)]
    pub dev_name: String,

    /// User-assigned name.
    #[serde(default)]
    pub alias: String,

    /// Relay state (1 = on, 0 = off).
    #[serde(default)]
    pub relay_state: u8,

    /// Seconds since the relay was turned on (0 if off).
    #[serde(default)]
    pub on_time: u64,

    #[serde(default)]
    pub active_mode: String,

    /// Feature flags, e.g. "TIM:ENE" for timer + energy meter.
    #[serde(default)]
    pub feature: String,

    /// Whether a firmware update is in progress.
    #[serde(default)]
    pub updating: u8,

    #[serde(default)]
    pub icon_hash: String,

    /// WiFi signal strength in dBm (closer to 0 = stronger).
    #[serde(default)]
    pub rssi: i32,

    /// LED indicator (1 = off).
    #[serde(default)]
    pub led_off: u8,

    #[serde(default)]
    pub longitude_i: i64,

    #[serde(default)]
    pub latitude_i: i64,

    #[serde(default, rename = "hwId")]
    pub hw_id: String,

    #[serde(default, rename = "fwId")]
    pub fw_id: String,

    /// Unique device identifier.
    #[serde(default, rename = "deviceId")]
    pub device_id: String,

    #[serde(default, rename = "oemId")]
    pub oem_id: String,

    #[serde(default)]
    pub next_action: Option<NextAction>,

    #[serde(default)]
    pub ntc_state: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obd_src: Option<String>,

    /// Sockets of a power strip; empty for single-relay devices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Child>,

    /// Error code from the response (0 = success).
    #[serde(default)]
    pub err_code: i32,
}

impl Sysinfo {
    /// Returns the MAC address, preferring `mac` over `mic_mac`.
    pub fn mac_address(&self) -> &str {
        if self.mac.is_empty() {
            &self.mic_mac
        } else {
            &self.mac
        }
    }

    /// Returns true if the relay is on.
    pub fn is_on(&self) -> bool {
        self.relay_state != 0
    }

    /// Returns true if the LED is off.
    pub fn is_led_off(&self) -> bool {
        self.led_off == 1
    }

    /// Returns true if this is a power strip with multiple sockets.
    pub fn is_power_strip(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns true if the feature string advertises an energy meter.
    pub fn has_emeter(&self) -> bool {
        self.feature.split(':').any(|f| f == "ENE")
    }

    /// Replaces `relay_state` with the OR of the children's states.
    ///
    /// Multi-socket devices report a top-level relay state that is always 0
    /// and ignores writes. Single-relay devices are left untouched.
    pub fn alias_relay_state(&mut self) {
        if self.children.is_empty() {
            return;
        }
        self.relay_state = self.children.iter().any(Child::is_on).into();
    }
}

/// One socket of a power strip.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Child {
    /// Device-assigned id, needed to target commands at this socket.
    #[serde(default)]
    pub id: String,

    /// Relay state (1 = on, 0 = off).
    #[serde(default)]
    pub state: u8,

    #[serde(default)]
    pub alias: String,

    /// Seconds since this socket was turned on.
    #[serde(default)]
    pub on_time: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

impl Child {
    /// Returns true if this socket is on.
    pub fn is_on(&self) -> bool {
        self.state != 0
    }
}

/// Next scheduled action; `type` is -1 when nothing is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NextAction {
    #[serde(default, rename = "type")]
    pub action_type: i32,
}

/// Replies under the `time` namespace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_time: Option<TimeZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_timezone: Option<TimeZone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_timezone: Option<Ack>,
}

/// Device-local calendar time with one-second resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeZone {
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub month: u32,
    #[serde(default)]
    pub mday: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub sec: u32,
    /// Opaque device zone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u16>,
    #[serde(default)]
    pub err_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl TimeZone {
    /// Converts the calendar fields into a `NaiveDateTime`.
    ///
    /// Returns `None` if the fields do not form a valid date and time.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.mday)?.and_hms_opt(
            self.hour,
            self.min,
            self.sec,
        )
    }
}

/// Replies under the `netif` namespace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NetifResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_scaninfo: Option<ScanInfoResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_stainfo: Option<Ack>,
}

/// Result of a WiFi access point scan.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScanInfoResponse {
    #[serde(default)]
    pub ap_list: Vec<AccessPoint>,
    #[serde(default)]
    pub wpa3_support: u8,
    #[serde(default)]
    pub err_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

/// A visible WiFi access point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessPoint {
    /// Network name.
    #[serde(default)]
    pub ssid: String,
    /// Security type, see [`KeyType`](crate::KeyType).
    #[serde(default)]
    pub key_type: u8,
    /// Signal strength in dBm (more negative = weaker).
    #[serde(default)]
    pub rssi: i32,
}

/// Replies under the `emeter` namespace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmeterResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_realtime: Option<EnergyReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erase_emeter_stat: Option<Ack>,
}

/// Energy meter reading.
///
/// Different device models report values in different units:
/// - Some use `voltage_mv`, `current_ma`, `power_mw`, `total_wh`
/// - Others use `voltage`, `current`, `power`, `total` (V, A, W, kWh)
///
/// The accessors normalize to volts, amps, watts and watt-hours.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnergyReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_mv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_wh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    /// Error code (0 = success). Non-zero means the device answered but
    /// could not take a reading.
    #[serde(default)]
    pub err_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl EnergyReading {
    /// Returns the voltage in volts.
    pub fn voltage_v(&self) -> Option<f64> {
        self.voltage_mv.map(|mv| mv / 1000.0).or(self.voltage)
    }

    /// Returns the current in amps.
    pub fn current_a(&self) -> Option<f64> {
        self.current_ma.map(|ma| ma / 1000.0).or(self.current)
    }

    /// Returns the power in watts.
    pub fn power_w(&self) -> Option<f64> {
        self.power_mw.map(|mw| mw / 1000.0).or(self.power)
    }

    /// Returns the cumulative energy in watt-hours.
    pub fn total_wh(&self) -> Option<f64> {
        self.total_wh.or(self.total.map(|kwh| kwh * 1000.0))
    }

    /// Returns true if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.err_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sysinfo_basic() {
        let json = r#"{
            "system": {
                "get_sysinfo": {
                    "sw_ver": "1.0.4 Build 191111 Rel.143500",
                    "hw_ver": "4.0",
                    "type": "IOT.SMARTPLUGSWITCH",
                    "model": "HS103(US)",
                    "mac": "AA:BB:CC:DD:EE:FF",
                    "alias": "Living Room",
                    "relay_state": 1,
                    "on_time": 3600,
                    "feature": "TIM",
                    "rssi": -50,
                    "led_off": 0,
                    "deviceId": "abc123",
                    "next_action": {"type": -1},
                    "err_code": 0
                }
            }
        }"#;

        let response: Response = serde_json::from_str(json).unwrap();
        let info = response.system.unwrap().get_sysinfo.unwrap();

        assert_eq!(info.alias, "Living Room");
        assert_eq!(info.model, "HS103(US)");
        assert_eq!(info.device_type, "IOT.SMARTPLUGSWITCH");
        assert!(info.is_on());
        assert!(!info.is_led_off());
        assert!(!info.has_emeter());
        assert_eq!(info.rssi, -50);
        assert_eq!(info.on_time, 3600);
        assert_eq!(info.next_action, Some(NextAction { action_type: -1 }));
        assert!(response.time.is_none());
    }

    #[test]
    fn test_parse_sysinfo_with_children() {
        let json = r#"{
            "system": {
                "get_sysinfo": {
                    "alias": "Power Strip",
                    "model": "EP40(US)",
                    "relay_state": 0,
                    "children": [
                        {"id": "plug0", "alias": "Lamp", "state": 1, "on_time": 100},
                        {"id": "plug1", "alias": "Fan", "state": 0, "on_time": 0}
                    ]
                }
            }
        }"#;

        let response: Response = serde_json::from_str(json).unwrap();
        let info = response.system.unwrap().get_sysinfo.unwrap();

        assert!(info.is_power_strip());
        assert_eq!(info.children.len(), 2);
        assert!(info.children[0].is_on());
        assert!(!info.children[1].is_on());
        assert_eq!(info.children[0].alias, "Lamp");
    }

    #[test]
    fn test_alias_relay_state_ors_children() {
        let mut info = Sysinfo {
            relay_state: 0,
            children: vec![
                Child {
                    id: "A".into(),
                    state: 0,
                    ..Default::default()
                },
                Child {
                    id: "B".into(),
                    state: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        info.alias_relay_state();
        assert_eq!(info.relay_state, 1);

        info.children[1].state = 0;
        info.alias_relay_state();
        assert_eq!(info.relay_state, 0);
    }

    #[test]
    fn test_alias_relay_state_single_relay_passthrough() {
        let mut info = Sysinfo {
            relay_state: 1,
            ..Default::default()
        };
        info.alias_relay_state();
        assert_eq!(info.relay_state, 1);
    }

    #[test]
    fn test_parse_sysinfo_mic_mac() {
        let json = r#"{"alias":"Test","model":"KP115","mac":"","mic_mac":"11:22:33:44:55:66","feature":"TIM:ENE"}"#;
        let info: Sysinfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.mac_address(), "11:22:33:44:55:66");
        assert!(info.has_emeter());
    }

    #[test]
    fn test_parse_energy_milliunits() {
        let json = r#"{
            "emeter": {
                "get_realtime": {
                    "voltage_mv": 121000,
                    "current_ma": 500,
                    "power_mw": 60000,
                    "total_wh": 1234,
                    "err_code": 0
                }
            }
        }"#;

        let response: Response = serde_json::from_str(json).unwrap();
        let reading = response.emeter.unwrap().get_realtime.unwrap();

        assert!((reading.voltage_v().unwrap() - 121.0).abs() < 0.001);
        assert!((reading.current_a().unwrap() - 0.5).abs() < 0.001);
        assert!((reading.power_w().unwrap() - 60.0).abs() < 0.001);
        assert_eq!(reading.total_wh(), Some(1234.0));
        assert!(reading.is_success());
    }

    #[test]
    fn test_parse_energy_units() {
        let json = r#"{"voltage":121.5,"current":0.5,"power":60.75,"total":1.5,"err_code":0}"#;
        let reading: EnergyReading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.voltage_v(), Some(121.5));
        assert_eq!(reading.current_a(), Some(0.5));
        assert_eq!(reading.power_w(), Some(60.75));
        assert_eq!(reading.total_wh(), Some(1500.0));
    }

    #[test]
    fn test_parse_energy_unsupported() {
        let json = r#"{"emeter":{"get_realtime":{"err_code":-1,"err_msg":"module not support"}}}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let reading = response.emeter.unwrap().get_realtime.unwrap();
        assert!(!reading.is_success());
        assert_eq!(reading.err_msg.as_deref(), Some("module not support"));
    }

    #[test]
    fn test_timezone_to_datetime() {
        let tz = TimeZone {
            year: 2024,
            month: 2,
            mday: 29,
            hour: 23,
            min: 59,
            sec: 58,
            ..Default::default()
        };
        let dt = tz.to_datetime().unwrap();
        assert_eq!(dt.to_string(), "2024-02-29 23:59:58");

        let bad = TimeZone {
            month: 13,
            ..tz
        };
        assert!(bad.to_datetime().is_none());
    }

    #[test]
    fn test_parse_scaninfo() {
        let json = r#"{"netif":{"get_scaninfo":{"ap_list":[{"ssid":"home","key_type":3,"rssi":-42},{"ssid":"guest","key_type":0,"rssi":-80}],"wpa3_support":0,"err_code":0}}}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let scan = response.netif.unwrap().get_scaninfo.unwrap();
        assert_eq!(scan.ap_list.len(), 2);
        assert_eq!(scan.ap_list[1].ssid, "guest");
        assert_eq!(scan.ap_list[1].rssi, -80);
    }

    #[test]
    fn test_ack_check() {
        assert!(Ack::default().check().is_ok());
        let failed = Ack {
            err_code: -3,
            err_msg: Some("invalid argument".into()),
        };
        assert!(matches!(
            failed.check(),
            Err(Error::DeviceReported { code: -3, .. })
        ));
        assert!(check_ack(None).is_ok());
    }

    #[test]
    fn test_unknown_namespace_ignored() {
        let json = r#"{"cnCloud":{"get_info":{"err_code":0}},"system":{"set_relay_state":{"err_code":0}}}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        assert!(response.system.unwrap().set_relay_state.is_some());
    }
}
