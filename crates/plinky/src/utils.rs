use std::{io::IsTerminal, time::Duration};

use plinky_core::EnergyReading;
use serde::Serialize;
use serde_json::{Value, json};

/// Environment variable consulted before prompting for a WiFi password.
pub const WIFI_PASSWORD_ENV: &str = "PLINKY_WIFI_PASSWORD";

/// Read a password based on the provided options.
///
/// Order of precedence:
/// 1. The `PLINKY_WIFI_PASSWORD` environment variable
/// 2. A line from stdin if `password_stdin` is true
/// 3. An interactive prompt if stdin is a terminal
pub fn read_password(password_stdin: bool, prompt: &str) -> Result<String, String> {
    if let Ok(pass) = std::env::var(WIFI_PASSWORD_ENV) {
        return Ok(pass);
    }

    if password_stdin {
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| format!("Failed to read password from stdin: {}", e))?;
        return Ok(input.trim_end_matches(['\r', '\n']).to_string());
    }

    if std::io::stdin().is_terminal() {
        eprint!("{}: ", prompt);
        rpassword::read_password().map_err(|e| format!("Failed to read password: {}", e))
    } else {
        Err(format!(
            "No password provided. Set {} or use --password-stdin when piping input.",
            WIFI_PASSWORD_ENV
        ))
    }
}

/// Print a value as compact JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string(value).map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}

/// SSID a factory-reset device advertises, derived from its MAC address.
///
/// The suffix is the last two octets without the separator.
pub fn setup_ssid(mac: &str) -> Option<String> {
    let tail = mac.get(mac.len().checked_sub(5)?..)?;
    let (hi, lo) = tail.split_once(':')?;
    Some(format!("TP-Link_Smart Plug_{}{}", hi, lo))
}

/// Energy reading normalized to V, A, W and Wh.
pub fn energy_summary(reading: &EnergyReading) -> Value {
    json!({
        "voltage_v": reading.voltage_v(),
        "current_a": reading.current_a(),
        "power_w": reading.power_w(),
        "total_wh": reading.total_wh(),
    })
}

/// Interval between energy reads; zero or absent means read once.
pub fn poll_interval(poll: Option<Duration>) -> Option<Duration> {
    poll.filter(|interval| !interval.is_zero())
}

/// Print guidance message after the WiFi credentials were accepted.
pub fn print_wifi_join_success(ssid: &str) {
    eprintln!();
    eprintln!("WiFi credentials sent successfully!");
    eprintln!();
    eprintln!("The device will now leave its current network and join '{}'.", ssid);
    eprintln!("Reconnect to the device via the '{}' WiFi network.", ssid);
}
