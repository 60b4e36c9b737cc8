use std::{collections::HashSet, time::Duration};

use clap::{Parser, Subcommand};
use plinky_core::DEFAULT_PORT;

/// Parses a timeout given in seconds, fractions allowed.
pub fn parse_duration(arg: &str) -> Result<Duration, String> {
    let seconds: f64 = arg
        .parse()
        .map_err(|e| format!("invalid duration {arg:?}: {e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {arg:?}: {e}"))
}

/// Comma separated socket indices, e.g. `0,2,3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketList(pub Vec<usize>);

/// Parses a socket list, rejecting unparsable and repeated indices.
pub fn parse_sockets(arg: &str) -> Result<SocketList, String> {
    let mut seen = HashSet::new();
    let mut indices = Vec::new();
    for part in arg.split(',') {
        let index: usize = part
            .trim()
            .parse()
            .map_err(|e| format!("unrecognized socket index={part:?} from {arg:?}: {e}"))?;
        if !seen.insert(index) {
            return Err(format!("duplicate socket {index} in {arg:?}"));
        }
        indices.push(index);
    }
    Ok(SocketList(indices))
}

/// Local-network client for smart power relays
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Probe every host of an IPv4 network and report device status
    Scan {
        /// Network in CIDR notation, e.g. 192.168.1.0/24
        network: String,

        /// Per-host timeout in seconds
        #[arg(long, value_parser = parse_duration, default_value = "2", env = "PLINKY_TIMEOUT")]
        timeout: Duration,

        /// Port to probe
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Maximum number of hosts probed at once (default: all)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show version information for CLI and core library
    Version,

    /// Send a command to a specific device
    Device {
        /// Target hostname or IP address, optionally with :port
        target: String,

        /// Timeout in seconds for connecting and for each exchange
        #[arg(long, value_parser = parse_duration, default_value = "2", env = "PLINKY_TIMEOUT")]
        timeout: Duration,

        #[command(subcommand)]
        command: DeviceCommand,
    },
}

/// Commands available for single device operations
#[derive(Subcommand)]
pub enum DeviceCommand {
    /// Get device status
    Status,
    /// Turn the relay on (all sockets unless --sockets is given)
    On {
        /// Comma separated socket indices of a power strip
        #[arg(long, value_parser = parse_sockets)]
        sockets: Option<SocketList>,
    },
    /// Turn the relay off (all sockets unless --sockets is given)
    Off {
        /// Comma separated socket indices of a power strip
        #[arg(long, value_parser = parse_sockets)]
        sockets: Option<SocketList>,
    },
    /// Get device time
    Time,
    /// Set device time from the local clock
    SetNow,
    /// Rename the device
    Alias {
        /// New device name
        name: String,
    },
    /// Reset the device to factory defaults
    FactoryReset,
    /// Connect the device to a WiFi network
    Wifi {
        /// Network name (SSID)
        ssid: String,

        /// Read password from stdin instead of prompting.
        /// The PLINKY_WIFI_PASSWORD environment variable takes precedence.
        #[arg(long)]
        password_stdin: bool,
    },
    /// Scan for wireless networks
    Wlanscan,
    /// Get real-time energy readings
    Energy {
        /// Keep reading at this interval in seconds; 0 reads once
        #[arg(long, value_parser = parse_duration)]
        poll: Option<Duration>,
    },
    /// Reset energy meter statistics
    EnergyReset,
    /// Reboot the device
    Reboot,
    /// Turn LED on
    LedOn,
    /// Turn LED off
    LedOff,
}
