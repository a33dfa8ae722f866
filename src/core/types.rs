use std::env;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::DEFAULT_WAKEUP_INTERVAL;

/// Station role, fixed for the lifetime of the process.
///
/// The role decides which header fields are present on the wire: frames
/// travelling bridge-to-node carry a wakeup-interval field that frames in
/// the other direction do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioRole {
    Bridge,
    Node,
}

impl RadioRole {
    /// Parses the role from its environment spelling ("BRIDGE"/"NODE")
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BRIDGE" => Some(RadioRole::Bridge),
            "NODE" => Some(RadioRole::Node),
            _ => None,
        }
    }
}

/// Application function codes carried in byte 4 of every frame.
///
/// The table is closed: exactly these ten variants exist and each is bound
/// to a unique byte value. Decoding any other byte is an explicit failure,
/// never a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCode {
    Beacon,
    WokenUp,
    Ack,
    IncludeReq,
    IncludeGrant,
    Reinclude,
    Config,
    SendBattery,
    Alert,
    BatteryStatus,
}

impl FunctionCode {
    /// Every variant, in table order.
    pub const ALL: [FunctionCode; 10] = [
        FunctionCode::Beacon,
        FunctionCode::WokenUp,
        FunctionCode::Ack,
        FunctionCode::IncludeReq,
        FunctionCode::IncludeGrant,
        FunctionCode::Reinclude,
        FunctionCode::Config,
        FunctionCode::SendBattery,
        FunctionCode::Alert,
        FunctionCode::BatteryStatus,
    ];

    /// Returns the wire byte for this function
    pub fn byte(self) -> u8 {
        match self {
            FunctionCode::Beacon => 0xBE,
            FunctionCode::WokenUp => 0xAA,
            FunctionCode::Ack => 0xAC,
            FunctionCode::IncludeReq => 0x00,
            FunctionCode::IncludeGrant => 0x02,
            FunctionCode::Reinclude => 0x04,
            FunctionCode::Config => 0x05,
            FunctionCode::SendBattery => 0x07,
            FunctionCode::Alert => 0xAE,
            FunctionCode::BatteryStatus => 0xBA,
        }
    }

    /// Looks up a wire byte in the function table
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xBE => Some(FunctionCode::Beacon),
            0xAA => Some(FunctionCode::WokenUp),
            0xAC => Some(FunctionCode::Ack),
            0x00 => Some(FunctionCode::IncludeReq),
            0x02 => Some(FunctionCode::IncludeGrant),
            0x04 => Some(FunctionCode::Reinclude),
            0x05 => Some(FunctionCode::Config),
            0x07 => Some(FunctionCode::SendBattery),
            0xAE => Some(FunctionCode::Alert),
            0xBA => Some(FunctionCode::BatteryStatus),
            _ => None,
        }
    }

    /// Returns the bus-facing name of this function
    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::Beacon => "beacon",
            FunctionCode::WokenUp => "woken_up",
            FunctionCode::Ack => "ack",
            FunctionCode::IncludeReq => "include_req",
            FunctionCode::IncludeGrant => "include_grant",
            FunctionCode::Reinclude => "reinclude",
            FunctionCode::Config => "config",
            FunctionCode::SendBattery => "send_battery",
            FunctionCode::Alert => "alert",
            FunctionCode::BatteryStatus => "battery_status",
        }
    }

    /// Looks up a bus-facing name (as used in app commands)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// Logical channel ("characteristic") names offered on the host bus.
pub mod characteristics {
    /// Decoded button/sensor frames
    pub const BUTTON: &str = "galvanize_button";
    /// Unparsed bursts, base64 encoded
    pub const SPUR: &str = "spur";
    /// Signal-strength readings
    pub const RSSI: &str = "rssi";

    /// Every characteristic this adaptor can serve
    pub const ALL: [&str; 3] = [BUTTON, SPUR, RSSI];
}

/// Lifecycle state of the adaptor, reported on the manager status channel.
///
/// `Error` is only entered once the serial link is in play and is cleared
/// back to `Running`, never to `Starting`; recovery from a dead link is an
/// external adaptor restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptorState {
    Stopped,
    Starting,
    Running,
    Error,
}

/// Immutable radio configuration, constructed once at startup and shared
/// by reference with every component that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Serial device path
    pub port: String,
    /// Station role
    pub role: RadioRole,
    /// Our own 16-bit station address
    pub own_address: u16,
    /// Destination addresses we accept frames for (own address plus any
    /// shared beacon/broadcast addresses)
    pub accepted_addresses: Vec<u16>,
    /// Radio channel number, used by the over-the-air frequency handshake
    pub channel: u8,
    /// Wakeup interval written into bridge-originated frames
    pub wakeup_interval: u16,
}

impl RadioConfig {
    /// Creates a configuration accepting frames addressed to `own_address`
    /// plus any extra addresses in `also_accept` (e.g. a beacon address).
    pub fn new(
        port: impl Into<String>,
        role: RadioRole,
        own_address: u16,
        also_accept: &[u16],
        channel: u8,
    ) -> Self {
        let mut accepted = vec![own_address];
        for &addr in also_accept {
            if !accepted.contains(&addr) {
                accepted.push(addr);
            }
        }
        RadioConfig {
            port: port.into(),
            role,
            own_address,
            accepted_addresses: accepted,
            channel,
            wakeup_interval: DEFAULT_WAKEUP_INTERVAL,
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// Recognised variables (with defaults): `GALVANIZE_PORT`
    /// (/dev/ttyUSB0), `GALVANIZE_TYPE` (BRIDGE), `GALVANIZE_ADDRESS`
    /// (0x0000), `GALVANIZE_BEACON_ADDRESS` (unset: only the own address is
    /// accepted), `GALVANIZE_CHANNEL` (1).
    pub fn from_env() -> Result<Self> {
        let port = env::var("GALVANIZE_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
        let role_str = env::var("GALVANIZE_TYPE").unwrap_or_else(|_| "BRIDGE".to_string());
        let role = RadioRole::parse(&role_str)
            .ok_or_else(|| Error::config(format!("unknown GALVANIZE_TYPE: {}", role_str)))?;
        let own_address =
            parse_address(&env::var("GALVANIZE_ADDRESS").unwrap_or_else(|_| "0x0000".to_string()))?;
        let mut also_accept = Vec::new();
        if let Ok(beacon) = env::var("GALVANIZE_BEACON_ADDRESS") {
            also_accept.push(parse_address(&beacon)?);
        }
        let channel = env::var("GALVANIZE_CHANNEL")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u8>()
            .map_err(|e| Error::config(format!("invalid GALVANIZE_CHANNEL: {}", e)))?;
        Ok(RadioConfig::new(port, role, own_address, &also_accept, channel))
    }

    /// Returns whether frames addressed to `destination` are for us
    pub fn accepts(&self, destination: u16) -> bool {
        self.accepted_addresses.contains(&destination)
    }
}

/// Parses a 16-bit station address, either hex ("0x1234") or decimal.
pub fn parse_address(s: &str) -> Result<u16> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse::<u16>()
    };
    parsed.map_err(|e| Error::config(format!("invalid address {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_function_table_bijective() {
        let mut seen = HashMap::new();
        for function in FunctionCode::ALL {
            let byte = function.byte();
            assert_eq!(FunctionCode::from_byte(byte), Some(function));
            // No two variants may share a byte
            assert_eq!(seen.insert(byte, function), None);
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_function_names_round_trip() {
        for function in FunctionCode::ALL {
            assert_eq!(FunctionCode::from_name(function.name()), Some(function));
        }
        assert_eq!(FunctionCode::from_name("warp_drive"), None);
    }

    #[test]
    fn test_unknown_bytes_rejected() {
        let table: Vec<u8> = FunctionCode::ALL.iter().map(|f| f.byte()).collect();
        for byte in 0..=u8::MAX {
            if !table.contains(&byte) {
                assert_eq!(FunctionCode::from_byte(byte), None);
            }
        }
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_address("0XBEEF").unwrap(), 0xBEEF);
        assert_eq!(parse_address("512").unwrap(), 512);
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn test_config_accepts() {
        let config = RadioConfig::new("/dev/null", RadioRole::Bridge, 0x1234, &[0xBBBB], 1);
        assert!(config.accepts(0x1234));
        assert!(config.accepts(0xBBBB));
        assert!(!config.accepts(0x5678));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(RadioRole::parse("BRIDGE"), Some(RadioRole::Bridge));
        assert_eq!(RadioRole::parse("node"), Some(RadioRole::Node));
        assert_eq!(RadioRole::parse("ROUTER"), None);
    }
}
