//! Device identity as reported by a transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Input => f.write_str("Input"),
            DeviceType::Output => f.write_str("Output"),
        }
    }
}

/// Capabilities record for one device, in the transport's own terms.
///
/// The position of a record in [`Transport::enumerate`](crate::Transport::enumerate) is the
/// device id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeviceCaps {
    pub name: String,
    pub manufacturer_id: u16,
    pub product_id: u16,
    /// Packed driver version: major in bits 8..16, minor in bits 0..8.
    pub driver_version: u32,
}

impl RawDeviceCaps {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manufacturer_id: 0,
            product_id: 0,
            driver_version: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DriverVersion {
    pub major: u8,
    pub minor: u8,
}

impl DriverVersion {
    pub fn from_packed(version: u32) -> Self {
        Self {
            major: ((version >> 8) & 0xFF) as u8,
            minor: (version & 0xFF) as u8,
        }
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Immutable description of a MIDI device.
///
/// Two infos are equal when they name the same device slot: same type and same id. Name and
/// driver details do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub name: String,
    pub id: u32,
    pub manufacturer_id: u16,
    pub product_id: u16,
    pub driver_version: DriverVersion,
}

impl DeviceInfo {
    pub fn from_caps(device_type: DeviceType, id: u32, caps: &RawDeviceCaps) -> Self {
        Self {
            device_type,
            name: caps.name.clone(),
            id,
            manufacturer_id: caps.manufacturer_id,
            product_id: caps.product_id,
            driver_version: DriverVersion::from_packed(caps.driver_version),
        }
    }
}

impl PartialEq for DeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.device_type == other.device_type && self.id == other.id
    }
}

impl Eq for DeviceInfo {}

impl Hash for DeviceInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device_type, self.name)
    }
}
