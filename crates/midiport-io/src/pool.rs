//! Reference-counted device registry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::device::{check_type, MidiDevice};
use crate::error::{Error, Result};
use crate::info::DeviceInfo;
use crate::transport::{transport_error, Transport};

struct PoolEntry<D> {
    device: Arc<D>,
    open_count: usize,
}

/// Shares one open device per id among all callers.
///
/// The first `open` of an id constructs and opens the device. Later opens hand out the same
/// `Arc` and bump the count; `close` drops the count and closes the device when it reaches
/// zero (or immediately with `force`).
pub struct DevicePool<D: MidiDevice> {
    transport: Arc<dyn Transport>,
    config: DeviceConfig,
    devices: Mutex<HashMap<u32, PoolEntry<D>>>,
}

impl<D: MidiDevice> DevicePool<D> {
    pub fn new(transport: Arc<dyn Transport>, config: DeviceConfig) -> Self {
        Self {
            transport,
            config,
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Devices of this pool's type, in transport order.
    pub fn enumerate(&self) -> Vec<DeviceInfo> {
        self.transport
            .enumerate(D::DEVICE_TYPE)
            .iter()
            .enumerate()
            .map(|(id, caps)| DeviceInfo::from_caps(D::DEVICE_TYPE, id as u32, caps))
            .collect()
    }

    pub fn get(&self, id: u32) -> Result<DeviceInfo> {
        self.transport
            .device_caps(D::DEVICE_TYPE, id)
            .map(|caps| DeviceInfo::from_caps(D::DEVICE_TYPE, id, &caps))
            .map_err(|code| transport_error(&*self.transport, D::DEVICE_TYPE, code))
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Result<DeviceInfo> {
        self.enumerate()
            .into_iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::DeviceNotFound(format!("Device '{}' not found", name)))
    }

    pub fn open(&self, info: &DeviceInfo) -> Result<Arc<D>> {
        check_type(info, D::DEVICE_TYPE)?;
        let mut devices = self.devices.lock();

        if let Some(entry) = devices.get_mut(&info.id) {
            entry.open_count += 1;
            debug!("{} shared, open count {}", info, entry.open_count);
            return Ok(Arc::clone(&entry.device));
        }

        let device = Arc::new(D::new(
            Arc::clone(&self.transport),
            info.clone(),
            self.config,
        )?);
        device.open()?;
        devices.insert(
            info.id,
            PoolEntry {
                device: Arc::clone(&device),
                open_count: 1,
            },
        );
        Ok(device)
    }

    pub fn open_id(&self, id: u32) -> Result<Arc<D>> {
        let info = self.get(id)?;
        self.open(&info)
    }

    pub fn open_name(&self, name: &str) -> Result<Arc<D>> {
        let info = self.find(name)?;
        self.open(&info)
    }

    /// Give back one reference. Returns `true` when the device was actually closed.
    ///
    /// A device this pool does not hold is left alone and reports `false`.
    pub fn close(&self, device: &Arc<D>, force: bool) -> Result<bool> {
        let mut devices = self.devices.lock();
        let id = device.id();

        let Some(entry) = devices.get_mut(&id) else {
            debug!("Device {} is not held by this pool", device.info());
            return Ok(false);
        };
        if !Arc::ptr_eq(&entry.device, device) {
            return Ok(false);
        }

        entry.open_count = entry.open_count.saturating_sub(1);
        if !force && entry.open_count > 0 {
            return Ok(false);
        }

        // Dropped from the registry even if closing fails, so a later open starts fresh.
        if let Some(entry) = devices.remove(&id) {
            entry.device.close()?;
        }
        Ok(true)
    }

    pub fn open_count(&self, id: u32) -> usize {
        self.devices
            .lock()
            .get(&id)
            .map(|entry| entry.open_count)
            .unwrap_or(0)
    }

    pub fn is_open(&self, id: u32) -> bool {
        self.devices.lock().contains_key(&id)
    }

    /// Close every device regardless of its count.
    pub fn close_all(&self) -> Result<()> {
        let entries: Vec<_> = self.devices.lock().drain().collect();
        let mut first_error = None;
        for (_, entry) in entries {
            if let Err(e) = entry.device.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
