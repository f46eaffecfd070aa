//! Output device.

use crossbeam_channel::Receiver;
use midiport_msg::MidiMessage;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::{check_type, DeviceState, MidiDevice, PreparedBuffer};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::events::{OutputEvent, Subscribers};
use crate::info::{DeviceInfo, DeviceType};
use crate::transport::{
    transport_error, BufferId, Transport, TransportCallback, TransportCode, TransportEvent,
    TransportHandle,
};

struct OutputState {
    state: DeviceState,
    handle: Option<TransportHandle>,
    buffer_count: usize,
}

struct OutputShared {
    info: DeviceInfo,
    transport: Arc<dyn Transport>,
    config: DeviceConfig,
    state: Mutex<OutputState>,
    drained: Condvar,
    subscribers: Subscribers<OutputEvent>,
}

/// A MIDI output device.
///
/// Short messages go straight to the transport. SysEx goes through a prepared buffer that
/// stays counted until the transport reports it done.
pub struct OutputDevice {
    shared: Arc<OutputShared>,
}

impl OutputDevice {
    pub fn send(&self, message: &MidiMessage) -> Result<()> {
        let shared = &self.shared;
        let mut st = shared.state.lock();
        let handle = match (st.state, st.handle) {
            (DeviceState::Open, Some(handle)) => handle,
            _ => return Err(Error::DeviceNotOpen(shared.info.to_string())),
        };

        match message.packed() {
            Some(packed) => shared
                .transport
                .send_short(handle, packed)
                .map_err(|code| shared.error(code)),
            None => {
                let buffer =
                    PreparedBuffer::prepare(&*shared.transport, handle, message.to_bytes())
                        .map_err(|code| shared.error(code))?;
                st.buffer_count += 1;
                if let Err(code) = shared.transport.send_long(handle, buffer.id()) {
                    st.buffer_count -= 1;
                    return Err(shared.error(code));
                }
                buffer.commit();
                Ok(())
            }
        }
    }

    pub fn subscribe(&self) -> Receiver<OutputEvent> {
        self.shared.subscribers.subscribe()
    }

    /// SysEx buffers sent but not yet reported done.
    pub fn buffer_count(&self) -> usize {
        self.shared.state.lock().buffer_count
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }
}

impl MidiDevice for OutputDevice {
    const DEVICE_TYPE: DeviceType = DeviceType::Output;

    fn new(transport: Arc<dyn Transport>, info: DeviceInfo, config: DeviceConfig) -> Result<Self> {
        check_type(&info, DeviceType::Output)?;
        config.validate()?;
        Ok(Self {
            shared: Arc::new(OutputShared {
                info,
                transport,
                config,
                state: Mutex::new(OutputState {
                    state: DeviceState::Closed,
                    handle: None,
                    buffer_count: 0,
                }),
                drained: Condvar::new(),
                subscribers: Subscribers::new(),
            }),
        })
    }

    fn info(&self) -> &DeviceInfo {
        &self.shared.info
    }

    fn state(&self) -> DeviceState {
        self.shared.state.lock().state
    }

    fn open(&self) -> Result<()> {
        let shared = &self.shared;
        let mut st = shared.state.lock();
        shared.wait_for_reset(&mut st);
        match st.state {
            DeviceState::Open => return Ok(()),
            DeviceState::Closed => {}
            _ => return Err(Error::DeviceNotOpen(format!("{} is closing", shared.info))),
        }
        st.state = DeviceState::Opening;

        let weak: Weak<OutputShared> = Arc::downgrade(shared);
        let callback: TransportCallback = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        });

        match shared
            .transport
            .open(DeviceType::Output, shared.info.id, callback)
        {
            Ok(handle) => {
                st.handle = Some(handle);
                st.state = DeviceState::Open;
                debug!("Opened MIDI output {}", shared.info);
                Ok(())
            }
            Err(code) => {
                st.state = DeviceState::Closed;
                Err(shared.error(code))
            }
        }
    }

    fn close(&self) -> Result<()> {
        let shared = &self.shared;
        let handle = {
            let mut st = shared.state.lock();
            shared.wait_for_reset(&mut st);
            if st.state != DeviceState::Open {
                return Ok(());
            }
            let Some(handle) = st.handle else {
                st.state = DeviceState::Closed;
                return Ok(());
            };
            shared.drain(&mut st, handle)?;
            st.state = DeviceState::Closing;
            st.handle = None;
            handle
        };

        let result = shared.transport.close(handle);
        shared.state.lock().state = DeviceState::Closed;
        shared.drained.notify_all();
        debug!("Closed MIDI output {}", shared.info);
        result.map_err(|code| shared.error(code))
    }

    fn reset(&self) -> Result<()> {
        let shared = &self.shared;
        let mut st = shared.state.lock();
        shared.wait_for_reset(&mut st);
        if st.state != DeviceState::Open {
            return Ok(());
        }
        let Some(handle) = st.handle else {
            return Ok(());
        };
        shared.drain(&mut st, handle)?;
        st.state = DeviceState::Open;
        shared.drained.notify_all();
        debug!("Reset MIDI output {}", shared.info);
        Ok(())
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close MIDI output on drop: {}", e);
        }
    }
}

impl OutputShared {
    fn error(&self, code: TransportCode) -> Error {
        transport_error(&*self.transport, DeviceType::Output, code)
    }

    fn wait_for_reset(&self, st: &mut MutexGuard<'_, OutputState>) {
        while st.state == DeviceState::Resetting {
            self.drained.wait(st);
        }
    }

    fn drain(&self, st: &mut MutexGuard<'_, OutputState>, handle: TransportHandle) -> Result<()> {
        let previous = st.state;
        st.state = DeviceState::Resetting;
        if let Err(code) = self.transport.reset(handle) {
            st.state = previous;
            self.drained.notify_all();
            return Err(self.error(code));
        }
        while st.buffer_count > 0 {
            self.drained.wait(st);
        }
        Ok(())
    }

    fn release_buffer(&self, st: &mut OutputState, buffer: BufferId) {
        if let Some(handle) = st.handle {
            if let Err(code) = self.transport.unprepare_buffer(handle, buffer) {
                self.subscribers
                    .broadcast(OutputEvent::Error(self.error(code)));
            }
        }
        debug_assert!(st.buffer_count > 0, "output buffer released twice");
        st.buffer_count = st.buffer_count.saturating_sub(1);
        self.drained.notify_all();
    }

    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Done { buffer } => {
                let mut st = self.state.lock();
                self.release_buffer(&mut st, buffer);
            }
            other => trace!("Ignoring {:?} on output {}", other, self.info),
        }
    }
}
