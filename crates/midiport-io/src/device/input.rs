//! Input device: receive buffers, short-message decoding and SysEx reassembly.

use crossbeam_channel::Receiver;
use midiport_msg::{MessageBuilder, MidiMessage};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::{check_type, DeviceState, MidiDevice, PreparedBuffer};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::events::{InputEvent, Subscribers};
use crate::info::{DeviceInfo, DeviceType};
use crate::reassembly::SysExAccumulator;
use crate::transport::{
    transport_error, BufferId, Transport, TransportCallback, TransportCode, TransportEvent,
    TransportHandle,
};

struct InputState {
    state: DeviceState,
    handle: Option<TransportHandle>,
    /// Receive buffers submitted and not yet returned.
    buffers: Vec<BufferId>,
    sysex: SysExAccumulator,
}

struct InputShared {
    info: DeviceInfo,
    transport: Arc<dyn Transport>,
    config: DeviceConfig,
    state: Mutex<InputState>,
    /// Signalled whenever a buffer is released or a reset finishes.
    drained: Condvar,
    subscribers: Subscribers<InputEvent>,
}

/// A MIDI input device.
///
/// While open, the device keeps `receive_buffers` buffers submitted to the transport for SysEx
/// data. Each returned buffer is appended to the SysEx accumulator, replaced with a fresh one
/// and released. Events go to every [`subscribe`](Self::subscribe)r in delivery order.
pub struct InputDevice {
    shared: Arc<InputShared>,
}

impl InputDevice {
    pub fn subscribe(&self) -> Receiver<InputEvent> {
        self.shared.subscribers.subscribe()
    }

    /// Buffers currently held by the transport.
    pub fn buffer_count(&self) -> usize {
        self.shared.state.lock().buffers.len()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }
}

impl MidiDevice for InputDevice {
    const DEVICE_TYPE: DeviceType = DeviceType::Input;

    fn new(transport: Arc<dyn Transport>, info: DeviceInfo, config: DeviceConfig) -> Result<Self> {
        check_type(&info, DeviceType::Input)?;
        config.validate()?;
        Ok(Self {
            shared: Arc::new(InputShared {
                info,
                transport,
                config,
                state: Mutex::new(InputState {
                    state: DeviceState::Closed,
                    handle: None,
                    buffers: Vec::new(),
                    sysex: SysExAccumulator::new(),
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

        let weak: Weak<InputShared> = Arc::downgrade(shared);
        let callback: TransportCallback = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(event);
            }
        });

        let handle = match shared
            .transport
            .open(DeviceType::Input, shared.info.id, callback)
        {
            Ok(handle) => handle,
            Err(code) => {
                st.state = DeviceState::Closed;
                return Err(shared.error(code));
            }
        };
        st.handle = Some(handle);

        if let Err(e) = shared.arm(&mut st, handle) {
            warn!("Failed to start {}: {}", shared.info, e);
            // Whatever was already submitted has to come back before the handle goes.
            if let Err(drain_err) = shared.drain(&mut st, handle) {
                warn!("Failed to drain {}: {}", shared.info, drain_err);
                shared.abandon_buffers(&mut st, handle);
            }
            st.state = DeviceState::Closing;
            st.handle = None;
            shared.drained.notify_all();
            drop(st);
            if let Err(code) = shared.transport.close(handle) {
                warn!(
                    "Failed to release handle of {}: {}",
                    shared.info,
                    shared.error(code)
                );
            }
            shared.state.lock().state = DeviceState::Closed;
            shared.drained.notify_all();
            return Err(e);
        }

        st.state = DeviceState::Open;
        debug!("Opened MIDI input {}", shared.info);
        Ok(())
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
        debug!("Closed MIDI input {}", shared.info);
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
        // Re-arm so SysEx reception continues after the reset.
        let result = shared.arm(&mut st, handle);
        st.state = DeviceState::Open;
        shared.drained.notify_all();
        debug!("Reset MIDI input {}", shared.info);
        result
    }
}

impl Drop for InputDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close MIDI input on drop: {}", e);
        }
    }
}

impl InputShared {
    fn error(&self, code: TransportCode) -> Error {
        transport_error(&*self.transport, DeviceType::Input, code)
    }

    fn wait_for_reset(&self, st: &mut MutexGuard<'_, InputState>) {
        while st.state == DeviceState::Resetting {
            self.drained.wait(st);
        }
    }

    /// Submit the configured number of receive buffers and start input.
    fn arm(&self, st: &mut InputState, handle: TransportHandle) -> Result<()> {
        for _ in 0..self.config.receive_buffers {
            self.submit_buffer(st, handle)?;
        }
        self.transport
            .start(handle)
            .map_err(|code| self.error(code))
    }

    /// Have the transport return every outstanding buffer and wait for all of them.
    ///
    /// Leaves the state at `Resetting`; the caller decides what comes next.
    fn drain(&self, st: &mut MutexGuard<'_, InputState>, handle: TransportHandle) -> Result<()> {
        let previous = st.state;
        st.state = DeviceState::Resetting;
        if let Err(code) = self.transport.reset(handle) {
            st.state = previous;
            self.drained.notify_all();
            return Err(self.error(code));
        }
        while !st.buffers.is_empty() {
            self.drained.wait(st);
        }
        st.sysex.clear();
        Ok(())
    }

    /// Forget buffers the transport would not hand back, unpreparing those it lets go of.
    fn abandon_buffers(&self, st: &mut InputState, handle: TransportHandle) {
        for buffer in st.buffers.drain(..) {
            if let Err(code) = self.transport.unprepare_buffer(handle, buffer) {
                warn!(
                    "Abandoning receive buffer {:?} on {}: {}",
                    buffer, self.info, code
                );
            }
        }
        st.sysex.clear();
    }

    fn submit_buffer(&self, st: &mut InputState, handle: TransportHandle) -> Result<()> {
        let buffer = PreparedBuffer::prepare(
            &*self.transport,
            handle,
            vec![0; self.config.sysex_buffer_size],
        )
        .map_err(|code| self.error(code))?;
        self.transport
            .add_buffer(handle, buffer.id())
            .map_err(|code| self.error(code))?;
        st.buffers.push(buffer.id());
        buffer.commit();
        Ok(())
    }

    fn resubmit(&self, st: &mut InputState) {
        let Some(handle) = st.handle else {
            return;
        };
        if let Err(e) = self.submit_buffer(st, handle) {
            warn!("Failed to resubmit receive buffer on {}: {}", self.info, e);
            self.subscribers.broadcast(InputEvent::Error(e));
        }
    }

    fn release_buffer(&self, st: &mut InputState, buffer: BufferId) {
        let Some(index) = st.buffers.iter().position(|b| *b == buffer) else {
            trace!("Receive buffer {:?} on {} was abandoned", buffer, self.info);
            return;
        };
        st.buffers.swap_remove(index);
        if let Some(handle) = st.handle {
            if let Err(code) = self.transport.unprepare_buffer(handle, buffer) {
                self.subscribers
                    .broadcast(InputEvent::Error(self.error(code)));
            }
        }
        self.drained.notify_all();
    }

    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Data { message, .. } => {
                let st = self.state.lock();
                if st.state == DeviceState::Open {
                    let message = MessageBuilder::build(message);
                    self.subscribers
                        .broadcast(InputEvent::MessageReceived(message));
                }
            }
            TransportEvent::Error { message, .. } => {
                let st = self.state.lock();
                if st.state == DeviceState::Open {
                    self.subscribers
                        .broadcast(InputEvent::InvalidShortMessageReceived(message));
                }
            }
            TransportEvent::LongData {
                buffer,
                data,
                timestamp,
            } => {
                let mut st = self.state.lock();
                if st.state == DeviceState::Open {
                    if let Some(sysex) = st.sysex.push(&data, timestamp) {
                        self.subscribers
                            .broadcast(InputEvent::MessageReceived(MidiMessage::SysEx(sysex)));
                    }
                    self.resubmit(&mut st);
                }
                self.release_buffer(&mut st, buffer);
            }
            TransportEvent::LongError { buffer, data, .. } => {
                let mut st = self.state.lock();
                if st.state == DeviceState::Open {
                    self.subscribers
                        .broadcast(InputEvent::InvalidSysExReceived(data));
                    self.resubmit(&mut st);
                }
                self.release_buffer(&mut st, buffer);
            }
            TransportEvent::Done { buffer } => {
                trace!("Ignoring output completion {:?} on input {}", buffer, self.info);
            }
        }
    }
}
