//! OS MIDI ports through midir.

use dashmap::DashMap;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use midiport_msg::packed;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    BufferId, Dispatcher, HandleQueue, Transport, TransportCallback, TransportCode,
    TransportEvent, TransportHandle, TransportResult,
};
use crate::error::Result;
use crate::info::{DeviceType, RawDeviceCaps};

enum Connection {
    Input(MidiInputConnection<()>),
    Output(MidiOutputConnection),
}

struct HardwareHandle {
    device_type: DeviceType,
    queue: Arc<HandleQueue>,
    connection: Mutex<Option<Connection>>,
}

/// Transport over the operating system's MIDI ports.
///
/// Each open creates its own midir client, since connecting consumes it. Device ids are port
/// indices as midir reports them at the time of the call.
pub struct MidirTransport {
    client_name: String,
    handles: DashMap<u64, Arc<HardwareHandle>>,
    next_id: AtomicU64,
}

impl MidirTransport {
    pub fn new(client_name: &str) -> Result<Self> {
        // Fail early if the MIDI backend is unavailable.
        MidiInput::new(client_name)?;
        Ok(Self {
            client_name: client_name.to_string(),
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    fn handle(&self, handle: TransportHandle) -> TransportResult<Arc<HardwareHandle>> {
        self.handles
            .get(&handle.0)
            .map(|h| Arc::clone(h.value()))
            .ok_or(TransportCode::INVALID_HANDLE)
    }

    fn send_bytes(&self, handle: &HardwareHandle, bytes: &[u8]) -> TransportResult<()> {
        match handle.connection.lock().as_mut() {
            Some(Connection::Output(conn)) => conn.send(bytes).map_err(|e| {
                warn!("MIDI send failed: {}", e);
                TransportCode::ERROR
            }),
            Some(Connection::Input(_)) => Err(TransportCode::NOT_SUPPORTED),
            None => Err(TransportCode::INVALID_HANDLE),
        }
    }

    fn connect(
        &self,
        device_type: DeviceType,
        id: u32,
        queue: &Arc<HandleQueue>,
    ) -> TransportResult<Connection> {
        match device_type {
            DeviceType::Input => {
                let mut midi_in =
                    MidiInput::new(&self.client_name).map_err(|_| TransportCode::NO_DRIVER)?;
                midi_in.ignore(Ignore::None);
                let port = midi_in
                    .ports()
                    .into_iter()
                    .nth(id as usize)
                    .ok_or(TransportCode::BAD_DEVICE_ID)?;
                let sink = Arc::clone(queue);
                midi_in
                    .connect(
                        &port,
                        "midiport-input",
                        move |_stamp, bytes, _| sink.deliver(bytes),
                        (),
                    )
                    .map(Connection::Input)
                    .map_err(|e| {
                        warn!("Failed to connect MIDI input {}: {}", id, e);
                        TransportCode::ALLOCATED
                    })
            }
            DeviceType::Output => {
                let midi_out =
                    MidiOutput::new(&self.client_name).map_err(|_| TransportCode::NO_DRIVER)?;
                let port = midi_out
                    .ports()
                    .into_iter()
                    .nth(id as usize)
                    .ok_or(TransportCode::BAD_DEVICE_ID)?;
                midi_out
                    .connect(&port, "midiport-output")
                    .map(Connection::Output)
                    .map_err(|e| {
                        warn!("Failed to connect MIDI output {}: {}", id, e);
                        TransportCode::ALLOCATED
                    })
            }
        }
    }
}

impl Transport for MidirTransport {
    fn enumerate(&self, device_type: DeviceType) -> Vec<RawDeviceCaps> {
        match device_type {
            DeviceType::Input => match MidiInput::new(&self.client_name) {
                Ok(midi_in) => midi_in
                    .ports()
                    .iter()
                    .enumerate()
                    .map(|(index, port)| {
                        RawDeviceCaps::named(
                            midi_in
                                .port_name(port)
                                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!("Cannot list MIDI inputs: {}", e);
                    Vec::new()
                }
            },
            DeviceType::Output => match MidiOutput::new(&self.client_name) {
                Ok(midi_out) => midi_out
                    .ports()
                    .iter()
                    .enumerate()
                    .map(|(index, port)| {
                        RawDeviceCaps::named(
                            midi_out
                                .port_name(port)
                                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!("Cannot list MIDI outputs: {}", e);
                    Vec::new()
                }
            },
        }
    }

    fn open(
        &self,
        device_type: DeviceType,
        id: u32,
        callback: TransportCallback,
    ) -> TransportResult<TransportHandle> {
        let handle = self.next_id.fetch_add(1, Ordering::Relaxed);
        let label = format!("{} {}", device_type, id);
        let dispatcher = Dispatcher::spawn(format!("midir-callback-{}", handle), callback)
            .map_err(|_| TransportCode::NO_MEMORY)?;
        let queue = Arc::new(HandleQueue::new(label, dispatcher));

        let connection = match self.connect(device_type, id, &queue) {
            Ok(connection) => connection,
            Err(code) => {
                queue.shutdown();
                return Err(code);
            }
        };
        self.handles.insert(
            handle,
            Arc::new(HardwareHandle {
                device_type,
                queue,
                connection: Mutex::new(Some(connection)),
            }),
        );
        debug!("Opened hardware {} {} as handle {}", device_type, id, handle);
        Ok(TransportHandle(handle))
    }

    fn close(&self, handle: TransportHandle) -> TransportResult<()> {
        let hw = self.handle(handle)?;
        if hw.queue.has_queued() {
            return Err(TransportCode::STILL_PLAYING);
        }
        self.handles.remove(&handle.0);
        match hw.connection.lock().take() {
            Some(Connection::Input(conn)) => {
                conn.close();
            }
            Some(Connection::Output(conn)) => {
                conn.close();
            }
            None => {}
        }
        hw.queue.shutdown();
        Ok(())
    }

    fn reset(&self, handle: TransportHandle) -> TransportResult<()> {
        self.handle(handle)?.queue.reset();
        Ok(())
    }

    fn start(&self, handle: TransportHandle) -> TransportResult<()> {
        let hw = self.handle(handle)?;
        if hw.device_type != DeviceType::Input {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        hw.queue.start();
        Ok(())
    }

    fn send_short(&self, handle: TransportHandle, message: u32) -> TransportResult<()> {
        let hw = self.handle(handle)?;
        let status = packed::status(message);
        let bytes = [status, packed::data1(message), packed::data2(message)];
        self.send_bytes(&hw, &bytes[..1 + packed::data_len(status)])
    }

    fn prepare_buffer(&self, handle: TransportHandle, data: Vec<u8>) -> TransportResult<BufferId> {
        Ok(self.handle(handle)?.queue.prepare(data))
    }

    fn add_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let hw = self.handle(handle)?;
        if hw.device_type != DeviceType::Input {
            return Err(TransportCode::NOT_SUPPORTED);
        }
        hw.queue.add(buffer)
    }

    fn send_long(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let hw = self.handle(handle)?;
        let data = hw.queue.data(buffer)?;
        self.send_bytes(&hw, &data)?;
        hw.queue.post(TransportEvent::Done { buffer });
        Ok(())
    }

    fn unprepare_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        self.handle(handle)?.queue.unprepare(buffer)
    }
}
