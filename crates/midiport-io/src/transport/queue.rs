//! Buffer bookkeeping and event delivery for one open transport handle.

use midiport_msg::packed;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{trace, warn};

use super::{BufferId, Dispatcher, TransportCode, TransportEvent, TransportResult};

struct Slot {
    data: Vec<u8>,
    queued: bool,
}

#[derive(Default)]
struct Buffers {
    prepared: HashMap<u64, Slot>,
    queue: VecDeque<u64>,
}

/// Prepared buffers, the receive queue and the dispatcher of one handle.
///
/// Raw bytes coming from a port go through [`deliver`](Self::deliver): SysEx is spread over
/// queued receive buffers, everything else is packed into a short message.
pub(crate) struct HandleQueue {
    label: String,
    dispatcher: Mutex<Option<Dispatcher>>,
    started_at: Mutex<Option<Instant>>,
    buffers: Mutex<Buffers>,
    next_buffer: AtomicU64,
}

impl HandleQueue {
    pub(crate) fn new(label: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self {
            label: label.into(),
            dispatcher: Mutex::new(Some(dispatcher)),
            started_at: Mutex::new(None),
            buffers: Mutex::new(Buffers::default()),
            next_buffer: AtomicU64::new(1),
        }
    }

    pub(crate) fn post(&self, event: TransportEvent) {
        if let Some(dispatcher) = self.dispatcher.lock().as_ref() {
            dispatcher.post(event);
        }
    }

    pub(crate) fn start(&self) {
        self.started_at.lock().get_or_insert_with(Instant::now);
    }

    /// Stop input and hand every queued buffer back empty.
    pub(crate) fn reset(&self) {
        let timestamp = self
            .started_at
            .lock()
            .take()
            .map(|t| t.elapsed().as_millis() as u32)
            .unwrap_or(0);
        let mut buffers = self.buffers.lock();
        while let Some(id) = buffers.queue.pop_front() {
            if let Some(slot) = buffers.prepared.get_mut(&id) {
                slot.queued = false;
            }
            self.post(TransportEvent::LongData {
                buffer: BufferId(id),
                data: Vec::new(),
                timestamp,
            });
        }
    }

    /// Hand raw bytes from the port to the owner of the handle.
    pub(crate) fn deliver(&self, bytes: &[u8]) {
        let Some(started_at) = *self.started_at.lock() else {
            trace!("Input on '{}' not started, dropping {} bytes", self.label, bytes.len());
            return;
        };
        let timestamp = started_at.elapsed().as_millis() as u32;

        match bytes.first() {
            Some(0xF0) | Some(0xF7) => self.deliver_long(bytes, timestamp),
            Some(&status) => match packed::from_bytes(bytes) {
                Some(message) => self.post(TransportEvent::Data { message, timestamp }),
                None => {
                    let message = packed::pack(status, bytes[1], bytes[2]);
                    self.post(TransportEvent::Error { message, timestamp });
                }
            },
            None => {}
        }
    }

    fn deliver_long(&self, bytes: &[u8], timestamp: u32) {
        let mut buffers = self.buffers.lock();
        let mut rest = bytes;
        while !rest.is_empty() {
            let Some(id) = buffers.queue.pop_front() else {
                warn!(
                    "No receive buffer queued on '{}', dropping {} SysEx bytes",
                    self.label,
                    rest.len()
                );
                return;
            };
            let Some(slot) = buffers.prepared.get_mut(&id) else {
                continue;
            };
            slot.queued = false;
            let n = slot.data.len().max(1).min(rest.len());
            self.post(TransportEvent::LongData {
                buffer: BufferId(id),
                data: rest[..n].to_vec(),
                timestamp,
            });
            rest = &rest[n..];
        }
    }

    pub(crate) fn prepare(&self, data: Vec<u8>) -> BufferId {
        let id = self.next_buffer.fetch_add(1, Ordering::Relaxed);
        self.buffers
            .lock()
            .prepared
            .insert(id, Slot { data, queued: false });
        BufferId(id)
    }

    pub(crate) fn add(&self, buffer: BufferId) -> TransportResult<()> {
        let mut buffers = self.buffers.lock();
        let slot = buffers
            .prepared
            .get_mut(&buffer.0)
            .ok_or(TransportCode::UNPREPARED)?;
        if slot.queued {
            return Err(TransportCode::STILL_PLAYING);
        }
        slot.queued = true;
        buffers.queue.push_back(buffer.0);
        Ok(())
    }

    /// Contents of a prepared buffer, for sending.
    pub(crate) fn data(&self, buffer: BufferId) -> TransportResult<Vec<u8>> {
        self.buffers
            .lock()
            .prepared
            .get(&buffer.0)
            .map(|slot| slot.data.clone())
            .ok_or(TransportCode::UNPREPARED)
    }

    pub(crate) fn unprepare(&self, buffer: BufferId) -> TransportResult<()> {
        let mut buffers = self.buffers.lock();
        if buffers.prepared.get(&buffer.0).is_some_and(|slot| slot.queued) {
            return Err(TransportCode::STILL_PLAYING);
        }
        buffers.prepared.remove(&buffer.0);
        Ok(())
    }

    pub(crate) fn has_queued(&self) -> bool {
        !self.buffers.lock().queue.is_empty()
    }

    /// Deliver what is already posted and stop the dispatcher thread.
    pub(crate) fn shutdown(&self) {
        let dispatcher = self.dispatcher.lock().take();
        drop(dispatcher);
    }
}
