//! Test helpers for midiport-io integration tests.
//!
//! [`ScriptedTransport`] records every call and lets a test play the driver's side by hand:
//! pushing short messages or filling queued receive buffers. Events still travel through a
//! per-handle [`Dispatcher`], so devices see them on another thread like with a real driver.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use midiport_io::{
    BufferId, DeviceType, Dispatcher, RawDeviceCaps, Transport, TransportCallback, TransportCode,
    TransportEvent, TransportHandle, TransportResult,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Once;
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// Install a test-writer tracing subscriber once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub fn recv<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(TIMEOUT).expect("event did not arrive in time")
}

/// Poll `condition` until it holds or the timeout passes.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(DeviceType, u32),
    Close(TransportHandle),
    Reset(TransportHandle),
    Start(TransportHandle),
    Prepare(TransportHandle, BufferId),
    AddBuffer(TransportHandle, BufferId),
    Unprepare(TransportHandle, BufferId),
    SendShort(TransportHandle, u32),
    SendLong(TransportHandle, Vec<u8>),
}

struct HandleState {
    dispatcher: Dispatcher,
    queued: VecDeque<BufferId>,
    prepared: HashMap<BufferId, Vec<u8>>,
}

#[derive(Default)]
struct State {
    handles: HashMap<u64, HandleState>,
    next_id: u64,
    calls: Vec<Call>,
    fail_open: Option<TransportCode>,
    fail_start: Option<TransportCode>,
    fail_reset: Option<TransportCode>,
    fail_add_buffer: Option<TransportCode>,
    fail_unprepare: Option<TransportCode>,
    hold_on_reset: bool,
}

pub struct ScriptedTransport {
    devices: Vec<RawDeviceCaps>,
    state: Mutex<State>,
}

impl ScriptedTransport {
    /// The same named devices are offered as inputs and outputs.
    pub fn new(names: &[&str]) -> Self {
        Self {
            devices: names.iter().map(|n| RawDeviceCaps::named(*n)).collect(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn fail_open(&self, code: Option<TransportCode>) {
        self.state.lock().fail_open = code;
    }

    pub fn fail_start(&self, code: Option<TransportCode>) {
        self.state.lock().fail_start = code;
    }

    pub fn fail_reset(&self, code: Option<TransportCode>) {
        self.state.lock().fail_reset = code;
    }

    pub fn fail_add_buffer(&self, code: Option<TransportCode>) {
        self.state.lock().fail_add_buffer = code;
    }

    pub fn fail_unprepare(&self, code: Option<TransportCode>) {
        self.state.lock().fail_unprepare = code;
    }

    /// When set, `reset` accepts the call but keeps every queued buffer. The test hands them
    /// back one by one with [`push_long`](Self::push_long).
    pub fn hold_on_reset(&self, hold: bool) {
        self.state.lock().hold_on_reset = hold;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    pub fn open_handles(&self) -> Vec<TransportHandle> {
        let mut handles: Vec<_> = self
            .state
            .lock()
            .handles
            .keys()
            .map(|h| TransportHandle(*h))
            .collect();
        handles.sort_by_key(|h| h.0);
        handles
    }

    pub fn queued(&self, handle: TransportHandle) -> usize {
        self.state
            .lock()
            .handles
            .get(&handle.0)
            .map_or(0, |h| h.queued.len())
    }

    pub fn push_short(&self, handle: TransportHandle, message: u32) {
        self.post(handle, TransportEvent::Data { message, timestamp: 0 });
    }

    pub fn push_invalid_short(&self, handle: TransportHandle, message: u32) {
        self.post(handle, TransportEvent::Error { message, timestamp: 0 });
    }

    /// Fill the oldest queued buffer with `data` and hand it back.
    pub fn push_long(&self, handle: TransportHandle, data: &[u8]) {
        self.return_buffer(handle, data, false);
    }

    pub fn push_invalid_long(&self, handle: TransportHandle, data: &[u8]) {
        self.return_buffer(handle, data, true);
    }

    fn return_buffer(&self, handle: TransportHandle, data: &[u8], invalid: bool) {
        let mut state = self.state.lock();
        let h = state
            .handles
            .get_mut(&handle.0)
            .expect("handle not open");
        let buffer = h.queued.pop_front().expect("no buffer queued");
        let data = data.to_vec();
        let event = if invalid {
            TransportEvent::LongError { buffer, data, timestamp: 0 }
        } else {
            TransportEvent::LongData { buffer, data, timestamp: 0 }
        };
        h.dispatcher.post(event);
    }

    fn post(&self, handle: TransportHandle, event: TransportEvent) {
        let state = self.state.lock();
        state
            .handles
            .get(&handle.0)
            .expect("handle not open")
            .dispatcher
            .post(event);
    }

    fn with_handle<T>(
        &self,
        handle: TransportHandle,
        call: Call,
        f: impl FnOnce(&mut HandleState) -> TransportResult<T>,
    ) -> TransportResult<T> {
        let mut state = self.state.lock();
        state.calls.push(call);
        let h = state
            .handles
            .get_mut(&handle.0)
            .ok_or(TransportCode::INVALID_HANDLE)?;
        f(h)
    }
}

impl Transport for ScriptedTransport {
    fn enumerate(&self, _device_type: DeviceType) -> Vec<RawDeviceCaps> {
        self.devices.clone()
    }

    fn open(
        &self,
        device_type: DeviceType,
        id: u32,
        callback: TransportCallback,
    ) -> TransportResult<TransportHandle> {
        let mut state = self.state.lock();
        state.calls.push(Call::Open(device_type, id));
        if let Some(code) = state.fail_open {
            return Err(code);
        }
        if id as usize >= self.devices.len() {
            return Err(TransportCode::BAD_DEVICE_ID);
        }
        state.next_id += 1;
        let id = state.next_id;
        let dispatcher = Dispatcher::spawn(format!("scripted-{id}"), callback)
            .map_err(|_| TransportCode::NO_MEMORY)?;
        state.handles.insert(
            id,
            HandleState {
                dispatcher,
                queued: VecDeque::new(),
                prepared: HashMap::new(),
            },
        );
        Ok(TransportHandle(id))
    }

    fn close(&self, handle: TransportHandle) -> TransportResult<()> {
        let removed = {
            let mut state = self.state.lock();
            state.calls.push(Call::Close(handle));
            if state
                .handles
                .get(&handle.0)
                .is_some_and(|h| !h.queued.is_empty())
            {
                return Err(TransportCode::STILL_PLAYING);
            }
            state.handles.remove(&handle.0)
        };
        // Joins the dispatcher outside the state lock.
        drop(removed);
        Ok(())
    }

    fn reset(&self, handle: TransportHandle) -> TransportResult<()> {
        let (fail, hold) = {
            let state = self.state.lock();
            (state.fail_reset, state.hold_on_reset)
        };
        self.with_handle(handle, Call::Reset(handle), |h| {
            if let Some(code) = fail {
                return Err(code);
            }
            if hold {
                return Ok(());
            }
            while let Some(buffer) = h.queued.pop_front() {
                h.dispatcher.post(TransportEvent::LongData {
                    buffer,
                    data: Vec::new(),
                    timestamp: 0,
                });
            }
            Ok(())
        })
    }

    fn start(&self, handle: TransportHandle) -> TransportResult<()> {
        let fail = self.state.lock().fail_start;
        self.with_handle(handle, Call::Start(handle), |_| match fail {
            Some(code) => Err(code),
            None => Ok(()),
        })
    }

    fn send_short(&self, handle: TransportHandle, message: u32) -> TransportResult<()> {
        self.with_handle(handle, Call::SendShort(handle, message), |_| Ok(()))
    }

    fn prepare_buffer(&self, handle: TransportHandle, data: Vec<u8>) -> TransportResult<BufferId> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let buffer = BufferId(state.next_id);
        state.calls.push(Call::Prepare(handle, buffer));
        let h = state
            .handles
            .get_mut(&handle.0)
            .ok_or(TransportCode::INVALID_HANDLE)?;
        h.prepared.insert(buffer, data);
        Ok(buffer)
    }

    fn add_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let fail = self.state.lock().fail_add_buffer;
        self.with_handle(handle, Call::AddBuffer(handle, buffer), |h| {
            if let Some(code) = fail {
                return Err(code);
            }
            if !h.prepared.contains_key(&buffer) {
                return Err(TransportCode::UNPREPARED);
            }
            h.queued.push_back(buffer);
            Ok(())
        })
    }

    fn send_long(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let mut state = self.state.lock();
        let h = state
            .handles
            .get_mut(&handle.0)
            .ok_or(TransportCode::INVALID_HANDLE)?;
        let data = h
            .prepared
            .get(&buffer)
            .cloned()
            .ok_or(TransportCode::UNPREPARED)?;
        h.dispatcher.post(TransportEvent::Done { buffer });
        state.calls.push(Call::SendLong(handle, data));
        Ok(())
    }

    fn unprepare_buffer(&self, handle: TransportHandle, buffer: BufferId) -> TransportResult<()> {
        let fail = self.state.lock().fail_unprepare;
        self.with_handle(handle, Call::Unprepare(handle, buffer), |h| {
            if let Some(code) = fail {
                return Err(code);
            }
            if h.queued.contains(&buffer) {
                return Err(TransportCode::STILL_PLAYING);
            }
            h.prepared.remove(&buffer);
            Ok(())
        })
    }
}
