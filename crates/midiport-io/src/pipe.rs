//! Input-to-output forwarding.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use midiport_msg::MidiMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::device::{InputDevice, MidiDevice, OutputDevice};
use crate::error::{Error, Result};
use crate::events::{InputEvent, Subscribers};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Decides whether a received message is forwarded.
pub type PipeFilter = Arc<dyn Fn(&MidiMessage) -> bool + Send + Sync>;

/// Turns one received message into the messages actually sent.
pub type PipeRewrite = Arc<dyn Fn(MidiMessage) -> Vec<MidiMessage> + Send + Sync>;

type Release = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEvent {
    /// Reported for every message the input delivers, forwarded or not.
    MessageReceived(MidiMessage),
    Error(Error),
}

struct PipeShared {
    input: Arc<InputDevice>,
    output: Arc<OutputDevice>,
    filter: Option<PipeFilter>,
    rewrite: Option<PipeRewrite>,
    running: AtomicBool,
    forwarded: AtomicU64,
    subscribers: Subscribers<PipeEvent>,
}

/// Forwards every message received on an input device to an output device.
///
/// A filter can hold messages back and a rewrite hook can replace each message with any number
/// of others before they are sent.
///
/// A pipe built with [`MidiPipe::new`] or [`MidiPipe::with_hooks`] leaves the devices to the
/// caller. One made by [`MidiHost::pipe`](crate::MidiHost::pipe) gives its pool references back
/// when dropped.
pub struct MidiPipe {
    shared: Arc<PipeShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    release: Mutex<Option<Release>>,
}

impl MidiPipe {
    pub fn new(input: Arc<InputDevice>, output: Arc<OutputDevice>) -> Self {
        Self::with_hooks(input, output, None, None)
    }

    pub fn with_hooks(
        input: Arc<InputDevice>,
        output: Arc<OutputDevice>,
        filter: Option<PipeFilter>,
        rewrite: Option<PipeRewrite>,
    ) -> Self {
        Self {
            shared: Arc::new(PipeShared {
                input,
                output,
                filter,
                rewrite,
                running: AtomicBool::new(false),
                forwarded: AtomicU64::new(0),
                subscribers: Subscribers::new(),
            }),
            thread: Mutex::new(None),
            release: Mutex::new(None),
        }
    }

    /// Run `release` once the pipe is dropped, after forwarding has stopped.
    pub(crate) fn on_drop(self, release: impl FnOnce() + Send + 'static) -> Self {
        *self.release.lock() = Some(Box::new(release));
        self
    }

    /// "input => output"
    pub fn name(&self) -> String {
        format!(
            "{} => {}",
            self.shared.input.name(),
            self.shared.output.name()
        )
    }

    pub fn input(&self) -> &Arc<InputDevice> {
        &self.shared.input
    }

    pub fn output(&self) -> &Arc<OutputDevice> {
        &self.shared.output
    }

    /// Open both devices if needed and start forwarding.
    pub fn open(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }
        self.shared.output.open()?;
        self.shared.input.open()?;

        let events = self.shared.input.subscribe();
        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("midi-pipe".to_string())
            .spawn(move || forward_loop(shared, events));
        match spawned {
            Ok(handle) => {
                *thread = Some(handle);
                debug!("Pipe {} started", self.name());
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(Error::from(e))
            }
        }
    }

    /// Stop forwarding. The devices stay open.
    pub fn close(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            warn!("Pipe {} forwarding thread panicked", self.name());
        }
        debug!("Pipe {} stopped", self.name());
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Send directly to the output, bypassing filter and rewrite.
    pub fn send(&self, message: &MidiMessage) -> Result<()> {
        self.shared.output.send(message)
    }

    /// Messages sent to the output by the forwarding thread so far.
    pub fn forwarded(&self) -> u64 {
        self.shared.forwarded.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> Receiver<PipeEvent> {
        self.shared.subscribers.subscribe()
    }
}

impl Drop for MidiPipe {
    fn drop(&mut self) {
        self.close();
        if let Some(release) = self.release.lock().take() {
            release();
        }
    }
}

fn forward_loop(shared: Arc<PipeShared>, events: Receiver<InputEvent>) {
    while shared.running.load(Ordering::Acquire) {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(InputEvent::MessageReceived(message)) => shared.forward(message),
            Ok(InputEvent::Error(e)) => shared.subscribers.broadcast(PipeEvent::Error(e)),
            Ok(other) => trace!("Pipe ignoring {:?}", other),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    shared.running.store(false, Ordering::Release);
}

impl PipeShared {
    fn forward(&self, message: MidiMessage) {
        self.subscribers
            .broadcast(PipeEvent::MessageReceived(message.clone()));

        if let Some(filter) = &self.filter {
            if !filter(&message) {
                trace!("Pipe filtered {}", message);
                return;
            }
        }

        let outgoing = match &self.rewrite {
            Some(rewrite) => rewrite(message),
            None => vec![message],
        };
        for message in &outgoing {
            match self.output.send(message) {
                Ok(()) => {
                    self.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("Pipe failed to forward {}: {}", message, e);
                    self.subscribers.broadcast(PipeEvent::Error(e));
                }
            }
        }
    }
}
