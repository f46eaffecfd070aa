//! Per-handle callback thread.

use crossbeam_channel::{unbounded, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::{TransportCallback, TransportEvent};

/// Delivers transport events to a callback from a dedicated thread, in posting order.
pub struct Dispatcher {
    sender: Option<Sender<TransportEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(name: impl Into<String>, callback: TransportCallback) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<TransportEvent>();
        let thread = thread::Builder::new().name(name.into()).spawn(move || {
            for event in receiver.iter() {
                callback(event);
            }
        })?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    pub fn post(&self, event: TransportEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                debug!("Dispatcher thread gone, dropping transport event");
            }
        }
    }

    /// Deliver everything already posted, then stop the thread.
    ///
    /// Called from the dispatcher thread itself (a callback closing its own device) the thread
    /// is detached instead of joined.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!("Transport callback thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_events_arrive_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dispatcher = Dispatcher::spawn(
            "test-dispatch",
            Arc::new(move |event| {
                if let TransportEvent::Data { message, .. } = event {
                    sink.lock().push(message);
                }
            }),
        )
        .unwrap();

        for message in 0..100 {
            dispatcher.post(TransportEvent::Data { message, timestamp: 0 });
        }
        dispatcher.shutdown();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_post_after_shutdown_is_ignored() {
        let mut dispatcher = Dispatcher::spawn("test-dispatch", Arc::new(|_| {})).unwrap();
        dispatcher.shutdown();
        dispatcher.post(TransportEvent::Data { message: 0, timestamp: 0 });
    }
}
