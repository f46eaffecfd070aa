//! Device events and the subscriber list that fans them out.

use arc_swap::ArcSwap;
use crossbeam_channel::{unbounded, Receiver, Sender};
use midiport_msg::MidiMessage;

use crate::error::Error;

/// Everything an input device reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MessageReceived(MidiMessage),
    /// Raw packed value the driver flagged as malformed.
    InvalidShortMessageReceived(u32),
    InvalidSysExReceived(Vec<u8>),
    /// A failure on the callback side (buffer resubmission or release).
    Error(Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Error(Error),
}

/// Broadcast list of event receivers.
///
/// Each subscriber owns its own unbounded channel, so broadcasting never blocks. The sender
/// list is copy-on-write; receivers that have been dropped are pruned on the next broadcast.
pub struct Subscribers<E> {
    senders: ArcSwap<Vec<Sender<E>>>,
}

impl<E: Clone> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            senders: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<E> {
        let (sender, receiver) = unbounded();
        self.senders.rcu(|current| {
            let mut next = (**current).clone();
            next.push(sender.clone());
            next
        });
        receiver
    }

    pub fn broadcast(&self, event: E) {
        let senders = self.senders.load();
        let mut closed: Vec<Sender<E>> = Vec::new();
        for sender in senders.iter() {
            if sender.send(event.clone()).is_err() {
                closed.push(sender.clone());
            }
        }
        if !closed.is_empty() {
            self.senders.rcu(|current| {
                current
                    .iter()
                    .filter(|s| !closed.iter().any(|c| c.same_channel(s)))
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
    }

    pub fn len(&self) -> usize {
        self.senders.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Clone> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}
