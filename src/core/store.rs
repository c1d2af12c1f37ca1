//! The Message Store: the one transcript every view renders from.
//!
//! The transcript lives inside a `tokio::sync::watch` channel. Every change
//! bumps the channel version so subscribers re-render; a mutation that
//! matches nothing leaves the version alone.

use tokio::sync::watch;

use super::message::Message;

/// Snapshot of the store.
///
/// `generation` increases every time the whole sequence is replaced (session
/// switch, new chat). Writers that captured an older generation are stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub generation: u64,
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn find(&self, id: u64) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub struct MessageStore {
    tx: watch::Sender<Transcript>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Transcript::default());
        Self { tx }
    }

    /// Receiver that wakes on every change to the transcript.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Transcript {
        self.tx.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tx.borrow().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn append(&self, message: Message) {
        self.tx.send_modify(|transcript| transcript.messages.push(message));
    }

    /// Append only if the transcript has not been replaced since `generation`.
    pub fn append_in(&self, generation: u64, message: Message) -> bool {
        self.tx.send_if_modified(|transcript| {
            if transcript.generation != generation {
                return false;
            }
            transcript.messages.push(message);
            true
        })
    }

    /// Swap the entire sequence and start a new generation.
    pub fn replace_all(&self, messages: Vec<Message>) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|transcript| {
            transcript.generation += 1;
            transcript.messages = messages;
            next = transcript.generation;
        });
        next
    }

    pub fn clear(&self) -> u64 {
        self.replace_all(Vec::new())
    }

    /// Apply `update` to the message with `id`.
    ///
    /// Returns `false` without touching anything when no message has that id.
    pub fn mutate_by_id<F>(&self, id: u64, update: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        self.tx.send_if_modified(|transcript| {
            match transcript.messages.iter_mut().find(|message| message.id == id) {
                Some(message) => {
                    update(message);
                    true
                }
                None => false,
            }
        })
    }

    /// [`MessageStore::mutate_by_id`] restricted to one generation.
    pub fn mutate_in<F>(&self, generation: u64, id: u64, update: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        self.tx.send_if_modified(|transcript| {
            if transcript.generation != generation {
                return false;
            }
            match transcript.messages.iter_mut().find(|message| message.id == id) {
                Some(message) => {
                    update(message);
                    true
                }
                None => false,
            }
        })
    }
}
