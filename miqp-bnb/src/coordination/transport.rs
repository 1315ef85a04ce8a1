//! Message transport between workers.

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

use crate::error::{BnbError, BnbResult};
use crate::model::Solution;

/// Messages exchanged between workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// The sender's current cutoff.
    Cutoff {
        /// Sending worker.
        from: usize,
        /// Cutoff value.
        value: f64,
    },

    /// A solution that improved the sender's cutoff.
    Solution {
        /// Sending worker.
        from: usize,
        /// The solution.
        solution: Solution,
    },

    /// The sender's frontier is exhausted or it hit a limit.
    Finished {
        /// Sending worker.
        from: usize,
        /// Nodes the sender processed in this solve.
        explored: u64,
    },
}

/// Point-to-point message delivery between a fixed set of workers.
pub trait Transport: Send {
    /// Id of the worker owning this end.
    fn id(&self) -> usize;

    /// Number of workers reachable (including this one).
    fn num_workers(&self) -> usize;

    /// Deliver a message to one worker.
    fn send(&self, to: usize, message: Message) -> BnbResult<()>;

    /// Non-blocking receive.
    fn try_recv(&self) -> Option<Message>;

    /// Deliver a message to every other worker.
    fn broadcast(&self, message: &Message) -> BnbResult<()> {
        for to in (0..self.num_workers()).filter(|&w| w != self.id()) {
            self.send(to, message.clone())?;
        }
        Ok(())
    }
}

/// In-process transport over crossbeam channels.
pub struct ChannelTransport {
    id: usize,
    senders: Vec<Sender<Message>>,
    receiver: Receiver<Message>,
}

impl ChannelTransport {
    /// Fully connected set of `n` transports, one per worker.
    pub fn mesh(n: usize) -> Vec<ChannelTransport> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(id, receiver)| ChannelTransport {
                id,
                senders: senders.clone(),
                receiver,
            })
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn id(&self) -> usize {
        self.id
    }

    fn num_workers(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, to: usize, message: Message) -> BnbResult<()> {
        let sender = self.senders.get(to).ok_or_else(|| {
            BnbError::Index(format!("worker {} out of range ({} workers)", to, self.senders.len()))
        })?;
        sender
            .send(message)
            .map_err(|_| BnbError::Solver(format!("worker {} is no longer reachable", to)))
    }

    fn try_recv(&self) -> Option<Message> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
