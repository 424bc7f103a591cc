//! In-process signal bus.
//!
//! Signals carry no payload: a receiver only learns that something it cares about changed
//! and re-reads whatever state backs it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tokio::sync::mpsc;
use tracing::trace;

pub type SignalReceiver = mpsc::UnboundedReceiver<()>;

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    subscribers: Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<()>>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a set of signals. Every listed signal feeds the same receiver.
    pub fn connect<I, S>(&self, signals: I) -> SignalReceiver
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for signal in signals {
            subscribers.entry(signal.into()).or_default().push(tx.clone());
        }
        rx
    }

    /// Deliver `signal` to every live subscriber and return how many were reached.
    ///
    /// Delivery happens before this returns, so a receiver woken by it observes every
    /// write made before the call.
    pub fn send(&self, signal: &str) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(senders) = subscribers.get_mut(signal) else {
            trace!("No subscribers for signal {}", signal);
            return 0;
        };

        senders.retain(|tx| tx.send(()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            subscribers.remove(signal);
        }

        trace!("Dispatched signal {} to {} subscribers", signal, delivered);
        delivered
    }

    /// Number of live subscribers for `signal`.
    #[cfg(test)]
    fn subscriber_count(&self, signal: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signal)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }
}
