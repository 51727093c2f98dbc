// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use std::sync::Mutex;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// The `Notifier` holds references to clients waiting to receive notices from the session.
/// Clients will be evicted once their receivers are dropped.
pub struct Notifier<N> {
    inner: Mutex<Vec<UnboundedSender<N>>>,
}

// This is here because #[derive(Default)] would require `N: Default`.
impl<N> Default for Notifier<N> {
    fn default() -> Self {
        Self {
            inner: Mutex::default(),
        }
    }
}

impl<N: Clone> Notifier<N> {
    /// Creates a subscription to every future notice.
    pub fn subscribe(&self) -> UnboundedReceiver<N> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.inner.lock().unwrap().push(tx);
        rx
    }

    /// Sends a notice to every live subscriber.
    pub fn notify(&self, notice: N) {
        let mut senders = self.inner.lock().unwrap();
        let before = senders.len();
        senders.retain(|sender| sender.send(notice.clone()).is_ok());
        if senders.len() < before {
            trace!("Removed {} dead subscribers.", before - senders.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
