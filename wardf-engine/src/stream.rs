//! Live estimate subscription
//!
//! Each subscriber sees the estimates published after it subscribed, in
//! order. There is no replay; a subscriber that falls more than the channel
//! capacity behind skips ahead and the gap is counted.

use log::warn;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use wardf_core::Estimate;

/// Infinite, non-restartable sequence of estimates
#[derive(Debug)]
pub struct EstimateStream {
    receiver: broadcast::Receiver<Estimate>,
    skipped: u64,
}

impl EstimateStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Estimate>) -> Self {
        Self { receiver, skipped: 0 }
    }

    /// Next estimate; `None` once the engine has shut down
    pub async fn next(&mut self) -> Option<Estimate> {
        loop {
            match self.receiver.recv().await {
                Ok(estimate) => return Some(estimate),
                Err(RecvError::Lagged(n)) => self.lagged(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next estimate if one is already waiting
    pub fn try_next(&mut self) -> Option<Estimate> {
        loop {
            match self.receiver.try_recv() {
                Ok(estimate) => return Some(estimate),
                Err(TryRecvError::Lagged(n)) => self.lagged(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&mut self, n: u64) {
        warn!("estimate subscriber fell behind, skipped {} estimates", n);
        self.skipped += n;
    }

    /// Estimates missed because this subscriber was too slow
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
