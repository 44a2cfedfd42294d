//! Timer-driven batching of a streamed audio channel into fixed windows.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Accumulates chunks and releases them once per window.
///
/// A window is released on each tick if anything arrived since the last one,
/// and once more when the sender side closes.
pub struct WindowedBatcher {
    rx: mpsc::Receiver<Bytes>,
    buffer: BytesMut,
    ticker: Interval,
    finished: bool,
}

impl WindowedBatcher {
    pub fn new(rx: mpsc::Receiver<Bytes>, window: Duration) -> Self {
        let window = window.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + window, window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            rx,
            buffer: BytesMut::new(),
            ticker,
            finished: false,
        }
    }

    /// Next non-empty window, or `None` once the stream ended and was drained.
    pub async fn next_window(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }
        loop {
            tokio::select! {
                chunk = self.rx.recv() => match chunk {
                    Some(chunk) => self.buffer.extend_from_slice(&chunk),
                    None => {
                        self.finished = true;
                        return (!self.buffer.is_empty()).then(|| self.buffer.split().freeze());
                    }
                },
                _ = self.ticker.tick() => {
                    if !self.buffer.is_empty() {
                        return Some(self.buffer.split().freeze());
                    }
                }
            }
        }
    }
}
