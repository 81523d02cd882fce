//! Periodic sampling into a bounded ring buffer. Grounded on `metric.Observer`
//! (stub `run()` selecting over `time.After(Period)`/stop/ctx.Done, tick
//! unimplemented) combined with spec §4.4's exact windowing algorithm and
//! the teacher's `background_inventory_sync` tick-loop shape
//! (`tokio::time::interval` + `MissedTickBehavior::Skip`).

use crate::measurer::Measurer;
use crate::metrics::Metrics;
use crate::reducer::{self, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Window {
    samples: Vec<f64>,
    capacity: usize,
    write_index: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.write_index] = value;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
    }
}

pub struct Observer {
    measurer: Measurer,
    method: Method,
    period: Duration,
    window: RwLock<Window>,
    metrics: Arc<Metrics>,
}

impl Observer {
    pub fn new(
        measurer: Measurer,
        method: Method,
        period: Duration,
        aggregation_amount: u8,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            measurer,
            method,
            period,
            window: RwLock::new(Window::new(aggregation_amount.max(1) as usize)),
            metrics,
        }
    }

    /// Reduce the current window. Errors if no successful sample has ever
    /// landed in the window.
    pub async fn aggregated_value(&self) -> Result<f64, reducer::EmptySequence> {
        let window = self.window.read().await;
        reducer::reduce(self.method, &window.samples)
    }

    /// Push a sample directly into the window, bypassing `measurer`.
    /// Lets tests exercise a goal's satisfaction logic against a known
    /// aggregate without running the sampling loop.
    #[cfg(test)]
    pub(crate) async fn seed(&self, value: f64) {
        self.window.write().await.push(value);
    }

    async fn tick(&self) {
        match self.measurer.measure().await {
            Ok(value) => {
                self.window.write().await.push(value);
            }
            Err(e) => {
                self.metrics.measurement_failures_total.inc();
                warn!(error = %e, "observer tick measurement failed");
            }
        }
    }

    /// Runs until `cancel` fires. First tick fires immediately, then every
    /// `period` (ticks that slip past their deadline are skipped rather
    /// than piling up, matching the teacher's interval-skip discipline).
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        self.tick().await;

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("observer stopping");
                    return;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_overwrites_oldest_once_full() {
        let mut w = Window::new(3);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        assert_eq!(w.samples, vec![1.0, 2.0, 3.0]);
        w.push(4.0);
        assert_eq!(w.samples, vec![4.0, 2.0, 3.0]);
        w.push(5.0);
        assert_eq!(w.samples, vec![4.0, 5.0, 3.0]);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut w = Window::new(2);
        for i in 0..10 {
            w.push(i as f64);
        }
        assert_eq!(w.samples.len(), 2);
    }
}
