//! # Latency Window — EWMA + Regression Slope
//!
//! A bounded ring of per-batch latency samples with two derived
//! signals: an exponentially weighted moving average and an
//! ordinary-least-squares slope of latency against ring position.
//! The EWMA reacts to level shifts; the slope catches drift before the
//! level crosses a threshold — together they are the predictive half
//! of the failover trigger.

use std::collections::VecDeque;

/// One latency observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    /// Milliseconds since the Unix epoch.
    pub ts_ms: i64,
    pub latency_ms: f64,
}

/// Bounded FIFO of latency samples with EWMA and slope.
///
/// The EWMA is undefined until the first sample arrives and is then
/// initialised to that sample — never blended with zero.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<LatencySample>,
    capacity: usize,
    alpha: f64,
    ewma: Option<f64>,
}

impl LatencyWindow {
    /// `capacity` is the hard sample bound W; `alpha` ∈ (0, 1].
    pub fn new(capacity: usize, alpha: f64) -> Self {
        LatencyWindow {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            ewma: None,
        }
    }

    /// Record a sample, evicting the oldest when the ring is full.
    pub fn record(&mut self, ts_ms: i64, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(LatencySample { ts_ms, latency_ms });

        self.ewma = Some(match self.ewma {
            None => latency_ms,
            Some(prev) => self.alpha * latency_ms + (1.0 - self.alpha) * prev,
        });
    }

    pub fn ewma(&self) -> Option<f64> {
        self.ewma
    }

    /// OLS regression slope of latency against 0-based ring index.
    ///
    /// Unit: ms per batch position (nominally ms/s). Returns 0 when
    /// the denominator degenerates (fewer than two samples).
    pub fn slope(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }

        let nf = n as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xy = 0.0;
        let mut sum_xx = 0.0;
        for (i, sample) in self.samples.iter().enumerate() {
            let x = i as f64;
            sum_x += x;
            sum_y += sample.latency_ms;
            sum_xy += x * sample.latency_ms;
            sum_xx += x * x;
        }

        let denom = nf * sum_xx - sum_x * sum_x;
        if denom.abs() < f64::EPSILON {
            return 0.0;
        }
        (nf * sum_xy - sum_x * sum_y) / denom
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&LatencySample> {
        self.samples.back()
    }

    pub fn samples(&self) -> impl Iterator<Item = &LatencySample> {
        self.samples.iter()
    }

    /// Drop every sample and the EWMA. The controller does this after a
    /// failover so the debounce restarts against the new path set.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.ewma = None;
    }
}
