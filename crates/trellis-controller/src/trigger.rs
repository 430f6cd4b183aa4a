//! # Predictive Trigger
//!
//! Two independent conditions, OR-combined:
//!
//! 1. **Latency drift** — aggregate `ewma > ewma_max_ms` AND
//!    `slope > slope_min_ms_per_s`, held continuously for the hold
//!    duration. The hold timer resets the instant the predicate goes
//!    false, so a single calm batch restarts the debounce.
//! 2. **Resource pressure** — any known node over the CPU or buffer
//!    ceiling. Fires immediately, no hold.

use std::collections::BTreeMap;

use quanta::Instant;

use trellis_common::incident::FailoverReason;
use trellis_common::models::NodeHealth;

use crate::config::Thresholds;

/// Stateful trigger evaluator. One instance per controller; the hold
/// timer is the only state.
#[derive(Debug)]
pub struct TriggerEvaluator {
    thresholds: Thresholds,
    trigger_start: Option<Instant>,
}

impl TriggerEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        TriggerEvaluator {
            thresholds,
            trigger_start: None,
        }
    }

    /// When the drift predicate first became true, if it is still true.
    pub fn trigger_started(&self) -> Option<Instant> {
        self.trigger_start
    }

    /// Evaluate both triggers against the current aggregate signals.
    pub fn evaluate(
        &mut self,
        ewma: Option<f64>,
        slope: f64,
        node_health: &BTreeMap<u64, NodeHealth>,
        now: Instant,
    ) -> Option<FailoverReason> {
        let drifting = ewma.is_some_and(|e| e > self.thresholds.ewma_max_ms)
            && slope > self.thresholds.slope_min_ms_per_s;

        if drifting {
            let started = *self.trigger_start.get_or_insert(now);
            if now.saturating_duration_since(started) >= self.thresholds.hold {
                return Some(FailoverReason::LatencyDrift);
            }
        } else {
            self.trigger_start = None;
        }

        let pressured = node_health
            .values()
            .any(|h| h.cpu > self.thresholds.cpu_max || h.buffer_pct > self.thresholds.buf_max_pct);
        if pressured {
            return Some(FailoverReason::ResourcePressure);
        }

        None
    }

    /// Clear the hold timer. Called after a failover so the debounce
    /// restarts against the new path set.
    pub fn reset(&mut self) {
        self.trigger_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn no_pressure() -> BTreeMap<u64, NodeHealth> {
        BTreeMap::new()
    }

    fn evaluator() -> TriggerEvaluator {
        TriggerEvaluator::new(Thresholds::default())
    }

    // ─── Hold debounce ──────────────────────────────────────────────────

    #[test]
    fn drift_does_not_fire_before_hold() {
        let mut trig = evaluator();
        let t0 = Instant::now();

        assert_eq!(trig.evaluate(Some(150.0), 10.0, &no_pressure(), t0), None);
        let just_short = t0 + Duration::from_millis(2_900);
        assert_eq!(
            trig.evaluate(Some(150.0), 10.0, &no_pressure(), just_short),
            None
        );
    }

    #[test]
    fn drift_fires_after_hold() {
        let mut trig = evaluator();
        let t0 = Instant::now();

        trig.evaluate(Some(150.0), 10.0, &no_pressure(), t0);
        let past_hold = t0 + Duration::from_millis(3_100);
        assert_eq!(
            trig.evaluate(Some(150.0), 10.0, &no_pressure(), past_hold),
            Some(FailoverReason::LatencyDrift)
        );
    }

    #[test]
    fn predicate_flicker_resets_the_hold() {
        let mut trig = evaluator();
        let t0 = Instant::now();

        trig.evaluate(Some(150.0), 10.0, &no_pressure(), t0);
        // One calm observation 2 s in wipes the timer...
        trig.evaluate(Some(60.0), 0.0, &no_pressure(), t0 + Duration::from_secs(2));
        // ...so 4 s from t0 is only 1 s of renewed drift.
        assert_eq!(
            trig.evaluate(
                Some(150.0),
                10.0,
                &no_pressure(),
                t0 + Duration::from_secs(4)
            ),
            None
        );
        // But 3 s after the restart it fires.
        assert_eq!(
            trig.evaluate(
                Some(150.0),
                10.0,
                &no_pressure(),
                t0 + Duration::from_millis(6_100)
            ),
            Some(FailoverReason::LatencyDrift)
        );
    }

    #[test]
    fn both_halves_of_the_drift_predicate_are_required() {
        let mut trig = evaluator();
        let t0 = Instant::now();

        // High EWMA, flat slope: no drift.
        trig.evaluate(Some(150.0), 0.0, &no_pressure(), t0);
        assert!(trig.trigger_started().is_none());

        // Steep slope, low EWMA: no drift.
        trig.evaluate(Some(60.0), 20.0, &no_pressure(), t0);
        assert!(trig.trigger_started().is_none());
    }

    #[test]
    fn undefined_ewma_never_drifts() {
        let mut trig = evaluator();
        assert_eq!(trig.evaluate(None, 50.0, &no_pressure(), Instant::now()), None);
        assert!(trig.trigger_started().is_none());
    }

    // ─── Resource pressure ──────────────────────────────────────────────

    #[test]
    fn cpu_pressure_fires_immediately() {
        let mut trig = evaluator();
        let mut health = BTreeMap::new();
        health.insert(
            9,
            NodeHealth {
                cpu: 0.92,
                buffer_pct: 0.1,
            },
        );
        assert_eq!(
            trig.evaluate(Some(50.0), 0.0, &health, Instant::now()),
            Some(FailoverReason::ResourcePressure)
        );
    }

    #[test]
    fn buffer_pressure_fires_immediately() {
        let mut trig = evaluator();
        let mut health = BTreeMap::new();
        health.insert(
            12,
            NodeHealth {
                cpu: 0.2,
                buffer_pct: 0.95,
            },
        );
        assert_eq!(
            trig.evaluate(None, 0.0, &health, Instant::now()),
            Some(FailoverReason::ResourcePressure)
        );
    }

    #[test]
    fn healthy_nodes_do_not_fire() {
        let mut trig = evaluator();
        let mut health = BTreeMap::new();
        health.insert(
            9,
            NodeHealth {
                cpu: 0.5,
                buffer_pct: 0.5,
            },
        );
        assert_eq!(trig.evaluate(Some(50.0), 0.0, &health, Instant::now()), None);
    }

    // ─── Reset ──────────────────────────────────────────────────────────

    #[test]
    fn reset_clears_the_hold_timer() {
        let mut trig = evaluator();
        let t0 = Instant::now();
        trig.evaluate(Some(150.0), 10.0, &no_pressure(), t0);
        assert!(trig.trigger_started().is_some());

        trig.reset();
        assert!(trig.trigger_started().is_none());

        // Needs a full fresh hold after reset.
        assert_eq!(
            trig.evaluate(
                Some(150.0),
                10.0,
                &no_pressure(),
                t0 + Duration::from_secs(10)
            ),
            None
        );
    }
}
