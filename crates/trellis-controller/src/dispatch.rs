//! # Ingress Dispatch
//!
//! Virtual mode samples a registered path by load weight and charges
//! the batch the path's estimated latency. Physical mode walks the
//! active path link by link, charging transmission + propagation +
//! jitter per hop and thinning the batch through a Bernoulli loss
//! filter.

use rand::rngs::SmallRng;
use rand::RngExt as _;

use trellis_common::protocol::Event;
use trellis_fabric::Topology;

/// Weighted random pick over `(id, weight)` bands.
///
/// `u` is a draw from [0, 100); the candidate whose cumulative band
/// contains `u` wins. When the weights sum below 100 and `u` falls
/// past the final band, the last candidate wins — the bands cover the
/// whole draw space by construction.
pub fn pick_weighted(candidates: &[(u64, f64)], u: f64) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    let mut cumulative = 0.0;
    for (index, &(_, weight)) in candidates.iter().enumerate() {
        cumulative += weight.max(0.0);
        if u < cumulative {
            return Some(index);
        }
    }
    Some(candidates.len() - 1)
}

/// Approximate wire size of a batch, used for the per-link
/// transmission term in physical mode.
pub fn estimate_batch_bytes(events: &[Event]) -> usize {
    serde_json::to_vec(events)
        .map(|body| body.len())
        .unwrap_or(events.len() * 256)
}

/// What happened to a batch crossing the physical path.
#[derive(Debug, Clone, Copy)]
pub struct TraversalOutcome {
    pub delay_ms: f64,
    pub accepted: usize,
    pub dropped: usize,
}

/// Walk `path` hop by hop. Each link charges
/// `(bytes·8 / bw_bps)·1000 + delay + uniform(−jitter, +jitter)` ms and
/// filters every surviving event through Bernoulli(loss). Losing every
/// event is a legitimate outcome, not an error.
pub fn traverse_physical(
    topology: &Topology,
    path: &[u64],
    events: usize,
    bytes: usize,
    rng: &mut SmallRng,
) -> TraversalOutcome {
    let mut survivors = events;
    let mut delay_ms = 0.0;

    for hop in path.windows(2) {
        let Some(link) = topology.link_between(hop[0], hop[1]) else {
            survivors = 0;
            break;
        };

        let transmission_ms = (bytes as f64 * 8.0) / (link.bandwidth_mbps * 1e6) * 1000.0;
        let jitter_ms = (rng.random::<f64>() * 2.0 - 1.0) * link.jitter_ms;
        delay_ms += transmission_ms + link.delay_ms + jitter_ms;

        if link.loss_rate > 0.0 {
            survivors = (0..survivors)
                .filter(|_| rng.random::<f64>() >= link.loss_rate)
                .count();
        }
        if survivors == 0 {
            break;
        }
    }

    TraversalOutcome {
        delay_ms: delay_ms.max(0.0),
        accepted: survivors,
        dropped: events - survivors,
    }
}
