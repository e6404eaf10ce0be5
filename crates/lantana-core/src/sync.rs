//! Node synchronization and coherence scoring.
//!
//! Coherence between two nodes is a pure function of their identities and
//! current coherence levels:
//!
//! ```text
//! base   = (coherence_a + coherence_b) / 2
//! factor = 0.97 + (H(sorted names) mod 100) / 3333
//! pair   = min(1, base × factor)
//! ```
//!
//! `H` is the first eight bytes of a SHA-256 digest, read big-endian. Scores
//! are rounded to four decimals so they survive a JSON round trip unchanged.
//! Falling below the minimum is recorded, never raised.

use serde::{Deserialize, Serialize};

use crate::hash;
use crate::node::{NodeName, SignatureNode};

/// Default minimum overall coherence for a synchronized bundle.
pub const MIN_COHERENCE: f64 = 0.94;

const SYNC_FACTOR_BASE: f64 = 0.97;
const SYNC_FACTOR_SPREAD: f64 = 3333.0;

/// Coherence between one unordered pair of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCoherence {
    pub node_a: NodeName,
    pub node_b: NodeName,
    pub coherence: f64,
    /// Pair coherence meets the minimum
    pub synchronized: bool,
}

/// Pairwise scores plus their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizationReport {
    pub pairwise: Vec<PairCoherence>,
    pub overall_coherence: f64,
}

impl SynchronizationReport {
    /// True if the overall coherence meets `min_coherence`.
    pub fn is_verified(&self, min_coherence: f64) -> bool {
        self.overall_coherence >= min_coherence
    }
}

/// Per-node health shown by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Online,
    Degraded,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "ONLINE",
            NodeStatus::Degraded => "DEGRADED",
        }
    }
}

/// Computes coherence reports against a minimum threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synchronizer {
    min_coherence: f64,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(MIN_COHERENCE)
    }
}

impl Synchronizer {
    pub fn new(min_coherence: f64) -> Self {
        Self { min_coherence }
    }

    pub fn min_coherence(&self) -> f64 {
        self.min_coherence
    }

    /// Deterministic coherence between two nodes, in [0, 1].
    ///
    /// Symmetric: `pairwise_coherence(a, b) == pairwise_coherence(b, a)`.
    pub fn pairwise_coherence(&self, a: &SignatureNode, b: &SignatureNode) -> f64 {
        let base = (a.coherence() + b.coherence()) / 2.0;
        let score = (base * sync_factor(a.name(), b.name())).clamp(0.0, 1.0);
        round4(score)
    }

    /// Mean of the pairwise scores, rounded. Zero when there are no pairs.
    pub fn overall_coherence(pairs: &[PairCoherence]) -> f64 {
        if pairs.is_empty() {
            return 0.0;
        }
        let sum: f64 = pairs.iter().map(|p| p.coherence).sum();
        round4((sum / pairs.len() as f64).clamp(0.0, 1.0))
    }

    /// Score every unordered pair of `nodes`, in node order.
    pub fn report(&self, nodes: &[SignatureNode]) -> SynchronizationReport {
        let mut pairwise = Vec::with_capacity(nodes.len() * nodes.len().saturating_sub(1) / 2);
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                let coherence = self.pairwise_coherence(a, b);
                pairwise.push(PairCoherence {
                    node_a: a.name(),
                    node_b: b.name(),
                    coherence,
                    synchronized: coherence >= self.min_coherence,
                });
            }
        }

        let overall_coherence = Self::overall_coherence(&pairwise);
        if overall_coherence < self.min_coherence {
            tracing::warn!(
                overall = overall_coherence,
                minimum = self.min_coherence,
                "✗ coherence below minimum"
            );
        }

        SynchronizationReport {
            pairwise,
            overall_coherence,
        }
    }

    /// ONLINE when the node's own coherence meets the minimum.
    pub fn node_status(&self, node: &SignatureNode) -> NodeStatus {
        if node.coherence() >= self.min_coherence {
            NodeStatus::Online
        } else {
            NodeStatus::Degraded
        }
    }
}

fn sync_factor(a: NodeName, b: NodeName) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let h = hash::digest_raw(format!("{}|{}", lo, hi).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&h[..8]);
    let bucket = u64::from_be_bytes(head) % 100;
    SYNC_FACTOR_BASE + bucket as f64 / SYNC_FACTOR_SPREAD
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
