//! Simulated permanent-storage anchoring.
//!
//! Notarization here is a hash, not a network call. The transaction id is
//! derived from the content id alone, and every record reports
//! `CONFIRMED` / `ETERNAL` because nothing can go wrong short of a hashing
//! failure. No transaction is ever submitted anywhere; callers must not
//! treat an [`AnchorRecord`] as evidence of external persistence.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash;

/// Domain tag prepended to the content id before hashing.
pub const ANCHOR_SCHEME: &str = "ar:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorStatus {
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permanence {
    Eternal,
}

/// Result of notarizing a content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub tx_id: String,
    pub status: AnchorStatus,
    pub permanence: Permanence,
}

/// Deterministic transaction id for `content_id`.
pub fn transaction_id(content_id: &str) -> String {
    let mut preimage = String::with_capacity(ANCHOR_SCHEME.len() + content_id.len());
    preimage.push_str(ANCHOR_SCHEME);
    preimage.push_str(content_id);
    hash::digest_bytes(preimage.as_bytes())
}

/// Notarize `content_id`.
pub fn notarize(content_id: &str) -> Result<AnchorRecord> {
    let tx_id = transaction_id(content_id);
    tracing::debug!(content_id, tx = %tx_id, "⚓ content id notarized (simulated)");
    Ok(AnchorRecord {
        tx_id,
        status: AnchorStatus::Confirmed,
        permanence: Permanence::Eternal,
    })
}
