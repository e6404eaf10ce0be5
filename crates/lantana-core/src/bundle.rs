//! Triple signature bundles and the builder that produces them.
//!
//! A build runs in a fixed order:
//!
//! 1. snapshot the bonds
//! 2. compute the synchronization report
//! 3. assemble `aggregated_data`
//! 4. every node signs `aggregated_data`
//! 5. derive the content id over `{aggregated_data, signatures}`
//! 6. notarize the content id
//! 7. record verification flags
//! 8. stamp and return the bundle
//!
//! Low coherence never aborts a build; it only clears
//! `synchronization_verified`. Callers decide whether to accept the bundle.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::{self, AnchorRecord, AnchorStatus};
use crate::bond::{Bond, BondStore};
use crate::cid;
use crate::clock::{self, Clock, SystemClock};
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::node::{NodeName, Signature, SignatureNode};
use crate::sync::{SynchronizationReport, Synchronizer};

/// Top-level keys every bundle document carries.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "bundle_type",
    "version",
    "timestamp",
    "content_id",
    "aggregated_data",
    "signatures",
    "synchronization",
    "anchor",
    "bonds",
    "verification",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub system: String,
    pub version: String,
}

/// The payload every node signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedData {
    pub system_info: SystemInfo,
    pub bonds_snapshot: Vec<Bond>,
    pub sync_report: SynchronizationReport,
}

/// Flags recorded at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFlags {
    pub all_signatures_valid: bool,
    pub synchronization_verified: bool,
    pub anchor_confirmed: bool,
    pub bonds_timestamped: bool,
}

impl VerificationFlags {
    pub fn all(&self) -> bool {
        self.all_signatures_valid
            && self.synchronization_verified
            && self.anchor_confirmed
            && self.bonds_timestamped
    }
}

/// The output of one build cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_type: String,
    pub version: String,
    #[serde(with = "clock::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub content_id: String,
    pub aggregated_data: AggregatedData,
    pub signatures: BTreeMap<NodeName, Signature>,
    pub synchronization: SynchronizationReport,
    pub anchor: AnchorRecord,
    pub bonds: Vec<Bond>,
    pub verification: VerificationFlags,
}

impl Bundle {
    /// Pretty-printed JSON, the on-disk bundle format.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Input to content id derivation.
#[derive(Serialize)]
pub(crate) struct ContentInput<'a, A: Serialize, S: Serialize> {
    pub aggregated_data: &'a A,
    pub signatures: &'a S,
}

/// Orchestrates a bundle build.
pub struct BundleBuilder {
    config: BuildConfig,
    clock: Arc<dyn Clock>,
}

impl BundleBuilder {
    /// Create a builder stamping bundles from `clock`.
    pub fn new(config: BuildConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, clock })
    }

    /// Create a builder on wall-clock time.
    pub fn with_system_clock(config: BuildConfig) -> Result<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build from a snapshot of `store`.
    pub fn build_from_store(
        &self,
        store: &impl BondStore,
        nodes: &[SignatureNode],
    ) -> Result<Bundle> {
        self.build(&store.list_bonds(), nodes)
    }

    /// Build with bonds and nodes given explicitly.
    ///
    /// Nodes are deduplicated by name, first occurrence wins. Fails with
    /// `Error::IncompleteBundle` unless all three nodes sign.
    pub fn build(&self, bonds: &[Bond], nodes: &[SignatureNode]) -> Result<Bundle> {
        let nodes = distinct_nodes(nodes);

        // 1. snapshot
        let bonds_snapshot = bonds.to_vec();
        tracing::debug!(bonds = bonds_snapshot.len(), "⚓ bonds snapshotted");

        // 2. synchronization
        let synchronizer = Synchronizer::new(self.config.min_coherence);
        let sync_report = synchronizer.report(&nodes);
        tracing::debug!(overall = sync_report.overall_coherence, "⚓ synchronization computed");

        // 3. aggregate
        let aggregated_data = AggregatedData {
            system_info: SystemInfo {
                system: self.config.system_name.clone(),
                version: self.config.version.clone(),
            },
            bonds_snapshot: bonds_snapshot.clone(),
            sync_report: sync_report.clone(),
        };

        // 4. sign
        let mut signatures = BTreeMap::new();
        for node in &nodes {
            let signature = node.sign(&aggregated_data)?;
            tracing::debug!(node = %node.name(), digest = %signature.digest, "⚓ signed");
            signatures.insert(node.name(), signature);
        }
        if signatures.len() < NodeName::ALL.len() {
            return Err(Error::IncompleteBundle {
                signed: signatures.len(),
                required: NodeName::ALL.len(),
            });
        }

        // 5. content id
        let content_id = cid::derive_cid(&ContentInput {
            aggregated_data: &aggregated_data,
            signatures: &signatures,
        })?;

        // 6. notarize
        let anchor = anchor::notarize(&content_id.cid)?;

        // 7. flags
        let verification = VerificationFlags {
            all_signatures_valid: NodeName::ALL.iter().all(|n| signatures.contains_key(n)),
            synchronization_verified: sync_report.is_verified(self.config.min_coherence),
            anchor_confirmed: anchor.status == AnchorStatus::Confirmed,
            bonds_timestamped: true,
        };

        // 8. assemble
        let bundle = Bundle {
            bundle_type: self.config.bundle_type.clone(),
            version: self.config.version.clone(),
            timestamp: self.clock.now(),
            content_id: content_id.cid,
            aggregated_data,
            signatures,
            synchronization: sync_report,
            anchor,
            bonds: bonds_snapshot,
            verification,
        };

        tracing::info!(
            cid = %bundle.content_id,
            tx = %bundle.anchor.tx_id,
            bonds = bundle.bonds.len(),
            synchronized = bundle.verification.synchronization_verified,
            "⚓ bundle built"
        );
        Ok(bundle)
    }
}

fn distinct_nodes(nodes: &[SignatureNode]) -> Vec<SignatureNode> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if seen.insert(node.name()) {
            out.push(node.clone());
        } else {
            tracing::warn!(node = %node.name(), "duplicate node ignored");
        }
    }
    out
}
