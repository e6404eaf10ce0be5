//! Bundle verification.
//!
//! Verification works on the parsed JSON document rather than the typed
//! [`Bundle`], so a bundle damaged inside one field still yields a report
//! naming that field instead of a parse error. Only a document missing
//! required top-level fields is rejected outright.
//!
//! Every check compares one recorded field with the value it must hold given
//! the recorded `aggregated_data`. The content id is recomputed over the
//! expected signatures. The transaction id is accepted if it notarizes either
//! the recorded or the expected content id, and the expected verification
//! flags are the ones a builder would have recorded for `aggregated_data`.
//! Changing a single field therefore fails exactly one check.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};

use crate::anchor;
use crate::clock;
use crate::bundle::{Bundle, ContentInput, VerificationFlags, REQUIRED_FIELDS};
use crate::cid;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::node::{NodeIdentity, NodeName};
use crate::sync::{SynchronizationReport, Synchronizer};

/// Check names reported in [`VerificationResult::failed_checks`].
pub mod checks {
    use crate::node::NodeName;

    pub const BUNDLE_TYPE_MISMATCH: &str = "bundle_type_mismatch";
    pub const VERSION_MISMATCH: &str = "version_mismatch";
    pub const TIMESTAMP_INVALID: &str = "timestamp_invalid";
    pub const CONTENT_ID_MISMATCH: &str = "content_id_mismatch";
    pub const TX_ID_MISMATCH: &str = "tx_id_mismatch";
    pub const ANCHOR_NOT_CONFIRMED: &str = "anchor_not_confirmed";
    pub const COHERENCE_MISMATCH: &str = "coherence_mismatch";
    pub const COHERENCE_BELOW_THRESHOLD: &str = "coherence_below_threshold";
    pub const SYNCHRONIZATION_MISMATCH: &str = "synchronization_mismatch";
    pub const BONDS_MISMATCH: &str = "bonds_mismatch";
    pub const VERIFICATION_FLAGS_MISMATCH: &str = "verification_flags_mismatch";
    pub const BUNDLE_UNENCODABLE: &str = "bundle_unencodable";

    pub fn signature_missing(node: NodeName) -> String {
        format!("signature_{}_missing", node)
    }

    pub fn signature_mismatch(node: NodeName) -> String {
        format!("signature_{}_mismatch", node)
    }

    pub fn bond_timestamp_missing(bond_id: &str) -> String {
        format!("bond_{}_timestamp_missing", bond_id)
    }

    pub fn unexpected_field(key: &str) -> String {
        format!("unexpected_field_{}", key)
    }
}

/// Outcome of verifying one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub failed_checks: BTreeSet<String>,
}

impl VerificationResult {
    fn from_failures(failed_checks: BTreeSet<String>) -> Self {
        Self {
            valid: failed_checks.is_empty(),
            failed_checks,
        }
    }

    /// True if `check` is among the failures.
    pub fn failed(&self, check: &str) -> bool {
        self.failed_checks.contains(check)
    }
}

/// Re-derives and checks every field of a bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleVerifier {
    config: BuildConfig,
}

impl BundleVerifier {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Verify a typed bundle.
    pub fn verify(&self, bundle: &Bundle) -> VerificationResult {
        match serde_json::to_value(bundle) {
            Ok(doc) => self.check_document(&doc),
            Err(e) => {
                tracing::warn!(error = %e, "bundle could not be encoded for verification");
                VerificationResult::from_failures(BTreeSet::from([
                    checks::BUNDLE_UNENCODABLE.to_string(),
                ]))
            }
        }
    }

    /// Verify bundle JSON text.
    pub fn verify_json(&self, json: &str) -> Result<VerificationResult> {
        let doc: Value = serde_json::from_str(json)?;
        self.verify_document(&doc)
    }

    /// Verify a parsed bundle document.
    ///
    /// Returns `Error::MalformedBundle` only when required top-level fields
    /// are absent; every other problem is reported in the result.
    pub fn verify_document(&self, doc: &Value) -> Result<VerificationResult> {
        let missing = missing_fields(doc);
        if !missing.is_empty() {
            return Err(Error::MalformedBundle { missing });
        }
        Ok(self.check_document(doc))
    }

    fn check_document(&self, doc: &Value) -> VerificationResult {
        let mut failed = BTreeSet::new();
        let aggregated = &doc["aggregated_data"];

        for key in unexpected_fields(doc) {
            failed.insert(checks::unexpected_field(&key));
        }
        if doc["bundle_type"].as_str() != Some(self.config.bundle_type.as_str()) {
            failed.insert(checks::BUNDLE_TYPE_MISMATCH.to_string());
        }
        if doc["version"].as_str() != Some(self.config.version.as_str()) {
            failed.insert(checks::VERSION_MISMATCH.to_string());
        }
        if !doc["timestamp"].as_str().is_some_and(clock::is_bundle_timestamp) {
            failed.insert(checks::TIMESTAMP_INVALID.to_string());
        }

        // Signatures, and the signature map they imply
        let mut expected_signatures = doc["signatures"].clone();
        for name in NodeName::ALL {
            let Some(entry) = doc["signatures"].get(name.as_str()) else {
                failed.insert(checks::signature_missing(name));
                continue;
            };
            match expected_digest(name, entry, aggregated) {
                Some(expected) => {
                    if entry["digest"].as_str() != Some(expected.as_str()) {
                        failed.insert(checks::signature_mismatch(name));
                    }
                    expected_signatures[name.as_str()]["digest"] = Value::String(expected);
                }
                None => {
                    failed.insert(checks::signature_mismatch(name));
                }
            }
        }

        // Content id over the expected signatures
        let recorded_cid = doc["content_id"].as_str().unwrap_or_default();
        let mut notarized = vec![anchor::transaction_id(recorded_cid)];
        match cid::derive_cid(&ContentInput {
            aggregated_data: aggregated,
            signatures: &expected_signatures,
        }) {
            Ok(expected_cid) => {
                if !expected_cid.matches(recorded_cid) {
                    failed.insert(checks::CONTENT_ID_MISMATCH.to_string());
                }
                notarized.push(anchor::transaction_id(&expected_cid.cid));
            }
            Err(e) => {
                tracing::warn!(error = %e, "content id could not be recomputed");
                failed.insert(checks::CONTENT_ID_MISMATCH.to_string());
            }
        }

        // Tx id over the recorded or the expected content id
        let tx_ok = doc["anchor"]["tx_id"]
            .as_str()
            .is_some_and(|tx| notarized.iter().any(|n| n == tx));
        if !tx_ok {
            failed.insert(checks::TX_ID_MISMATCH.to_string());
        }

        let anchor_confirmed = doc["anchor"]["status"] == json!("CONFIRMED")
            && doc["anchor"]["permanence"] == json!("ETERNAL");
        if !anchor_confirmed {
            failed.insert(checks::ANCHOR_NOT_CONFIRMED.to_string());
        }

        // Coherence, from the signed copy of the report
        let mut synchronization_verified = false;
        match serde_json::from_value::<SynchronizationReport>(aggregated["sync_report"].clone()) {
            Ok(report) => {
                let recomputed = Synchronizer::overall_coherence(&report.pairwise);
                if report.pairwise.len() != NodeName::ALL.len()
                    || recomputed != report.overall_coherence
                {
                    failed.insert(checks::COHERENCE_MISMATCH.to_string());
                }
                synchronization_verified = report.is_verified(self.config.min_coherence);
                if !synchronization_verified {
                    failed.insert(checks::COHERENCE_BELOW_THRESHOLD.to_string());
                }
            }
            Err(_) => {
                failed.insert(checks::COHERENCE_MISMATCH.to_string());
            }
        }
        if doc["synchronization"] != aggregated["sync_report"] {
            failed.insert(checks::SYNCHRONIZATION_MISMATCH.to_string());
        }

        // Bonds, timestamps read from the signed snapshot
        if doc["bonds"] != aggregated["bonds_snapshot"] || !doc["bonds"].is_array() {
            failed.insert(checks::BONDS_MISMATCH.to_string());
        }
        let mut bonds_timestamped = true;
        if let Some(bonds) = aggregated["bonds_snapshot"].as_array() {
            for (i, bond) in bonds.iter().enumerate() {
                let stamped = bond["created_at"]
                    .as_str()
                    .is_some_and(clock::is_bundle_timestamp);
                if !stamped {
                    bonds_timestamped = false;
                    let id = bond["id"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| i.to_string());
                    failed.insert(checks::bond_timestamp_missing(&id));
                }
            }
        }

        // Flags a builder would record for this aggregated_data. A builder
        // never emits a partially signed or unanchored bundle.
        let expected_flags = VerificationFlags {
            all_signatures_valid: true,
            synchronization_verified,
            anchor_confirmed: true,
            bonds_timestamped,
        };
        let flags_agree = serde_json::from_value::<VerificationFlags>(doc["verification"].clone())
            .map(|recorded| recorded == expected_flags)
            .unwrap_or(false);
        if !flags_agree {
            failed.insert(checks::VERIFICATION_FLAGS_MISMATCH.to_string());
        }

        let result = VerificationResult::from_failures(failed);
        if result.valid {
            tracing::info!("✓ bundle verified");
        } else {
            tracing::warn!(failed = ?result.failed_checks, "✗ bundle failed verification");
        }
        result
    }
}

/// Required top-level fields absent from `doc`.
pub fn missing_fields(doc: &Value) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|f| doc.get(**f).is_none())
        .map(|f| f.to_string())
        .collect()
}

/// Top-level keys `doc` carries beyond the bundle fields.
pub fn unexpected_fields(doc: &Value) -> Vec<String> {
    doc.as_object()
        .map(|obj| {
            obj.keys()
                .filter(|k| !REQUIRED_FIELDS.contains(&k.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Digest the entry's node should have produced, if the entry is readable
/// and belongs to `name`.
fn expected_digest(name: NodeName, entry: &Value, aggregated: &Value) -> Option<String> {
    let identity: NodeIdentity = serde_json::from_value(entry["node"].clone()).ok()?;
    if identity.name != name {
        return None;
    }
    identity.attest(aggregated).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::{BondRegistry, BondStore};
    use crate::bundle::BundleBuilder;
    use crate::clock::{Clock, FixedClock};
    use crate::node::{default_nodes, SignatureNode};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn built() -> Value {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        let mut reg = BondRegistry::new(clock.clone());
        reg.add_bond("001", "IDRO", BTreeMap::new()).unwrap();
        let bundle = BundleBuilder::new(BuildConfig::default(), clock)
            .unwrap()
            .build(&reg.list_bonds(), &default_nodes())
            .unwrap();
        serde_json::to_value(&bundle).unwrap()
    }

    fn failures(doc: &Value) -> Vec<String> {
        BundleVerifier::default()
            .verify_document(doc)
            .unwrap()
            .failed_checks
            .into_iter()
            .collect()
    }

    #[test]
    fn untouched_bundle_is_valid() {
        let result = BundleVerifier::default().verify_document(&built()).unwrap();
        assert!(result.valid);
        assert!(result.failed_checks.is_empty());
    }

    #[test]
    fn flipped_signature_digit() {
        let mut doc = built();
        let digest = doc["signatures"]["NodeB"]["digest"].as_str().unwrap().to_string();
        let flipped = if digest.starts_with('0') {
            format!("1{}", &digest[1..])
        } else {
            format!("0{}", &digest[1..])
        };
        doc["signatures"]["NodeB"]["digest"] = json!(flipped);
        assert_eq!(failures(&doc), vec!["signature_NodeB_mismatch"]);
    }

    #[test]
    fn replaced_content_id() {
        let mut doc = built();
        doc["content_id"] = json!("QmNotTheRightOne");
        assert_eq!(failures(&doc), vec!["content_id_mismatch"]);
    }

    #[test]
    fn replaced_tx_id() {
        let mut doc = built();
        doc["anchor"]["tx_id"] = json!("00");
        assert_eq!(failures(&doc), vec!["tx_id_mismatch"]);
    }

    #[test]
    fn removed_signature() {
        let mut doc = built();
        doc["signatures"].as_object_mut().unwrap().remove("NodeC");
        let failed = failures(&doc);
        assert!(failed.contains(&"signature_NodeC_missing".to_string()));
        assert!(!failed.contains(&"verification_flags_mismatch".to_string()));
    }

    #[test]
    fn unconfirmed_anchor_fails_once() {
        let mut doc = built();
        doc["anchor"]["status"] = json!("PENDING");
        assert_eq!(failures(&doc), vec!["anchor_not_confirmed"]);
    }

    #[test]
    fn edited_signing_coherence_fails_once() {
        let mut doc = built();
        doc["signatures"]["NodeA"]["coherence_at_signing"] = json!(0.1);
        assert_eq!(failures(&doc), vec!["content_id_mismatch"]);
    }

    #[test]
    fn content_id_and_tx_id_forged_together() {
        let mut doc = built();
        doc["content_id"] = json!("QmForged");
        doc["anchor"]["tx_id"] = json!(anchor::transaction_id("QmForged"));
        assert_eq!(failures(&doc), vec!["content_id_mismatch"]);
    }

    #[test]
    fn extra_top_level_field() {
        let mut doc = built();
        doc["status"] = json!("COMPLETE");
        assert_eq!(failures(&doc), vec!["unexpected_field_status"]);
    }

    #[test]
    fn offset_timestamp_is_invalid() {
        let mut doc = built();
        doc["timestamp"] = json!("2024-06-15T14:00:00+02:00");
        assert_eq!(failures(&doc), vec!["timestamp_invalid"]);
    }

    #[test]
    fn unreadable_signature_entry() {
        let mut doc = built();
        doc["signatures"]["NodeA"]["node"] = json!(42);
        let failed = failures(&doc);
        assert!(failed.contains(&"signature_NodeA_mismatch".to_string()));
    }

    #[test]
    fn signature_filed_under_wrong_node() {
        let mut doc = built();
        let a = doc["signatures"]["NodeA"].clone();
        doc["signatures"]["NodeB"] = a;
        assert!(failures(&doc).contains(&"signature_NodeB_mismatch".to_string()));
    }

    #[test]
    fn edited_top_level_synchronization() {
        let mut doc = built();
        doc["synchronization"]["overall_coherence"] = json!(0.5);
        assert_eq!(failures(&doc), vec!["synchronization_mismatch"]);
    }

    #[test]
    fn edited_top_level_bonds() {
        let mut doc = built();
        doc["bonds"][0]["name"] = json!("HELIOS");
        assert_eq!(failures(&doc), vec!["bonds_mismatch"]);
    }

    #[test]
    fn null_bond_timestamp() {
        let mut doc = built();
        doc["bonds"][0]["created_at"] = Value::Null;
        doc["aggregated_data"]["bonds_snapshot"][0]["created_at"] = Value::Null;
        let failed = failures(&doc);
        assert!(failed.contains(&"bond_001_timestamp_missing".to_string()));
        assert!(failed.contains(&"verification_flags_mismatch".to_string()));
    }

    #[test]
    fn unparseable_bond_timestamp() {
        let mut doc = built();
        doc["aggregated_data"]["bonds_snapshot"][0]["created_at"] = json!("x");
        assert!(failures(&doc).contains(&"bond_001_timestamp_missing".to_string()));
    }

    #[test]
    fn edited_top_level_bond_timestamp() {
        let mut doc = built();
        doc["bonds"][0]["created_at"] = json!("x");
        assert_eq!(failures(&doc), vec!["bonds_mismatch"]);
    }

    #[test]
    fn flipped_flag() {
        let mut doc = built();
        doc["verification"]["anchor_confirmed"] = json!(false);
        assert_eq!(failures(&doc), vec!["verification_flags_mismatch"]);
    }

    #[test]
    fn wrong_bundle_type() {
        let mut doc = built();
        doc["bundle_type"] = json!("Something Else");
        assert_eq!(failures(&doc), vec!["bundle_type_mismatch"]);
    }

    #[test]
    fn garbage_timestamp() {
        let mut doc = built();
        doc["timestamp"] = json!("yesterday");
        assert_eq!(failures(&doc), vec!["timestamp_invalid"]);
    }

    #[test]
    fn tampered_aggregated_data_breaks_signatures() {
        let mut doc = built();
        doc["aggregated_data"]["system_info"]["system"] = json!("Other OS");
        let failed = failures(&doc);
        for name in NodeName::ALL {
            assert!(failed.contains(&checks::signature_mismatch(name)));
        }
    }

    #[test]
    fn low_coherence_bundle_reports_threshold() {
        let nodes: Vec<SignatureNode> = default_nodes()
            .into_iter()
            .map(|n| n.with_coherence(0.5))
            .collect();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        let bundle = BundleBuilder::new(BuildConfig::default(), clock)
            .unwrap()
            .build(&[], &nodes)
            .unwrap();
        let result = BundleVerifier::default().verify(&bundle);
        assert!(!result.valid);
        assert_eq!(
            result.failed_checks.into_iter().collect::<Vec<_>>(),
            vec!["coherence_below_threshold"]
        );
    }

    #[test]
    fn missing_top_level_fields_is_malformed() {
        let mut doc = built();
        let obj = doc.as_object_mut().unwrap();
        obj.remove("anchor");
        obj.remove("signatures");
        match BundleVerifier::default().verify_document(&doc) {
            Err(Error::MalformedBundle { missing }) => {
                assert_eq!(missing, vec!["signatures", "anchor"]);
            }
            other => panic!("expected MalformedBundle, got {:?}", other),
        }
    }

    #[test]
    fn non_object_document_is_malformed() {
        let err = BundleVerifier::default()
            .verify_document(&json!([1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedBundle { ref missing } if missing.len() == 10));
    }

    #[test]
    fn invalid_json_text_is_serialization_error() {
        let err = BundleVerifier::default().verify_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
