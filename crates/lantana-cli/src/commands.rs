//! Subcommand implementations.
//!
//! Reports are rendered to strings and printed by the command functions.

use std::collections::BTreeMap;
use std::path::Path;

use lantana_core::verify::checks;
use lantana_core::{
    default_nodes, persist, BondRegistry, BondStore, BuildConfig, Bundle, BundleBuilder,
    BundleVerifier, NodeName, Synchronizer, VerificationResult,
};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::logging::prefix;

const RULE_WIDTH: usize = 80;

/// Bonds registered when `anchor` is given no `--peace-bond`:
/// (id, name, type, region, commitment).
const DEFAULT_BONDS: [(&str, &str, &str, &str, &str); 2] = [
    (
        "001",
        "IDRO",
        "Water Resources",
        "Mediterranean Basin",
        "Sustainable water management and equitable distribution",
    ),
    (
        "002",
        "HELIOS",
        "Solar Energy",
        "Global",
        "Renewable energy transition and solar infrastructure",
    ),
];

/// A bond given on the command line as `ID:NAME:TYPE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeaceBondSpec {
    pub id: String,
    pub name: String,
    pub kind: String,
}

impl PeaceBondSpec {
    /// Split on the first two colons; TYPE keeps any further colons.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parts = input.splitn(3, ':').map(str::trim);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(name), Some(kind))
                if !id.is_empty() && !name.is_empty() && !kind.is_empty() =>
            {
                Ok(Self {
                    id: id.to_string(),
                    name: name.to_string(),
                    kind: kind.to_string(),
                })
            }
            _ => Err(Error::InvalidPeaceBond {
                input: input.to_string(),
            }),
        }
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("type".to_string(), self.kind.clone()),
            ("custom".to_string(), "true".to_string()),
        ])
    }
}

fn register_default_bonds(registry: &mut BondRegistry) -> Result<()> {
    for (id, name, kind, region, commitment) in DEFAULT_BONDS {
        let metadata = BTreeMap::from([
            ("type".to_string(), kind.to_string()),
            ("region".to_string(), region.to_string()),
            ("commitment".to_string(), commitment.to_string()),
        ]);
        registry.add_bond(id, name, metadata)?;
    }
    Ok(())
}

/// `anchor`: register bonds, build a bundle and write it to `output`.
///
/// Every `--peace-bond` is parsed before anything is registered, so a bad
/// argument leaves no file behind.
pub fn anchor(config: &BuildConfig, peace_bonds: &[String], output: &Path) -> Result<Bundle> {
    let specs = peace_bonds
        .iter()
        .map(|s| PeaceBondSpec::parse(s))
        .collect::<Result<Vec<_>>>()?;

    let mut registry = BondRegistry::with_system_clock();
    if specs.is_empty() {
        register_default_bonds(&mut registry)?;
    } else {
        for spec in &specs {
            registry.add_bond(spec.id.clone(), spec.name.clone(), spec.metadata())?;
        }
    }
    tracing::info!(bonds = registry.len(), "{} anchoring procedure started", prefix::ANCHOR);

    let builder = BundleBuilder::with_system_clock(config.clone())?;
    let bundle = builder.build_from_store(&registry, &default_nodes())?;
    persist::write_bundle(output, &bundle)?;

    println!("{}", render_anchor_summary(&bundle, output));
    Ok(bundle)
}

/// `verify`: print a report for the bundle at `path`. Returns validity.
///
/// A bundle missing required fields is reported and counted invalid; an
/// unreadable file is an error.
pub fn verify(config: &BuildConfig, path: &Path) -> Result<bool> {
    let doc = persist::read_document(path)?;
    let verifier = BundleVerifier::new(config.clone());
    match verifier.verify_document(&doc) {
        Ok(result) => {
            println!("{}", render_verification(&doc, &result, config.min_coherence));
            Ok(result.valid)
        }
        Err(lantana_core::Error::MalformedBundle { missing }) => {
            println!("{}", render_malformed(&missing));
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// `status`: print node and synchronization status.
pub fn status(config: &BuildConfig) {
    println!("{}", render_status(config));
}

pub fn render_anchor_summary(bundle: &Bundle, output: &Path) -> String {
    let overall = bundle.synchronization.overall_coherence;
    let state = if bundle.verification.synchronization_verified {
        "synchronized"
    } else {
        "below minimum"
    };
    [
        String::new(),
        format!(
            "{} Triple Signature Bundle saved to: {}",
            prefix::OK,
            output.display()
        ),
        format!("  CID: {}", bundle.content_id),
        format!("  TX ID: {}", bundle.anchor.tx_id),
        format!("  Bonds: {}", bundle.bonds.len()),
        format!("  Coherence: {:.4} ({})", overall, state),
    ]
    .join("\n")
}

pub fn render_verification(doc: &Value, result: &VerificationResult, min_coherence: f64) -> String {
    let mut out = Vec::new();
    header(&mut out, "TRIPLE SIGNATURE BUNDLE VERIFICATION");

    section(&mut out, "Structure");
    out.push(format!("  {} All required fields present", prefix::OK));

    section(&mut out, "Bundle Type");
    out.push(format!(
        "  {} {}",
        mark(!result.failed(checks::BUNDLE_TYPE_MISMATCH)),
        text(&doc["bundle_type"])
    ));
    out.push(format!(
        "  {} version {}",
        mark(!result.failed(checks::VERSION_MISMATCH)),
        text(&doc["version"])
    ));
    out.push(format!(
        "  {} timestamp {}",
        mark(!result.failed(checks::TIMESTAMP_INVALID)),
        text(&doc["timestamp"])
    ));

    section(&mut out, "Signatures");
    for name in NodeName::ALL {
        if result.failed(&checks::signature_missing(name)) {
            out.push(format!("  {} Missing signature from {}", prefix::FAIL, name));
            continue;
        }
        let digest = text(&doc["signatures"][name.as_str()]["digest"]);
        out.push(format!(
            "  {} {}: {}",
            mark(!result.failed(&checks::signature_mismatch(name))),
            name,
            abbreviate(&digest)
        ));
    }

    section(&mut out, "Node Synchronization");
    let sync = &doc["aggregated_data"]["sync_report"];
    out.push(format!("  Overall Coherence: {}", text(&sync["overall_coherence"])));
    for pair in sync["pairwise"].as_array().into_iter().flatten() {
        out.push(format!(
            "  {} {} <-> {}: {}",
            mark(pair["synchronized"].as_bool().unwrap_or(false)),
            text(&pair["node_a"]),
            text(&pair["node_b"]),
            text(&pair["coherence"])
        ));
    }
    if result.failed(checks::COHERENCE_BELOW_THRESHOLD) {
        out.push(format!(
            "  {} Coherence {} below minimum {}",
            prefix::FAIL,
            text(&sync["overall_coherence"]),
            min_coherence
        ));
    }
    if result.failed(checks::COHERENCE_MISMATCH) {
        out.push(format!(
            "  {} Recorded coherence does not match the pairwise scores",
            prefix::FAIL
        ));
    }
    if result.failed(checks::SYNCHRONIZATION_MISMATCH) {
        out.push(format!(
            "  {} Top-level synchronization differs from the signed report",
            prefix::FAIL
        ));
    }

    section(&mut out, "Anchor");
    out.push(format!(
        "  {} CID: {}",
        mark(!result.failed(checks::CONTENT_ID_MISMATCH)),
        text(&doc["content_id"])
    ));
    out.push(format!(
        "  {} TX ID: {}",
        mark(!result.failed(checks::TX_ID_MISMATCH)),
        text(&doc["anchor"]["tx_id"])
    ));
    out.push(format!("  Status: {}", text(&doc["anchor"]["status"])));
    out.push(format!("  Permanence: {}", text(&doc["anchor"]["permanence"])));

    section(&mut out, "Bonds");
    let bonds = doc["bonds"].as_array().map(Vec::as_slice).unwrap_or_default();
    if bonds.is_empty() {
        out.push("  (none)".to_string());
    }
    for bond in bonds {
        let id = text(&bond["id"]);
        out.push(format!(
            "  {} {}: {} - {}",
            mark(!result.failed(&checks::bond_timestamp_missing(&id))),
            id,
            text(&bond["name"]),
            text(&bond["created_at"])
        ));
    }
    if result.failed(checks::BONDS_MISMATCH) {
        out.push(format!(
            "  {} Bonds differ from the signed snapshot",
            prefix::FAIL
        ));
    }

    section(&mut out, "Verification Flags");
    if let Some(flags) = doc["verification"].as_object() {
        for (key, value) in flags {
            out.push(format!(
                "  {} {}: {}",
                mark(value.as_bool().unwrap_or(false)),
                key,
                value
            ));
        }
    }

    section(&mut out, "Failed Checks");
    if result.failed_checks.is_empty() {
        out.push("  (none)".to_string());
    }
    for check in &result.failed_checks {
        out.push(format!("  {} {}", prefix::FAIL, check));
    }

    footer(&mut out, result.valid);
    out.join("\n")
}

pub fn render_malformed(missing: &[String]) -> String {
    let mut out = Vec::new();
    header(&mut out, "TRIPLE SIGNATURE BUNDLE VERIFICATION");
    section(&mut out, "Structure");
    out.push(format!(
        "  {} Missing required fields: {}",
        prefix::FAIL,
        missing.join(", ")
    ));
    footer(&mut out, false);
    out.join("\n")
}

pub fn render_status(config: &BuildConfig) -> String {
    let synchronizer = Synchronizer::new(config.min_coherence);
    let nodes = default_nodes();
    let report = synchronizer.report(&nodes);

    let mut out = Vec::new();
    header(&mut out, "LANTANA OS - NODE STATUS");

    section(&mut out, "Node Status");
    for node in &nodes {
        out.push(format!("  • {}:", node.name()));
        out.push(format!("    Location: {}", node.identity().location_label));
        out.push(format!("    Coherence: {:.4}", node.coherence()));
        out.push(format!(
            "    Status: {}",
            synchronizer.node_status(node).as_str()
        ));
    }

    section(&mut out, "Synchronizations");
    for pair in &report.pairwise {
        out.push(format!(
            "  {} {} <-> {}: {:.4}",
            mark(pair.synchronized),
            pair.node_a,
            pair.node_b,
            pair.coherence
        ));
    }

    section(&mut out, "Overall System Coherence");
    if report.is_verified(config.min_coherence) {
        out.push(format!(
            "  {} {:.4} (Sufficient)",
            prefix::OK,
            report.overall_coherence
        ));
    } else {
        out.push(format!(
            "  {} {:.4} (Below minimum {})",
            prefix::FAIL,
            report.overall_coherence,
            config.min_coherence
        ));
    }

    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    out.join("\n")
}

fn header(out: &mut Vec<String>, title: &str) {
    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    out.push(title.to_string());
    out.push("=".repeat(RULE_WIDTH));
}

fn footer(out: &mut Vec<String>, valid: bool) {
    out.push(String::new());
    out.push("=".repeat(RULE_WIDTH));
    if valid {
        out.push(format!("BUNDLE VERIFICATION: {} PASSED", prefix::OK));
    } else {
        out.push(format!("BUNDLE VERIFICATION: {} FAILED", prefix::FAIL));
    }
    out.push("=".repeat(RULE_WIDTH));
}

fn section(out: &mut Vec<String>, name: &str) {
    out.push(String::new());
    out.push(format!("[{}]", name));
}

fn mark(ok: bool) -> &'static str {
    if ok {
        prefix::OK
    } else {
        prefix::FAIL
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

/// First and last 16 characters of a long digest.
fn abbreviate(digest: &str) -> String {
    let chars: Vec<char> = digest.chars().collect();
    if chars.len() <= 32 {
        return digest.to_string();
    }
    let head: String = chars[..16].iter().collect();
    let tail: String = chars[chars.len() - 16..].iter().collect();
    format!("{}...{}", head, tail)
}
