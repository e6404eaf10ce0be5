//! Lantana Core
//!
//! Builds and verifies triple signature bundles: a snapshot of registered
//! bonds, attested by three fixed nodes, identified by a content id and
//! notarized with a deterministic transaction id.
//!
//! Signing and anchoring are simulated with SHA-256 digests. Nothing here
//! provides cryptographic authenticity; a bundle only proves that its fields
//! agree with each other.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use lantana_core::{default_nodes, BondRegistry, BundleBuilder, BundleVerifier, BuildConfig};
//!
//! let mut registry = BondRegistry::with_system_clock();
//! registry.add_bond("001", "IDRO", BTreeMap::new()).unwrap();
//!
//! let builder = BundleBuilder::with_system_clock(BuildConfig::default()).unwrap();
//! let bundle = builder.build_from_store(&registry, &default_nodes()).unwrap();
//! assert_eq!(bundle.signatures.len(), 3);
//!
//! let result = BundleVerifier::default().verify(&bundle);
//! assert!(result.valid);
//! ```

pub mod anchor;
pub mod bond;
pub mod bundle;
pub mod cid;
pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod node;
pub mod persist;
pub mod sync;
pub mod verify;

// Re-export main types at crate root
pub use anchor::{AnchorRecord, AnchorStatus, Permanence};
pub use bond::{Bond, BondRegistry, BondStore, SharedBondRegistry};
pub use bundle::{AggregatedData, Bundle, BundleBuilder, SystemInfo, VerificationFlags};
pub use cid::ContentId;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BuildConfig;
pub use error::{Error, Result};
pub use node::{default_nodes, NodeIdentity, NodeName, Signature, SignatureNode};
pub use sync::{NodeStatus, PairCoherence, SynchronizationReport, Synchronizer, MIN_COHERENCE};
pub use verify::{BundleVerifier, VerificationResult};
