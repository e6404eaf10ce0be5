//! Bond registry
//!
//! A bond is a named metadata commitment, timestamped once when it is
//! registered and never changed afterwards. The registry keeps bonds in
//! insertion order and refuses duplicate IDs.
//!
//! Readers take snapshots. [`SharedBondRegistry`] hands out copies under a
//! read lock, so a bundle build working from a snapshot is unaffected by
//! bonds added concurrently.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::clock::{self, Clock, SystemClock};
use crate::error::{Error, Result};

/// A registered metadata commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub id: String,
    pub name: String,
    pub metadata: BTreeMap<String, String>,
    #[serde(with = "clock::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Read access to a set of bonds.
pub trait BondStore {
    /// Look up a bond by ID.
    fn get(&self, id: &str) -> Option<Bond>;

    /// All bonds in insertion order. Always a copy.
    fn list_bonds(&self) -> Vec<Bond>;

    /// Number of registered bonds.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Insertion-ordered bond registry with an injected clock.
pub struct BondRegistry {
    bonds: Vec<Bond>,
    index: HashMap<String, usize>,
    clock: Arc<dyn Clock>,
}

impl BondRegistry {
    /// Create an empty registry stamping bonds from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            bonds: Vec::new(),
            index: HashMap::new(),
            clock,
        }
    }

    /// Create an empty registry on wall-clock time.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Register a bond, stamping it with the current time.
    ///
    /// Returns `Error::DuplicateBond` if `id` is already registered and
    /// `Error::InvalidBond` if `id` or `name` is blank.
    pub fn add_bond(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Bond> {
        let id = id.into();
        let name = name.into();

        if id.trim().is_empty() {
            return Err(Error::InvalidBond("bond id must not be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::InvalidBond(format!("bond {} has an empty name", id)));
        }
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateBond(id));
        }

        let bond = Bond {
            id: id.clone(),
            name,
            metadata,
            created_at: self.clock.now(),
        };

        tracing::debug!(
            bond = %bond.id,
            name = %bond.name,
            at = %clock::format_timestamp(&bond.created_at),
            "bond registered"
        );

        self.index.insert(id, self.bonds.len());
        self.bonds.push(bond.clone());
        Ok(bond)
    }

    /// Borrow the bonds in insertion order.
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }
}

impl BondStore for BondRegistry {
    fn get(&self, id: &str) -> Option<Bond> {
        self.index.get(id).map(|&i| self.bonds[i].clone())
    }

    fn list_bonds(&self) -> Vec<Bond> {
        self.bonds.clone()
    }

    fn len(&self) -> usize {
        self.bonds.len()
    }
}

impl fmt::Debug for BondRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BondRegistry")
            .field("bonds", &self.bonds)
            .finish_non_exhaustive()
    }
}

/// A registry shared between callers. Cloning shares the same bonds.
#[derive(Clone, Debug)]
pub struct SharedBondRegistry {
    inner: Arc<RwLock<BondRegistry>>,
}

impl SharedBondRegistry {
    pub fn new(registry: BondRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Register a bond under the write lock.
    pub fn add_bond(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Bond> {
        self.inner.write().add_bond(id, name, metadata)
    }
}

impl BondStore for SharedBondRegistry {
    fn get(&self, id: &str) -> Option<Bond> {
        self.inner.read().get(id)
    }

    fn list_bonds(&self) -> Vec<Bond> {
        self.inner.read().list_bonds()
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};

    fn registry() -> BondRegistry {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BondRegistry::new(Arc::new(
            FixedClock::new(start).with_step(Duration::seconds(1)),
        ))
    }

    fn meta(kind: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("type".to_string(), kind.to_string())])
    }

    #[test]
    fn add_and_get() {
        let mut reg = registry();
        let bond = reg.add_bond("001", "IDRO", meta("Water")).unwrap();
        assert_eq!(reg.get("001"), Some(bond));
        assert!(reg.contains("001"));
        assert!(!reg.contains("002"));
    }

    #[test]
    fn duplicate_id_fails() {
        let mut reg = registry();
        reg.add_bond("001", "IDRO", meta("Water")).unwrap();
        let err = reg.add_bond("001", "HELIOS", meta("Solar")).unwrap_err();
        assert!(matches!(err, Error::DuplicateBond(ref id) if id == "001"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.bonds()[0].name, "IDRO");
    }

    #[test]
    fn blank_input_rejected() {
        let mut reg = registry();
        assert!(matches!(
            reg.add_bond("  ", "IDRO", meta("Water")),
            Err(Error::InvalidBond(_))
        ));
        assert!(matches!(
            reg.add_bond("001", "", meta("Water")),
            Err(Error::InvalidBond(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn insertion_order_preserved() {
        let mut reg = registry();
        for (id, name) in [("003", "TERRA"), ("001", "IDRO"), ("002", "HELIOS")] {
            reg.add_bond(id, name, meta("x")).unwrap();
        }
        let ids: Vec<String> = reg.list_bonds().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["003", "001", "002"]);
    }

    #[test]
    fn timestamps_come_from_injected_clock() {
        let mut reg = registry();
        let a = reg.add_bond("001", "IDRO", meta("Water")).unwrap();
        let b = reg.add_bond("002", "HELIOS", meta("Solar")).unwrap();
        assert_eq!(
            clock::format_timestamp(&a.created_at),
            "2024-01-01T00:00:00.000000Z"
        );
        assert_eq!(b.created_at - a.created_at, Duration::seconds(1));
    }

    #[test]
    fn bond_json_shape() {
        let mut reg = registry();
        let bond = reg.add_bond("001", "IDRO", meta("Water")).unwrap();
        let value = serde_json::to_value(&bond).unwrap();
        assert_eq!(value["created_at"], "2024-01-01T00:00:00.000000Z");
        assert_eq!(value["metadata"]["type"], "Water");
        let back: Bond = serde_json::from_value(value).unwrap();
        assert_eq!(back, bond);
    }

    #[test]
    fn shared_snapshot_is_isolated() {
        let shared = SharedBondRegistry::new(registry());
        shared.add_bond("001", "IDRO", meta("Water")).unwrap();

        let snapshot = shared.list_bonds();
        shared.add_bond("002", "HELIOS", meta("Solar")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn shared_registry_across_threads() {
        let shared = SharedBondRegistry::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reg = shared.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        reg.add_bond(format!("{}-{}", t, i), "BOND", BTreeMap::new())
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.len(), 40);
        assert!(matches!(
            shared.add_bond("0-0", "BOND", BTreeMap::new()),
            Err(Error::DuplicateBond(_))
        ));
    }
}
