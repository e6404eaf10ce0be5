//! The three attesting signature nodes.
//!
//! Signatures here are **simulated**. A node holds no key material; its
//! "signature" is the SHA-256 digest of its identity followed by the
//! canonical payload. That attests "this node identity processed exactly this
//! payload" and nothing more: anyone can recompute it, so it carries no
//! non-repudiation and proves no identity.
//!
//! Nodes are plain values passed into each operation. There is no global
//! node registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash;

/// Names of the fixed attesting parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeName {
    NodeA,
    NodeB,
    NodeC,
}

impl NodeName {
    /// Every node, in signing order.
    pub const ALL: [NodeName; 3] = [NodeName::NodeA, NodeName::NodeB, NodeName::NodeC];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::NodeA => "NodeA",
            NodeName::NodeB => "NodeB",
            NodeName::NodeC => "NodeC",
        }
    }

    /// Location label assigned to the node at initialization.
    pub fn default_location(&self) -> &'static str {
        match self {
            NodeName::NodeA => "Central Africa Node",
            NodeName::NodeB => "Arctic Distributed Node",
            NodeName::NodeC => "Central Coordination Hub",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodeName::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| Error::Encoding(format!("unknown node name: {}", s)))
    }
}

/// Who a node is: its name and where it claims to sit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub name: NodeName,
    pub location_label: String,
}

impl NodeIdentity {
    /// Identity with the node's default location label.
    pub fn new(name: NodeName) -> Self {
        Self {
            name,
            location_label: name.default_location().to_string(),
        }
    }

    /// Digest this identity would record for `payload`.
    ///
    /// Preimage: `"{name}:{location_label}:"` followed by the canonical
    /// payload bytes.
    pub fn attest<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let body = hash::canonical_bytes(payload)?;
        let mut preimage = format!("{}:{}:", self.name, self.location_label).into_bytes();
        preimage.extend_from_slice(&body);
        Ok(hash::digest_bytes(&preimage))
    }
}

/// A simulated signature over one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub node: NodeIdentity,
    /// Lowercase hex SHA-256 digest
    pub digest: String,
    /// Node coherence level when it signed
    pub coherence_at_signing: f64,
}

/// One attesting party together with its current coherence level.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureNode {
    identity: NodeIdentity,
    coherence: f64,
}

impl SignatureNode {
    /// A node at full coherence with its default location.
    pub fn new(name: NodeName) -> Self {
        Self {
            identity: NodeIdentity::new(name),
            coherence: 1.0,
        }
    }

    /// Builder: override the location label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.identity.location_label = location.into();
        self
    }

    /// Builder: set the coherence level, clamped to [0, 1]. NaN becomes 0.
    pub fn with_coherence(mut self, coherence: f64) -> Self {
        self.coherence = if coherence.is_nan() {
            0.0
        } else {
            coherence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn name(&self) -> NodeName {
        self.identity.name
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn coherence(&self) -> f64 {
        self.coherence
    }

    /// Sign `payload`. Fails only if the payload cannot be canonicalized.
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Signature> {
        Ok(Signature {
            node: self.identity.clone(),
            digest: self.identity.attest(payload)?,
            coherence_at_signing: self.coherence,
        })
    }
}

/// The three nodes at full coherence, in signing order.
pub fn default_nodes() -> Vec<SignatureNode> {
    NodeName::ALL.into_iter().map(SignatureNode::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_round_trip_through_str() {
        for name in NodeName::ALL {
            assert_eq!(name.as_str().parse::<NodeName>().unwrap(), name);
        }
        assert!("NodeD".parse::<NodeName>().is_err());
    }

    #[test]
    fn name_serializes_as_plain_string() {
        assert_eq!(serde_json::to_value(NodeName::NodeB).unwrap(), json!("NodeB"));
    }

    #[test]
    fn signing_is_deterministic() {
        let node = SignatureNode::new(NodeName::NodeA);
        let payload = json!({"bonds": ["001"]});
        assert_eq!(node.sign(&payload).unwrap(), node.sign(&payload).unwrap());
    }

    #[test]
    fn nodes_sign_differently() {
        let payload = json!({"bonds": ["001"]});
        let digests: Vec<String> = default_nodes()
            .iter()
            .map(|n| n.sign(&payload).unwrap().digest)
            .collect();
        assert_ne!(digests[0], digests[1]);
        assert_ne!(digests[1], digests[2]);
        assert_ne!(digests[0], digests[2]);
    }

    #[test]
    fn location_is_part_of_identity() {
        let payload = json!(1);
        let home = SignatureNode::new(NodeName::NodeC);
        let moved = SignatureNode::new(NodeName::NodeC).with_location("Elsewhere");
        assert_ne!(
            home.sign(&payload).unwrap().digest,
            moved.sign(&payload).unwrap().digest
        );
    }

    #[test]
    fn signature_matches_identity_attestation() {
        let node = SignatureNode::new(NodeName::NodeB).with_coherence(0.97);
        let payload = json!({"x": [1, 2, 3]});
        let sig = node.sign(&payload).unwrap();
        assert_eq!(sig.digest, sig.node.attest(&payload).unwrap());
        assert!(hash::is_hex_digest(&sig.digest));
        assert_eq!(sig.coherence_at_signing, 0.97);
    }

    #[test]
    fn coherence_is_clamped() {
        assert_eq!(SignatureNode::new(NodeName::NodeA).with_coherence(1.5).coherence(), 1.0);
        assert_eq!(SignatureNode::new(NodeName::NodeA).with_coherence(-0.2).coherence(), 0.0);
        assert_eq!(
            SignatureNode::new(NodeName::NodeA).with_coherence(f64::NAN).coherence(),
            0.0
        );
    }
}
