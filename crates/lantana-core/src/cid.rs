//! Content identifiers for aggregated bundle data.
//!
//! A CID is the scheme tag followed by a truncated digest of the canonical
//! data. The display form is what the bundle records; the full digest stays
//! on the [`ContentId`] value. This is a simulated identifier: it is not a
//! multihash and no IPFS node ever sees it.

use serde::Serialize;

use crate::error::Result;
use crate::hash;

/// Scheme tag prefixed to every content identifier.
pub const CID_SCHEME: &str = "Qm";

/// Number of digest characters kept in the display form.
pub const CID_DISPLAY_LEN: usize = 44;

/// A derived content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    /// Display form recorded in bundles, e.g. `Qm3f2a...`
    pub cid: String,
    /// Full SHA-256 hex digest the display form was cut from
    pub digest: String,
}

impl ContentId {
    /// True if `cid` is the display form of this identifier.
    pub fn matches(&self, cid: &str) -> bool {
        self.cid == cid
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cid)
    }
}

/// Derive the content identifier of `data`.
///
/// Equal data under canonical equality (key order ignored) always yields an
/// equal identifier.
pub fn derive_cid<T: Serialize + ?Sized>(data: &T) -> Result<ContentId> {
    let digest = hash::digest(data)?;
    let cid = format!("{}{}", CID_SCHEME, &digest[..CID_DISPLAY_LEN]);
    Ok(ContentId { cid, digest })
}
