//! # caprobe-catalog
//!
//! Snapshot loaders and policy-detail normalization.
//!
//! Two stores are supported, both behind `caprobe_core::traits::CatalogLoader`:
//!
//! - [`roadrecon::RoadReconLoader`]: a RoadRecon SQLite database
//! - [`snapshot::SnapshotLoader`]: a single JSON export
//!
//! Raw `policyDetail` documents are parsed by [`raw`] and turned into the
//! closed policy model by [`normalize`].

pub mod membership;
pub mod normalize;
pub mod raw;
pub mod roadrecon;
pub mod snapshot;

use std::path::Path;

use caprobe_contracts::error::CaResult;
use caprobe_core::traits::CatalogLoader;

use roadrecon::RoadReconLoader;
use snapshot::SnapshotLoader;

/// RoadRecon `policyType` of Conditional Access policies.
pub const CONDITIONAL_ACCESS_POLICY_TYPE: i64 = 18;

/// Open the store named on the command line: a JSON snapshot when given,
/// the RoadRecon database otherwise.
pub fn open_store(snapshot: Option<&Path>, db: &Path) -> CaResult<Box<dyn CatalogLoader>> {
    match snapshot {
        Some(path) => Ok(Box::new(SnapshotLoader::from_file(path)?)),
        None => Ok(Box::new(RoadReconLoader::open(db)?)),
    }
}

/// Guests are flagged by `userType`, or by the `#EXT#` UPN marker when the
/// type is missing.
pub(crate) fn is_guest(user_type: Option<&str>, upn: &str) -> bool {
    match user_type {
        Some(t) if !t.trim().is_empty() => t.trim().eq_ignore_ascii_case("guest"),
        _ => upn.contains("#EXT#"),
    }
}
