//! The seam between the engine and the snapshot store.
//!
//! The engine never touches storage directly. A `CatalogLoader` reads the
//! pre-populated snapshot and hands back normalized policies and a resolved
//! identity; everything after that is pure computation.

use caprobe_contracts::{error::CaResult, identity::Identity, policy::Policy};

/// Supplies policies and identities from a read-only snapshot.
///
/// Implementations must surface failures as typed errors:
/// `CaError::IdentityNotFound` for an unknown user and
/// `CaError::StoreUnavailable` when the store cannot be read.
pub trait CatalogLoader: Send + Sync {
    /// Load every Conditional Access policy in the snapshot, normalized.
    ///
    /// Disabled policies are returned too; the catalog filters them.
    fn load_policies(&self) -> CaResult<Vec<Policy>>;

    /// Load one user by UPN with direct and nested group memberships and
    /// directory roles resolved.
    fn load_identity(&self, upn: &str) -> CaResult<Identity>;
}
