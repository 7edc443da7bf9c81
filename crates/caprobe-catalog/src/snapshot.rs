//! JSON snapshot loader.
//!
//! A snapshot file is a single JSON document exported from a directory:
//!
//! ```json
//! {
//!   "policies": [{ "objectId": "…", "displayName": "…", "policyType": 18, "policyDetail": ["{…}"] }],
//!   "users": [{ "objectId": "…", "userPrincipalName": "…", "userType": "Member" }],
//!   "groups": [{ "objectId": "…", "memberUsers": ["…"], "memberGroups": ["…"] }],
//!   "directoryRoles": [{ "objectId": "…", "roleTemplateId": "…", "memberUsers": ["…"] }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use caprobe_contracts::{
    error::{CaError, CaResult},
    identity::Identity,
    policy::Policy,
};
use caprobe_core::traits::CatalogLoader;

use crate::membership::GroupGraph;
use crate::normalize::policies_from_record;
use crate::{is_guest, CONDITIONAL_ACCESS_POLICY_TYPE};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Snapshot {
    policies: Vec<SnapshotPolicy>,
    users: Vec<SnapshotUser>,
    groups: Vec<SnapshotGroup>,
    directory_roles: Vec<SnapshotRole>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SnapshotPolicy {
    object_id: String,
    display_name: String,
    policy_type: Option<i64>,
    policy_detail: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SnapshotUser {
    object_id: String,
    user_principal_name: String,
    user_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SnapshotGroup {
    object_id: String,
    member_users: Vec<String>,
    member_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SnapshotRole {
    object_id: String,
    role_template_id: Option<String>,
    member_users: Vec<String>,
}

/// Loads policies and identities from a JSON snapshot held in memory.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    snapshot: Snapshot,
    graph: GroupGraph,
}

impl SnapshotLoader {
    /// Parse a snapshot from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `CaError::StoreUnavailable` if the document is not valid JSON
    /// or does not have the snapshot shape.
    pub fn from_json_str(json: &str) -> CaResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| CaError::store(format!("snapshot parse error: {e}")))?;

        let mut graph = GroupGraph::new();
        for group in &snapshot.groups {
            for child in &group.member_groups {
                graph.add_edge(group.object_id.clone(), child.clone());
            }
        }

        debug!(
            policies = snapshot.policies.len(),
            users = snapshot.users.len(),
            groups = snapshot.groups.len(),
            roles = snapshot.directory_roles.len(),
            "snapshot parsed"
        );
        Ok(Self { snapshot, graph })
    }

    /// Read and parse a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `CaError::StoreUnavailable` if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> CaResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CaError::store(format!("cannot read snapshot '{}': {e}", path.display()))
        })?;
        let loader = Self::from_json_str(&json)?;
        info!(path = %path.display(), "snapshot loaded");
        Ok(loader)
    }
}

impl CatalogLoader for SnapshotLoader {
    fn load_policies(&self) -> CaResult<Vec<Policy>> {
        Ok(self
            .snapshot
            .policies
            .iter()
            .filter(|p| p.policy_type.unwrap_or(CONDITIONAL_ACCESS_POLICY_TYPE) == CONDITIONAL_ACCESS_POLICY_TYPE)
            .flat_map(|p| policies_from_record(&p.object_id, &p.display_name, &p.policy_detail))
            .collect())
    }

    fn load_identity(&self, upn: &str) -> CaResult<Identity> {
        let user = self
            .snapshot
            .users
            .iter()
            .find(|u| u.user_principal_name.eq_ignore_ascii_case(upn.trim()))
            .ok_or_else(|| CaError::IdentityNotFound {
                upn: upn.to_string(),
            })?;

        let direct = self
            .snapshot
            .groups
            .iter()
            .filter(|g| g.member_users.contains(&user.object_id))
            .map(|g| g.object_id.clone());
        let groups = self.graph.closure(direct);

        let mut roles = Vec::new();
        for role in self
            .snapshot
            .directory_roles
            .iter()
            .filter(|r| r.member_users.contains(&user.object_id))
        {
            roles.push(role.object_id.clone());
            if let Some(tid) = role.role_template_id.as_ref().filter(|t| !t.is_empty()) {
                roles.push(tid.clone());
            }
        }

        Ok(
            Identity::new(user.object_id.clone(), user.user_principal_name.clone())?
                .guest(is_guest(user.user_type.as_deref(), &user.user_principal_name))
                .with_groups(groups)
                .with_roles(roles),
        )
    }
}
