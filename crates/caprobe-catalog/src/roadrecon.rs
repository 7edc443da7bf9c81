//! RoadRecon SQLite loader.
//!
//! Reads the tables a RoadRecon gather leaves behind. The database is opened
//! read-only; nothing is ever written back.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
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

/// Loads policies and identities from a RoadRecon database.
#[derive(Debug)]
pub struct RoadReconLoader {
    conn: Mutex<Connection>,
}

impl RoadReconLoader {
    /// Open an existing RoadRecon database read-only.
    ///
    /// # Errors
    ///
    /// Returns `CaError::StoreUnavailable` if the file does not exist or is
    /// not a readable SQLite database.
    pub fn open(path: &Path) -> CaResult<Self> {
        if !path.exists() {
            return Err(CaError::store(format!(
                "database '{}' does not exist",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| CaError::store(format!("cannot open '{}': {e}", path.display())))?;
        info!(path = %path.display(), "roadrecon database opened");
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> CaResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CaError::store("database connection lock poisoned"))
    }

    fn group_graph(conn: &Connection) -> CaResult<GroupGraph> {
        let mut stmt = conn
            .prepare("SELECT \"Group\", childGroup FROM lnk_group_member_group")
            .map_err(sql_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql_error)?;

        let mut graph = GroupGraph::new();
        for row in rows {
            let (parent, child) = row.map_err(sql_error)?;
            graph.add_edge(parent, child);
        }
        Ok(graph)
    }
}

impl CatalogLoader for RoadReconLoader {
    fn load_policies(&self) -> CaResult<Vec<Policy>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT objectId, displayName, policyDetail FROM Policies \
                 WHERE policyType = ?1 ORDER BY displayName, objectId",
            )
            .map_err(sql_error)?;
        let rows = stmt
            .query_map(params![CONDITIONAL_ACCESS_POLICY_TYPE], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(sql_error)?;

        let mut policies = Vec::new();
        for row in rows {
            let (object_id, display_name, detail) = row.map_err(sql_error)?;
            let detail = match detail {
                Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
                None => Value::Null,
            };
            let name = display_name.unwrap_or_else(|| object_id.clone());
            policies.extend(policies_from_record(&object_id, &name, &detail));
        }
        debug!(policies = policies.len(), "policies read from database");
        Ok(policies)
    }

    fn load_identity(&self, upn: &str) -> CaResult<Identity> {
        let conn = self.conn()?;

        let user = conn
            .query_row(
                "SELECT objectId, userPrincipalName, userType FROM Users \
                 WHERE lower(userPrincipalName) = lower(?1)",
                params![upn.trim()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(sql_error)?;
        let Some((object_id, principal, user_type)) = user else {
            return Err(CaError::IdentityNotFound {
                upn: upn.to_string(),
            });
        };

        let direct: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT \"Group\" FROM lnk_group_member_user WHERE User = ?1")
                .map_err(sql_error)?;
            let rows = stmt
                .query_map(params![object_id], |row| row.get::<_, String>(0))
                .map_err(sql_error)?;
            rows.collect::<Result<_, _>>().map_err(sql_error)?
        };
        let groups = Self::group_graph(&conn)?.closure(direct);

        let roles: Vec<(String, Option<String>)> = {
            let mut stmt = conn
                .prepare(
                    "SELECT r.objectId, r.roleTemplateId FROM lnk_role_member_user l \
                     JOIN DirectoryRoles r ON r.objectId = l.DirectoryRole \
                     WHERE l.User = ?1",
                )
                .map_err(sql_error)?;
            let rows = stmt
                .query_map(params![object_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })
                .map_err(sql_error)?;
            rows.collect::<Result<_, _>>().map_err(sql_error)?
        };
        let role_ids = roles
            .into_iter()
            .flat_map(|(oid, tid)| std::iter::once(oid).chain(tid.filter(|t| !t.is_empty())));

        debug!(upn = %principal, groups = groups.len(), "identity resolved");
        Ok(Identity::new(object_id, principal.clone())?
            .guest(is_guest(user_type.as_deref(), &principal))
            .with_groups(groups)
            .with_roles(role_ids))
    }
}

fn sql_error(e: rusqlite::Error) -> CaError {
    CaError::store(format!("database query failed: {e}"))
}
