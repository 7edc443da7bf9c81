//! The identity whose sign-ins are being analyzed.
//!
//! An `Identity` is immutable for the duration of one run. Group membership
//! is already flattened (direct + nested) by the loader, and the role set
//! holds both role object ids and role template ids because policies may
//! reference either.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{CaError, CaResult};

/// A directory user plus the memberships scope resolution needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    object_id: String,
    upn: String,
    guest: bool,
    groups: BTreeSet<String>,
    roles: BTreeSet<String>,
}

impl Identity {
    /// Build an identity with no memberships.
    ///
    /// Returns `CaError::InvalidIdentity` when the object id or UPN is blank;
    /// an identity without an object id cannot be scope-resolved.
    pub fn new(object_id: impl Into<String>, upn: impl Into<String>) -> CaResult<Self> {
        let object_id = object_id.into();
        let upn = upn.into();
        if object_id.trim().is_empty() {
            return Err(CaError::InvalidIdentity {
                reason: format!("identity '{upn}' has no object id"),
            });
        }
        if upn.trim().is_empty() {
            return Err(CaError::InvalidIdentity {
                reason: format!("identity '{object_id}' has no user principal name"),
            });
        }
        Ok(Self {
            object_id,
            upn,
            guest: false,
            groups: BTreeSet::new(),
            roles: BTreeSet::new(),
        })
    }

    /// Mark the identity as a guest / external user.
    pub fn guest(mut self, guest: bool) -> Self {
        self.guest = guest;
        self
    }

    /// Add resolved group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Add directory role ids (object ids and/or template ids).
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add hypothetical group memberships ("what if this user were in X").
    pub fn with_assumed_groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_groups(groups)
    }

    /// Add hypothetical role assignments.
    pub fn with_assumed_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_roles(roles)
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn upn(&self) -> &str {
        &self.upn
    }

    pub fn is_guest(&self) -> bool {
        self.guest
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }
}
