//! Scope resolution: does a policy's assignment target an identity?
//!
//! The identity matches a subject set through its object id, any of its
//! groups, any of its roles, the guest marker, or the all-users marker.
//! Exclusion is checked first and is unconditional.

use caprobe_contracts::{
    identity::Identity,
    policy::{Assignment, SubjectSet},
    verdict::{Scope, ScopeMatch},
};

/// Resolve `assignment` against `identity`.
pub fn resolve_scope(assignment: &Assignment, identity: &Identity) -> Scope {
    if let Some(via) = match_subjects(&assignment.exclude, identity) {
        return Scope::Excluded(via);
    }
    match match_subjects(&assignment.include, identity) {
        Some(via) => Scope::Targeted(via),
        None => Scope::NotTargeted,
    }
}

/// The most specific way `identity` belongs to `set`, if any.
fn match_subjects(set: &SubjectSet, identity: &Identity) -> Option<ScopeMatch> {
    if set.users.contains(identity.object_id()) {
        return Some(ScopeMatch::User);
    }

    let groups: Vec<String> = identity
        .groups()
        .intersection(&set.groups)
        .cloned()
        .collect();
    if !groups.is_empty() {
        return Some(ScopeMatch::Groups(groups));
    }

    let roles: Vec<String> = identity
        .roles()
        .intersection(&set.roles)
        .cloned()
        .collect();
    if !roles.is_empty() {
        return Some(ScopeMatch::Roles(roles));
    }

    if set.guests_or_external && identity.is_guest() {
        return Some(ScopeMatch::GuestsOrExternalUsers);
    }

    if set.all_users {
        return Some(ScopeMatch::AllUsers);
    }

    None
}
