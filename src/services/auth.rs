//! Authorization gate over mutating registry operations.
//!
//! Every protected operation is keyed `"{kind};{operation}"`. The acting
//! user's permission set is the union of the permission strings of their
//! active groups, and must contain the exact key. There is no hierarchy or
//! prefix matching. Operations outside the protected set are unconditionally
//! allowed.

use crate::models::{EdgeCategory, User, UserGroup, VertexCategory};
use crate::storage::{EdgeQuery, GraphStore, VertexQuery};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};

/// The protected-operation table. Mutating operations only; reads are open.
static PROTECTED_OPERATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "component;add",
        "component;replace",
        "component;disable",
        "component;set_version",
        "component;connect",
        "component;disconnect",
        "component;subcomponent_connect",
        "component;set_property",
        "component;unset_property",
        "component;replace_property",
        "component_type;add",
        "component_type;replace",
        "component_type;disable",
        "component_version;add",
        "component_version;replace",
        "component_version;disable",
        "property_type;add",
        "property_type;replace",
        "property_type;disable",
        "flag;add",
        "flag;end",
        "flag;disable",
        "flag_type;add",
        "flag_severity;add",
        "user;add",
        "user_group;add",
        "user_group;assign",
    ])
});

/// Builds the permission key for an operation.
#[must_use]
pub fn permission_key(kind: &str, operation: &str) -> String {
    format!("{kind};{operation}")
}

/// Checks whether an operation requires a permission.
#[must_use]
pub fn is_protected(key: &str) -> bool {
    PROTECTED_OPERATIONS.contains(key)
}

/// Authorizes an operation for the acting user.
///
/// An unprotected key passes without touching the store. A protected key
/// requires a named acting user whose group permissions contain the key.
///
/// # Errors
///
/// Returns [`Error::Unauthorized`] if no acting user is set or the user
/// lacks the exact permission; [`Error::OperationFailed`] on store failure.
pub fn authorize(
    store: &dyn GraphStore,
    acting_user: Option<&str>,
    kind: &str,
    operation: &str,
) -> Result<()> {
    let key = permission_key(kind, operation);
    if !is_protected(&key) {
        return Ok(());
    }

    let Some(user_name) = acting_user else {
        return Err(Error::Unauthorized(format!(
            "operation '{key}' requires an acting user"
        )));
    };

    let granted = permissions_for(store, user_name)?;
    if granted.contains(&key) {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "user '{user_name}' lacks permission '{key}'"
        )))
    }
}

/// Resolves the union of a user's group permission sets.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the user does not exist (or is inactive);
/// [`Error::OperationFailed`] on store failure.
pub fn permissions_for(store: &dyn GraphStore, user_name: &str) -> Result<BTreeSet<String>> {
    let users =
        store.find_vertices(&VertexQuery::active(VertexCategory::User).with_name(user_name))?;
    let Some(user_record) = users.first() else {
        return Err(Error::NotFound(format!("user '{user_name}'")));
    };
    let user = User::from_record(user_record)?;
    let Some(user_id) = user.id.persisted() else {
        return Err(Error::NotFound(format!("user '{user_name}'")));
    };

    let memberships = store.find_edges(&EdgeQuery::active(EdgeCategory::UserGroup).from(user_id))?;

    let mut granted = BTreeSet::new();
    for edge in memberships {
        let Some(group_record) = store.get_vertex(edge.in_vertex)? else {
            continue;
        };
        if !group_record.is_active() {
            continue;
        }
        let group = UserGroup::from_record(&group_record)?;
        granted.extend(group.permissions);
    }
    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeRecord;
    use crate::storage::InMemoryGraphStore;

    fn store_with_operator(permissions: &[&str]) -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        let user = User::new("alice", "Observatory");
        let user_id = store.add_vertex(VertexCategory::User, &user.attrs(), 0).unwrap();
        let group = UserGroup::new("operators", permissions.iter().copied());
        let group_id = store
            .add_vertex(VertexCategory::UserGroup, &group.attrs(), 0)
            .unwrap();
        store
            .add_edge(&EdgeRecord::new(EdgeCategory::UserGroup, user_id, group_id), 0)
            .unwrap();
        store
    }

    #[test]
    fn test_unprotected_operation_passes_without_user() {
        let store = InMemoryGraphStore::new();
        assert!(authorize(&store, None, "component", "get").is_ok());
    }

    #[test]
    fn test_protected_operation_requires_user() {
        let store = InMemoryGraphStore::new();
        let err = authorize(&store, None, "component", "connect");
        assert!(matches!(err, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_exact_match_only() {
        let store = store_with_operator(&["component;connect"]);
        assert!(authorize(&store, Some("alice"), "component", "connect").is_ok());
        let err = authorize(&store, Some("alice"), "component", "disconnect");
        assert!(matches!(err, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_permissions_union_across_groups() {
        let store = store_with_operator(&["component;connect"]);
        let user_id = store
            .find_vertices(&VertexQuery::active(VertexCategory::User).with_name("alice"))
            .unwrap()[0]
            .id
            .persisted()
            .unwrap();
        let admins = UserGroup::new("admins", ["component_type;add"]);
        let admins_id = store
            .add_vertex(VertexCategory::UserGroup, &admins.attrs(), 0)
            .unwrap();
        store
            .add_edge(&EdgeRecord::new(EdgeCategory::UserGroup, user_id, admins_id), 0)
            .unwrap();

        let granted = permissions_for(&store, "alice").unwrap();
        assert!(granted.contains("component;connect"));
        assert!(granted.contains("component_type;add"));
    }

    #[test]
    fn test_unknown_user_rejected() {
        let store = InMemoryGraphStore::new();
        let err = authorize(&store, Some("mallory"), "component", "connect");
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
}
