//! Permission checks over verified claims.
//!
//! Three claim shapes carry permissions, resolved in a fixed priority order:
//! a `permissions` array, then a space-delimited `scope` string, then
//! `realm_access.roles`. The first shape present wins even when empty.

use crate::auth::claims::Claims;

/// Where the permissions of a token were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimShape {
    Permissions(Vec<String>),
    Scope(Vec<String>),
    RealmRoles(Vec<String>),
    Absent,
}

impl ClaimShape {
    pub fn from_claims(claims: &Claims) -> Self {
        if let Some(permissions) = &claims.permissions {
            ClaimShape::Permissions(permissions.clone())
        } else if let Some(scope) = &claims.scope {
            ClaimShape::Scope(scope.split_whitespace().map(str::to_string).collect())
        } else if let Some(realm) = &claims.realm_access {
            ClaimShape::RealmRoles(realm.roles.clone())
        } else {
            ClaimShape::Absent
        }
    }

    /// The normalized permission list; empty when no shape is present.
    pub fn into_permissions(self) -> Vec<String> {
        match self {
            ClaimShape::Permissions(p) | ClaimShape::Scope(p) | ClaimShape::RealmRoles(p) => p,
            ClaimShape::Absent => Vec::new(),
        }
    }
}

/// A permission a route demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredPermission {
    One(String),
    /// Satisfied by any one of the alternatives.
    AnyOf(Vec<String>),
}

impl RequiredPermission {
    pub fn one(permission: impl Into<String>) -> Self {
        RequiredPermission::One(permission.into())
    }

    pub fn any_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequiredPermission::AnyOf(permissions.into_iter().map(Into::into).collect())
    }

    /// Whether `granted` satisfies this requirement (exact string match).
    pub fn is_satisfied_by(&self, granted: &[String]) -> bool {
        match self {
            RequiredPermission::One(required) => granted.iter().any(|g| g == required),
            RequiredPermission::AnyOf(alternatives) => alternatives
                .iter()
                .any(|required| granted.iter().any(|g| g == required)),
        }
    }
}

impl From<&str> for RequiredPermission {
    fn from(permission: &str) -> Self {
        RequiredPermission::One(permission.to_string())
    }
}

impl From<String> for RequiredPermission {
    fn from(permission: String) -> Self {
        RequiredPermission::One(permission)
    }
}

impl From<Vec<String>> for RequiredPermission {
    fn from(permissions: Vec<String>) -> Self {
        RequiredPermission::AnyOf(permissions)
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub granted: bool,
    /// The caller's full normalized permission list.
    pub permissions: Vec<String>,
}

/// Decide whether verified `claims` satisfy `required`.
pub fn check_permission(claims: &Claims, required: &RequiredPermission) -> AccessDecision {
    let permissions = ClaimShape::from_claims(claims).into_permissions();
    AccessDecision {
        granted: required.is_satisfied_by(&permissions),
        permissions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::RealmAccess;

    fn claims_with_permissions(perms: &[&str]) -> Claims {
        Claims {
            permissions: Some(perms.iter().map(|p| p.to_string()).collect()),
            ..Claims::default()
        }
    }

    #[test]
    fn test_permissions_array() {
        let claims = claims_with_permissions(&["read:api", "write:api"]);
        let decision = check_permission(&claims, &"read:api".into());
        assert!(decision.granted);
        assert_eq!(decision.permissions, vec!["read:api", "write:api"]);

        assert!(!check_permission(&claims, &"admin:api".into()).granted);
    }

    #[test]
    fn test_exact_match_only() {
        let claims = claims_with_permissions(&["read:api:extra", "READ:API"]);
        assert!(!check_permission(&claims, &"read:api".into()).granted);
    }

    #[test]
    fn test_scope_string() {
        let claims = Claims {
            scope: Some("openid  profile\tread:api".into()),
            ..Claims::default()
        };
        let decision = check_permission(&claims, &"read:api".into());
        assert!(decision.granted);
        assert_eq!(decision.permissions, vec!["openid", "profile", "read:api"]);
    }

    #[test]
    fn test_realm_roles() {
        let claims = Claims {
            realm_access: Some(RealmAccess {
                roles: vec!["offline_access".into(), "read:api".into()],
            }),
            ..Claims::default()
        };
        assert!(check_permission(&claims, &"read:api".into()).granted);
    }

    #[test]
    fn test_shape_priority() {
        let claims = Claims {
            permissions: Some(vec![]),
            scope: Some("read:api".into()),
            ..Claims::default()
        };
        assert_eq!(ClaimShape::from_claims(&claims), ClaimShape::Permissions(vec![]));
        assert!(!check_permission(&claims, &"read:api".into()).granted);
    }

    #[test]
    fn test_no_shape_denies() {
        let decision = check_permission(&Claims::default(), &"read:api".into());
        assert!(!decision.granted);
        assert!(decision.permissions.is_empty());
    }

    #[test]
    fn test_any_of_is_or() {
        let claims = claims_with_permissions(&["write:api"]);
        let required = RequiredPermission::any_of(["admin:api", "write:api"]);
        assert!(check_permission(&claims, &required).granted);

        let required = RequiredPermission::any_of(["admin:api", "backup:api"]);
        assert!(!check_permission(&claims, &required).granted);

        assert!(!RequiredPermission::AnyOf(vec![]).is_satisfied_by(&["read:api".to_string()]));
    }
}
