//! Ownership and role-precedence authorization.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::identity::{Principal, Role};
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{Store, StoreError};

/// Outcome of a completed authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzDecision {
    Allowed,
    Denied,
}

impl AuthzDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AuthzDecision::Allowed)
    }
}

/// The check could not be evaluated. Never a denial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// A route names a role the store does not know.
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error("role lookup failed: {0}")]
    LookupFailed(StoreError),
}

/// Process-wide cache of resolved roles.
///
/// Role edits must call `invalidate` (or `clear`). Unknown names are never
/// stored.
#[derive(Debug, Default)]
pub struct RoleCatalog {
    roles: DashMap<String, Role>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Role> {
        self.roles.get(name).map(|r| r.value().clone())
    }

    pub fn insert(&self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn invalidate(&self, name: &str) {
        self.roles.remove(name);
    }

    pub fn clear(&self) {
        self.roles.clear();
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Decides whether a principal may act on a resource.
///
/// Owners always may. Everyone else needs a role whose level is at least
/// the level of the role the route requires.
pub struct AuthorizationGate {
    store: Arc<dyn Store>,
    roles: Option<RoleCatalog>,
    deadline: Duration,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn Store>, deadline: Duration) -> Self {
        Self {
            store,
            roles: None,
            deadline,
        }
    }

    /// Keep resolved roles in a process-wide catalog.
    pub fn with_role_catalog(mut self) -> Self {
        self.roles = Some(RoleCatalog::new());
        self
    }

    pub fn role_catalog(&self) -> Option<&RoleCatalog> {
        self.roles.as_ref()
    }

    pub async fn can_act(
        &self,
        principal: &Principal,
        owner_id: i64,
        required_role: &str,
    ) -> Result<AuthzDecision, AuthzError> {
        if principal.id == owner_id {
            metrics::record_authz_decision("allowed");
            return Ok(AuthzDecision::Allowed);
        }

        let required = match self.role(required_role).await {
            Ok(role) => role,
            Err(e) => {
                metrics::record_authz_decision("error");
                return Err(e);
            }
        };

        if principal.role.level >= required.level {
            metrics::record_authz_decision("allowed");
            Ok(AuthzDecision::Allowed)
        } else {
            tracing::debug!(
                principal_id = principal.id,
                role = %principal.role.name,
                required = %required.name,
                "Insufficient role"
            );
            metrics::record_authz_decision("denied");
            Ok(AuthzDecision::Denied)
        }
    }

    /// Resolve a role name, consulting the catalog first when enabled.
    pub async fn role(&self, name: &str) -> Result<Role, AuthzError> {
        if let Some(role) = self.roles.as_ref().and_then(|c| c.get(name)) {
            return Ok(role);
        }

        let role = match with_deadline(self.deadline, self.store.get_role_by_name(name)).await {
            Ok(role) => role,
            Err(StoreError::NotFound) => {
                tracing::error!(role = %name, "Route requires a role the store does not define");
                return Err(AuthzError::UnknownRole(name.to_string()));
            }
            Err(e) => {
                tracing::error!(role = %name, error = %e, "Role lookup failed");
                return Err(AuthzError::LookupFailed(e));
            }
        };

        if let Some(catalog) = &self.roles {
            catalog.insert(role.clone());
        }
        Ok(role)
    }
}
