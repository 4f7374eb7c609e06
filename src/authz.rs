use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{auth::AuthUser, error::ApiError};

/// Role
///
/// The two access tiers. Stored as lowercase text in the `people` table and
/// fixed at creation; the update path never touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Guest => "guest",
        }
    }

    /// The policy table row for this role. Admin gets every operation;
    /// Guest is read-only through search.
    pub fn allowed_operations(&self) -> &'static [Operation] {
        match self {
            Role::Admin => &[
                Operation::Create,
                Operation::Retrieve,
                Operation::Update,
                Operation::Delete,
                Operation::List,
                Operation::Search,
            ],
            Role::Guest => &[Operation::Search],
        }
    }
}

/// Error for role values that are neither `admin` nor `guest`.
#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(String);

impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "guest" => Ok(Role::Guest),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation
///
/// Everything a caller can ask the service to do with person records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
    List,
    Search,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
            Operation::Search => "search",
        }
    }
}

/// authorize
///
/// Pure allow/deny decision for an authenticated identity. The caller has
/// already passed the authentication boundary; a denial here is a role
/// mismatch (403), distinct from the extractor's 401.
pub fn authorize(identity: &AuthUser, operation: Operation) -> Result<(), ApiError> {
    if identity.role.allowed_operations().contains(&operation) {
        Ok(())
    } else {
        tracing::debug!(
            username = %identity.username,
            role = %identity.role,
            operation = operation.as_str(),
            "operation denied"
        );
        Err(ApiError::Forbidden(operation.as_str()))
    }
}
