//! Identity records and the per-request principal.

use serde::{Deserialize, Serialize};

/// A named role with a precedence level. Higher levels dominate lower ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub level: i64,
}

impl Role {
    pub fn new(name: impl Into<String>, level: i64) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// The identity record held by the store and snapshotted into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub activated: bool,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

/// The authenticated subject of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<&UserRecord> for Principal {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            role: record.role.clone(),
        }
    }
}

impl From<UserRecord> for Principal {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            role: record.role,
        }
    }
}
