use serde::{Deserialize, Serialize};

use crate::id::RoleId;

/// A guild role as returned by the roles listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub managed: bool,
}
