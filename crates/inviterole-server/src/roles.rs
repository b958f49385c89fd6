use inviterole_core::MappedRole;
use inviterole_models::id::RoleId;
use inviterole_models::role::Role;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleLookupError {
    #[error("role '{0}' not found on the guild")]
    NotFound(String),
    #[error("role name '{0}' matches several guild roles, use its id instead")]
    Ambiguous(String),
    #[error("role '{0}' is managed by an integration and cannot be granted by the bot")]
    Managed(String),
}

/// Turn configured `(role name or id, invite code)` pairs into `(code, role)`
/// pairs against the guild's actual roles.
///
/// Names match exactly first, then case-insensitively. A numeric value is taken
/// as a role id even when the role list does not contain it. Integration-managed
/// roles are refused.
pub fn resolve_roles(
    configured: &[(String, String)],
    guild_roles: &[Role],
) -> Result<Vec<(String, MappedRole)>, RoleLookupError> {
    configured
        .iter()
        .map(|(role, code)| Ok((code.clone(), lookup(role, guild_roles)?)))
        .collect()
}

fn lookup(wanted: &str, guild_roles: &[Role]) -> Result<MappedRole, RoleLookupError> {
    if let Ok(id) = wanted.trim().parse::<RoleId>() {
        return match guild_roles.iter().find(|r| r.id == id) {
            Some(role) => to_mapped(role),
            None => Ok(MappedRole {
                id,
                name: wanted.to_string(),
            }),
        };
    }

    if let Some(role) = guild_roles.iter().find(|r| r.name == wanted) {
        return to_mapped(role);
    }

    let mut folded = guild_roles
        .iter()
        .filter(|r| r.name.to_lowercase() == wanted.to_lowercase());
    match (folded.next(), folded.next()) {
        (Some(role), None) => to_mapped(role),
        (Some(_), Some(_)) => Err(RoleLookupError::Ambiguous(wanted.to_string())),
        (None, _) => Err(RoleLookupError::NotFound(wanted.to_string())),
    }
}

fn to_mapped(role: &Role) -> Result<MappedRole, RoleLookupError> {
    if role.managed {
        return Err(RoleLookupError::Managed(role.name.clone()));
    }
    Ok(MappedRole {
        id: role.id,
        name: role.name.clone(),
    })
}
