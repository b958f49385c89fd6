use std::collections::HashMap;

use inviterole_models::id::RoleId;

use crate::error::MappingError;

/// A role that an invite code grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRole {
    pub id: RoleId,
    pub name: String,
}

/// Invite code -> role table. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RoleMapping {
    by_code: HashMap<String, MappedRole>,
}

impl RoleMapping {
    /// Build the table from `(invite code, role)` pairs.
    ///
    /// Codes may be given as full invite links; only the trailing code is kept.
    /// A code bound to two roles is rejected rather than resolved to either.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (S, MappedRole)>,
        S: AsRef<str>,
    {
        let mut by_code: HashMap<String, MappedRole> = HashMap::new();
        for (raw_code, role) in entries {
            let code = normalize_code(raw_code.as_ref());
            if code.is_empty() {
                return Err(MappingError::EmptyCode { role: role.name });
            }
            if let Some(existing) = by_code.get(code) {
                return Err(MappingError::DuplicateCode {
                    code: code.to_string(),
                    first: existing.name.clone(),
                    second: role.name,
                });
            }
            by_code.insert(code.to_string(), role);
        }
        Ok(Self { by_code })
    }

    /// Entries ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappedRole)> {
        let mut entries: Vec<_> = self
            .by_code
            .iter()
            .map(|(code, role)| (code.as_str(), role))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

/// Strip a `https://discord.gg/` style prefix and surrounding whitespace.
pub fn normalize_code(raw: &str) -> &str {
    let trimmed = raw.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

pub struct RoleMapper {
    mapping: RoleMapping,
}

impl RoleMapper {
    pub fn new(mapping: RoleMapping) -> Self {
        Self { mapping }
    }

    /// `None` means the invite exists for some other purpose; not an error.
    pub fn resolve(&self, code: &str) -> Option<&MappedRole> {
        self.mapping.by_code.get(code)
    }

    pub fn mapping(&self) -> &RoleMapping {
        &self.mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64, name: &str) -> MappedRole {
        MappedRole {
            id: RoleId::new(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn resolves_known_code_repeatably() {
        let mapping = RoleMapping::from_entries([("abc123", role(10, "Moderator"))]).unwrap();
        let mapper = RoleMapper::new(mapping);
        let first = mapper.resolve("abc123").cloned();
        for _ in 0..5 {
            assert_eq!(mapper.resolve("abc123").cloned(), first);
        }
        assert_eq!(first.unwrap().name, "Moderator");
    }

    #[test]
    fn unknown_code_is_none() {
        let mapping = RoleMapping::from_entries([("abc123", role(10, "Moderator"))]).unwrap();
        assert!(RoleMapper::new(mapping).resolve("nope").is_none());
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let err = RoleMapping::from_entries([
            ("abc123", role(10, "Moderator")),
            ("https://discord.gg/abc123", role(11, "Mentor")),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            MappingError::DuplicateCode {
                code: "abc123".into(),
                first: "Moderator".into(),
                second: "Mentor".into(),
            }
        );
    }

    #[test]
    fn empty_code_is_rejected() {
        let err = RoleMapping::from_entries([("  ", role(10, "Jury"))]).unwrap_err();
        assert!(matches!(err, MappingError::EmptyCode { .. }));
    }

    #[test]
    fn mapping_lists_normalized_codes_in_order() {
        let mapping = RoleMapping::from_entries([
            ("https://discord.gg/xyz789", role(11, "Mentor")),
            ("abc123", role(10, "Moderator")),
        ])
        .unwrap();
        let mapper = RoleMapper::new(mapping);
        let listed: Vec<(&str, &str)> = mapper
            .mapping()
            .iter()
            .map(|(code, role)| (code, role.name.as_str()))
            .collect();
        assert_eq!(listed, vec![("abc123", "Moderator"), ("xyz789", "Mentor")]);
    }

    #[test]
    fn invite_links_are_reduced_to_codes() {
        assert_eq!(normalize_code("https://discord.gg/abc123"), "abc123");
        assert_eq!(normalize_code("discord.com/invite/abc123/"), "abc123");
        assert_eq!(normalize_code(" xyz789 "), "xyz789");
    }
}
