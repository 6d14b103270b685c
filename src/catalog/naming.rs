//! Display-name assignment
//!
//! Entries are grouped by `(name, user location)`. A lone entry is shown by
//! its plain name; every member of a larger group gets `name#<hash>`, where
//! the hash is taken over the canonical key. Names are always recomputed from
//! scratch over the whole entry set, so a group that shrinks back to one
//! member reverts to the plain name.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::core::types::{ProviderSkillKey, SkillDef};

/// Hex characters used for a collision suffix
pub const SUFFIX_LEN: usize = 8;

/// Separator between a skill name and its collision suffix. Reserved:
/// definitions whose name contains it are rejected, so a plain name can
/// never equal a suffixed one.
pub const SUFFIX_SEPARATOR: char = '#';

/// Hex SHA-256 of the canonical key's three fields
pub fn key_digest(key: &ProviderSkillKey) -> String {
    let mut hasher = Sha256::new();
    for field in [&key.provider_type, &key.name, &key.location] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Compute the display name of every entry.
///
/// Suffixes start at [`SUFFIX_LEN`] characters and only grow if two members
/// of the same group would otherwise share a prefix.
pub fn display_names<'a, I>(entries: I) -> HashMap<ProviderSkillKey, String>
where
    I: IntoIterator<Item = (&'a ProviderSkillKey, &'a SkillDef)>,
{
    let mut groups: HashMap<(&'a str, &'a str), Vec<&'a ProviderSkillKey>> = HashMap::new();
    for (key, def) in entries {
        groups
            .entry((def.name.as_str(), def.location.as_str()))
            .or_default()
            .push(key);
    }

    let mut names = HashMap::new();
    for ((name, _location), members) in groups {
        if let [only] = members.as_slice() {
            names.insert((*only).clone(), name.to_string());
            continue;
        }

        let digests: Vec<String> = members.iter().map(|key| key_digest(key)).collect();
        let len = distinct_prefix_len(&digests);
        for (key, digest) in members.into_iter().zip(digests) {
            names.insert(
                key.clone(),
                format!("{name}{SUFFIX_SEPARATOR}{}", &digest[..len]),
            );
        }
    }
    names
}

fn distinct_prefix_len(digests: &[String]) -> usize {
    let full = digests.iter().map(String::len).min().unwrap_or(SUFFIX_LEN);
    let mut len = SUFFIX_LEN.min(full);
    while len < full {
        let unique: HashSet<&str> = digests.iter().map(|d| &d[..len]).collect();
        if unique.len() == digests.len() {
            break;
        }
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(provider: &str, name: &str, location: &str, canonical: &str) -> (ProviderSkillKey, SkillDef) {
        (
            ProviderSkillKey::new(provider, name, canonical),
            SkillDef::new(provider, name, location),
        )
    }

    fn is_suffixed(display: &str, name: &str) -> bool {
        let Some(rest) = display.strip_prefix(&format!("{name}#")) else {
            return false;
        };
        rest.len() == SUFFIX_LEN && rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn test_digest_is_deterministic_and_field_sensitive() {
        let a = ProviderSkillKey::new("fs", "ab", "c");
        let b = ProviderSkillKey::new("fs", "a", "bc");
        assert_eq!(key_digest(&a), key_digest(&a.clone()));
        assert_ne!(key_digest(&a), key_digest(&b));
        assert_eq!(key_digest(&a).len(), 64);
    }

    #[test]
    fn test_unique_names_stay_plain() {
        let entries = [
            pair("fs", "pdf", "/skills", "/real/pdf"),
            pair("fs", "docx", "/skills", "/real/docx"),
            pair("fs", "pdf", "/other", "/real/other/pdf"),
        ];
        let names = display_names(entries.iter().map(|(k, d)| (k, d)));
        assert_eq!(names[&entries[0].0], "pdf");
        assert_eq!(names[&entries[1].0], "docx");
        assert_eq!(names[&entries[2].0], "pdf");
    }

    #[test]
    fn test_collision_group_is_suffixed() {
        let entries = [
            pair("a", "same", "/p", "/p"),
            pair("b", "same", "/p", "/p"),
        ];
        let names = display_names(entries.iter().map(|(k, d)| (k, d)));
        let first = &names[&entries[0].0];
        let second = &names[&entries[1].0];
        assert!(is_suffixed(first, "same"), "{first}");
        assert!(is_suffixed(second, "same"), "{second}");
        assert_ne!(first, second);
    }

    #[test]
    fn test_handles_unique_per_location() {
        let entries = [
            pair("a", "x", "/p", "/p"),
            pair("b", "x", "/p", "/p"),
            pair("c", "y", "/p", "/p"),
            pair("a", "x", "/q", "/q"),
        ];
        let names = display_names(entries.iter().map(|(k, d)| (k, d)));
        let handles: HashSet<(&str, &str)> = entries
            .iter()
            .map(|(k, d)| (names[k].as_str(), d.location.as_str()))
            .collect();
        assert_eq!(handles.len(), entries.len());

        // A name that mimics a suffixed display name cannot enter the set.
        let suffixed = &names[&entries[0].0];
        assert!(SkillDef::new("c", suffixed.as_str(), "/p").validate().is_err());
    }

    #[test]
    fn test_distinct_prefix_len_grows_on_shared_prefix() {
        let digests = vec!["abcdef0123".to_string(), "abcdef0199".to_string()];
        assert_eq!(distinct_prefix_len(&digests), 9);
    }
}
