//! Entity-type normalization.
//!
//! The classifier reports multi-word entity types with spaces (`"DATE TIME DOB"`)
//! while route configuration spells them with underscores (`"DATE_TIME_DOB"`).
//! [`normalize`] maps both onto one canonical form so they compare equal.

/// Canonical form of an entity type: trimmed, uppercased, and with every run
/// of whitespace and underscores collapsed into a single `_`.
pub fn normalize(entity_type: &str) -> String {
    let mut out = String::with_capacity(entity_type.len());
    let mut in_separator = false;

    for ch in entity_type.trim().chars() {
        if ch.is_whitespace() || ch == '_' {
            if !in_separator {
                out.push('_');
                in_separator = true;
            }
        } else {
            out.extend(ch.to_uppercase());
            in_separator = false;
        }
    }

    out
}
