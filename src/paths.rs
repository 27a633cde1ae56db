//! Shared path-sanitization helpers used by `organize/` and `moveexec.rs`.
//!
//! Grounded on the teacher's `checkout.rs::sanitize_filename`, generalized to
//! spec §4.4's fuller character set and truncation rules.

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const MAX_COMPONENT_LEN: usize = 180;

/// Sanitize a single path component: strip forbidden characters and control
/// characters, collapse whitespace, trim trailing dots/spaces (illegal on
/// Windows), and truncate to a filesystem-friendly length.
pub fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if FORBIDDEN.contains(&c) || c.is_control() {
            out.push('_');
        } else {
            out.push(c);
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ' ']).trim();

    let mut truncated: String = trimmed.chars().take(MAX_COMPONENT_LEN).collect();
    if truncated.is_empty() {
        truncated = "_".to_string();
    }
    truncated
}

/// Join sanitized components into a relative path string using `/`.
pub fn sanitize_path_components<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(sanitize_component)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_forbidden_characters() {
        assert_eq!(sanitize_component("AC/DC: Back?"), "AC_DC_ Back_");
    }

    #[test]
    fn trims_trailing_dots_and_spaces() {
        assert_eq!(sanitize_component("Album Name.. "), "Album Name");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(sanitize_component("Too    Many   Spaces"), "Too Many Spaces");
    }

    #[test]
    fn empty_after_sanitization_becomes_placeholder() {
        assert_eq!(sanitize_component("???"), "_");
    }
}
