//! Deterministic filename derivation
//!
//! Maps a resource to a collision-resistant filename that is stable across
//! runs, so a resumed run finds the same destination path as the run that
//! produced it.

use crate::discovery::Resource;

/// File extension applied to every downloaded resource.
const EXTENSION: &str = ".json";

/// Maximum length of the sanitized name component.
const MAX_NAME_LEN: usize = 50;

/// Derive the destination filename for a resource.
///
/// Format: `{first 8 chars of id}_{sanitized name}.json`. The id prefix
/// makes names collision-resistant even when two resources share a display
/// name; sanitization keeps the result filesystem-safe. Idempotent: the
/// same resource always maps to the same string.
pub fn file_name(resource: &Resource) -> String {
    // Character-based prefix: ids are not guaranteed ASCII, so byte
    // slicing could split a multi-byte char
    let id_prefix: String = if resource.id.is_empty() {
        "unknown".to_string()
    } else {
        resource.id.chars().take(8).collect()
    };

    // Avoid .json.json when the display name already carries the extension
    let name = strip_json_extension(&resource.name);

    let sanitized = sanitize(name);
    let name = if sanitized.is_empty() {
        "resource".to_string()
    } else {
        sanitized
    };

    format!("{id_prefix}_{name}{EXTENSION}")
}

/// Strip a trailing `.json`, matched case-insensitively. The comparison
/// runs on the raw bytes: a match is all-ASCII, so the cut point is always
/// a char boundary even when the rest of the name is not.
fn strip_json_extension(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() >= EXTENSION.len()
        && bytes[bytes.len() - EXTENSION.len()..].eq_ignore_ascii_case(EXTENSION.as_bytes())
    {
        &name[..name.len() - EXTENSION.len()]
    } else {
        name
    }
}

/// Replace unsafe characters with `_`, collapse runs of `_`, trim leading
/// and trailing `_`, and cap the length.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            c
        } else {
            '_'
        };
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, name: &str) -> Resource {
        Resource {
            id: id.to_string(),
            name: name.to_string(),
            url: "https://example.org/data.json".to_string(),
            format: "JSON".to_string(),
            description: None,
            size: None,
            last_modified: None,
        }
    }

    #[test]
    fn uses_eight_char_id_prefix() {
        let name = file_name(&resource("abcdef1234567890", "Avis 2024"));
        assert_eq!(name, "abcdef12_Avis_2024.json");
    }

    #[test]
    fn short_id_is_kept_whole() {
        let name = file_name(&resource("ab12", "data"));
        assert_eq!(name, "ab12_data.json");
    }

    #[test]
    fn empty_id_falls_back_to_unknown() {
        let name = file_name(&resource("", "data"));
        assert_eq!(name, "unknown_data.json");
    }

    #[test]
    fn strips_existing_json_extension() {
        let name = file_name(&resource("abcdef12", "Contrats.JSON"));
        assert_eq!(name, "abcdef12_Contrats.json");
    }

    #[test]
    fn sanitizes_and_collapses_unsafe_chars() {
        let name = file_name(&resource("abcdef12", "avis  (août) / 2024"));
        assert_eq!(name, "abcdef12_avis_ao_t_2024.json");
    }

    #[test]
    fn empty_name_falls_back_to_resource() {
        let name = file_name(&resource("abcdef12", "///"));
        assert_eq!(name, "abcdef12_resource.json");
    }

    #[test]
    fn long_names_are_truncated() {
        let name = file_name(&resource("abcdef12", &"x".repeat(200)));
        // prefix + "_" + 50 chars + ".json"
        assert_eq!(name.len(), 8 + 1 + 50 + 5);
    }

    #[test]
    fn multibyte_id_takes_a_character_prefix() {
        // 3 chars but 9 bytes; a byte-indexed prefix would split a char
        let name = file_name(&resource("€€€", "data"));
        assert_eq!(name, "€€€_data.json");

        let name = file_name(&resource("déféré-2024-abc", "data"));
        assert_eq!(name, "déféré-2_data.json");
    }

    #[test]
    fn multibyte_name_near_the_extension_is_handled() {
        // `ſ` lowercases to `s`, shrinking the byte length; the strip must
        // cut by the original bytes, not the lowercased ones
        let name = file_name(&resource("abcdef12", "Aviſ.JSON"));
        assert_eq!(name, "abcdef12_Avi.json");
    }

    #[test]
    fn derivation_is_idempotent() {
        let r = resource("abcdef1234", "Avis d'appel d'offres");
        assert_eq!(file_name(&r), file_name(&r));
    }
}
