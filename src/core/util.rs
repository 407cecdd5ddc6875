// FILE: src/core/util.rs

use std::path::Path;

/// Check if a string is a valid counter/preprocessor identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '.')
}

/// Split on `_`, `-` and spaces, capitalize every word and join with spaces.
pub fn friendly_name(text: &str) -> String {
    text.split(|c| c == '_' || c == '-' || c == ' ')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable cache key for a source path.
pub fn path_hash(path: &Path) -> String {
    format!("{:x}", md5::compute(path.to_string_lossy().as_bytes()))
}

/// `10^precision` as used by fixed-point counters. Saturates instead of
/// overflowing.
pub fn decimal_factor(precision: usize) -> i32 {
    u32::try_from(precision).map_or(i32::MAX, |p| 10i32.saturating_pow(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("score"));
        assert!(is_valid_identifier("_hidden"));
        assert!(is_valid_identifier("pos:x"));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_friendly_name() {
        assert_eq!(friendly_name("diamond_sword"), "Diamond Sword");
        assert_eq!(friendly_name("big-OLD thing"), "Big Old Thing");
    }

    #[test]
    fn test_path_hash_is_stable() {
        let a = path_hash(Path::new("src/main.mcc"));
        assert_eq!(a, path_hash(Path::new("src/main.mcc")));
        assert_ne!(a, path_hash(Path::new("src/other.mcc")));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_decimal_factor_saturates() {
        assert_eq!(decimal_factor(0), 1);
        assert_eq!(decimal_factor(3), 1000);
        assert_eq!(decimal_factor(12), i32::MAX);
    }
}
