//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a valid module name (lowercase alphanumeric with hyphens)
    pub fn module_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,24}[a-z0-9]?".prop_filter("Name must not be empty", |s| !s.is_empty())
    }

    /// Generate a version string in the tag styles module tables use
    pub fn version() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..20, 0u32..20, 0u32..20).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
            (1u32..10, 0u32..20).prop_map(|(a, b)| format!("R{a}-{b}")),
            "[0-9a-f]{40}".prop_map(String::from),
        ]
    }

    /// Generate a valid SHA256 hash (64 hex characters)
    pub fn sha256_hash() -> impl Strategy<Value = String> {
        "[0-9a-f]{64}"
    }

    /// Generate a repository or archive URL
    pub fn url() -> impl Strategy<Value = String> {
        ("[a-z]{3,10}", "[a-z]{2,5}", "[a-z0-9-]{1,20}")
            .prop_map(|(domain, tld, path)| format!("https://{domain}.{tld}/{path}"))
    }

    /// Generate a relative install path
    pub fn install_path() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9-]{0,12}",
            ("[a-z]{2,8}", "[a-z][a-z0-9-]{0,12}").prop_map(|(a, b)| format!("{a}/{b}")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_module_name_generator(name in module_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn test_sha256_generator(hash in sha256_hash()) {
            prop_assert_eq!(hash.len(), 64);
            prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[test]
        fn test_install_path_generator(path in install_path()) {
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.is_empty());
        }
    }
}
