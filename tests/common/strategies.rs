use proptest::prelude::*;

use citeline_core::models::UserIntent;
use citeline_core::orchestration::ErrorCategory;
use citeline_core::state_machine::{ProcessingStatus, ALL_STATUSES};

/// Strategy over all twelve processing statuses
pub fn processing_status_strategy() -> impl Strategy<Value = ProcessingStatus> {
    prop::sample::select(ALL_STATUSES.to_vec())
}

/// Strategy for (from, to) status pairs, legal and illegal alike
pub fn status_pair_strategy() -> impl Strategy<Value = (ProcessingStatus, ProcessingStatus)> {
    (processing_status_strategy(), processing_status_strategy())
}

/// Strategy over every user intent
pub fn user_intent_strategy() -> impl Strategy<Value = UserIntent> {
    prop_oneof![
        Just(UserIntent::Auto),
        Just(UserIntent::Ignore),
        Just(UserIntent::Priority),
        Just(UserIntent::ManualOnly),
        Just(UserIntent::Archive),
    ]
}

/// Strategy for 1-based attempt numbers
pub fn attempt_strategy() -> impl Strategy<Value = u32> {
    1u32..=12
}

/// Strategy over the failure categories that never earn a backoff delay
pub fn non_network_category_strategy() -> impl Strategy<Value = ErrorCategory> {
    prop_oneof![
        Just(ErrorCategory::HttpClient),
        Just(ErrorCategory::Permanent),
        Just(ErrorCategory::Unknown),
    ]
}

/// Choice seeds for random walks along legal transition edges
pub fn walk_seed_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<usize>(), 1..12)
}

/// Ages in minutes and link flags for duplicate-group members
pub fn member_profile_strategy() -> impl Strategy<Value = Vec<(i64, bool)>> {
    prop::collection::vec((0i64..50_000, any::<bool>()), 2..8)
}

/// Host and path material for URL-variant generation. The host base avoids
/// the literal `www`, which the normalizer strips as a prefix.
pub fn url_parts_strategy() -> impl Strategy<Value = (String, String)> {
    (
        "[a-z]{3,10}".prop_filter("host base collides with the www strip rule", |host| {
            host.as_str() != "www"
        }),
        "[a-zA-Z0-9]{1,8}(/[a-zA-Z0-9]{1,8}){0,2}",
    )
        .prop_map(|(host, path)| (format!("{host}.com"), path))
}

/// Cosmetic rewrites that must never change a dedup key
#[derive(Debug, Clone, Copy)]
pub struct UrlDecoration {
    pub uppercase_scheme: bool,
    pub uppercase_host: bool,
    pub www_prefix: bool,
    pub trailing_slash: bool,
    pub surrounding_whitespace: bool,
}

impl UrlDecoration {
    /// Render the decorated spelling of `https://{host}/{path}`
    pub fn apply(&self, host: &str, path: &str) -> String {
        let scheme = if self.uppercase_scheme { "HTTPS" } else { "https" };
        let mut host = if self.uppercase_host {
            host.to_ascii_uppercase()
        } else {
            host.to_string()
        };
        if self.www_prefix {
            host = format!("www.{host}");
        }
        let slash = if self.trailing_slash { "/" } else { "" };
        let url = format!("{scheme}://{host}/{path}{slash}");
        if self.surrounding_whitespace {
            format!("  {url} ")
        } else {
            url
        }
    }
}

/// Strategy over combinations of cosmetic URL rewrites
pub fn url_decoration_strategy() -> impl Strategy<Value = UrlDecoration> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(uppercase_scheme, uppercase_host, www_prefix, trailing_slash, surrounding_whitespace)| {
                UrlDecoration {
                    uppercase_scheme,
                    uppercase_host,
                    www_prefix,
                    trailing_slash,
                    surrounding_whitespace,
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_url_parts_build_canonical_urls((host, path) in url_parts_strategy()) {
            prop_assert!(host.ends_with(".com"));
            prop_assert!(!host.starts_with("www."));
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.ends_with('/'));
        }

        #[test]
        fn test_decorations_only_touch_cosmetics(
            (host, path) in url_parts_strategy(),
            decoration in url_decoration_strategy(),
        ) {
            let decorated = decoration.apply(&host, &path);
            let trimmed = decorated.trim();
            prop_assert!(trimmed.to_ascii_lowercase().starts_with("https://"));
            prop_assert!(trimmed.to_ascii_lowercase().contains(&host));
        }
    }
}
