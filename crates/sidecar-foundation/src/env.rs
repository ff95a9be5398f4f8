//! Environment inspection used by the STT facade's model discovery (SPEC_FULL.md §4.4)
//! and the CLI's offline-mode / proxy handling (§6.3).

use std::env;

/// Returns the proxy URL the backend library should use for model downloads,
/// checking the conventional variants in priority order. Returns `None` when
/// none are set, in which case the backend makes unproxied requests.
pub fn http_proxy() -> Option<String> {
    for key in ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"] {
        if let Ok(value) = env::var(key) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Checks if the application is running in a CI environment. Used to decide
/// whether tests that shell out to platform tools (GPU detection, §4.5)
/// should be skipped.
pub fn is_ci() -> bool {
    env::var("CI").is_ok()
        || env::var("CONTINUOUS_INTEGRATION").is_ok()
        || env::var("GITHUB_ACTIONS").is_ok()
        || env::var("GITLAB_CI").is_ok()
}
