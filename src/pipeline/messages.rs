//! User-facing wording for fetch failures.

use super::source::FetchError;

/// Message shown when a list fails to load and nothing more specific applies.
pub const DEFAULT_LOAD_ERROR: &str = "Failed to load the list. Please try again.";

/// Map a fetch failure to a display string, falling back to `fallback`.
pub fn describe_fetch_error(error: &FetchError, fallback: &str) -> String {
    let message = match error {
        FetchError::Transport(_) => "Network error. Check your connection and retry.",
        FetchError::Status { status: 401, .. } => "Your session has expired. Please sign in again.",
        FetchError::Status { status: 403, .. } => "You do not have access to this list.",
        FetchError::Status { status: 404, .. } => "The requested list was not found.",
        FetchError::Status { status: 429, .. } => "Too many requests. Please retry shortly.",
        FetchError::Status { status, .. } if (500..=599).contains(status) => {
            "The server failed to respond. Please retry later."
        }
        _ => fallback,
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_get_specific_wording() {
        let err = FetchError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(
            describe_fetch_error(&err, DEFAULT_LOAD_ERROR),
            "Too many requests. Please retry shortly."
        );
    }

    #[test]
    fn unknown_errors_use_fallback() {
        let err = FetchError::Mapping("missing items".into());
        assert_eq!(describe_fetch_error(&err, "fallback"), "fallback");

        let teapot = FetchError::Status {
            status: 418,
            body: String::new(),
        };
        assert_eq!(describe_fetch_error(&teapot, "fallback"), "fallback");
    }
}
