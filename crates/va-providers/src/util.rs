//! Shared utility functions for provider adapters.

use va_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve an API key from the environment variable named by `api_key_env`.
pub(crate) fn resolve_api_key(api_key_env: &str) -> Result<String, Error> {
    std::env::var(api_key_env).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{api_key_env}' not set or not valid UTF-8"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_missing_is_auth_error() {
        let err = resolve_api_key("VA_TEST_NONEXISTENT_KEY_12345").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn resolve_api_key_present() {
        std::env::set_var("VA_TEST_PRESENT_KEY_1", "secret");
        let val = resolve_api_key("VA_TEST_PRESENT_KEY_1").unwrap();
        assert_eq!(val, "secret");
        std::env::remove_var("VA_TEST_PRESENT_KEY_1");
    }
}
