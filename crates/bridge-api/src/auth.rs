use std::collections::HashMap;

/// Fixed API key authoriser. An empty key table means the surface is
/// unauthenticated, matching `HttpConfig::api_keys` left unset.
#[derive(Debug, Clone, Default)]
pub struct StaticApiKeyAuthoriser {
    keys: HashMap<String, Vec<String>>,
}

impl StaticApiKeyAuthoriser {
    pub fn new(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self { keys: entries.into_iter().collect() }
    }

    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    /// `scope` is the route group (`"alert"`, `"message"`, `"queue"`); a
    /// key's permission list of `"*"` grants every scope.
    pub fn authorise(&self, api_key: Option<&str>, scope: &str) -> bool {
        if self.is_open() {
            return true;
        }
        let Some(api_key) = api_key else { return false };
        let Some(permissions) = self.keys.get(api_key) else { return false };
        permissions.iter().any(|perm| perm == "*" || perm == scope)
    }
}

pub fn extract_api_key(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-api-key")
        .or_else(|| headers.get(axum::http::header::AUTHORIZATION))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().trim_start_matches("Bearer ").to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_is_open() {
        let auth = StaticApiKeyAuthoriser::default();
        assert!(auth.authorise(None, "alert"));
    }

    #[test]
    fn wildcard_key_grants_every_scope() {
        let auth = StaticApiKeyAuthoriser::new([("abc".to_string(), vec!["*".to_string()])]);
        assert!(auth.authorise(Some("abc"), "queue"));
        assert!(!auth.authorise(Some("other"), "queue"));
    }

    #[test]
    fn scoped_key_rejects_other_scopes() {
        let auth = StaticApiKeyAuthoriser::new([("abc".to_string(), vec!["alert".to_string()])]);
        assert!(auth.authorise(Some("abc"), "alert"));
        assert!(!auth.authorise(Some("abc"), "queue"));
    }
}
