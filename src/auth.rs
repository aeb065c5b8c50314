use http::header::{HeaderName, AUTHORIZATION};
use rustc_hash::FxHashSet;

use crate::config::AppConfig;
use crate::error::{GatewayError, IngressApi};

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Allowed client keys, indexed once at startup.
#[derive(Debug, Default)]
pub struct ClientKeyIndex {
    keys: FxHashSet<Box<str>>,
}

impl ClientKeyIndex {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_keys(config.client_authentication.allowed_keys.iter())
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|key| Box::<str>::from(key.as_ref().trim()))
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

fn bearer_token(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Pull the client key out of the headers for the given ingress.
///
/// - Anthropic: `x-api-key`, falling back to `Authorization: Bearer <key>`
/// - `OpenAI`: `Authorization: Bearer <key>` only
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when no key header is present.
pub fn extract_api_key(
    ingress: IngressApi,
    headers: &http::HeaderMap,
) -> Result<&str, GatewayError> {
    let key = match ingress {
        IngressApi::Anthropic => headers
            .get(X_API_KEY)
            .and_then(|v| v.to_str().ok())
            .or_else(|| bearer_token(headers)),
        IngressApi::OpenAiChat => bearer_token(headers),
    };

    key.filter(|k| !k.is_empty())
        .ok_or_else(|| GatewayError::Auth("Missing API key".to_string()))
}

/// Check the presented client key against the index.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when the key is missing or not allowed.
pub fn authenticate(
    ingress: IngressApi,
    headers: &http::HeaderMap,
    allowed: &ClientKeyIndex,
) -> Result<(), GatewayError> {
    let key = extract_api_key(ingress, headers)?;
    if allowed.contains(key) {
        Ok(())
    } else {
        Err(GatewayError::Auth("Invalid API key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> http::HeaderMap {
        let mut map = http::HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_anthropic_prefers_x_api_key() {
        let h = headers(&[("x-api-key", "ant-key"), ("authorization", "Bearer other")]);
        assert_eq!(extract_api_key(IngressApi::Anthropic, &h).unwrap(), "ant-key");
    }

    #[test]
    fn test_anthropic_accepts_bearer() {
        let h = headers(&[("authorization", "Bearer ant-bearer")]);
        assert_eq!(
            extract_api_key(IngressApi::Anthropic, &h).unwrap(),
            "ant-bearer"
        );
    }

    #[test]
    fn test_openai_ignores_x_api_key() {
        let h = headers(&[("x-api-key", "sk-1")]);
        let err = extract_api_key(IngressApi::OpenAiChat, &h).unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[test]
    fn test_authenticate_checks_index() {
        let index = ClientKeyIndex::from_keys(["k1", " k2 ", ""]);
        assert_eq!(index.len(), 2);
        let ok = headers(&[("authorization", "Bearer k2")]);
        assert!(authenticate(IngressApi::OpenAiChat, &ok, &index).is_ok());
        let bad = headers(&[("authorization", "Bearer k3")]);
        assert!(authenticate(IngressApi::OpenAiChat, &bad, &index).is_err());
    }

    #[test]
    fn test_index_from_owned_keys_trims() {
        let index = ClientKeyIndex::from_keys(vec![" owned ".to_string(), "   ".to_string()]);
        assert_eq!(index.len(), 1);
        assert!(index.contains("owned"));
    }

    #[test]
    fn test_empty_index_rejects_everything() {
        let index = ClientKeyIndex::default();
        let h = headers(&[("x-api-key", "anything")]);
        assert!(authenticate(IngressApi::Anthropic, &h, &index).is_err());
    }
}
