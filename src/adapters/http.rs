use crate::domain::ports::{Gateway, GatewayError, GatewayResult};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://cloud.memsource.com/web/api/v1";

/// Error body returned by the TMS API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error_code: Option<String>,
    error_description: Option<String>,
}

/// Gateway backed by the TMS REST API.
pub struct PhraseGateway {
    client: Client,
    base_url: Url,
    token: String,
    timeout: Duration,
}

impl PhraseGateway {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ImportError::InvalidConfigValueError {
            field: "api.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ImportError::InvalidConfigValueError {
                field: "api.base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // new() 已確認 base URL 可作為 base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post(&self, segments: &[&str], body: Value) -> GatewayResult {
        let url = self.endpoint(segments);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .header("Authorization", format!("ApiToken {}", self.token))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        message: format!("no response from {} within {:?}", url, self.timeout),
                    }
                } else {
                    GatewayError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status.is_success() {
            let payload: Value = response.json().await.map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        message: e.to_string(),
                    }
                } else {
                    GatewayError::InvalidResponse {
                        status: status.as_u16(),
                        message: format!("body is not JSON: {}", e),
                    }
                }
            })?;
            return remote_id(&payload).ok_or_else(|| GatewayError::InvalidResponse {
                status: status.as_u16(),
                message: "response has no 'uid' or 'id'".to_string(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&text).ok();
        let code = parsed
            .as_ref()
            .and_then(|b| b.error_code.clone())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown")
                    .to_string()
            });
        let message = parsed
            .and_then(|b| b.error_description)
            .filter(|m| !m.is_empty())
            .unwrap_or(if text.is_empty() { status.to_string() } else { text });

        Err(GatewayError::Http {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

/// The API returns the new entity with a string `uid`; older endpoints
/// only carry a numeric `id`.
fn remote_id(payload: &Value) -> Option<String> {
    ["uid", "id"].iter().find_map(|key| match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl Gateway for PhraseGateway {
    async fn create_domain(&self, name: &str, timezone: &str) -> GatewayResult {
        self.post(&["domains"], json!({ "name": name, "timezone": timezone }))
            .await
    }

    async fn create_subdomain(&self, parent_domain_id: &str, name: &str) -> GatewayResult {
        self.post(
            &["domains", parent_domain_id, "subDomains"],
            json!({ "name": name }),
        )
        .await
    }

    async fn create_client(&self, name: &str) -> GatewayResult {
        self.post(&["clients"], json!({ "name": name })).await
    }

    async fn create_business_unit(&self, client_id: &str, name: &str) -> GatewayResult {
        self.post(
            &["businessUnits"],
            json!({ "name": name, "client_id": client_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path_and_escapes_segments() {
        let gateway = PhraseGateway::new(
            "https://cloud.memsource.com/web/api/v1/",
            "t",
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            gateway.endpoint(&["domains"]).as_str(),
            "https://cloud.memsource.com/web/api/v1/domains"
        );
        assert_eq!(
            gateway.endpoint(&["domains", "a b/c", "subDomains"]).as_str(),
            "https://cloud.memsource.com/web/api/v1/domains/a%20b%2Fc/subDomains"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(PhraseGateway::new("not a url", "t", Duration::from_secs(1)).is_err());
        assert!(PhraseGateway::new("mailto:ops@example.com", "t", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_remote_id_prefers_uid() {
        assert_eq!(
            remote_id(&json!({"uid": "abc", "id": 12})),
            Some("abc".to_string())
        );
        assert_eq!(remote_id(&json!({"id": 12})), Some("12".to_string()));
        assert_eq!(remote_id(&json!({"name": "x"})), None);
    }
}
