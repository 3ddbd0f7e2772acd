use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartbot_core::config::NluConfig;
use cartbot_core::domain::order::SessionId;

use crate::intent::QueryResult;

#[derive(Debug, Error)]
pub enum NluError {
    #[error("nlu transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("nlu request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("nlu response did not contain a query result")]
    MissingQueryResult,
    #[error("nlu is not configured (nlu.base_url is unset)")]
    Disabled,
}

/// Detects an intent from free text. Failures here PROPAGATE to the caller:
/// without an intent result there is no order logic to run, so this is the
/// one external call that is not swallowed.
#[async_trait]
pub trait NluClient: Send + Sync {
    async fn detect_intent(
        &self,
        session_id: &SessionId,
        text: &str,
        language_code: &str,
    ) -> Result<QueryResult, NluError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    query_result: Option<QueryResult>,
}

/// REST client for the external detect-intent endpoint.
pub struct HttpNluClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    api_token: Option<SecretString>,
}

impl HttpNluClient {
    pub fn from_config(config: &NluConfig) -> Result<Self, NluError> {
        let base_url = config.base_url.clone().ok_or(NluError::Disabled)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone().unwrap_or_default(),
            api_token: config.api_token.clone(),
        })
    }

    fn session_endpoint(&self, session_id: &SessionId) -> String {
        format!(
            "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url, self.project_id, session_id.0
        )
    }
}

#[async_trait]
impl NluClient for HttpNluClient {
    async fn detect_intent(
        &self,
        session_id: &SessionId,
        text: &str,
        language_code: &str,
    ) -> Result<QueryResult, NluError> {
        let body = DetectIntentRequest {
            query_input: QueryInput { text: TextInput { text, language_code } },
        };

        let mut request = self.http.post(self.session_endpoint(session_id)).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NluError::Rejected { status: status.as_u16(), body });
        }

        let payload: DetectIntentResponse = response.json().await?;
        payload.query_result.ok_or(NluError::MissingQueryResult)
    }
}

/// Canned client for tests and local development: every call returns a
/// clone of the configured result.
#[derive(Clone, Debug, Default)]
pub struct StaticNluClient {
    result: QueryResult,
}

impl StaticNluClient {
    pub fn new(result: QueryResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl NluClient for StaticNluClient {
    async fn detect_intent(
        &self,
        _session_id: &SessionId,
        _text: &str,
        _language_code: &str,
    ) -> Result<QueryResult, NluError> {
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use cartbot_core::config::NluConfig;
    use cartbot_core::domain::order::SessionId;

    use super::{HttpNluClient, NluError};

    fn nlu_config(base_url: Option<&str>) -> NluConfig {
        NluConfig {
            base_url: base_url.map(|url| url.to_string()),
            project_id: Some("demo".to_string()),
            api_token: None,
            language_code: "en-US".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn client_requires_a_base_url() {
        let result = HttpNluClient::from_config(&nlu_config(None));
        assert!(matches!(result, Err(NluError::Disabled)));
    }

    #[test]
    fn endpoint_embeds_project_and_session() {
        let client = HttpNluClient::from_config(&nlu_config(Some("https://nlu.example/")))
            .expect("client should build");

        let endpoint = client.session_endpoint(&SessionId("abc-123".to_string()));

        assert_eq!(
            endpoint,
            "https://nlu.example/v2/projects/demo/agent/sessions/abc-123:detectIntent"
        );
    }
}
