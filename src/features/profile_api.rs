//! Client for the local anti-detect browser profile service.
//!
//! Authorize once with an API token, then start a profile in automation mode
//! and attach to the DevTools endpoint it reports.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::core::error::ScoutError;

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationEndpoint {
    pub port: u16,
    #[serde(rename = "wsEndpoint")]
    pub ws_endpoint: String,
}

impl AutomationEndpoint {
    pub fn cdp_url(&self) -> String {
        format!("ws://127.0.0.1:{}{}", self.port, self.ws_endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct StartProfileResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    automation: Option<AutomationEndpoint>,
    #[serde(default)]
    msg: Option<String>,
}

pub struct ProfileApiClient {
    base_url: String,
    client: Client,
}

impl ProfileApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ScoutError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn authorize(&self, api_token: &str) -> Result<(), ScoutError> {
        let url = format!("{}/v1.0/auth/login-with-token", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "token": api_token }))
            .send()
            .await
            .map_err(|e| ScoutError::ProfileAuthorization(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoutError::ProfileAuthorization(format!(
                "HTTP {} - {}",
                status.as_u16(),
                body.trim()
            )));
        }
        info!("profile service: authorized");
        Ok(())
    }

    /// Start `profile_id` with automation enabled.
    pub async fn start_profile(&self, profile_id: &str) -> Result<AutomationEndpoint, ScoutError> {
        let launch_error = |reason: String| ScoutError::ProfileLaunch {
            profile_id: profile_id.to_string(),
            reason,
        };
        let url = format!(
            "{}/v1.0/browser_profiles/{}/start?automation=1",
            self.base_url, profile_id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| launch_error(format!("{}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| launch_error(format!("could not read response: {}", e)))?;
        if status != reqwest::StatusCode::OK {
            return Err(launch_error(format!("HTTP {} - {}", status.as_u16(), body.trim())));
        }
        let endpoint = parse_start_response(&body).map_err(launch_error)?;
        info!(
            "profile service: profile {} started on port {} ({})",
            profile_id, endpoint.port, endpoint.ws_endpoint
        );
        Ok(endpoint)
    }

    /// Authorize and start a profile, returning the CDP websocket URL.
    pub async fn launch(&self, api_token: &str, profile_id: &str) -> Result<String, ScoutError> {
        self.authorize(api_token).await?;
        Ok(self.start_profile(profile_id).await?.cdp_url())
    }
}

fn parse_start_response(body: &str) -> Result<AutomationEndpoint, String> {
    let parsed: StartProfileResponse =
        serde_json::from_str(body).map_err(|e| format!("unexpected response: {}", e))?;
    if !parsed.success {
        return Err(parsed.msg.unwrap_or_else(|| "service reported failure".to_string()));
    }
    parsed
        .automation
        .ok_or_else(|| "response has no automation endpoint".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{"success": true, "automation": {"port": 50123, "wsEndpoint": "/devtools/browser/x1"}}"#;
        let endpoint = parse_start_response(body).unwrap();
        assert_eq!(endpoint.cdp_url(), "ws://127.0.0.1:50123/devtools/browser/x1");
    }

    #[test]
    fn test_parse_failure_message() {
        let body = r#"{"success": false, "msg": "profile already running"}"#;
        assert_eq!(parse_start_response(body).unwrap_err(), "profile already running");
        assert!(parse_start_response("<html>").is_err());
        assert!(parse_start_response(r#"{"success": true}"#).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_fatal_error() {
        let client = ProfileApiClient::new("http://127.0.0.1:9/").unwrap();
        match client.authorize("token").await {
            Err(ScoutError::ProfileAuthorization(_)) => {}
            other => panic!("expected authorization error, got {:?}", other),
        }
        match client.start_profile("42").await {
            Err(ScoutError::ProfileLaunch { profile_id, .. }) => assert_eq!(profile_id, "42"),
            other => panic!("expected launch error, got {:?}", other),
        }
    }
}
