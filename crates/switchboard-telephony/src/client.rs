//! The provider REST client and its settings.

use crate::error::TelephonyError;
use async_trait::async_trait;
use serde::Deserialize;
use switchboard_pipeline::{CallLauncher, PipelineError, RecordingStore};
use url::Url;

/// Account-level settings for the telephony provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL of the provider REST API.
    pub api_base: String,
    /// Account identifier; doubles as the basic-auth username.
    pub account_sid: String,
    /// Account secret; the basic-auth password.
    pub auth_token: String,
    /// The number calls originate from. Required for outbound calls.
    pub from_number: String,
    /// Fallback destination when an outbound call names no recipient.
    pub default_to: String,
    /// Externally reachable base URL of this server, used to assemble the
    /// webhook callback URLs embedded in call-creation requests.
    pub public_url: String,
}

/// Response body from the provider's call-creation endpoint.
#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    sid: String,
}

/// Client for the provider's account-scoped REST API.
#[derive(Debug, Clone)]
pub struct TelephonyClient {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl TelephonyClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Starts an outbound call. The provider will request the
    /// outbound-greeting route (with `message` embedded in the callback URL)
    /// when the callee answers, and report lifecycle transitions to the
    /// status route. Returns the provider-assigned call SID without waiting
    /// for the call to progress.
    pub async fn create_call(
        &self,
        to: Option<&str>,
        message: &str,
    ) -> Result<String, TelephonyError> {
        let to = match to.filter(|t| !t.trim().is_empty()) {
            Some(t) => t.to_string(),
            None if !self.settings.default_to.trim().is_empty() => {
                self.settings.default_to.clone()
            }
            None => {
                return Err(TelephonyError::Config(
                    "no destination number provided and no default configured".to_string(),
                ))
            }
        };
        if self.settings.from_number.trim().is_empty() {
            return Err(TelephonyError::Config(
                "no originating number configured".to_string(),
            ));
        }

        let callback_url = build_greeting_callback(&self.settings.public_url, message)?;
        let status_url = join_route(&self.settings.public_url, "/voice/status")?;

        let endpoint = format!(
            "{}/Accounts/{}/Calls.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        );

        let response = self
            .http
            .post(&endpoint)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", to.as_str()),
                ("From", self.settings.from_number.as_str()),
                ("Url", callback_url.as_str()),
                ("StatusCallback", status_url.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TelephonyError::Status {
                status: response.status().as_u16(),
                context: "call creation".to_string(),
            });
        }

        let body: CreateCallResponse = response
            .json()
            .await
            .map_err(|e| TelephonyError::Response(format!("call creation body: {}", e)))?;

        tracing::info!(call_sid = %body.sid, to = %to, "outbound call created");
        Ok(body.sid)
    }

    /// Downloads a recorded utterance for transcription.
    pub async fn fetch_recording(&self, url: &str) -> Result<Vec<u8>, TelephonyError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TelephonyError::Status {
                status: response.status().as_u16(),
                context: "recording fetch".to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Deletes a provider-held recording. Best-effort from the caller's
    /// perspective; this just reports the outcome.
    pub async fn delete_recording(&self, recording_sid: &str) -> Result<(), TelephonyError> {
        let endpoint = format!(
            "{}/Accounts/{}/Recordings/{}.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid,
            recording_sid
        );

        let response = self
            .http
            .delete(&endpoint)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .send()
            .await?;

        // 404 means it is already gone, which is the state we wanted.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(TelephonyError::Status {
                status: response.status().as_u16(),
                context: "recording deletion".to_string(),
            });
        }
        Ok(())
    }
}

/// Assembles the outbound-greeting callback URL with the opening message
/// URL-encoded into the query string.
fn build_greeting_callback(public_url: &str, message: &str) -> Result<Url, TelephonyError> {
    let mut url = join_route(public_url, "/voice/outbound-greeting")?;
    url.query_pairs_mut().append_pair("message", message);
    Ok(url)
}

fn join_route(public_url: &str, route: &str) -> Result<Url, TelephonyError> {
    let base = Url::parse(public_url)?;
    Ok(base.join(route)?)
}

#[async_trait]
impl RecordingStore for TelephonyClient {
    async fn fetch_recording(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        TelephonyClient::fetch_recording(self, url)
            .await
            .map_err(|e| PipelineError::Recording(e.to_string()))
    }

    async fn delete_recording(&self, recording_sid: &str) -> Result<(), PipelineError> {
        TelephonyClient::delete_recording(self, recording_sid)
            .await
            .map_err(|e| PipelineError::Recording(e.to_string()))
    }
}

#[async_trait]
impl CallLauncher for TelephonyClient {
    async fn create_call(&self, to: Option<&str>, message: &str) -> Result<String, PipelineError> {
        TelephonyClient::create_call(self, to, message)
            .await
            .map_err(|e| PipelineError::CallCreation(e.to_string()))
    }
}
