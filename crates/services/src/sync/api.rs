use async_trait::async_trait;
use linguify_core::model::{ProgressPayload, UpdateKind};
use reqwest::Client;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::SubmitError;

/// Remote side of progress persistence.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Send one progress update.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Network` for transport failures and
    /// `SubmitError::Rejected` when the backend refuses the update.
    async fn submit(&self, kind: UpdateKind, payload: &ProgressPayload) -> Result<(), SubmitError>;
}

/// `ProgressApi` over HTTP JSON posts.
#[derive(Clone)]
pub struct HttpProgressApi {
    client: Client,
    config: Option<ApiConfig>,
}

impl HttpProgressApi {
    #[must_use]
    pub fn new(config: Option<ApiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn endpoint(config: &ApiConfig, kind: UpdateKind) -> String {
        let path = match kind {
            UpdateKind::Content => &config.content_path,
            UpdateKind::Lesson => &config.lesson_path,
        };
        format!(
            "{}/{}",
            config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn submit(&self, kind: UpdateKind, payload: &ProgressPayload) -> Result<(), SubmitError> {
        let config = self.config.as_ref().ok_or(SubmitError::Disabled)?;

        let mut request = self
            .client
            .post(Self::endpoint(config, kind))
            .json(payload);
        if let Some(token) = &config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<SubmitResponse>(&body).ok();

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: parsed
                    .and_then(SubmitResponse::into_message)
                    .unwrap_or_else(|| status.to_string()),
            });
        }

        match parsed {
            Some(resp) if resp.success == Some(false) => Err(SubmitError::Rejected {
                status: status.as_u16(),
                message: resp
                    .into_message()
                    .unwrap_or_else(|| "update not accepted".into()),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    success: Option<bool>,
    message: Option<String>,
    error: Option<String>,
}

impl SubmitResponse {
    fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}
