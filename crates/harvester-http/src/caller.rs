use std::time::Duration;

use async_trait::async_trait;
use harvester_core::config::HttpConfig;
use harvester_core::{HttpMethod, ParameterCombination};
use harvester_scheduler::{ApiCaller, CallError};
use tracing::{debug, warn};

use crate::error::HttpError;

/// Build the shared client from `[http]` config.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client, HttpError> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Issue one request and return the body of a 2xx response.
///
/// `params` always travel as the query string; the method only picks the
/// verb, so a `POST` carries no body.
pub(crate) async fn send(
    client: &reqwest::Client,
    url: &str,
    method: HttpMethod,
    params: Option<&ParameterCombination>,
) -> Result<String, HttpError> {
    let request = match method {
        HttpMethod::Get => client.get(url),
        HttpMethod::Post => client.post(url),
    };
    let request = match params {
        Some(p) => request.query(&p.query_pairs()),
        None => request,
    };

    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(HttpError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.text().await?)
}

/// [`ApiCaller`] over reqwest.
pub struct HttpCaller {
    client: reqwest::Client,
}

impl HttpCaller {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApiCaller for HttpCaller {
    async fn invoke(
        &self,
        url: &str,
        method: HttpMethod,
        params: &ParameterCombination,
    ) -> Result<String, CallError> {
        debug!(%url, %method, params = params.len(), "calling external API");
        send(&self.client, url, method, Some(params))
            .await
            .map_err(|e| {
                warn!(%url, transient = e.is_transient(), error = %e, "external API call failed");
                CallError::from(e)
            })
    }
}
