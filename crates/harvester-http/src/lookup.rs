use async_trait::async_trait;
use harvester_core::HttpMethod;
use harvester_params::{LookupError, LookupProvider};
use tracing::debug;

use crate::caller::send;
use crate::error::HttpError;
use crate::json_path;

/// A named lookup whose values come from a JSON endpoint.
pub struct HttpLookup {
    name: String,
    url: String,
    method: HttpMethod,
    json_path: Option<String>,
    client: reqwest::Client,
}

impl HttpLookup {
    pub fn new(name: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method: HttpMethod::Get,
            json_path: None,
            client,
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Without a path the body must be a JSON array of strings.
    pub fn with_json_path(mut self, json_path: Option<String>) -> Self {
        self.json_path = json_path;
        self
    }
}

#[async_trait]
impl LookupProvider for HttpLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_values(&self, _source_ref: &str) -> Result<Vec<String>, LookupError> {
        let body = send(&self.client, &self.url, self.method, None).await?;
        let doc: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| HttpError::Body(e.to_string()))?;
        let values = json_path::extract(&doc, self.json_path.as_deref().unwrap_or(""))
            .map_err(LookupError::Payload)?;
        debug!(lookup = %self.name, count = values.len(), "lookup values fetched");
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_params::LookupRegistry;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(verb: &str, route: &str, body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn plain_string_array() {
        let server = serve("GET", "/codes", serde_json::json!(["11110", "26110"])).await;
        let lookup = HttpLookup::new(
            "region_codes",
            &format!("{}/codes", server.uri()),
            reqwest::Client::new(),
        );
        assert_eq!(
            lookup.fetch_values("region_codes").await.unwrap(),
            vec!["11110", "26110"]
        );
    }

    #[tokio::test]
    async fn json_path_over_post() {
        let server = serve(
            "POST",
            "/codes",
            serde_json::json!({"data": {"items": [{"code": "A"}, {"code": "B"}]}}),
        )
        .await;
        let lookup = HttpLookup::new(
            "region_codes",
            &format!("{}/codes", server.uri()),
            reqwest::Client::new(),
        )
        .with_method(HttpMethod::Post)
        .with_json_path(Some("data.items[].code".to_string()));
        assert_eq!(lookup.fetch_values("region_codes").await.unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn shape_mismatch_is_payload_error() {
        let server = serve("GET", "/codes", serde_json::json!({"unexpected": true})).await;
        let lookup = HttpLookup::new(
            "region_codes",
            &format!("{}/codes", server.uri()),
            reqwest::Client::new(),
        );
        assert!(matches!(
            lookup.fetch_values("region_codes").await,
            Err(LookupError::Payload(_))
        ));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let lookup = HttpLookup::new("region_codes", &server.uri(), reqwest::Client::new());
        assert!(matches!(
            lookup.fetch_values("region_codes").await,
            Err(LookupError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn routed_through_registry() {
        let server = serve("GET", "/codes", serde_json::json!(["x"])).await;
        let mut registry = LookupRegistry::new();
        registry.register(
            "region_codes",
            Arc::new(HttpLookup::new(
                "region_codes",
                &format!("{}/codes", server.uri()),
                reqwest::Client::new(),
            )),
        );
        assert_eq!(registry.fetch_values("region_codes").await.unwrap(), vec!["x"]);
        assert!(matches!(
            registry.fetch_values("other").await,
            Err(LookupError::NotFound(_))
        ));
    }
}
