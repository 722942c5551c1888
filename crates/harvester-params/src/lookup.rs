use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::SourceError;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Unknown lookup: {0}")]
    NotFound(String),

    #[error("Lookup unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected lookup payload: {0}")]
    Payload(String),
}

/// External collaborator backing `LOOKUP` parameter sources.
///
/// Implementations return values in the order they should be iterated; the
/// resolver forwards them untouched.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_values(&self, source_ref: &str) -> Result<Vec<String>, LookupError>;
}

/// A fixed list, e.g. the active region codes exported from the code registry.
pub struct StaticLookup {
    name: String,
    values: Vec<String>,
}

impl StaticLookup {
    pub fn new(name: &str, values: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

#[async_trait]
impl LookupProvider for StaticLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_values(&self, _source_ref: &str) -> Result<Vec<String>, LookupError> {
        Ok(self.values.clone())
    }
}

/// Routes a lookup reference to the provider registered under that name.
#[derive(Default, Clone)]
pub struct LookupRegistry {
    providers: BTreeMap<String, Arc<dyn LookupProvider>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn LookupProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl LookupProvider for LookupRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn fetch_values(&self, source_ref: &str) -> Result<Vec<String>, LookupError> {
        let provider = self
            .providers
            .get(source_ref)
            .ok_or_else(|| LookupError::NotFound(source_ref.to_string()))?;
        provider.fetch_values(source_ref).await
    }
}

/// Extract the lookup name from a `LOOKUP` spec: a bare name, a JSON
/// string, or `{"lookup": "<name>"}`.
pub fn parse_lookup_ref(spec: &str) -> Result<String, SourceError> {
    let trimmed = spec.trim();
    let name = if trimmed.starts_with('{') || trimmed.starts_with('"') {
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| SourceError::Parse(e.to_string()))?;
        match value {
            Value::String(s) => s,
            Value::Object(map) => map
                .get("lookup")
                .or_else(|| map.get("sourceRef"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    SourceError::Parse("lookup spec needs a string 'lookup' field".to_string())
                })?,
            other => {
                return Err(SourceError::Parse(format!(
                    "lookup spec must be a name or object, got {other}"
                )))
            }
        }
    } else {
        trimmed.to_string()
    };

    if name.trim().is_empty() {
        return Err(SourceError::Parse("empty lookup reference".to_string()));
    }
    Ok(name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ref_forms() {
        assert_eq!(parse_lookup_ref(" region_codes ").unwrap(), "region_codes");
        assert_eq!(parse_lookup_ref(r#""region_codes""#).unwrap(), "region_codes");
        assert_eq!(
            parse_lookup_ref(r#"{"lookup":"region_codes"}"#).unwrap(),
            "region_codes"
        );
        assert!(parse_lookup_ref("").is_err());
        assert!(parse_lookup_ref(r#"{"name":"x"}"#).is_err());
        assert!(parse_lookup_ref("{broken").is_err());
    }

    #[tokio::test]
    async fn registry_routes_by_name() {
        let mut registry = LookupRegistry::new();
        registry.register(
            "region_codes",
            Arc::new(StaticLookup::new(
                "region_codes",
                vec!["11110".to_string(), "11140".to_string()],
            )),
        );
        let values = registry.fetch_values("region_codes").await.unwrap();
        assert_eq!(values, vec!["11110", "11140"]);

        let err = registry.fetch_values("missing").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound(name) if name == "missing"));
    }
}
