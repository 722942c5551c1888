use std::sync::Arc;

use chrono::{Local, NaiveDate};
use harvester_core::{ParameterSource, SourceKind};
use tracing::{debug, warn};

use crate::computed::resolve_computed;
use crate::date_range::resolve_date_range;
use crate::error::{SourceError, SourceWarning};
use crate::lookup::{parse_lookup_ref, LookupError, LookupProvider};

/// Values of one parameter source, plus the warning raised if resolution
/// failed and the values were replaced by an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub values: Vec<String>,
    pub warning: Option<SourceWarning>,
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Resolves a [`ParameterSource`] into its ordered value list.
///
/// Resolution is restartable: the same source resolves to the same values
/// as long as the lookup and the pinned date do not change.
#[derive(Clone, Default)]
pub struct ValueSourceResolver {
    lookup: Option<Arc<dyn LookupProvider>>,
    today: Option<NaiveDate>,
}

impl ValueSourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn LookupProvider>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Pin "today" for `COMPUTED` rules. Defaults to the local date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Resolve strictly, returning the first error.
    pub async fn try_resolve(&self, source: &ParameterSource) -> Result<Vec<String>, SourceError> {
        let spec = source.source_spec.as_str();
        match &source.source_kind {
            SourceKind::StaticList => serde_json::from_str::<Vec<String>>(spec)
                .map_err(|e| SourceError::Parse(e.to_string())),
            SourceKind::DateRange => resolve_date_range(spec),
            SourceKind::Lookup => {
                let source_ref = parse_lookup_ref(spec)?;
                let lookup = self.lookup.as_ref().ok_or_else(|| {
                    LookupError::Unavailable("no lookup provider configured".to_string())
                })?;
                Ok(lookup.fetch_values(&source_ref).await?)
            }
            SourceKind::Computed => resolve_computed(spec, self.today()),
            SourceKind::Unknown(raw) => Err(SourceError::UnknownKind(raw.clone())),
        }
    }

    /// Resolve, downgrading any failure to an empty list with a warning.
    pub async fn resolve(&self, source: &ParameterSource) -> Resolution {
        match self.try_resolve(source).await {
            Ok(values) => {
                debug!(
                    parameter = %source.parameter_name,
                    kind = %source.source_kind,
                    count = values.len(),
                    "parameter source resolved"
                );
                Resolution {
                    values,
                    warning: None,
                }
            }
            Err(e) => {
                warn!(
                    parameter = %source.parameter_name,
                    kind = %source.source_kind,
                    error = %e,
                    "parameter source failed, using no values"
                );
                Resolution {
                    values: Vec::new(),
                    warning: Some(SourceWarning {
                        parameter: source.parameter_name.clone(),
                        kind: source.source_kind.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }
}
