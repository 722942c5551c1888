use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{HarvesterError, Result};

/// How configured parameter sources combine into concrete parameter maps.
///
/// Unrecognised names are kept verbatim in `Unknown` so the expander can
/// degrade to single-call behaviour and report what it saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ExpansionMode {
    /// One call with the base parameters only.
    #[default]
    Single,
    /// Only the first parameter source varies.
    OneVarying,
    /// Full cartesian product over every parameter source.
    Matrix,
    Unknown(String),
}

impl From<String> for ExpansionMode {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "SINGLE" => ExpansionMode::Single,
            // MULTI_PARAM is the name older job exports use.
            "ONE_VARYING" | "MULTI_PARAM" => ExpansionMode::OneVarying,
            "MATRIX" => ExpansionMode::Matrix,
            _ => ExpansionMode::Unknown(s),
        }
    }
}

impl From<ExpansionMode> for String {
    fn from(mode: ExpansionMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ExpansionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionMode::Single => write!(f, "SINGLE"),
            ExpansionMode::OneVarying => write!(f, "ONE_VARYING"),
            ExpansionMode::Matrix => write!(f, "MATRIX"),
            ExpansionMode::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// Where the values of a varying parameter come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    /// Literal JSON array of strings.
    StaticList,
    /// Formatted dates between two bounds.
    DateRange,
    /// Values fetched from a named external lookup.
    Lookup,
    /// Relative-date rule evaluated against today.
    Computed,
    Unknown(String),
}

impl From<String> for SourceKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "STATIC_LIST" => SourceKind::StaticList,
            "DATE_RANGE" => SourceKind::DateRange,
            "LOOKUP" => SourceKind::Lookup,
            "COMPUTED" => SourceKind::Computed,
            _ => SourceKind::Unknown(s),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::StaticList => write!(f, "STATIC_LIST"),
            SourceKind::DateRange => write!(f, "DATE_RANGE"),
            SourceKind::Lookup => write!(f, "LOOKUP"),
            SourceKind::Computed => write!(f, "COMPUTED"),
            SourceKind::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// HTTP verb used for the external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" | "API_GET" => Ok(HttpMethod::Get),
            "POST" | "API_POST" => Ok(HttpMethod::Post),
            other => Err(format!("unsupported http method: {other}")),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Parameters shared by every call of a job. Values must be JSON scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseParameters(Map<String, Value>);

impl BaseParameters {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse the JSON-object form stored by job exports.
    ///
    /// Blank input means "no base parameters".
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| HarvesterError::InvalidParameters(e.to_string()))?;
        match value {
            Value::Object(map) => {
                let params = Self(map);
                params.ensure_scalar()?;
                Ok(params)
            }
            other => Err(HarvesterError::InvalidParameters(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Reject nested arrays/objects: every call sends a flat scalar map.
    pub fn ensure_scalar(&self) -> Result<()> {
        for (key, value) in &self.0 {
            if value.is_array() || value.is_object() {
                return Err(HarvesterError::InvalidParameters(format!(
                    "parameter '{key}' must be a scalar, got {}",
                    json_type_name(value)
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for BaseParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One concrete parameter map sent in a single external call.
///
/// Built once by the expander and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterCombination(BTreeMap<String, Value>);

impl ParameterCombination {
    /// A combination carrying the base parameters unchanged.
    pub fn from_base(base: &BaseParameters) -> Self {
        Self(base.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Base parameters with varying values applied on top. Later keys win.
    pub fn with_overrides<'a, I>(base: &BaseParameters, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map: BTreeMap<String, Value> =
            base.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (name, value) in overrides {
            map.insert(name.to_string(), Value::String(value.to_string()));
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `(key, value)` string pairs for a query string.
    ///
    /// Strings are sent verbatim, `null` as an empty value, other scalars
    /// in their JSON spelling.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

/// One varying parameter of a job and where its values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSource {
    pub parameter_name: String,
    pub source_kind: SourceKind,
    /// Kind-specific payload. Job files may write it as a string or as an
    /// inline table/array; either way it is kept as JSON text.
    #[serde(default, deserialize_with = "spec_text")]
    pub source_spec: String,
    /// Lower values form the outer loop of a cartesian product.
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl ParameterSource {
    pub fn new(name: &str, kind: SourceKind, spec: &str) -> Self {
        Self {
            parameter_name: name.to_string(),
            source_kind: kind,
            source_spec: spec.to_string(),
            sort_order: 0,
            is_active: true,
            description: None,
        }
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// A recurring extraction job as handed over by the job registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Upper-case identifier, e.g. `REAL_ESTATE_API_JOB`.
    pub job_code: String,
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub http_method: HttpMethod,
    pub resource_url: String,
    #[serde(default)]
    pub base_parameters: BaseParameters,
    #[serde(default)]
    pub parameter_expansion_mode: ExpansionMode,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Pause after each successful call.
    #[serde(default)]
    pub delay_seconds: u64,
    pub cron_expression: String,
    /// Scheduling hint for the outer scheduler (1-10); not interpreted here.
    #[serde(default = "default_resource_weight")]
    pub resource_weight: u32,
    #[serde(default)]
    pub parameter_sources: Vec<ParameterSource>,
}

pub const MAX_JOB_CODE_LEN: usize = 50;
pub const MAX_JOB_NAME_LEN: usize = 100;
pub const MAX_RESOURCE_WEIGHT: u32 = 10;

impl JobDefinition {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    /// Structural checks that must pass before anything is expanded or
    /// called. Cron validation lives with the scheduler.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| HarvesterError::InvalidJob {
            job_code: self.job_code.clone(),
            reason,
        };

        if self.job_code.is_empty() {
            return Err(invalid("job code must not be empty".to_string()));
        }
        if self.job_code.len() > MAX_JOB_CODE_LEN {
            return Err(invalid(format!(
                "job code longer than {MAX_JOB_CODE_LEN} characters"
            )));
        }
        if !self
            .job_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid(
                "job code may only contain A-Z, 0-9 and '_'".to_string(),
            ));
        }
        if self.job_name.chars().count() > MAX_JOB_NAME_LEN {
            return Err(invalid(format!(
                "job name longer than {MAX_JOB_NAME_LEN} characters"
            )));
        }
        if self.resource_url.trim().is_empty() {
            return Err(invalid("resource url must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be at least 1".to_string()));
        }
        if self.resource_weight == 0 || self.resource_weight > MAX_RESOURCE_WEIGHT {
            return Err(invalid(format!(
                "resource weight must be between 1 and {MAX_RESOURCE_WEIGHT}"
            )));
        }
        self.base_parameters
            .ensure_scalar()
            .map_err(|e| invalid(e.to_string()))?;

        let mut seen = HashSet::new();
        for source in &self.parameter_sources {
            let name = source.parameter_name.trim();
            if name.is_empty() {
                return Err(invalid("parameter source with empty name".to_string()));
            }
            if !seen.insert(name) {
                return Err(invalid(format!("duplicate parameter source '{name}'")));
            }
        }
        Ok(())
    }
}

fn spec_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bool_true() -> bool {
    true
}
fn default_batch_size() -> u32 {
    10
}
fn default_resource_weight() -> u32 {
    1
}
