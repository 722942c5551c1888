//! `COMPUTED` sources: relative-date rules evaluated against today.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::date_range::{DatePattern, Interval};
use crate::error::SourceError;

/// Upper bound on `count`; larger values are rejected before any date math.
pub const MAX_COUNT: u32 = 10_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedSpec {
    pub rule: String,
    pub count: u32,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeRule {
    LastNDays,
    LastNWeeks,
    LastNMonths,
    LastNYears,
}

impl RelativeRule {
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LAST_N_DAYS" => Ok(RelativeRule::LastNDays),
            "LAST_N_WEEKS" => Ok(RelativeRule::LastNWeeks),
            "LAST_N_MONTHS" => Ok(RelativeRule::LastNMonths),
            "LAST_N_YEARS" => Ok(RelativeRule::LastNYears),
            other => Err(SourceError::InvalidSpec(format!(
                "unknown computed rule '{other}'"
            ))),
        }
    }

    fn interval(self) -> Interval {
        match self {
            RelativeRule::LastNDays => Interval::Day,
            RelativeRule::LastNWeeks => Interval::Week,
            RelativeRule::LastNMonths => Interval::Month,
            RelativeRule::LastNYears => Interval::Year,
        }
    }

    fn default_pattern(self) -> &'static str {
        match self {
            RelativeRule::LastNDays | RelativeRule::LastNWeeks => "yyyyMMdd",
            RelativeRule::LastNMonths => "yyyyMM",
            RelativeRule::LastNYears => "yyyy",
        }
    }
}

/// Parse a `COMPUTED` spec and evaluate it for `today`.
pub fn resolve_computed(spec: &str, today: NaiveDate) -> Result<Vec<String>, SourceError> {
    let spec: ComputedSpec =
        serde_json::from_str(spec).map_err(|e| SourceError::Parse(e.to_string()))?;
    let rule = RelativeRule::parse(&spec.rule)?;
    let pattern = DatePattern::parse(spec.format.as_deref().unwrap_or(rule.default_pattern()))?;
    evaluate(rule, spec.count, today, &pattern)
}

/// The `count` periods ending at `today` (current period included), oldest first.
pub fn evaluate(
    rule: RelativeRule,
    count: u32,
    today: NaiveDate,
    pattern: &DatePattern,
) -> Result<Vec<String>, SourceError> {
    if count == 0 {
        return Err(SourceError::InvalidSpec(
            "computed count must be at least 1".to_string(),
        ));
    }
    if count > MAX_COUNT {
        return Err(SourceError::InvalidSpec(format!(
            "computed count {count} exceeds {MAX_COUNT}"
        )));
    }
    let interval = rule.interval();
    (0..count)
        .rev()
        .map(|steps| {
            interval
                .rewind(today, steps)
                .map(|date| pattern.format(date))
                .ok_or_else(|| {
                    SourceError::InvalidSpec(format!("count {count} reaches before the calendar"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    #[test]
    fn last_n_months_ends_with_current_month() {
        let values =
            resolve_computed(r#"{"rule":"LAST_N_MONTHS","count":3}"#, today()).unwrap();
        assert_eq!(values, vec!["202401", "202402", "202403"]);
    }

    #[test]
    fn last_n_days_crosses_month_boundary() {
        let values = resolve_computed(
            r#"{"rule":"last_n_days","count":2,"format":"yyyy-MM-dd"}"#,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(values, vec!["2024-02-29", "2024-03-01"]);
    }

    #[test]
    fn last_n_years_uses_year_pattern() {
        let values = resolve_computed(r#"{"rule":"LAST_N_YEARS","count":2}"#, today()).unwrap();
        assert_eq!(values, vec!["2023", "2024"]);
    }

    #[test]
    fn same_inputs_give_same_output() {
        let spec = r#"{"rule":"LAST_N_WEEKS","count":4}"#;
        assert_eq!(
            resolve_computed(spec, today()).unwrap(),
            resolve_computed(spec, today()).unwrap()
        );
    }

    #[test]
    fn rejects_zero_count_and_unknown_rule() {
        assert!(resolve_computed(r#"{"rule":"LAST_N_DAYS","count":0}"#, today()).is_err());
        assert!(matches!(
            resolve_computed(r#"{"rule":"NEXT_N_DAYS","count":1}"#, today()),
            Err(SourceError::InvalidSpec(_))
        ));
        assert!(matches!(
            resolve_computed(r#"{"count":1}"#, today()),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn huge_count_is_rejected_not_overflowed() {
        assert!(matches!(
            resolve_computed(r#"{"rule":"LAST_N_YEARS","count":400000000}"#, today()),
            Err(SourceError::InvalidSpec(_))
        ));
        let pattern = DatePattern::parse("yyyy").unwrap();
        assert!(matches!(
            evaluate(RelativeRule::LastNYears, MAX_COUNT + 1, today(), &pattern),
            Err(SourceError::InvalidSpec(_))
        ));
        let days = evaluate(RelativeRule::LastNDays, MAX_COUNT, today(), &pattern).unwrap();
        assert_eq!(days.len(), MAX_COUNT as usize);
    }
}
