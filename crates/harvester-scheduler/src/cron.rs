//! Validation of Quartz-style cron expressions.
//!
//! Format: `second minute hour day-of-month month day-of-week [year]`.
//! Exactly one of day-of-month / day-of-week must be `?`.

use thiserror::Error;
use tracing::{debug, warn};

/// Expressions operators reach for most; see [`CronValidator::is_common_pattern`].
const COMMON_PATTERNS: &[&str] = &[
    "0 0 * * * ?",       // top of every hour
    "0 * * * * ?",       // every minute
    "0 0 0 * * ?",       // daily at midnight
    "0 0 0 * * MON-FRI", // weekdays at midnight (never valid: no '?')
    "0 0 0 1 * ?",       // first of the month
    "0 0 0 1 1 ?",       // new year
];

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DOW_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
    Year,
}

impl CronField {
    const ORDER: [CronField; 7] = [
        CronField::Second,
        CronField::Minute,
        CronField::Hour,
        CronField::DayOfMonth,
        CronField::Month,
        CronField::DayOfWeek,
        CronField::Year,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CronField::Second => "second",
            CronField::Minute => "minute",
            CronField::Hour => "hour",
            CronField::DayOfMonth => "day-of-month",
            CronField::Month => "month",
            CronField::DayOfWeek => "day-of-week",
            CronField::Year => "year",
        }
    }

    pub fn bounds(self) -> (u32, u32) {
        match self {
            CronField::Second | CronField::Minute => (0, 59),
            CronField::Hour => (0, 23),
            CronField::DayOfMonth => (1, 31),
            CronField::Month => (1, 12),
            CronField::DayOfWeek => (1, 7),
            CronField::Year => (1970, 2099),
        }
    }

    /// Name aliases; position + 1 is the numeric value.
    fn names(self) -> &'static [&'static str] {
        match self {
            CronField::Month => MONTH_NAMES,
            CronField::DayOfWeek => DOW_NAMES,
            _ => &[],
        }
    }

    fn is_day(self) -> bool {
        matches!(self, CronField::DayOfMonth | CronField::DayOfWeek)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("cron expression is empty")]
    Empty,

    #[error("expected 6 or 7 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}': {reason}")]
    Field {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("exactly one of day-of-month ('{day_of_month}') and day-of-week ('{day_of_week}') must be '?'")]
    DayExclusion {
        day_of_month: String,
        day_of_week: String,
    },
}

/// Stateless cron expression checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronValidator;

impl CronValidator {
    pub fn new() -> Self {
        Self
    }

    /// `true` when the expression is acceptable for scheduling.
    pub fn validate(&self, expression: &str) -> bool {
        match self.check(expression) {
            Ok(()) => true,
            Err(e) => {
                warn!(expression = %expression, reason = %e, "cron expression rejected");
                false
            }
        }
    }

    /// Like [`validate`](Self::validate) but says what is wrong.
    ///
    /// Every field is checked (and logged) before the first failure is
    /// returned; the day-of-month/day-of-week rule only runs once all
    /// fields pass.
    pub fn check(&self, expression: &str) -> Result<(), CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.is_empty() {
            return Err(CronError::Empty);
        }
        if fields.len() != 6 && fields.len() != 7 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let mut first_error = None;
        for (field, raw) in CronField::ORDER.iter().zip(&fields) {
            let verdict = check_field(*field, raw);
            debug!(field = field.label(), value = %raw, ok = verdict.is_ok(), "cron field checked");
            if let Err(reason) = verdict {
                first_error.get_or_insert(CronError::Field {
                    field: field.label(),
                    value: raw.to_string(),
                    reason,
                });
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let (dom, dow) = (fields[3], fields[5]);
        if (dom == "?") == (dow == "?") {
            return Err(CronError::DayExclusion {
                day_of_month: dom.to_string(),
                day_of_week: dow.to_string(),
            });
        }
        Ok(())
    }

    /// Whether a valid expression is one of the well-known schedules.
    pub fn is_common_pattern(&self, expression: &str) -> bool {
        if !self.validate(expression) {
            return false;
        }
        let normalized = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        COMMON_PATTERNS.contains(&normalized.as_str())
    }
}

fn check_field(field: CronField, raw: &str) -> Result<(), String> {
    match raw {
        "*" => return Ok(()),
        "?" if field.is_day() => return Ok(()),
        "?" => return Err("'?' is only allowed for day-of-month and day-of-week".to_string()),
        _ => {}
    }

    match field {
        CronField::DayOfMonth => {
            if raw.eq_ignore_ascii_case("L") {
                return Ok(());
            }
            if let Some(day) = raw.strip_suffix(|c: char| c == 'W' || c == 'w') {
                let n = parse_number(day)?;
                return in_bounds(field, n);
            }
        }
        CronField::DayOfWeek => {
            if let Some((dow, nth)) = raw.split_once('#') {
                value(field, dow)?;
                let n = parse_number(nth)?;
                if !(1..=5).contains(&n) {
                    return Err(format!("occurrence {n} outside 1-5"));
                }
                return Ok(());
            }
        }
        _ => {}
    }

    raw.split(',').try_for_each(|term| check_term(field, term))
}

fn check_term(field: CronField, term: &str) -> Result<(), String> {
    if term.is_empty() {
        return Err("empty list element".to_string());
    }
    if let Some((base, step)) = term.split_once('/') {
        let step = parse_number(step)?;
        if step == 0 {
            return Err("step must be greater than zero".to_string());
        }
        if base != "*" {
            value(field, base)?;
        }
        return Ok(());
    }
    if let Some((start, end)) = term.split_once('-') {
        let (a, b) = (value(field, start)?, value(field, end)?);
        if a > b {
            return Err(format!("range start {a} is after end {b}"));
        }
        return Ok(());
    }
    value(field, term).map(|_| ())
}

/// A number or name alias, checked against the field's bounds.
fn value(field: CronField, token: &str) -> Result<u32, String> {
    if let Some(pos) = field
        .names()
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
    {
        return Ok(pos as u32 + 1);
    }
    let n = parse_number(token)?;
    in_bounds(field, n)?;
    Ok(n)
}

fn parse_number(token: &str) -> Result<u32, String> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{token}' is not a number"));
    }
    token
        .parse()
        .map_err(|_| format!("'{token}' is out of range"))
}

fn in_bounds(field: CronField, n: u32) -> Result<(), String> {
    let (min, max) = field.bounds();
    if n < min || n > max {
        return Err(format!("{n} outside {min}-{max}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(expr: &str) -> bool {
        CronValidator::new().validate(expr)
    }

    #[test]
    fn reference_expressions() {
        assert!(valid("0 0 2 * * ?"));
        assert!(!valid("0 0 2 ? * ?"));
        assert!(!valid("0 0 2 * * *"));
        assert!(!valid("60 0 0 * * ?"));
        assert!(valid("0 0 9 15W * ?"));
    }

    #[test]
    fn field_count() {
        assert_eq!(
            CronValidator::new().check("0 0 2 * *"),
            Err(CronError::FieldCount(5))
        );
        assert_eq!(
            CronValidator::new().check("0 0 2 * * ? 2030 x"),
            Err(CronError::FieldCount(8))
        );
        assert_eq!(CronValidator::new().check("   "), Err(CronError::Empty));
        assert!(valid("  0   0 2 * *   ?  "));
    }

    #[test]
    fn optional_year_field() {
        assert!(valid("0 0 2 * * ? 2030"));
        assert!(valid("0 0 2 * * ? 2024-2030"));
        assert!(!valid("0 0 2 * * ? 1969"));
        assert!(!valid("0 0 2 * * ? 2100"));
    }

    #[test]
    fn ranges_lists_and_steps() {
        assert!(valid("0 0/15 8-18 * * ?"));
        assert!(valid("*/10 0 0,6,12,18 * * ?"));
        assert!(valid("0 0 0 1,15 * ?"));
        assert!(!valid("0 0 18-8 * * ?"));
        assert!(!valid("0 0/0 * * * ?"));
        assert!(!valid("0 60/5 * * * ?"));
        assert!(!valid("0 0 1,,2 * * ?"));
        assert!(!valid("0 0 1,24 * * ?"));
        assert!(!valid("0 0 -1 * * ?"));
    }

    #[test]
    fn names_are_aliases() {
        assert!(valid("0 0 0 ? JAN-MAR MON-FRI"));
        assert!(valid("0 0 0 ? * sun"));
        assert!(valid("0 0 0 1 DEC ?"));
        assert!(!valid("0 0 0 ? * FRI-MON"));
        assert!(!valid("0 0 0 ? * FUNDAY"));
        assert!(!valid("0 0 0 1 MON ?"));
    }

    #[test]
    fn day_of_month_specials() {
        assert!(valid("0 0 0 L * ?"));
        assert!(valid("0 0 0 1W * ?"));
        assert!(!valid("0 0 0 32W * ?"));
        assert!(!valid("0 0 0 0W * ?"));
        assert!(!valid("0 0 0 W * ?"));
    }

    #[test]
    fn nth_weekday() {
        assert!(valid("0 0 0 ? * 6#3"));
        assert!(valid("0 0 0 ? * FRI#2"));
        assert!(!valid("0 0 0 ? * FRI#6"));
        assert!(!valid("0 0 0 ? * 8#1"));
        assert!(!valid("0 0 0 ? * FRI#"));
    }

    #[test]
    fn question_mark_outside_day_fields() {
        assert!(!valid("? 0 0 * * ?"));
        assert!(!valid("0 0 0 * ? ?"));
    }

    #[test]
    fn unparseable_numbers() {
        assert!(!valid("a 0 0 * * ?"));
        assert!(!valid("0 0 0 * 1.5 ?"));
        assert!(!valid("0 0 99999999999 * * ?"));
    }

    #[test]
    fn reports_first_bad_field_after_checking_all() {
        let err = CronValidator::new().check("61 0 25 * * ?").unwrap_err();
        assert!(matches!(err, CronError::Field { field: "second", .. }));
    }

    #[test]
    fn exclusion_checked_after_fields() {
        let err = CronValidator::new().check("0 0 2 * * *").unwrap_err();
        assert!(matches!(err, CronError::DayExclusion { .. }));
        // A field error wins over the exclusion rule.
        let err = CronValidator::new().check("0 0 2 ? 13 ?").unwrap_err();
        assert!(matches!(err, CronError::Field { field: "month", .. }));
    }

    #[test]
    fn common_patterns() {
        let v = CronValidator::new();
        assert!(v.is_common_pattern("0 0 0 * * ?"));
        assert!(v.is_common_pattern("0  0 0 1 1 ?"));
        assert!(!v.is_common_pattern("0 0 0 * * MON-FRI"));
        assert!(!v.is_common_pattern("0 0 3 * * ?"));
    }
}
