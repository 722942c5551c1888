//! `DATE_RANGE` sources and the date pattern shared with `COMPUTED` rules.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{Days, Months, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;

pub const DEFAULT_DATE_PATTERN: &str = "yyyyMM";
const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeSpec {
    #[serde(alias = "start_date")]
    pub start_date: String,
    /// Inclusive.
    #[serde(alias = "end_date")]
    pub end_date: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
}

/// Step between two consecutive dates of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    /// Unknown names fall back to `Month`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DAY" => Interval::Day,
            "WEEK" => Interval::Week,
            "MONTH" => Interval::Month,
            "YEAR" => Interval::Year,
            other => {
                debug!(interval = %other, "unknown date interval, stepping by month");
                Interval::Month
            }
        }
    }

    pub fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Interval::Day => date.checked_add_days(Days::new(1)),
            Interval::Week => date.checked_add_days(Days::new(7)),
            Interval::Month => date.checked_add_months(Months::new(1)),
            Interval::Year => date.checked_add_months(Months::new(12)),
        }
    }

    pub fn rewind(self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Interval::Day => date.checked_sub_days(Days::new(steps as u64)),
            Interval::Week => date.checked_sub_days(Days::new(7 * steps as u64)),
            Interval::Month => date.checked_sub_months(Months::new(steps)),
            Interval::Year => date.checked_sub_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

/// Output pattern for generated dates, stored as a strftime string.
///
/// Accepts strftime directly (anything containing `%`) or the letter
/// patterns job definitions were written with: `yyyy`, `yy`, `MMMM`,
/// `MMM`, `MM`, `M`, `dd`, `d`, with `'quoted'` literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern(String);

impl DatePattern {
    pub fn parse(pattern: &str) -> Result<Self, SourceError> {
        let strftime = if pattern.contains('%') {
            pattern.to_string()
        } else {
            translate_letters(pattern)?
        };
        let invalid = || SourceError::InvalidSpec(format!("invalid date format '{pattern}'"));
        if StrftimeItems::new(&strftime).any(|item| matches!(item, Item::Error)) {
            return Err(invalid());
        }
        // Time and offset fields (%H, %z, ...) parse fine but cannot be
        // rendered from a bare date.
        let sample = NaiveDate::from_ymd_opt(2000, 1, 1).ok_or_else(invalid)?;
        let mut rendered = String::new();
        write!(rendered, "{}", sample.format(&strftime)).map_err(|_| invalid())?;
        Ok(Self(strftime))
    }

    /// Render `date`. Patterns that passed [`DatePattern::parse`] only
    /// need date fields, so formatting cannot fail.
    pub fn format(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}", date.format(&self.0));
        out
    }

    pub fn as_strftime(&self) -> &str {
        &self.0
    }
}

fn translate_letters(pattern: &str) -> Result<String, SourceError> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // '' is an escaped quote; otherwise copy until the closing quote.
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                out.push(chars[i]);
                i += 1;
            }
            if i == chars.len() {
                return Err(SourceError::InvalidSpec(format!(
                    "unterminated quote in date format '{pattern}'"
                )));
            }
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            (c, _) if c.is_ascii_alphabetic() => {
                return Err(SourceError::InvalidSpec(format!(
                    "unsupported pattern letter '{c}' in date format '{pattern}'"
                )));
            }
            _ => {
                for _ in 0..run {
                    out.push(c);
                }
                i += run;
                continue;
            }
        };
        out.push_str(spec);
        i += run;
    }
    Ok(out)
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, SourceError> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE).map_err(|e| SourceError::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a `DATE_RANGE` spec and generate its values.
pub fn resolve_date_range(spec: &str) -> Result<Vec<String>, SourceError> {
    let spec: DateRangeSpec =
        serde_json::from_str(spec).map_err(|e| SourceError::Parse(e.to_string()))?;
    let start = parse_iso_date(&spec.start_date)?;
    let end = parse_iso_date(&spec.end_date)?;
    let pattern = DatePattern::parse(spec.format.as_deref().unwrap_or(DEFAULT_DATE_PATTERN))?;
    let interval = spec
        .interval
        .as_deref()
        .map(Interval::parse)
        .unwrap_or(Interval::Month);
    Ok(date_range(start, end, interval, &pattern))
}

/// Dates from `start` to `end` inclusive. Empty when `start > end`.
pub fn date_range(
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
    pattern: &DatePattern,
) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = Some(start);
    while let Some(date) = current {
        if date > end {
            break;
        }
        values.push(pattern.format(date));
        current = interval.advance(date);
    }
    values
}
