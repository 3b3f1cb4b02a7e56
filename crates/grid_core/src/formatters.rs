//! Data-type providers: per-column value formatting for display.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub trait ValueFormatter: Send + Sync {
    fn format(&self, value: &Value) -> String;
}

impl<F> ValueFormatter for F
where
    F: Fn(&Value) -> String + Send + Sync,
{
    fn format(&self, value: &Value) -> String {
        (self)(value)
    }
}

const DATE_TIME_PATTERN: &str = "%Y-%m-%d %I:%M";
const INVALID_DATE: &str = "Invalid date";

/// `YYYY-MM-DD hh:mm` with 12-hour clock hours.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeFormatter;

impl DateTimeFormatter {
    fn parse(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Number(n) => {
                let millis = match n.as_i64() {
                    Some(millis) => millis,
                    None => n.as_f64().filter(|f| f.is_finite())?.trunc() as i64,
                };
                DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
            }
            Value::String(s) => {
                let s = s.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.naive_local());
                }
                for pattern in [
                    "%Y-%m-%dT%H:%M:%S%.f",
                    "%Y-%m-%d %H:%M:%S%.f",
                    "%Y-%m-%dT%H:%M",
                    "%Y-%m-%d %H:%M",
                ] {
                    if let Ok(dt) = NaiveDateTime::parse_from_str(s, pattern) {
                        return Some(dt);
                    }
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }
            _ => None,
        }
    }
}

impl ValueFormatter for DateTimeFormatter {
    fn format(&self, value: &Value) -> String {
        match Self::parse(value) {
            Some(dt) => dt.format(DATE_TIME_PATTERN).to_string(),
            None => INVALID_DATE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MoneyFormatter {
    suffix: String,
}

impl MoneyFormatter {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for MoneyFormatter {
    fn default() -> Self {
        Self::with_suffix("руб.")
    }
}

impl ValueFormatter for MoneyFormatter {
    fn format(&self, value: &Value) -> String {
        format!("{} {}", plain_text(value), self.suffix)
    }
}

/// Renders `<n> <suffix>`, or nothing when the value is empty, zero or false.
#[derive(Debug, Clone)]
pub struct DaysFormatter {
    suffix: String,
}

impl DaysFormatter {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for DaysFormatter {
    fn default() -> Self {
        Self::with_suffix("дн.")
    }
}

impl ValueFormatter for DaysFormatter {
    fn format(&self, value: &Value) -> String {
        if is_truthy(value) {
            format!("{} {}", plain_text(value), self.suffix)
        } else {
            String::new()
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Display text for a cell without a provider.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column name -> formatter bindings. A later binding for the same column
/// replaces an earlier one.
#[derive(Clone, Default)]
pub struct DataTypeProviders {
    by_column: HashMap<String, Arc<dyn ValueFormatter>>,
}

impl DataTypeProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide<I, S>(mut self, for_columns: I, formatter: impl ValueFormatter + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let formatter: Arc<dyn ValueFormatter> = Arc::new(formatter);
        for column in for_columns {
            self.by_column.insert(column.into(), Arc::clone(&formatter));
        }
        self
    }

    pub fn has_provider(&self, column: &str) -> bool {
        self.by_column.contains_key(column)
    }

    pub fn format_cell(&self, column: &str, value: &Value) -> String {
        match self.by_column.get(column) {
            Some(formatter) => formatter.format(value),
            None => plain_text(value),
        }
    }
}

impl std::fmt::Debug for DataTypeProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut columns: Vec<_> = self.by_column.keys().collect();
        columns.sort();
        f.debug_struct("DataTypeProviders")
            .field("columns", &columns)
            .finish()
    }
}
