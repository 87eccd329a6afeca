//! Row model for normalized feature-test records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Year of a measurement.
///
/// Spreadsheets mostly carry plain years, but free-form labels such as
/// "H1" survive as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Numeric(i64),
    Text(String),
}

impl Year {
    /// Parse a raw cell into a year.
    ///
    /// Leading whitespace and sign are accepted and digits are read up to the
    /// first non-digit, so `"2023 г."` is the year 2023. Anything without a
    /// leading integer is kept as trimmed text.
    pub fn parse(raw: &str) -> Self {
        match leading_integer(raw) {
            Some(year) => Year::Numeric(year),
            None => Year::Text(raw.trim().to_string()),
        }
    }

    /// The numeric year, if there is one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Year::Numeric(n) => Some(*n),
            Year::Text(_) => None,
        }
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Year::Numeric(n) => write!(f, "{}", n),
            Year::Text(s) => f.write_str(s),
        }
    }
}

/// A cell that is either a number or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Parse a rank cell.
    ///
    /// The result is numeric only when the trimmed text is exactly the
    /// canonical rendering of the parsed number: `"3"` and `"2.5"` become
    /// numbers, `"03"`, `"3.0"` and `"1-2"` stay text.
    pub fn parse_rank(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && format_number(n) == trimmed => Scalar::Number(n),
            _ => Scalar::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

/// One normalized fact record.
///
/// `feature` and `project` are never empty; the reader drops rows that lack
/// either before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub feature: String,
    pub year: Year,
    pub metric: String,
    pub value: Scalar,
    pub rank: Scalar,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Row {
    /// Create a row with the mandatory fields; product and category start empty.
    pub fn new(
        feature: impl Into<String>,
        year: Year,
        metric: impl Into<String>,
        value: impl Into<Scalar>,
        rank: impl Into<Scalar>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            year,
            metric: metric.into(),
            value: value.into(),
            rank: rank.into(),
            project: project.into(),
            product: None,
            category: None,
        }
    }

    /// Set the product.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Render a number the way spreadsheets display it: integral values have no
/// fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
