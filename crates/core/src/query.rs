//! Query specification domain model
//!
//! Pure types and parsing functions describing an analytics query: time range,
//! calculations, filters, breakdowns, ordering and havings. Nothing in this
//! module performs I/O; the shell crate turns these types into HTTP requests.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Error type for query specification operations
#[derive(Debug, PartialEq)]
pub enum QuerySpecError {
    NoCalculations,
    MissingColumn(String),
    UnexpectedColumn(String),
    MissingFilterValue(String),
    UnexpectedFilterValue(String),
    InvalidCalculation(String),
    InvalidFilter(String),
    InvalidTimeRange(String),
}

impl std::fmt::Display for QuerySpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuerySpecError::NoCalculations => {
                write!(f, "Query must declare at least one calculation")
            }
            QuerySpecError::MissingColumn(op) => {
                write!(f, "Calculation {} requires a column", op)
            }
            QuerySpecError::UnexpectedColumn(op) => {
                write!(f, "Calculation {} does not take a column", op)
            }
            QuerySpecError::MissingFilterValue(column) => {
                write!(f, "Filter on column {} requires a value", column)
            }
            QuerySpecError::UnexpectedFilterValue(column) => {
                write!(f, "Unary filter on column {} does not take a value", column)
            }
            QuerySpecError::InvalidCalculation(raw) => {
                write!(f, "Invalid calculation: {}", raw)
            }
            QuerySpecError::InvalidFilter(raw) => write!(f, "Invalid filter: {}", raw),
            QuerySpecError::InvalidTimeRange(raw) => write!(f, "Invalid time range: {}", raw),
        }
    }
}

impl std::error::Error for QuerySpecError {}

/// Aggregation operator applied to produce a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalculationOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    P50,
    P90,
    P95,
    P99,
}

impl CalculationOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationOp::Count => "COUNT",
            CalculationOp::Sum => "SUM",
            CalculationOp::Avg => "AVG",
            CalculationOp::Min => "MIN",
            CalculationOp::Max => "MAX",
            CalculationOp::P50 => "P50",
            CalculationOp::P90 => "P90",
            CalculationOp::P95 => "P95",
            CalculationOp::P99 => "P99",
        }
    }

    /// COUNT aggregates rows; every other operator aggregates a column.
    pub fn requires_column(&self) -> bool {
        !matches!(self, CalculationOp::Count)
    }

    fn from_str_upper(s: &str) -> Option<Self> {
        match s {
            "COUNT" => Some(CalculationOp::Count),
            "SUM" => Some(CalculationOp::Sum),
            "AVG" => Some(CalculationOp::Avg),
            "MIN" => Some(CalculationOp::Min),
            "MAX" => Some(CalculationOp::Max),
            "P50" => Some(CalculationOp::P50),
            "P90" => Some(CalculationOp::P90),
            "P95" => Some(CalculationOp::P95),
            "P99" => Some(CalculationOp::P99),
            _ => None,
        }
    }
}

/// One aggregation plus the column it aggregates (COUNT carries none)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub op: CalculationOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Calculation {
    pub fn count() -> Self {
        Calculation {
            op: CalculationOp::Count,
            column: None,
        }
    }

    /// Name of the result column the backend reports for this calculation,
    /// e.g. `COUNT` or `AVG(duration_ms)`.
    pub fn result_column(&self) -> String {
        match &self.column {
            Some(column) => format!("{}({})", self.op.as_str(), column),
            None => self.op.as_str().to_string(),
        }
    }
}

/// Filter comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "starts-with")]
    StartsWith,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "does-not-exist")]
    DoesNotExist,
}

impl FilterOp {
    /// exists / does-not-exist are unary; everything else compares a value.
    pub fn requires_value(&self) -> bool {
        !matches!(self, FilterOp::Exists | FilterOp::DoesNotExist)
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(FilterOp::Eq),
            "!=" => Some(FilterOp::Ne),
            ">" => Some(FilterOp::Gt),
            ">=" => Some(FilterOp::Gte),
            "<" => Some(FilterOp::Lt),
            "<=" => Some(FilterOp::Lte),
            "starts-with" => Some(FilterOp::StartsWith),
            "contains" => Some(FilterOp::Contains),
            "exists" => Some(FilterOp::Exists),
            "does-not-exist" => Some(FilterOp::DoesNotExist),
            _ => None,
        }
    }
}

/// One column filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Server-side sort direction for the primary calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

/// Post-aggregation constraint on a calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Having {
    pub calculate_op: CalculationOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

/// Query time range, absolute or relative to "now"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeRange {
    /// Last `seconds` seconds, resolved against the clock when the run starts
    Relative { seconds: i64 },
    /// Unix-second bounds, end exclusive
    Absolute { start: i64, end: i64 },
}

/// Immutable description of what to compute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpecification {
    pub time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<u64>,
    pub calculations: Vec<Calculation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdowns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub havings: Vec<Having>,
}

impl QuerySpecification {
    /// Breakdown-free COUNT over the given range, the smallest valid query
    pub fn count(time_range: TimeRange) -> Self {
        QuerySpecification {
            time_range,
            granularity: None,
            calculations: vec![Calculation::count()],
            filters: Vec::new(),
            breakdowns: Vec::new(),
            order: None,
            limit: None,
            havings: Vec::new(),
        }
    }

    /// The calculation whose result names the row key and drives ordering
    pub fn primary_calculation(&self) -> Result<&Calculation, QuerySpecError> {
        self.calculations.first().ok_or(QuerySpecError::NoCalculations)
    }

    /// Client-side validation of the calculation/column and filter pairings.
    /// The backend enforces the same rules; checking here fails fast before
    /// any network round trip.
    pub fn validate(&self) -> Result<(), QuerySpecError> {
        if self.calculations.is_empty() {
            return Err(QuerySpecError::NoCalculations);
        }

        for calc in &self.calculations {
            if calc.op.requires_column() && calc.column.is_none() {
                return Err(QuerySpecError::MissingColumn(calc.op.as_str().to_string()));
            }
            if !calc.op.requires_column() && calc.column.is_some() {
                return Err(QuerySpecError::UnexpectedColumn(
                    calc.op.as_str().to_string(),
                ));
            }
        }

        for filter in &self.filters {
            if filter.op.requires_value() && filter.value.is_none() {
                return Err(QuerySpecError::MissingFilterValue(filter.column.clone()));
            }
            if !filter.op.requires_value() && filter.value.is_some() {
                return Err(QuerySpecError::UnexpectedFilterValue(filter.column.clone()));
            }
        }

        Ok(())
    }
}

/// Parse a calculation argument of the form `COUNT` or `AVG:duration_ms`
pub fn parse_calculation(raw: &str) -> Result<Calculation, QuerySpecError> {
    let (op_str, column) = match raw.split_once(':') {
        Some((op, column)) if !column.is_empty() => (op, Some(column.to_string())),
        Some(_) => return Err(QuerySpecError::InvalidCalculation(raw.to_string())),
        None => (raw, None),
    };

    let op = CalculationOp::from_str_upper(&op_str.to_uppercase())
        .ok_or_else(|| QuerySpecError::InvalidCalculation(raw.to_string()))?;

    if op.requires_column() && column.is_none() {
        return Err(QuerySpecError::MissingColumn(op.as_str().to_string()));
    }
    if !op.requires_column() && column.is_some() {
        return Err(QuerySpecError::UnexpectedColumn(op.as_str().to_string()));
    }

    Ok(Calculation { op, column })
}

/// Parse a filter argument of the form `column:op:value` (value optional for
/// unary operators). The value is decoded as JSON when possible so that
/// `duration_ms:>:100` compares numerically, and kept as a plain string
/// otherwise.
pub fn parse_filter(raw: &str) -> Result<Filter, QuerySpecError> {
    let mut parts = raw.splitn(3, ':');
    let column = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuerySpecError::InvalidFilter(raw.to_string()))?;
    let op_str = parts
        .next()
        .ok_or_else(|| QuerySpecError::InvalidFilter(raw.to_string()))?;
    let op =
        FilterOp::from_str(op_str).ok_or_else(|| QuerySpecError::InvalidFilter(raw.to_string()))?;

    let value = match parts.next() {
        Some(v) => Some(
            serde_json::from_str(v).unwrap_or_else(|_| serde_json::Value::String(v.to_string())),
        ),
        None => None,
    };

    if op.requires_value() && value.is_none() {
        return Err(QuerySpecError::MissingFilterValue(column.to_string()));
    }
    if !op.requires_value() && value.is_some() {
        return Err(QuerySpecError::UnexpectedFilterValue(column.to_string()));
    }

    Ok(Filter {
        column: column.to_string(),
        op,
        value,
    })
}

/// Parse a relative time range like `90s`, `30m`, `2h`, `7d` or `1w` into
/// seconds
pub fn parse_relative_time(raw: &str) -> Result<i64, QuerySpecError> {
    let re = Regex::new(r"^(\d+)([smhdw])$").expect("valid regex");
    let caps = re
        .captures(raw.trim())
        .ok_or_else(|| QuerySpecError::InvalidTimeRange(raw.to_string()))?;

    let amount: i64 = caps[1]
        .parse()
        .map_err(|_| QuerySpecError::InvalidTimeRange(raw.to_string()))?;

    let unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => unreachable!(),
    };

    Ok(amount * unit)
}
