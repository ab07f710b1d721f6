use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use rusqlite::types::Value as SqlValue;
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

pub type Row = Vec<Cell>;

impl Cell {
    fn real_bits(value: f64) -> u64 {
        if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
    }

    // Whole-number reals inside the i64 range share an identity with the integer.
    fn integral_value(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Real(value)
                if value.is_finite()
                    && value.fract() == 0.0
                    && *value >= -9_223_372_036_854_775_808.0
                    && *value < 9_223_372_036_854_775_808.0 =>
            {
                Some(*value as i64)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => json!(value),
            Self::Real(value) => json!(value),
            Self::Text(value) => json!(value),
            Self::Blob(value) => json!(encode_blob_hex(value)),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (
                Self::Integer(_) | Self::Real(_),
                Self::Integer(_) | Self::Real(_),
            ) => match (self.integral_value(), other.integral_value()) {
                (Some(left), Some(right)) => left == right,
                (None, None) => match (self, other) {
                    (Self::Real(left), Self::Real(right)) => {
                        Self::real_bits(*left) == Self::real_bits(*right)
                    }
                    _ => false,
                },
                _ => false,
            },
            (Self::Text(left), Self::Text(right)) => left == right,
            (Self::Blob(left), Self::Blob(right)) => left == right,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0_u8.hash(state),
            Self::Integer(value) => {
                1_u8.hash(state);
                value.hash(state);
            }
            Self::Real(value) => match self.integral_value() {
                Some(integral) => {
                    1_u8.hash(state);
                    integral.hash(state);
                }
                None => {
                    2_u8.hash(state);
                    Self::real_bits(*value).hash(state);
                }
            },
            Self::Text(value) => {
                3_u8.hash(state);
                value.hash(state);
            }
            Self::Blob(value) => {
                4_u8.hash(state);
                value.hash(state);
            }
        }
    }
}

impl From<SqlValue> for Cell {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Integer(value) => Self::Integer(value),
            SqlValue::Real(value) => Self::Real(value),
            SqlValue::Text(value) => Self::Text(value),
            SqlValue::Blob(value) => Self::Blob(value),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value:?}"),
            Self::Text(value) => write!(f, "'{}'", value.replace('\'', "\\'")),
            Self::Blob(value) => write!(f, "x'{}'", encode_blob_hex(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn preview_json(&self, limit: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| Value::Array(row.iter().map(Cell::to_json).collect()))
            .collect()
    }

    #[must_use]
    pub fn render_rows(&self, row_limit: usize) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len().min(row_limit) + 2);
        if !self.columns.is_empty() {
            lines.push(format!("columns: {}", self.columns.join(", ")));
        }
        lines.extend(self.rows.iter().take(row_limit).map(|row| render_tuple(row)));
        if self.rows.len() > row_limit {
            lines.push(format!(
                "... {} more rows ({} total)",
                self.rows.len() - row_limit,
                self.rows.len()
            ));
        }
        lines.join("\n")
    }
}

#[must_use]
pub fn render_tuple(row: &[Cell]) -> String {
    match row {
        [single] => format!("({single},)"),
        cells => format!(
            "({})",
            cells
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::{Cell, ResultSet, render_tuple};

    #[test]
    fn reals_compare_by_value_and_fold_negative_zero() {
        assert_eq!(Cell::Real(0.0), Cell::Real(-0.0));
        assert_eq!(Cell::Real(1.5), Cell::Real(1.5));
        assert_ne!(Cell::Real(1.5), Cell::Real(2.5));

        let set = [Cell::Real(0.0), Cell::Real(-0.0)]
            .into_iter()
            .collect::<HashSet<_>>();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn whole_number_reals_equal_their_integer() {
        assert_eq!(Cell::Integer(1), Cell::Real(1.0));
        assert_eq!(Cell::Real(-0.0), Cell::Integer(0));
        assert_ne!(Cell::Integer(1), Cell::Real(1.5));
        assert_ne!(Cell::Integer(1), Cell::from("1"));
        assert_ne!(Cell::Integer(i64::MAX), Cell::Real(f64::INFINITY));
        assert_ne!(Cell::Real(f64::NAN), Cell::Integer(0));

        let set = [Cell::Integer(7), Cell::Real(7.0), Cell::Real(7.25)]
            .into_iter()
            .collect::<HashSet<_>>();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Cell::Integer(7)));
        assert!(set.contains(&Cell::Real(7.25)));
    }

    #[test]
    fn tuples_render_like_result_rows() {
        assert_eq!(render_tuple(&[Cell::Integer(5)]), "(5,)");
        assert_eq!(
            render_tuple(&[Cell::from("Alameda"), Cell::Real(2.0), Cell::Null]),
            "('Alameda', 2.0, NULL)"
        );
    }

    #[test]
    fn render_rows_notes_omitted_rows() {
        let result = ResultSet::new(
            vec!["n".to_string()],
            (0..4).map(|value| vec![Cell::Integer(value)]).collect(),
        );
        let rendered = result.render_rows(2);
        assert_eq!(rendered, "columns: n\n(0,)\n(1,)\n... 2 more rows (4 total)");
        assert_eq!(ResultSet::default().render_rows(2), "(no rows)");
    }

    #[test]
    fn preview_is_bounded_json() {
        let result = ResultSet::new(
            vec!["a".to_string(), "b".to_string()],
            (0..10)
                .map(|value| vec![Cell::Integer(value), Cell::Blob(vec![0xab])])
                .collect(),
        );
        let preview = result.preview_json(5);
        assert_eq!(preview.len(), 5);
        assert_eq!(preview[0], json!([0, "ab"]));
    }
}
