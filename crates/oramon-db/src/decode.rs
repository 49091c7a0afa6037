//! Type-driven row decoding.
//!
//! Collection queries have no static schema: each one selects a different
//! set of columns and callers address them by position. The only thing a
//! result set reliably carries is the driver's type name for every column,
//! so decoding is a two step affair:
//!
//! ```text
//! ColumnMeta.type_tag ──ColumnType::for_tag──▶ ScanTarget (empty, typed)
//!                                                │ Cursor::scan fills it
//!                                                ▼
//!                                   ScanTarget::take ──▶ Value
//! ```
//!
//! Nulls never escape as absences for text and numbers: text decodes to
//! `""` and numbers to [`NULL_NUMBER`].

use std::mem;

use chrono::NaiveDateTime;

use crate::driver::Cursor;
use crate::error::DecodeError;

/// Value produced for a NULL numeric column.
///
/// This is indistinguishable from a genuine `-1`. Kept as-is because
/// dashboards built on the exported series rely on it; treat negative
/// values of otherwise non-negative statistics as "no data".
pub const NULL_NUMBER: f64 = -1.0;

// ── Column metadata ────────────────────────────────────────────────

/// Name and native type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_tag: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::for_tag(&self.type_tag)
    }
}

/// Decode strategy selected from a column's type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Number,
    Binary,
    Timestamp,
    Opaque,
}

impl ColumnType {
    /// Map a driver type name onto a decode strategy.
    ///
    /// Matching is case-insensitive. Unknown tags decode as opaque values.
    pub fn for_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" | "VARCHAR2" | "NVARCHAR2" | "CHAR" | "NCHAR" | "CLOB" | "NCLOB"
            | "LONG" | "ROWID" => ColumnType::Text,
            "NUMBER" | "FLOAT" | "BINARY_FLOAT" | "BINARY_DOUBLE" | "INTEGER" => {
                ColumnType::Number
            }
            "RAW" | "LONG RAW" => ColumnType::Binary,
            "DATE"
            | "TIMESTAMP"
            | "TIMESTAMP WITH TIME ZONE"
            | "TIMESTAMP WITH LOCAL TIME ZONE" => ColumnType::Timestamp,
            _ => ColumnType::Opaque,
        }
    }

    /// An empty scan target of the matching kind.
    pub fn scan_target(self) -> ScanTarget {
        match self {
            ColumnType::Text => ScanTarget::Text(None),
            ColumnType::Number => ScanTarget::Number(None),
            ColumnType::Binary => ScanTarget::Binary(None),
            ColumnType::Timestamp => ScanTarget::Timestamp(None),
            ColumnType::Opaque => ScanTarget::Opaque(None),
        }
    }
}

// ── Scan targets ───────────────────────────────────────────────────

/// Typed, nullable slot a cursor writes one column into.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanTarget {
    Text(Option<String>),
    Number(Option<f64>),
    Binary(Option<Vec<u8>>),
    Timestamp(Option<NaiveDateTime>),
    Opaque(Option<String>),
}

impl ScanTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanTarget::Text(_) => "text",
            ScanTarget::Number(_) => "number",
            ScanTarget::Binary(_) => "binary",
            ScanTarget::Timestamp(_) => "timestamp",
            ScanTarget::Opaque(_) => "opaque",
        }
    }

    /// Store a driver-produced cell into this target.
    ///
    /// The cell must be of the same kind as the target. Opaque targets
    /// accept any cell and keep its text rendering.
    pub fn fill(&mut self, cell: ScanTarget) -> Result<(), String> {
        if let ScanTarget::Opaque(slot) = self {
            *slot = cell.into_text();
            return Ok(());
        }
        if mem::discriminant(self) != mem::discriminant(&cell) {
            return Err(format!(
                "type mismatch: cannot scan {} into {}",
                cell.kind(),
                self.kind()
            ));
        }
        *self = cell;
        Ok(())
    }

    /// Convert the scanned content into a [`Value`], leaving the target
    /// empty for the next row.
    pub fn take(&mut self) -> Value {
        match self {
            ScanTarget::Text(v) => Value::Text(v.take().unwrap_or_default()),
            ScanTarget::Number(v) => Value::Number(v.take().unwrap_or(NULL_NUMBER)),
            ScanTarget::Binary(v) => Value::Hex(hex::encode(v.take().unwrap_or_default())),
            ScanTarget::Timestamp(v) => Value::Timestamp(v.take()),
            ScanTarget::Opaque(v) => Value::Untyped(v.take()),
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            ScanTarget::Text(v) | ScanTarget::Opaque(v) => v,
            ScanTarget::Number(v) => v.map(|n| n.to_string()),
            ScanTarget::Binary(v) => v.map(hex::encode),
            ScanTarget::Timestamp(v) => v.map(|t| t.to_string()),
        }
    }
}

// ── Values & rows ──────────────────────────────────────────────────

/// Uniform representation of one decoded column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    /// Binary column rendered as lowercase hex.
    Hex(String),
    /// Native timestamp; `None` when the column was NULL.
    Timestamp(Option<NaiveDateTime>),
    Untyped(Option<String>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Hex(_) => "hex",
            Value::Timestamp(_) => "timestamp",
            Value::Untyped(_) => "untyped",
        }
    }
}

/// Render a numeric identifier as a label string with no decimals.
pub fn format_id(value: f64) -> String {
    format!("{value:.0}")
}

/// One decoded result row. Column semantics are positional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn get(&self, index: usize) -> Result<&Value, DecodeError> {
        self.0.get(index).ok_or(DecodeError::OutOfRange {
            index,
            len: self.0.len(),
        })
    }

    /// Textual value at `index`. Hex and untyped values count as text;
    /// an untyped NULL reads as `""`.
    pub fn text(&self, index: usize) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Value::Text(s) | Value::Hex(s) => Ok(s),
            Value::Untyped(s) => Ok(s.as_deref().unwrap_or("")),
            other => Err(DecodeError::Column {
                index,
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    pub fn number(&self, index: usize) -> Result<f64, DecodeError> {
        match self.get(index)? {
            Value::Number(n) => Ok(*n),
            other => Err(DecodeError::Column {
                index,
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    /// Value at `index` rendered as a metric label: numbers via
    /// [`format_id`], text as-is.
    pub fn label(&self, index: usize) -> Result<String, DecodeError> {
        match self.get(index)? {
            Value::Number(n) => Ok(format_id(*n)),
            Value::Timestamp(t) => Ok(t.map(|t| t.to_string()).unwrap_or_default()),
            _ => self.text(index).map(str::to_string),
        }
    }
}

// ── Decoder ────────────────────────────────────────────────────────

/// Decoder bound to the column layout of one result set.
#[derive(Debug, Clone)]
pub struct RowDecoder {
    strategies: Vec<ColumnType>,
}

impl RowDecoder {
    pub fn new(columns: &[ColumnMeta]) -> Self {
        Self {
            strategies: columns.iter().map(ColumnMeta::column_type).collect(),
        }
    }

    pub fn strategies(&self) -> &[ColumnType] {
        &self.strategies
    }

    pub fn scan_targets(&self) -> Vec<ScanTarget> {
        self.strategies.iter().map(|s| s.scan_target()).collect()
    }

    /// Drain the cursor into decoded rows.
    ///
    /// Any scan error aborts the batch; rows decoded so far are dropped.
    pub fn decode_all(&self, cursor: &mut dyn Cursor) -> Result<Vec<Row>, DecodeError> {
        let mut targets = self.scan_targets();
        let mut rows = Vec::new();
        while cursor.scan(&mut targets)? {
            rows.push(Row(targets.iter_mut().map(ScanTarget::take).collect()));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::DriverError;

    struct VecCursor {
        columns: Vec<ColumnMeta>,
        rows: std::vec::IntoIter<Result<Vec<ScanTarget>, DriverError>>,
    }

    impl VecCursor {
        fn new(columns: &[(&str, &str)], rows: Vec<Result<Vec<ScanTarget>, DriverError>>) -> Self {
            Self {
                columns: columns.iter().map(|(n, t)| ColumnMeta::new(*n, *t)).collect(),
                rows: rows.into_iter(),
            }
        }
    }

    impl Cursor for VecCursor {
        fn columns(&self) -> &[ColumnMeta] {
            &self.columns
        }

        fn scan(&mut self, targets: &mut [ScanTarget]) -> Result<bool, DriverError> {
            let Some(row) = self.rows.next() else {
                return Ok(false);
            };
            for (column, (target, cell)) in targets.iter_mut().zip(row?).enumerate() {
                target
                    .fill(cell)
                    .map_err(|message| DriverError::Scan { column, message })?;
            }
            Ok(true)
        }
    }

    fn decode(cursor: &mut VecCursor) -> Result<Vec<Row>, DecodeError> {
        RowDecoder::new(&cursor.columns.clone()).decode_all(cursor)
    }

    // ── Tag mapping ────────────────────────────────────────────────

    #[test]
    fn tags_map_to_strategies() {
        assert_eq!(ColumnType::for_tag("VARCHAR"), ColumnType::Text);
        assert_eq!(ColumnType::for_tag("varchar2"), ColumnType::Text);
        assert_eq!(ColumnType::for_tag("CLOB"), ColumnType::Text);
        assert_eq!(ColumnType::for_tag("NUMBER"), ColumnType::Number);
        assert_eq!(ColumnType::for_tag("BINARY_DOUBLE"), ColumnType::Number);
        assert_eq!(ColumnType::for_tag("RAW"), ColumnType::Binary);
        assert_eq!(ColumnType::for_tag("DATE"), ColumnType::Timestamp);
        assert_eq!(
            ColumnType::for_tag("TIMESTAMP WITH TIME ZONE"),
            ColumnType::Timestamp
        );
    }

    #[test]
    fn unknown_tags_are_opaque() {
        assert_eq!(ColumnType::for_tag("INTERVAL DAY TO SECOND"), ColumnType::Opaque);
        assert_eq!(ColumnType::for_tag(""), ColumnType::Opaque);
    }

    // ── Null sentinels ─────────────────────────────────────────────

    #[test]
    fn nulls_decode_to_sentinels_for_every_tag() {
        let text_tags = ["VARCHAR", "VARCHAR2", "NVARCHAR2", "CHAR", "NCHAR", "CLOB", "NCLOB"];
        for tag in text_tags {
            let mut target = ColumnType::for_tag(tag).scan_target();
            assert_eq!(target.take(), Value::Text(String::new()), "tag {tag}");
        }

        let number_tags = ["NUMBER", "FLOAT", "BINARY_FLOAT", "BINARY_DOUBLE", "INTEGER"];
        for tag in number_tags {
            let mut target = ColumnType::for_tag(tag).scan_target();
            assert_eq!(target.take(), Value::Number(NULL_NUMBER), "tag {tag}");
        }

        let mut ts = ColumnType::for_tag("TIMESTAMP").scan_target();
        assert_eq!(ts.take(), Value::Timestamp(None));

        let mut raw = ColumnType::for_tag("RAW").scan_target();
        assert_eq!(raw.take(), Value::Hex(String::new()));

        let mut opaque = ColumnType::for_tag("XMLTYPE").scan_target();
        assert_eq!(opaque.take(), Value::Untyped(None));
    }

    // ── Binary ─────────────────────────────────────────────────────

    #[test]
    fn bytes_decode_to_lowercase_hex_of_double_length() {
        let samples: [&[u8]; 4] = [&[], &[0x00], &[0xAB, 0xCD, 0xEF], &[0x0F; 32]];
        for bytes in samples {
            let mut target = ScanTarget::Binary(Some(bytes.to_vec()));
            let Value::Hex(hex) = target.take() else {
                panic!("expected hex value");
            };
            assert_eq!(hex.len(), bytes.len() * 2);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    // ── Batches ────────────────────────────────────────────────────

    #[test]
    fn decode_all_produces_rows_of_column_count() {
        let when = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut cursor = VecCursor::new(
            &[("NAME", "VARCHAR"), ("VALUE", "NUMBER"), ("AT", "DATE")],
            vec![
                Ok(vec![
                    ScanTarget::Text(Some("user commits".into())),
                    ScanTarget::Number(Some(42.0)),
                    ScanTarget::Timestamp(Some(when)),
                ]),
                Ok(vec![
                    ScanTarget::Text(None),
                    ScanTarget::Number(None),
                    ScanTarget::Timestamp(None),
                ]),
            ],
        );
        let rows = decode(&mut cursor).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[0].text(0).unwrap(), "user commits");
        assert_eq!(rows[0].number(1).unwrap(), 42.0);
        assert_eq!(rows[0].get(2).unwrap(), &Value::Timestamp(Some(when)));
        assert_eq!(rows[1].text(0).unwrap(), "");
        assert_eq!(rows[1].number(1).unwrap(), NULL_NUMBER);
    }

    #[test]
    fn scan_error_discards_the_whole_batch() {
        let mut cursor = VecCursor::new(
            &[("VALUE", "NUMBER")],
            vec![
                Ok(vec![ScanTarget::Number(Some(1.0))]),
                Ok(vec![ScanTarget::Text(Some("not a number".into()))]),
            ],
        );
        let err = decode(&mut cursor).unwrap_err();
        assert!(matches!(err, DecodeError::Scan { column: 0, .. }));
    }

    #[test]
    fn fetch_error_surfaces_as_decode_error() {
        let mut cursor = VecCursor::new(
            &[("VALUE", "NUMBER")],
            vec![Err(DriverError::Fetch("ORA-03113: end-of-file on communication channel".into()))],
        );
        assert!(matches!(decode(&mut cursor), Err(DecodeError::Fetch(_))));
    }

    #[test]
    fn opaque_target_accepts_any_cell() {
        let mut target = ScanTarget::Opaque(None);
        target.fill(ScanTarget::Number(Some(7.0))).unwrap();
        assert_eq!(target.take(), Value::Untyped(Some("7".into())));
    }

    // ── Row accessors ──────────────────────────────────────────────

    #[test]
    fn wrong_kind_access_is_a_column_error() {
        let row = Row::new(vec![Value::Number(1.0), Value::Text("x".into())]);
        assert!(matches!(
            row.text(0),
            Err(DecodeError::Column { index: 0, expected: "text", found: "number" })
        ));
        assert!(matches!(row.number(1), Err(DecodeError::Column { .. })));
        assert!(matches!(row.number(5), Err(DecodeError::OutOfRange { index: 5, len: 2 })));
    }

    #[test]
    fn numeric_ids_render_without_decimals() {
        let row = Row::new(vec![Value::Number(1234.0), Value::Text("SYS".into())]);
        assert_eq!(row.label(0).unwrap(), "1234");
        assert_eq!(row.label(1).unwrap(), "SYS");
        assert_eq!(format_id(0.0), "0");
        assert_eq!(format_id(NULL_NUMBER), "-1");
    }
}
