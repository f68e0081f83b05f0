//! Column schema types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared data type of a stream column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
    Date,
    /// Any type the engine does not treat specially
    #[serde(other)]
    Other,
}

impl ColumnType {
    /// Whether values of this column are temporal and must be stringified
    /// before they reach a formula
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Datetime | ColumnType::Date)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Datetime => "datetime",
            ColumnType::Date => "date",
            ColumnType::Other => "other",
        };
        f.write_str(name)
    }
}

fn default_nullable() -> bool {
    true
}

/// A column of the stream schema
///
/// Columns are unique by `id`. Names may repeat across schema generations; a
/// repeated name is disambiguated by the id suffix (see [`Column::alias_label`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl Column {
    /// Create a nullable column without a declared type
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            nullable: true,
            column_type: None,
            output: None,
            position: None,
            required: None,
        }
    }

    /// Create a column known only by name (catalog entries may omit the id)
    pub fn named<N: Into<String>>(name: N) -> Self {
        Self {
            id: None,
            ..Self::new("", name)
        }
    }

    /// Set the declared type
    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The part of the id after its last `-`, e.g. `0001` for `COL-123-0001`
    pub fn id_suffix(&self) -> Option<&str> {
        let id = self.id.as_deref()?;
        let suffix = id.rsplit('-').next()?;
        if suffix.is_empty() {
            None
        } else {
            Some(suffix)
        }
    }

    /// The disambiguation token for this column, e.g. `(C0001)`
    pub fn suffix_token(&self) -> Option<String> {
        self.id_suffix().map(|s| format!("(C{})", s))
    }

    /// The legacy alias label, e.g. `Quantity (C0001)`
    pub fn alias_label(&self) -> Option<String> {
        self.suffix_token()
            .map(|token| format!("{} {}", self.name, token))
    }

    /// Whether values of this column are temporal
    pub fn is_temporal(&self) -> bool {
        self.column_type
            .as_ref()
            .map_or(false, ColumnType::is_temporal)
    }
}

/// Input and output column lists of a transformation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<Column>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_suffix() {
        let column = Column::new("COL-123-0002", "Quantity");
        assert_eq!(column.id_suffix(), Some("0002"));
        assert_eq!(column.suffix_token().as_deref(), Some("(C0002)"));

        let column = Column::named("Tax");
        assert_eq!(column.id_suffix(), None);
        assert_eq!(column.alias_label(), None);
    }

    #[test]
    fn test_deserialize_column() {
        let column: Column =
            serde_json::from_str(r#"{"id": "COL-1", "name": "Created", "type": "datetime"}"#)
                .unwrap();
        assert!(column.nullable);
        assert!(column.is_temporal());

        let column: Column =
            serde_json::from_str(r#"{"name": "Blob", "nullable": false, "type": "object"}"#)
                .unwrap();
        assert_eq!(column.column_type, Some(ColumnType::Other));
        assert!(!column.is_temporal());
    }
}
