//! Table column representation
//!
//! Columns form an owned tree: a STRUCT column owns its child columns and
//! nothing points back at its parent. Lookups use dotted name paths instead.

use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

use super::tag::TagLabel;

/// Data type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnDataType {
    /// Generic number
    Number,
    /// 8-bit integer
    Tinyint,
    /// 16-bit integer
    Smallint,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Bigint,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Fixed point decimal
    Decimal,
    /// Numeric
    Numeric,
    /// Timestamp
    Timestamp,
    /// Time of day
    Time,
    /// Calendar date
    Date,
    /// Date and time
    Datetime,
    /// Interval
    Interval,
    /// Unbounded string
    String,
    /// Text
    Text,
    /// Fixed length string
    Char,
    /// Variable length string
    Varchar,
    /// Boolean
    Boolean,
    /// Fixed length binary
    Binary,
    /// Variable length binary
    Varbinary,
    /// Binary large object
    Blob,
    /// Array of a scalar element type
    Array,
    /// Map
    Map,
    /// Struct with child columns
    Struct,
    /// Union
    Union,
    /// Set
    Set,
    /// Enumeration
    Enum,
    /// JSON document
    Json,
    /// UUID
    Uuid,
}

impl ColumnDataType {
    /// Types that must declare a positive `dataLength`
    pub fn requires_length(&self) -> bool {
        matches!(
            self,
            ColumnDataType::Char
                | ColumnDataType::Varchar
                | ColumnDataType::Binary
                | ColumnDataType::Varbinary
        )
    }

    /// Types whose `dataTypeDisplay` must follow the `type<...>` shape
    pub fn is_complex(&self) -> bool {
        matches!(self, ColumnDataType::Array | ColumnDataType::Struct)
    }

    /// Lowercase type name as used in `dataTypeDisplay`
    pub fn display_name(&self) -> &'static str {
        match self {
            ColumnDataType::Number => "number",
            ColumnDataType::Tinyint => "tinyint",
            ColumnDataType::Smallint => "smallint",
            ColumnDataType::Int => "int",
            ColumnDataType::Bigint => "bigint",
            ColumnDataType::Float => "float",
            ColumnDataType::Double => "double",
            ColumnDataType::Decimal => "decimal",
            ColumnDataType::Numeric => "numeric",
            ColumnDataType::Timestamp => "timestamp",
            ColumnDataType::Time => "time",
            ColumnDataType::Date => "date",
            ColumnDataType::Datetime => "datetime",
            ColumnDataType::Interval => "interval",
            ColumnDataType::String => "string",
            ColumnDataType::Text => "text",
            ColumnDataType::Char => "char",
            ColumnDataType::Varchar => "varchar",
            ColumnDataType::Boolean => "boolean",
            ColumnDataType::Binary => "binary",
            ColumnDataType::Varbinary => "varbinary",
            ColumnDataType::Blob => "blob",
            ColumnDataType::Array => "array",
            ColumnDataType::Map => "map",
            ColumnDataType::Struct => "struct",
            ColumnDataType::Union => "union",
            ColumnDataType::Set => "set",
            ColumnDataType::Enum => "enum",
            ColumnDataType::Json => "json",
            ColumnDataType::Uuid => "uuid",
        }
    }
}

impl Display for ColumnDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.display_name())
    }
}

/// Nullability or uniqueness constraint on a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnConstraint {
    /// Nullable
    Null,
    /// Not nullable
    NotNull,
    /// Unique values
    Unique,
    /// Part of the primary key
    PrimaryKey,
}

/// A node of a table's column tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Name, unique among siblings
    pub name: String,

    /// Data type
    pub data_type: ColumnDataType,

    /// Element type, required iff `data_type` is ARRAY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_data_type: Option<ColumnDataType>,

    /// Length for char, varchar, binary and varbinary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_length: Option<u32>,

    /// Display form of the type, e.g. `array<int>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type_display: Option<String>,

    /// Free text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Assigned by the engine on every accepted write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,

    /// Attached tag labels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagLabel>,

    /// Column constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ColumnConstraint>,

    /// 1-based position among siblings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<u32>,

    /// Child columns of a STRUCT
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Column>,
}

impl Column {
    /// Create a column with only a name and a type
    pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        Column {
            name: name.into(),
            data_type,
            array_data_type: None,
            data_length: None,
            data_type_display: None,
            description: None,
            fully_qualified_name: None,
            tags: Vec::new(),
            constraint: None,
            ordinal_position: None,
            children: Vec::new(),
        }
    }

    /// Set the array element type
    pub fn with_array_data_type(mut self, data_type: ColumnDataType) -> Self {
        self.array_data_type = Some(data_type);
        self
    }

    /// Set the data length
    pub fn with_data_length(mut self, length: u32) -> Self {
        self.data_length = Some(length);
        self
    }

    /// Set the display type
    pub fn with_data_type_display(mut self, display: impl Into<String>) -> Self {
        self.data_type_display = Some(display.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the tag labels
    pub fn with_tags(mut self, tags: Vec<TagLabel>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the constraint
    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Set the ordinal position
    pub fn with_ordinal_position(mut self, position: u32) -> Self {
        self.ordinal_position = Some(position);
        self
    }

    /// Replace the child columns
    pub fn with_children(mut self, children: Vec<Column>) -> Self {
        self.children = children;
        self
    }

    /// Whether two columns share the same effective data type.
    ///
    /// A column whose effective type changes is a different column.
    pub fn same_type(&self, other: &Column) -> bool {
        self.data_type == other.data_type && self.array_data_type == other.array_data_type
    }

    /// Find a descendant by a path of names relative to this column
    pub fn find_path(&self, path: &[&str]) -> Option<&Column> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter()
                .find(|c| c.name == *head)
                .and_then(|c| c.find_path(rest)),
        }
    }

    /// Number of nodes in the subtree rooted at this column
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(Column::subtree_size).sum::<usize>()
    }
}

/// Find a column in a forest by a path of names
pub fn find_column<'c>(columns: &'c [Column], path: &[&str]) -> Option<&'c Column> {
    let (head, rest) = path.split_first()?;
    columns
        .iter()
        .find(|c| c.name == *head)
        .and_then(|c| c.find_path(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn struct_column() -> Column {
        Column::new("c2", ColumnDataType::Struct)
            .with_data_type_display("struct<a:int,c:struct<d:int>>")
            .with_children(vec![
                Column::new("a", ColumnDataType::Int),
                Column::new("c", ColumnDataType::Struct)
                    .with_data_type_display("struct<d:int>")
                    .with_children(vec![Column::new("d", ColumnDataType::Int)]),
            ])
    }

    #[test]
    fn test_requires_length() {
        assert!(ColumnDataType::Char.requires_length());
        assert!(ColumnDataType::Varbinary.requires_length());
        assert!(!ColumnDataType::Bigint.requires_length());
        assert!(!ColumnDataType::String.requires_length());
    }

    #[test]
    fn test_same_type() {
        let a = Column::new("c1", ColumnDataType::Array).with_array_data_type(ColumnDataType::Int);
        let b = Column::new("c1", ColumnDataType::Array).with_array_data_type(ColumnDataType::Char);
        let c = a.clone().with_description("only metadata differs");

        assert!(!a.same_type(&b));
        assert!(a.same_type(&c));
    }

    #[test]
    fn test_find_path() {
        let columns = vec![Column::new("c1", ColumnDataType::Bigint), struct_column()];

        assert_eq!(find_column(&columns, &["c2", "c", "d"]).map(|c| c.name.as_str()), Some("d"));
        assert!(find_column(&columns, &["c2", "x"]).is_none());
        assert!(find_column(&columns, &[]).is_none());
        assert_eq!(struct_column().subtree_size(), 4);
    }

    #[test]
    fn test_serde_shape() {
        let column = Column::new("c1", ColumnDataType::Varchar)
            .with_data_length(10)
            .with_constraint(ColumnConstraint::NotNull);
        let json = serde_json::to_value(&column).unwrap();

        assert_eq!(json["dataType"], "VARCHAR");
        assert_eq!(json["dataLength"], 10);
        assert_eq!(json["constraint"], "NOT_NULL");
        assert!(json.get("children").is_none());
    }
}
