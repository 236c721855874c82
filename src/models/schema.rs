use serde_json::{json, Value};

/// Semantic column types the gateway distinguishes. Anything the database
/// reports outside this set is treated as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Number,
    Boolean,
    DateTime,
    Date,
    Uuid,
    Json,
    Text,
}

impl ColumnType {
    /// Map a Postgres `udt_name` (e.g. "int4", "timestamptz") onto the
    /// semantic type set.
    pub fn from_udt(udt: &str) -> Self {
        match udt.to_lowercase().as_str() {
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" => ColumnType::Integer,
            "float4" | "float8" | "numeric" | "money" => ColumnType::Number,
            "bool" | "boolean" => ColumnType::Boolean,
            "timestamp" | "timestamptz" => ColumnType::DateTime,
            "date" => ColumnType::Date,
            "uuid" => ColumnType::Uuid,
            "json" | "jsonb" => ColumnType::Json,
            _ => ColumnType::Text,
        }
    }

    /// OpenAPI schema fragment for a column of this type.
    pub fn openapi_schema(&self) -> Value {
        match self {
            ColumnType::Integer => json!({"type": "integer"}),
            ColumnType::Number => json!({"type": "number"}),
            ColumnType::Boolean => json!({"type": "boolean"}),
            ColumnType::DateTime => json!({"type": "string", "format": "date-time"}),
            ColumnType::Date => json!({"type": "string", "format": "date"}),
            ColumnType::Uuid => json!({"type": "string", "format": "uuid"}),
            ColumnType::Json => json!({"type": "object"}),
            ColumnType::Text => json!({"type": "string"}),
        }
    }
}

/// One reflected column. `sql_type` keeps the raw `udt_name` verbatim; the
/// statement builders use it to cast text binds back to the column's type.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: String,
    pub semantic: ColumnType,
    pub nullable: bool,
}

/// Reflected structural metadata for one table. Built once at startup,
/// immutable afterwards, shared behind an Arc.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn is_pk_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }
}
