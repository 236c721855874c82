use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Map, Value};
use sqlx::{postgres::PgRow, Column, Row, TypeInfo};

/// Decode a dynamically-typed row into a flat JSON object, dispatching on
/// the database's native type names. Types outside the known set are
/// attempted as text and fall back to null.
pub fn pg_row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();

    for col in row.columns() {
        let name = col.name();
        let type_name = col.type_info().name();

        let val = match type_name {
            "INT2" => json!(row.try_get::<Option<i16>, _>(name).unwrap_or(None)),
            "INT4" => json!(row.try_get::<Option<i32>, _>(name).unwrap_or(None)),
            "INT8" => json!(row.try_get::<Option<i64>, _>(name).unwrap_or(None)),
            "FLOAT4" => json!(row.try_get::<Option<f32>, _>(name).unwrap_or(None)),
            "FLOAT8" => json!(row.try_get::<Option<f64>, _>(name).unwrap_or(None)),
            "NUMERIC" => {
                let v: Option<rust_decimal::Decimal> = row.try_get(name).unwrap_or(None);
                json!(v.and_then(|d| d.to_f64()))
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                json!(row.try_get::<Option<String>, _>(name).unwrap_or(None))
            }
            "BOOL" => json!(row.try_get::<Option<bool>, _>(name).unwrap_or(None)),
            "UUID" => {
                let v: Option<uuid::Uuid> = row.try_get(name).unwrap_or(None);
                json!(v.map(|u| u.to_string()))
            }
            "DATE" => {
                let v: Option<NaiveDate> = row.try_get(name).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            "TIMESTAMP" => {
                let v: Option<NaiveDateTime> = row.try_get(name).unwrap_or(None);
                json!(v.map(|dt| dt.to_string()))
            }
            "TIMESTAMPTZ" => {
                let v: Option<DateTime<Utc>> = row.try_get(name).unwrap_or(None);
                json!(v.map(|dt| dt.to_rfc3339()))
            }
            "JSON" | "JSONB" => row
                .try_get::<Option<Value>, _>(name)
                .unwrap_or(None)
                .unwrap_or(Value::Null),
            _ => json!(row.try_get::<Option<String>, _>(name).unwrap_or(None)),
        };
        map.insert(name.to_string(), val);
    }

    Value::Object(map)
}

/// Render a JSON body value as the text form we bind. The statement casts it
/// back to the column's type server-side; JSON null binds as SQL NULL,
/// objects and arrays bind as their JSON text (for json/jsonb columns).
pub fn value_to_bind(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_values_bind_as_plain_text() {
        assert_eq!(value_to_bind(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_to_bind(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_bind(&json!(12.5)), Some("12.5".to_string()));
        assert_eq!(value_to_bind(&json!(true)), Some("true".to_string()));
    }

    #[test]
    fn null_binds_as_sql_null() {
        assert_eq!(value_to_bind(&Value::Null), None);
    }

    #[test]
    fn composites_bind_as_json_text() {
        assert_eq!(
            value_to_bind(&json!({"a": 1})),
            Some("{\"a\":1}".to_string())
        );
        assert_eq!(value_to_bind(&json!([1, 2])), Some("[1,2]".to_string()));
    }
}
