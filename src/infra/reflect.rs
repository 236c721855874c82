use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

const COLUMNS_SQL: &str = "SELECT column_name, udt_name, is_nullable \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name = $1 \
     ORDER BY ordinal_position";

const PK_SQL: &str = "SELECT kcu.column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON kcu.constraint_name = tc.constraint_name \
      AND kcu.table_schema = tc.table_schema \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = 'public' AND tc.table_name = $1 \
     ORDER BY kcu.ordinal_position";

/// Reflect one table's columns and primary key. An unknown name aborts
/// startup.
pub async fn reflect_table(pool: &PgPool, name: &str) -> anyhow::Result<TableDescriptor> {
    let rows = sqlx::query(COLUMNS_SQL)
        .bind(name)
        .fetch_all(pool)
        .await
        .with_context(|| format!("reflecting columns of '{name}'"))?;
    if rows.is_empty() {
        bail!("Unknown table '{name}'");
    }

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let col_name: String = row.try_get("column_name")?;
        let udt: String = row.try_get("udt_name")?;
        let nullable: String = row.try_get("is_nullable")?;
        columns.push(ColumnDescriptor {
            name: col_name,
            semantic: ColumnType::from_udt(&udt),
            sql_type: udt,
            nullable: nullable == "YES",
        });
    }

    let pk_rows = sqlx::query(PK_SQL)
        .bind(name)
        .fetch_all(pool)
        .await
        .with_context(|| format!("reflecting primary key of '{name}'"))?;
    let mut primary_key = Vec::with_capacity(pk_rows.len());
    for row in pk_rows {
        primary_key.push(row.try_get::<String, _>("column_name")?);
    }

    Ok(TableDescriptor {
        name: name.to_string(),
        columns,
        primary_key,
    })
}

/// Build the startup catalog for every exposed table.
pub async fn build_catalog(
    pool: &PgPool,
    tables: &[String],
) -> anyhow::Result<HashMap<String, Arc<TableDescriptor>>> {
    let mut catalog = HashMap::new();
    for name in tables {
        let desc = reflect_table(pool, name).await?;
        info!(
            table = %name,
            columns = desc.columns.len(),
            pk = ?desc.primary_key,
            "table reflected"
        );
        catalog.insert(name.clone(), Arc::new(desc));
    }
    Ok(catalog)
}
