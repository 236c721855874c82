use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, MethodRouter},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::api::error::ApiError;
use crate::ax_state::AppState;
use crate::core::filter::{
    build_filters, cast_limit, parse_offset, parse_order, pk_predicate, quote_ident, Params,
};
use crate::infra::utils::{pg_row_to_json, value_to_bind};
use crate::models::schema::TableDescriptor;

/// Route binding for one reflected table: a single path accepting every
/// method, dispatched inside the handler.
pub fn table_routes(table: Arc<TableDescriptor>) -> MethodRouter<Arc<AppState>> {
    any(
        move |State(state): State<Arc<AppState>>,
              method: Method,
              Query(params): Query<Params>,
              body: Bytes| {
            let table = table.clone();
            async move { table_endpoint(table, state, method, params, body).await }
        },
    )
}

async fn table_endpoint(
    table: Arc<TableDescriptor>,
    state: Arc<AppState>,
    method: Method,
    params: Params,
    body: Bytes,
) -> Result<Response, ApiError> {
    match method.as_str() {
        // GET: all PK params present means a single record, otherwise a list
        "GET" => {
            if pk_predicate(&table, &params, 1).is_some() {
                get_one(&table, &state, &params).await
            } else {
                list(&table, &state, &params).await
            }
        }
        "POST" => create(&table, &state, &body).await,
        // PUT and PATCH share semantics: any subset of columns is accepted
        "PUT" | "PATCH" => update_row(&table, &state, &params, &body).await,
        "DELETE" => delete_row(&table, &state, &params).await,
        _ => Err(ApiError::MethodNotAllowed("Method not allowed".to_string())),
    }
}

// --- 1. Read paths ---

async fn get_one(
    table: &TableDescriptor,
    state: &AppState,
    params: &Params,
) -> Result<Response, ApiError> {
    let Some(p) = pk_predicate(table, params, 1) else {
        return Err(ApiError::NotFound("Not found".to_string()));
    };
    let sql = format!(
        "SELECT * FROM {} WHERE {} LIMIT 1",
        quote_ident(&table.name),
        p.sql
    );
    log_sql(state, &sql);

    let mut q = sqlx::query(&sql);
    for b in &p.binds {
        q = q.bind(b.as_str());
    }
    match q.fetch_optional(&state.db).await? {
        Some(row) => Ok(Json(pg_row_to_json(&row)).into_response()),
        None => Err(ApiError::NotFound("Not found".to_string())),
    }
}

async fn list(
    table: &TableDescriptor,
    state: &AppState,
    params: &Params,
) -> Result<Response, ApiError> {
    let limit = cast_limit(
        params.get("limit").map(String::as_str),
        state.config.api.default_limit,
        state.config.api.max_limit,
    );
    let offset = parse_offset(params.get("offset").map(String::as_str))
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("invalid offset: {e}")))?;

    let filter = build_filters(table, params, 1);
    let order = parse_order(table, params);

    let mut sql = format!("SELECT * FROM {}", quote_ident(&table.name));
    let binds = match &filter {
        Some(p) => {
            sql.push_str(" WHERE ");
            sql.push_str(&p.sql);
            p.binds.clone()
        }
        None => Vec::new(),
    };
    if let Some(o) = &order {
        sql.push_str(" ORDER BY ");
        sql.push_str(o);
    }
    sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    log_sql(state, &sql);

    let mut q = sqlx::query(&sql);
    for b in &binds {
        q = q.bind(b.as_str());
    }
    let rows = q.fetch_all(&state.db).await?;
    let data: Vec<Value> = rows.iter().map(pg_row_to_json).collect();
    Ok(Json(json!({"data": data, "limit": limit, "offset": offset})).into_response())
}

// --- 2. Write paths (transactional, commit on success) ---

async fn create(
    table: &TableDescriptor,
    state: &AppState,
    body: &Bytes,
) -> Result<Response, ApiError> {
    ensure_writable(&state.read_only, table)?;
    let payload = payload_known_columns(table, body);
    if payload.is_empty() {
        return Err(ApiError::BadRequest(
            "Empty payload or unknown fields".to_string(),
        ));
    }
    let (sql, binds) = insert_statement(table, &payload);
    log_sql(state, &sql);

    let mut tx = state.db.begin().await?;
    let mut q = sqlx::query(&sql);
    for b in &binds {
        q = q.bind(b.as_deref());
    }
    let row = q.fetch_one(&mut *tx).await?;
    tx.commit().await?;

    info!(table = %table.name, "row created");
    Ok((StatusCode::CREATED, Json(pg_row_to_json(&row))).into_response())
}

async fn update_row(
    table: &TableDescriptor,
    state: &AppState,
    params: &Params,
    body: &Bytes,
) -> Result<Response, ApiError> {
    ensure_writable(&state.read_only, table)?;
    let pk = require_pk_params(table, params)?;
    let payload = payload_known_columns(table, body);
    if payload.is_empty() {
        return Err(ApiError::BadRequest(
            "Empty payload or unknown fields".to_string(),
        ));
    }
    let (sql, binds) = update_statement(table, &payload, &pk);
    log_sql(state, &sql);

    let mut tx = state.db.begin().await?;
    let mut q = sqlx::query(&sql);
    for b in &binds {
        q = q.bind(b.as_deref());
    }
    let row = q.fetch_optional(&mut *tx).await?;
    tx.commit().await?;

    match row {
        Some(r) => {
            info!(table = %table.name, "row updated");
            Ok(Json(pg_row_to_json(&r)).into_response())
        }
        None => Err(ApiError::NotFound("Not found".to_string())),
    }
}

async fn delete_row(
    table: &TableDescriptor,
    state: &AppState,
    params: &Params,
) -> Result<Response, ApiError> {
    ensure_writable(&state.read_only, table)?;
    let pk = require_pk_params(table, params)?;
    let (sql, binds) = delete_statement(table, &pk);
    log_sql(state, &sql);

    let mut tx = state.db.begin().await?;
    let mut q = sqlx::query(&sql);
    for b in &binds {
        q = q.bind(b.as_deref());
    }
    let row = q.fetch_optional(&mut *tx).await?;
    tx.commit().await?;

    match row {
        Some(_) => {
            info!(table = %table.name, "row deleted");
            Ok(Json(json!({"deleted": true})).into_response())
        }
        None => Err(ApiError::NotFound("Not found".to_string())),
    }
}

// --- 3. Validation helpers ---

fn ensure_writable(read_only: &HashSet<String>, table: &TableDescriptor) -> Result<(), ApiError> {
    if read_only.contains(&table.name) {
        return Err(ApiError::MethodNotAllowed(format!(
            "Table '{}' is read-only",
            table.name
        )));
    }
    Ok(())
}

/// Lenient body handling: anything that does not parse as a JSON object
/// counts as empty, then unknown field names are dropped.
fn payload_known_columns(table: &TableDescriptor, body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(k, _)| table.has_column(k))
            .collect(),
        _ => Map::new(),
    }
}

/// Every primary key value from the query string, failing on the first
/// missing column in key order.
fn require_pk_params(
    table: &TableDescriptor,
    params: &Params,
) -> Result<Vec<(String, String)>, ApiError> {
    if table.primary_key.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Table '{}' has no primary key",
            table.name
        )));
    }
    let mut out = Vec::with_capacity(table.primary_key.len());
    for name in &table.primary_key {
        match params.get(name) {
            Some(v) => out.push((name.clone(), v.clone())),
            None => {
                return Err(ApiError::BadRequest(format!(
                    "Missing primary key parameter '{name}'"
                )))
            }
        }
    }
    Ok(out)
}

// --- 4. Statement assembly ---

fn insert_statement(
    table: &TableDescriptor,
    payload: &Map<String, Value>,
) -> (String, Vec<Option<String>>) {
    let mut cols = Vec::new();
    let mut places = Vec::new();
    let mut binds = Vec::new();
    for (key, val) in payload {
        let Some(col) = table.column(key) else { continue };
        cols.push(quote_ident(key));
        places.push(format!("${}::{}", binds.len() + 1, col.sql_type));
        binds.push(value_to_bind(val));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        quote_ident(&table.name),
        cols.join(", "),
        places.join(", ")
    );
    (sql, binds)
}

fn update_statement(
    table: &TableDescriptor,
    payload: &Map<String, Value>,
    pk: &[(String, String)],
) -> (String, Vec<Option<String>>) {
    let mut sets = Vec::new();
    let mut binds: Vec<Option<String>> = Vec::new();
    for (key, val) in payload {
        let Some(col) = table.column(key) else { continue };
        sets.push(format!(
            "{} = ${}::{}",
            quote_ident(key),
            binds.len() + 1,
            col.sql_type
        ));
        binds.push(value_to_bind(val));
    }
    let wheres = pk_clauses(table, pk, &mut binds);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING *",
        quote_ident(&table.name),
        sets.join(", "),
        wheres.join(" AND ")
    );
    (sql, binds)
}

fn delete_statement(table: &TableDescriptor, pk: &[(String, String)]) -> (String, Vec<Option<String>>) {
    let mut binds: Vec<Option<String>> = Vec::new();
    let wheres = pk_clauses(table, pk, &mut binds);
    let returning = table
        .primary_key
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "DELETE FROM {} WHERE {} RETURNING {}",
        quote_ident(&table.name),
        wheres.join(" AND "),
        returning
    );
    (sql, binds)
}

fn pk_clauses(
    table: &TableDescriptor,
    pk: &[(String, String)],
    binds: &mut Vec<Option<String>>,
) -> Vec<String> {
    let mut wheres = Vec::with_capacity(pk.len());
    for (key, val) in pk {
        let Some(col) = table.column(key) else { continue };
        wheres.push(format!(
            "{} = ${}::{}",
            quote_ident(key),
            binds.len() + 1,
            col.sql_type
        ));
        binds.push(Some(val.clone()));
    }
    wheres
}

fn log_sql(state: &AppState, sql: &str) {
    if state.config.api.log_sql {
        debug!(%sql, "executing");
    }
}
