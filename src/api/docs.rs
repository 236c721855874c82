use std::sync::Arc;

use axum::{extract::State, response::Html, Json};
use serde_json::{json, Map, Value};

use crate::api::error::ApiError;
use crate::ax_state::AppState;
use crate::infra::config::ApiConfig;
use crate::models::schema::TableDescriptor;

// --- OpenAPI document ---

/// OpenAPI 3.0.3 document built from the live catalog. Regenerated on every
/// request, never cached.
pub fn build_openapi(cfg: &ApiConfig, tables: &[&TableDescriptor]) -> Value {
    let mut schemas = Map::new();
    let mut paths = Map::new();
    for table in tables {
        schemas.insert(table.name.clone(), table_schema(table));
        paths.insert(
            format!("{}/{}", cfg.prefix(), table.name),
            table_path_item(table),
        );
    }
    json!({
        "openapi": "3.0.3",
        "info": {"title": cfg.docs.title, "version": cfg.docs.version},
        "paths": paths,
        "components": {"schemas": schemas},
    })
}

fn table_schema(table: &TableDescriptor) -> Value {
    let props: Map<String, Value> = table
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.semantic.openapi_schema()))
        .collect();
    json!({"type": "object", "properties": props})
}

/// Query parameters advertised on GET: paging/ordering plus equality and
/// `_gte`/`_lte`/`_like` variants for every column.
fn filter_params(table: &TableDescriptor) -> Vec<Value> {
    let mut params = vec![
        json!({"name": "limit", "in": "query", "schema": {"type": "integer"}}),
        json!({"name": "offset", "in": "query", "schema": {"type": "integer"}}),
        json!({"name": "order_by", "in": "query", "schema": {"type": "string"}}),
        json!({"name": "order_dir", "in": "query",
               "schema": {"type": "string", "enum": ["asc", "desc"]}}),
    ];
    for c in &table.columns {
        params.push(json!({
            "name": c.name, "in": "query", "required": false,
            "schema": c.semantic.openapi_schema()
        }));
        for suffix in ["_gte", "_lte", "_like"] {
            params.push(json!({
                "name": format!("{}{}", c.name, suffix), "in": "query",
                "required": false, "schema": {"type": "string"}
            }));
        }
    }
    params
}

fn pk_params(table: &TableDescriptor) -> Vec<Value> {
    table
        .primary_key
        .iter()
        .filter_map(|k| table.column(k))
        .map(|c| {
            json!({
                "name": c.name, "in": "query", "required": true,
                "schema": c.semantic.openapi_schema()
            })
        })
        .collect()
}

/// One path item per table carrying all five operations.
fn table_path_item(table: &TableDescriptor) -> Value {
    let name = &table.name;
    let body = json!({
        "required": true,
        "content": {"application/json": {
            "schema": {"$ref": format!("#/components/schemas/{name}")}
        }}
    });
    json!({
        "get": {
            "summary": format!("List or get {name}"),
            "description": "If all primary key params are provided → returns a single record; otherwise returns a filtered list.",
            "parameters": filter_params(table),
            "responses": {
                "200": {"description": "OK"},
                "404": {"description": "Not found (when PK provided and not exists)"}
            }
        },
        "post": {
            "summary": format!("Create {name}"),
            "requestBody": body,
            "responses": {"201": {"description": "Created"}, "400": {"description": "Bad request"}}
        },
        "put": {
            "summary": format!("Update {name} (requires PK params)"),
            "parameters": pk_params(table),
            "requestBody": body,
            "responses": {
                "200": {"description": "Updated"},
                "400": {"description": "Bad request"},
                "404": {"description": "Not found"}
            }
        },
        "patch": {
            "summary": format!("Partial update {name} (requires PK params)"),
            "parameters": pk_params(table),
            "requestBody": body,
            "responses": {
                "200": {"description": "Updated"},
                "400": {"description": "Bad request"},
                "404": {"description": "Not found"}
            }
        },
        "delete": {
            "summary": format!("Delete {name} (requires PK params)"),
            "parameters": pk_params(table),
            "responses": {"200": {"description": "Deleted"}, "404": {"description": "Not found"}}
        }
    })
}

// --- Handlers ---

pub async fn openapi_json(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    if !state.config.api.docs.enabled {
        return Err(ApiError::NotFound("docs disabled in config".to_string()));
    }
    let tables: Vec<&TableDescriptor> = state
        .config
        .api
        .expose_tables
        .iter()
        .filter_map(|n| state.catalog.get(n))
        .map(|t| t.as_ref())
        .collect();
    Ok(Json(build_openapi(&state.config.api, &tables)))
}

pub async fn swagger_ui(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    if !state.config.api.docs.enabled {
        return Err(ApiError::NotFound("docs disabled in config".to_string()));
    }
    Ok(Html(format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>{title} — Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{
      url: '/openapi.json',
      dom_id: '#swagger-ui'
    }});
  </script>
</body>
</html>"#,
        title = state.config.api.docs.title
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{ColumnDescriptor, ColumnType};

    fn test_config() -> ApiConfig {
        serde_json::from_str(
            r#"{"base_prefix": "/api", "expose_tables": ["items"],
                "docs": {"enabled": true, "title": "Items API", "version": "1.2.3"}}"#,
        )
        .unwrap()
    }

    fn items() -> TableDescriptor {
        TableDescriptor {
            name: "items".into(),
            columns: vec![
                ColumnDescriptor {
                    name: "id".into(),
                    sql_type: "int4".into(),
                    semantic: ColumnType::Integer,
                    nullable: false,
                },
                ColumnDescriptor {
                    name: "name".into(),
                    sql_type: "text".into(),
                    semantic: ColumnType::Text,
                    nullable: true,
                },
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn document_carries_info_paths_and_schemas() {
        let t = items();
        let doc = build_openapi(&test_config(), &[&t]);
        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["info"]["title"], "Items API");
        assert_eq!(doc["info"]["version"], "1.2.3");
        assert!(doc["paths"]["/api/items"].is_object());
        assert_eq!(
            doc["components"]["schemas"]["items"]["properties"]["id"]["type"],
            "integer"
        );
    }

    #[test]
    fn one_path_item_exposes_all_five_operations() {
        let t = items();
        let doc = build_openapi(&test_config(), &[&t]);
        let item = &doc["paths"]["/api/items"];
        for op in ["get", "post", "put", "patch", "delete"] {
            assert!(item[op].is_object(), "missing operation {op}");
        }
    }

    #[test]
    fn write_operations_require_pk_query_params() {
        let t = items();
        let doc = build_openapi(&test_config(), &[&t]);
        for op in ["put", "patch", "delete"] {
            let params = doc["paths"]["/api/items"][op]["parameters"].as_array().unwrap();
            assert_eq!(params.len(), 1);
            assert_eq!(params[0]["name"], "id");
            assert_eq!(params[0]["required"], true);
            assert_eq!(params[0]["in"], "query");
        }
    }

    #[test]
    fn get_advertises_filter_suffixes_for_every_column() {
        let t = items();
        let doc = build_openapi(&test_config(), &[&t]);
        let names: Vec<String> = doc["paths"]["/api/items"]["get"]["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        for expected in [
            "limit", "offset", "order_by", "order_dir", "id", "id_gte", "id_lte", "id_like",
            "name", "name_gte", "name_lte", "name_like",
        ] {
            assert!(names.contains(&expected.to_string()), "missing param {expected}");
        }
    }
}
