use std::collections::BTreeMap;

use crate::models::schema::{ColumnDescriptor, TableDescriptor};

/// Query-string keys that are never treated as column filters.
pub const RESERVED_KEYS: [&str; 4] = ["limit", "offset", "order_by", "order_dir"];

pub type Params = BTreeMap<String, String>;

/// Conjunctive WHERE fragment plus its text binds. Placeholder numbering
/// starts at `first` so the fragment can be appended to statements that
/// already carry binds of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub sql: String,
    pub binds: Vec<String>,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"col" <op> $n::<type>`: the value is always bound as text, Postgres
/// casts it to the column's reflected type and rejects incompatible input
/// at execution time.
fn cast_clause(col: &ColumnDescriptor, op: &str, n: usize) -> String {
    format!("{} {} ${}::{}", quote_ident(&col.name), op, n, col.sql_type)
}

/// Exact-equality predicate over every primary key column, if the parameter
/// set carries all of them. Tables without a primary key never match.
pub fn pk_predicate(table: &TableDescriptor, params: &Params, first: usize) -> Option<Predicate> {
    if table.primary_key.is_empty()
        || !table.primary_key.iter().all(|k| params.contains_key(k))
    {
        return None;
    }
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for key in &table.primary_key {
        let col = table.column(key)?;
        clauses.push(cast_clause(col, "=", first + binds.len()));
        binds.push(params[key].clone());
    }
    Some(Predicate { sql: clauses.join(" AND "), binds })
}

/// Translate query parameters into one AND-combined predicate.
///
/// If all primary key columns are present the result is the identity lookup
/// and every other parameter is ignored. Otherwise reserved keys and keys
/// naming a primary key column are skipped, `_gte`/`_lte` suffixes become
/// range clauses, `_like` becomes a case-insensitive pattern match on the
/// text cast of the column (the value passes through with its wildcards
/// untouched), and bare keys naming a real column become equality clauses.
/// Unknown names are silently dropped. `None` means no WHERE at all.
pub fn build_filters(table: &TableDescriptor, params: &Params, first: usize) -> Option<Predicate> {
    if let Some(p) = pk_predicate(table, params, first) {
        return Some(p);
    }

    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for (key, val) in params {
        if RESERVED_KEYS.contains(&key.as_str()) || table.is_pk_column(key) {
            continue;
        }
        let n = first + binds.len();
        // A suffixed key stays in its suffix branch even when the stripped
        // name is unknown; it never falls back to bare equality.
        let clause = if let Some(name) = key.strip_suffix("_gte") {
            table.column(name).map(|c| cast_clause(c, ">=", n))
        } else if let Some(name) = key.strip_suffix("_lte") {
            table.column(name).map(|c| cast_clause(c, "<=", n))
        } else if let Some(name) = key.strip_suffix("_like") {
            table
                .column(name)
                .map(|c| format!("{}::text ILIKE ${}", quote_ident(&c.name), n))
        } else {
            table.column(key).map(|c| cast_clause(c, "=", n))
        };
        if let Some(sql) = clause {
            clauses.push(sql);
            binds.push(val.clone());
        }
    }

    if clauses.is_empty() {
        None
    } else {
        Some(Predicate { sql: clauses.join(" AND "), binds })
    }
}

/// ORDER BY fragment. An absent or unknown `order_by` leaves the row order
/// database-defined; ascending only when `order_dir` is `asc` in any case,
/// everything else sorts descending.
pub fn parse_order(table: &TableDescriptor, params: &Params) -> Option<String> {
    let col = table.column(params.get("order_by")?)?;
    let asc = params
        .get("order_dir")
        .map(|d| d.eq_ignore_ascii_case("asc"))
        .unwrap_or(false);
    Some(format!(
        "{} {}",
        quote_ident(&col.name),
        if asc { "ASC" } else { "DESC" }
    ))
}

/// Saturating limit: absent input takes the default (clamped), numeric input
/// clamps into [1, max], unparseable input falls back to the default.
pub fn cast_limit(raw: Option<&str>, default: i64, max: i64) -> i64 {
    match raw {
        None => default.clamp(1, max),
        Some(s) => match s.trim().parse::<i64>() {
            Ok(v) => v.clamp(1, max),
            Err(_) => default,
        },
    }
}

/// Offset is unguarded: absence means zero, negatives pass through to the
/// database, and a non-numeric value is an error the caller surfaces as an
/// internal failure.
pub fn parse_offset(raw: Option<&str>) -> Result<i64, std::num::ParseIntError> {
    raw.map_or(Ok(0), |s| s.trim().parse::<i64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

    fn col(name: &str, udt: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.into(),
            sql_type: udt.into(),
            semantic: ColumnType::from_udt(udt),
            nullable: true,
        }
    }

    fn items() -> TableDescriptor {
        TableDescriptor {
            name: "items".into(),
            columns: vec![
                col("id", "int4"),
                col("name", "text"),
                col("price", "numeric"),
                col("created_at", "timestamptz"),
            ],
            primary_key: vec!["id".into()],
        }
    }

    fn order_lines() -> TableDescriptor {
        TableDescriptor {
            name: "order_lines".into(),
            columns: vec![col("order_id", "int4"), col("line_no", "int4"), col("sku", "text")],
            primary_key: vec!["order_id".into(), "line_no".into()],
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn pk_fast_path_ignores_every_other_parameter() {
        let p = build_filters(&items(), &params(&[("id", "7"), ("name", "x"), ("price_gte", "1")]), 1)
            .unwrap();
        assert_eq!(p.sql, "\"id\" = $1::int4");
        assert_eq!(p.binds, vec!["7"]);
    }

    #[test]
    fn composite_pk_requires_all_columns() {
        let t = order_lines();
        let full = params(&[("order_id", "1"), ("line_no", "2")]);
        let p = pk_predicate(&t, &full, 1).unwrap();
        assert_eq!(p.sql, "\"order_id\" = $1::int4 AND \"line_no\" = $2::int4");
        assert_eq!(p.binds, vec!["1", "2"]);

        let subset = params(&[("order_id", "1"), ("sku", "ABC")]);
        assert!(pk_predicate(&t, &subset, 1).is_none());
    }

    #[test]
    fn pk_subset_falls_through_to_list_filters_without_pk_keys() {
        // order_id names a PK column, so the list path skips it entirely
        let p = build_filters(&order_lines(), &params(&[("order_id", "1"), ("sku", "ABC")]), 1)
            .unwrap();
        assert_eq!(p.sql, "\"sku\" = $1::text");
        assert_eq!(p.binds, vec!["ABC"]);
    }

    #[test]
    fn suffixes_translate_to_range_and_pattern_clauses() {
        let p = build_filters(
            &items(),
            &params(&[("price_gte", "10"), ("price_lte", "20"), ("name_like", "%Smith%")]),
            1,
        )
        .unwrap();
        // BTreeMap iteration is key-ordered: name_like, price_gte, price_lte
        assert_eq!(
            p.sql,
            "\"name\"::text ILIKE $1 AND \"price\" >= $2::numeric AND \"price\" <= $3::numeric"
        );
        // wildcards pass through unescaped
        assert_eq!(p.binds, vec!["%Smith%", "10", "20"]);
    }

    #[test]
    fn range_suffix_on_a_pk_column_is_still_a_filter() {
        // "id_gte" is not itself a PK column name, so the suffix path applies
        let p = build_filters(&items(), &params(&[("id_gte", "5")]), 1).unwrap();
        assert_eq!(p.sql, "\"id\" >= $1::int4");
    }

    #[test]
    fn pk_named_key_is_excluded_before_suffix_matching() {
        // a PK column literally named "id_gte": the name check wins, the key
        // never reaches the suffix branch
        let t = TableDescriptor {
            name: "odd".into(),
            columns: vec![col("id_gte", "int4"), col("other", "int4"), col("v", "text")],
            primary_key: vec!["id_gte".into(), "other".into()],
        };
        let p = build_filters(&t, &params(&[("id_gte", "3"), ("v", "x")]), 1).unwrap();
        assert_eq!(p.sql, "\"v\" = $1::text");
        assert_eq!(p.binds, vec!["x"]);
    }

    #[test]
    fn reserved_keys_and_unknown_columns_produce_no_filter() {
        let p = build_filters(
            &items(),
            &params(&[
                ("limit", "5"),
                ("offset", "2"),
                ("order_by", "name"),
                ("order_dir", "asc"),
                ("ghost", "1"),
                ("ghost_gte", "2"),
                ("ghost_like", "%x%"),
            ]),
            1,
        );
        assert!(p.is_none());
    }

    #[test]
    fn placeholder_numbering_honours_the_offset() {
        let p = build_filters(&items(), &params(&[("name", "x")]), 3).unwrap();
        assert_eq!(p.sql, "\"name\" = $3::text");
    }

    #[test]
    fn order_resolution() {
        let t = items();
        assert!(parse_order(&t, &params(&[])).is_none());
        assert!(parse_order(&t, &params(&[("order_by", "ghost")])).is_none());
        assert_eq!(
            parse_order(&t, &params(&[("order_by", "name")])).unwrap(),
            "\"name\" DESC"
        );
        assert_eq!(
            parse_order(&t, &params(&[("order_by", "name"), ("order_dir", "ASC")])).unwrap(),
            "\"name\" ASC"
        );
        // anything that is not "asc" sorts descending
        assert_eq!(
            parse_order(&t, &params(&[("order_by", "name"), ("order_dir", "sideways")])).unwrap(),
            "\"name\" DESC"
        );
    }

    #[test]
    fn limit_saturates_and_falls_back() {
        assert_eq!(cast_limit(None, 100, 1000), 100);
        assert_eq!(cast_limit(Some("5"), 100, 1000), 5);
        assert_eq!(cast_limit(Some("99999"), 100, 1000), 1000);
        assert_eq!(cast_limit(Some("0"), 100, 1000), 1);
        assert_eq!(cast_limit(Some("-3"), 100, 1000), 1);
        assert_eq!(cast_limit(Some("abc"), 100, 1000), 100);
    }

    #[test]
    fn offset_is_unguarded() {
        assert_eq!(parse_offset(None).unwrap(), 0);
        assert_eq!(parse_offset(Some("12")).unwrap(), 12);
        // negative offsets pass through; the database rejects them at
        // execution time
        assert_eq!(parse_offset(Some("-5")).unwrap(), -5);
        assert!(parse_offset(Some("abc")).is_err());
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
