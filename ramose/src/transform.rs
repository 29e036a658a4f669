//! Declarative query-string transforms: `exclude`/`require`, `filter`,
//! `sort`, `format`, and the `json` output-restructuring rules.
//!

use crate::table::TypedTable;
use crate::types::{DataType, TypedValue};
use crate::Error;
use regex::Regex;
use std::collections::HashMap;

/// A parsed `?a=1&a=2&b=3`-style query string: every key maps to the list
/// of values given for it, in appearance order, matching the original
/// implementation's use of `urllib.parse.parse_qs`.
///
#[derive(Clone, Debug, Default)]
pub struct QueryParams(HashMap<String, Vec<String>>);

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            map.entry(k.into_owned()).or_default().push(v.into_owned());
        }
        Self(map)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get_one(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Apply `exclude`/`require` (synonyms), `filter`, then `sort`, in that
/// order, matching the original implementation's `handling_params`.
///
pub fn apply_query_transforms(
    table: TypedTable,
    params: &QueryParams,
) -> Result<TypedTable, Error> {
    let header = table.header().to_vec();
    let mut rows = table.into_rows();

    let mut excluded_fields: Vec<&str> = Vec::new();
    excluded_fields.extend(params.get_all("exclude").iter().map(String::as_str));
    excluded_fields.extend(params.get_all("require").iter().map(String::as_str));
    for field in excluded_fields {
        let idx = header
            .iter()
            .position(|h| h == field)
            .ok_or_else(|| Error::internal(format!("unknown column in exclude/require: {}", field)))?;
        rows.retain(|row| !row[idx].plain().is_empty());
    }

    for spec in params.get_all("filter") {
        let Some((field_name, field_value)) = spec.split_once(':') else {
            continue;
        };
        let Some(idx) = header.iter().position(|h| h == field_name) else {
            continue;
        };
        let mut chars = field_value.chars();
        match chars.next() {
            Some(flag @ ('<' | '>' | '=')) => {
                let rest: String = chars.as_str().to_lowercase();
                let column_type = rows
                    .first()
                    .map(|row| row[idx].typed().data_type())
                    .unwrap_or(DataType::Str);
                let target = column_type.coerce(Some(rest.as_str()))?;
                rows.retain(|row| compare_flag(row[idx].typed(), &target, flag));
            }
            _ => {
                if let Ok(re) = Regex::new(&format!("(?i){}", field_value)) {
                    rows.retain(|row| re.is_match(row[idx].plain()));
                }
            }
        }
    }

    let mut sort_specs: Vec<String> = params.get_all("sort").to_vec();
    sort_specs.sort_by(|a, b| b.cmp(a));
    lazy_static::lazy_static! {
        static ref SORT_RE: Regex = Regex::new(r"^(desc|asc)\(([^()]+)\)$").unwrap();
    }
    for spec in sort_specs {
        let (descending, field_name) = match SORT_RE.captures(&spec) {
            Some(caps) => (
                caps.get(1).unwrap().as_str() == "desc",
                caps.get(2).unwrap().as_str().to_string(),
            ),
            None => (false, spec.clone()),
        };
        if let Some(idx) = header.iter().position(|h| h == &field_name) {
            rows.sort_by(|a, b| {
                let cmp = a[idx].compare(&b[idx]);
                if descending {
                    cmp.reverse()
                } else {
                    cmp
                }
            });
        }
    }

    Ok(TypedTable::new(header, rows))
}

fn compare_flag(value: &TypedValue, target: &TypedValue, flag: char) -> bool {
    use std::cmp::Ordering::*;
    let ord = value.compare(target);
    match flag {
        '=' => ord == Equal,
        '<' => ord == Less,
        '>' => ord == Greater,
        _ => false,
    }
}

/// The content type requested, honoring a `format` query parameter over
/// the caller's own default (e.g. the request's `Accept` header), matching
/// `get_content_type`/`conv`'s override rule.
///
pub fn requested_content_type(params: &QueryParams, default: &str) -> String {
    match params.get_all("format").last().map(String::as_str) {
        Some("csv") => "text/csv".to_string(),
        Some("json") => "application/json".to_string(),
        Some(other) => other.to_string(),
        None => default.to_string(),
    }
}

lazy_static::lazy_static! {
    static ref JSON_RULE_RE: Regex = Regex::new(r#"([a-z]+)\("([^"]+)",([^)]+)\)"#).unwrap();
}

/// Apply the `json=array(...)`/`json=dict(...)` restructuring rules to an
/// already-produced array of JSON objects, matching `structured`.
///
pub fn restructure_json(rows: &mut Vec<serde_json::Value>, params: &QueryParams) {
    for rule in params.get_all("json") {
        let Some(caps) = JSON_RULE_RE.captures(rule) else {
            continue;
        };
        let op_type = caps.get(1).unwrap().as_str();
        let separator = caps.get(2).unwrap().as_str();
        let entries: Vec<String> = caps
            .get(3)
            .unwrap()
            .as_str()
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        let keys: Vec<&str> = entries[0].split('.').collect();

        for row in rows.iter_mut() {
            apply_json_rule(row, &keys, op_type, separator, &entries[1..]);
        }
    }
}

/// Walk `value` along `keys`, applying the array/dict split to whatever
/// leaf strings (or, for an already-split list, each string element of the
/// list) are found there, in place.
///
fn apply_json_rule(value: &mut serde_json::Value, keys: &[&str], op_type: &str, sep: &str, new_fields: &[String]) {
    if keys.is_empty() {
        return;
    }
    let (key, rest) = (keys[0], &keys[1..]);
    match value {
        serde_json::Value::Object(map) => {
            if let Some(v) = map.get_mut(key) {
                if rest.is_empty() {
                    *v = split_value(v, op_type, sep, new_fields);
                } else {
                    apply_json_rule(v, rest, op_type, sep, new_fields);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                apply_json_rule(item, keys, op_type, sep, new_fields);
            }
        }
        _ => {}
    }
}

fn split_value(
    v: &serde_json::Value,
    op_type: &str,
    sep: &str,
    new_fields: &[String],
) -> serde_json::Value {
    match v {
        serde_json::Value::String(s) => split_one(s, op_type, sep, new_fields),
        serde_json::Value::Array(items) if op_type == "dict" => serde_json::Value::Array(
            items
                .iter()
                .map(|i| match i {
                    serde_json::Value::String(s) => split_one(s, op_type, sep, new_fields),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn split_one(s: &str, op_type: &str, sep: &str, new_fields: &[String]) -> serde_json::Value {
    match op_type {
        "array" => {
            if s.is_empty() {
                serde_json::Value::Array(Vec::new())
            } else {
                serde_json::Value::Array(
                    s.split(sep).map(|p| serde_json::Value::String(p.to_string())).collect(),
                )
            }
        }
        "dict" => {
            if s.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                let parts: Vec<&str> = splitn_like_python(s, sep, new_fields.len());
                let mut map = serde_json::Map::new();
                for (name, part) in new_fields.iter().zip(parts.into_iter()) {
                    map.insert(name.clone(), serde_json::Value::String(part.to_string()));
                }
                serde_json::Value::Object(map)
            }
        }
        _ => serde_json::Value::String(s.to_string()),
    }
}

/// `str.split(sep, maxsplit)` in Python splits at most `maxsplit` times,
/// leaving the remainder in the last element. `str::splitn` in Rust has the
/// same semantics when given `maxsplit + 1` as its limit.
///
fn splitn_like_python<'a>(s: &'a str, sep: &str, max_fields: usize) -> Vec<&'a str> {
    if max_fields == 0 {
        return vec![s];
    }
    s.splitn(max_fields, sep).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TypedCell;

    fn str_cell(s: &str) -> TypedCell {
        TypedCell::new(TypedValue::Str(s.to_lowercase()), s.to_string())
    }

    fn sample_table() -> TypedTable {
        TypedTable::new(
            vec!["id".to_string(), "title".to_string()],
            vec![
                vec![str_cell("1"), str_cell("Alpha")],
                vec![str_cell("2"), str_cell("")],
                vec![str_cell("3"), str_cell("Beta")],
            ],
        )
    }

    #[test]
    fn exclude_drops_rows_with_empty_value() {
        let params = QueryParams::parse("exclude=title");
        let table = apply_query_transforms(sample_table(), &params).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn require_is_a_synonym_of_exclude() {
        let params = QueryParams::parse("require=title");
        let table = apply_query_transforms(sample_table(), &params).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn filter_substring_search_is_case_insensitive() {
        let params = QueryParams::parse("filter=title:alpha");
        let table = apply_query_transforms(sample_table(), &params).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows()[0][1].plain(), "Alpha");
    }

    #[test]
    fn sort_multi_field_quirk_prefers_lexically_smaller_spec() {
        let table = TypedTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![
                vec![str_cell("x"), str_cell("2")],
                vec![str_cell("y"), str_cell("1")],
            ],
        );
        // "asc(a)" < "desc(b)" lexically, so "asc(a)" sorts last and wins.
        let params = QueryParams::parse("sort=desc(b)&sort=asc(a)");
        let sorted = apply_query_transforms(table, &params).unwrap();
        assert_eq!(sorted.rows()[0][0].plain(), "x");
        assert_eq!(sorted.rows()[1][0].plain(), "y");
    }

    #[test]
    fn json_array_rule_splits_string_field() {
        let mut rows = vec![serde_json::json!({ "names": "Doe, John; Doe, Jane" })];
        let params = QueryParams::parse(r#"json=array("; ",names)"#);
        restructure_json(&mut rows, &params);
        assert_eq!(rows[0]["names"], serde_json::json!(["Doe, John", "Doe, Jane"]));
    }

    #[test]
    fn json_array_rule_leaves_an_already_split_list_untouched() {
        let mut rows = vec![serde_json::json!({ "names": ["Doe, John", "Doe, Jane"] })];
        let params = QueryParams::parse(r#"json=array("; ",names)"#);
        restructure_json(&mut rows, &params);
        assert_eq!(rows[0]["names"], serde_json::json!(["Doe, John", "Doe, Jane"]));
    }

    #[test]
    fn json_dict_rule_splits_string_field_into_named_parts() {
        let mut rows = vec![serde_json::json!({ "name": "Doe, John" })];
        let params = QueryParams::parse(r#"json=dict(", ",name,family_name,given_name)"#);
        restructure_json(&mut rows, &params);
        assert_eq!(
            rows[0]["name"],
            serde_json::json!({ "family_name": "Doe", "given_name": "John" }),
        );
    }
}
