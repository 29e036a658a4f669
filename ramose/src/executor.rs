//! The Operation Executor: the seven-stage pipeline that turns one
//! [`Request`] into one [`Response`], described by the specification as
//!
//! 1. route,
//! 2. parameter extraction/typing,
//! 3. preprocess,
//! 4. SPARQL substitution,
//! 5. remote fetch,
//! 6. table construction & postprocess,
//! 7. declarative transforms & serialization.
//!

use crate::addon::Addon;
use crate::config::{ApiConfig, FieldType, Operation, SparqlHttpMethod};
use crate::http::{Request, Response};
use crate::remote::RemoteClient;
use crate::route::{Matched, RouteTable};
use crate::table::{TypedCell, TypedTable};
use crate::transform::{self, QueryParams};
use crate::types::{DataType, TypedValue};
use crate::Error;
use std::collections::HashMap;

/// The pure, re-entrant engine wired with a compiled route table, an addon
/// registry, and a remote-fetch client. `execute` is the sole operation it
/// exposes and has exactly one suspension point: the remote fetch in stage
/// 5, which an async HTTP adapter can run through a blocking-task pool.
///
pub struct Engine {
    configs: Vec<ApiConfig>,
    routes: RouteTable,
    addon: Addon,
    remote: Box<dyn RemoteClient>,
}

impl Engine {
    /// Build the engine from one or more loaded specification documents.
    /// Route matching tries each document's operations in turn, in the
    /// order given, so two documents are free to declare different
    /// `base_url`/`endpoint` pairs.
    ///
    pub fn new(configs: Vec<ApiConfig>, addon: Addon, remote: Box<dyn RemoteClient>) -> Result<Self, Error> {
        let routes = RouteTable::build(&configs)?;
        Ok(Self { configs, routes, addon, remote })
    }

    pub fn configs(&self) -> &[ApiConfig] {
        &self.configs
    }

    /// Execute one request end to end. Never panics on request input: every
    /// failure path is classified into one of the specification's `Error`
    /// variants and turned into a status/body/content-type response before
    /// returning (a request that somehow still reaches an internal panic
    /// inside an addon or the typed-value comparator is this engine's own
    /// bug, not a classifiable request failure).
    ///
    pub fn execute(&self, request: &Request) -> Response {
        let path = request.path.split('?').next().unwrap_or(&request.path);
        match self.run(path, &request.method, &request.query, &request.default_content_type) {
            Ok(response) => {
                log::info!(
                    "{} {} -> {}",
                    request.method,
                    request.path,
                    response.status,
                );
                response
            }
            Err(err) => {
                match &err {
                    Error::Upstream { status, reason } => {
                        log::error!("upstream error {}: {}", status, reason);
                    }
                    Error::Internal(msg) => log::error!("internal error: {}", msg),
                    _ => {}
                }
                Response::new(err.status_code(), err.to_string(), "text/plain")
            }
        }
    }

    fn run(&self, path: &str, method: &str, query: &str, default_content_type: &str) -> Result<Response, Error> {
        // Stage 1: route.
        let (operation, mut param_values) = match self.routes.best_match(path, method) {
            Matched::NotFound => return Err(Error::NotFound),
            Matched::MethodNotAllowed => return Err(Error::MethodNotAllowed),
            Matched::Found { operation, captures } => {
                let mut values = HashMap::new();
                for (name, value) in operation.param_names.iter().zip(captures.into_iter()) {
                    values.insert(name.clone(), value);
                }
                (operation, values)
            }
        };

        // Stage 2 happens implicitly below: each parameter is coerced
        // through its declared type only when substituted into the query.

        // Stage 3: preprocess.
        self.preprocess(operation, &mut param_values)?;

        // Stage 4: SPARQL substitution.
        let query_text = self.substitute(operation, &param_values)?;

        // Stage 5: remote fetch, against the matched operation's own
        // document's endpoint and SPARQL HTTP method.
        let remote_response =
            self.remote.fetch(&operation.endpoint, operation.sparql_http_method, &query_text)?;
        if remote_response.status != 200 {
            return Err(Error::Upstream {
                status: remote_response.status,
                reason: remote_response.reason,
            });
        }

        // Stage 6: table construction & postprocess.
        let mut table = parse_csv_response(&remote_response.body, &operation.field_types)?;
        if let Some(post) = &operation.postprocess {
            table = self.postprocess(post, table, &operation.field_types)?;
        }

        // Stage 7: declarative transforms & serialization.
        let params = QueryParams::parse(query);
        let table = transform::apply_query_transforms(table, &params)?;
        let content_type = transform::requested_content_type(&params, default_content_type);
        let body = serialize(table, &content_type, &params)?;
        Ok(Response::new(200, body, content_type))
    }

    fn preprocess(&self, operation: &Operation, values: &mut HashMap<String, String>) -> Result<(), Error> {
        let Some(chain) = &operation.preprocess else {
            return Ok(());
        };
        for step in chain.split("-->").map(str::trim) {
            let (func_name, args) = parse_call(step)
                .ok_or_else(|| Error::config(format!("malformed preprocess declaration: {}", step)))?;
            let raw_values: Vec<&str> = args
                .iter()
                .map(|name| values.get(name).map(String::as_str).unwrap_or(""))
                .collect();
            let results = self.addon.preprocess(&func_name, &raw_values).map_err(|e| {
                log::warn!("preprocess addon '{}' failed: {}", func_name, e);
                e
            })?;
            if results.len() != args.len() {
                return Err(Error::internal(format!(
                    "preprocess addon '{}' returned {} values for {} parameters",
                    func_name,
                    results.len(),
                    args.len(),
                )));
            }
            for (name, new_value) in args.iter().zip(results.into_iter()) {
                values.insert(name.clone(), new_value);
            }
        }
        Ok(())
    }

    fn substitute(&self, operation: &Operation, values: &HashMap<String, String>) -> Result<String, Error> {
        let mut query = operation.sparql.clone();
        for name in &operation.param_names {
            let raw = values.get(name).map(String::as_str).unwrap_or("");
            let spec = operation.params.get(name);
            let substitution = match spec.and_then(|s| s.data_type) {
                None | Some(DataType::Str) => raw.to_string(),
                Some(other) => other.coerce(Some(raw))?.to_string(),
            };
            query = query.replace(&format!("[[{}]]", name), &substitution);
        }
        Ok(query)
    }

    fn postprocess(
        &self,
        chain: &str,
        mut table: TypedTable,
        field_types: &[FieldType],
    ) -> Result<TypedTable, Error> {
        for step in chain.split("-->").map(str::trim) {
            let (func_name, args) = parse_call(step)
                .ok_or_else(|| Error::config(format!("malformed postprocess declaration: {}", step)))?;
            let (new_table, retype) = self.addon.postprocess(&func_name, table, &args).map_err(|e| {
                log::warn!("postprocess addon '{}' failed: {}", func_name, e);
                e
            })?;
            table = if retype { retype_table(new_table, field_types) } else { new_table };
        }
        Ok(table)
    }
}

/// Split `name(a, b, c)` into its function name and comma-separated,
/// trimmed argument list. A call with no arguments (`name()`) yields an
/// empty list.
///
fn parse_call(decl: &str) -> Option<(String, Vec<String>)> {
    let open = decl.find('(')?;
    let close = decl.rfind(')')?;
    if close < open {
        return None;
    }
    let name = decl[..open].trim().to_string();
    let inner = decl[open + 1..close].trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|a| a.trim().to_string()).collect()
    };
    Some((name, args))
}

fn column_cast(field_types: &[FieldType], column: &str) -> DataType {
    field_types
        .iter()
        .find(|ft| ft.column == column)
        .map(|ft| ft.data_type)
        .unwrap_or(DataType::Str)
}

/// Parse a CSV response body into a [`TypedTable`], typing each column
/// according to the operation's `field_type` declarations (defaulting to
/// `str`), matching `type_fields`.
///
fn parse_csv_response(body: &str, field_types: &[FieldType]) -> Result<TypedTable, Error> {
    let mut reader = csv::ReaderBuilder::new().from_reader(body.as_bytes());
    let header: Vec<String> = map_error!(Internal, reader.headers())?
        .iter()
        .map(str::to_string)
        .collect();
    let casts: Vec<DataType> = header.iter().map(|h| column_cast(field_types, h)).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = map_error!(Internal, record)?;
        let mut row = Vec::with_capacity(header.len());
        for (idx, field) in record.iter().enumerate() {
            let data_type = casts.get(idx).copied().unwrap_or(DataType::Str);
            let typed = data_type.coerce(Some(field))?;
            row.push(TypedCell::new(typed, field.to_string()));
        }
        rows.push(row);
    }
    Ok(TypedTable::new(header, rows))
}

/// Re-derive every cell's typed half from its plain half, for use after a
/// postprocess step that asked to be re-typed.
///
fn retype_table(table: TypedTable, field_types: &[FieldType]) -> TypedTable {
    let header = table.header().to_vec();
    let casts: Vec<DataType> = header.iter().map(|h| column_cast(field_types, h)).collect();
    let rows = table
        .into_rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(idx, cell)| {
                    let data_type = casts.get(idx).copied().unwrap_or(DataType::Str);
                    let typed = data_type
                        .coerce(Some(cell.plain()))
                        .unwrap_or_else(|_| TypedValue::Str(cell.plain().to_lowercase()));
                    TypedCell::new(typed, cell.plain().to_string())
                })
                .collect()
        })
        .collect();
    TypedTable::new(header, rows)
}

fn serialize(table: TypedTable, content_type: &str, params: &QueryParams) -> Result<String, Error> {
    if content_type.contains("json") {
        let header = table.header().to_vec();
        let mut rows: Vec<serde_json::Value> = table
            .rows()
            .iter()
            .map(|row| {
                let mut map = serde_json::Map::new();
                for (name, cell) in header.iter().zip(row.iter()) {
                    map.insert(name.clone(), serde_json::Value::String(cell.plain().to_string()));
                }
                serde_json::Value::Object(map)
            })
            .collect();
        transform::restructure_json(&mut rows, params);
        map_error!(Internal, serde_json::to_string_pretty(&rows))
    } else {
        let mut writer = csv::Writer::from_writer(Vec::new());
        map_error!(Internal, writer.write_record(table.header()))?;
        for row in table.rows() {
            let fields: Vec<&str> = row.iter().map(TypedCell::plain).collect();
            map_error!(Internal, writer.write_record(&fields))?;
        }
        let bytes = map_error!(Internal, writer.into_inner().map_err(|e| e.to_string()))?;
        map_error!(Internal, String::from_utf8(bytes).map_err(|e| e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;
    use crate::remote::RemoteResponse;

    struct FakeClient {
        body: &'static str,
    }

    impl RemoteClient for FakeClient {
        fn fetch(&self, _: &str, _: SparqlHttpMethod, _: &str) -> Result<RemoteResponse, Error> {
            Ok(RemoteResponse { status: 200, body: self.body.to_string(), reason: "OK".to_string() })
        }
    }

    const DOC: &str = "#url /api/v1\n#base http://example.org\n#endpoint http://example.org/sparql\n#method get\n\n#url /citations/{oci}\n#oci str([0-9]+-[0-9]+)\n#method get\n#sparql SELECT * WHERE { ?s ?p [[oci]] }\n";

    fn engine(body: &'static str) -> Engine {
        let config = load_str(&[DOC]).unwrap();
        Engine::new(config, Addon::new(), Box::new(FakeClient { body })).unwrap()
    }

    #[test]
    fn executes_a_matching_request_end_to_end() {
        let eng = engine("id,title\n1,Alpha\n2,Beta\n");
        let resp = eng.execute(&Request::new("get", "/api/v1/citations/101108-2016", ""));
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("Alpha"));
    }

    #[test]
    fn unmatched_path_yields_not_found() {
        let eng = engine("id\n1\n");
        let resp = eng.execute(&Request::new("get", "/api/v1/nope", ""));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn wrong_method_yields_method_not_allowed() {
        let eng = engine("id\n1\n");
        let resp = eng.execute(&Request::new("post", "/api/v1/citations/101108-2016", ""));
        assert_eq!(resp.status, 405);
    }

    #[test]
    fn csv_format_override_is_honored() {
        let eng = engine("id,title\n1,Alpha\n");
        let resp = eng.execute(&Request::new(
            "get",
            "/api/v1/citations/101108-2016",
            "format=csv",
        ));
        assert_eq!(resp.content_type, "text/csv");
        assert!(resp.body.starts_with("id,title"));
    }

    #[test]
    fn parse_call_splits_name_and_args() {
        assert_eq!(
            parse_call("lower(doi, title)"),
            Some(("lower".to_string(), vec!["doi".to_string(), "title".to_string()])),
        );
        assert_eq!(parse_call("noop()"), Some(("noop".to_string(), vec![])));
    }
}
