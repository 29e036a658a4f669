//! The Configuration Model: turns a Hash-Format specification document
//! into one [`ApiConfig`] — its shared settings (base URL, SPARQL
//! endpoint, HTTP method used to reach it) declared in the document's
//! header record, plus the ordered set of [`Operation`]s it declares. A
//! deployment may load several documents, each its own `ApiConfig`.
//!

use crate::hashformat::{self, HashRecord};
use crate::types::DataType;
use crate::Error;
use regex::Regex;
use std::path::Path;

lazy_static::lazy_static! {
    static ref PARAM_NAME: Regex = Regex::new(r"\{([^{}()]+)\}").unwrap();
    static ref FIELD_TYPE_RE: Regex = Regex::new(r"([^(\s]+)\(([^)]+)\)").unwrap();
    static ref TYPE_PREFIX: Regex = Regex::new(r"^([^(]+)\((.+)\)$").unwrap();
}

/// A path parameter's declared type and, for non-`str` types, the regular
/// expression its raw text must match (taken verbatim from the
/// parenthesized half of its declaration, e.g. `str([0-9]+-[0-9]+)`).
///
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub data_type: Option<DataType>,
    pub pattern: String,
}

impl ParamSpec {
    /// Parse a declaration such as `str([0-9]+-[0-9]+)` or `int(\d+)`. A
    /// declaration lacking a recognized type name still carries its
    /// parenthesized pattern; the type simply passes through untyped.
    ///
    fn parse(decl: &str) -> Self {
        if let Some(caps) = TYPE_PREFIX.captures(decl) {
            let name = caps.get(1).unwrap().as_str();
            let pattern = caps.get(2).unwrap().as_str().to_string();
            return Self {
                data_type: DataType::parse(name),
                pattern,
            };
        }
        Self {
            data_type: None,
            pattern: decl.to_string(),
        }
    }

    fn default_any() -> Self {
        Self {
            data_type: Some(DataType::Str),
            pattern: ".+".to_string(),
        }
    }
}

/// One named `(type, column)` pair from a `field_type` declaration, used to
/// re-type a postprocessed result table's columns.
///
#[derive(Clone, Debug)]
pub struct FieldType {
    pub column: String,
    pub data_type: DataType,
}

/// One API operation: its URL template (with `{name}` placeholders), the
/// compiled route it matches against, its SPARQL query template, and the
/// pre/postprocess pipeline declared for it.
///
#[derive(Clone, Debug)]
pub struct Operation {
    /// The raw `#url` declaration, e.g. `/citations/{oci}`.
    pub url_template: String,
    /// `base_url` + the template with `{name}` substituted by each
    /// parameter's regex, anchored, ready to match against request paths.
    /// The literal (non-parameter) portions of both are escaped, so a `.`
    /// or other regex metacharacter in `base_url` or `url_template` is
    /// matched literally rather than reinterpreted.
    pub route_pattern: Regex,
    /// Parameter names in the order they appear in `url_template`.
    pub param_names: Vec<String>,
    pub params: std::collections::HashMap<String, ParamSpec>,
    /// Accepted HTTP methods, lower-cased (e.g. `["get"]`).
    pub methods: Vec<String>,
    pub sparql: String,
    pub preprocess: Option<String>,
    pub postprocess: Option<String>,
    pub field_types: Vec<FieldType>,
    pub description: Option<String>,
    /// The SPARQL endpoint this operation's document declared, carried on
    /// the operation itself so a request can be served without having to
    /// track which document it came from.
    pub endpoint: String,
    pub sparql_http_method: SparqlHttpMethod,
}

/// The parsed settings of one specification document: its own base URL,
/// remote SPARQL endpoint, whether it is queried via `GET` or `POST`, and
/// the operations it declares. A deployment loads one `ApiConfig` per
/// input file; route matching (see [`crate::route::RouteTable`]) tries
/// each document's operations in turn, so two documents may freely use
/// different `base_url`/`endpoint` values.
///
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub title: String,
    pub base: String,
    pub base_url: String,
    pub endpoint: String,
    pub sparql_http_method: SparqlHttpMethod,
    pub description: Option<String>,
    pub version: Option<String>,
    pub contacts: Option<String>,
    pub license: Option<String>,
    pub operations: Vec<Operation>,
}

/// The HTTP method used to pass the SPARQL query to the remote endpoint.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SparqlHttpMethod {
    Get,
    Post,
}

/// Parse one or more specification files, each into its own [`ApiConfig`],
/// in the order given.
///
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ApiConfig>, Error> {
    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        configs.push(build_one(&hashformat::read_file(path)?)?);
    }
    Ok(configs)
}

/// Parse one or more specification documents already read into memory,
/// each into its own [`ApiConfig`], in the order given.
///
pub fn load_str(docs: &[&str]) -> Result<Vec<ApiConfig>, Error> {
    docs.iter().map(|d| build_one(&hashformat::parse(d))).collect()
}

/// Parse a single document's records into one [`ApiConfig`]: the first
/// record is its header (`base`, `url`, `endpoint`, `method`, ...), every
/// subsequent record is one of its operations, scoped to this document's
/// own `base_url`/`endpoint`/`method`.
///
fn build_one(records: &[HashRecord]) -> Result<ApiConfig, Error> {
    let mut records = records.iter();
    let header = records
        .next()
        .ok_or_else(|| Error::config("specification document has no header record"))?;
    let base = header
        .get("base")
        .ok_or_else(|| Error::config("header record is missing '#base'"))?
        .to_string();
    let base_url = header
        .get("url")
        .ok_or_else(|| Error::config("header record is missing '#url'"))?
        .to_string();
    let endpoint = header
        .get("endpoint")
        .ok_or_else(|| Error::config("header record is missing '#endpoint'"))?
        .to_string();
    let sparql_http_method = match header.get("method").map(|m| m.trim().to_lowercase()) {
        Some(m) if m == "get" => SparqlHttpMethod::Get,
        _ => SparqlHttpMethod::Post,
    };

    let mut operations = Vec::new();
    for record in records {
        operations.push(build_operation(record, &base_url, &endpoint, sparql_http_method)?);
    }

    Ok(ApiConfig {
        title: header.get("title").unwrap_or("").to_string(),
        base,
        base_url,
        endpoint,
        sparql_http_method,
        description: header.get("description").map(str::to_string),
        version: header.get("version").map(str::to_string),
        contacts: header.get("contacts").map(str::to_string),
        license: header.get("license").map(str::to_string),
        operations,
    })
}

fn build_operation(
    record: &HashRecord,
    base_url: &str,
    endpoint: &str,
    sparql_http_method: SparqlHttpMethod,
) -> Result<Operation, Error> {
    let url_template = record
        .get("url")
        .ok_or_else(|| Error::config("operation record is missing '#url'"))?
        .to_string();
    let sparql = record
        .get("sparql")
        .ok_or_else(|| Error::config("operation record is missing '#sparql'"))?
        .to_string();
    let methods: Vec<String> = record
        .get("method")
        .ok_or_else(|| Error::config("operation record is missing '#method'"))?
        .split_whitespace()
        .map(|m| m.to_lowercase())
        .collect();

    let param_names: Vec<String> = PARAM_NAME
        .captures_iter(&url_template)
        .map(|c| c.get(1).unwrap().as_str().to_string())
        .collect();

    // Build the anchored route pattern by escaping the literal slices of
    // `base_url` + `url_template` and splicing in each `{name}`'s own
    // `(pattern)` group in between, so a `.` or other regex metacharacter
    // in either is matched literally rather than reinterpreted.
    let mut params = std::collections::HashMap::new();
    let mut pattern_str = regex::escape(base_url);
    let mut last_end = 0;
    for cap in PARAM_NAME.captures_iter(&url_template) {
        let whole = cap.get(0).unwrap();
        let name = cap.get(1).unwrap().as_str().to_string();
        pattern_str.push_str(&regex::escape(&url_template[last_end..whole.start()]));
        let spec = record
            .get(&name)
            .map(ParamSpec::parse)
            .unwrap_or_else(ParamSpec::default_any);
        pattern_str.push('(');
        pattern_str.push_str(&spec.pattern);
        pattern_str.push(')');
        params.insert(name, spec);
        last_end = whole.end();
    }
    pattern_str.push_str(&regex::escape(&url_template[last_end..]));
    let route_pattern = map_error!(Config, Regex::new(&format!("^{}$", pattern_str)))?;

    let field_types = record
        .get("field_type")
        .map(|decl| {
            FIELD_TYPE_RE
                .captures_iter(decl)
                .filter_map(|c| {
                    let ty = DataType::parse(c.get(1).unwrap().as_str())?;
                    Some(FieldType {
                        column: c.get(2).unwrap().as_str().to_string(),
                        data_type: ty,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Operation {
        url_template,
        route_pattern,
        param_names,
        params,
        methods,
        sparql,
        preprocess: record.get("preprocess").map(str::to_string),
        postprocess: record.get("postprocess").map(str::to_string),
        field_types,
        description: record.get("description").map(str::to_string),
        endpoint: endpoint.to_string(),
        sparql_http_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "#url /api/v1\n#base http://example.org\n#endpoint http://example.org/sparql\n#method get\n#title Demo\n\n#url /citations/{oci}\n#oci str([0-9]+-[0-9]+)\n#method get\n#sparql PREFIX x: <> SELECT * WHERE { ?s ?p [[oci]] }\n";

    #[test]
    fn parses_header_and_one_operation() {
        let configs = load_str(&[DOC]).unwrap();
        assert_eq!(configs.len(), 1);
        let config = &configs[0];
        assert_eq!(config.base_url, "/api/v1");
        assert_eq!(config.sparql_http_method, SparqlHttpMethod::Get);
        assert_eq!(config.operations.len(), 1);
        let op = &config.operations[0];
        assert_eq!(op.param_names, vec!["oci".to_string()]);
        assert!(op.route_pattern.is_match("/api/v1/citations/101108-2016"));
        assert!(!op.route_pattern.is_match("/api/v1/citations/not-numeric"));
        assert_eq!(op.endpoint, "http://example.org/sparql");
    }

    #[test]
    fn two_files_yield_two_independent_configs() {
        const OTHER: &str = "#url /api/v2\n#base http://example.org\n#endpoint http://example.org/sparql2\n#method post\n\n#url /works/{id}\n#id str([0-9]+)\n#method get\n#sparql SELECT * WHERE { ?s ?p [[id]] }\n";
        let configs = load_str(&[DOC, OTHER]).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].base_url, "/api/v1");
        assert_eq!(configs[1].base_url, "/api/v2");
        assert_eq!(configs[1].operations[0].endpoint, "http://example.org/sparql2");
    }

    #[test]
    fn missing_required_header_field_is_config_error() {
        let bad = "#url /api/v1\n#base http://example.org\n";
        let err = load_str(&[bad]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_operation_method_is_config_error() {
        let bad = "#url /api/v1\n#base http://example.org\n#endpoint http://example.org/sparql\n#method get\n\n#url /citations/{oci}\n#sparql SELECT * WHERE { ?s ?p [[oci]] }\n";
        let err = load_str(&[bad]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn param_spec_parses_type_and_pattern() {
        let spec = ParamSpec::parse("str([0-9]+-[0-9]+)");
        assert_eq!(spec.data_type, Some(DataType::Str));
        assert_eq!(spec.pattern, "[0-9]+-[0-9]+");
    }

    #[test]
    fn literal_dot_in_base_url_is_matched_literally_not_as_a_wildcard() {
        let doc = "#url /api/v1.0\n#base http://example.org\n#endpoint http://example.org/sparql\n#method get\n\n#url /citations\n#method get\n#sparql SELECT * WHERE { ?s ?p ?o }\n";
        let configs = load_str(&[doc]).unwrap();
        let op = &configs[0].operations[0];
        assert!(op.route_pattern.is_match("/api/v1.0/citations"));
        // A literal dot must not act as "any character": "v1X0" must not match.
        assert!(!op.route_pattern.is_match("/api/v1X0/citations"));
    }
}
