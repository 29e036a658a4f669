//! The Route Table: the ordered list of compiled operation routes built
//! once from one or more [`ApiConfig`]s and never mutated afterward.
//!

use crate::config::{ApiConfig, Operation};
use crate::Error;

/// An immutable, ordered table of compiled operation routes, possibly
/// drawn from several specification documents (each scoped by its own
/// `base_url`, so two documents may use different base URLs and SPARQL
/// endpoints side by side).
///
#[derive(Debug)]
pub struct RouteTable {
    operations: Vec<Operation>,
}

/// The outcome of matching a request path against the table, carrying
/// enough to distinguish "no such operation" from "operation exists, wrong
/// method" the way the specification's failure classification requires.
///
pub enum Matched<'a> {
    /// `path` matched no operation's route pattern at all.
    NotFound,
    /// `path` matched an operation's route, but not for the requested
    /// method.
    MethodNotAllowed,
    /// `path` matched, and `method` is one of the operation's accepted
    /// methods. Carries the matched operation and its captured path
    /// parameter values, in `param_names` order.
    Found {
        operation: &'a Operation,
        captures: Vec<String>,
    },
}

impl RouteTable {
    /// Build the table from one or more parsed configurations, flattened in
    /// document order. Operations are tried in that order and the first
    /// whose route pattern matches wins, matching the original
    /// implementation's linear scan over its ordered operation dictionary.
    ///
    pub fn build(configs: &[ApiConfig]) -> Result<Self, Error> {
        let operations = configs.iter().flat_map(|c| c.operations.iter().cloned()).collect();
        Ok(Self { operations })
    }

    /// Match `path` (no query string) against the table.
    ///
    pub fn best_match(&self, path: &str, method: &str) -> Matched<'_> {
        let method = method.to_lowercase();
        for operation in &self.operations {
            if let Some(caps) = operation.route_pattern.captures(path) {
                if !operation.methods.iter().any(|m| m == &method) {
                    return Matched::MethodNotAllowed;
                }
                let captures = (1..caps.len())
                    .map(|i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Matched::Found { operation, captures };
            }
        }
        Matched::NotFound
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;

    const DOC: &str = "#url /api/v1\n#base http://example.org\n#endpoint http://example.org/sparql\n#method get\n\n#url /citations/{oci}\n#oci str([0-9]+-[0-9]+)\n#method get\n#sparql SELECT * WHERE { ?s ?p [[oci]] }\n";

    #[test]
    fn matches_path_and_captures_param() {
        let configs = load_str(&[DOC]).unwrap();
        let table = RouteTable::build(&configs).unwrap();
        match table.best_match("/api/v1/citations/101108-2016", "get") {
            Matched::Found { captures, .. } => {
                assert_eq!(captures, vec!["101108-2016".to_string()]);
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn wrong_method_is_method_not_allowed() {
        let configs = load_str(&[DOC]).unwrap();
        let table = RouteTable::build(&configs).unwrap();
        assert!(matches!(
            table.best_match("/api/v1/citations/101108-2016", "post"),
            Matched::MethodNotAllowed
        ));
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let configs = load_str(&[DOC]).unwrap();
        let table = RouteTable::build(&configs).unwrap();
        assert!(matches!(table.best_match("/api/v1/nope", "get"), Matched::NotFound));
    }

    #[test]
    fn two_documents_with_different_base_urls_both_route() {
        const OTHER: &str = "#url /api/v2\n#base http://example.org\n#endpoint http://example.org/sparql2\n#method post\n\n#url /works/{id}\n#id str([0-9]+)\n#method get\n#sparql SELECT * WHERE { ?s ?p [[id]] }\n";
        let configs = load_str(&[DOC, OTHER]).unwrap();
        let table = RouteTable::build(&configs).unwrap();
        assert!(matches!(
            table.best_match("/api/v1/citations/101108-2016", "get"),
            Matched::Found { .. }
        ));
        assert!(matches!(table.best_match("/api/v2/works/42", "get"), Matched::Found { .. }));
    }
}
