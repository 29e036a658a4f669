//! `ramose`: a declarative REST-over-SPARQL API manager. One or more
//! specification documents written in Hash-Format each declare a set of
//! REST operations, every one mapping a URL pattern onto a parameterized
//! SPARQL query against a remote endpoint; this crate compiles them once
//! into a [`route::RouteTable`] and exposes a single pure
//! [`executor::Engine`] that turns a request into a response by running it
//! through the Operation Executor pipeline.
//!

pub mod addon;
pub mod config;
pub mod error;
pub mod executor;
pub mod hashformat;
pub mod http;
pub mod remote;
pub mod route;
pub mod table;
pub mod transform;
pub mod types;

pub use addon::Addon;
pub use config::{ApiConfig, Operation, ParamSpec, SparqlHttpMethod};
pub use error::Error;
pub use executor::Engine;
pub use http::{Request, Response};
pub use remote::{HttpRemoteClient, RemoteClient, RemoteResponse};
pub use route::RouteTable;
pub use table::{TypedCell, TypedTable};
pub use transform::QueryParams;
pub use types::{DataType, TypedValue};
