//! The `ramose` operator CLI: load one or more Hash-Format specification
//! documents and either run a single call against them, or serve them over
//! HTTP.
//!

use clap::Parser;
use ramose::{config, Engine, HttpRemoteClient, Request};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// The 'Restful API Manager Over SPARQL Endpoints' (a.k.a. 'RAMOSE') is an
/// application that allows one to expose a Restful API interface,
/// according to a particular specification document, to interact with a
/// SPARQL endpoint.
#[derive(Parser, Debug)]
#[command(name = "ramose")]
struct Cli {
    /// A file in Hash Format containing the specification of the API. May
    /// be given more than once; each file is its own independent document,
    /// with its own base URL and SPARQL endpoint.
    #[arg(short, long = "spec", required = true)]
    spec: Vec<PathBuf>,

    /// The method to use to make a request to the API.
    #[arg(short, long, default_value = "get")]
    method: String,

    /// The URL to call for querying the API.
    #[arg(short, long)]
    call: Option<String>,

    /// The format in which to get the response.
    #[arg(short, long, default_value = "application/json")]
    format: String,

    /// Generate the HTML documentation of the API. Not implemented in this
    /// build; an external documentation generator is expected to consume
    /// the specification document directly instead.
    #[arg(short, long)]
    doc: bool,

    /// A file where to store the response.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The host:port where to run a webserver exposing the API.
    #[arg(short, long)]
    webserver: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let configs = match config::load_files(&cli.spec) {
        Ok(configs) => configs,
        Err(err) => {
            log::error!("failed to load specification: {}", err);
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let operation_count: usize = configs.iter().map(|c| c.operations.len()).sum();
    log::info!("loaded {} operation(s) from {} file(s)", operation_count, cli.spec.len());

    if cli.doc {
        eprintln!("--doc is not implemented in this build");
        return ExitCode::from(2);
    }

    let remote = match HttpRemoteClient::new() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let engine = match Engine::new(configs, ramose::Addon::new(), Box::new(remote)) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Some(webserver) = &cli.webserver {
        let (host, port) = match webserver.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), p.parse().unwrap_or(8080)),
            None => ("127.0.0.1".to_string(), 8080),
        };
        log::info!("serving on {}:{}", host, port);
        if let Err(err) = ramose_actix::serve(Arc::new(engine), &host, port) {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    let Some(call) = &cli.call else {
        eprintln!("--call is required unless --webserver is given");
        return ExitCode::FAILURE;
    };

    let (path, query) = call.split_once('?').unwrap_or((call.as_str(), ""));
    let request = Request::new(cli.method.clone(), path.to_string(), query.to_string())
        .with_default_content_type(cli.format.clone());
    let response = engine.execute(&request);

    match &cli.output {
        Some(path) => {
            if let Err(err) = fs::write(path, &response.body) {
                eprintln!("failed to write output file: {}", err);
                return ExitCode::FAILURE;
            }
        }
        None => {
            println!(
                "# Response HTTP code: {}\n# Body:\n{}\n# Content-type: {}",
                response.status, response.body, response.content_type,
            );
        }
    }

    if response.status == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
