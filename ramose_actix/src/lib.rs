//! (Ab)use `actix-web` as the HTTP adapter for a [`ramose::Engine`].
//!
//! The engine itself is a pure, synchronous `execute(Request) -> Response`
//! function; this crate is the thin async shell around it that an operator
//! actually runs, mapping actix-web's request/response types onto
//! [`ramose::Request`]/[`ramose::Response`] and running the engine's one
//! blocking remote-fetch suspension point through [`actix_web::web::block`].
//!

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use ramose::{Engine, Request, Response};
use std::sync::Arc;

/// Wraps a [`Response`] so it can be returned directly from an actix-web
/// handler.
///
#[derive(Clone, Debug)]
pub struct AxResponse(Response);

impl AxResponse {
    pub fn new(resp: Response) -> Self {
        Self(resp)
    }
}

impl actix_web::Responder for AxResponse {
    type Body = actix_web::body::BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse {
        use actix_web::http::StatusCode;

        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status)
            .insert_header(("Content-Type", self.0.content_type.as_str()))
            .insert_header(("Access-Control-Allow-Origin", "*"))
            .insert_header(("Access-Control-Allow-Credentials", "true"))
            .body(self.0.body)
    }
}

/// Build the single catch-all handler that runs every request through
/// `engine`.
///
async fn handle(req: HttpRequest, data: web::Data<Arc<Engine>>) -> AxResponse {
    let method = req.method().as_str().to_string();
    let path = req.path().to_string();
    let query = req.query_string().trim_start_matches('?').to_string();
    let requested_format = requested_error_format(&query, req.headers().get("Accept"));

    let default_content_type = match requested_format {
        ErrorFormat::Csv => "text/csv",
        ErrorFormat::Json => "application/json",
    };
    let engine = data.get_ref().clone();
    let request = Request::new(method, path, query).with_default_content_type(default_content_type);
    let response = web::block(move || engine.execute(&request)).await;

    let response = match response {
        Ok(response) => response,
        Err(err) => Response::new(500, format!("internal error: {}", err), "text/plain"),
    };

    AxResponse::new(shape_error_body(response, requested_format))
}

#[derive(Clone, Copy)]
enum ErrorFormat {
    Csv,
    Json,
}

/// The format error bodies should be reshaped into: the `format` query
/// parameter if present, else `text/csv` when the client's `Accept` header
/// mentions csv, else JSON — matching the original webserver route's own
/// content-negotiation rule.
///
fn requested_error_format(query: &str, accept: Option<&actix_web::http::header::HeaderValue>) -> ErrorFormat {
    let format_param = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.into_owned());
    if let Some(fmt) = format_param {
        if fmt.contains("csv") {
            return ErrorFormat::Csv;
        }
        return ErrorFormat::Json;
    }
    if let Some(accept) = accept.and_then(|h| h.to_str().ok()) {
        if accept.contains("csv") {
            return ErrorFormat::Csv;
        }
    }
    ErrorFormat::Json
}

/// On a non-2xx response, replace the plain-text error message with a
/// small CSV or JSON document in the requested format, while a successful
/// response passes through untouched.
///
fn shape_error_body(response: Response, format: ErrorFormat) -> Response {
    if response.status / 100 == 2 {
        return response;
    }
    match format {
        ErrorFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            let _ = writer.write_record(["error", "message"]);
            let _ = writer.write_record([response.status.to_string().as_str(), response.body.as_str()]);
            let body = writer
                .into_inner()
                .ok()
                .and_then(|b| String::from_utf8(b).ok())
                .unwrap_or_else(|| response.body.clone());
            Response::new(response.status, body, "text/csv")
        }
        ErrorFormat::Json => {
            let body = serde_json::json!({ "error": response.status, "message": response.body }).to_string();
            Response::new(response.status, body, "application/json")
        }
    }
}

/// Serve `engine` on `host:port` until interrupted. Blocks the calling
/// thread; callers that already run inside an async runtime should instead
/// build their own `App`/`HttpServer` using [`handle`]'s pattern directly.
///
pub fn serve(engine: Arc<Engine>, host: &str, port: u16) -> std::io::Result<()> {
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(engine.clone()))
                .default_service(web::route().to(handle))
        })
        .bind((host, port))?
        .run()
        .await
    })
}
