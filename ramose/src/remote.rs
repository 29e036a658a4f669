//! The remote-fetch abstraction: the one outbound HTTP call an operation
//! makes to its configured SPARQL endpoint.
//!

use crate::config::SparqlHttpMethod;
use crate::Error;
use std::time::Duration;

/// The remote endpoint's raw response: status code, decoded UTF-8 body,
/// and (on non-2xx) the reason phrase used to build the error message.
///
#[derive(Clone, Debug)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
    pub reason: String,
}

/// Abstracts the one blocking network call the Operation Executor makes,
/// so the pipeline can be exercised with a fake endpoint in tests without
/// opening a socket.
///
pub trait RemoteClient: Send + Sync {
    fn fetch(
        &self,
        endpoint_url: &str,
        method: SparqlHttpMethod,
        query: &str,
    ) -> Result<RemoteResponse, Error>;
}

/// A [`RemoteClient`] backed by a shared [`reqwest::blocking::Client`], one
/// per process, matching the specification's "one shared HTTP client"
/// concurrency note.
///
pub struct HttpRemoteClient {
    client: reqwest::blocking::Client,
}

impl HttpRemoteClient {
    pub fn new() -> Result<Self, Error> {
        let client = map_error!(
            Internal,
            reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
        )?;
        Ok(Self { client })
    }
}

impl Default for HttpRemoteClient {
    fn default() -> Self {
        Self::new().expect("building the default reqwest client should never fail")
    }
}

impl RemoteClient for HttpRemoteClient {
    fn fetch(
        &self,
        endpoint_url: &str,
        method: SparqlHttpMethod,
        query: &str,
    ) -> Result<RemoteResponse, Error> {
        let response = match method {
            SparqlHttpMethod::Get => {
                let url = format!("{}?query={}", endpoint_url, urlencoding::encode(query));
                self.client.get(&url).header("Accept", "text/csv").send()
            }
            SparqlHttpMethod::Post => self
                .client
                .post(endpoint_url)
                .header("Accept", "text/csv")
                .header("Content-Type", "application/sparql-query")
                .body(query.to_string())
                .send(),
        };

        let response = response.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::internal(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let body = map_error!(Internal, response.text())?;

        Ok(RemoteResponse { status, body, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeClient {
        status: u16,
        body: String,
    }

    impl RemoteClient for FakeClient {
        fn fetch(&self, _: &str, _: SparqlHttpMethod, _: &str) -> Result<RemoteResponse, Error> {
            Ok(RemoteResponse {
                status: self.status,
                body: self.body.clone(),
                reason: "OK".to_string(),
            })
        }
    }

    #[test]
    fn fake_client_satisfies_the_trait() {
        let fake = FakeClient { status: 200, body: "id\n1\n".to_string() };
        let resp = fake.fetch("http://example.org", SparqlHttpMethod::Get, "SELECT *").unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "id\n1\n");
    }
}
