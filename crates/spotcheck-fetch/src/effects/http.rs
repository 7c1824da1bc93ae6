use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line and streaming body of a response.
pub struct HttpResponse<E> {
    pub status: u16,
    pub body:   BoxStream<'static, Result<Bytes, E>>,
}

impl<E> HttpResponse<E> {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

impl<E> fmt::Debug for HttpResponse<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// The minimal interface every network collaborator goes through: CAR
/// retrievals, round documents, index lookups and JSON-RPC calls.
/// Implementations return any status code as a response; only failures to
/// obtain a response at all are errors.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for HTTP operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a GET request and return the response with a streaming body.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;

    /// Issue a POST request with the given body.
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    type Error = C::Error;

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send {
        (**self).get(url, headers)
    }

    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> impl Future<Output = Result<HttpResponse<Self::Error>, Self::Error>> + Send {
        (**self).post(url, headers, body)
    }
}

/// Read a whole response body into memory.
pub async fn collect_body<E>(mut body: BoxStream<'static, Result<Bytes, E>>) -> Result<Vec<u8>, E> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}

/// Render an error together with its `source()` chain.
///
/// Connector failures usually carry the useful text ("dns error",
/// "tcp connect error") several levels down the chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;

    /// Production HTTP client implementation using reqwest.
    ///
    /// `ipfs://` indirection URLs are sent to the configured gateway as
    /// `{gateway}/ipfs/...`. Without a gateway they fail like any other
    /// unsupported URL.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client:       reqwest::Client,
        ipfs_gateway: Option<String>,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("spotcheck/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self::with_client(client))
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self {
                client,
                ipfs_gateway: None,
            }
        }

        pub fn ipfs_gateway(mut self, gateway: impl Into<String>) -> Self {
            self.ipfs_gateway = Some(gateway.into());
            self
        }

        /// The URL actually requested for `url`.
        pub fn request_url(&self, url: &str) -> String {
            match (&self.ipfs_gateway, url.strip_prefix("ipfs://")) {
                (Some(gateway), Some(rest)) => {
                    format!("{}/ipfs/{rest}", gateway.trim_end_matches('/'))
                }
                _ => url.to_string(),
            }
        }

        fn with_headers(
            mut request: reqwest::RequestBuilder,
            headers: &[(String, String)],
        ) -> reqwest::RequestBuilder {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
            request
        }

        fn into_response(response: reqwest::Response) -> HttpResponse<reqwest::Error> {
            HttpResponse {
                status: response.status().as_u16(),
                body:   Box::pin(response.bytes_stream()),
            }
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<HttpResponse<Self::Error>, Self::Error> {
            let request = Self::with_headers(self.client.get(self.request_url(url)), headers);
            let response = request.send().await?;
            Ok(Self::into_response(response))
        }

        async fn post(
            &self,
            url: &str,
            headers: &[(String, String)],
            body: Bytes,
        ) -> Result<HttpResponse<Self::Error>, Self::Error> {
            let request = Self::with_headers(self.client.post(url), headers).body(body);
            let response = request.send().await?;
            Ok(Self::into_response(response))
        }
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|e| e as _)
        }
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer(
                "client error (Connect)",
                Some(Box::new(Layer("tcp connect error", None))),
            ))),
        );
        assert_eq!(
            error_chain(&err),
            "error sending request: client error (Connect): tcp connect error"
        );
    }

    #[test]
    fn error_chain_skips_repeated_text() {
        let err = Layer("dns error: no such host", Some(Box::new(Layer("no such host", None))));
        assert_eq!(error_chain(&err), "dns error: no such host");
    }

    #[tokio::test]
    async fn collect_body_concatenates_chunks() {
        let body: BoxStream<'static, Result<Bytes, std::io::Error>> = Box::pin(futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]));
        assert_eq!(collect_body(body).await.unwrap(), b"abcd");
    }
}
