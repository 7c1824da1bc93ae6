use ::url::form_urlencoded;

use super::multiaddr::validate_http_multiaddr;
use crate::data::{DagScope, Protocol, RetrievalRequest};
use crate::error::MultiaddrError;

/// Build the retrieval URL for a request.
///
/// HTTP providers are addressed directly through their trustless gateway.
/// Graphsync and bitswap providers are addressed with an `ipfs://`
/// indirection URL that names the transport and the provider multiaddr.
///
/// # Examples
///
/// ```
/// use spotcheck_fetch::{DagScope, Protocol, RetrievalRequest, build_url};
///
/// let request = RetrievalRequest {
///     protocol: Protocol::Http,
///     address: "/dns/frisbii.fly.dev/tcp/443/https".into(),
///     cid: "bafyroot".into(),
///     dag_scope: DagScope::Block,
///     entity_bytes_range: None,
/// };
/// assert_eq!(
///     build_url(&request).unwrap(),
///     "https://frisbii.fly.dev/ipfs/bafyroot?dag-scope=block"
/// );
/// ```
pub fn build_url(request: &RetrievalRequest) -> Result<String, MultiaddrError> {
    let mut url = match request.protocol {
        Protocol::Http => {
            let base = validate_http_multiaddr(&request.address)?.base_url();
            format!("{base}/ipfs/{}?dag-scope={}", request.cid, request.dag_scope)
        }
        Protocol::Graphsync | Protocol::Bitswap => {
            let providers: String =
                form_urlencoded::byte_serialize(request.address.as_bytes()).collect();
            format!(
                "ipfs://{}?dag-scope={}&protocols={}&providers={}",
                request.cid, request.dag_scope, request.protocol, providers
            )
        }
    };

    if request.dag_scope == DagScope::Entity
        && let Some(range) = request.entity_bytes_range
    {
        let range = range.to_string();
        url.push_str("&entity-bytes=");
        match request.protocol {
            Protocol::Http => url.push_str(&range),
            // Query values of indirection URLs are form encoded.
            Protocol::Graphsync | Protocol::Bitswap => {
                url.extend(form_urlencoded::byte_serialize(range.as_bytes()))
            }
        }
    }

    Ok(url)
}
