use std::fmt;
use std::str::FromStr;

use crate::error::MultiaddrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    Ip4,
    Ip6,
    Dns,
    Dns4,
    Dns6,
}

impl FromStr for HostType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip4" => Ok(HostType::Ip4),
            "ip6" => Ok(HostType::Ip6),
            "dns" => Ok(HostType::Dns),
            "dns4" => Ok(HostType::Dns4),
            "dns6" => Ok(HostType::Dns6),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> &'static str {
        match self {
            Scheme::Http => "80",
            Scheme::Https => "443",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A validated `/<host-type>/<host>/tcp/<port>/<http|https>` multiaddr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMultiaddr {
    pub host_type: HostType,
    pub host:      String,
    pub port:      String,
    pub scheme:    Scheme,
}

impl HttpMultiaddr {
    /// `scheme://host[:port]`, omitting the port when it is the scheme default.
    pub fn base_url(&self) -> String {
        let host = match self.host_type {
            HostType::Ip6 => format!("[{}]", self.host),
            _ => self.host.clone(),
        };

        if self.port == self.scheme.default_port() {
            format!("{}://{}", self.scheme, host)
        } else {
            format!("{}://{}:{}", self.scheme, host, self.port)
        }
    }
}

impl FromStr for HttpMultiaddr {
    type Err = MultiaddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { validate_http_multiaddr(s) }
}

/// Validate a provider multiaddr for the HTTP transport.
///
/// Segments are checked in order: host type, transport, scheme, then any
/// trailing segments. A missing segment is reported as an empty token.
///
/// # Examples
///
/// ```
/// use spotcheck_fetch::validate_http_multiaddr;
///
/// let addr = validate_http_multiaddr("/dns/frisbii.fly.dev/tcp/443/https").unwrap();
/// assert_eq!(addr.base_url(), "https://frisbii.fly.dev");
/// assert!(validate_http_multiaddr("/ip4/127.0.0.1/udp/90").is_err());
/// ```
pub fn validate_http_multiaddr(addr: &str) -> Result<HttpMultiaddr, MultiaddrError> {
    let parts: Vec<&str> = addr.split('/').skip(1).collect();
    let part = |index: usize| parts.get(index).copied().unwrap_or("");

    let host_type = part(0)
        .parse::<HostType>()
        .map_err(|()| MultiaddrError::UnsupportedHostType {
            addr:      addr.to_string(),
            host_type: part(0).to_string(),
        })?;

    if part(2) != "tcp" {
        return Err(MultiaddrError::UnsupportedProto {
            addr:     addr.to_string(),
            protocol: part(2).to_string(),
        });
    }

    let scheme = match part(4) {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(MultiaddrError::UnsupportedScheme {
                addr:   addr.to_string(),
                scheme: other.to_string(),
            });
        }
    };

    if parts.len() > 5 {
        return Err(MultiaddrError::TooManyParts {
            addr: addr.to_string(),
        });
    }

    Ok(HttpMultiaddr {
        host_type,
        host: part(1).to_string(),
        port: part(3).to_string(),
        scheme,
    })
}
