use std::time::Duration;

use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;

use crate::transport::{Reply, Transport, UreqTransport};

/// Production license-compliance host, used when the caller supplies
/// a bare instance id.
pub const DEFAULT_HOST: &str = "https://teradici.compliance.flexnetoperations.com";

/// Instance id meaning "the account's default instance", used when the
/// caller supplies a full URL instead of an id.
pub const DEFAULT_INSTANCE: &str = "~";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters that must be percent-encoded in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'#').add(b'%').add(b'/').add(b'?');

fn encode_path(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

/// Where requests go. Resolved once at construction and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    instance_id: String,
}

impl Endpoint {
    /// A string carrying an HTTP scheme is a base URL, addressing the
    /// account's default instance; anything else is an instance id on
    /// the production host.
    pub fn resolve(uri_or_instance_id: &str) -> Self {
        if uri_or_instance_id.starts_with("http://") || uri_or_instance_id.starts_with("https://")
        {
            Self {
                base_url: uri_or_instance_id.trim_end_matches('/').to_string(),
                instance_id: DEFAULT_INSTANCE.to_string(),
            }
        } else {
            Self {
                base_url: DEFAULT_HOST.to_string(),
                instance_id: uri_or_instance_id.to_string(),
            }
        }
    }

    fn instance_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/1.0/instances/{}/{suffix}",
            self.base_url,
            encode_path(&self.instance_id)
        )
    }

    pub fn authorize_url(&self) -> String {
        self.instance_url("authorize")
    }

    pub fn features_url(&self) -> String {
        self.instance_url("features")
    }
}

#[derive(Deserialize)]
struct AuthorizeResponse {
    token: String,
}

/// Session manager for the license-compliance API. Holds the endpoint,
/// the credentials and the current bearer token; authenticates eagerly
/// at construction. Not safe for concurrent callers: a 401 racing a
/// re-authentication would clobber the token field.
pub struct LicenseClient<T = UreqTransport> {
    transport: T,
    endpoint: Endpoint,
    username: String,
    password: String,
    token: String,
}

impl<T> std::fmt::Debug for LicenseClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("token", &"[redacted]")
            .finish()
    }
}

impl LicenseClient<UreqTransport> {
    /// Connects over HTTPS and authenticates. A failed authentication
    /// fails construction; no half-initialized client is handed out.
    pub fn connect(
        uri_or_instance_id: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_transport(
            UreqTransport::new(timeout),
            uri_or_instance_id,
            username,
            password,
        )
    }
}

impl<T: Transport> LicenseClient<T> {
    pub fn with_transport(
        transport: T,
        uri_or_instance_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut client = Self {
            transport,
            endpoint: Endpoint::resolve(uri_or_instance_id),
            username: username.to_string(),
            password: password.to_string(),
            token: String::new(),
        };
        client.authenticate()?;
        Ok(client)
    }

    /// Obtains a fresh session token and stores it as the current one.
    /// This is the only place the token field is written.
    pub fn authenticate(&mut self) -> Result<String> {
        let body = json!({ "user": self.username, "password": self.password });
        let reply = self
            .transport
            .post_json(&self.endpoint.authorize_url(), &body)?;
        if reply.status != 200 {
            bail!(
                "Authentication Error: response code {}. Verify the license server URL \
                 or instance id, username and password and try again.",
                reply.status
            );
        }
        let parsed: AuthorizeResponse = serde_json::from_str(&reply.body)
            .context("authorize response did not carry a token")?;
        self.token = parsed.token;
        Ok(self.token.clone())
    }

    /// GET with the current bearer token attached. A 401 reply means
    /// the token expired: re-authenticate and re-issue the identical
    /// request exactly once, returning the second reply as-is (a
    /// repeat 401 included). Every authenticated operation must go
    /// through here rather than hitting the transport directly.
    pub fn get_authenticated(&mut self, url: &str, params: &[(&str, &str)]) -> Result<Reply> {
        let reply = self.send_get(url, params)?;
        if reply.status != 401 {
            return Ok(reply);
        }
        self.authenticate()?;
        self.send_get(url, params)
    }

    fn send_get(&self, url: &str, params: &[(&str, &str)]) -> Result<Reply> {
        let bearer = format!("Bearer {}", self.token);
        self.transport.get(url, &bearer, params)
    }

    /// The current session token.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
