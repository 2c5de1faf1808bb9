use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use ureq::{Agent, http};

/// Server-side statuses the transport retries on its own.
const TRANSIENT_STATUSES: &[u16] = &[500, 502, 503];

/// Total attempts per request, the first one included.
const MAX_ATTEMPTS: u32 = 3;

const USER_AGENT: &str = concat!("pcoip-ls-cli/", env!("CARGO_PKG_VERSION"));

/// A fully-read HTTP response: status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The blocking HTTP operations the license client needs. Keeping
/// this a trait lets the 401 re-authentication policy in `client` run
/// against a scripted transport in tests.
pub trait Transport {
    fn post_json(&self, url: &str, body: &Value) -> Result<Reply>;
    fn get(&self, url: &str, bearer: &str, params: &[(&str, &str)]) -> Result<Reply>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_json(&self, url: &str, body: &Value) -> Result<Reply> {
        (**self).post_json(url, body)
    }

    fn get(&self, url: &str, bearer: &str, params: &[(&str, &str)]) -> Result<Reply> {
        (**self).get(url, bearer, params)
    }
}

pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn post_json(&self, url: &str, body: &Value) -> Result<Reply> {
        let bytes = serde_json::to_vec(body).context("failed to serialize request")?;
        with_transient_retry(|| {
            let resp = self
                .agent
                .post(url)
                .header("User-Agent", USER_AGENT)
                .header("Content-Type", "application/json")
                .send(&bytes)
                .context("request failed")?;
            read_reply(resp)
        })
        .with_context(|| format!("POST {url}"))
    }

    fn get(&self, url: &str, bearer: &str, params: &[(&str, &str)]) -> Result<Reply> {
        with_transient_retry(|| {
            let mut req = self
                .agent
                .get(url)
                .header("Authorization", bearer)
                .header("User-Agent", USER_AGENT);
            for (key, value) in params {
                req = req.query(*key, *value);
            }
            let resp = req.call().context("request failed")?;
            read_reply(resp)
        })
        .with_context(|| format!("GET {url}"))
    }
}

/// Runs `send`, re-issuing the request while the reply status is a
/// transient 5xx and the attempt budget allows. The last reply is
/// returned either way; callers see the final status, not the
/// attempt count.
fn with_transient_retry(send: impl Fn() -> Result<Reply>) -> Result<Reply> {
    let mut reply = send()?;
    let mut attempts = 1;
    while TRANSIENT_STATUSES.contains(&reply.status) && attempts < MAX_ATTEMPTS {
        reply = send()?;
        attempts += 1;
    }
    Ok(reply)
}

fn read_reply(mut resp: http::Response<ureq::Body>) -> Result<Reply> {
    let status = resp.status().as_u16();
    let body = resp
        .body_mut()
        .read_to_string()
        .context("failed to read response body")?;
    Ok(Reply { status, body })
}
