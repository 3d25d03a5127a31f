//! An HTTP client that refuses to talk to unsafe hosts.

use std::sync::Arc;

use http::StatusCode;
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use crate::hostguard::{HostPolicy, Resolver, should_contact_host};

const USER_AGENT: &str = concat!("imageguard/", env!("CARGO_PKG_VERSION"));

/// Middleware that checks each request's host against a [`HostPolicy`]
/// before the request is sent.
pub struct RestrictedTransport {
    policy: HostPolicy,
    resolver: Arc<dyn Resolver>,
}

impl RestrictedTransport {
    pub fn new(policy: HostPolicy, resolver: Arc<dyn Resolver>) -> Self {
        Self { policy, resolver }
    }
}

#[async_trait::async_trait]
impl reqwest_middleware::Middleware for RestrictedTransport {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let host = req.url().host_str().unwrap_or_default().to_string();

        if let Err(err) = should_contact_host(&host, &self.policy, self.resolver.as_ref()).await {
            tracing::warn!("refusing to contact {host}: {err}");
            return Err(reqwest_middleware::Error::Middleware(err.into()));
        }

        next.run(req, extensions).await
    }
}

/// Builds an HTTP client whose every request goes through a
/// [`RestrictedTransport`].
pub fn restricted_client(
    policy: HostPolicy,
    resolver: Arc<dyn Resolver>,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    Ok(ClientBuilder::new(client)
        .with(RestrictedTransport::new(policy, resolver))
        .build())
}

/// Pings a registry's v2 API root, returning the response status.
///
/// Any HTTP status counts as reachable; registries that need
/// authentication answer `401`.
pub async fn ping_registry(
    client: &ClientWithMiddleware,
    registry: &str,
    insecure: bool,
) -> reqwest_middleware::Result<StatusCode> {
    let scheme = if insecure { "http" } else { "https" };
    let url = format!("{scheme}://{registry}/v2/");

    tracing::debug!("probing {url}");
    let resp = client.get(&url).send().await?;

    Ok(resp.status())
}
