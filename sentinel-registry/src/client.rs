//! Registry HTTP client: token acquisition, paginated tag listing, manifest HEAD.
//!
//! A single `Clone`-able struct wrapping one process-wide `reqwest::Client`, a `moka` token
//! cache, and an `arc-swap`'d credential map, built directly against the Docker Registry v2
//! HTTP API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use moka::future::Cache;
use reqwest::RequestBuilder;
use reqwest::header::{ACCEPT, HeaderMap};
use sentinel_core::Credential;
use serde::Deserialize;
use tracing::warn;

use crate::ratelimit::{RateLimitTracker, canonical_host};

const DOCKER_HUB_AUTH_URL: &str = "https://auth.docker.io/token";
const DOCKER_HUB_DATA_PLANE_HOST: &str = "registry-1.docker.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TAG_PAGES: u32 = 10;
const TAG_PAGE_SIZE: usize = 1000;
const DOCKER_CONTENT_DIGEST_HEADER: &str = "docker-content-digest";

/// Docker and OCI manifest/index media types, in descending preference order.
const ACCEPT_MANIFEST_TYPES: &str = "application/vnd.oci.image.index.v1+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.docker.distribution.manifest.v2+json";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Reqwest(#[from] reqwest::Error),
    EmptyToken,
    MissingDigestHeader,
    RateLimited,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
struct Token {
    value: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct TagsListResponse {
    #[serde(default)]
    tags: Vec<String>,
}

pub struct ManifestHead {
    pub digest: String,
    pub headers: HeaderMap,
}

#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    token_cache: Cache<String, Token>,
    credentials: Arc<ArcSwap<BTreeMap<String, Credential>>>,
    tracker: RateLimitTracker,
    scheme: &'static str,
}

impl RegistryClient {
    pub fn new(tracker: RateLimitTracker) -> Result<Self, Error> {
        Self::with_scheme(tracker, "https")
    }

    /// Data-plane scheme override for driving the client against an in-process mock server in
    /// tests; production always goes through [`RegistryClient::new`].
    #[cfg(test)]
    pub(crate) fn with_scheme(tracker: RateLimitTracker, scheme: &'static str) -> Result<Self, Error> {
        Self::build(tracker, scheme)
    }

    #[cfg(not(test))]
    fn with_scheme(tracker: RateLimitTracker, scheme: &'static str) -> Result<Self, Error> {
        Self::build(tracker, scheme)
    }

    fn build(tracker: RateLimitTracker, scheme: &'static str) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let token_cache = Cache::builder().max_capacity(10_000).build();
        Ok(RegistryClient {
            http,
            token_cache,
            credentials: Arc::new(ArcSwap::from_pointee(BTreeMap::new())),
            tracker,
            scheme,
        })
    }

    pub fn set_credentials(&self, credentials: BTreeMap<String, Credential>) {
        self.credentials.store(Arc::new(credentials));
    }

    fn credential_for(&self, host: &str) -> Option<Credential> {
        let host = canonical_host(host);
        self.credentials.load().get(&host).cloned()
    }

    /// Only Docker Hub uses bearer tokens here;
    /// other registries fall back to HTTP Basic from the credential store.
    async fn token_for(&self, host: &str, repo: &str) -> Result<Option<String>, Error> {
        if canonical_host(host) != "docker.io" {
            return Ok(None);
        }

        let key = format!("{host}/{repo}");
        if let Some(token) = self.token_cache.get(&key).await {
            return Ok(Some(token.value));
        }

        let (ok, wait) = self.tracker.can_proceed(host, 2).await;
        if !ok {
            warn!(host, ?wait, "rate limit admission denied for token fetch");
            return Err(Error::RateLimited);
        }

        let scope = format!("repository:{repo}:pull");
        let mut req = self
            .http
            .get(DOCKER_HUB_AUTH_URL)
            .query(&[("service", "registry.docker.io"), ("scope", &scope)]);
        if let Some(cred) = self.credential_for(host) {
            req = req.basic_auth(cred.username, Some(cred.secret));
        }

        let res = req.send().await?;
        self.tracker.record(host, res.headers()).await;
        let body: TokenResponse = res.json().await?;
        if body.token.is_empty() {
            return Err(Error::EmptyToken);
        }

        self.token_cache
            .insert(key, Token { value: body.token.clone() })
            .await;
        Ok(Some(body.token))
    }

    fn authorize(&self, req: RequestBuilder, host: &str, token: &Option<String>) -> RequestBuilder {
        if let Some(token) = token {
            req.bearer_auth(token)
        } else if let Some(cred) = self.credential_for(host) {
            req.basic_auth(cred.username, Some(cred.secret))
        } else {
            req
        }
    }

    /// Paginated via `last=`, bounded to
    /// `MAX_TAG_PAGES` pages (a registry that doesn't page in blocks of
    /// exactly 1000 will under-read; preserved deliberately).
    pub async fn list_tags(&self, host: &str, repo: &str) -> Result<Vec<String>, Error> {
        let data_host = data_plane_host(host);
        let token = self.token_for(host, repo).await?;

        let mut tags = Vec::new();
        let mut last: Option<String> = None;

        for _ in 0..MAX_TAG_PAGES {
            let (ok, wait) = self.tracker.can_proceed(host, 2).await;
            if !ok {
                warn!(host, ?wait, "rate limit admission denied for tag listing");
                break;
            }

            let url = match &last {
                Some(last) => format!("{}://{data_host}/v2/{repo}/tags/list?last={last}", self.scheme),
                None => format!("{}://{data_host}/v2/{repo}/tags/list", self.scheme),
            };
            let req = self.authorize(self.http.get(&url), host, &token);
            let res = req.send().await?;
            self.tracker.record(host, res.headers()).await;
            let body: TagsListResponse = res.json().await?;

            let page_len = body.tags.len();
            last = body.tags.last().cloned();
            tags.extend(body.tags);

            if page_len < TAG_PAGE_SIZE {
                break;
            }
        }

        Ok(tags)
    }

    /// Resolves the content digest of `repo:tag` via an unauthenticated-body HEAD request.
    pub async fn head_manifest(&self, host: &str, repo: &str, tag: &str) -> Result<ManifestHead, Error> {
        let data_host = data_plane_host(host);
        let token = self.token_for(host, repo).await?;

        let url = format!("{}://{data_host}/v2/{repo}/manifests/{tag}", self.scheme);
        let req = self
            .authorize(self.http.head(&url), host, &token)
            .header(ACCEPT, ACCEPT_MANIFEST_TYPES);
        let res = req.send().await?;
        self.tracker.record(host, res.headers()).await;

        let digest = res
            .headers()
            .get(DOCKER_CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(Error::MissingDigestHeader)?;

        Ok(ManifestHead {
            digest,
            headers: res.headers().clone(),
        })
    }
}

fn data_plane_host(host: &str) -> String {
    if canonical_host(host) == "docker.io" {
        DOCKER_HUB_DATA_PLANE_HOST.to_string()
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn mock_host(server: &MockServer) -> String {
        server.uri().trim_start_matches("http://").to_string()
    }

    #[tokio::test]
    async fn list_tags_stops_short_of_a_full_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/acme/widget/tags/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tags": ["1.0.0", "1.1.0"]
            })))
            .mount(&server)
            .await;

        let client = RegistryClient::with_scheme(RateLimitTracker::new(), "http").unwrap();
        let tags = client.list_tags(&mock_host(&server), "acme/widget").await.unwrap();
        assert_eq!(tags, vec!["1.0.0".to_string(), "1.1.0".to_string()]);
    }

    #[tokio::test]
    async fn list_tags_follows_last_cursor_across_full_pages() {
        let server = MockServer::start().await;
        let page1: Vec<String> = (0..TAG_PAGE_SIZE).map(|i| format!("0.0.{i}")).collect();
        Mock::given(method("GET"))
            .and(path("/v2/acme/widget/tags/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tags": page1 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/acme/widget/tags/list"))
            .and(wiremock::matchers::query_param("last", format!("0.0.{}", TAG_PAGE_SIZE - 1).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tags": ["1.0.0"] })))
            .with_priority(1)
            .mount(&server)
            .await;

        let client = RegistryClient::with_scheme(RateLimitTracker::new(), "http").unwrap();
        let tags = client.list_tags(&mock_host(&server), "acme/widget").await.unwrap();
        assert_eq!(tags.len(), TAG_PAGE_SIZE + 1);
        assert_eq!(tags.last().unwrap(), "1.0.0");
    }

    #[tokio::test]
    async fn head_manifest_reads_digest_header() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/acme/widget/manifests/latest"))
            .respond_with(ResponseTemplate::new(200).insert_header(DOCKER_CONTENT_DIGEST_HEADER, "sha256:abc"))
            .mount(&server)
            .await;

        let client = RegistryClient::with_scheme(RateLimitTracker::new(), "http").unwrap();
        let head = client.head_manifest(&mock_host(&server), "acme/widget", "latest").await.unwrap();
        assert_eq!(head.digest, "sha256:abc");
    }

    #[tokio::test]
    async fn head_manifest_without_digest_header_errors() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/acme/widget/manifests/latest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = RegistryClient::with_scheme(RateLimitTracker::new(), "http").unwrap();
        let result = client.head_manifest(&mock_host(&server), "acme/widget", "latest").await;
        assert!(matches!(result, Err(Error::MissingDigestHeader)));
    }

    #[tokio::test]
    async fn credentials_are_sent_as_http_basic_for_non_docker_hub_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/acme/widget/tags/list"))
            .and(header("authorization", "Basic Ym9iOmh1bnRlcjI="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tags": [] })))
            .mount(&server)
            .await;

        let client = RegistryClient::with_scheme(RateLimitTracker::new(), "http").unwrap();
        let mut creds = BTreeMap::new();
        let host = mock_host(&server);
        creds.insert(
            host.clone(),
            Credential {
                id: host.clone(),
                registry: host.clone(),
                username: "bob".to_string(),
                secret: "hunter2".to_string(),
            },
        );
        client.set_credentials(creds);

        let tags = client.list_tags(&host, "acme/widget").await.unwrap();
        assert!(tags.is_empty());
    }
}
