//! Docker Hub digest resolution.

use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};

use crate::error::MonitorError;

const DEFAULT_AUTH_BASE: &str = "https://auth.docker.io";
const DEFAULT_REGISTRY_BASE: &str = "https://registry-1.docker.io";

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

/// Source of manifest digests for a repository/tag pair.
///
/// The production implementation is [`HubClient`]; tests substitute a mock.
pub trait DigestSource: Send + Sync {
    fn resolve_digest(
        &self,
        repository: &str,
        tag: &str,
    ) -> impl Future<Output = Result<String, MonitorError>> + Send;
}

/// Official Docker Hub namespace prefix for single-segment repositories.
pub fn normalize_repository(repository: &str) -> String {
    if repository.contains('/') {
        repository.to_owned()
    } else {
        format!("library/{repository}")
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// Docker Hub wire-dialect client: anonymous pull token, then a manifest GET
/// whose digest comes from the `Docker-Content-Digest` header.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    auth_base: String,
    registry_base: String,
}

impl HubClient {
    pub fn new() -> Result<Self, MonitorError> {
        Self::with_bases(DEFAULT_AUTH_BASE, DEFAULT_REGISTRY_BASE)
    }

    /// Client with overridden endpoints; lets tests point at a local server.
    pub fn with_bases(auth_base: &str, registry_base: &str) -> Result<Self, MonitorError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(15))
            .build()
            .context("build registry HTTP client")?;
        Ok(Self {
            http,
            auth_base: auth_base.trim_end_matches('/').to_owned(),
            registry_base: registry_base.trim_end_matches('/').to_owned(),
        })
    }

    async fn pull_token(&self, repository: &str) -> Result<String, MonitorError> {
        let url = format!(
            "{}/token?service=registry.docker.io&scope=repository:{}:pull",
            self.auth_base, repository
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("auth request for {repository}"))?;
        if !resp.status().is_success() {
            return Err(MonitorError::AuthRejected {
                repository: repository.to_owned(),
                status: resp.status().as_u16(),
            });
        }
        let auth: AuthResponse = resp
            .json()
            .await
            .with_context(|| format!("decode auth token for {repository}"))?;
        Ok(auth.token)
    }
}

impl DigestSource for HubClient {
    async fn resolve_digest(&self, repository: &str, tag: &str) -> Result<String, MonitorError> {
        let token = self.pull_token(repository).await?;
        let url = format!("{}/v2/{}/manifests/{}", self.registry_base, repository, tag);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", MANIFEST_ACCEPT)
            .send()
            .await
            .with_context(|| format!("manifest request for {repository}:{tag}"))?;
        if !resp.status().is_success() {
            return Err(MonitorError::ManifestRejected {
                repository: repository.to_owned(),
                tag: tag.to_owned(),
                status: resp.status().as_u16(),
            });
        }

        if let Some(digest) = resp.headers().get("Docker-Content-Digest") {
            let digest = digest
                .to_str()
                .context("non-ASCII Docker-Content-Digest header")?;
            return Ok(digest.to_owned());
        }

        // Registries that omit the header: hash the raw manifest body.
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("read manifest body for {repository}:{tag}"))?;
        let hash = Sha256::digest(&body);
        Ok(format!("sha256:{hash:x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn bare_repository_gets_library_prefix() {
        assert_eq!(normalize_repository("nginx"), "library/nginx");
        assert_eq!(normalize_repository("grafana/loki"), "grafana/loki");
    }

    async fn mock_auth(server: &MockServer, repository: &str) {
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param(
                "scope",
                format!("repository:{repository}:pull"),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "tok-123"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn digest_comes_from_response_header() {
        let server = MockServer::start().await;
        mock_auth(&server, "library/nginx").await;
        Mock::given(method("GET"))
            .and(path("/v2/library/nginx/manifests/latest"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Docker-Content-Digest", "sha256:abcd")
                    .set_body_string("{}"),
            )
            .mount(&server)
            .await;

        let client = HubClient::with_bases(&server.uri(), &server.uri()).unwrap();
        let digest = client.resolve_digest("library/nginx", "latest").await.unwrap();
        assert_eq!(digest, "sha256:abcd");
    }

    #[tokio::test]
    async fn missing_header_falls_back_to_body_hash() {
        let server = MockServer::start().await;
        mock_auth(&server, "library/nginx").await;
        Mock::given(method("GET"))
            .and(path("/v2/library/nginx/manifests/1.25"))
            .respond_with(ResponseTemplate::new(200).set_body_string("manifest-bytes"))
            .mount(&server)
            .await;

        let client = HubClient::with_bases(&server.uri(), &server.uri()).unwrap();
        let digest = client.resolve_digest("library/nginx", "1.25").await.unwrap();
        let expected = Sha256::digest(b"manifest-bytes");
        assert_eq!(digest, format!("sha256:{expected:x}"));
    }

    #[tokio::test]
    async fn manifest_error_is_typed() {
        let server = MockServer::start().await;
        mock_auth(&server, "library/gone").await;
        Mock::given(method("GET"))
            .and(path("/v2/library/gone/manifests/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HubClient::with_bases(&server.uri(), &server.uri()).unwrap();
        let err = client
            .resolve_digest("library/gone", "latest")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MonitorError::ManifestRejected { status: 404, .. }
        ));
    }
}
