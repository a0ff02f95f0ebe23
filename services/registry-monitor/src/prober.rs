//! Concurrent digest probe engine.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use lighthouse_proto::registry_monitor::{ImageInfo, ImageToUpdate};

use crate::cache::{DEFAULT_TTL, DigestCache};
use crate::hub::{DigestSource, normalize_repository};

/// Probe engine: one task per image sharing the digest source and cache.
/// Per-probe failures are logged and skipped; an empty result is success.
pub struct Prober<S> {
    source: Arc<S>,
    cache: Arc<DigestCache>,
}

impl<S: DigestSource + 'static> Prober<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            cache: Arc::new(DigestCache::new(DEFAULT_TTL)),
        }
    }

    /// Return the subset of `images` whose latest published digest differs
    /// from the current one.
    pub async fn check_updates(&self, images: Vec<ImageInfo>) -> Vec<ImageToUpdate> {
        let mut probes = JoinSet::new();
        for image in images {
            let source = Arc::clone(&self.source);
            let cache = Arc::clone(&self.cache);
            probes.spawn(async move { probe_one(source.as_ref(), &cache, image).await });
        }

        let mut updates = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "probe task panicked"),
            }
        }
        updates
    }
}

async fn probe_one<S: DigestSource>(
    source: &S,
    cache: &DigestCache,
    image: ImageInfo,
) -> Option<ImageToUpdate> {
    let repository = normalize_repository(&image.repository);

    let latest = match cache.get(&repository).await {
        Some(digest) => digest,
        None => match source.resolve_digest(&repository, "latest").await {
            Ok(digest) => {
                cache.insert(repository.clone(), digest.clone()).await;
                digest
            }
            Err(e) => {
                warn!(repository = %repository, error = %e, "skipping image: latest digest unavailable");
                return None;
            }
        },
    };

    // A caller that does not know the running digest gets it resolved from
    // its own tag, so drift on pinned tags is detected too.
    let current = if image.digest.is_empty() {
        match source.resolve_digest(&repository, &image.tag).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!(repository = %repository, tag = %image.tag, error = %e,
                      "skipping image: current digest unavailable");
                return None;
            }
        }
    } else {
        image.digest.clone()
    };

    if current == latest {
        debug!(repository = %repository, "image up to date");
        return None;
    }

    Some(ImageToUpdate {
        container_uid: image.container_uid,
        new_tag: format!("{}:latest", image.repository),
        description: format!(
            "update available for {}: current digest {}, latest digest {}",
            image.repository, current, latest
        ),
        timestamp: Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::MonitorError;

    struct StaticSource {
        digests: HashMap<(String, String), String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StaticSource {
        fn new(digests: &[(&str, &str, &str)]) -> Self {
            Self {
                digests: digests
                    .iter()
                    .map(|(repo, tag, digest)| {
                        ((repo.to_string(), tag.to_string()), digest.to_string())
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl DigestSource for StaticSource {
        async fn resolve_digest(
            &self,
            repository: &str,
            tag: &str,
        ) -> Result<String, MonitorError> {
            self.calls
                .lock()
                .unwrap()
                .push((repository.to_owned(), tag.to_owned()));
            self.digests
                .get(&(repository.to_owned(), tag.to_owned()))
                .cloned()
                .ok_or_else(|| MonitorError::ManifestRejected {
                    repository: repository.to_owned(),
                    tag: tag.to_owned(),
                    status: 404,
                })
        }
    }

    fn image(uid: &str, repository: &str, tag: &str, digest: &str) -> ImageInfo {
        ImageInfo {
            container_uid: uid.to_owned(),
            repository: repository.to_owned(),
            tag: tag.to_owned(),
            digest: digest.to_owned(),
        }
    }

    #[tokio::test]
    async fn reports_only_changed_digests() {
        let prober = Prober::new(StaticSource::new(&[
            ("library/nginx", "latest", "sha256:bbbb"),
            ("library/redis", "latest", "sha256:cccc"),
        ]));
        let updates = prober
            .check_updates(vec![
                image("c1", "nginx", "1.25", "sha256:aaaa"),
                image("c2", "redis", "7", "sha256:cccc"),
            ])
            .await;

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].container_uid, "c1");
        assert_eq!(updates[0].new_tag, "nginx:latest");
        assert!(updates[0].description.contains("sha256:aaaa"));
        assert!(updates[0].description.contains("sha256:bbbb"));
    }

    #[tokio::test]
    async fn missing_current_digest_is_resolved_from_tag() {
        let prober = Prober::new(StaticSource::new(&[
            ("library/nginx", "latest", "sha256:bbbb"),
            ("library/nginx", "1.25", "sha256:aaaa"),
        ]));
        let updates = prober
            .check_updates(vec![image("c1", "nginx", "1.25", "")])
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].container_uid, "c1");
    }

    #[tokio::test]
    async fn probe_failure_skips_only_that_image() {
        let prober = Prober::new(StaticSource::new(&[(
            "library/nginx",
            "latest",
            "sha256:bbbb",
        )]));
        let updates = prober
            .check_updates(vec![
                image("c1", "nginx", "1.25", "sha256:aaaa"),
                image("c2", "ghost", "5", ""),
            ])
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].container_uid, "c1");
    }

    #[tokio::test]
    async fn latest_digest_is_cached_across_batches() {
        let source = StaticSource::new(&[("library/nginx", "latest", "sha256:bbbb")]);
        let prober = Prober::new(source);

        let first = prober
            .check_updates(vec![image("c1", "nginx", "1.25", "sha256:aaaa")])
            .await;
        let second = prober
            .check_updates(vec![image("c1", "nginx", "1.25", "sha256:aaaa")])
            .await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);

        let calls = prober.source.calls.lock().unwrap();
        let latest_calls = calls
            .iter()
            .filter(|(_, tag)| tag == "latest")
            .count();
        assert_eq!(latest_calls, 1);
    }

    #[tokio::test]
    async fn identical_digests_produce_empty_batch() {
        let prober = Prober::new(StaticSource::new(&[(
            "library/nginx",
            "latest",
            "sha256:aaaa",
        )]));
        let updates = prober
            .check_updates(vec![image("c1", "nginx", "latest", "sha256:aaaa")])
            .await;
        assert!(updates.is_empty());
    }
}
