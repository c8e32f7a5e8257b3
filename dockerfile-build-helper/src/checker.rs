use futures_util::stream::{self, StreamExt};
use log::{debug, warn};
use std::{collections::BTreeMap as Map, time::Duration};
use tokio::time::sleep;

use crate::{
    config::Config,
    error::LinkError,
    models::{
        normalize_path, Architecture, DockerInfo, DockerfileReference, ImageReference,
        VerifiedImage,
    },
    services::SourceBackend,
};

// Symlinks pointing at symlinks are followed this many times.
const MAX_POINTER_HOPS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokenLink {
    pub image: ImageReference,
    pub architecture: Architecture,
    pub url: String,
    pub error: LinkError,
}

/// Raw hosts serve a symlink as a one line body holding the target path.
/// Anything with whitespace in it is a real Dockerfile.
fn pointer_target(current_path: &str, body: &str) -> Option<Result<String, LinkError>> {
    let target = body.trim();
    let is_pointer = !target.is_empty()
        && !target.contains(char::is_whitespace)
        && !target.starts_with('#')
        && !target.starts_with('/')
        && !target.contains("://");
    if !is_pointer {
        return None;
    }

    let joined = match current_path.rsplit_once('/') {
        Some((directory, _)) => format!("{}/{}", directory, target),
        None => target.to_string(),
    };

    Some(normalize_path(&joined).ok_or(LinkError::InvalidPath(joined)))
}

pub struct LinkChecker<'a, B> {
    backend: &'a B,
    raw_host: String,
    concurrency: usize,
    retries: u32,
    retry_backoff: Duration,
}

impl<'a, B: SourceBackend> LinkChecker<'a, B> {
    pub fn new(backend: &'a B, config: &Config) -> LinkChecker<'a, B> {
        LinkChecker {
            backend,
            raw_host: config.raw_host.clone(),
            concurrency: config.concurrency.max(1),
            retries: config.retries,
            retry_backoff: config.retry_backoff,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, LinkError> {
        let mut attempt = 0;
        loop {
            match self.backend.fetch(url).await {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!("attempt {} for {} failed: {}, retrying", attempt, url, err);
                    sleep(self.retry_backoff * attempt).await;
                }
                result => return result,
            }
        }
    }

    pub async fn check(
        &self,
        info: &DockerInfo,
        architecture: Architecture,
    ) -> Result<Option<DockerfileReference>, BrokenLink> {
        let source_path = match info.dockerfiles.get(architecture) {
            Some(path) => path,
            None => return Ok(None),
        };

        let broken = |url: String, error: LinkError| BrokenLink {
            image: info.image.clone(),
            architecture,
            url,
            error,
        };

        let mut current = normalize_path(source_path).ok_or_else(|| {
            broken(
                info.raw_link(&self.raw_host, source_path),
                LinkError::InvalidPath(source_path.into()),
            )
        })?;

        for _ in 0..=MAX_POINTER_HOPS {
            let url = info.raw_link(&self.raw_host, &current);
            debug!("checking {} ({}) at {}", info.image, architecture, url);

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(error) => return Err(broken(url, error)),
            };

            match pointer_target(&current, &body) {
                Some(Ok(target)) => {
                    debug!("{} points to {}", current, target);
                    current = target;
                }
                Some(Err(error)) => return Err(broken(url, error)),
                None => {
                    return Ok(Some(DockerfileReference {
                        source_path: source_path.into(),
                        resolved_path: current,
                        url,
                    }))
                }
            }
        }

        let url = info.raw_link(&self.raw_host, &current);
        Err(broken(url, LinkError::TooManyHops(MAX_POINTER_HOPS)))
    }

    // Waits for every check before reporting so one run lists every broken link.
    pub async fn verify_all(&self, infos: Vec<DockerInfo>) -> Result<Vec<VerifiedImage>, Vec<BrokenLink>> {
        let jobs = (0..infos.len())
            .flat_map(|index| Architecture::ALL.iter().map(move |architecture| (index, *architecture)))
            .collect::<Vec<_>>();
        debug!("running {} link checks", jobs.len());

        let infos_ref = &infos;
        let outcomes = stream::iter(jobs)
            .map(move |(index, architecture)| async move {
                let outcome = self.check(&infos_ref[index], architecture).await;
                (index, architecture, outcome)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut dockerfiles = vec![Map::new(); infos.len()];
        let mut broken_links = Vec::new();

        for (index, architecture, outcome) in outcomes {
            match outcome {
                Ok(Some(reference)) => {
                    debug!(
                        "{} ({}) resolved {} to {}",
                        infos[index].image, architecture, reference.source_path, reference.resolved_path
                    );
                    dockerfiles[index].insert(architecture, reference);
                }
                Ok(None) => (),
                Err(broken) => {
                    warn!(
                        "broken link for {} ({}): {} ({})",
                        broken.image, broken.architecture, broken.url, broken.error
                    );
                    broken_links.push(broken);
                }
            }
        }

        if !broken_links.is_empty() {
            return Err(broken_links);
        }

        let verified = infos
            .into_iter()
            .zip(dockerfiles)
            .map(|(info, dockerfiles)| VerifiedImage { info, dockerfiles })
            .collect();

        Ok(verified)
    }
}
