use anyhow::{anyhow, Context, Result};
use ignore::WalkBuilder;
use log::{debug, info};
use serde::Deserialize;
use std::{collections::BTreeMap as Map, fs, path::Path};

use crate::{models::ImageReference, services::ImageFrontend};

#[derive(Clone, Debug, Deserialize)]
struct DockerComposeFragment {
    #[serde(default)]
    pub services: Option<Map<String, Option<Service>>>,
}

#[derive(Clone, Debug, Deserialize)]
struct Service {
    pub image: Option<String>,
}

fn is_fragment(path: &Path) -> bool {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some(extension) => extension == "yml" || extension == "yaml",
        None => false,
    }
}

/// Comment-only or empty documents carry no services.
fn is_blank(contents: &str) -> bool {
    contents
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---")
}

pub struct DockerComposeFrontend;

impl DockerComposeFrontend {
    pub fn new() -> DockerComposeFrontend {
        DockerComposeFrontend
    }

    fn fragment_images(&self, fragment_path: &Path) -> Result<Vec<ImageReference>> {
        let contents = fs::read_to_string(fragment_path)
            .with_context(|| format!("could not read fragment {:?}", fragment_path))?;

        if is_blank(&contents) {
            debug!("skipping empty fragment {:?}", fragment_path);
            return Ok(Vec::new());
        }

        let fragment: DockerComposeFragment = serde_yaml::from_str(&contents)
            .with_context(|| format!("could not parse fragment {:?}", fragment_path))?;

        let services = match fragment.services {
            Some(services) => services,
            None => {
                debug!("fragment {:?} defines no services", fragment_path);
                return Ok(Vec::new());
            }
        };

        let mut images = Vec::new();
        for (service_name, service) in services {
            let image = match service.and_then(|service| service.image) {
                Some(image) => image,
                None => continue,
            };

            let image = ImageReference::parse(&image).with_context(|| {
                format!(
                    "service {:?} in fragment {:?} has an invalid image",
                    service_name, fragment_path
                )
            })?;
            images.push(image);
        }

        Ok(images)
    }
}

impl ImageFrontend for DockerComposeFrontend {
    fn images<P: AsRef<Path>>(&mut self, fragment_directory: P) -> Result<Vec<ImageReference>> {
        let fragment_directory = fragment_directory.as_ref();
        if !fragment_directory.is_dir() {
            return Err(anyhow!(
                "fragment directory {:?} does not exist",
                fragment_directory
            ));
        }

        let walk = WalkBuilder::new(fragment_directory)
            .max_depth(Some(1))
            .follow_links(true)
            .parents(false)
            .ignore(false)
            .git_global(false)
            .git_ignore(false)
            .git_exclude(false)
            .hidden(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut images = Vec::new();
        for result in walk {
            let entry = result?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file || !is_fragment(entry.path()) {
                continue;
            }

            let fragment_images = self.fragment_images(entry.path())?;
            info!(
                "found {} image(s) in {:?}",
                fragment_images.len(),
                entry.path()
            );
            images.extend(fragment_images);
        }

        Ok(images)
    }
}
