use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap as Map;

use crate::{
    error::RegistryError,
    models::{DockerInfo, DockerfilePaths, ImageReference},
};

const BUILTIN_RECIPES: &str = include_str!("registry.yml");

const TAG_PLACEHOLDER: &str = "{tag}";

/// Always built, whatever the fragments use.
pub const SEED_IMAGES: &[&str] = &[
    "btcpayserver/docker-compose-generator",
    "btcpayserver/docker-compose-builder:1.23.2",
];

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Recipe {
    git_link: String,
    git_ref: String,
    amd64: Option<String>,
    arm32v7: Option<String>,
    arm64v8: Option<String>,
}

impl Recipe {
    fn templates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.git_ref.as_str())
            .chain(self.amd64.as_deref())
            .chain(self.arm32v7.as_deref())
            .chain(self.arm64v8.as_deref())
    }

    fn validate(&self, name: &str) -> Result<(), RegistryError> {
        let repository = self
            .git_link
            .strip_prefix("https://github.com/")
            .map(|repository| repository.trim_end_matches('/'));
        let is_repository = match repository {
            Some(repository) => {
                let segments = repository.split('/').collect::<Vec<_>>();
                segments.len() == 2 && segments.iter().all(|segment| !segment.is_empty())
            }
            None => false,
        };

        if !is_repository {
            return Err(RegistryError::InvalidGitLink {
                name: name.into(),
                link: self.git_link.clone(),
            });
        }

        for template in self.templates() {
            if has_unknown_placeholder(template) {
                return Err(RegistryError::UnknownPlaceholder {
                    name: name.into(),
                    template: template.into(),
                });
            }
        }

        Ok(())
    }
}

fn has_unknown_placeholder(template: &str) -> bool {
    template.replace(TAG_PLACEHOLDER, "").contains(&['{', '}'][..])
}

fn expand(template: &str, tag: &str) -> String {
    template.replace(TAG_PLACEHOLDER, tag)
}

#[derive(Clone, Debug)]
pub struct Registry {
    recipes: Map<String, Recipe>,
}

impl Registry {
    pub fn builtin() -> Result<Registry, RegistryError> {
        Registry::from_yaml(BUILTIN_RECIPES)
    }

    pub fn from_yaml(source: &str) -> Result<Registry, RegistryError> {
        let recipes: Map<String, Recipe> = serde_yaml::from_str(source)?;

        for (name, recipe) in recipes.iter() {
            recipe.validate(name)?;
        }
        debug!("loaded {} build recipes", recipes.len());

        Ok(Registry { recipes })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn resolve(&self, image: &ImageReference) -> Option<DockerInfo> {
        let recipe = self.recipes.get(&image.name)?;
        let tag = image.tag_or_latest();
        let path = |template: &Option<String>| template.as_deref().map(|t| expand(t, tag));

        Some(DockerInfo {
            image: image.clone(),
            docker_hub_link: image.docker_hub_link(),
            git_link: recipe.git_link.clone(),
            git_ref: expand(&recipe.git_ref, tag),
            dockerfiles: DockerfilePaths {
                amd64: path(&recipe.amd64),
                arm32v7: path(&recipe.arm32v7),
                arm64v8: path(&recipe.arm64v8),
            },
        })
    }
}
