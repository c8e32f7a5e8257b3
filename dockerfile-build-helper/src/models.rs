use std::{collections::BTreeMap as Map, fmt, str::FromStr};

use crate::error::InvalidImageReference;

const GITHUB_PREFIX: &str = "https://github.com/";
const MAX_TAG_LENGTH: usize = 128;

#[derive(Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub struct ImageReference {
    pub namespace: Option<String>,
    pub name: String,
    pub tag: Option<String>,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<ImageReference, InvalidImageReference> {
        let input = input.trim();
        let invalid = |reason| InvalidImageReference {
            input: input.into(),
            reason,
        };

        if input.is_empty() {
            return Err(invalid("the reference is empty"));
        }

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (repository, tag) = match input.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => (repository, Some(tag)),
            _ => (input, None),
        };

        match tag {
            Some("") => return Err(invalid("the tag is empty")),
            Some(tag) if !is_valid_tag(tag) => {
                return Err(invalid(
                    "tags are up to 128 letters, digits, '_', '.' or '-' and cannot start with '.' or '-'",
                ))
            }
            _ => (),
        }

        let (namespace, name) = match repository.rsplit_once('/') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, repository),
        };

        if name.is_empty() {
            return Err(invalid("the name is empty"));
        }
        if !name.chars().all(is_path_char) {
            return Err(invalid("the name may only hold lowercase letters, digits, '.', '_' or '-'"));
        }
        match namespace {
            Some("") => return Err(invalid("the namespace is empty")),
            Some(namespace) if !namespace.chars().all(is_namespace_char) => {
                return Err(invalid("the namespace holds characters not allowed in a repository path"))
            }
            _ => (),
        }

        Ok(ImageReference {
            namespace: namespace.map(String::from),
            name: name.into(),
            tag: tag.map(String::from),
        })
    }

    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }

    pub fn docker_hub_link(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("https://hub.docker.com/r/{}/{}", namespace, self.name),
            None => format!("https://hub.docker.com/_/{}", self.name),
        }
    }
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    let first_is_valid = match chars.next() {
        Some(first) => first.is_ascii_alphanumeric() || first == '_',
        None => false,
    };

    first_is_valid
        && tag.len() <= MAX_TAG_LENGTH
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

// Registry hosts may be mixed case and carry a port.
fn is_namespace_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/' | ':')
}

impl FromStr for ImageReference {
    type Err = InvalidImageReference;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ImageReference::parse(input)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{}/", namespace)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialOrd, Ord, PartialEq, Eq)]
pub enum Architecture {
    Amd64,
    Arm32v7,
    Arm64v8,
}

impl Architecture {
    pub const ALL: [Architecture; 3] = [
        Architecture::Amd64,
        Architecture::Arm32v7,
        Architecture::Arm64v8,
    ];

    /// What `uname -m` prints on a host that should use this variant.
    /// amd64 is the fallback and is never selected by a guard.
    pub fn machine(self) -> Option<&'static str> {
        match self {
            Architecture::Amd64 => None,
            Architecture::Arm32v7 => Some("armv7l"),
            Architecture::Arm64v8 => Some("aarch64"),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm32v7 => "arm32v7",
            Architecture::Arm64v8 => "arm64v8",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DockerfilePaths {
    pub amd64: Option<String>,
    pub arm32v7: Option<String>,
    pub arm64v8: Option<String>,
}

impl DockerfilePaths {
    pub fn get(&self, architecture: Architecture) -> Option<&str> {
        let path = match architecture {
            Architecture::Amd64 => &self.amd64,
            Architecture::Arm32v7 => &self.arm32v7,
            Architecture::Arm64v8 => &self.arm64v8,
        };
        path.as_deref()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockerInfo {
    pub image: ImageReference,
    pub docker_hub_link: String,
    pub git_link: String,
    pub git_ref: String,
    pub dockerfiles: DockerfilePaths,
}

impl DockerInfo {
    pub fn repository(&self) -> &str {
        let repository = self
            .git_link
            .strip_prefix(GITHUB_PREFIX)
            .unwrap_or(&self.git_link)
            .trim_end_matches('/');
        repository.strip_suffix(".git").unwrap_or(repository)
    }

    pub fn raw_link(&self, raw_host: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            raw_host.trim_end_matches('/'),
            self.repository(),
            self.git_ref,
            path
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockerfileReference {
    pub source_path: String,
    pub resolved_path: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedImage {
    pub info: DockerInfo,
    pub dockerfiles: Map<Architecture, DockerfileReference>,
}

impl VerifiedImage {
    pub fn dockerfile(&self, architecture: Architecture) -> Option<&DockerfileReference> {
        self.dockerfiles.get(&architecture)
    }
}

/// Collapses `.` and `..` segments and duplicate slashes. Returns `None` when
/// the path is empty or climbs above the repository root.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop()?;
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
