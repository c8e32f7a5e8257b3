use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid image reference {input:?}: {reason}")]
pub struct InvalidImageReference {
    pub input: String,
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not parse the build recipes: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("recipe {name:?} has a git link that is not a GitHub repository: {link}")]
    InvalidGitLink { name: String, link: String },

    #[error("recipe {name:?} uses an unknown placeholder in {template:?}")]
    UnknownPlaceholder { name: String, template: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("server responded with status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("{0:?} points outside of the repository")]
    InvalidPath(String),

    #[error("gave up following Dockerfile pointers after {0} hops")]
    TooManyHops(usize),
}

impl LinkError {
    /// Timeouts, transport failures and server errors are worth another try,
    /// anything the server rejected outright is not.
    pub fn is_transient(&self) -> bool {
        match self {
            LinkError::Status(status) => *status >= 500,
            LinkError::Timeout | LinkError::Transport(_) => true,
            LinkError::InvalidPath(_) | LinkError::TooManyHops(_) => false,
        }
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> LinkError {
        if err.is_timeout() {
            LinkError::Timeout
        } else if let Some(status) = err.status() {
            LinkError::Status(status.as_u16())
        } else {
            LinkError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable} must be a positive number, got {value:?}")]
    InvalidNumber { variable: &'static str, value: String },

    #[error("couldn't find a contrib directory in {0:?} or any of its parents, set BUILD_HELPER_FRAGMENTS")]
    FragmentDirectoryNotFound(String),
}
