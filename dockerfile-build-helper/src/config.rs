use anyhow::Result;
use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

pub const DEFAULT_OUTPUT: &str = "build-all.sh";
pub const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";

const ENV_FRAGMENTS: &str = "BUILD_HELPER_FRAGMENTS";
const ENV_RAW_HOST: &str = "BUILD_HELPER_RAW_HOST";
const ENV_CONCURRENCY: &str = "BUILD_HELPER_CONCURRENCY";
const ENV_TIMEOUT_SECS: &str = "BUILD_HELPER_TIMEOUT_SECS";
const ENV_RETRIES: &str = "BUILD_HELPER_RETRIES";

/// How far up from the working directory we look for `contrib`.
const MAX_ROOT_DEPTH: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub fragment_directory: PathBuf,
    pub raw_host: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(fragment_directory: P) -> Config {
        Config {
            fragment_directory: fragment_directory.into(),
            raw_host: DEFAULT_RAW_HOST.into(),
            concurrency: 8,
            timeout: Duration::from_secs(10),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }

    pub fn from_env() -> Result<Config> {
        let current_dir = env::current_dir()?;
        let config = Config::from_lookup(|variable| env::var(variable).ok(), &current_dir)?;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F, current_dir: &Path) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fragment_directory = match lookup(ENV_FRAGMENTS) {
            Some(directory) => PathBuf::from(directory),
            None => find_fragment_directory(current_dir).ok_or_else(|| {
                ConfigError::FragmentDirectoryNotFound(current_dir.display().to_string())
            })?,
        };

        let mut config = Config::new(fragment_directory);

        if let Some(raw_host) = lookup(ENV_RAW_HOST) {
            config.raw_host = raw_host;
        }
        if let Some(value) = lookup(ENV_CONCURRENCY) {
            config.concurrency = parse_number(ENV_CONCURRENCY, &value)? as usize;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &value)?);
        }
        if let Some(value) = lookup(ENV_RETRIES) {
            config.retries = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    variable: ENV_RETRIES,
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }
}

fn parse_number(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(ConfigError::InvalidNumber {
            variable,
            value: value.into(),
        }),
    }
}

/// The fragments live next to `contrib`, in
/// `docker-compose-generator/docker-fragments`.
fn find_fragment_directory(current_dir: &Path) -> Option<PathBuf> {
    current_dir
        .ancestors()
        .take(MAX_ROOT_DEPTH + 1)
        .find(|path| path.file_name() == Some(OsStr::new("contrib")))
        .and_then(|contrib| contrib.parent())
        .map(|root| root.join("docker-compose-generator").join("docker-fragments"))
}
