use anyhow::Result;
use futures_util::future::BoxFuture;
use log::debug;
use reqwest::{Client, ClientBuilder};

use crate::{config::Config, error::LinkError, services::SourceBackend};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct GithubRawBackend {
    client: Client,
}

impl GithubRawBackend {
    pub fn new(config: &Config) -> Result<GithubRawBackend> {
        let client = client_builder(config).build()?;
        Ok(GithubRawBackend { client })
    }
}

fn client_builder(config: &Config) -> ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
}

impl SourceBackend for GithubRawBackend {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, LinkError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            debug!("{} responded with {}", url, status);

            if !status.is_success() {
                return Err(LinkError::Status(status.as_u16()));
            }

            let body = response.text().await?;
            Ok(body)
        })
    }
}
