use futures_util::future::{self, BoxFuture};
use std::{
    collections::BTreeMap as Map,
    sync::Mutex,
};

use crate::{error::LinkError, services::SourceBackend};

/// Serves files from memory and records every request.
#[derive(Default)]
pub struct MemoryBackend {
    files: Map<String, String>,
    failures: Map<String, LinkError>,
    flaky: Mutex<Map<String, u32>>,
    requests: Mutex<Vec<String>>,
    serve_everything: bool,
}

impl MemoryBackend {
    pub fn new() -> MemoryBackend {
        MemoryBackend::default()
    }

    pub fn serving_everything() -> MemoryBackend {
        MemoryBackend {
            serve_everything: true,
            ..MemoryBackend::default()
        }
    }

    pub fn with_file<U: Into<String>>(mut self, url: U, body: &str) -> MemoryBackend {
        self.files.insert(url.into(), body.into());
        self
    }

    pub fn with_failure<U: Into<String>>(mut self, url: U, error: LinkError) -> MemoryBackend {
        self.failures.insert(url.into(), error);
        self
    }

    /// The first `times` requests for `url` fail with a 503.
    pub fn with_flaky<U: Into<String>>(self, url: U, times: u32) -> MemoryBackend {
        self.flaky.lock().unwrap().insert(url.into(), times);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<String, LinkError> {
        self.requests.lock().unwrap().push(url.into());

        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LinkError::Status(503));
            }
        }

        if let Some(error) = self.failures.get(url) {
            return Err(error.clone());
        }

        match self.files.get(url) {
            Some(body) => Ok(body.clone()),
            None if self.serve_everything => Ok("FROM scratch\n".into()),
            None => Err(LinkError::Status(404)),
        }
    }
}

impl SourceBackend for MemoryBackend {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, LinkError>> {
        Box::pin(future::ready(self.respond(url)))
    }
}
