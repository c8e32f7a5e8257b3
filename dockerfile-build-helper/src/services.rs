use anyhow::Result;
use futures_util::future::BoxFuture;
use std::path::Path;

use crate::{error::LinkError, models::ImageReference};

pub trait ImageFrontend {
    // Duplicates are kept.
    fn images<P: AsRef<Path>>(&mut self, fragment_directory: P) -> Result<Vec<ImageReference>>;
}

pub trait SourceBackend {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, LinkError>>;
}
