mod github;
#[cfg(test)]
pub mod memory;

pub use github::GithubRawBackend;
