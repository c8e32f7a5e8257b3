use anyhow::Result;
use log::info;
use std::{io::stdout, path::PathBuf};
use structopt::StructOpt;

use backends::GithubRawBackend;
use config::{Config, DEFAULT_OUTPUT};
use controller::Controller;
use frontends::DockerComposeFrontend;
use registry::Registry;

mod backends;
mod checker;
mod config;
mod console;
mod controller;
mod error;
mod frontends;
mod models;
mod registry;
mod script;
mod services;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "dockerfile-build-helper",
    about = "Generates a script that builds every image used by the docker-compose fragments from its upstream sources."
)]
struct Opt {
    #[structopt(short, long, parse(from_os_str))]
    /// Where to write the script, build-all.sh by default.
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();
    let output = opt.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let config = Config::from_env()?;
    info!("using fragments in {:?}", config.fragment_directory);

    let registry = Registry::builtin()?;
    info!("loaded recipes for {}", registry.names().collect::<Vec<_>>().join(", "));
    let backend = GithubRawBackend::new(&config)?;
    let frontend = DockerComposeFrontend::new();

    let mut controller = Controller::init(frontend, backend, registry, config);
    controller.run(&mut stdout(), &output).await?;

    Ok(())
}
