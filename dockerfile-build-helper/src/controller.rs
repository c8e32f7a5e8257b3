use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::{
    collections::{BTreeMap as Map, BTreeSet as Set},
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::{
    checker::LinkChecker,
    config::Config,
    console,
    models::{DockerInfo, ImageReference},
    registry::{Registry, SEED_IMAGES},
    script,
    services::{ImageFrontend, SourceBackend},
};

pub struct Controller<F, B> {
    frontend: F,
    backend: B,
    registry: Registry,
    config: Config,
}

impl<F, B> Controller<F, B>
where
    F: ImageFrontend,
    B: SourceBackend,
{
    pub fn init(frontend: F, backend: B, registry: Registry, config: Config) -> Controller<F, B> {
        Controller {
            frontend,
            backend,
            registry,
            config,
        }
    }

    /// The seed images followed by every image used in the fragments, each
    /// reference listed once. Fails when two references would be cloned into
    /// the same directory.
    pub fn images(&mut self) -> Result<Vec<ImageReference>> {
        let mut images = SEED_IMAGES
            .iter()
            .map(|seed| ImageReference::parse(seed))
            .collect::<Result<Vec<_>, _>>()?;

        let fragment_images = self
            .frontend
            .images(&self.config.fragment_directory)
            .with_context(|| {
                format!(
                    "could not scan fragments in {:?}",
                    self.config.fragment_directory
                )
            })?;
        images.extend(fragment_images);

        let mut seen = Set::new();
        images.retain(|image| seen.insert(image.clone()));
        info!("found {} distinct image(s)", images.len());

        let mut by_name = Map::<&str, Vec<String>>::new();
        for image in images.iter() {
            by_name
                .entry(image.name.as_str())
                .or_default()
                .push(image.to_string());
        }
        let conflicts = by_name
            .into_iter()
            .filter(|(_, references)| references.len() > 1)
            .map(|(name, references)| format!("{} ({})", name, references.join(", ")))
            .collect::<Vec<_>>();
        if !conflicts.is_empty() {
            return Err(anyhow!(
                "images must be used with a single reference each, found conflicting references for {}",
                conflicts.join("; ")
            ));
        }

        Ok(images)
    }

    pub fn resolve(
        &self,
        stdout: &mut impl Write,
        images: Vec<ImageReference>,
    ) -> Result<Vec<DockerInfo>> {
        let mut infos = Vec::new();
        let mut missing = Vec::new();

        for image in images {
            console::image(stdout, &image)?;

            match self.registry.resolve(&image) {
                Some(info) => {
                    debug!(
                        "{} builds from {} at {} ({})",
                        image, info.git_link, info.git_ref, info.docker_hub_link
                    );
                    infos.push(info);
                }
                None => {
                    console::missing_image(stdout, &image)?;
                    missing.push(image.to_string());
                }
            }
        }

        if !missing.is_empty() {
            return Err(anyhow!(
                "no build recipe for {} image(s): {}",
                missing.len(),
                missing.join(", ")
            ));
        }

        Ok(infos)
    }

    /// Nothing is written unless every image resolved and every Dockerfile is
    /// reachable.
    pub async fn run(&mut self, stdout: &mut impl Write, output: &Path) -> Result<PathBuf> {
        let images = self.images()?;
        let infos = self.resolve(stdout, images)?;

        let checker = LinkChecker::new(&self.backend, &self.config);
        let verified = match checker.verify_all(infos).await {
            Ok(verified) => verified,
            Err(broken_links) => {
                for link in broken_links.iter() {
                    console::broken_link(stdout, link)?;
                }
                return Err(anyhow!("{} broken link(s) detected", broken_links.len()));
            }
        };

        let script = script::generate(&verified);
        write_script(output, &script)?;

        let path = output
            .canonicalize()
            .with_context(|| format!("could not resolve {:?}", output))?;
        console::generated(stdout, &path)?;

        Ok(path)
    }
}

/// Writes through a temporary file in the same directory so an interrupted
/// run never leaves half a script behind.
fn write_script(output: &Path, script: &str) -> Result<()> {
    let directory = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(directory)
        .with_context(|| format!("could not create a temporary file in {:?}", directory))?;
    file.write_all(script.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file().set_permissions(fs::Permissions::from_mode(0o755))?;
    }

    file.persist(output)
        .with_context(|| format!("could not write {:?}", output))?;
    info!("wrote {} bytes to {:?}", script.len(), output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backends::memory::MemoryBackend, error::LinkError, frontends::DockerComposeFrontend};
    use std::time::Duration;
    use tempfile::TempDir;

    const LND_AMD64: &str =
        "https://raw.githubusercontent.com/btcpayserver/lnd/basedon-v0.5.1-beta/linuxamd64.Dockerfile";

    struct Fixture {
        directory: TempDir,
    }

    impl Fixture {
        fn new(fragments: &[(&str, &str)]) -> Fixture {
            let directory = TempDir::new().unwrap();
            let fragment_directory = directory.path().join("docker-fragments");
            fs::create_dir(&fragment_directory).unwrap();
            for (name, contents) in fragments {
                fs::write(fragment_directory.join(name), contents).unwrap();
            }
            Fixture { directory }
        }

        fn output(&self) -> PathBuf {
            self.directory.path().join("build-all.sh")
        }

        fn controller(&self, backend: MemoryBackend) -> Controller<DockerComposeFrontend, MemoryBackend> {
            let mut config = Config::new(self.directory.path().join("docker-fragments"));
            config.retry_backoff = Duration::from_millis(0);
            Controller::init(
                DockerComposeFrontend::new(),
                backend,
                Registry::builtin().unwrap(),
                config,
            )
        }
    }

    fn lightning() -> Fixture {
        Fixture::new(&[
            (
                "lightning.yml",
                "services:\n  lnd_bitcoin:\n    image: btcpayserver/lnd:v0.5.1-beta\n  bitcoind:\n    image: btcpayserver/bitcoin:0.17.0\n",
            ),
            ("volumes.yml", "volumes:\n  lnd_bitcoin_datadir:\n"),
        ])
    }

    #[test]
    fn seeds_come_first_and_duplicates_are_dropped() {
        let fixture = Fixture::new(&[
            ("a.yml", "services:\n  proxy:\n    image: nginx:stable\n"),
            (
                "b.yml",
                "services:\n  proxy:\n    image: nginx:stable\n  builder:\n    image: btcpayserver/docker-compose-builder:1.23.2\n",
            ),
        ]);
        let mut controller = fixture.controller(MemoryBackend::new());

        let images = controller
            .images()
            .unwrap()
            .into_iter()
            .map(|image| image.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            images,
            vec![
                "btcpayserver/docker-compose-generator",
                "btcpayserver/docker-compose-builder:1.23.2",
                "nginx:stable",
            ]
        );
    }

    #[tokio::test]
    async fn conflicting_tags_of_one_image_are_rejected() {
        let fixture = Fixture::new(&[
            ("a.yml", "services:\n  proxy:\n    image: nginx:1.14\n"),
            ("b.yml", "services:\n  proxy:\n    image: nginx:stable\n"),
        ]);
        let mut controller = fixture.controller(MemoryBackend::serving_everything());

        let err = controller.run(&mut Vec::new(), &fixture.output()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "images must be used with a single reference each, found conflicting references for nginx (nginx:1.14, nginx:stable)"
        );
        assert!(controller.backend.requests().is_empty());
        assert!(!fixture.output().exists());
    }

    #[test]
    fn a_seed_repeated_with_another_tag_conflicts() {
        let fixture = Fixture::new(&[(
            "builder.yml",
            "services:\n  builder:\n    image: btcpayserver/docker-compose-builder:1.24.0\n",
        )]);
        let mut controller = fixture.controller(MemoryBackend::new());

        let err = controller.images().unwrap_err();
        assert!(err.to_string().contains(
            "docker-compose-builder (btcpayserver/docker-compose-builder:1.23.2, btcpayserver/docker-compose-builder:1.24.0)"
        ));
    }

    #[tokio::test]
    async fn writes_the_script_when_every_link_works() {
        let fixture = lightning();
        let mut controller = fixture.controller(MemoryBackend::serving_everything());
        let mut stdout = Vec::new();

        let path = controller.run(&mut stdout, &fixture.output()).await.unwrap();
        assert_eq!(path, fixture.output().canonicalize().unwrap());

        let script = fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        let generator = script.find("# Build docker-compose-generator").unwrap();
        let builder = script.find("# Build docker-compose-builder").unwrap();
        let lnd = script.find("# Build lnd").unwrap();
        let bitcoin = script.find("# Build bitcoin").unwrap();
        // Services within a fragment come in name order.
        assert!(generator < builder && builder < bitcoin && bitcoin < lnd);
        assert!(script.contains("git checkout basedon-v0.5.1-beta\n"));

        let stdout = String::from_utf8(stdout).unwrap();
        assert!(stdout.contains("Image: btcpayserver/lnd:v0.5.1-beta\n"));
        assert!(stdout.contains("Generated file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn the_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = lightning();
        let mut controller = fixture.controller(MemoryBackend::serving_everything());

        let path = controller.run(&mut Vec::new(), &fixture.output()).await.unwrap();
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[tokio::test]
    async fn reruns_produce_identical_scripts() {
        let fixture = lightning();

        let mut controller = fixture.controller(MemoryBackend::serving_everything());
        let path = controller.run(&mut Vec::new(), &fixture.output()).await.unwrap();
        let first = fs::read(&path).unwrap();

        let mut controller = fixture.controller(MemoryBackend::serving_everything());
        controller.run(&mut Vec::new(), &fixture.output()).await.unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn a_single_broken_link_prevents_output() {
        let fixture = lightning();
        let backend = MemoryBackend::serving_everything().with_failure(LND_AMD64, LinkError::Status(404));
        let mut controller = fixture.controller(backend);
        let mut stdout = Vec::new();

        let err = controller.run(&mut stdout, &fixture.output()).await.unwrap_err();
        assert!(err.to_string().contains("1 broken link"));
        assert!(!fixture.output().exists());

        let stdout = String::from_utf8(stdout).unwrap();
        assert!(stdout.contains(&format!(
            "Broken link detected for image btcpayserver/lnd:v0.5.1-beta ({})",
            LND_AMD64
        )));
    }

    #[tokio::test]
    async fn a_broken_link_keeps_an_existing_script() {
        let fixture = lightning();
        fs::write(fixture.output(), "previous").unwrap();
        let backend = MemoryBackend::serving_everything().with_failure(LND_AMD64, LinkError::Timeout);
        let mut controller = fixture.controller(backend);

        assert!(controller.run(&mut Vec::new(), &fixture.output()).await.is_err());
        assert_eq!(fs::read_to_string(fixture.output()).unwrap(), "previous");
    }

    #[tokio::test]
    async fn unknown_images_are_all_reported_before_any_request() {
        let fixture = Fixture::new(&[(
            "custom.yml",
            "services:\n  one:\n    image: acme/rocket:1.0\n  two:\n    image: acme/launchpad\n",
        )]);
        let mut controller = fixture.controller(MemoryBackend::serving_everything());
        let mut stdout = Vec::new();

        let err = controller.run(&mut stdout, &fixture.output()).await.unwrap_err();
        assert!(err.to_string().contains("no build recipe for 2 image(s)"));
        assert!(controller.backend.requests().is_empty());
        assert!(!fixture.output().exists());

        let stdout = String::from_utf8(stdout).unwrap();
        assert!(stdout.contains("Missing image info: acme/launchpad\n"));
        assert!(stdout.contains("Missing image info: acme/rocket:1.0\n"));
    }
}
