use anyhow::Result;
use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use std::{io::Write, path::Path};

use crate::{checker::BrokenLink, models::ImageReference};

pub fn image(stdout: &mut impl Write, image: &ImageReference) -> Result<()> {
    stdout
        .queue(style::Print(format!("Image: {}\n", image)))?
        .flush()?;
    Ok(())
}

pub fn missing_image(stdout: &mut impl Write, image: &ImageReference) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("ERROR: ".red().bold()))?
        .queue(style::Print(format!("Missing image info: {}\n", image)))?
        .flush()?;
    Ok(())
}

pub fn broken_link(stdout: &mut impl Write, link: &BrokenLink) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("ERROR: ".red().bold()))?
        .queue(style::Print(format!(
            "Broken link detected for image {} ({}): {}\n",
            link.image, link.url, link.error
        )))?
        .flush()?;
    Ok(())
}

pub fn generated(stdout: &mut impl Write, path: &Path) -> Result<()> {
    stdout
        .queue(style::PrintStyledContent("done ".green().bold()))?
        .queue(style::Print(format!("Generated file {:?}\n", path)))?
        .flush()?;
    Ok(())
}
