use std::process::Command;

use image::RgbImage;
use tracing::{debug, instrument};

use crate::{config::SuperResolutionConfig, error::SuperResolutionError, traits::SuperResolver};

/// Oracle that is never available. Every request falls back to resampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuperResolver;

impl SuperResolver for NoSuperResolver {
    fn name(&self) -> &str {
        "none"
    }

    fn super_resolve(&self, _image: &RgbImage, _scale: u32) -> Result<RgbImage, SuperResolutionError> {
        Err(SuperResolutionError::Unavailable(
            "no super-resolution model configured".into(),
        ))
    }
}

/// Runs an external upscaler on temporary PNG files.
///
/// `{input}`, `{output}` and `{scale}` in `args` are replaced per call.
#[derive(Debug, Clone)]
pub struct CommandSuperResolver {
    command: String,
    args: Vec<String>,
}

impl CommandSuperResolver {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// `None` when no command is configured.
    pub fn from_config(config: &SuperResolutionConfig) -> Option<Self> {
        config
            .command
            .as_ref()
            .map(|command| Self::new(command.clone(), config.args.clone()))
    }

    fn expand_args(&self, input: &str, output: &str, scale: u32) -> Vec<String> {
        let scale = scale.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", input)
                    .replace("{output}", output)
                    .replace("{scale}", &scale)
            })
            .collect()
    }
}

impl SuperResolver for CommandSuperResolver {
    fn name(&self) -> &str {
        &self.command
    }

    #[instrument(skip(self, image), fields(command = %self.command))]
    fn super_resolve(&self, image: &RgbImage, scale: u32) -> Result<RgbImage, SuperResolutionError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| SuperResolutionError::Failed(format!("temporary directory: {e}")))?;
        let input = workdir.path().join("input.png");
        let output = workdir.path().join("output.png");
        image
            .save(&input)
            .map_err(|e| SuperResolutionError::Failed(format!("writing oracle input: {e}")))?;

        let args = self.expand_args(
            &input.to_string_lossy(),
            &output.to_string_lossy(),
            scale,
        );
        debug!(?args, "Running super-resolution command");

        let result = Command::new(&self.command)
            .args(&args)
            .output()
            .map_err(|e| SuperResolutionError::Unavailable(format!("{}: {e}", self.command)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SuperResolutionError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                result.status,
                stderr.trim()
            )));
        }

        let upscaled = image::open(&output)
            .map_err(|e| SuperResolutionError::Failed(format!("reading oracle output: {e}")))?
            .to_rgb8();

        let expected = (image.width() * scale, image.height() * scale);
        if upscaled.dimensions() != expected {
            return Err(SuperResolutionError::InvalidOutput {
                expected,
                actual: upscaled.dimensions(),
            });
        }
        Ok(upscaled)
    }
}

/// The oracle described by `config`, or [`NoSuperResolver`] when none is set.
pub fn super_resolver_from_config(config: &SuperResolutionConfig) -> Box<dyn SuperResolver> {
    match CommandSuperResolver::from_config(config) {
        Some(resolver) => Box::new(resolver),
        None => Box::new(NoSuperResolver),
    }
}
