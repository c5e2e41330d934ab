pub mod builder;
pub mod state;

use std::fs;
use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    algorithms::{
        Rectification, RegionExtractor, Rectifier, ResolutionNormalizer, UpscalePath,
        crop_to_content, enhance_document,
    },
    config::DocflatConfig,
    error::{DocflatError, Result, SoftFailure},
    io::{load_image, save_image},
    traits::{Segmenter, SuperResolver},
    types::{ProbabilityMask, Quadrilateral, ScaleDecision},
};

pub use state::{FailureReason, PipelineState, Transition};

/// Intermediate images a run can persist alongside its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Extracted,
    Dewarped,
}

impl Artifact {
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Extracted => "step1_extracted.png",
            Artifact::Dewarped => "step2_dewarped.png",
        }
    }
}

pub const REPORT_FILE_NAME: &str = "report.json";

/// What happened during a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub input_size: (u32, u32),
    /// Every state the run passed through, in order
    pub trace: Vec<PipelineState>,
    pub quad: Option<Quadrilateral>,
    pub rectified_size: Option<(u32, u32)>,
    pub decision: Option<ScaleDecision>,
    pub upscale_path: Option<UpscalePath>,
    pub output_size: Option<(u32, u32)>,
    pub soft_failures: Vec<SoftFailure>,
}

impl PipelineReport {
    fn new(input_size: (u32, u32)) -> Self {
        Self {
            input_size,
            trace: vec![PipelineState::Extracting],
            quad: None,
            rectified_size: None,
            decision: None,
            upscale_path: None,
            output_size: None,
            soft_failures: Vec::new(),
        }
    }

    /// The latest state in the trace.
    pub fn state(&self) -> PipelineState {
        self.trace.last().cloned().unwrap_or(PipelineState::Extracting)
    }

    fn advance(&mut self, transition: Transition) -> Result<()> {
        let current = self.state();
        let next = current.advance(transition)?;
        info!(from = %current, to = %next, "Pipeline transition");
        self.trace.push(next);
        Ok(())
    }

    /// Record a fatal stage error, then hand it back for propagation.
    fn fail(&mut self, err: DocflatError) -> DocflatError {
        if let Some(reason) = FailureReason::from_error(&err) {
            self.halt(reason);
        }
        err
    }

    /// Record an error returned by the segmentation oracle.
    fn fail_segmenting(&mut self, err: DocflatError) -> DocflatError {
        self.halt(FailureReason::from_segmenter_error(&err));
        err
    }

    fn halt(&mut self, reason: FailureReason) {
        if let Err(invalid) = self.advance(Transition::Failed(reason)) {
            warn!(error = %invalid, "Could not record pipeline failure");
        }
    }

    fn soft_failure(&mut self, failure: SoftFailure) {
        warn!(%failure, "Soft failure recorded");
        self.soft_failures.push(failure);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub image: RgbImage,
    pub report: PipelineReport,
}

/// Extract, rectify and resolution-normalize one document photo.
pub struct Pipeline {
    config: DocflatConfig,
    segmenter: Option<Box<dyn Segmenter>>,
    super_resolver: Box<dyn SuperResolver>,
    extractor: RegionExtractor,
    rectifier: Rectifier,
    normalizer: ResolutionNormalizer,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(
        config: DocflatConfig,
        segmenter: Option<Box<dyn Segmenter>>,
        super_resolver: Box<dyn SuperResolver>,
    ) -> Self {
        Self {
            extractor: RegionExtractor::new(config.extraction.clone()),
            rectifier: Rectifier::new(config.rectification.clone()),
            normalizer: ResolutionNormalizer::new(config.normalization.unsharp),
            config,
            segmenter,
            super_resolver,
        }
    }

    pub fn config(&self) -> &DocflatConfig {
        &self.config
    }

    /// Segment `image` with the configured oracle and run every stage.
    pub fn process(&self, image: &RgbImage) -> Result<PipelineOutput> {
        self.run(image, None, &mut |_, _| Ok(()))
    }

    /// Run every stage with a mask obtained elsewhere.
    pub fn process_with_mask(
        &self,
        image: &RgbImage,
        mask: Option<&ProbabilityMask>,
    ) -> Result<PipelineOutput> {
        self.run(image, Some(mask), &mut |_, _| Ok(()))
    }

    /// Load `input`, process it and write the result to `output`.
    ///
    /// Nothing is written to `output` on failure. With `artifacts.dir` set the
    /// intermediate images and `report.json` are written there as well.
    #[instrument(skip(self, input, output), fields(input = %input.as_ref().display()))]
    pub fn process_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<PipelineReport> {
        let image = load_image(input.as_ref(), &self.config.input)?;
        let artifacts = self.config.artifacts.dir.as_deref();

        let result = self.run(&image, None, &mut |artifact, stage_image| match artifacts {
            Some(dir) => save_image(dir.join(artifact.file_name()), stage_image),
            None => Ok(()),
        })?;

        save_image(output.as_ref(), &result.image)?;
        if let Some(dir) = artifacts {
            fs::create_dir_all(dir)?;
            fs::write(dir.join(REPORT_FILE_NAME), result.report.to_json()?)?;
        }
        info!(output = %output.as_ref().display(), "Wrote flattened document");
        Ok(result.report)
    }

    /// `mask` of `None` asks the segmenter; `Some` uses the given mask as-is.
    fn run(
        &self,
        image: &RgbImage,
        mask: Option<Option<&ProbabilityMask>>,
        on_artifact: &mut dyn FnMut(Artifact, &RgbImage) -> Result<()>,
    ) -> Result<PipelineOutput> {
        let mut report = PipelineReport::new(image.dimensions());

        // Extracting
        let segmented;
        let mask = match mask {
            Some(mask) => mask,
            None => {
                segmented = self.segment(image).map_err(|e| report.fail_segmenting(e))?;
                segmented.as_ref()
            }
        };
        let extracted = self
            .extractor
            .extract(image, mask)
            .map_err(|e| report.fail(e))?;
        on_artifact(Artifact::Extracted, &extracted)?;
        report.advance(Transition::Succeeded)?;

        // Rectifying
        let Rectification {
            image: mut rectified,
            quad,
            soft_failure,
        } = self
            .rectifier
            .rectify(&extracted)
            .map_err(|e| report.fail(e))?;
        report.quad = Some(quad);
        if let Some(failure) = soft_failure {
            report.soft_failure(failure);
        }
        if self.config.output.crop_to_content {
            rectified = crop_to_content(
                &rectified,
                self.config.output.crop_white_level,
                self.config.output.crop_padding,
            );
        }
        if self.config.enhancement.enabled {
            rectified = enhance_document(&rectified, &self.config.enhancement);
        }
        report.rectified_size = Some(rectified.dimensions());
        on_artifact(Artifact::Dewarped, &rectified)?;
        report.advance(Transition::Succeeded)?;

        // Normalizing
        let normalized = self
            .normalizer
            .normalize(&rectified, self.super_resolver.as_ref());
        report.decision = Some(normalized.decision);
        report.upscale_path = Some(normalized.path);
        if let Some(failure) = normalized.soft_failure {
            report.soft_failure(failure);
        }
        report.output_size = Some(normalized.image.dimensions());
        report.advance(Transition::Succeeded)?;

        Ok(PipelineOutput {
            image: normalized.image,
            report,
        })
    }

    fn segment(&self, image: &RgbImage) -> Result<Option<ProbabilityMask>> {
        match &self.segmenter {
            Some(segmenter) => segmenter.segment(image),
            None => {
                warn!("No segmenter configured; no document can be detected");
                Ok(None)
            }
        }
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: segmenter {}, super-resolution '{}', crop {}, enhance {}",
            if self.segmenter.is_some() { "set" } else { "unset" },
            self.super_resolver.name(),
            if self.config.output.crop_to_content { "on" } else { "off" },
            if self.config.enhancement.enabled { "on" } else { "off" },
        )
    }
}
