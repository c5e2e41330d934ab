use docflat::{
    DocflatConfig, DocflatError, LuminanceSegmenter, MaskFileSegmenter, Pipeline, PipelineReport,
    Segmenter,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Docflat(#[from] DocflatError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
    #[error("{failed} of {total} documents failed")]
    BatchFailed { failed: usize, total: usize },
}

/// Pick the segmentation oracle: a mask file when given, otherwise luminance.
pub fn segmenter_for(mask: Option<&Path>, luminance: Option<u8>) -> Box<dyn Segmenter> {
    match (mask, luminance) {
        (Some(mask), _) => Box::new(MaskFileSegmenter::new(mask)),
        (None, Some(level)) => Box::new(LuminanceSegmenter::new(level)),
        (None, None) => Box::new(LuminanceSegmenter::default()),
    }
}

/// One photo in a batch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Document {
    pub name: String,
    pub input: PathBuf,
    /// Precomputed segmentation mask for this photo
    pub mask: Option<PathBuf>,
    /// Brightness level for the luminance segmenter when no mask is given
    pub luminance: Option<u8>,
}

/// Batch definition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Manifest {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub settings: DocflatConfig,
    pub documents: Vec<Document>,
}

/// Per-document results of a batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<(String, PipelineReport)>,
    pub failed: Vec<(String, DocflatError)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn into_result(self) -> Result<Self, CliError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CliError::BatchFailed {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

impl Manifest {
    /// Load a manifest from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a manifest from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a manifest from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a manifest from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the manifest
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    pub fn output_path(&self, document: &Document) -> PathBuf {
        self.output_dir.join(format!("{}.png", document.name))
    }

    /// Process every document in order. A failed document is logged and skipped.
    pub fn run(&self) -> Result<BatchSummary, CliError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut summary = BatchSummary::default();

        for document in &self.documents {
            let output = self.output_path(document);
            info!("Processing document '{}' -> {}", document.name, output.display());

            let mut settings = self.settings.clone();
            settings.artifacts.dir = settings
                .artifacts
                .dir
                .map(|dir| dir.join(&document.name));

            let pipeline = Pipeline::builder()
                .config(settings)
                .segmenter(segmenter_for(document.mask.as_deref(), document.luminance))
                .build();

            match pipeline.process_file(&document.input, &output) {
                Ok(report) => summary.succeeded.push((document.name.clone(), report)),
                Err(err) => {
                    error!("Document '{}' failed: {}", document.name, err);
                    summary.failed.push((document.name.clone(), err));
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_manifest_from_toml() {
        let manifest = Manifest::from_toml(
            r#"
            output_dir = "out"

            [settings.output]
            crop_to_content = true

            [[documents]]
            name = "receipt"
            input = "photos/receipt.jpg"
            mask = "masks/receipt.png"

            [[documents]]
            name = "letter"
            input = "photos/letter.jpg"
            luminance = 90
            "#,
        )
        .unwrap();

        assert_eq!(manifest.documents.len(), 2);
        assert!(manifest.settings.output.crop_to_content);
        assert_eq!(manifest.documents[1].luminance, Some(90));
        assert_eq!(
            manifest.output_path(&manifest.documents[0]),
            PathBuf::from("out/receipt.png")
        );
    }

    #[test]
    fn test_unsupported_manifest_format() {
        let err = Manifest::from_file("batch.yaml").unwrap_err();
        assert!(matches!(err, CliError::UnsupportedFileFormat));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("good.png");
        let mut image = RgbImage::from_pixel(160, 120, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut image, Rect::at(30, 20).of_size(90, 70), Rgb([210, 210, 210]));
        image.save(&photo).unwrap();

        let manifest = Manifest {
            output_dir: dir.path().join("out"),
            settings: DocflatConfig::default(),
            documents: vec![
                Document {
                    name: "missing".into(),
                    input: dir.path().join("missing.png"),
                    mask: None,
                    luminance: None,
                },
                Document {
                    name: "good".into(),
                    input: photo,
                    mask: None,
                    luminance: Some(100),
                },
            ],
        };

        let summary = manifest.run().unwrap();
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "missing");
        assert!(dir.path().join("out/good.png").exists());
        assert!(!dir.path().join("out/missing.png").exists());

        let err = summary.into_result().unwrap_err();
        assert!(matches!(err, CliError::BatchFailed { failed: 1, total: 2 }));
    }
}
