use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DocflatError, Result};

/// Everything the pipeline needs, passed in explicitly at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct DocflatConfig {
    pub extraction: ExtractionConfig,
    pub rectification: RectificationConfig,
    pub normalization: NormalizationConfig,
    pub output: OutputConfig,
    pub enhancement: EnhancementConfig,
    pub input: InputConfig,
    pub artifacts: ArtifactsConfig,
    pub super_resolution: SuperResolutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Probabilities strictly above this are foreground
    #[schemars(range(min = 0.0, max = 1.0))]
    pub mask_threshold: f32,
    /// Radius of the square structuring element (1 = 3x3)
    pub closing_radius: u8,
    /// Number of closing iterations
    pub closing_iterations: u8,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mask_threshold: 0.5,
            closing_radius: 1,
            closing_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RectificationConfig {
    /// Gray levels strictly above this count as background
    pub white_threshold: u8,
    /// Colour for destination pixels that map outside the source
    pub fill: [u8; 3],
}

impl Default for RectificationConfig {
    fn default() -> Self {
        Self {
            white_threshold: 240,
            fill: [255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct NormalizationConfig {
    pub unsharp: UnsharpParams,
}

/// Unsharp-mask parameters for the resampling fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct UnsharpParams {
    pub sigma: f32,
    pub amount: f32,
    /// Minimum |original - blurred| for a pixel to be sharpened; 0 disables
    pub threshold: f32,
}

impl Default for UnsharpParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            amount: 1.5,
            threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Trim surrounding white space after rectification
    pub crop_to_content: bool,
    pub crop_padding: u32,
    /// Gray levels at or below this count as content when cropping
    pub crop_white_level: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            crop_to_content: false,
            crop_padding: 10,
            crop_white_level: 250,
        }
    }
}

/// Optional contrast equalization and sharpening of the rectified page.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    /// Histogram clip limit as a multiple of the mean bin height
    pub clip_limit: f32,
    /// Tiles per side for local equalization
    #[schemars(range(min = 1))]
    pub tile_grid: u32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub max_input_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 16 * 1024 * 1024,
            allowed_extensions: ["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl InputConfig {
    pub fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory for per-stage outputs and the run report
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SuperResolutionConfig {
    /// External upscaler executable; unset means no oracle
    pub command: Option<String>,
    /// Arguments; `{input}`, `{output}` and `{scale}` are substituted
    pub args: Vec<String>,
}

impl Default for SuperResolutionConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: ["-i", "{input}", "-o", "{output}", "-s", "{scale}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl DocflatConfig {
    /// Get the JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DocflatConfig)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path_ref)?),
            Some("json") => Self::from_json(&fs::read_to_string(path_ref)?),
            _ => Err(DocflatError::UnsupportedConfigFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save configuration, format chosen by extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(DocflatError::UnsupportedConfigFormat),
        };
        fs::write(path_ref, content)?;
        Ok(())
    }
}
