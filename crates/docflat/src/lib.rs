//! # Document Flattening Library
//!
//! Turns a photograph of a paper document into a flat, straight, high
//! resolution image of just the document.
//!
//! ## Core Features
//!
//! - **Region Extraction**: Keep the largest region of a segmentation mask, composited onto white
//! - **Rectification**: Find the document quadrilateral and warp it to an axis-aligned rectangle
//! - **Resolution Normalization**: Upscale small documents through a super-resolution oracle,
//!   falling back to Lanczos resampling plus an unsharp mask
//! - **Enhancement**: Optional local contrast equalization and sharpening of the flattened page
//! - **Pluggable Oracles**: Segmentation and super-resolution are traits; bring your own model
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docflat::{LuminanceSegmenter, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .segmenter(LuminanceSegmenter::new(120))
//!     .build();
//!
//! let report = pipeline.process_file("photo.jpg", "flat.png")?;
//! println!("{}", report.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use docflat::{DocflatConfig, MaskFileSegmenter, Pipeline};
//!
//! let mut config = DocflatConfig::from_file("docflat.toml")?;
//! config.output.crop_to_content = true;
//!
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .segmenter(MaskFileSegmenter::new("photo_mask.png"))
//!     .build();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod algorithms;
pub mod config;
pub mod error;
pub mod io;
pub mod oracles;
pub mod pipeline;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use algorithms::*;
pub use config::DocflatConfig;
pub use error::{DocflatError, Result, SoftFailure, SuperResolutionError};
pub use io::{load_image, save_image};
pub use oracles::*;
pub use pipeline::{
    FailureReason, Pipeline, PipelineOutput, PipelineReport, PipelineState,
    builder::PipelineBuilder,
};
pub use traits::*;
pub use types::{ProbabilityMask, Quadrilateral, ScaleDecision};
