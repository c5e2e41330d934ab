use docflat::{
    DocflatConfig, DocflatError, LuminanceSegmenter, NoSuperResolver, Pipeline, PipelineState,
    ProbabilityMask, Rectifier, ResolutionNormalizer, ScaleDecision, SoftFailure, UpscalePath,
    save_image,
};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

const PAPER: Rgb<u8> = Rgb([190, 190, 185]);

/// 500x700 photo of a 260x380 sheet rotated by atan(3/4) on a dark desk.
fn rotated_document_photo() -> RgbImage {
    let mut image = RgbImage::from_pixel(500, 700, Rgb([35, 30, 28]));
    let corners = [
        Point::new(260, 120),
        Point::new(468, 276),
        Point::new(240, 580),
        Point::new(32, 424),
    ];
    draw_polygon_mut(&mut image, &corners, PAPER);
    image
}

fn pipeline() -> Pipeline {
    Pipeline::builder()
        .segmenter(LuminanceSegmenter::new(100))
        .super_resolver(NoSuperResolver)
        .build()
}

#[test]
fn rotated_document_is_flattened_and_upscaled() {
    let output = pipeline().process(&rotated_document_photo()).unwrap();
    let report = &output.report;

    assert_eq!(report.input_size, (500, 700));
    assert_eq!(report.state(), PipelineState::Done);

    let (w, h) = report.rectified_size.unwrap();
    let ratio = w.max(h) as f64 / w.min(h) as f64;
    assert!((ratio - 380.0 / 260.0).abs() < 0.05, "aspect ratio {ratio} from {w}x{h}");

    let centre = output.image.get_pixel(output.image.width() / 2, output.image.height() / 2);
    for c in 0..3 {
        assert!((centre.0[c] as i32 - PAPER.0[c] as i32).abs() <= 3, "{centre:?}");
    }

    assert_eq!(
        report.decision,
        Some(ScaleDecision {
            scale_factor: 4,
            skip: false
        })
    );
    assert_eq!(report.upscale_path, Some(UpscalePath::Fallback));
    assert_eq!(output.image.dimensions(), (w * 4, h * 4));
    assert!(matches!(
        report.soft_failures.as_slice(),
        [SoftFailure::SuperResolutionUnavailable { .. }]
    ));
}

#[test]
fn full_frame_document_reaches_four_times_size() {
    let image = RgbImage::from_fn(500, 700, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let normalized = ResolutionNormalizer::default().normalize(&image, &NoSuperResolver);
    assert_eq!(normalized.decision.scale_factor, 4);
    assert_eq!(normalized.path, UpscalePath::Fallback);
    assert_eq!(normalized.image.dimensions(), (2000, 2800));
}

#[test]
fn uniform_white_has_no_content_region() {
    let white = RgbImage::from_pixel(120, 90, Rgb([255, 255, 255]));
    let err = Rectifier::default().rectify(&white).unwrap_err();
    assert!(matches!(err, DocflatError::NoContentRegion));

    // A mask covering the whole frame gets past extraction and stops at rectification.
    let everything = ProbabilityMask::new(120, 90, vec![1.0; 120 * 90]).unwrap();
    let err = pipeline()
        .process_with_mask(&white, Some(&everything))
        .unwrap_err();
    assert!(matches!(err, DocflatError::NoContentRegion));
}

#[test]
fn empty_mask_is_no_document() {
    let photo = rotated_document_photo();
    let empty = ProbabilityMask::new(500, 700, vec![0.0; 500 * 700]).unwrap();
    let err = pipeline().process_with_mask(&photo, Some(&empty)).unwrap_err();
    assert!(matches!(err, DocflatError::NoDocumentDetected));
}

#[test]
fn failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("white.png");
    let output = dir.path().join("flat.png");
    let artifacts = dir.path().join("artifacts");
    save_image(&input, &RgbImage::from_pixel(80, 60, Rgb([255, 255, 255]))).unwrap();

    let mut config = DocflatConfig::default();
    config.artifacts.dir = Some(artifacts.clone());
    // Everything is brighter than 0, so extraction keeps the blank page.
    let pipeline = Pipeline::builder()
        .config(config)
        .segmenter(LuminanceSegmenter::new(0))
        .build();

    let err = pipeline.process_file(&input, &output).unwrap_err();
    assert!(matches!(err, DocflatError::NoContentRegion));
    assert!(!output.exists());
    assert!(!artifacts.join("report.json").exists());
    assert!(artifacts.join("step1_extracted.png").exists());
}
