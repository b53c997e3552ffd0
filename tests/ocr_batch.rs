//! Batch OCR over a directory of synthetic two-column pages.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use cbt_journal::ocr::{GutterConfig, OcrError, OcrOptions, PageBatchProcessor, VisionModel};

/// Reads back the file stem; fails for any page whose name contains `fail_on`.
struct MockVision {
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockVision {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VisionModel for MockVision {
    fn model_name(&self) -> &str {
        "mock-vision"
    }

    async fn extract_text(&self, image_path: &Path, _prompt: &str) -> Result<String, OcrError> {
        self.calls.lock().unwrap().push(image_path.to_path_buf());
        let stem = image_path.file_stem().unwrap().to_string_lossy().into_owned();
        if self.fail_on.is_some_and(|f| stem.contains(f)) {
            return Err(OcrError::Model("connection refused".into()));
        }
        Ok(format!("text of {}\nsecond line\r\nthird", stem))
    }
}

/// White page with two blocks of vertical strokes either side of x = 1000.
fn two_column_page() -> DynamicImage {
    let mut img = RgbImage::from_pixel(2000, 800, Rgb([255, 255, 255]));
    for (start, end) in [(500, 740), (1260, 1500)] {
        for bar in (start..=end).step_by(20) {
            for x in bar..bar + 4 {
                for y in 80..720 {
                    img.put_pixel(x, y, Rgb([20, 20, 20]));
                }
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

fn write_page(path: &Path) {
    two_column_page().save(path).unwrap();
}

/// JPEG of `img` stored rotated a quarter turn, tagged EXIF Orientation 6.
fn write_sideways_jpeg(img: &DynamicImage, path: &Path) {
    let mut encoded = std::io::Cursor::new(Vec::new());
    img.rotate270()
        .write_to(&mut encoded, ImageFormat::Jpeg)
        .unwrap();
    let encoded = encoded.into_inner();

    let mut exif = b"Exif\0\0II*\0".to_vec();
    exif.extend_from_slice(&8u32.to_le_bytes());
    exif.extend_from_slice(&1u16.to_le_bytes());
    exif.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 1, 0, 0, 0, 6, 0, 0, 0]);
    exif.extend_from_slice(&0u32.to_le_bytes());

    let mut out = encoded[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((exif.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&encoded[2..]);
    std::fs::write(path, out).unwrap();
}

fn processor(model: Arc<MockVision>) -> PageBatchProcessor {
    let options = OcrOptions {
        model: "mock-vision".into(),
        ..OcrOptions::default()
    };
    PageBatchProcessor::new(model, options, GutterConfig::default())
}

#[tokio::test]
async fn failing_page_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["page_3.png", "page_1.png", "page_2.png"] {
        write_page(&dir.path().join(name));
    }

    let model = Arc::new(MockVision::new(Some("page_2")));
    let corpus = processor(model.clone())
        .process_directory(dir.path())
        .await
        .unwrap();

    assert!(!corpus.contains('\n'));
    assert!(!corpus.contains('\r'));

    let p1 = corpus.find("--- page_1.png ---").unwrap();
    let p2 = corpus.find("--- page_2.png ---").unwrap();
    let p3 = corpus.find("--- page_3.png ---").unwrap();
    assert!(p1 < p2 && p2 < p3);

    assert!(corpus.contains("text of page_1_left second line third text of page_1_right"));
    assert!(corpus.contains("text of page_3_left"));
    assert!(corpus.contains("text of page_3_right"));
    assert!(corpus[p2..p3].contains("[OCR processing failed: Model error: connection refused]"));
    assert!(!corpus[p2..p3].contains("text of"));

    // Left column is always read before the right one.
    let calls = model.calls.lock().unwrap();
    assert_eq!(calls.len(), 6);
    for pair in calls.chunks(2) {
        assert!(pair[0].to_string_lossy().ends_with("_left.png"));
        assert!(pair[1].to_string_lossy().ends_with("_right.png"));
    }

    let splits = dir.path().join("splits");
    for name in ["page_1_left.png", "page_1_right.png", "page_3_right.png"] {
        assert!(splits.join(name).is_file(), "{} missing", name);
    }
    let left = image::open(splits.join("page_1_left.png")).unwrap();
    let right = image::open(splits.join("page_1_right.png")).unwrap();
    assert_eq!(left.width() + right.width(), 2000);
    assert!(left.width() > 744 && left.width() < 1260);
}

#[tokio::test]
async fn sideways_photo_is_split_between_columns() {
    let dir = tempfile::tempdir().unwrap();
    write_sideways_jpeg(&two_column_page(), &dir.path().join("phone.jpg"));

    let corpus = processor(Arc::new(MockVision::new(None)))
        .process_directory(dir.path())
        .await
        .unwrap();
    assert!(corpus.contains("text of phone_left"));

    let splits = dir.path().join("splits");
    let left = image::open(splits.join("phone_left.jpg")).unwrap();
    let right = image::open(splits.join("phone_right.jpg")).unwrap();
    assert_eq!(left.height(), 800);
    assert_eq!(left.width() + right.width(), 2000);
    assert!(left.width() > 744 && left.width() < 1260);
}

#[tokio::test]
async fn undecodable_page_is_annotated() {
    let dir = tempfile::tempdir().unwrap();
    write_page(&dir.path().join("a.png"));
    std::fs::write(dir.path().join("b.jpg"), b"not really a jpeg").unwrap();

    let corpus = processor(Arc::new(MockVision::new(None)))
        .process_directory(dir.path())
        .await
        .unwrap();

    assert!(corpus.contains("text of a_left"));
    let b = corpus.find("--- b.jpg ---").unwrap();
    assert!(corpus[b..].contains("[OCR processing failed:"));
}

#[tokio::test]
async fn blank_page_fails_without_degenerate_split() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(1200, 800, Rgb([255, 255, 255]))
        .save(dir.path().join("blank.png"))
        .unwrap();

    let model = Arc::new(MockVision::new(None));
    let corpus = processor(model.clone())
        .process_directory(dir.path())
        .await
        .unwrap();

    assert!(corpus.contains("--- blank.png --- [OCR processing failed: No gutter found"));
    assert!(model.calls.lock().unwrap().is_empty());
    assert!(!dir.path().join("splits").join("blank_left.png").exists());
}

#[tokio::test]
async fn empty_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("readme.txt"), "no pages").unwrap();

    let err = processor(Arc::new(MockVision::new(None)))
        .process_directory(dir.path())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains(&dir.path().display().to_string()));
}

#[tokio::test]
async fn missing_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = processor(Arc::new(MockVision::new(None)))
        .process_directory(&dir.path().join("absent"))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::DirectoryNotFound(_)));
}
