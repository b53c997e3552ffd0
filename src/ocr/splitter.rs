//! Cut a page at its gutter and persist both halves.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader};
use tracing::info;

use super::backend::OcrError;
use super::gutter::GutterColumn;

/// Left and right halves of a page, with the files they were written to.
pub struct SplitPair {
    pub left: DynamicImage,
    pub right: DynamicImage,
    pub left_path: PathBuf,
    pub right_path: PathBuf,
}

impl SplitPair {
    /// Width of both halves combined.
    pub fn total_width(&self) -> u32 {
        self.left.width() + self.right.width()
    }
}

/// Decode the page at `path` upright, applying any EXIF orientation.
pub fn open_page(path: &Path) -> Result<DynamicImage, OcrError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Split `image` at `column`: left is `[0, column)`, right is `[column, width)`.
pub fn split_at(image: &DynamicImage, column: GutterColumn) -> Result<(DynamicImage, DynamicImage), OcrError> {
    let (width, height) = image.dimensions();
    let col = column.get();
    if col == 0 || col >= width {
        return Err(OcrError::DegenerateGutter { column: col, width });
    }

    let left = image.crop_imm(0, 0, col, height);
    let right = image.crop_imm(col, 0, width - col, height);
    Ok((left, right))
}

/// Paths of the two halves for `source` inside `splits_dir`.
///
/// `page.jpg` becomes `page_left.jpg` and `page_right.jpg`.
pub fn split_paths(source: &Path, splits_dir: &Path) -> (PathBuf, PathBuf) {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let suffix = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (
        splits_dir.join(format!("{}_left{}", stem, suffix)),
        splits_dir.join(format!("{}_right{}", stem, suffix)),
    )
}

/// Split `image` (read from `source`) and write both halves into `splits_dir`.
///
/// Each half goes to a temporary file in `splits_dir` first and is renamed
/// into place, so a failure never leaves a truncated split behind.
pub fn split_and_save(
    image: &DynamicImage,
    source: &Path,
    column: GutterColumn,
    splits_dir: &Path,
) -> Result<SplitPair, OcrError> {
    let (left, right) = split_at(image, column)?;

    std::fs::create_dir_all(splits_dir)?;
    let format = ImageFormat::from_path(source)?;
    let (left_path, right_path) = split_paths(source, splits_dir);

    save_atomic(&left, &left_path, format)?;
    save_atomic(&right, &right_path, format)?;

    info!(
        "Split {} into {} and {}",
        source.file_name().unwrap_or_default().to_string_lossy(),
        left_path.file_name().unwrap_or_default().to_string_lossy(),
        right_path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(SplitPair {
        left,
        right,
        left_path,
        right_path,
    })
}

fn save_atomic(image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<(), OcrError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

    // JPEG has no alpha channel.
    if format == ImageFormat::Jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_to(tmp.as_file_mut(), format)?;
    } else {
        image.write_to(tmp.as_file_mut(), format)?;
    }

    tmp.persist(path).map_err(|e| OcrError::Io(e.error))?;
    Ok(())
}
