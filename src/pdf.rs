use std::path::Path;

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, XObjectTransform,
};

use crate::error::GenerateError;

const PDF_SIGNATURE: &[u8] = b"%PDF-";

// US Letter in points.
const PAGE_WIDTH_PT: f32 = 612.0;
const PAGE_HEIGHT_PT: f32 = 792.0;
const PAGE_MARGIN_PT: f32 = 18.0;

pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_SIGNATURE)
}

/// Places a PNG screenshot on a single Letter page, scaled to fit inside the
/// margins and pinned to the top edge.
pub fn image_to_pdf(png: &[u8], title: &str) -> anyhow::Result<Vec<u8>> {
    let decoded = image::load_from_memory(png)
        .map_err(|err| anyhow::anyhow!("decode screenshot: {err}"))?;
    let (px_width, px_height) = (decoded.width(), decoded.height());
    if px_width == 0 || px_height == 0 {
        anyhow::bail!("screenshot has no pixels");
    }

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let raw = RawImage::decode_from_bytes(png, &mut warnings)
        .map_err(|err| anyhow::anyhow!("embed screenshot: {err}"))?;

    let mut doc = PdfDocument::new(title);
    let xobj_id = doc.add_image(&raw);

    let avail_w = PAGE_WIDTH_PT - 2.0 * PAGE_MARGIN_PT;
    let avail_h = PAGE_HEIGHT_PT - 2.0 * PAGE_MARGIN_PT;
    // At dpi=72 one pixel is one point.
    let scale = (avail_w / px_width as f32).min(avail_h / px_height as f32);
    let drawn_w = px_width as f32 * scale;
    let drawn_h = px_height as f32 * scale;

    let ops = vec![Op::UseXobject {
        id: xobj_id,
        transform: XObjectTransform {
            translate_x: Some(Pt((PAGE_WIDTH_PT - drawn_w) / 2.0)),
            translate_y: Some(Pt(PAGE_HEIGHT_PT - PAGE_MARGIN_PT - drawn_h)),
            dpi: Some(72.0),
            scale_x: Some(scale),
            scale_y: Some(scale),
            rotate: None,
        },
    }];

    let page = PdfPage::new(
        Mm(PAGE_WIDTH_PT * 0.352778),
        Mm(PAGE_HEIGHT_PT * 0.352778),
        ops,
    );
    doc.with_pages(vec![page]);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for warning in &warnings {
        tracing::debug!(?warning, "pdf warning");
    }

    Ok(bytes)
}

/// Writes `bytes` to `path` through a sibling temp file and a rename, so the
/// target is either untouched or complete.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GenerateError> {
    let write_err = |source: std::io::Error| GenerateError::Write {
        path: path.to_path_buf(),
        source,
    };

    if !has_pdf_signature(bytes) {
        return Err(write_err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "captured bytes are not a PDF",
        )));
    }

    let parent = crate::request::output_parent(path);
    let file_name = path
        .file_name()
        .ok_or_else(|| write_err(std::io::Error::other("output path has no file name")))?;
    let tmp_path = parent.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    if let Err(err) = std::fs::write(&tmp_path, bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(err));
    }
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(err));
    }

    Ok(())
}

/// Small opaque PNG for screenshot tests.
#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([220, 220, 220]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode sample png");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_check() {
        assert!(has_pdf_signature(b"%PDF-1.7\n..."));
        assert!(!has_pdf_signature(b"<!doctype html>"));
        assert!(!has_pdf_signature(b""));
    }

    #[test]
    fn screenshot_becomes_a_pdf() {
        let png = sample_png(192, 108);
        assert!(image::load_from_memory(&png).is_ok());

        let bytes = image_to_pdf(&png, "worksheet").unwrap();
        assert!(has_pdf_signature(&bytes));
        assert!(bytes.len() > PDF_SIGNATURE.len());
    }

    #[test]
    fn screenshot_rejects_non_images() {
        let err = image_to_pdf(b"not a png", "worksheet").unwrap_err();
        assert!(err.to_string().contains("decode screenshot"));
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sheet.pdf");
        std::fs::write(&path, b"%PDF-1.4 old").unwrap();

        write_atomic(&path, b"%PDF-1.7 new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 new");
        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn write_atomic_leaves_prior_file_when_bytes_are_not_pdf() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("sheet.pdf");
        std::fs::write(&path, b"%PDF-1.4 old").unwrap();

        let err = write_atomic(&path, b"<html>").unwrap_err();

        assert!(matches!(err, GenerateError::Write { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 old");
    }

    #[test]
    fn write_atomic_fails_cleanly_when_directory_is_missing() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing").join("sheet.pdf");

        let err = write_atomic(&path, b"%PDF-1.7").unwrap_err();

        assert!(matches!(err, GenerateError::Write { .. }));
        assert!(!path.exists());
    }
}
