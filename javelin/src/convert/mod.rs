//! Image to PDF conversion.
//!
//! Each image becomes one page exactly the size of the image at the chosen
//! resolution (100 DPI unless configured). Transparent pixels are blended
//! onto white; pages carry opaque RGB images only.
//!
//! # Examples
//!
//! ```no_run
//! use javelin::convert::ImageConverter;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let images = vec![PathBuf::from("scan1.png"), PathBuf::from("scan2.jpg")];
//! let doc = ImageConverter::new().convert(&images).await?;
//! assert_eq!(doc.get_pages().len(), 2);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tokio::task;
use tracing::{debug, info, instrument};

use crate::config::CompressionLevel;
use crate::error::{JavelinError, Result};
use crate::io::{PdfWriter, read_file};
use crate::utils::{extension_lowercase, file_stem_or};

/// Extensions accepted as image inputs.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Resolution used to size pages when none is configured.
pub const DEFAULT_DPI: f32 = 100.0;

const POINTS_PER_INCH: f32 = 72.0;

/// Whether `path` has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    extension_lowercase(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Packs images into PDF pages.
#[derive(Debug, Clone, Copy)]
pub struct ImageConverter {
    dpi: f32,
    compression: CompressionLevel,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            compression: CompressionLevel::Standard,
        }
    }
}

impl ImageConverter {
    /// Create a converter at 100 DPI.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `dpi` to size pages. Non-positive values fall back to the default.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = if dpi > 0.0 { dpi } else { DEFAULT_DPI };
        self
    }

    /// Compression for files written by
    /// [`convert_separately`](Self::convert_separately).
    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Page size in points for an image of `width` x `height` pixels.
    pub fn page_size(&self, width: u32, height: u32) -> (f32, f32) {
        (
            width as f32 * POINTS_PER_INCH / self.dpi,
            height as f32 * POINTS_PER_INCH / self.dpi,
        )
    }

    /// Convert images into a single document, one page per image, in order.
    ///
    /// # Errors
    ///
    /// - [`JavelinError::NoInputs`] for an empty list
    /// - [`JavelinError::UnsupportedFormat`] for an unsupported extension or
    ///   undecodable image
    /// - input file errors
    #[instrument(skip_all, fields(images = paths.len()))]
    pub async fn convert(&self, paths: &[PathBuf]) -> Result<Document> {
        if paths.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            sources.push((path.display().to_string(), self.read_image(path).await?));
        }

        let converter = *self;
        let doc = task::spawn_blocking(move || {
            let images = sources
                .iter()
                .map(|(origin, bytes)| decode_image(bytes, origin))
                .collect::<Result<Vec<_>>>()?;
            converter.document_from_images(&images)
        })
        .await??;

        info!(pages = paths.len(), "Converted images");
        Ok(doc)
    }

    /// Convert each image into its own PDF inside `out_dir`.
    ///
    /// Files are named after the image stem; a clash gets a numeric suffix
    /// (`scan.pdf`, `scan_2.pdf`).
    ///
    /// # Errors
    ///
    /// As [`convert`](Self::convert), plus output write errors. Files written
    /// before a failure are left in place.
    pub async fn convert_separately(&self, paths: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>> {
        if paths.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        let writer = PdfWriter::with_compression(self.compression);
        let mut used = HashSet::new();
        let mut outputs = Vec::with_capacity(paths.len());

        for path in paths {
            let doc = self.convert(std::slice::from_ref(path)).await?;
            let output = out_dir.join(unique_name(file_stem_or(path, "image"), &mut used));
            writer.save(&doc, &output).await?;
            debug!(output = %output.display(), "Wrote image PDF");
            outputs.push(output);
        }

        Ok(outputs)
    }

    /// Build a document from decoded images.
    ///
    /// # Errors
    ///
    /// Returns [`JavelinError::NoInputs`] for an empty slice.
    pub fn document_from_images(&self, images: &[DynamicImage]) -> Result<Document> {
        if images.is_empty() {
            return Err(JavelinError::NoInputs);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids = images
            .iter()
            .map(|img| self.add_image_page(&mut doc, pages_id, img).map(Object::Reference))
            .collect::<Result<Vec<_>>>()?;
        let count = kids.len() as i64;

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }

    async fn read_image(&self, path: &Path) -> Result<Vec<u8>> {
        if !is_supported_image(path) {
            return Err(JavelinError::unsupported_format(
                path.display().to_string(),
                format!("expected one of: {}", SUPPORTED_EXTENSIONS.join(", ")),
            ));
        }
        read_file(path).await
    }

    fn add_image_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        img: &DynamicImage,
    ) -> Result<ObjectId> {
        let rgb = flatten_onto_white(img);
        let (px_w, px_h) = rgb.dimensions();
        let (width, height) = self.page_size(px_w, px_h);

        let mut image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_w as i64,
                "Height" => px_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        );
        if let Err(e) = image.compress() {
            debug!(error = %e, "Leaving image stream uncompressed");
        }
        let image_id = doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| JavelinError::serialization(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        }))
    }
}

fn decode_image(bytes: &[u8], origin: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| JavelinError::unsupported_format(origin, format!("cannot decode image: {e}")))
}

/// Blend alpha onto a white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut name = format!("{stem}.pdf");
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{stem}_{n}.pdf");
        n += 1;
    }
    name
}
