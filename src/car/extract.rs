#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, info, warn};

use crate::car::catalog::RenditionCollection;
use crate::car::error::{CatalogError, CatalogResult};
use crate::car::path::extraction_path;
use crate::car::rendition::Rendition;

/// Outcome of a bulk export. One item failing never stops the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub written: Vec<PathBuf>,
    /// Rendition name to failure reason. A repeated name gets a ` (N)` suffix.
    pub failed: BTreeMap<String, String>,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes every rendition with pixels or source bytes under `dir`.
///
/// Rasters are encoded in the format their name's extension implies, PNG
/// when that format is unknown or cannot be written. Data-backed renditions
/// are written verbatim. Colors have neither and are skipped. Renditions
/// sharing a name (appearance or idiom variants) land in `name-2.ext`,
/// `name-3.ext` and so on, in collection order.
pub fn extract_all(collection: &RenditionCollection, dir: &Path) -> CatalogResult<ExtractReport> {
    std::fs::create_dir_all(dir)?;

    let mut report = ExtractReport::default();
    let mut taken = HashSet::new();
    for rendition in collection.iter() {
        match extract_into(rendition, dir, &mut taken) {
            Ok(Some(path)) => {
                debug!(name = %rendition.name(), path = %path.display(), "extracted");
                report.written.push(path);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(name = %rendition.name(), error = %e, "extraction failed");
                let key = distinct_key(&report.failed, rendition.name());
                report.failed.insert(key, e.to_string());
            }
        }
    }

    info!(
        dir = %dir.display(),
        written = report.written.len(),
        failed = report.failed.len(),
        "extraction finished"
    );
    Ok(report)
}

/// Exports one rendition. `Ok(None)` when it has nothing to write.
pub fn extract_one(rendition: &Rendition, dir: &Path) -> CatalogResult<Option<PathBuf>> {
    extract_into(rendition, dir, &mut HashSet::new())
}

/// `taken` holds the paths already written by this run.
fn extract_into(
    rendition: &Rendition,
    dir: &Path,
    taken: &mut HashSet<PathBuf>,
) -> CatalogResult<Option<PathBuf>> {
    if let Some(raster) = rendition.raster()? {
        let path = output_path(rendition, dir)?;
        let (path, format) = image_target(path);
        let path = claim(taken, path);
        write_raster(raster, &path, format)?;
        return Ok(Some(path));
    }

    if let Some(bytes) = rendition.data()? {
        let path = claim(taken, output_path(rendition, dir)?);
        create_parent(&path)?;
        std::fs::write(&path, &bytes)?;
        return Ok(Some(path));
    }

    Ok(None)
}

fn output_path(rendition: &Rendition, dir: &Path) -> CatalogResult<PathBuf> {
    extraction_path(dir, &file_name(rendition)).ok_or_else(|| {
        CatalogError::Invalid(format!("{:?} is not usable as a file name", rendition.name()))
    })
}

/// Display name, plus the scale suffix and the source extension when the
/// display name has no extension of its own.
fn file_name(rendition: &Rendition) -> String {
    let name = rendition.name();
    if Path::new(name).extension().is_some() {
        return name.to_string();
    }
    let mut out = name.to_string();
    if rendition.scale() > 1 {
        out.push_str(&format!("@{}x", rendition.scale()));
    }
    if let Some(ext) = Path::new(rendition.rendition_name())
        .extension()
        .and_then(|e| e.to_str())
    {
        out.push('.');
        out.push_str(ext);
    }
    out
}

/// First of `path`, `stem-2.ext`, `stem-3.ext`, ... not yet in `taken`.
fn claim(taken: &mut HashSet<PathBuf>, path: PathBuf) -> PathBuf {
    if taken.insert(path.clone()) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 2u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = path.with_file_name(name);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn distinct_key(failed: &BTreeMap<String, String>, name: &str) -> String {
    if !failed.contains_key(name) {
        return name.to_string();
    }
    (2u32..)
        .map(|n| format!("{name} ({n})"))
        .find(|k| !failed.contains_key(k))
        .unwrap_or_else(|| name.to_string())
}

fn image_target(path: PathBuf) -> (PathBuf, ImageFormat) {
    match ImageFormat::from_path(&path) {
        Ok(format) if format.writing_enabled() => (path, format),
        _ => {
            let mut packed: OsString = path.into_os_string();
            packed.push(".png");
            (PathBuf::from(packed), ImageFormat::Png)
        }
    }
}

fn write_raster(raster: &RgbaImage, path: &Path, format: ImageFormat) -> CatalogResult<()> {
    create_parent(path)?;
    let image = DynamicImage::ImageRgba8(raster.clone());
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    image.save_with_format(path, format)?;
    Ok(())
}

fn create_parent(path: &Path) -> CatalogResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
