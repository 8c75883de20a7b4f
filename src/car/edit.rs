#![forbid(unsafe_code)]

use std::path::Path;

use image::{imageops, RgbaImage};
use tracing::{debug, info, warn};

use crate::car::csi::{PayloadBody, RenditionPayload};
use crate::car::error::{EditError, EditResult};
use crate::car::format::{Compression, Rect, Size};
use crate::car::generator::RenditionGenerator;
use crate::car::rendition::{Rendition, RenditionPreview};
use crate::car::settings::EditSettings;
use crate::car::store::MutableAssetStore;

/// Pixels cleared around a link frame before the new art is placed.
const LINK_SEAM_PAD: u32 = 2;

/// Patch-rewrite engine for one catalog file at a time.
///
/// Every call opens its own [`MutableAssetStore`], mutates it in memory and
/// commits once. A failure before the commit leaves the file untouched.
#[derive(Debug, Clone, Default)]
pub struct CatalogEditor {
    settings: EditSettings,
}

impl CatalogEditor {
    pub fn new(settings: EditSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EditSettings {
        &self.settings
    }

    /// Deletes the asset behind `rendition` along with the lookups naming it.
    pub fn remove(&self, rendition: &Rendition, path: &Path) -> EditResult<()> {
        let mut store = open_store(path)?;
        let key = store
            .convert_key(rendition.key())
            .ok_or(EditError::UnableToAccessItemData)?;
        if !store.remove_asset(&key) {
            return Err(EditError::UnableToAccessItemData);
        }
        self.commit(store, path)?;
        info!(name = %rendition.name(), path = %path.display(), "rendition removed");
        Ok(())
    }

    /// Replaces the pixels of an image or icon rendition.
    ///
    /// Links write through to their destination asset; only the link frame
    /// of the destination canvas changes. Every non-pixel field of the
    /// replaced payload is carried over.
    pub fn edit(&self, rendition: &Rendition, path: &Path, to: &RenditionPreview) -> EditResult<()> {
        if !rendition.is_editable() {
            return Err(EditError::NotEditable(rendition.kind()));
        }
        let image = match to {
            RenditionPreview::Image(image) => image,
            RenditionPreview::Color(_) => return Err(EditError::ColorEditUnsupported),
        };

        let mut store = open_store(path)?;

        let (target_key, original, frame) = if rendition.is_internal_link() {
            let dest = rendition
                .payload()
                .link_destination()
                .ok_or(EditError::FailedToEditItem("resolve link destination"))?
                .to_vec();
            let bytes = store
                .asset(&dest)
                .map_err(|source| EditError::UnableToAccessCatalogFile {
                    path: path.to_path_buf(),
                    source,
                })?
                .ok_or(EditError::FailedToEditItem("resolve link destination"))?;
            let linked = RenditionPayload::parse(&bytes)
                .map_err(|_| EditError::FailedToEditItem("read link destination"))?;
            debug!(name = %rendition.name(), "editing through internal link");
            (dest, linked, Some(rendition.payload().destination_frame()))
        } else {
            let key = store
                .convert_key(rendition.key())
                .ok_or(EditError::UnableToAccessItemData)?;
            if !store.contains(&key) {
                return Err(EditError::UnableToAccessItemData);
            }
            (key, rendition.payload().clone(), None)
        };

        let unsliced = original.unsliced_size();
        let canvas = match frame {
            Some(frame) => {
                if !frame.fits_within(unsliced) {
                    return Err(EditError::FailedToEditItem("locate link frame"));
                }
                let existing = match original.decode_bitmap() {
                    Ok(existing) => existing,
                    Err(e) => {
                        warn!(error = %e, "link destination raster does not decode, redrawing");
                        None
                    }
                };
                compose_link_canvas(existing.as_ref(), unsliced, frame, image)
            }
            None => compose_direct_canvas(unsliced, image),
        }
        .ok_or(EditError::FailedToEditItem("allocate canvas"))?;

        let generator = generator_for(&original, canvas)
            .ok_or(EditError::FailedToEditItem("create generator"))?;
        let compress = match &original.body {
            PayloadBody::Bitmap(blob) => blob.compression == Compression::Zstd,
            _ => self.settings.codec.compress,
        };
        let bytes = generator
            .representation(compress, self.settings.codec.zstd_level)
            .map_err(|_| EditError::FailedToEditItem("serialize payload"))?;

        store
            .set_asset(target_key, bytes)
            .map_err(|_| EditError::UnableToAccessItemData)?;
        self.commit(store, path)?;
        info!(name = %rendition.name(), path = %path.display(), "rendition edited");
        Ok(())
    }

    fn commit(&self, store: MutableAssetStore, path: &Path) -> EditResult<()> {
        store
            .write_to_disk(self.settings.compact)
            .map_err(|source| EditError::UnableToWriteToCatalogFile {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn open_store(path: &Path) -> EditResult<MutableAssetStore> {
    MutableAssetStore::open(path).map_err(|source| EditError::UnableToAccessCatalogFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Seeds a generator with every non-pixel field of `original`.
fn generator_for(original: &RenditionPayload, canvas: RgbaImage) -> Option<RenditionGenerator> {
    let size = Size::new(canvas.width(), canvas.height());
    let slices: Vec<Rect> = if original.slices.is_empty() {
        vec![original.destination_frame()]
    } else {
        original.slices.clone()
    };
    let mut generator = RenditionGenerator::new(size, slices.len() as u32, original.layout)?;
    generator.tag = original.tag;
    generator.name = original.name.clone();
    generator.blend_mode = original.blend_mode;
    generator.color_space_id = original.color_space_id;
    generator.exif_orientation = original.exif_orientation;
    generator.opacity = original.opacity;
    generator.scale_factor = original.scale_factor;
    generator.template_rendering_mode = original.template_rendering_mode;
    generator.uti_type = original.uti.clone();
    generator.is_vector_based = original.is_vector_based();
    generator.excluded_from_contrast_filter = original.excluded_from_contrast_filter();
    generator.add_bitmap(canvas);
    for slice in slices {
        generator.add_slice_rect(slice);
    }
    Some(generator)
}

fn fit(image: &RgbaImage, size: Size) -> RgbaImage {
    if image.dimensions() == (size.width, size.height) {
        image.clone()
    } else {
        imageops::resize(image, size.width, size.height, imageops::FilterType::Triangle)
    }
}

/// The new image stretched over a fresh canvas.
fn compose_direct_canvas(unsliced: Size, image: &RgbaImage) -> Option<RgbaImage> {
    if unsliced.is_empty() {
        return None;
    }
    let mut canvas = RgbaImage::new(unsliced.width, unsliced.height);
    imageops::overlay(&mut canvas, &fit(image, unsliced), 0, 0);
    Some(canvas)
}

/// Existing destination art with the padded frame cleared and the new image
/// drawn into the frame.
fn compose_link_canvas(
    existing: Option<&RgbaImage>,
    unsliced: Size,
    frame: Rect,
    image: &RgbaImage,
) -> Option<RgbaImage> {
    if unsliced.is_empty() || frame.size().is_empty() {
        return None;
    }
    let mut canvas = RgbaImage::new(unsliced.width, unsliced.height);
    if let Some(existing) = existing {
        imageops::overlay(&mut canvas, existing, 0, 0);
    }

    let clear = frame.outset_clamped(LINK_SEAM_PAD, unsliced);
    imageops::replace(
        &mut canvas,
        &RgbaImage::new(clear.width, clear.height),
        i64::from(clear.x),
        i64::from(clear.y),
    );

    imageops::overlay(
        &mut canvas,
        &fit(image, frame.size()),
        i64::from(frame.x),
        i64::from(frame.y),
    );
    Some(canvas)
}
