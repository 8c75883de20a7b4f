#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::{imageops, RgbaImage};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::car::classify::{classify, RenditionType};
use crate::car::csi::{ColorValue, RenditionPayload};
use crate::car::error::DecodeError;
use crate::car::format::{NamedLookup, Size};
use crate::car::key::{Appearance, DisplayGamut, Idiom, RenditionKey};

/// One asset as read from disk. Shared by every lookup that points at it.
#[derive(Debug)]
pub struct RenditionEntry {
    pub(crate) key_data: Vec<u8>,
    pub(crate) digest: [u8; 32],
    pub(crate) payload: RenditionPayload,
    /// Destination payload when `payload` is an internal link.
    pub(crate) link_target: Option<RenditionPayload>,
}

impl RenditionEntry {
    pub fn key_data(&self) -> &[u8] {
        &self.key_data
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn payload(&self) -> &RenditionPayload {
        &self.payload
    }

    pub fn link_target(&self) -> Option<&RenditionPayload> {
        self.link_target.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenditionPreview {
    Color(ColorValue),
    Image(Arc<RgbaImage>),
}

type RasterCell = OnceCell<Result<Option<Arc<RgbaImage>>, DecodeError>>;

/// A classified catalog entry.
///
/// Identity is the asset (key data and content digest), the lookup and the
/// type; names are not unique. Clones share the decoded raster cache.
#[derive(Clone)]
pub struct Rendition {
    entry: Arc<RenditionEntry>,
    lookup: NamedLookup,
    key: RenditionKey,
    kind: RenditionType,
    name: String,
    raster: Arc<RasterCell>,
    preview: Arc<OnceCell<Option<RenditionPreview>>>,
}

impl Rendition {
    pub fn new(lookup: NamedLookup, key: RenditionKey, entry: Arc<RenditionEntry>) -> Self {
        let kind = classify(entry.payload.tag, &key);
        let name = if kind == RenditionType::Icon {
            entry.payload.name.clone()
        } else {
            lookup.name.clone()
        };
        Self {
            entry,
            lookup,
            key,
            kind,
            name,
            raster: Arc::new(OnceCell::new()),
            preview: Arc::new(OnceCell::new()),
        }
    }

    /// Display name: the payload's own name for icons, the lookup name otherwise.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RenditionType {
        self.kind
    }

    pub fn key(&self) -> &RenditionKey {
        &self.key
    }

    pub fn lookup(&self) -> &NamedLookup {
        &self.lookup
    }

    pub fn entry(&self) -> &RenditionEntry {
        &self.entry
    }

    pub fn payload(&self) -> &RenditionPayload {
        &self.entry.payload
    }

    pub fn lookup_name(&self) -> &str {
        &self.lookup.name
    }

    pub fn rendition_name(&self) -> &str {
        &self.entry.payload.name
    }

    pub fn idiom(&self) -> Option<Idiom> {
        self.key.idiom()
    }

    pub fn appearance(&self) -> Option<Appearance> {
        self.key.appearance()
    }

    pub fn display_gamut(&self) -> Option<DisplayGamut> {
        self.key.display_gamut()
    }

    pub fn unsliced_size(&self) -> Size {
        self.entry.payload.unsliced_size()
    }

    pub fn scale(&self) -> u32 {
        self.entry.payload.scale_factor
    }

    pub fn is_editable(&self) -> bool {
        self.kind.is_editable()
    }

    pub fn is_internal_link(&self) -> bool {
        self.entry.payload.is_internal_link()
    }

    /// Decoded pixels, computed once. Link renditions crop their destination.
    pub fn raster(&self) -> Result<Option<&Arc<RgbaImage>>, DecodeError> {
        match self
            .raster
            .get_or_init(|| self.decode_raster().map(|img| img.map(Arc::new)))
        {
            Ok(img) => Ok(img.as_ref()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Like [`Self::raster`], with decode failures logged and folded into `None`.
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        match self.raster() {
            Ok(img) => img,
            Err(e) => {
                warn!(name = %self.name, error = %e, "rendition raster does not decode");
                None
            }
        }
    }

    /// Color value if the payload has one, else the raster.
    pub fn preview(&self) -> Option<&RenditionPreview> {
        self.preview
            .get_or_init(|| {
                if let Some(color) = self.entry.payload.color() {
                    return Some(RenditionPreview::Color(color.clone()));
                }
                self.image().map(|img| RenditionPreview::Image(Arc::clone(img)))
            })
            .as_ref()
    }

    /// Verbatim source bytes for data-backed renditions (PDF, SVG, raw data).
    pub fn data(&self) -> Result<Option<Cow<'_, [u8]>>, DecodeError> {
        self.entry.payload.data()
    }

    fn decode_raster(&self) -> Result<Option<RgbaImage>, DecodeError> {
        let payload = &self.entry.payload;
        if !payload.is_internal_link() {
            return payload.decode_bitmap();
        }
        let target = self
            .entry
            .link_target
            .as_ref()
            .ok_or(DecodeError::MissingLinkTarget)?;
        let Some(canvas) = target.decode_bitmap()? else {
            return Ok(None);
        };
        let frame = payload.destination_frame();
        if !frame.fits_within(target.unsliced_size()) {
            return Err(DecodeError::LinkFrameOutOfBounds);
        }
        Ok(Some(
            imageops::crop_imm(&canvas, frame.x, frame.y, frame.width, frame.height).to_image(),
        ))
    }
}

impl PartialEq for Rendition {
    fn eq(&self, other: &Self) -> bool {
        self.entry.key_data == other.entry.key_data
            && self.entry.digest == other.entry.digest
            && self.lookup == other.lookup
            && self.kind == other.kind
    }
}

impl Eq for Rendition {}

impl Hash for Rendition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entry.key_data.hash(state);
        self.entry.digest.hash(state);
        self.lookup.hash(state);
        self.kind.hash(state);
    }
}

impl fmt::Debug for Rendition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("tag", &self.entry.payload.tag)
            .finish()
    }
}
