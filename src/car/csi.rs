#![forbid(unsafe_code)]

//! Rendition payloads: the per-asset blobs stored in the asset table.
//!
//! Layout (little-endian):
//! - [b"CTSI"][u32 version][tag 4]
//! - [u8 has_flags][u32 flags]
//! - [u32 width][u32 height][u32 scale_factor]
//! - [u16 layout][u16 color_space_id][u16 blend_mode][f32 opacity]
//! - [u16 exif_orientation][u16 template_rendering_mode]
//! - [u16 len][name][u16 len][uti]
//! - [u32 slice_count][u32 x][u32 y][u32 w][u32 h]...
//! - [u8 body_kind] body

use std::borrow::Cow;
use std::io::{Cursor, Read};

use image::RgbaImage;

use crate::car::error::{CatalogError, CatalogResult, DecodeError};
use crate::car::format::{Compression, Rect, Size, CSI_MAGIC, CSI_VERSION};
use crate::car::io::{
    push_short_bytes, read_exact, read_f32, read_f64, read_short_bytes, read_short_string,
    read_u16, read_u32, read_u8, read_vec,
};

/// Native payload class, decoded once from the four-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTag {
    RawPixel,
    ThemePixel,
    InternalLink,
    Pdf,
    Color,
    Svg,
    MultisizeImageSet,
    RawData,
    Unrecognized([u8; 4]),
}

impl ClassTag {
    pub const KNOWN: [ClassTag; 8] = [
        Self::RawPixel,
        Self::ThemePixel,
        Self::InternalLink,
        Self::Pdf,
        Self::Color,
        Self::Svg,
        Self::MultisizeImageSet,
        Self::RawData,
    ];

    pub fn from_fourcc(tag: [u8; 4]) -> Self {
        match &tag {
            b"RPXL" => Self::RawPixel,
            b"TPXL" => Self::ThemePixel,
            b"LINK" => Self::InternalLink,
            b"PDF " => Self::Pdf,
            b"COLR" => Self::Color,
            b"SVG " => Self::Svg,
            b"MSIS" => Self::MultisizeImageSet,
            b"DATA" => Self::RawData,
            _ => Self::Unrecognized(tag),
        }
    }

    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::RawPixel => *b"RPXL",
            Self::ThemePixel => *b"TPXL",
            Self::InternalLink => *b"LINK",
            Self::Pdf => *b"PDF ",
            Self::Color => *b"COLR",
            Self::Svg => *b"SVG ",
            Self::MultisizeImageSet => *b"MSIS",
            Self::RawData => *b"DATA",
            Self::Unrecognized(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RenditionFlags {
    pub is_vector_based: bool,
    pub excluded_from_contrast_filter: bool,
    pub is_opaque: bool,
}

impl RenditionFlags {
    const VECTOR: u32 = 1 << 0;
    const EXCLUDED_FROM_CONTRAST: u32 = 1 << 1;
    const OPAQUE: u32 = 1 << 2;

    pub fn from_bits(bits: u32) -> Self {
        Self {
            is_vector_based: bits & Self::VECTOR != 0,
            excluded_from_contrast_filter: bits & Self::EXCLUDED_FROM_CONTRAST != 0,
            is_opaque: bits & Self::OPAQUE != 0,
        }
    }

    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.is_vector_based {
            bits |= Self::VECTOR;
        }
        if self.excluded_from_contrast_filter {
            bits |= Self::EXCLUDED_FROM_CONTRAST;
        }
        if self.is_opaque {
            bits |= Self::OPAQUE;
        }
        bits
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorValue {
    pub color_space_id: u16,
    pub components: Vec<f64>,
}

impl ColorValue {
    pub fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            color_space_id: 0,
            components: vec![r, g, b, a],
        }
    }
}

/// Possibly-compressed byte body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub compression: Compression,
    pub raw_len: u32,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self {
            compression: Compression::None,
            raw_len: bytes.len() as u32,
            data: bytes,
        }
    }

    pub fn pack(bytes: &[u8], compress: bool, zstd_level: i32) -> CatalogResult<Self> {
        if bytes.len() > u32::MAX as usize {
            return Err(CatalogError::Invalid("body larger than 4 GiB".into()));
        }
        if !compress {
            return Ok(Self::raw(bytes.to_vec()));
        }
        #[cfg(feature = "zstd")]
        {
            let data = zstd::encode_all(bytes, zstd_level)?;
            Ok(Self {
                compression: Compression::Zstd,
                raw_len: bytes.len() as u32,
                data,
            })
        }
        #[cfg(not(feature = "zstd"))]
        {
            let _ = zstd_level;
            Err(CatalogError::NoZstd)
        }
    }

    /// Unpacks the body. Zstd output is capped at `raw_len`, so a body that
    /// expands past its declared size fails without allocating the excess.
    pub fn inflate(&self) -> Result<Cow<'_, [u8]>, DecodeError> {
        let raw: Cow<'_, [u8]> = match self.compression {
            Compression::None => Cow::Borrowed(&self.data),
            Compression::Zstd => {
                #[cfg(feature = "zstd")]
                {
                    Cow::Owned(
                        zstd::bulk::decompress(&self.data, self.raw_len as usize)
                            .map_err(|e| DecodeError::Inflate(e.to_string()))?,
                    )
                }
                #[cfg(not(feature = "zstd"))]
                {
                    return Err(DecodeError::NoZstd);
                }
            }
        };
        if raw.len() != self.raw_len as usize {
            return Err(DecodeError::RawLength {
                expected: self.raw_len as usize,
                got: raw.len(),
            });
        }
        Ok(raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    /// RGBA8, row-major, `width * height * 4` bytes once inflated.
    Bitmap(Blob),
    /// Pixels live in another asset; `frame` is this rendition's region of it.
    Link { destination: Vec<u8>, frame: Rect },
    Color(ColorValue),
    Data(Blob),
    Sizes(Vec<Size>),
    Empty,
}

impl PayloadBody {
    fn kind(&self) -> u8 {
        match self {
            Self::Bitmap(_) => 0,
            Self::Link { .. } => 1,
            Self::Color(_) => 2,
            Self::Data(_) => 3,
            Self::Sizes(_) => 4,
            Self::Empty => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenditionPayload {
    pub tag: ClassTag,
    /// Absent on payloads written without a flags word.
    pub flags: Option<RenditionFlags>,
    pub width: u32,
    pub height: u32,
    pub scale_factor: u32,
    pub layout: u16,
    pub color_space_id: u16,
    pub blend_mode: u16,
    pub opacity: f32,
    pub exif_orientation: u16,
    pub template_rendering_mode: u16,
    pub name: String,
    pub uti: Option<String>,
    pub slices: Vec<Rect>,
    pub body: PayloadBody,
}

impl RenditionPayload {
    /// Bare payload with neutral metadata.
    pub fn new(tag: ClassTag, name: impl Into<String>, body: PayloadBody) -> Self {
        Self {
            tag,
            flags: None,
            width: 0,
            height: 0,
            scale_factor: 1,
            layout: 0,
            color_space_id: 0,
            blend_mode: 0,
            opacity: 1.0,
            exif_orientation: 1,
            template_rendering_mode: 0,
            name: name.into(),
            uti: None,
            slices: Vec::new(),
            body,
        }
    }

    pub fn parse(bytes: &[u8]) -> CatalogResult<Self> {
        let total = bytes.len();
        let mut cur = Cursor::new(bytes);
        let remaining = |cur: &Cursor<&[u8]>| total.saturating_sub(cur.position() as usize);

        if read_exact::<4>(&mut cur)? != CSI_MAGIC {
            return Err(CatalogError::Invalid("bad rendition magic".into()));
        }
        let version = read_u32(&mut cur)?;
        if version != CSI_VERSION {
            return Err(CatalogError::Invalid(format!(
                "unsupported rendition version {version}"
            )));
        }
        let tag = ClassTag::from_fourcc(read_exact::<4>(&mut cur)?);
        let has_flags = read_u8(&mut cur)? != 0;
        let bits = read_u32(&mut cur)?;
        let flags = has_flags.then(|| RenditionFlags::from_bits(bits));

        let width = read_u32(&mut cur)?;
        let height = read_u32(&mut cur)?;
        let scale_factor = read_u32(&mut cur)?;
        let layout = read_u16(&mut cur)?;
        let color_space_id = read_u16(&mut cur)?;
        let blend_mode = read_u16(&mut cur)?;
        let opacity = read_f32(&mut cur)?;
        let exif_orientation = read_u16(&mut cur)?;
        let template_rendering_mode = read_u16(&mut cur)?;
        let name = read_short_string(&mut cur)?;
        let uti = read_short_string(&mut cur)?;
        let uti = (!uti.is_empty()).then_some(uti);

        let slice_count = read_u32(&mut cur)? as usize;
        if slice_count.saturating_mul(16) > remaining(&cur) {
            return Err(CatalogError::Invalid("slice table outside payload".into()));
        }
        let mut slices = Vec::with_capacity(slice_count);
        for _ in 0..slice_count {
            slices.push(read_rect(&mut cur)?);
        }

        let body = match read_u8(&mut cur)? {
            0 => PayloadBody::Bitmap(read_blob(&mut cur, total)?),
            1 => {
                let destination = read_short_bytes(&mut cur)?;
                let frame = read_rect(&mut cur)?;
                PayloadBody::Link { destination, frame }
            }
            2 => {
                let n = read_u8(&mut cur)? as usize;
                let mut components = Vec::with_capacity(n);
                for _ in 0..n {
                    components.push(read_f64(&mut cur)?);
                }
                PayloadBody::Color(ColorValue {
                    color_space_id,
                    components,
                })
            }
            3 => PayloadBody::Data(read_blob(&mut cur, total)?),
            4 => {
                let n = read_u32(&mut cur)? as usize;
                if n.saturating_mul(8) > remaining(&cur) {
                    return Err(CatalogError::Invalid("size list outside payload".into()));
                }
                let mut sizes = Vec::with_capacity(n);
                for _ in 0..n {
                    let w = read_u32(&mut cur)?;
                    let h = read_u32(&mut cur)?;
                    sizes.push(Size::new(w, h));
                }
                PayloadBody::Sizes(sizes)
            }
            5 => PayloadBody::Empty,
            other => {
                return Err(CatalogError::Invalid(format!("unknown body kind {other}")));
            }
        };

        if remaining(&cur) != 0 {
            return Err(CatalogError::Invalid("trailing bytes after rendition".into()));
        }

        Ok(Self {
            tag,
            flags,
            width,
            height,
            scale_factor,
            layout,
            color_space_id,
            blend_mode,
            opacity,
            exif_orientation,
            template_rendering_mode,
            name,
            uti,
            slices,
            body,
        })
    }

    pub fn to_bytes(&self) -> CatalogResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CSI_MAGIC);
        buf.extend_from_slice(&CSI_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.tag.fourcc());
        buf.push(u8::from(self.flags.is_some()));
        buf.extend_from_slice(&self.flags.map_or(0, |f| f.bits()).to_le_bytes());
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.scale_factor.to_le_bytes());
        buf.extend_from_slice(&self.layout.to_le_bytes());
        buf.extend_from_slice(&self.color_space_id.to_le_bytes());
        buf.extend_from_slice(&self.blend_mode.to_le_bytes());
        buf.extend_from_slice(&self.opacity.to_le_bytes());
        buf.extend_from_slice(&self.exif_orientation.to_le_bytes());
        buf.extend_from_slice(&self.template_rendering_mode.to_le_bytes());
        push_short_bytes(&mut buf, self.name.as_bytes())?;
        push_short_bytes(&mut buf, self.uti.as_deref().unwrap_or("").as_bytes())?;

        buf.extend_from_slice(&(self.slices.len() as u32).to_le_bytes());
        for r in &self.slices {
            push_rect(&mut buf, r);
        }

        buf.push(self.body.kind());
        match &self.body {
            PayloadBody::Bitmap(blob) | PayloadBody::Data(blob) => push_blob(&mut buf, blob)?,
            PayloadBody::Link { destination, frame } => {
                push_short_bytes(&mut buf, destination)?;
                push_rect(&mut buf, frame);
            }
            PayloadBody::Color(color) => {
                if color.components.len() > u8::MAX as usize {
                    return Err(CatalogError::Invalid("too many color components".into()));
                }
                buf.push(color.components.len() as u8);
                for c in &color.components {
                    buf.extend_from_slice(&c.to_le_bytes());
                }
            }
            PayloadBody::Sizes(sizes) => {
                buf.extend_from_slice(&(sizes.len() as u32).to_le_bytes());
                for s in sizes {
                    buf.extend_from_slice(&s.width.to_le_bytes());
                    buf.extend_from_slice(&s.height.to_le_bytes());
                }
            }
            PayloadBody::Empty => {}
        }
        Ok(buf)
    }

    pub fn unsliced_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Region this rendition occupies: the link frame, or the whole canvas.
    pub fn destination_frame(&self) -> Rect {
        match &self.body {
            PayloadBody::Link { frame, .. } => *frame,
            _ => Rect::from_size(self.unsliced_size()),
        }
    }

    pub fn is_internal_link(&self) -> bool {
        matches!(self.body, PayloadBody::Link { .. })
    }

    pub fn link_destination(&self) -> Option<&[u8]> {
        match &self.body {
            PayloadBody::Link { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn color(&self) -> Option<&ColorValue> {
        match &self.body {
            PayloadBody::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn sizes(&self) -> Option<&[Size]> {
        match &self.body {
            PayloadBody::Sizes(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_vector_based(&self) -> bool {
        self.flags.is_some_and(|f| f.is_vector_based)
    }

    /// A missing flags word reads as `false`.
    pub fn excluded_from_contrast_filter(&self) -> bool {
        self.flags.is_some_and(|f| f.excluded_from_contrast_filter)
    }

    /// Inflates a bitmap body. `Ok(None)` for every other body.
    pub fn decode_bitmap(&self) -> Result<Option<RgbaImage>, DecodeError> {
        let PayloadBody::Bitmap(blob) = &self.body else {
            return Ok(None);
        };
        let pixels = blob.inflate()?.into_owned();
        let expected = self.width as usize * self.height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::PixelLength {
                width: self.width,
                height: self.height,
                expected,
                got: pixels.len(),
            });
        }
        let got = pixels.len();
        RgbaImage::from_raw(self.width, self.height, pixels)
            .map(Some)
            .ok_or(DecodeError::PixelLength {
                width: self.width,
                height: self.height,
                expected,
                got,
            })
    }

    /// Inflates a data body. `Ok(None)` for every other body.
    pub fn data(&self) -> Result<Option<Cow<'_, [u8]>>, DecodeError> {
        match &self.body {
            PayloadBody::Data(blob) => blob.inflate().map(Some),
            _ => Ok(None),
        }
    }
}

fn read_rect(r: &mut dyn Read) -> CatalogResult<Rect> {
    Ok(Rect::new(
        read_u32(r)?,
        read_u32(r)?,
        read_u32(r)?,
        read_u32(r)?,
    ))
}

fn push_rect(buf: &mut Vec<u8>, r: &Rect) {
    for v in [r.x, r.y, r.width, r.height] {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_blob(cur: &mut Cursor<&[u8]>, total: usize) -> CatalogResult<Blob> {
    let compression = read_u8(cur)?;
    let compression = Compression::from_u8(compression)
        .ok_or_else(|| CatalogError::Invalid(format!("unknown compression {compression}")))?;
    let raw_len = read_u32(cur)?;
    let data_len = read_u32(cur)? as usize;
    let left = total.saturating_sub(cur.position() as usize);
    let data = read_vec(cur, data_len, left)?;
    Ok(Blob {
        compression,
        raw_len,
        data,
    })
}

fn push_blob(buf: &mut Vec<u8>, blob: &Blob) -> CatalogResult<()> {
    if blob.data.len() > u32::MAX as usize {
        return Err(CatalogError::Invalid("body larger than 4 GiB".into()));
    }
    buf.push(blob.compression as u8);
    buf.extend_from_slice(&blob.raw_len.to_le_bytes());
    buf.extend_from_slice(&(blob.data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&blob.data);
    Ok(())
}
