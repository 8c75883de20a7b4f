#![forbid(unsafe_code)]

use std::fmt;

/// RCAR v1 header magic. Also opens the index block.
pub const MAGIC: [u8; 8] = *b"RCAR\x01\x00\x00\x00";

/// RCAR v1 footer magic.
pub const FOOTER_MAGIC: [u8; 8] = *b"RCAREND\x00";

/// Footer: magic, index offset, index length, index hash, reserved.
pub const FOOTER_LEN: u64 = 8 + 8 + 8 + 4 + 4;

/// Rendition payload magic.
pub const CSI_MAGIC: [u8; 4] = *b"CTSI";

pub const CSI_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Zstd = 1,
}

impl Compression {
    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Zstd),
            _ => None,
        }
    }
}

/// One row of the asset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssetRecord {
    pub key: Vec<u8>,
    pub payload_offset: u64,
    pub payload_len: u64,
    pub hash: [u8; 32],
}

/// Maps a human-readable name to the key of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedLookup {
    pub name: String,
    pub key_data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel rectangle, origin at the top-left corner of the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn fits_within(&self, canvas: Size) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(canvas.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(canvas.height)
    }

    /// Grows the rectangle by `pad` on every side, clamped to `canvas`.
    pub fn outset_clamped(&self, pad: u32, canvas: Size) -> Rect {
        let x = self.x.saturating_sub(pad);
        let y = self.y.saturating_sub(pad);
        let right = self
            .x
            .saturating_add(self.width)
            .saturating_add(pad)
            .min(canvas.width);
        let bottom = self
            .y
            .saturating_add(self.height)
            .saturating_add(pad)
            .min(canvas.height);
        Rect::new(
            x.min(canvas.width),
            y.min(canvas.height),
            right.saturating_sub(x),
            bottom.saturating_sub(y),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}
