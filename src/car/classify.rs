#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use crate::car::csi::ClassTag;
use crate::car::key::RenditionKey;

/// Element/part pair that marks an app icon.
const ICON_ELEMENT: u16 = 85;
const ICON_PART: u16 = 220;
/// Element that marks an image set.
const IMAGE_SET_ELEMENT: u16 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionType {
    Image,
    Icon,
    ImageSet,
    MultisizeImageSet,
    Pdf,
    Color,
    Svg,
    RawData,
    Unknown,
}

impl RenditionType {
    pub const ALL: [RenditionType; 9] = [
        Self::Image,
        Self::Icon,
        Self::ImageSet,
        Self::MultisizeImageSet,
        Self::Pdf,
        Self::Color,
        Self::Svg,
        Self::RawData,
        Self::Unknown,
    ];

    /// Only plain images and icons can be patch-rewritten.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Image | Self::Icon)
    }

    /// Short identifier accepted by [`FromStr`].
    pub fn slug(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Icon => "icon",
            Self::ImageSet => "image-set",
            Self::MultisizeImageSet => "multisize-image-set",
            Self::Pdf => "pdf",
            Self::Color => "color",
            Self::Svg => "svg",
            Self::RawData => "raw-data",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RenditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Image => "Image",
            Self::Icon => "Icon",
            Self::ImageSet => "Image Set",
            Self::MultisizeImageSet => "Multisize Image Set",
            Self::Pdf => "PDF",
            Self::Color => "Color",
            Self::Svg => "SVG (Vector)",
            Self::RawData => "Raw Data",
            Self::Unknown => "Unknown",
        })
    }
}

impl FromStr for RenditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.slug() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|t| t.slug()).collect();
                format!("unknown rendition type {s:?} (expected one of {})", known.join(", "))
            })
    }
}

/// Maps a payload class and its lookup key to a rendition type. Total over
/// every tag, including unrecognized ones.
pub fn classify(tag: ClassTag, key: &RenditionKey) -> RenditionType {
    match tag {
        ClassTag::RawPixel => RenditionType::Image,
        ClassTag::ThemePixel | ClassTag::InternalLink => match key.element() {
            ICON_ELEMENT if key.part() == ICON_PART => RenditionType::Icon,
            IMAGE_SET_ELEMENT => RenditionType::ImageSet,
            _ => RenditionType::Image,
        },
        ClassTag::Pdf => RenditionType::Pdf,
        ClassTag::Color => RenditionType::Color,
        ClassTag::Svg => RenditionType::Svg,
        ClassTag::MultisizeImageSet => RenditionType::MultisizeImageSet,
        ClassTag::RawData => RenditionType::RawData,
        ClassTag::Unrecognized(_) => RenditionType::Unknown,
    }
}
