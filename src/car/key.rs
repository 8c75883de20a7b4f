#![forbid(unsafe_code)]

//! Packed rendition keys.
//!
//! Every asset is addressed by a key made of one `u16` per attribute listed
//! in the file's key format, stored in key-format order. A [`RenditionKey`]
//! is the unpacked form: a value for every attribute id, zero when unset.

use std::fmt;

use crate::car::error::{CatalogError, CatalogResult};

/// Theme subtype reserved for Mac Catalyst renditions. Takes precedence over
/// the idiom attribute.
pub const MAC_CATALYST_SUBTYPE: u16 = 32401;

/// Attribute ids run from 0 to 25 (id 5 is unused).
const ATTRIBUTE_SLOTS: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum KeyAttribute {
    Look = 0,
    Element = 1,
    Part = 2,
    Size = 3,
    Direction = 4,
    Value = 6,
    Appearance = 7,
    Dimension1 = 8,
    Dimension2 = 9,
    State = 10,
    Layer = 11,
    Scale = 12,
    Localization = 13,
    PresentationState = 14,
    Idiom = 15,
    Subtype = 16,
    Identifier = 17,
    PreviousValue = 18,
    PreviousState = 19,
    SizeClassHorizontal = 20,
    SizeClassVertical = 21,
    MemoryClass = 22,
    GraphicsClass = 23,
    DisplayGamut = 24,
    DeploymentTarget = 25,
}

impl KeyAttribute {
    pub const ALL: [KeyAttribute; 25] = [
        Self::Look,
        Self::Element,
        Self::Part,
        Self::Size,
        Self::Direction,
        Self::Value,
        Self::Appearance,
        Self::Dimension1,
        Self::Dimension2,
        Self::State,
        Self::Layer,
        Self::Scale,
        Self::Localization,
        Self::PresentationState,
        Self::Idiom,
        Self::Subtype,
        Self::Identifier,
        Self::PreviousValue,
        Self::PreviousState,
        Self::SizeClassHorizontal,
        Self::SizeClassVertical,
        Self::MemoryClass,
        Self::GraphicsClass,
        Self::DisplayGamut,
        Self::DeploymentTarget,
    ];

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.id() == id)
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Look => "look",
            Self::Element => "element",
            Self::Part => "part",
            Self::Size => "size",
            Self::Direction => "direction",
            Self::Value => "value",
            Self::Appearance => "appearance",
            Self::Dimension1 => "dimension1",
            Self::Dimension2 => "dimension2",
            Self::State => "state",
            Self::Layer => "layer",
            Self::Scale => "scale",
            Self::Localization => "localization",
            Self::PresentationState => "presentation-state",
            Self::Idiom => "idiom",
            Self::Subtype => "subtype",
            Self::Identifier => "identifier",
            Self::PreviousValue => "previous-value",
            Self::PreviousState => "previous-state",
            Self::SizeClassHorizontal => "size-class-horizontal",
            Self::SizeClassVertical => "size-class-vertical",
            Self::MemoryClass => "memory-class",
            Self::GraphicsClass => "graphics-class",
            Self::DisplayGamut => "display-gamut",
            Self::DeploymentTarget => "deployment-target",
        }
    }
}

/// Unpacked key: one value per attribute id.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenditionKey {
    values: [u16; ATTRIBUTE_SLOTS],
}

impl RenditionKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attr: KeyAttribute) -> u16 {
        self.values[attr.id() as usize]
    }

    pub fn set(&mut self, attr: KeyAttribute, value: u16) {
        self.values[attr.id() as usize] = value;
    }

    pub fn with(mut self, attr: KeyAttribute, value: u16) -> Self {
        self.set(attr, value);
        self
    }

    pub fn element(&self) -> u16 {
        self.get(KeyAttribute::Element)
    }

    pub fn part(&self) -> u16 {
        self.get(KeyAttribute::Part)
    }

    pub fn subtype(&self) -> u16 {
        self.get(KeyAttribute::Subtype)
    }

    pub fn scale(&self) -> u16 {
        self.get(KeyAttribute::Scale)
    }

    pub fn idiom(&self) -> Option<Idiom> {
        Idiom::from_key(self)
    }

    pub fn appearance(&self) -> Option<Appearance> {
        Appearance::from_code(self.get(KeyAttribute::Appearance))
    }

    pub fn display_gamut(&self) -> Option<DisplayGamut> {
        DisplayGamut::from_code(self.get(KeyAttribute::DisplayGamut))
    }

    /// Attributes holding a non-zero value.
    pub fn set_attributes(&self) -> impl Iterator<Item = (KeyAttribute, u16)> + '_ {
        KeyAttribute::ALL
            .iter()
            .copied()
            .map(|a| (a, self.get(a)))
            .filter(|(_, v)| *v != 0)
    }
}

impl fmt::Debug for RenditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (attr, value) in self.set_attributes() {
            map.entry(&attr.name(), &value);
        }
        map.finish()
    }
}

/// Ordered attribute list shared by every key in one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyFormat {
    attributes: Vec<KeyAttribute>,
}

impl KeyFormat {
    pub fn new(attributes: Vec<KeyAttribute>) -> CatalogResult<Self> {
        for (i, a) in attributes.iter().enumerate() {
            if attributes[..i].contains(a) {
                return Err(CatalogError::Invalid(format!(
                    "key format repeats attribute {}",
                    a.name()
                )));
            }
        }
        Ok(Self { attributes })
    }

    /// Layout written by the builder. Omits `look`, which compiled catalogs
    /// never key on.
    pub fn standard() -> Self {
        Self {
            attributes: vec![
                KeyAttribute::Appearance,
                KeyAttribute::Localization,
                KeyAttribute::Scale,
                KeyAttribute::Idiom,
                KeyAttribute::Subtype,
                KeyAttribute::DisplayGamut,
                KeyAttribute::DeploymentTarget,
                KeyAttribute::Direction,
                KeyAttribute::SizeClassHorizontal,
                KeyAttribute::SizeClassVertical,
                KeyAttribute::MemoryClass,
                KeyAttribute::GraphicsClass,
                KeyAttribute::Identifier,
                KeyAttribute::Element,
                KeyAttribute::Part,
                KeyAttribute::Size,
                KeyAttribute::Dimension1,
                KeyAttribute::Dimension2,
                KeyAttribute::State,
                KeyAttribute::Value,
                KeyAttribute::Layer,
                KeyAttribute::PresentationState,
                KeyAttribute::PreviousState,
                KeyAttribute::PreviousValue,
            ],
        }
    }

    pub(crate) fn from_ids(ids: &[u16]) -> CatalogResult<Self> {
        let attributes = ids
            .iter()
            .map(|id| {
                KeyAttribute::from_id(*id)
                    .ok_or_else(|| CatalogError::Invalid(format!("unknown key attribute {id}")))
            })
            .collect::<CatalogResult<Vec<_>>>()?;
        Self::new(attributes)
    }

    pub fn attributes(&self) -> &[KeyAttribute] {
        &self.attributes
    }

    pub fn contains(&self, attr: KeyAttribute) -> bool {
        self.attributes.contains(&attr)
    }

    /// Length in bytes of one packed key.
    pub fn key_len(&self) -> usize {
        self.attributes.len() * 2
    }

    pub fn decode(&self, data: &[u8]) -> CatalogResult<RenditionKey> {
        if data.len() != self.key_len() {
            return Err(CatalogError::Invalid(format!(
                "key is {} bytes, key format needs {}",
                data.len(),
                self.key_len()
            )));
        }
        let mut key = RenditionKey::new();
        for (attr, raw) in self.attributes.iter().zip(data.chunks_exact(2)) {
            key.set(*attr, u16::from_le_bytes([raw[0], raw[1]]));
        }
        Ok(key)
    }

    /// Packs `key` into raw key data. `None` when the key carries a value for
    /// an attribute this format cannot express.
    pub fn encode(&self, key: &RenditionKey) -> Option<Vec<u8>> {
        if key.set_attributes().any(|(a, _)| !self.contains(a)) {
            return None;
        }
        let mut out = Vec::with_capacity(self.key_len());
        for attr in &self.attributes {
            out.extend_from_slice(&key.get(*attr).to_le_bytes());
        }
        Some(out)
    }
}

/// Platform target of a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Idiom {
    Universal,
    Phone,
    Pad,
    Tv,
    CarPlay,
    Watch,
    /// App Store artwork.
    Marketing,
    MacCatalyst,
}

impl Idiom {
    pub fn from_key(key: &RenditionKey) -> Option<Self> {
        // The catalyst subtype is not an idiom code, so it is checked first.
        if key.subtype() == MAC_CATALYST_SUBTYPE {
            return Some(Self::MacCatalyst);
        }
        match key.get(KeyAttribute::Idiom) {
            0 => Some(Self::Universal),
            1 => Some(Self::Phone),
            2 => Some(Self::Pad),
            3 => Some(Self::Tv),
            4 => Some(Self::CarPlay),
            5 => Some(Self::Watch),
            6 => Some(Self::Marketing),
            _ => None,
        }
    }
}

impl fmt::Display for Idiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Universal => "Universal",
            Self::Phone => "iPhone",
            Self::Pad => "iPad",
            Self::Tv => "TV",
            Self::CarPlay => "CarPlay",
            Self::Watch => "Watch",
            Self::Marketing => "Marketing",
            Self::MacCatalyst => "Mac Catalyst",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Appearance {
    Any,
    Dark,
    HighContrast,
    HighContrastDark,
    Light,
    HighContrastLight,
}

impl Appearance {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Any),
            1 => Some(Self::Dark),
            2 => Some(Self::HighContrast),
            3 => Some(Self::HighContrastDark),
            4 => Some(Self::Light),
            5 => Some(Self::HighContrastLight),
            _ => None,
        }
    }
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Any => "Any",
            Self::Dark => "Dark",
            Self::HighContrast => "High Contrast",
            Self::HighContrastDark => "High Contrast Dark",
            Self::Light => "Light",
            Self::HighContrastLight => "High Contrast Light",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayGamut {
    Srgb,
    P3,
}

impl DisplayGamut {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Srgb),
            1 => Some(Self::P3),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayGamut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Srgb => "sRGB",
            Self::P3 => "Display P3",
        })
    }
}

/// Renders an optional decoded field, "N/A" when absent.
pub fn or_na<T: fmt::Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}
