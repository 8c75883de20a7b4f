//! Scratch catalogs shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use carsmith::car::{
    Blob, ClassTag, ColorValue, Compression, ContainerBuilder, KeyAttribute, KeyFormat,
    PayloadBody, Rect, RenditionGenerator, RenditionKey, RenditionPayload, Size,
};
use image::{Rgba, RgbaImage};

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const COLOR_ID: u16 = 1;
pub const PHOTO_ID: u16 = 2;
pub const ICON_ID: u16 = 3;
pub const ATLAS_ID: u16 = 4;
pub const STAR_ID: u16 = 5;
pub const DOC_ID: u16 = 6;
pub const BLOB_ID: u16 = 7;
pub const SET_ID: u16 = 8;
pub const SIZES_ID: u16 = 9;
pub const WEIRD_ID: u16 = 10;
pub const GHOST_ID: u16 = 99;

/// Frame of the `star` link inside the 16x16 atlas.
pub const STAR_FRAME: Rect = Rect {
    x: 4,
    y: 4,
    width: 4,
    height: 4,
};

pub fn key(id: u16) -> RenditionKey {
    RenditionKey::new().with(KeyAttribute::Identifier, id)
}

pub fn bitmap(name: &str, size: Size, fill: Rgba<u8>) -> RenditionPayload {
    let mut g = RenditionGenerator::new(size, 1, 0).unwrap();
    g.name = name.to_string();
    g.add_bitmap(RgbaImage::from_pixel(size.width, size.height, fill));
    g.add_slice_rect(Rect::from_size(size));
    g.payload(false, 0).unwrap()
}

/// A photo whose every non-pixel field differs from the defaults.
pub fn decorated_photo() -> RenditionPayload {
    let size = Size::new(4, 4);
    let mut g = RenditionGenerator::new(size, 1, 12).unwrap();
    g.name = "photo@2x.png".into();
    g.blend_mode = 3;
    g.color_space_id = 1;
    g.exif_orientation = 6;
    g.opacity = 0.5;
    g.scale_factor = 2;
    g.template_rendering_mode = 2;
    g.uti_type = Some("public.png".into());
    g.is_vector_based = true;
    g.excluded_from_contrast_filter = true;
    g.add_bitmap(RgbaImage::from_pixel(4, 4, RED));
    g.add_slice_rect(Rect::from_size(size));
    g.payload(false, 0).unwrap()
}

pub fn link(name: &str, destination: Vec<u8>, frame: Rect) -> RenditionPayload {
    let mut p = RenditionPayload::new(
        ClassTag::InternalLink,
        name,
        PayloadBody::Link { destination, frame },
    );
    p.width = frame.width;
    p.height = frame.height;
    p
}

pub fn data(tag: ClassTag, name: &str, bytes: &[u8]) -> RenditionPayload {
    RenditionPayload::new(tag, name, PayloadBody::Data(Blob::raw(bytes.to_vec())))
}

/// Lookups are added out of type order on purpose.
pub fn sample_builder() -> ContainerBuilder {
    let mut b = ContainerBuilder::new(KeyFormat::standard());

    b.add_rendition("doc", &key(DOC_ID), &data(ClassTag::Pdf, "doc.pdf", b"%PDF-1.4 fake"))
        .unwrap();
    b.add_rendition("photo", &key(PHOTO_ID).with(KeyAttribute::Scale, 2), &decorated_photo())
        .unwrap();
    b.add_rendition(
        "Red",
        &key(COLOR_ID),
        &RenditionPayload::new(
            ClassTag::Color,
            "Red",
            PayloadBody::Color(ColorValue::rgba(1.0, 0.0, 0.0, 1.0)),
        ),
    )
    .unwrap();
    b.add_rendition(
        "AppIcon",
        &key(ICON_ID)
            .with(KeyAttribute::Element, 85)
            .with(KeyAttribute::Part, 220),
        &bitmap("AppIcon60x60@2x.png", Size::new(2, 2), GREEN),
    )
    .unwrap();

    let atlas = b
        .add_asset(
            &key(ATLAS_ID),
            bitmap("ZZZZPackedAsset", Size::new(16, 16), BLUE)
                .to_bytes()
                .unwrap(),
        )
        .unwrap();
    b.add_rendition("star", &key(STAR_ID), &link("star.png", atlas, STAR_FRAME))
        .unwrap();

    b.add_rendition("blob", &key(BLOB_ID), &data(ClassTag::RawData, "blob.bin", b"\x00\x01\x02"))
        .unwrap();
    b.add_rendition(
        "set",
        &key(SET_ID).with(KeyAttribute::Element, 9),
        &bitmap("set.png", Size::new(1, 1), RED),
    )
    .unwrap();
    b.add_rendition(
        "sizes",
        &key(SIZES_ID),
        &RenditionPayload::new(
            ClassTag::MultisizeImageSet,
            "sizes",
            PayloadBody::Sizes(vec![Size::new(16, 16), Size::new(32, 32)]),
        ),
    )
    .unwrap();
    b.add_rendition(
        "weird",
        &key(WEIRD_ID),
        &RenditionPayload::new(ClassTag::Unrecognized(*b"WHAT"), "weird", PayloadBody::Empty),
    )
    .unwrap();
    b.add_lookup("ghost", &key(GHOST_ID)).unwrap();
    b
}

pub fn sample_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("Assets.car");
    sample_builder().write(&path).unwrap();
    path
}

/// Raw bytes of a data payload whose body claims zstd but is not.
pub fn uninflatable(name: &str) -> Vec<u8> {
    let blob = Blob {
        compression: Compression::Zstd,
        raw_len: 64,
        data: b"definitely not a zstd frame".to_vec(),
    };
    RenditionPayload::new(ClassTag::RawData, name, PayloadBody::Data(blob))
        .to_bytes()
        .unwrap()
}
