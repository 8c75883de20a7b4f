mod common;

use std::fs;

use carsmith::car::{
    Catalog, CatalogError, ClassTag, Idiom, KeyAttribute, KeyFormat, RenditionPreview,
    RenditionType, MAC_CATALYST_SUBTYPE,
};
use common::*;

#[test]
fn groups_are_sorted_by_type_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());

    let (_, rc) = Catalog::open(&path).unwrap();
    let kinds: Vec<String> = rc.groups().iter().map(|g| g.kind.to_string()).collect();
    assert_eq!(
        kinds,
        [
            "Color",
            "Icon",
            "Image",
            "Image Set",
            "Multisize Image Set",
            "PDF",
            "Raw Data",
            "Unknown"
        ]
    );
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);

    let images: Vec<&str> = rc
        .group(RenditionType::Image)
        .unwrap()
        .renditions
        .iter()
        .map(|r| r.name())
        .collect();
    assert_eq!(images, ["photo", "star"]);
}

#[test]
fn dangling_lookups_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());

    let (catalog, rc) = Catalog::open(&path).unwrap();
    assert_eq!(catalog.dangling_lookups(), ["ghost".to_string()]);
    assert_eq!(rc.len(), 9);
    assert!(rc.find("ghost", None).is_empty());
}

#[test]
fn reopening_an_unmodified_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());

    let (_, first) = Catalog::open(&path).unwrap();
    let (_, second) = Catalog::open(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn filter_is_a_case_insensitive_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let before = rc.clone();

    let view = rc.filter("PHO");
    assert_eq!(view.groups().len(), 1);
    assert_eq!(view.len(), 1);
    assert_eq!(view.iter().next().unwrap().name(), "photo");

    assert!(rc.filter("no such thing").is_empty());
    assert_eq!(rc, before);

    let (_, reopened) = Catalog::open(&path).unwrap();
    assert_eq!(reopened, before);
}

#[test]
fn icon_takes_its_name_from_the_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();

    let icon = &rc.group(RenditionType::Icon).unwrap().renditions[0];
    assert_eq!(icon.name(), "AppIcon60x60@2x.png");
    assert_eq!(icon.lookup_name(), "AppIcon");
    assert!(icon.is_editable());
}

#[test]
fn previews_prefer_color_then_raster() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();

    let red = rc.find("Red", None)[0];
    assert!(matches!(red.preview(), Some(RenditionPreview::Color(_))));
    assert!(red.image().is_none());

    let photo = rc.find("photo", None)[0];
    match photo.preview() {
        Some(RenditionPreview::Image(img)) => assert_eq!(*img.get_pixel(0, 0), RED),
        other => panic!("unexpected preview {other:?}"),
    }

    let doc = rc.find("doc", None)[0];
    assert!(doc.preview().is_none());
    assert_eq!(&*doc.data().unwrap().unwrap(), b"%PDF-1.4 fake");
}

#[test]
fn link_raster_is_cropped_from_its_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();

    let star = rc.find("star", None)[0];
    assert!(star.is_internal_link());
    let raster = star.raster().unwrap().unwrap();
    assert_eq!(raster.dimensions(), (STAR_FRAME.width, STAR_FRAME.height));
    assert!(raster.pixels().all(|p| *p == BLUE));
}

#[test]
fn key_fields_decode_through_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.car");
    let mut b = carsmith::car::ContainerBuilder::new(KeyFormat::standard());
    b.add_rendition(
        "catalyst",
        &key(1)
            .with(KeyAttribute::Idiom, 2)
            .with(KeyAttribute::Subtype, MAC_CATALYST_SUBTYPE)
            .with(KeyAttribute::Appearance, 1)
            .with(KeyAttribute::DisplayGamut, 1),
        &bitmap("catalyst.png", carsmith::car::Size::new(1, 1), RED),
    )
    .unwrap();
    b.add_rendition(
        "odd",
        &key(2).with(KeyAttribute::Idiom, 40).with(KeyAttribute::Appearance, 77),
        &bitmap("odd.png", carsmith::car::Size::new(1, 1), RED),
    )
    .unwrap();
    b.write(&path).unwrap();

    let (_, rc) = Catalog::open(&path).unwrap();
    let catalyst = rc.find("catalyst", None)[0];
    assert_eq!(catalyst.idiom(), Some(Idiom::MacCatalyst));
    assert_eq!(catalyst.appearance().map(|a| a.to_string()).as_deref(), Some("Dark"));
    assert_eq!(catalyst.display_gamut().map(|g| g.to_string()).as_deref(), Some("Display P3"));

    let odd = rc.find("odd", None)[0];
    assert_eq!(odd.idiom(), None);
    assert_eq!(odd.appearance(), None);
}

#[test]
fn bad_magic_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.car");
    fs::write(&path, b"BOMStore this is not an RCAR container at all, sorry").unwrap();

    match Catalog::open(&path) {
        Err(CatalogError::Invalid(msg)) => assert!(msg.contains("magic"), "{msg}"),
        other => panic!("expected invalid container, got {other:?}"),
    }
}

#[test]
fn corrupted_index_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());

    let mut bytes = fs::read(&path).unwrap();
    // Last byte of the index, just before the footer.
    let at = bytes.len() - 33;
    bytes[at] ^= 0xff;
    fs::write(&path, &bytes).unwrap();
    assert!(Catalog::open(&path).is_err());
}

#[test]
fn truncated_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(Catalog::open(&path).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let res = Catalog::open(&dir.path().join("nope.car"));
    assert!(matches!(res, Err(CatalogError::Io(_))));
}

#[test]
fn uninflatable_body_does_not_fail_the_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.car");
    let mut b = sample_builder();
    b.add_asset(&key(50), uninflatable("broken.bin")).unwrap();
    b.add_lookup("broken", &key(50)).unwrap();
    b.write(&path).unwrap();

    let (_, rc) = Catalog::open(&path).unwrap();
    let broken = rc.find("broken", None)[0];
    assert_eq!(broken.payload().tag, ClassTag::RawData);
    assert!(broken.data().is_err());
}
