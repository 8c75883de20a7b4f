mod common;

use std::fs;
use std::sync::Arc;

use carsmith::car::{
    Catalog, CatalogEditor, ClassTag, ColorValue, ContainerBuilder, EditError, EditSettings,
    KeyAttribute, KeyFormat, MutableAssetStore, RenditionPayload, RenditionPreview,
    RenditionType, Size,
};
use common::*;
use image::RgbaImage;

fn replacement(w: u32, h: u32) -> RenditionPreview {
    RenditionPreview::Image(Arc::new(RgbaImage::from_pixel(w, h, GREEN)))
}

fn editor() -> CatalogEditor {
    CatalogEditor::new(EditSettings::default())
}

fn non_pixel_fields(p: &RenditionPayload) -> impl PartialEq + std::fmt::Debug {
    ((
        p.tag,
        p.name.clone(),
        p.blend_mode,
        p.color_space_id,
        p.exif_orientation,
        p.opacity.to_bits(),
        p.scale_factor,
        p.template_rendering_mode,
        p.uti.clone(),
    ), (
        p.is_vector_based(),
        p.excluded_from_contrast_filter(),
        p.layout,
        p.unsliced_size(),
        p.slices.clone(),
    ))
}

#[test]
fn edit_replaces_pixels_and_keeps_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let photo = rc.find("photo", None)[0].clone();
    let before = non_pixel_fields(photo.payload());

    editor().edit(&photo, &path, &replacement(2, 2)).unwrap();

    let (_, rc) = Catalog::open(&path).unwrap();
    let edited = rc.find("photo", None)[0];
    assert_eq!(non_pixel_fields(edited.payload()), before);
    let raster = edited.raster().unwrap().unwrap();
    assert_eq!(raster.dimensions(), (4, 4));
    assert!(raster.pixels().all(|p| *p == GREEN));
    assert_eq!(rc.len(), 9);
}

#[test]
fn icons_are_editable() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let icon = rc.group(RenditionType::Icon).unwrap().renditions[0].clone();

    editor().edit(&icon, &path, &replacement(2, 2)).unwrap();

    let (_, rc) = Catalog::open(&path).unwrap();
    let icon = &rc.group(RenditionType::Icon).unwrap().renditions[0];
    assert_eq!(icon.name(), "AppIcon60x60@2x.png");
    assert_eq!(*icon.raster().unwrap().unwrap().get_pixel(1, 1), GREEN);
}

#[test]
fn read_only_types_are_rejected_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let original = fs::read(&path).unwrap();
    let (_, rc) = Catalog::open(&path).unwrap();

    for name in ["Red", "doc", "blob", "set", "sizes", "weird"] {
        let r = rc.find(name, None)[0];
        let err = editor().edit(r, &path, &replacement(1, 1)).unwrap_err();
        assert!(
            matches!(err, EditError::NotEditable(kind) if kind == r.kind()),
            "{name}: {err:?}"
        );
        assert_eq!(fs::read(&path).unwrap(), original, "{name} touched the file");
    }
}

#[test]
fn color_replacement_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let original = fs::read(&path).unwrap();
    let (_, rc) = Catalog::open(&path).unwrap();
    let photo = rc.find("photo", None)[0];

    let to = RenditionPreview::Color(ColorValue::rgba(0.0, 1.0, 0.0, 1.0));
    let err = editor().edit(photo, &path, &to).unwrap_err();
    assert!(matches!(err, EditError::ColorEditUnsupported));
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn link_edit_writes_through_to_the_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let star = rc.find("star", None)[0].clone();
    let link_before = star.payload().clone();

    editor().edit(&star, &path, &replacement(1, 1)).unwrap();

    // The link asset itself is byte-for-byte the same payload.
    let mut store = MutableAssetStore::open(&path).unwrap();
    let star_key = store.convert_key(&key(STAR_ID)).unwrap();
    let star_bytes = store.asset(&star_key).unwrap().unwrap();
    assert_eq!(RenditionPayload::parse(&star_bytes).unwrap(), link_before);

    // The atlas changed inside the frame and its seam, nowhere else.
    let atlas_key = store.convert_key(&key(ATLAS_ID)).unwrap();
    let atlas = RenditionPayload::parse(&store.asset(&atlas_key).unwrap().unwrap()).unwrap();
    assert_eq!(atlas.name, "ZZZZPackedAsset");
    assert_eq!(atlas.unsliced_size(), Size::new(16, 16));
    let canvas = atlas.decode_bitmap().unwrap().unwrap();
    assert_eq!(*canvas.get_pixel(5, 5), GREEN);
    assert_eq!(*canvas.get_pixel(3, 3), CLEAR);
    assert_eq!(*canvas.get_pixel(0, 0), BLUE);
    assert_eq!(*canvas.get_pixel(15, 15), BLUE);
    assert_eq!(store.asset_count(), 10);

    let (_, rc) = Catalog::open(&path).unwrap();
    let star = rc.find("star", None)[0];
    assert!(star.raster().unwrap().unwrap().pixels().all(|p| *p == GREEN));
}

#[test]
fn link_to_missing_destination_fails_to_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orphan.car");
    let mut b = ContainerBuilder::new(KeyFormat::standard());
    let nowhere = KeyFormat::standard().encode(&key(77)).unwrap();
    b.add_rendition("orphan", &key(1), &link("orphan.png", nowhere, STAR_FRAME))
        .unwrap();
    b.write(&path).unwrap();
    let original = fs::read(&path).unwrap();

    let (_, rc) = Catalog::open(&path).unwrap();
    let orphan = rc.find("orphan", None)[0];
    assert!(orphan.raster().is_err());

    let err = editor().edit(orphan, &path, &replacement(1, 1)).unwrap_err();
    assert!(matches!(err, EditError::FailedToEditItem(_)), "{err:?}");
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn remove_drops_the_asset_and_its_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let doc = rc.find("doc", None)[0];

    editor().remove(doc, &path).unwrap();

    let (catalog, rc) = Catalog::open(&path).unwrap();
    assert!(rc.find("doc", None).is_empty());
    assert!(rc.group(RenditionType::Pdf).is_none());
    assert_eq!(rc.len(), 8);
    assert!(catalog.dangling_lookups().iter().all(|n| n != "doc"));
}

#[test]
fn removing_twice_reports_missing_item_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let blob = rc.find("blob", None)[0];

    editor().remove(blob, &path).unwrap();
    let err = editor().remove(blob, &path).unwrap_err();
    assert!(matches!(err, EditError::UnableToAccessItemData));
}

#[test]
fn key_outside_the_target_format_is_not_addressable() {
    let dir = tempfile::tempdir().unwrap();
    let source = sample_catalog(dir.path());

    // Same asset set, but a key format without the identifier attribute.
    let narrow = dir.path().join("narrow.car");
    let format = KeyFormat::new(vec![KeyAttribute::Element, KeyAttribute::Part]).unwrap();
    let mut b = ContainerBuilder::new(format);
    b.add_rendition(
        "plain",
        &carsmith::car::RenditionKey::new(),
        &bitmap("plain.png", Size::new(1, 1), RED),
    )
    .unwrap();
    b.write(&narrow).unwrap();
    let original = fs::read(&narrow).unwrap();

    let (_, rc) = Catalog::open(&source).unwrap();
    let photo = rc.find("photo", None)[0];

    let err = editor().remove(photo, &narrow).unwrap_err();
    assert!(matches!(err, EditError::UnableToAccessItemData));
    let err = editor().edit(photo, &narrow, &replacement(1, 1)).unwrap_err();
    assert!(matches!(err, EditError::UnableToAccessItemData));
    assert_eq!(fs::read(&narrow).unwrap(), original);
}

#[test]
fn non_catalog_target_is_an_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&source).unwrap();
    let photo = rc.find("photo", None)[0];

    let junk = dir.path().join("junk.car");
    fs::write(&junk, b"not a catalog").unwrap();
    let err = editor().edit(photo, &junk, &replacement(1, 1)).unwrap_err();
    assert!(
        matches!(err, EditError::UnableToAccessCatalogFile { ref path, .. } if path == &junk),
        "{err:?}"
    );
    assert!(err.to_string().contains("junk.car"));
}

#[test]
fn append_mode_keeps_old_bytes_until_compacted() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_catalog(dir.path());
    let (_, rc) = Catalog::open(&path).unwrap();
    let photo = rc.find("photo", None)[0].clone();
    let size_before = fs::metadata(&path).unwrap().len();

    let appending = CatalogEditor::new(EditSettings {
        compact: false,
        ..EditSettings::default()
    });
    appending.edit(&photo, &path, &replacement(4, 4)).unwrap();
    assert!(fs::metadata(&path).unwrap().len() > size_before);

    let report = carsmith::car::verify(&path).unwrap();
    assert!(report.reclaimable() > 0);

    let (_, rc) = Catalog::open(&path).unwrap();
    let photo = rc.find("photo", None)[0];
    assert_eq!(*photo.raster().unwrap().unwrap().get_pixel(0, 0), GREEN);
    assert_eq!(photo.payload().tag, ClassTag::ThemePixel);
}

#[cfg(unix)]
#[test]
fn read_only_directory_is_a_write_error() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("locked");
    fs::create_dir(&sub).unwrap();
    let path = sample_catalog(&sub);
    let (_, rc) = Catalog::open(&path).unwrap();
    let photo = rc.find("photo", None)[0];

    fs::set_permissions(&sub, fs::Permissions::from_mode(0o555)).unwrap();
    // Privileged users can still write; nothing to check then.
    if tempfile::NamedTempFile::new_in(&sub).is_ok() {
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    let original = fs::read(&path).unwrap();
    let err = editor().edit(photo, &path, &replacement(1, 1)).unwrap_err();
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(err, EditError::UnableToWriteToCatalogFile { .. }), "{err:?}");
    assert_eq!(fs::read(&path).unwrap(), original);
}
