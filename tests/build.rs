mod common;

use std::fs;

use carsmith::car::{build, verify, Catalog, CodecSettings, RenditionType};
use common::*;
use image::RgbaImage;

#[test]
fn directory_packs_into_a_browsable_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("assets");
    fs::create_dir_all(input.join("icons/App.appiconset")).unwrap();
    fs::create_dir_all(input.join(".git")).unwrap();

    RgbaImage::from_pixel(3, 2, RED).save(input.join("star.png")).unwrap();
    RgbaImage::from_pixel(6, 4, RED).save(input.join("star@2x.png")).unwrap();
    RgbaImage::from_pixel(2, 2, GREEN)
        .save(input.join("icons/App.appiconset/icon.png"))
        .unwrap();
    fs::write(input.join("manual.pdf"), b"%PDF-1.7 tiny").unwrap();
    fs::write(input.join("notes.txt"), b"hello").unwrap();
    fs::write(input.join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

    let output = dir.path().join("Assets.car");
    let summary = build(
        &input,
        &output,
        "",
        &[".git".to_string()],
        CodecSettings::default(),
    )
    .unwrap();
    assert_eq!(summary.images, 3);
    assert_eq!(summary.data, 2);

    let (catalog, rc) = Catalog::open(&output).unwrap();
    assert!(catalog.dangling_lookups().is_empty());
    assert_eq!(rc.len(), 5);

    let stars = rc.find("star", Some(RenditionType::Image));
    assert_eq!(stars.len(), 2);
    let mut scales: Vec<u32> = stars.iter().map(|r| r.scale()).collect();
    scales.sort();
    assert_eq!(scales, [1, 2]);
    let big = stars.iter().find(|r| r.scale() == 2).unwrap();
    assert_eq!(big.raster().unwrap().unwrap().dimensions(), (6, 4));

    let icon = &rc.group(RenditionType::Icon).unwrap().renditions[0];
    assert_eq!(icon.name(), "icon.png");
    assert_eq!(rc.find("manual", None)[0].kind(), RenditionType::Pdf);
    assert_eq!(rc.find("notes", None)[0].kind(), RenditionType::RawData);
    assert_eq!(
        &*rc.find("notes", None)[0].data().unwrap().unwrap(),
        b"hello"
    );

    let report = verify(&output).unwrap();
    assert_eq!(report.assets, 5);
    assert_eq!(report.reclaimable(), 0);
}

#[test]
fn building_twice_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    fs::create_dir_all(input.join("b")).unwrap();
    RgbaImage::from_pixel(1, 1, BLUE).save(input.join("b/one.png")).unwrap();
    fs::write(input.join("a.bin"), b"\x01").unwrap();

    let first = dir.path().join("first.car");
    let second = dir.path().join("second.car");
    build(&input, &first, "pre/", &[], CodecSettings::uncompressed()).unwrap();
    build(&input, &second, "pre/", &[], CodecSettings::uncompressed()).unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

    let (_, rc) = Catalog::open(&first).unwrap();
    assert_eq!(rc.find("pre/b/one", None).len(), 1);
    assert_eq!(rc.find("pre/a", None).len(), 1);
}
