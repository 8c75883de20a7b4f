#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::car::build::build as build_impl;
use crate::car::catalog::{verify as verify_impl, Catalog, RenditionCollection};
use crate::car::classify::RenditionType;
use crate::car::csi::ColorValue;
use crate::car::edit::CatalogEditor;
use crate::car::error::{CatalogError, CommandError, CommandResult};
use crate::car::extract::extract_all;
use crate::car::io::hex32;
use crate::car::key::or_na;
use crate::car::rendition::{Rendition, RenditionPreview};
use crate::car::settings::{CodecSettings, EditSettings};

/// Picks one rendition out of a collection by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub name: String,
    pub kind: Option<RenditionType>,
    pub scale: Option<u32>,
}

impl Selector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn select(&self, collection: &RenditionCollection) -> CommandResult<Rendition> {
        let matches: Vec<&Rendition> = collection
            .find(&self.name, self.kind)
            .into_iter()
            .filter(|r| self.scale.map_or(true, |s| r.scale() == s))
            .collect();
        match matches.as_slice() {
            [] => Err(CommandError::NotFound(self.name.clone())),
            [one] => Ok((*one).clone()),
            many => Err(CommandError::Ambiguous {
                name: self.name.clone(),
                candidates: many
                    .iter()
                    .map(|r| format!("{} @{}x", r.kind(), r.scale()))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Replacement content for `edit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    Image(PathBuf),
    Color(ColorValue),
}

/// Parses `r,g,b,a` with components in 0..=1.
pub fn parse_color(s: &str) -> CommandResult<ColorValue> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CommandError::Argument(format!("color {s:?}: {e}")))?;
    match parts.as_slice() {
        [r, g, b, a] if parts.iter().all(|c| (0.0..=1.0).contains(c)) => {
            Ok(ColorValue::rgba(*r, *g, *b, *a))
        }
        _ => Err(CommandError::Argument(format!(
            "color {s:?}: expected four components r,g,b,a in 0..=1"
        ))),
    }
}

/// Label/value rows describing one rendition.
pub fn describe(r: &Rendition) -> Vec<(&'static str, String)> {
    let mut rows = vec![("Name", r.name().to_string())];
    if r.lookup_name() != r.name() {
        rows.push(("Lookup name", r.lookup_name().to_string()));
    }
    if r.rendition_name() != r.name() {
        rows.push(("Rendition name", r.rendition_name().to_string()));
    }
    rows.push(("Type", r.kind().to_string()));

    let size = r.unsliced_size();
    if size.width > 0 {
        rows.push(("Width", size.width.to_string()));
    }
    if size.height > 0 {
        rows.push(("Height", size.height.to_string()));
    }
    rows.push(("Scale", format!("{}x", r.scale())));
    rows.push(("Idiom", or_na(r.idiom())));
    rows.push(("Appearance", or_na(r.appearance())));
    rows.push(("Display gamut", or_na(r.display_gamut())));

    if r.is_internal_link() {
        let frame = r.payload().destination_frame();
        rows.push(("Link frame", frame.to_string()));
    }
    if let Some(sizes) = r.payload().sizes() {
        let sizes: Vec<String> = sizes.iter().map(|s| s.to_string()).collect();
        rows.push(("Sizes", sizes.join(", ")));
    }
    if let Some(color) = r.payload().color() {
        let comps: Vec<String> = color.components.iter().map(|c| format!("{c:.3}")).collect();
        rows.push(("Color components", comps.join(", ")));
    }
    if let Some(uti) = &r.payload().uti {
        rows.push(("UTI", uti.clone()));
    }
    rows.push(("Editable", r.is_editable().to_string()));
    rows
}

pub fn list(car: &Path, query: Option<&str>, verbose: bool) -> CommandResult<()> {
    let (_, collection) = Catalog::open(car)?;
    let collection = match query {
        Some(q) => collection.filter(q),
        None => collection,
    };

    for group in &collection {
        println!("{} ({})", group.kind, group.renditions.len());
        for r in &group.renditions {
            if verbose {
                let size = r.unsliced_size();
                println!(
                    "  {}  {}x{} @{}x idiom={} appearance={} gamut={} digest={}",
                    r.name(),
                    size.width,
                    size.height,
                    r.scale(),
                    or_na(r.idiom()),
                    or_na(r.appearance()),
                    or_na(r.display_gamut()),
                    hex32(r.entry().digest())
                );
            } else {
                println!("  {}", r.name());
            }
        }
    }
    Ok(())
}

pub fn info(car: &Path, selector: &Selector) -> CommandResult<()> {
    let (_, collection) = Catalog::open(car)?;
    let rendition = selector.select(&collection)?;
    for (label, value) in describe(&rendition) {
        println!("{label:>16}: {value}");
    }
    Ok(())
}

pub fn extract(car: &Path, output: &Path, query: Option<&str>) -> CommandResult<()> {
    let (_, collection) = Catalog::open(car)?;
    let collection = match query {
        Some(q) => collection.filter(q),
        None => collection,
    };
    let report = extract_all(&collection, output)?;
    println!("extracted {} item(s) to {}", report.written.len(), output.display());
    if !report.is_clean() {
        return Err(CommandError::Extract(report.failed));
    }
    Ok(())
}

pub fn remove(car: &Path, selector: &Selector, settings: EditSettings) -> CommandResult<()> {
    let (_, collection) = Catalog::open(car)?;
    let rendition = selector.select(&collection)?;
    CatalogEditor::new(settings).remove(&rendition, car)?;

    let (_, collection) = Catalog::open(car)?;
    println!(
        "removed {}; {} rendition(s) left",
        rendition.name(),
        collection.len()
    );
    Ok(())
}

pub fn edit(
    car: &Path,
    selector: &Selector,
    replacement: &Replacement,
    settings: EditSettings,
) -> CommandResult<()> {
    let (_, collection) = Catalog::open(car)?;
    let rendition = selector.select(&collection)?;

    let preview = match replacement {
        Replacement::Image(path) => {
            let image = image::open(path).map_err(CatalogError::from)?.to_rgba8();
            RenditionPreview::Image(Arc::new(image))
        }
        Replacement::Color(color) => RenditionPreview::Color(color.clone()),
    };
    CatalogEditor::new(settings).edit(&rendition, car, &preview)?;

    let (_, collection) = Catalog::open(car)?;
    let edited = selector.select(&collection)?;
    let size = edited.unsliced_size();
    println!("edited {} ({}x{})", edited.name(), size.width, size.height);
    Ok(())
}

pub fn build(
    input: &Path,
    output: &Path,
    prefix: &str,
    excludes: &[String],
    codec: CodecSettings,
) -> CommandResult<()> {
    let summary = build_impl(input, output, prefix, excludes, codec)?;
    println!(
        "built {}: {} image(s), {} data item(s)",
        output.display(),
        summary.images,
        summary.data
    );
    Ok(())
}

pub fn verify(car: &Path) -> CommandResult<()> {
    let report = verify_impl(car)?;
    for name in &report.dangling {
        println!("dangling lookup: {name}");
    }
    println!(
        "ok: {} assets, {} lookups, {} of {} bytes live ({} reclaimable)",
        report.assets,
        report.lookups,
        report.live_bytes,
        report.file_bytes,
        report.reclaimable()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_argument_parses_four_unit_components() {
        let c = parse_color("1, 0.5, 0, 1").unwrap();
        assert_eq!(c.components, vec![1.0, 0.5, 0.0, 1.0]);
        assert!(parse_color("1,0,0").is_err());
        assert!(parse_color("2,0,0,1").is_err());
        assert!(parse_color("red").is_err());
    }
}
