#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::car::csi::{Blob, ClassTag, PayloadBody, RenditionPayload};
use crate::car::error::{CatalogError, CatalogResult};
use crate::car::format::{AssetRecord, NamedLookup, Rect, Size, FOOTER_MAGIC, MAGIC};
use crate::car::generator::RenditionGenerator;
use crate::car::io::{short_hash, write_u32, write_u64};
use crate::car::key::{KeyAttribute, KeyFormat, RenditionKey};
use crate::car::path::{lookup_name_and_scale, normalize_rel_path, prefixed, should_exclude};
use crate::car::settings::CodecSettings;

/// Writes the index block and footer at the current position of `out`.
///
/// Index:
/// - [MAGIC 8]
/// - [u16 attr_count][u16 attribute id]...
/// - [u32 asset_count] then per asset:
///   [u16 key_len][key][u64 offset][u64 len][u8 blake3[32]]
/// - [u32 lookup_count] then per lookup:
///   [u16 name_len][name][u16 key_len][key]
///
/// Footer:
/// - [FOOTER_MAGIC 8][u64 index_offset][u64 index_len]
/// - [u32 index_hash (blake3 truncated to u32)][u32 reserved]
pub(crate) fn write_index<W: Write + Seek>(
    out: &mut W,
    key_format: &KeyFormat,
    assets: &[AssetRecord],
    lookups: &[NamedLookup],
) -> CatalogResult<()> {
    let index_offset = out.stream_position()?;

    let mut index_buf: Vec<u8> = Vec::new();
    index_buf.extend_from_slice(&MAGIC);
    index_buf.extend_from_slice(&(key_format.attributes().len() as u16).to_le_bytes());
    for attr in key_format.attributes() {
        index_buf.extend_from_slice(&attr.id().to_le_bytes());
    }

    index_buf.extend_from_slice(&(assets.len() as u32).to_le_bytes());
    for a in assets {
        index_buf.extend_from_slice(&(a.key.len() as u16).to_le_bytes());
        index_buf.extend_from_slice(&a.key);
        index_buf.extend_from_slice(&a.payload_offset.to_le_bytes());
        index_buf.extend_from_slice(&a.payload_len.to_le_bytes());
        index_buf.extend_from_slice(&a.hash);
    }

    index_buf.extend_from_slice(&(lookups.len() as u32).to_le_bytes());
    for l in lookups {
        let name = l.name.as_bytes();
        if name.len() > u16::MAX as usize {
            return Err(CatalogError::Invalid(format!("name too long: {}", l.name)));
        }
        index_buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        index_buf.extend_from_slice(name);
        index_buf.extend_from_slice(&(l.key_data.len() as u16).to_le_bytes());
        index_buf.extend_from_slice(&l.key_data);
    }

    let index_hash = short_hash(&index_buf);
    out.write_all(&index_buf)?;
    let index_len = out.stream_position()? - index_offset;

    out.write_all(&FOOTER_MAGIC)?;
    write_u64(out, index_offset)?;
    write_u64(out, index_len)?;
    write_u32(out, index_hash)?;
    write_u32(out, 0)?;
    Ok(())
}

/// Appends one payload and returns its asset-table row.
pub(crate) fn write_asset<W: Write + Seek>(
    out: &mut W,
    key: Vec<u8>,
    payload: &[u8],
) -> CatalogResult<AssetRecord> {
    let payload_offset = out.stream_position()?;
    out.write_all(payload)?;
    Ok(AssetRecord {
        key,
        payload_offset,
        payload_len: payload.len() as u64,
        hash: blake3::hash(payload).into(),
    })
}

/// Assembles a catalog from scratch.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    key_format: KeyFormat,
    assets: BTreeMap<Vec<u8>, Vec<u8>>,
    lookups: Vec<NamedLookup>,
}

impl ContainerBuilder {
    pub fn new(key_format: KeyFormat) -> Self {
        Self {
            key_format,
            assets: BTreeMap::new(),
            lookups: Vec::new(),
        }
    }

    pub fn key_format(&self) -> &KeyFormat {
        &self.key_format
    }

    fn key_data(&self, key: &RenditionKey) -> CatalogResult<Vec<u8>> {
        self.key_format
            .encode(key)
            .ok_or_else(|| CatalogError::Invalid(format!("key {key:?} does not fit the key format")))
    }

    /// Stores raw payload bytes under `key`; keys must be unique.
    pub fn add_asset(&mut self, key: &RenditionKey, payload: Vec<u8>) -> CatalogResult<Vec<u8>> {
        let data = self.key_data(key)?;
        if self.assets.contains_key(&data) {
            return Err(CatalogError::Invalid(format!("duplicate asset key {key:?}")));
        }
        self.assets.insert(data.clone(), payload);
        Ok(data)
    }

    /// Adds a lookup. The asset does not have to exist.
    pub fn add_lookup(&mut self, name: impl Into<String>, key: &RenditionKey) -> CatalogResult<()> {
        let key_data = self.key_data(key)?;
        self.lookups.push(NamedLookup {
            name: name.into(),
            key_data,
        });
        Ok(())
    }

    pub fn add_rendition(
        &mut self,
        name: impl Into<String>,
        key: &RenditionKey,
        payload: &RenditionPayload,
    ) -> CatalogResult<()> {
        self.add_asset(key, payload.to_bytes()?)?;
        self.add_lookup(name, key)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn write(&self, output: &Path) -> CatalogResult<()> {
        let mut out = File::create(output)?;
        out.write_all(&MAGIC)?;

        let mut records = Vec::with_capacity(self.assets.len());
        for (key, payload) in &self.assets {
            records.push(write_asset(&mut out, key.clone(), payload)?);
        }
        write_index(&mut out, &self.key_format, &records, &self.lookups)?;

        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub images: usize,
    pub data: usize,
}

/// Packs `input` into a catalog at `output`.
///
/// Files the `image` crate decodes become theme-pixel renditions (under an
/// `.appiconset/` directory, icons); everything else is stored as data.
/// Entries are added in path order so the output is deterministic.
pub fn build(
    input: &Path,
    output: &Path,
    prefix: &str,
    excludes: &[String],
    codec: CodecSettings,
) -> CatalogResult<BuildSummary> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for ent in WalkDir::new(input).follow_links(false).into_iter() {
        let ent = ent.map_err(|e| {
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            CatalogError::Io(io)
        })?;

        if !ent.file_type().is_file() {
            continue;
        }

        let rel = normalize_rel_path(input, ent.path())?;
        let logical = prefixed(prefix, &rel);
        if should_exclude(&logical, excludes) {
            continue;
        }
        files.push((logical, ent.path().to_path_buf()));
    }

    files.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut builder = ContainerBuilder::new(KeyFormat::standard());
    let mut summary = BuildSummary::default();

    for (i, (logical, physical)) in files.into_iter().enumerate() {
        let raw = std::fs::read(&physical)?;
        let file_name = logical.rsplit('/').next().unwrap_or(&logical).to_string();
        let (lookup_name, scale) = lookup_name_and_scale(&logical);
        let identifier = u16::try_from(i + 1)
            .map_err(|_| CatalogError::Invalid("too many files for one catalog".into()))?;

        let mut key = RenditionKey::new()
            .with(KeyAttribute::Identifier, identifier)
            .with(KeyAttribute::Scale, scale);

        let payload = match image::load_from_memory(&raw) {
            Ok(img) => {
                let img = img.to_rgba8();
                if logical.contains(".appiconset/") {
                    key.set(KeyAttribute::Element, 85);
                    key.set(KeyAttribute::Part, 220);
                }
                let size = Size::new(img.width(), img.height());
                let mut generator = RenditionGenerator::new(size, 1, 0).ok_or_else(|| {
                    CatalogError::Invalid(format!("{logical} has an empty canvas"))
                })?;
                generator.name = file_name.clone();
                generator.scale_factor = u32::from(scale);
                generator.uti_type = uti_for(&file_name).map(str::to_string);
                generator.add_bitmap(img);
                generator.add_slice_rect(Rect::from_size(size));
                summary.images += 1;
                generator.payload(codec.compress, codec.zstd_level)?
            }
            Err(_) => {
                let tag = match extension(&file_name).as_deref() {
                    Some("pdf") => ClassTag::Pdf,
                    Some("svg") => ClassTag::Svg,
                    _ => ClassTag::RawData,
                };
                let blob = Blob::pack(&raw, codec.compress, codec.zstd_level)?;
                let mut payload = RenditionPayload::new(tag, file_name.clone(), PayloadBody::Data(blob));
                payload.scale_factor = u32::from(scale);
                payload.uti = uti_for(&file_name).map(str::to_string);
                summary.data += 1;
                payload
            }
        };

        debug!(path = %logical, lookup = %lookup_name, tag = ?payload.tag, "packed entry");
        builder.add_rendition(lookup_name, &key, &payload)?;
    }

    builder.write(output)?;
    info!(
        output = %output.display(),
        images = summary.images,
        data = summary.data,
        "catalog built"
    );
    Ok(summary)
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn uti_for(name: &str) -> Option<&'static str> {
    match extension(name)?.as_str() {
        "png" => Some("public.png"),
        "jpg" | "jpeg" => Some("public.jpeg"),
        "gif" => Some("com.compuserve.gif"),
        "pdf" => Some("com.adobe.pdf"),
        "svg" => Some("public.svg-image"),
        _ => None,
    }
}
