#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::car::classify::RenditionType;
use crate::car::csi::RenditionPayload;
use crate::car::error::{CatalogError, CatalogResult};
use crate::car::format::{AssetRecord, FOOTER_LEN, MAGIC};
use crate::car::io::hex;
use crate::car::key::KeyFormat;
use crate::car::read::{check_header, read_index, read_payload, CatalogIndex};
use crate::car::rendition::{Rendition, RenditionEntry};

/// An opened catalog file.
///
/// The handle only describes what was read; renditions never reach back into
/// the file and mutations go through [`crate::car::MutableAssetStore`].
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    key_format: KeyFormat,
    file_len: u64,
    asset_count: usize,
    lookup_count: usize,
    dangling: Vec<String>,
}

impl Catalog {
    /// Reads `path` from disk and indexes every named lookup.
    ///
    /// Fails on a bad header, footer, index or payload header. Bodies are
    /// decoded lazily so a corrupt pixel buffer does not fail the open.
    pub fn open(path: &Path) -> CatalogResult<(Catalog, RenditionCollection)> {
        let mut file = File::open(path)?;
        check_header(&mut file)?;
        let index = read_index(&mut file)?;
        let file_len = file.metadata()?.len();

        let mut entries: HashMap<Vec<u8>, Arc<RenditionEntry>> = HashMap::new();
        let mut groups: Vec<RenditionGroup> = Vec::new();
        let mut dangling = Vec::new();

        for lookup in &index.lookups {
            let entry = match entries.get(&lookup.key_data) {
                Some(entry) => Arc::clone(entry),
                None => {
                    let Some(record) = index.asset(&lookup.key_data) else {
                        warn!(name = %lookup.name, "lookup points at a missing asset, skipped");
                        dangling.push(lookup.name.clone());
                        continue;
                    };
                    let entry = Arc::new(load_entry(&mut file, &index, record)?);
                    entries.insert(lookup.key_data.clone(), Arc::clone(&entry));
                    entry
                }
            };

            let key = index.key_format.decode(&lookup.key_data)?;
            let rendition = Rendition::new(lookup.clone(), key, entry);
            debug!(
                name = %rendition.name(),
                kind = %rendition.kind(),
                tag = ?rendition.payload().tag,
                "indexed rendition"
            );

            match groups.iter_mut().find(|g| g.kind == rendition.kind()) {
                Some(group) => group.renditions.push(rendition),
                None => groups.push(RenditionGroup {
                    kind: rendition.kind(),
                    renditions: vec![rendition],
                }),
            }
        }

        groups.sort_by_cached_key(|g| g.kind.to_string());

        let catalog = Catalog {
            path: path.to_path_buf(),
            key_format: index.key_format.clone(),
            file_len,
            asset_count: index.assets.len(),
            lookup_count: index.lookups.len(),
            dangling,
        };
        let collection = RenditionCollection { groups };
        info!(
            path = %path.display(),
            renditions = collection.len(),
            groups = collection.groups().len(),
            "catalog opened"
        );
        Ok((catalog, collection))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_format(&self) -> &KeyFormat {
        &self.key_format
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn asset_count(&self) -> usize {
        self.asset_count
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_count
    }

    /// Names of lookups whose asset is missing.
    pub fn dangling_lookups(&self) -> &[String] {
        &self.dangling
    }
}

fn load_entry(
    file: &mut File,
    index: &CatalogIndex,
    record: &AssetRecord,
) -> CatalogResult<RenditionEntry> {
    let bytes = read_payload(file, record)?;
    let payload = RenditionPayload::parse(&bytes)?;

    let link_target = match payload.link_destination() {
        None => None,
        Some(dest) => match index.asset(dest) {
            Some(target) => Some(RenditionPayload::parse(&read_payload(file, target)?)?),
            None => {
                warn!(name = %payload.name, "link destination is missing");
                None
            }
        },
    };

    Ok(RenditionEntry {
        key_data: record.key.clone(),
        digest: record.hash,
        payload,
        link_target,
    })
}

/// Renditions of one type, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionGroup {
    pub kind: RenditionType,
    pub renditions: Vec<Rendition>,
}

/// Indexed snapshot of a catalog, grouped by type and sorted by type name.
///
/// It is never updated in place: reopen the file after a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenditionCollection {
    groups: Vec<RenditionGroup>,
}

impl RenditionCollection {
    pub fn groups(&self) -> &[RenditionGroup] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rendition> {
        self.groups.iter().flat_map(|g| g.renditions.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.renditions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, kind: RenditionType) -> Option<&RenditionGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    /// Case-insensitive substring match on display names. Empty groups are
    /// dropped; `self` is left as is.
    pub fn filter(&self, query: &str) -> RenditionCollection {
        let needle = query.to_lowercase();
        let groups = self
            .groups
            .iter()
            .filter_map(|g| {
                let renditions: Vec<Rendition> = g
                    .renditions
                    .iter()
                    .filter(|r| r.name().to_lowercase().contains(&needle))
                    .cloned()
                    .collect();
                (!renditions.is_empty()).then(|| RenditionGroup {
                    kind: g.kind,
                    renditions,
                })
            })
            .collect();
        RenditionCollection { groups }
    }

    /// Renditions whose display name is exactly `name`.
    pub fn find(&self, name: &str, kind: Option<RenditionType>) -> Vec<&Rendition> {
        self.iter()
            .filter(|r| r.name() == name)
            .filter(|r| kind.map_or(true, |k| r.kind() == k))
            .collect()
    }
}

impl<'a> IntoIterator for &'a RenditionCollection {
    type Item = &'a RenditionGroup;
    type IntoIter = std::slice::Iter<'a, RenditionGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Result of an integrity pass over a catalog file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub assets: usize,
    pub lookups: usize,
    pub dangling: Vec<String>,
    /// Bytes referenced by the header, payloads, index and footer.
    pub live_bytes: u64,
    pub file_bytes: u64,
}

impl VerifyReport {
    /// Space a compact rewrite would give back.
    pub fn reclaimable(&self) -> u64 {
        self.file_bytes.saturating_sub(self.live_bytes)
    }
}

/// Checks bounds and digests of every asset and parses every payload header.
pub fn verify(path: &Path) -> CatalogResult<VerifyReport> {
    let mut file = File::open(path)?;
    check_header(&mut file)?;
    let index = read_index(&mut file)?;
    let file_bytes = file.metadata()?.len();

    let mut live = MAGIC.len() as u64 + FOOTER_LEN;
    for record in &index.assets {
        let bytes = read_payload(&mut file, record).map_err(|e| {
            CatalogError::Invalid(format!("asset {}: {e}", hex(&record.key)))
        })?;
        RenditionPayload::parse(&bytes).map_err(|e| {
            CatalogError::Invalid(format!("asset {}: {e}", hex(&record.key)))
        })?;
        live += record.payload_len;
    }
    live += index_len(&index);

    let dangling = index
        .lookups
        .iter()
        .filter(|l| index.asset(&l.key_data).is_none())
        .map(|l| l.name.clone())
        .collect();

    Ok(VerifyReport {
        assets: index.assets.len(),
        lookups: index.lookups.len(),
        dangling,
        live_bytes: live,
        file_bytes,
    })
}

fn index_len(index: &CatalogIndex) -> u64 {
    let attrs = 2 + 2 * index.key_format.attributes().len();
    let assets: usize = index
        .assets
        .iter()
        .map(|a| 2 + a.key.len() + 8 + 8 + 32)
        .sum();
    let lookups: usize = index
        .lookups
        .iter()
        .map(|l| 2 + l.name.len() + 2 + l.key_data.len())
        .sum();
    (MAGIC.len() + attrs + 4 + assets + 4 + lookups) as u64
}
