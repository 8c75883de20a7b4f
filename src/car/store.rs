#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::car::build::{write_asset, write_index};
use crate::car::error::{CatalogError, CatalogResult};
use crate::car::format::{AssetRecord, NamedLookup, MAGIC};
use crate::car::key::{KeyFormat, RenditionKey};
use crate::car::read::{check_header, read_index, read_payload};

#[derive(Debug, Clone)]
enum AssetSlot {
    Stored(AssetRecord),
    Pending(Vec<u8>),
}

/// Writable view of a catalog's key-value asset table.
///
/// Changes stay in memory until [`MutableAssetStore::write_to_disk`], which
/// is the only point at which the file is touched.
#[derive(Debug)]
pub struct MutableAssetStore {
    path: PathBuf,
    file: File,
    key_format: KeyFormat,
    assets: BTreeMap<Vec<u8>, AssetSlot>,
    lookups: Vec<NamedLookup>,
    changed: bool,
}

impl MutableAssetStore {
    /// Opens `path` for reading and writing.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        check_header(&mut file)?;
        let index = read_index(&mut file)?;

        let assets = index
            .assets
            .into_iter()
            .map(|a| (a.key.clone(), AssetSlot::Stored(a)))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            key_format: index.key_format,
            assets,
            lookups: index.lookups,
            changed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_format(&self) -> &KeyFormat {
        &self.key_format
    }

    pub fn lookups(&self) -> &[NamedLookup] {
        &self.lookups
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Raw key data for `key` in this file's key format.
    pub fn convert_key(&self, key: &RenditionKey) -> Option<Vec<u8>> {
        self.key_format.encode(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.assets.contains_key(key)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn asset(&mut self, key: &[u8]) -> CatalogResult<Option<Vec<u8>>> {
        match self.assets.get(key) {
            None => Ok(None),
            Some(AssetSlot::Pending(bytes)) => Ok(Some(bytes.clone())),
            Some(AssetSlot::Stored(record)) => {
                let record = record.clone();
                read_payload(&mut self.file, &record).map(Some)
            }
        }
    }

    pub fn set_asset(&mut self, key: Vec<u8>, payload: Vec<u8>) -> CatalogResult<()> {
        if key.len() != self.key_format.key_len() {
            return Err(CatalogError::Invalid(format!(
                "key is {} bytes, key format needs {}",
                key.len(),
                self.key_format.key_len()
            )));
        }
        self.assets.insert(key, AssetSlot::Pending(payload));
        self.changed = true;
        Ok(())
    }

    /// Drops the asset and every lookup naming it. Returns whether it existed.
    pub fn remove_asset(&mut self, key: &[u8]) -> bool {
        if self.assets.remove(key).is_none() {
            return false;
        }
        self.lookups.retain(|l| l.key_data != key);
        self.changed = true;
        true
    }

    /// Commits the store. `compact` rewrites the whole file through a temp
    /// file and renames it over the original; otherwise changed payloads and
    /// a new index are appended and the old bytes become dead space.
    pub fn write_to_disk(mut self, compact: bool) -> CatalogResult<()> {
        if compact {
            self.write_compact()?;
        } else {
            self.write_appended()?;
        }
        info!(
            path = %self.path.display(),
            compact,
            assets = self.assets.len(),
            lookups = self.lookups.len(),
            "catalog written"
        );
        Ok(())
    }

    fn write_compact(&mut self) -> CatalogResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let out = tmp.as_file_mut();
            out.write_all(&MAGIC)?;
            let mut records = Vec::with_capacity(self.assets.len());
            for (key, slot) in &self.assets {
                let payload = match slot {
                    AssetSlot::Pending(bytes) => bytes.clone(),
                    AssetSlot::Stored(record) => read_payload(&mut self.file, record)?,
                };
                records.push(write_asset(out, key.clone(), &payload)?);
            }
            write_index(out, &self.key_format, &records, &self.lookups)?;
            out.flush()?;
            out.set_permissions(self.file.metadata()?.permissions())?;
            out.sync_all()?;
        }
        tmp.persist(&self.path).map_err(|e| CatalogError::Io(e.error))?;
        Ok(())
    }

    /// On failure the file is cut back to its previous length so the old
    /// footer stays at EOF.
    fn write_appended(&mut self) -> CatalogResult<()> {
        let committed_len = self.file.metadata()?.len();
        let res = self.append_tail(committed_len);
        if res.is_err() {
            if let Err(e) = self.file.set_len(committed_len) {
                warn!(path = %self.path.display(), error = %e, "could not roll back appended bytes");
            }
        }
        res
    }

    fn append_tail(&mut self, committed_len: u64) -> CatalogResult<()> {
        self.file.seek(SeekFrom::Start(committed_len))?;
        let mut records = Vec::with_capacity(self.assets.len());
        for (key, slot) in &self.assets {
            let record = match slot {
                AssetSlot::Stored(record) => record.clone(),
                AssetSlot::Pending(bytes) => {
                    debug!(key_len = key.len(), bytes = bytes.len(), "appending payload");
                    write_asset(&mut self.file, key.clone(), bytes)?
                }
            };
            records.push(record);
        }
        write_index(&mut self.file, &self.key_format, &records, &self.lookups)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
