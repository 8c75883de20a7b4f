#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::car::error::{CatalogError, CatalogResult};
use crate::car::format::{AssetRecord, NamedLookup, FOOTER_LEN, FOOTER_MAGIC, MAGIC};
use crate::car::io::{
    read_exact, read_short_bytes, read_short_string, read_u16, read_u32, read_u64, short_hash,
};
use crate::car::key::KeyFormat;

/// Parsed index block.
#[derive(Debug, Clone)]
pub(crate) struct CatalogIndex {
    pub key_format: KeyFormat,
    /// Sorted by key bytes, no duplicates.
    pub assets: Vec<AssetRecord>,
    /// In stored (enumeration) order.
    pub lookups: Vec<NamedLookup>,
}

impl CatalogIndex {
    pub fn asset(&self, key: &[u8]) -> Option<&AssetRecord> {
        self.assets
            .binary_search_by(|a| a.key.as_slice().cmp(key))
            .ok()
            .map(|i| &self.assets[i])
    }
}

pub(crate) fn check_header(file: &mut File) -> CatalogResult<()> {
    file.seek(SeekFrom::Start(0))?;
    let head = read_exact::<8>(file)?;
    if head != MAGIC {
        return Err(CatalogError::Invalid("bad header magic".into()));
    }
    Ok(())
}

pub(crate) fn read_footer(file: &mut File) -> CatalogResult<(u64, u64, u32)> {
    let size = file.metadata()?.len();
    if size < MAGIC.len() as u64 + FOOTER_LEN {
        return Err(CatalogError::Invalid("file too small".into()));
    }
    file.seek(SeekFrom::End(-(FOOTER_LEN as i64)))?;

    let magic = read_exact::<8>(file)?;
    if magic != FOOTER_MAGIC {
        return Err(CatalogError::Invalid("bad footer magic".into()));
    }

    let index_offset = read_u64(file)?;
    let index_len = read_u64(file)?;
    let index_hash = read_u32(file)?;
    let _reserved = read_u32(file)?;

    Ok((index_offset, index_len, index_hash))
}

pub(crate) fn read_index(file: &mut File) -> CatalogResult<CatalogIndex> {
    let (index_offset, index_len, index_hash) = read_footer(file)?;
    let file_len = file.metadata()?.len();

    let index_end = index_offset
        .checked_add(index_len)
        .ok_or_else(|| CatalogError::Invalid("index length overflows".into()))?;
    if index_offset < MAGIC.len() as u64 || index_end > file_len - FOOTER_LEN {
        return Err(CatalogError::Invalid("index outside file".into()));
    }

    file.seek(SeekFrom::Start(index_offset))?;
    let mut index_buf = vec![0u8; index_len as usize];
    file.read_exact(&mut index_buf)?;

    if short_hash(&index_buf) != index_hash {
        return Err(CatalogError::Invalid("index hash mismatch".into()));
    }

    let mut cur = std::io::Cursor::new(index_buf);

    let magic = read_exact::<8>(&mut cur)?;
    if magic != MAGIC {
        return Err(CatalogError::Invalid("bad index magic".into()));
    }

    let attr_count = read_u16(&mut cur)? as usize;
    let mut ids = Vec::with_capacity(attr_count);
    for _ in 0..attr_count {
        ids.push(read_u16(&mut cur)?);
    }
    let key_format = KeyFormat::from_ids(&ids)?;

    let asset_count = read_u32(&mut cur)? as usize;
    let mut assets: Vec<AssetRecord> = Vec::with_capacity(asset_count.min(1 << 16));
    for _ in 0..asset_count {
        let key = read_short_bytes(&mut cur)?;
        if key.len() != key_format.key_len() {
            return Err(CatalogError::Invalid(format!(
                "asset key is {} bytes, key format needs {}",
                key.len(),
                key_format.key_len()
            )));
        }
        let payload_offset = read_u64(&mut cur)?;
        let payload_len = read_u64(&mut cur)?;
        let hash = read_exact::<32>(&mut cur)?;
        assets.push(AssetRecord {
            key,
            payload_offset,
            payload_len,
            hash,
        });
    }

    for w in assets.windows(2) {
        if w[0].key.cmp(&w[1].key) != Ordering::Less {
            return Err(CatalogError::Invalid(
                "asset table is not sorted or repeats a key".into(),
            ));
        }
    }

    let lookup_count = read_u32(&mut cur)? as usize;
    let mut lookups = Vec::with_capacity(lookup_count.min(1 << 16));
    for _ in 0..lookup_count {
        let name = read_short_string(&mut cur)?;
        let key_data = read_short_bytes(&mut cur)?;
        if key_data.len() != key_format.key_len() {
            return Err(CatalogError::Invalid(format!("lookup {name:?} has a malformed key")));
        }
        lookups.push(NamedLookup { name, key_data });
    }

    if cur.position() != cur.get_ref().len() as u64 {
        return Err(CatalogError::Invalid("trailing bytes in index".into()));
    }

    Ok(CatalogIndex {
        key_format,
        assets,
        lookups,
    })
}

/// Reads one asset payload, checking bounds and its blake3 digest.
pub(crate) fn read_payload(file: &mut File, record: &AssetRecord) -> CatalogResult<Vec<u8>> {
    let file_len = file.metadata()?.len();
    let end = record
        .payload_offset
        .checked_add(record.payload_len)
        .ok_or_else(|| CatalogError::Invalid("payload length overflows".into()))?;
    if record.payload_offset < MAGIC.len() as u64 || end > file_len {
        return Err(CatalogError::Invalid("payload outside file".into()));
    }

    file.seek(SeekFrom::Start(record.payload_offset))?;
    let mut payload = vec![0u8; record.payload_len as usize];
    file.read_exact(&mut payload)?;

    let got: [u8; 32] = blake3::hash(&payload).into();
    if got != record.hash {
        return Err(CatalogError::Invalid("payload hash mismatch".into()));
    }
    Ok(payload)
}
