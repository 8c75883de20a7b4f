#![forbid(unsafe_code)]

use std::io::{Read, Write};

use crate::car::error::{CatalogError, CatalogResult};

pub fn write_u32(w: &mut dyn Write, v: u32) -> CatalogResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u64(w: &mut dyn Write, v: u64) -> CatalogResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_exact<const N: usize>(r: &mut dyn Read) -> CatalogResult<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u8(r: &mut dyn Read) -> CatalogResult<u8> {
    Ok(read_exact::<1>(r)?[0])
}

pub fn read_u16(r: &mut dyn Read) -> CatalogResult<u16> {
    Ok(u16::from_le_bytes(read_exact::<2>(r)?))
}

pub fn read_u32(r: &mut dyn Read) -> CatalogResult<u32> {
    Ok(u32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_u64(r: &mut dyn Read) -> CatalogResult<u64> {
    Ok(u64::from_le_bytes(read_exact::<8>(r)?))
}

pub fn read_f32(r: &mut dyn Read) -> CatalogResult<f32> {
    Ok(f32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_f64(r: &mut dyn Read) -> CatalogResult<f64> {
    Ok(f64::from_le_bytes(read_exact::<8>(r)?))
}

/// Reads `len` bytes, refusing lengths larger than what is left in `limit`.
pub fn read_vec(r: &mut dyn Read, len: usize, limit: usize) -> CatalogResult<Vec<u8>> {
    if len > limit {
        return Err(CatalogError::Invalid(format!(
            "length {len} exceeds remaining {limit} bytes"
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// `[u16 len][bytes]`
pub fn read_short_bytes(r: &mut dyn Read) -> CatalogResult<Vec<u8>> {
    let len = read_u16(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// `[u16 len][UTF-8]`
pub fn read_short_string(r: &mut dyn Read) -> CatalogResult<String> {
    String::from_utf8(read_short_bytes(r)?)
        .map_err(|_| CatalogError::Invalid("string is not utf8".into()))
}

pub fn push_short_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CatalogResult<()> {
    if bytes.len() > u16::MAX as usize {
        return Err(CatalogError::Invalid(format!(
            "field too long: {} bytes",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Blake3 digest truncated to the first four bytes.
pub fn short_hash(bytes: &[u8]) -> u32 {
    let full: [u8; 32] = blake3::hash(bytes).into();
    u32::from_le_bytes([full[0], full[1], full[2], full[3]])
}

pub fn hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for b in bytes.iter().copied() {
        out.push(HEX[(b >> 4) as usize]);
        out.push(HEX[(b & 0xF) as usize]);
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn hex32(v: &[u8; 32]) -> String {
    hex(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_matches_digest_width() {
        assert_eq!(hex(&[]), "");
        assert_eq!(hex(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
        let digest = [0xabu8; 32];
        assert_eq!(hex32(&digest).len(), 64);
        assert_eq!(hex32(&digest), hex(&digest));
    }
}
