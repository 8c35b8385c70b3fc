//! Low-level read/write helpers for the binary serialization.
//!
//! All integers are LittleEndian; strings and byte blobs are length-prefixed.

use crate::{RelayError, RelayResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

// Parse-time sanity cap for length prefixes of collections and names.
// Bodies can be large (SQL literals), so only counts are capped.
pub(crate) const MAX_COLLECTION_LEN: u32 = 16_777_216;

pub(crate) fn emit_field_tag(tag: u8, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_u8(tag)?;
    Ok(())
}

pub(crate) fn expect_field_tag(tag: u8, rdr: &mut dyn std::io::Read) -> RelayResult<()> {
    let found = rdr.read_u8()?;
    if found == tag {
        Ok(())
    } else {
        Err(RelayError::Protocol(format!(
            "message body contained an invalid tag: expected field {tag}, found {found}"
        )))
    }
}

pub(crate) fn emit_bool(b: bool, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_u8(u8::from(b))?;
    Ok(())
}

pub(crate) fn parse_bool(rdr: &mut dyn std::io::Read) -> RelayResult<bool> {
    match rdr.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RelayError::Protocol(format!(
            "boolean field contained an invalid tag: {other}"
        ))),
    }
}

pub(crate) fn emit_str(s: &str, w: &mut dyn std::io::Write) -> RelayResult<()> {
    emit_bytes(s.as_bytes(), w)
}

pub(crate) fn parse_str(rdr: &mut dyn std::io::Read) -> RelayResult<String> {
    let bytes = parse_bytes(rdr)?;
    String::from_utf8(bytes)
        .map_err(|e| RelayError::Protocol(format!("string field is not valid UTF-8: {e}")))
}

pub(crate) fn emit_bytes(b: &[u8], w: &mut dyn std::io::Write) -> RelayResult<()> {
    let len = u32::try_from(b.len())
        .map_err(|_| RelayError::ImplDetailed(format!("blob too large to emit: {}", b.len())))?;
    w.write_u32::<LittleEndian>(len)?;
    w.write_all(b)?;
    Ok(())
}

pub(crate) fn parse_bytes(rdr: &mut dyn std::io::Read) -> RelayResult<Vec<u8>> {
    let len = rdr.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0_u8; len];
    rdr.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn emit_opt_str(o_s: Option<&str>, w: &mut dyn std::io::Write) -> RelayResult<()> {
    match o_s {
        Some(s) => {
            emit_bool(true, w)?;
            emit_str(s, w)
        }
        None => emit_bool(false, w),
    }
}

pub(crate) fn parse_opt_str(rdr: &mut dyn std::io::Read) -> RelayResult<Option<String>> {
    if parse_bool(rdr)? {
        Ok(Some(parse_str(rdr)?))
    } else {
        Ok(None)
    }
}

pub(crate) fn emit_i32(i: i32, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_i32::<LittleEndian>(i)?;
    Ok(())
}

pub(crate) fn parse_i32(rdr: &mut dyn std::io::Read) -> RelayResult<i32> {
    Ok(rdr.read_i32::<LittleEndian>()?)
}

pub(crate) fn emit_i64(i: i64, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_i64::<LittleEndian>(i)?;
    Ok(())
}

pub(crate) fn parse_i64(rdr: &mut dyn std::io::Read) -> RelayResult<i64> {
    Ok(rdr.read_i64::<LittleEndian>()?)
}

pub(crate) fn emit_u32(u: u32, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_u32::<LittleEndian>(u)?;
    Ok(())
}

pub(crate) fn parse_u32(rdr: &mut dyn std::io::Read) -> RelayResult<u32> {
    Ok(rdr.read_u32::<LittleEndian>()?)
}

pub(crate) fn emit_u64(u: u64, w: &mut dyn std::io::Write) -> RelayResult<()> {
    w.write_u64::<LittleEndian>(u)?;
    Ok(())
}

pub(crate) fn parse_u64(rdr: &mut dyn std::io::Read) -> RelayResult<u64> {
    Ok(rdr.read_u64::<LittleEndian>()?)
}

pub(crate) fn emit_len(len: usize, w: &mut dyn std::io::Write) -> RelayResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| RelayError::ImplDetailed(format!("collection too large to emit: {len}")))?;
    w.write_u32::<LittleEndian>(len)?;
    Ok(())
}

pub(crate) fn parse_len(rdr: &mut dyn std::io::Read) -> RelayResult<usize> {
    let len = rdr.read_u32::<LittleEndian>()?;
    if len > MAX_COLLECTION_LEN {
        return Err(RelayError::Protocol(format!(
            "collection length prefix contained an invalid tag: {len}"
        )));
    }
    Ok(len as usize)
}
