//! Binary tag container codec: decode the embedded tag segment of a JPEG
//! into a [`TagDirectory`], serialize a directory back into segment bytes,
//! and splice the new segment into the original file.
//!
//! All three operations are pure transformations over byte buffers. Decode
//! failures are reported as [`CodecError`] and absorbed by callers — an
//! unreadable container is treated as "no metadata", never as a fatal
//! pipeline error.

use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};

use super::tags::{tag, Endian, IfdSegment, TagDirectory, TagEntry, TagType};

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The container carries no recognizable tag segment.
    #[error("no metadata segment present")]
    NoMetadata,

    /// The tag segment exists but cannot be parsed.
    #[error("malformed tag container: {0}")]
    Malformed(&'static str),

    /// The outer file structure could not be read or rebuilt.
    #[error("container error: {0}")]
    Container(String),
}

/// Parse the embedded tag segment of a JPEG file into a [`TagDirectory`].
pub fn decode(file_bytes: &[u8]) -> CodecResult<TagDirectory> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(file_bytes))
        .map_err(|e| CodecError::Container(e.to_string()))?;
    let tiff = jpeg.exif().ok_or(CodecError::NoMetadata)?;
    decode_tiff(&tiff)
}

/// Parse a raw TIFF-structured tag block (the APP1 payload after the
/// `Exif\0\0` signature, which the container layer already strips).
pub fn decode_tiff(tiff: &[u8]) -> CodecResult<TagDirectory> {
    if tiff.len() < 8 {
        return Err(CodecError::Malformed("truncated header"));
    }
    let endian = match &tiff[0..2] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return Err(CodecError::Malformed("invalid byte-order mark")),
    };
    if endian.read_u16(tiff, 2) != 42 {
        return Err(CodecError::Malformed("bad magic"));
    }

    let mut dir = TagDirectory::new(endian);
    let ifd0_offset = endian.read_u32(tiff, 4) as usize;
    let (entries, next_ifd) = read_ifd(tiff, ifd0_offset, endian)?;

    let mut exposure_offset = None;
    let mut gps_offset = None;
    for (tag_id, entry) in entries {
        match tag_id {
            tag::EXIF_IFD_POINTER => exposure_offset = entry.as_u32(endian),
            tag::GPS_IFD_POINTER => gps_offset = entry.as_u32(endian),
            _ => dir.primary.insert(tag_id, entry),
        }
    }

    if let Some(offset) = exposure_offset {
        let (entries, _) = read_ifd(tiff, offset as usize, endian)?;
        let mut interop_offset = None;
        for (tag_id, entry) in entries {
            match tag_id {
                tag::INTEROP_IFD_POINTER => interop_offset = entry.as_u32(endian),
                _ => dir.exposure.insert(tag_id, entry),
            }
        }
        if let Some(offset) = interop_offset {
            let (entries, _) = read_ifd(tiff, offset as usize, endian)?;
            for (tag_id, entry) in entries {
                dir.interop.insert(tag_id, entry);
            }
        }
    }

    if let Some(offset) = gps_offset {
        let (entries, _) = read_ifd(tiff, offset as usize, endian)?;
        for (tag_id, entry) in entries {
            dir.gps.insert(tag_id, entry);
        }
    }

    // IFD1 carries the embedded thumbnail. The stream pointer pair is
    // structural (offsets into this buffer), so it is captured as a blob
    // here and rebuilt on encode.
    if next_ifd != 0 {
        let (entries, _) = read_ifd(tiff, next_ifd as usize, endian)?;
        let mut thumb_offset = None;
        let mut thumb_len = None;
        for (tag_id, entry) in entries {
            match tag_id {
                tag::JPEG_INTERCHANGE_FORMAT => thumb_offset = entry.as_u32(endian),
                tag::JPEG_INTERCHANGE_FORMAT_LENGTH => thumb_len = entry.as_u32(endian),
                _ => dir.thumbnail.insert(tag_id, entry),
            }
        }
        if let (Some(offset), Some(len)) = (thumb_offset, thumb_len) {
            let start = offset as usize;
            let end = start.saturating_add(len as usize);
            if end <= tiff.len() && len > 0 {
                dir.thumbnail_data = Some(tiff[start..end].to_vec());
            }
        }
    }

    Ok(dir)
}

/// Read one IFD: its entries (with resolved value bytes) and the offset of
/// the next IFD in the chain. Entries with unknown field types are skipped.
fn read_ifd(
    data: &[u8],
    offset: usize,
    endian: Endian,
) -> CodecResult<(Vec<(u16, TagEntry)>, u32)> {
    if offset + 2 > data.len() {
        return Err(CodecError::Malformed("directory offset out of bounds"));
    }
    let count = endian.read_u16(data, offset) as usize;
    let entries_start = offset + 2;
    let entries_end = entries_start + count * 12;
    if entries_end + 4 > data.len() {
        return Err(CodecError::Malformed("directory extends beyond data"));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = entries_start + i * 12;
        let tag_id = endian.read_u16(data, base);
        let Some(kind) = TagType::from_u16(endian.read_u16(data, base + 2)) else {
            continue;
        };
        let value_count = endian.read_u32(data, base + 4);
        let size = (value_count as usize)
            .checked_mul(kind.value_size())
            .ok_or(CodecError::Malformed("value size overflow"))?;

        let value = if size <= 4 {
            data[base + 8..base + 8 + size].to_vec()
        } else {
            let start = endian.read_u32(data, base + 8) as usize;
            let end = start
                .checked_add(size)
                .ok_or(CodecError::Malformed("value offset overflow"))?;
            if end > data.len() {
                return Err(CodecError::Malformed("value out of bounds"));
            }
            data[start..end].to_vec()
        };

        entries.push((
            tag_id,
            TagEntry {
                kind,
                count: value_count,
                data: value,
            },
        ));
    }

    Ok((entries, endian.read_u32(data, entries_end)))
}

/// Serialize a directory back into TIFF-structured segment bytes.
///
/// Empty segments are not written at all — deletion leaves no placeholder.
/// Value bytes are copied verbatim, so rationals and vendor blobs that were
/// not deleted come back bit-for-bit identical.
pub fn encode(dir: &TagDirectory) -> CodecResult<Vec<u8>> {
    if dir.is_empty() {
        return Err(CodecError::NoMetadata);
    }
    let endian = dir.endian;

    let has_exposure = !dir.exposure.is_empty();
    // The interoperability group is only reachable through the exposure
    // group; if that was removed, this goes with it.
    let has_interop = has_exposure && !dir.interop.is_empty();
    let has_gps = !dir.gps.is_empty();
    let has_ifd1 = !dir.thumbnail.is_empty() || dir.thumbnail_data.is_some();

    let ifd0_extra = usize::from(has_exposure) + usize::from(has_gps);
    let exposure_extra = usize::from(has_interop);
    let ifd1_extra = if dir.thumbnail_data.is_some() { 2 } else { 0 };

    let ifd0_offset = 8usize;
    let exposure_offset = ifd0_offset + block_size(&dir.primary, ifd0_extra);
    let interop_offset = if has_exposure {
        exposure_offset + block_size(&dir.exposure, exposure_extra)
    } else {
        exposure_offset
    };
    let gps_offset = if has_interop {
        interop_offset + block_size(&dir.interop, 0)
    } else {
        interop_offset
    };
    let ifd1_offset = if has_gps {
        gps_offset + block_size(&dir.gps, 0)
    } else {
        gps_offset
    };
    let thumb_offset = ifd1_offset + block_size(&dir.thumbnail, ifd1_extra);

    let mut out = Vec::with_capacity(thumb_offset);
    out.extend_from_slice(match endian {
        Endian::Little => b"II",
        Endian::Big => b"MM",
    });
    out.extend_from_slice(&endian.put_u16(42));
    out.extend_from_slice(&endian.put_u32(ifd0_offset as u32));

    // IFD0
    let mut ifd0 = collect_entries(&dir.primary);
    if has_exposure {
        ifd0.push((
            tag::EXIF_IFD_POINTER,
            TagEntry::long(endian, exposure_offset as u32),
        ));
    }
    if has_gps {
        ifd0.push((tag::GPS_IFD_POINTER, TagEntry::long(endian, gps_offset as u32)));
    }
    ifd0.sort_by_key(|(tag_id, _)| *tag_id);
    let next = if has_ifd1 { ifd1_offset as u32 } else { 0 };
    write_ifd(&mut out, endian, ifd0_offset, &ifd0, next);

    // Exposure sub-IFD (with the interoperability pointer when present)
    if has_exposure {
        let mut entries = collect_entries(&dir.exposure);
        if has_interop {
            entries.push((
                tag::INTEROP_IFD_POINTER,
                TagEntry::long(endian, interop_offset as u32),
            ));
        }
        entries.sort_by_key(|(tag_id, _)| *tag_id);
        write_ifd(&mut out, endian, exposure_offset, &entries, 0);
    }

    if has_interop {
        let entries = collect_entries(&dir.interop);
        write_ifd(&mut out, endian, interop_offset, &entries, 0);
    }

    if has_gps {
        let entries = collect_entries(&dir.gps);
        write_ifd(&mut out, endian, gps_offset, &entries, 0);
    }

    // IFD1 and the relocated thumbnail stream
    if has_ifd1 {
        let mut entries = collect_entries(&dir.thumbnail);
        if let Some(ref thumb) = dir.thumbnail_data {
            entries.push((
                tag::JPEG_INTERCHANGE_FORMAT,
                TagEntry::long(endian, thumb_offset as u32),
            ));
            entries.push((
                tag::JPEG_INTERCHANGE_FORMAT_LENGTH,
                TagEntry::long(endian, thumb.len() as u32),
            ));
        }
        entries.sort_by_key(|(tag_id, _)| *tag_id);
        write_ifd(&mut out, endian, ifd1_offset, &entries, 0);
        if let Some(ref thumb) = dir.thumbnail_data {
            out.extend_from_slice(thumb);
        }
    }

    Ok(out)
}

/// Replace the tag segment of the original file with newly encoded segment
/// bytes, leaving all other file structure untouched. `None` removes the
/// segment entirely.
pub fn splice(segment: Option<&[u8]>, original: &[u8]) -> CodecResult<Vec<u8>> {
    let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(original))
        .map_err(|e| CodecError::Container(e.to_string()))?;

    let original_pos = exif_segment_pos(&jpeg);
    jpeg.set_exif(segment.map(Bytes::copy_from_slice));

    // set_exif inserts at a fixed position, which may land after an XMP
    // APP1. Restore the segment to where the file originally kept it so
    // EXIF stays ahead of XMP for strict parsers.
    if segment.is_some() {
        if let (Some(new_pos), Some(target)) = (exif_segment_pos(&jpeg), original_pos) {
            if target < new_pos {
                let segments = jpeg.segments_mut();
                let seg = segments.remove(new_pos);
                segments.insert(target, seg);
            }
        }
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

/// Position of the EXIF APP1 segment in the JPEG segment list.
fn exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}

fn collect_entries(segment: &IfdSegment) -> Vec<(u16, TagEntry)> {
    segment.iter().map(|(t, e)| (t, e.clone())).collect()
}

fn pad2(len: usize) -> usize {
    len + (len & 1)
}

/// Encoded size of one IFD block: entry count, entries, next-IFD pointer,
/// and the out-of-line value heap. `extra_entries` accounts for pointer
/// entries added at encode time (sub-IFD and thumbnail pointers, all with
/// inline 4-byte values).
fn block_size(segment: &IfdSegment, extra_entries: usize) -> usize {
    let n = segment.len() + extra_entries;
    let heap: usize = segment
        .iter()
        .map(|(_, e)| if e.data.len() > 4 { pad2(e.data.len()) } else { 0 })
        .sum();
    2 + n * 12 + 4 + heap
}

/// Write one IFD block at `base` (which must equal the current output
/// length): count, entries in the given order, next pointer, value heap.
fn write_ifd(
    out: &mut Vec<u8>,
    endian: Endian,
    base: usize,
    entries: &[(u16, TagEntry)],
    next_ifd: u32,
) {
    debug_assert_eq!(out.len(), base);

    out.extend_from_slice(&endian.put_u16(entries.len() as u16));
    let mut heap_offset = base + 2 + entries.len() * 12 + 4;
    let mut heap: Vec<u8> = Vec::new();

    for (tag_id, entry) in entries {
        out.extend_from_slice(&endian.put_u16(*tag_id));
        out.extend_from_slice(&endian.put_u16(entry.kind.to_u16()));
        out.extend_from_slice(&endian.put_u32(entry.count));
        if entry.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&endian.put_u32(heap_offset as u32));
            heap.extend_from_slice(&entry.data);
            if entry.data.len() % 2 == 1 {
                heap.push(0);
            }
            heap_offset += pad2(entry.data.len());
        }
    }

    out.extend_from_slice(&endian.put_u32(next_ifd));
    out.extend_from_slice(&heap);
}
