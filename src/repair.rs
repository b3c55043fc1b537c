//! Huffman table repair for JPEG-family frames.
//!
//! Many hardware MJPEG encoders leave the DHT segment out of every frame and
//! rely on the standard tables from ITU T.81 Annex K. General-purpose
//! decoders refuse such streams, so the tables are spliced back in first.

use std::borrow::Cow;

const MARKER_DHT: u8 = 0xC4;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOI: u8 = 0xD8;
const MARKER_TEM: u8 = 0x01;
const MARKER_RST0: u8 = 0xD0;
const MARKER_RST7: u8 = 0xD7;
const MARKER_FILL: u8 = 0xFF;

/// Offset just past the start-of-image marker.
const HEADER_LEN: usize = 2;

const DC_LUMA_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const DC_CHROMA_BITS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const AC_LUMA_BITS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
const AC_LUMA_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
    0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
    0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
    0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
    0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
    0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
    0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
    0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
    0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

const AC_CHROMA_BITS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
const AC_CHROMA_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
    0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
    0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
    0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
    0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
    0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
    0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
    0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
    0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
    0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
];

/// Length of [`DEFAULT_DHT`]: marker, length field, four class/id bytes,
/// four 16-byte count tables and the code values.
pub const DEFAULT_DHT_LEN: usize = 2 + 2 + 4 * (1 + 16) + 12 + 12 + 162 + 162;

/// The standard DHT segment (DC/AC, luminance/chrominance), marker included.
pub static DEFAULT_DHT: [u8; DEFAULT_DHT_LEN] = build_default_dht();

const fn copy_into<const N: usize>(
    mut out: [u8; DEFAULT_DHT_LEN],
    mut at: usize,
    src: &[u8; N],
) -> ([u8; DEFAULT_DHT_LEN], usize) {
    let mut i = 0;
    while i < N {
        out[at] = src[i];
        at += 1;
        i += 1;
    }
    (out, at)
}

#[allow(clippy::cast_possible_truncation)]
const fn build_default_dht() -> [u8; DEFAULT_DHT_LEN] {
    let body_len = (DEFAULT_DHT_LEN - 2) as u16;
    let out = [0u8; DEFAULT_DHT_LEN];
    let (out, at) = copy_into(
        out,
        0,
        &[0xFF, MARKER_DHT, (body_len >> 8) as u8, body_len as u8],
    );
    let (out, at) = copy_into(out, at, &[0x00]);
    let (out, at) = copy_into(out, at, &DC_LUMA_BITS);
    let (out, at) = copy_into(out, at, &DC_VALUES);
    let (out, at) = copy_into(out, at, &[0x01]);
    let (out, at) = copy_into(out, at, &DC_CHROMA_BITS);
    let (out, at) = copy_into(out, at, &DC_VALUES);
    let (out, at) = copy_into(out, at, &[0x10]);
    let (out, at) = copy_into(out, at, &AC_LUMA_BITS);
    let (out, at) = copy_into(out, at, &AC_LUMA_VALUES);
    let (out, at) = copy_into(out, at, &[0x11]);
    let (out, at) = copy_into(out, at, &AC_CHROMA_BITS);
    let (out, _) = copy_into(out, at, &AC_CHROMA_VALUES);
    out
}

/// What a scan of the segment headers found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// A DHT segment precedes the scan data.
    HasTables,
    /// No DHT; the first SOS segment starts at this offset.
    ScanAt(usize),
    /// No DHT and no SOS found before the headers ended.
    NoScan,
}

fn scan_segments(bytes: &[u8]) -> Scan {
    let mut at = HEADER_LEN;
    while let Some(&[0xFF, marker]) = bytes.get(at..at + 2) {
        match marker {
            MARKER_FILL => at += 1,
            MARKER_DHT => return Scan::HasTables,
            MARKER_SOS => return Scan::ScanAt(at),
            MARKER_EOI => return Scan::NoScan,
            // Standalone markers carry no length field.
            MARKER_TEM | MARKER_SOI | MARKER_RST0..=MARKER_RST7 => at += 2,
            _ => {
                let Some(&[hi, lo]) = bytes.get(at + 2..at + 4) else {
                    break;
                };
                at += 2 + usize::from(u16::from_be_bytes([hi, lo]));
            }
        }
    }
    Scan::NoScan
}

/// Return `bytes` unchanged if it carries Huffman tables, otherwise a new
/// stream with [`DEFAULT_DHT`] inserted before the first scan (or straight
/// after the start-of-image marker when no scan is found).
pub fn repair(bytes: &[u8]) -> Cow<'_, [u8]> {
    let insert_at = match scan_segments(bytes) {
        Scan::HasTables => return Cow::Borrowed(bytes),
        Scan::ScanAt(offset) => offset,
        Scan::NoScan => HEADER_LEN.min(bytes.len()),
    };
    log::debug!("inserting default Huffman tables at offset {insert_at}");

    let (head, tail) = bytes.split_at(insert_at);
    let mut repaired = Vec::with_capacity(bytes.len() + DEFAULT_DHT_LEN);
    repaired.extend_from_slice(head);
    repaired.extend_from_slice(&DEFAULT_DHT);
    repaired.extend_from_slice(tail);
    Cow::Owned(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI, an APP0 of `app_len` payload bytes, then the given tail.
    fn stream(app_len: u16, tail: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend((app_len + 2).to_be_bytes());
        bytes.extend(vec![0x11; usize::from(app_len)]);
        bytes.extend_from_slice(tail);
        bytes
    }

    #[test]
    fn test_default_table_layout() {
        assert_eq!(DEFAULT_DHT_LEN, 420);
        assert_eq!(&DEFAULT_DHT[..5], &[0xFF, 0xC4, 0x01, 0xA2, 0x00]);
        assert_eq!(DEFAULT_DHT[4 + 17 + 12], 0x01);
        assert_eq!(DEFAULT_DHT[DEFAULT_DHT_LEN - 1], 0xfa);
    }

    #[test]
    fn test_inserts_before_start_of_scan() {
        let sos = [0xFF, 0xDA, 0x00, 0x02, 0xAB, 0xCD, 0xFF, 0xD9];
        let original = stream(6, &sos);
        let k = original.len() - sos.len();

        let repaired = repair(&original);
        assert!(matches!(repaired, Cow::Owned(_)));
        assert_eq!(repaired.len(), original.len() + DEFAULT_DHT_LEN);
        assert_eq!(&repaired[..k], &original[..k]);
        assert_eq!(&repaired[k..k + DEFAULT_DHT_LEN], &DEFAULT_DHT[..]);
        assert_eq!(&repaired[k + DEFAULT_DHT_LEN..], &original[k..]);
    }

    #[test]
    fn test_stream_with_tables_is_untouched() {
        let tail = [0xFF, 0xC4, 0x00, 0x03, 0x00, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9];
        let original = stream(4, &tail);
        let repaired = repair(&original);
        assert!(matches!(repaired, Cow::Borrowed(_)));
        assert_eq!(repaired.as_ref(), original.as_slice());
    }

    #[test]
    fn test_tables_after_scan_do_not_count() {
        let tail = [0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xC4, 0x00, 0x02];
        let original = stream(2, &tail);
        assert_eq!(repair(&original).len(), original.len() + DEFAULT_DHT_LEN);
    }

    #[test]
    fn test_without_scan_inserts_after_header() {
        let original = stream(3, &[0xFF, 0xD9]);
        let repaired = repair(&original);
        assert_eq!(&repaired[..2], &[0xFF, 0xD8]);
        assert_eq!(&repaired[2..2 + DEFAULT_DHT_LEN], &DEFAULT_DHT[..]);
        assert_eq!(&repaired[2 + DEFAULT_DHT_LEN..], &original[2..]);
    }

    #[test]
    fn test_fill_bytes_and_standalone_markers_are_skipped() {
        let sos = [0xFF, 0xDA, 0x00, 0x02, 0xAB, 0xFF, 0xD9];
        let mut tail = vec![0xFF, 0xFF, 0xFF, 0x01, 0xFF, 0xD3, 0xFF];
        tail.extend_from_slice(&sos);
        let original = stream(2, &tail);
        let k = original.len() - sos.len();

        let repaired = repair(&original);
        assert_eq!(repaired.len(), original.len() + DEFAULT_DHT_LEN);
        assert_eq!(&repaired[k..k + DEFAULT_DHT_LEN], &DEFAULT_DHT[..]);
        assert_eq!(&repaired[k + DEFAULT_DHT_LEN..], &sos[..]);
    }

    #[test]
    fn test_tables_after_fill_bytes_are_found() {
        let tail = [0xFF, 0xFF, 0xFF, 0xC4, 0x00, 0x03, 0x00, 0xFF, 0xDA, 0x00, 0x02];
        let original = stream(2, &tail);
        assert!(matches!(repair(&original), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncated_segment_stops_scan() {
        let original = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x40, 0x00, 0x01];
        let repaired = repair(&original);
        assert_eq!(repaired.len(), original.len() + DEFAULT_DHT_LEN);
    }
}
