//! BLE Advertising Data (AD) structure decoder.
//!
//! AD structure format: [length] [type] [content...]
//!
//! `length` counts the type byte plus the content, so a record occupies
//! `1 + length` bytes of the payload. Payloads come from untrusted radio peers:
//! declared lengths are checked against the buffer before every slice, and a
//! record that would run past the end terminates decoding instead of failing.

use core::iter::FusedIterator;

/// Complete list of 16-bit service UUIDs
pub const COMPLETE_LIST_16BIT_SERVICE_UUIDS: u8 = 0x03;

/// Service data, 16-bit UUID form (first 2 content bytes = UUID, little-endian)
pub const SERVICE_DATA_16BIT_UUID: u8 = 0x16;

/// One decoded AD structure, borrowing its content from the advertisement buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    /// Content bytes (declared length minus the type byte)
    pub content: &'a [u8],
}

/// Lazy iterator over the AD structures of one advertisement payload.
///
/// Records declaring a length of 0 or 1 carry no content and are skipped.
/// Decoding stops at the first record whose declared length overruns the
/// buffer; the iterator is fused from then on.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AdStructures<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let len = self.data[self.pos] as usize;
            let end = self.pos + 1 + len;
            if end > self.data.len() {
                log::trace!(
                    "AD structure at offset {} declares {} bytes, {} remain",
                    self.pos,
                    len,
                    self.data.len() - self.pos - 1
                );
                self.pos = self.data.len();
                return None;
            }

            let start = self.pos;
            self.pos = end;

            // Type byte only (or nothing at all)
            if len < 2 {
                continue;
            }

            return Some(AdStructure {
                ad_type: self.data[start + 1],
                content: &self.data[start + 2..end],
            });
        }
        None
    }
}

impl FusedIterator for AdStructures<'_> {}

/// Decode an advertisement payload into its AD structures.
pub fn ad_structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    fn collect(data: &[u8]) -> Vec<AdStructure<'_>, 16> {
        ad_structures(data).collect()
    }

    // ── Well-formed payloads ────────────────────────────────────────

    #[test]
    fn empty_payload_yields_nothing() {
        assert_eq!(ad_structures(&[]).next(), None);
    }

    #[test]
    fn decodes_consecutive_records() {
        let data = [
            0x02, 0x01, 0x1A, // flags
            0x03, 0x03, 0x6F, 0xFD, // 16-bit UUID list
            0x05, 0x09, b'n', b'o', b'd', b'e', // complete local name
        ];
        let ads = collect(&data);
        assert_eq!(ads.len(), 3);
        assert_eq!(ads[0].ad_type, 0x01);
        assert_eq!(ads[0].content, &[0x1A]);
        assert_eq!(ads[1].ad_type, COMPLETE_LIST_16BIT_SERVICE_UUIDS);
        assert_eq!(ads[1].content, &[0x6F, 0xFD]);
        assert_eq!(ads[2].ad_type, 0x09);
        assert_eq!(ads[2].content, b"node");
    }

    #[test]
    fn record_exactly_filling_buffer_is_yielded() {
        let data = [0x03, 0x16, 0xAA, 0xBB];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].content, &[0xAA, 0xBB]);
    }

    // ── Short records ───────────────────────────────────────────────

    #[test]
    fn zero_length_record_skipped_next_decoded() {
        let data = [0x00, 0x03, 0x03, 0x6F, 0xFD];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, 0x03);
        assert_eq!(ads[0].content, &[0x6F, 0xFD]);
    }

    #[test]
    fn type_only_record_skipped_next_decoded() {
        let data = [0x01, 0xFF, 0x02, 0x0A, 0xF4];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, 0x0A);
        assert_eq!(ads[0].content, &[0xF4]);
    }

    #[test]
    fn zero_padding_yields_nothing() {
        let data = [0u8; 31];
        assert_eq!(collect(&data).len(), 0);
    }

    #[test]
    fn trailing_type_only_record_at_end_of_buffer() {
        // Length 1 with its type byte as the last byte of the buffer
        let data = [0x02, 0x01, 0x06, 0x01, 0x09];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, 0x01);
    }

    // ── Bounds ──────────────────────────────────────────────────────

    #[test]
    fn overrunning_trailing_record_omitted() {
        let data = [0x02, 0x01, 0x06, 0x17, 0x16, 0x6F, 0xFD, 0x00];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, 0x01);
    }

    #[test]
    fn overrun_terminates_even_if_later_bytes_look_valid() {
        // Second record claims 5 bytes but only 4 follow
        let data = [0x02, 0x01, 0x06, 0x05, 0x03, 0x6F, 0xFD, 0x00];
        let ads = collect(&data);
        assert_eq!(ads.len(), 1);
    }

    #[test]
    fn length_byte_alone_at_end_is_overrun() {
        let data = [0x02, 0x01, 0x06, 0x02];
        assert_eq!(collect(&data).len(), 1);
    }

    #[test]
    fn iterator_is_fused_after_overrun() {
        let data = [0xFF, 0x01];
        let mut it = ad_structures(&data);
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
        assert_eq!(it.offset(), data.len());
    }

    #[test]
    fn every_length_byte_value_stays_in_bounds() {
        for len in 0..=u8::MAX {
            let mut data = [0xA5u8; 40];
            data[0] = len;
            for ad in ad_structures(&data) {
                assert!(ad.content.len() < data.len());
            }
        }
    }

    #[test]
    fn offset_advances_by_record_size() {
        let data = [0x00, 0x02, 0x01, 0x06, 0x03, 0x03, 0x6F, 0xFD];
        let mut it = ad_structures(&data);
        assert_eq!(it.offset(), 0);
        let first = it.next().unwrap();
        assert_eq!(first.ad_type, 0x01);
        assert_eq!(it.offset(), 4);
        let second = it.next().unwrap();
        assert_eq!(second.ad_type, 0x03);
        assert_eq!(it.offset(), 8);
        assert_eq!(it.next(), None);
    }
}
