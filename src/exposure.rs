//! Exposure Notification beacon detection and field extraction.
//!
//! An EN beacon advertises the 16-bit service UUID 0xFD6F twice: once in a
//! Complete List of 16-bit Service UUIDs (AD type 0x03) and once as the prefix
//! of a Service Data structure (AD type 0x16) that carries the payload:
//!
//! ```text
//! [0x6F 0xFD] [RPI: 16 bytes] [AEM: 4 bytes]
//! ```
//!
//! Both structures must be present, in any order, with exactly these lengths.

use crate::ad::{self, AdStructure, COMPLETE_LIST_16BIT_SERVICE_UUIDS, SERVICE_DATA_16BIT_UUID};

/// Exposure Notification service UUID
pub const EN_SERVICE_UUID: u16 = 0xFD6F;

/// EN service UUID as it appears on the wire (little-endian)
pub const EN_SIGNATURE: [u8; 2] = EN_SERVICE_UUID.to_le_bytes();

pub const RPI_LEN: usize = 16;
pub const AEM_LEN: usize = 4;

/// Content length of an EN service data structure: UUID + RPI + AEM
pub const EN_SERVICE_DATA_LEN: usize = EN_SIGNATURE.len() + RPI_LEN + AEM_LEN;

/// Rolling Proximity Identifier
pub type Rpi = [u8; RPI_LEN];

/// Associated Encrypted Metadata (opaque)
pub type Aem = [u8; AEM_LEN];

/// An Exposure Notification beacon extracted from one advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconObservation {
    pub mac: [u8; 6],
    pub rssi: i8,
    pub rpi: Rpi,
    pub aem: Aem,
}

/// State folded over the AD structures of a single advertisement.
#[derive(Debug, Default, Clone, Copy)]
struct EnAccumulator {
    /// Service UUID list advertised 0xFD6F
    uuid_seen: bool,
    rpi: Option<Rpi>,
    aem: Option<Aem>,
}

impl EnAccumulator {
    fn observe(&mut self, ad: &AdStructure<'_>) {
        match ad.ad_type {
            COMPLETE_LIST_16BIT_SERVICE_UUIDS => {
                if ad.content == EN_SIGNATURE {
                    self.uuid_seen = true;
                }
            }
            SERVICE_DATA_16BIT_UUID => {
                if ad.content.len() != EN_SERVICE_DATA_LEN || ad.content[..2] != EN_SIGNATURE {
                    return;
                }
                let payload = &ad.content[2..];
                // Later structures overwrite earlier ones
                self.rpi = payload[..RPI_LEN].try_into().ok();
                self.aem = payload[RPI_LEN..].try_into().ok();
            }
            _ => {}
        }
    }

    fn finish(self, mac: &[u8; 6], rssi: i8) -> Option<BeaconObservation> {
        match (self.uuid_seen, self.rpi, self.aem) {
            (true, Some(rpi), Some(aem)) => Some(BeaconObservation {
                mac: *mac,
                rssi,
                rpi,
                aem,
            }),
            (false, Some(_), Some(_)) => {
                log::debug!("EN service data without EN service UUID, ignoring");
                None
            }
            (true, _, _) => {
                log::debug!("EN service UUID without EN service data, ignoring");
                None
            }
            _ => None,
        }
    }
}

/// Process one scan result: decode `adv_data` and, if it is an Exposure
/// Notification beacon, return the extracted observation.
///
/// `addr` is the 6-byte advertiser address as delivered by the scan subsystem.
/// Pure and non-blocking; safe to call from the BLE host's scan callback.
pub fn process_scan_result(addr: &[u8; 6], rssi: i8, adv_data: &[u8]) -> Option<BeaconObservation> {
    if adv_data.is_empty() {
        return None;
    }

    let acc = ad::ad_structures(adv_data).fold(EnAccumulator::default(), |mut acc, structure| {
        acc.observe(&structure);
        acc
    });
    acc.finish(addr, rssi)
}
