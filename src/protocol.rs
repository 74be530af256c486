/// Output formats for the sensor: the per-beacon NDJSON record and the
/// periodic status report.
///
/// Both are newline-delimited JSON (NDJSON) built in fixed-capacity
/// `heapless` buffers for no_std/no-alloc operation.
use core::fmt::{self, Write};

use heapless::String;
use serde::Serialize;

use crate::exposure::BeaconObservation;

/// Maximum length for MAC address strings ("aa:bb:cc:dd:ee:ff")
pub type MacString = String<18>;

/// Longest record line is 101 bytes (RSSI -128, newline included)
pub const MAX_RECORD_LEN: usize = 128;

/// Buffer type for one formatted observation record, newline included
pub type RecordLine = String<MAX_RECORD_LEN>;

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized status message
pub const MAX_STATUS_LEN: usize = 256;

/// Format a 6-byte MAC address into "aa:bb:cc:dd:ee:ff"
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    let _ = write!(
        buf,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

fn write_hex<W: Write>(w: &mut W, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(w, "{:02x}", b)?;
    }
    Ok(())
}

/// Write the record for one observation, without the trailing newline.
///
/// The field separators are `", "`; downstream consumers match the line
/// byte-for-byte, so this is written directly instead of through serde.
pub fn write_record<W: Write>(obs: &BeaconObservation, w: &mut W) -> fmt::Result {
    let mut mac = MacString::new();
    format_mac(&obs.mac, &mut mac);
    write!(w, "{{\"mac\":\"{}\", \"rssi\":{}, \"rpi\":\"", mac, obs.rssi)?;
    write_hex(w, &obs.rpi)?;
    w.write_str("\", \"aem\":\"")?;
    write_hex(w, &obs.aem)?;
    w.write_str("\"}")
}

/// Format an observation as one newline-terminated NDJSON line.
/// Returns None if the line did not fit the buffer.
pub fn format_record(obs: &BeaconObservation) -> Option<RecordLine> {
    let mut line = RecordLine::new();
    write_record(obs, &mut line).ok()?;
    line.push('\n').ok()?;
    Some(line)
}

impl fmt::Display for BeaconObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(self, f)
    }
}

/// Periodic health snapshot, logged by the firmware.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport<'a> {
    /// Whether a scan session is currently running
    pub scanning: bool,
    /// Uptime in seconds
    pub uptime: u32,
    /// Free heap in bytes
    pub heap_free: u32,
    /// Advertisements processed since boot
    pub adverts: u32,
    /// EN observations emitted since boot
    pub observations: u32,
    /// Record lines dropped because the output channel was full
    pub dropped: u32,
    pub version: &'a str,
}

/// Serialize a StatusReport as one NDJSON line into the output buffer.
/// Returns the number of bytes written, newline included, or None if the
/// line did not fit.
pub fn serialize_status(report: &StatusReport, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(report, buf).ok()?;
    *buf.get_mut(len)? = b'\n';
    Some(len + 1)
}
