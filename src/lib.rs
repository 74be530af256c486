//! enscan library — Exposure Notification beacon detection.
//!
//! Decodes BLE advertising payloads and extracts the Rolling Proximity
//! Identifier (RPI) and Associated Encrypted Metadata (AEM) from Exposure
//! Notification beacons, formatting each observation as one NDJSON line.
//! This crate holds all parsing and output logic with no platform
//! dependencies, testable on any host with `cargo test`. The ESP-IDF firmware
//! in `firmware-std/` is a thin consumer that provides radio access and the
//! output sink.
//!
//! Modules:
//! - `ad` — bounds-checked AD structure decoder
//! - `exposure` — EN detection and [`process_scan_result`]
//! - `protocol` — record line and status report formats
//! - `config` — explicit scan parameters
//!
//! `no_std`, no allocator.

#![cfg_attr(not(test), no_std)]

pub mod ad;
pub mod config;
pub mod exposure;
pub mod protocol;

pub use exposure::{process_scan_result, BeaconObservation};
