//! enscan — ESP-IDF std firmware
//!
//! Thread-based sensor node using FreeRTOS threads and std::sync::mpsc
//! channels. NimBLE (via esp32-nimble) delivers every advertisement to the
//! scan callback, which runs the enscan core and hands formatted records to
//! the output thread. Records go to stdout as NDJSON; diagnostics go through
//! the ESP-IDF logger.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use enscan::config::{self, ScanConfig, SCAN_FOREVER_MS};
use enscan::protocol::{self, RecordLine, StatusReport, MAX_STATUS_LEN, VERSION};
use enscan::process_scan_result;

use esp32_nimble::{BLEDevice, BLEScan};
use esp_idf_svc::hal::task::block_on;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::esp_get_free_heap_size;

/// Capacity of the record channel between the scan callback and the output thread
const RECORD_QUEUE_LEN: usize = 32;

/// Interval between status log lines
const STATUS_PERIOD: Duration = Duration::from_secs(30);

// ── Shared state ─────────────────────────────────────────────────────

static SCANNING: AtomicBool = AtomicBool::new(false);
static ADVERTS: AtomicU32 = AtomicU32::new(0);
static OBSERVATIONS: AtomicU32 = AtomicU32::new(0);
static DROPPED: AtomicU32 = AtomicU32::new(0);

/// Boot time — captured once in main, used for uptime calculation.
static BOOT_INSTANT: OnceLock<Instant> = OnceLock::new();

fn uptime_secs() -> u32 {
    BOOT_INSTANT
        .get()
        .map(|boot| boot.elapsed().as_secs() as u32)
        .unwrap_or(0)
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();

    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    let _ = BOOT_INSTANT.set(Instant::now());

    log::info!("enscan v{} starting (std)", VERSION);

    // NVS must be up before the BLE controller; erases and retries on a
    // full or version-mismatched partition.
    let _nvs = EspDefaultNvsPartition::take()?;

    let scan_config = load_scan_config();
    log::info!(
        "Scan config: {} scan, interval {:.2} ms, window {:.2} ms, duplicate filter {}",
        if scan_config.active { "active" } else { "passive" },
        scan_config.interval_ms(),
        scan_config.window_ms(),
        if scan_config.filter_duplicates { "on" } else { "off" },
    );

    // ── Channels ─────────────────────────────────────────────────────

    let (record_tx, record_rx) = mpsc::sync_channel::<RecordLine>(RECORD_QUEUE_LEN);

    // ── Output thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("output".into())
        .stack_size(4096)
        .spawn(move || {
            output_thread(record_rx);
        })?;
    log::info!("Output thread spawned");

    // ── Status thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("status".into())
        .stack_size(4096)
        .spawn(status_thread)?;
    log::info!("Status thread spawned");

    // ── BLE scan — runs on main thread ───────────────────────────────

    scan_loop(scan_config, record_tx)
}

/// Scan parameters, optionally overridden at build time through the
/// `ENSCAN_SCAN_CONFIG` environment variable (JSON object).
fn load_scan_config() -> ScanConfig {
    let Some(json) = option_env!("ENSCAN_SCAN_CONFIG") else {
        return ScanConfig::new();
    };
    match config::parse_scan_config(json.as_bytes()) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring ENSCAN_SCAN_CONFIG ({}), using defaults", e);
            ScanConfig::new()
        }
    }
}

// ── BLE scan loop ────────────────────────────────────────────────────

fn scan_loop(scan_config: ScanConfig, record_tx: SyncSender<RecordLine>) -> ! {
    let ble_device = BLEDevice::take();
    let mut scan = BLEScan::new();
    // esp32-nimble takes whole milliseconds and truncates back to 0.625 ms units
    scan.active_scan(scan_config.active)
        .filter_duplicates(scan_config.filter_duplicates)
        .interval(scan_config.interval_whole_ms())
        .window(scan_config.window_whole_ms());

    loop {
        SCANNING.store(true, Ordering::Relaxed);
        log::info!("Starting BLE scan (unbounded)");

        // The callback runs in the NimBLE host task: never block here.
        let result = block_on(scan.start(ble_device, SCAN_FOREVER_MS, |device, data| {
            ADVERTS.fetch_add(1, Ordering::Relaxed);
            let addr = device.addr().as_be_bytes();
            if let Some(obs) = process_scan_result(&addr, device.rssi(), data.payload()) {
                match protocol::format_record(&obs) {
                    Some(line) => match record_tx.try_send(line) {
                        Ok(()) => {
                            OBSERVATIONS.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            DROPPED.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    None => log::warn!("Record for {:02x?} did not fit line buffer", addr),
                }
            }
            None::<()> // Continue scanning
        }));

        SCANNING.store(false, Ordering::Relaxed);
        match result {
            // Only unbounded scans are supported; a completed scan is restarted.
            Ok(_) => log::warn!("BLE scan ended unexpectedly, restarting"),
            Err(e) => {
                log::error!("BLE scan failed: {:?}", e);
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

// ── Output thread ────────────────────────────────────────────────────

fn output_thread(record_rx: mpsc::Receiver<RecordLine>) {
    log::info!("Output thread started");

    while let Ok(line) = record_rx.recv() {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(line.as_bytes()).and_then(|()| out.flush()) {
            log::warn!("stdout write failed: {}", e);
        }
    }

    log::warn!("Record channel closed, output thread exiting");
}

// ── Status thread ────────────────────────────────────────────────────

fn status_thread() {
    loop {
        thread::sleep(STATUS_PERIOD);

        let heap_free = unsafe { esp_get_free_heap_size() };

        let report = StatusReport {
            scanning: SCANNING.load(Ordering::Relaxed),
            uptime: uptime_secs(),
            heap_free,
            adverts: ADVERTS.load(Ordering::Relaxed),
            observations: OBSERVATIONS.load(Ordering::Relaxed),
            dropped: DROPPED.load(Ordering::Relaxed),
            version: VERSION,
        };

        let mut buf = [0u8; MAX_STATUS_LEN];
        if let Some(len) = protocol::serialize_status(&report, &mut buf) {
            if let Ok(s) = std::str::from_utf8(&buf[..len]) {
                log::info!("{}", s.trim_end());
            }
        }
    }
}
