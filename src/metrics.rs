//! Prometheus metrics for locker stations
//!
//! Features:
//! - Store / retrieve outcomes per station and size class
//! - Free and occupied locker gauges

use crate::locker::SizeClass;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref STORES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("locker_store_total", "Store requests by outcome"),
        &["station", "size", "outcome"]
    ).unwrap();

    pub static ref RETRIEVES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("locker_retrieve_total", "Retrieve requests by outcome"),
        &["station", "outcome"]
    ).unwrap();

    pub static ref FREE_SLOTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("locker_free_slots", "Free lockers per size class"),
        &["station", "size"]
    ).unwrap();

    pub static ref OCCUPIED_SLOTS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("locker_occupied_slots", "Lockers holding a package"),
        &["station"]
    ).unwrap();
}

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    NoCapacity,
    Duplicate,
}

impl StoreOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            StoreOutcome::Stored => "stored",
            StoreOutcome::NoCapacity => "no_capacity",
            StoreOutcome::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveOutcome {
    Retrieved,
    Unknown,
}

impl RetrieveOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RetrieveOutcome::Retrieved => "retrieved",
            RetrieveOutcome::Unknown => "unknown",
        }
    }
}

/// Register all metrics with the global registry (safe to call repeatedly)
pub fn init_metrics() {
    INIT.call_once(|| {
        info!("Initializing Prometheus metrics");

        METRICS_REGISTRY.register(Box::new(STORES_TOTAL.clone())).ok();
        METRICS_REGISTRY.register(Box::new(RETRIEVES_TOTAL.clone())).ok();
        METRICS_REGISTRY.register(Box::new(FREE_SLOTS.clone())).ok();
        METRICS_REGISTRY.register(Box::new(OCCUPIED_SLOTS.clone())).ok();
    });
}

pub fn record_store(station: &str, size: SizeClass, outcome: StoreOutcome) {
    STORES_TOTAL
        .with_label_values(&[station, size.as_str(), outcome.as_str()])
        .inc();
}

pub fn record_retrieve(station: &str, outcome: RetrieveOutcome) {
    RETRIEVES_TOTAL
        .with_label_values(&[station, outcome.as_str()])
        .inc();
}

pub fn set_free_slots(station: &str, size: SizeClass, free: usize) {
    FREE_SLOTS
        .with_label_values(&[station, size.as_str()])
        .set(free as i64);
}

pub fn set_occupied_slots(station: &str, occupied: usize) {
    OCCUPIED_SLOTS
        .with_label_values(&[station])
        .set(occupied as i64);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
