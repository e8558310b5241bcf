use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Registry, TextEncoder};
use std::sync::OnceLock;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static SUMMARIES_CREATED: OnceLock<IntCounterVec> = OnceLock::new();
static SUMMARY_FALLBACKS: OnceLock<IntCounterVec> = OnceLock::new();
static SUMMARY_DUPLICATES: OnceLock<IntCounterVec> = OnceLock::new();
static CONTEXT_BUILDS: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() {
    let created = SUMMARIES_CREATED.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("chat_summaries_created_total", "Summaries written per level"),
            &["level"],
        )
        .expect("valid metric definition")
    });

    let fallbacks = SUMMARY_FALLBACKS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!(
                "chat_summary_fallbacks_total",
                "Summaries written from the deterministic fallback"
            ),
            &["level"],
        )
        .expect("valid metric definition")
    });

    let duplicates = SUMMARY_DUPLICATES.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!(
                "chat_summary_duplicates_total",
                "Summary inserts rejected as already present"
            ),
            &["level"],
        )
        .expect("valid metric definition")
    });

    let context_builds = CONTEXT_BUILDS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("chat_context_builds_total", "Context builds that consulted the store"),
            &["outcome"],
        )
        .expect("valid metric definition")
    });

    REGISTRY.register(Box::new(created.clone())).ok();
    REGISTRY.register(Box::new(fallbacks.clone())).ok();
    REGISTRY.register(Box::new(duplicates.clone())).ok();
    REGISTRY.register(Box::new(context_builds.clone())).ok();
}

pub fn inc_summary_created(level: &str) {
    if let Some(counter) = SUMMARIES_CREATED.get() {
        counter.with_label_values(&[level]).inc();
    }
}

pub fn inc_summary_fallback(level: &str) {
    if let Some(counter) = SUMMARY_FALLBACKS.get() {
        counter.with_label_values(&[level]).inc();
    }
}

pub fn inc_summary_duplicate(level: &str) {
    if let Some(counter) = SUMMARY_DUPLICATES.get() {
        counter.with_label_values(&[level]).inc();
    }
}

pub fn inc_context_build(outcome: &str) {
    if let Some(counter) = CONTEXT_BUILDS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Prometheus text exposition of everything registered so far.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
