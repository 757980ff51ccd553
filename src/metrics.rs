//! Stage counters, recorded through the `metrics` facade when the `metrics`
//! feature is enabled and compiled out otherwise.

#[cfg(feature = "metrics")]
pub(crate) fn element_emitted(stage: &str) {
    ::metrics::counter!("stagewire_stage_elements_total", "stage" => stage.to_owned()).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn element_emitted(_stage: &str) {}

#[cfg(feature = "metrics")]
pub(crate) fn stage_failed(stage: &str) {
    ::metrics::counter!("stagewire_stage_failures_total", "stage" => stage.to_owned()).increment(1);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn stage_failed(_stage: &str) {}
