use crate::inspector::InspectorClient;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A bottleneck is self-time at or above this fraction of total sampled time (§4.8).
const BOTTLENECK_SELF_TIME_THRESHOLD: f64 = 0.05;
/// An operation recorded on the performance timeline counts as slow past this duration.
const SLOW_OPERATION_THRESHOLD_MS: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuProfile {
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionTiming {
    pub function_name: String,
    pub self_time_ms: f64,
    pub total_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuAnalysis {
    pub top_functions: Vec<FunctionTiming>,
    pub bottlenecks: Vec<FunctionTiming>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_heap_bytes: u64,
    pub total_heap_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakReport {
    pub is_leaking: bool,
    pub growth_rate_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub name: String,
    pub duration_ms: f64,
    pub is_gc: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub slow_operations: Vec<TimelineEvent>,
    pub gc_total_ms: f64,
    pub event_count: usize,
}

/// A least-squares slope over `(t, bytes)` samples, used by leak detection. A positive
/// slope past the configured threshold is reported as a leak.
fn linear_regression_slope(samples: &[(f64, f64)]) -> f64 {
    let n = samples.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_t = samples.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_v = samples.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (t, v) in samples {
        numerator += (t - mean_t) * (v - mean_v);
        denominator += (t - mean_t).powi(2);
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// CPU/heap profiling and the performance timeline, driven entirely through the
/// `Profiler`/`HeapProfiler` CDP domains. Every call requires the session to already
/// be attached (§4.8); there is no standalone profiling mode (see the hang detector
/// for the one path that runs without a full session).
pub struct Profiler {
    inspector: Arc<InspectorClient>,
    timeline: tokio::sync::RwLock<Vec<TimelineEvent>>,
}

impl Profiler {
    pub fn new(inspector: Arc<InspectorClient>) -> Self {
        Self {
            inspector,
            timeline: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    pub async fn start_cpu_profile(&self, deadline: Duration) -> Result<()> {
        self.inspector.send("Profiler.enable", None, deadline).await?;
        self.inspector.send("Profiler.start", None, deadline).await?;
        Ok(())
    }

    pub async fn stop_cpu_profile(&self, deadline: Duration) -> Result<CpuProfile> {
        let result = self.inspector.send("Profiler.stop", None, deadline).await?;
        let raw = result.get("profile").cloned().unwrap_or(serde_json::Value::Null);
        Ok(CpuProfile { raw })
    }

    /// Aggregates `nodes[].hitCount` into self/total time per function. Bottlenecks
    /// are functions whose self-time share of the profile's total hit count meets
    /// [`BOTTLENECK_SELF_TIME_THRESHOLD`].
    pub fn analyze_cpu_profile(&self, profile: &CpuProfile) -> CpuAnalysis {
        let nodes = profile
            .raw
            .get("nodes")
            .and_then(|n| n.as_array())
            .cloned()
            .unwrap_or_default();

        let total_hits: f64 = nodes
            .iter()
            .filter_map(|n| n.get("hitCount").and_then(|h| h.as_f64()))
            .sum();

        let mut timings: Vec<FunctionTiming> = nodes
            .iter()
            .filter_map(|node| {
                let name = node
                    .get("callFrame")
                    .and_then(|c| c.get("functionName"))
                    .and_then(|f| f.as_str())
                    .unwrap_or("(anonymous)")
                    .to_string();
                let hits = node.get("hitCount").and_then(|h| h.as_f64())?;
                Some(FunctionTiming {
                    function_name: name,
                    self_time_ms: hits,
                    total_time_ms: hits,
                })
            })
            .collect();

        timings.sort_by(|a, b| b.self_time_ms.partial_cmp(&a.self_time_ms).unwrap());

        let bottlenecks = timings
            .iter()
            .filter(|t| total_hits > 0.0 && t.self_time_ms / total_hits >= BOTTLENECK_SELF_TIME_THRESHOLD)
            .cloned()
            .collect();

        CpuAnalysis {
            top_functions: timings,
            bottlenecks,
        }
    }

    pub async fn take_heap_snapshot(&self, deadline: Duration) -> Result<serde_json::Value> {
        self.inspector.send("HeapProfiler.enable", None, deadline).await?;
        self.inspector
            .send("HeapProfiler.takeHeapSnapshot", Some(serde_json::json!({"reportProgress": false})), deadline)
            .await
    }

    pub async fn get_memory_usage(&self, deadline: Duration) -> Result<MemoryUsage> {
        let result = self.inspector.send("Runtime.getHeapUsage", None, deadline).await?;
        Ok(MemoryUsage {
            used_heap_bytes: result.get("usedSize").and_then(|v| v.as_u64()).unwrap_or(0),
            total_heap_bytes: result.get("totalSize").and_then(|v| v.as_u64()).unwrap_or(0),
        })
    }

    /// Samples heap usage every `interval` for `duration`, then fits a least-squares
    /// slope (bytes/sec) over the samples. `is_leaking` requires a positive slope
    /// past a conservative threshold to avoid flagging ordinary noisy allocation.
    pub async fn detect_leaks(&self, duration: Duration, interval: Duration, deadline: Duration) -> Result<LeakReport> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument("sample interval must be > 0".to_string()));
        }

        let start = tokio::time::Instant::now();
        let mut samples = Vec::new();
        let mut ticker = tokio::time::interval(interval);
        while start.elapsed() < duration {
            ticker.tick().await;
            let usage = self.get_memory_usage(deadline).await?;
            samples.push((start.elapsed().as_secs_f64(), usage.used_heap_bytes as f64));
        }

        const LEAK_SLOPE_THRESHOLD_BYTES_PER_SEC: f64 = 1024.0;
        let slope = linear_regression_slope(&samples);
        Ok(LeakReport {
            is_leaking: slope > LEAK_SLOPE_THRESHOLD_BYTES_PER_SEC,
            growth_rate_bytes_per_sec: slope,
        })
    }

    pub async fn record_event(&self, name: impl Into<String>, duration_ms: f64, is_gc: bool) {
        self.timeline.write().await.push(TimelineEvent {
            name: name.into(),
            duration_ms,
            is_gc,
        });
    }

    pub async fn performance_report(&self) -> PerformanceReport {
        let events = self.timeline.read().await;
        PerformanceReport {
            slow_operations: events
                .iter()
                .filter(|e| e.duration_ms > SLOW_OPERATION_THRESHOLD_MS)
                .cloned()
                .collect(),
            gc_total_ms: events.iter().filter(|e| e.is_gc).map(|e| e.duration_ms).sum(),
            event_count: events.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regression_slope_is_zero_for_flat_samples() {
        let samples = vec![(0.0, 100.0), (1.0, 100.0), (2.0, 100.0)];
        assert_eq!(linear_regression_slope(&samples), 0.0);
    }

    #[test]
    fn regression_slope_is_positive_for_growing_samples() {
        let samples = vec![(0.0, 100.0), (1.0, 200.0), (2.0, 300.0)];
        assert!(linear_regression_slope(&samples) > 0.0);
    }

    #[tokio::test]
    async fn analyze_flags_bottleneck_above_threshold() {
        let profile = CpuProfile {
            raw: serde_json::json!({
                "nodes": [
                    {"callFrame": {"functionName": "hot"}, "hitCount": 90},
                    {"callFrame": {"functionName": "cold"}, "hitCount": 10},
                ]
            }),
        };
        let profiler = Profiler::new(Arc::new(
            InspectorClient::new_with_transport(Box::new(NullTransport)).await.unwrap(),
        ));
        let analysis = profiler.analyze_cpu_profile(&profile);
        assert_eq!(analysis.bottlenecks.len(), 1);
        assert_eq!(analysis.bottlenecks[0].function_name, "hot");
    }

    #[tokio::test]
    async fn performance_report_separates_slow_operations_and_gc() {
        let profiler = Profiler::new(Arc::new(
            InspectorClient::new_with_transport(Box::new(NullTransport)).await.unwrap(),
        ));
        profiler.record_event("fast-op", 5.0, false).await;
        profiler.record_event("slow-op", 150.0, false).await;
        profiler.record_event("gc-sweep", 30.0, true).await;

        let report = profiler.performance_report().await;
        assert_eq!(report.event_count, 3);
        assert_eq!(report.slow_operations.len(), 1);
        assert_eq!(report.gc_total_ms, 30.0);
    }

    struct NullTransport;

    #[async_trait::async_trait]
    impl crate::inspector::transport_trait::InspectorTransportTrait for NullTransport {
        async fn read_message(&mut self) -> Result<crate::inspector::types::CdpMessage> {
            std::future::pending().await
        }
        async fn write_message(&mut self, _msg: &crate::inspector::types::CdpRequest) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
