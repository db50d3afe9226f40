// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub cancelled_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    // Last 1000 latencies, for percentiles
    pub latency_samples: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            cancelled_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > 1000 {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.latency_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            cancelled_count: self.cancelled_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// What got generated
#[derive(Debug, Clone, Default)]
pub struct GenerationMetrics {
    pub text_stories: Arc<AtomicU64>,
    pub audio_stories: Arc<AtomicU64>,
    pub illustrations: Arc<AtomicU64>,
    pub audio_frames: Arc<AtomicU64>,
}

impl GenerationMetrics {
    pub fn record_story(&self, audio_frames: Option<usize>) {
        match audio_frames {
            Some(frames) => {
                self.audio_stories.fetch_add(1, Ordering::Relaxed);
                self.audio_frames.fetch_add(frames as u64, Ordering::Relaxed);
            }
            None => {
                self.text_stories.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_illustration(&self) {
        self.illustrations.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppMetrics {
    pub story: EndpointMetrics,
    pub illustration: EndpointMetrics,
    pub generation: GenerationMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub generation: GenerationMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub request_count: u64,
    pub uptime_seconds: u64,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub story: EndpointStats,
    pub illustration: EndpointStats,
}

#[derive(Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub cancelled_count: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

#[derive(Serialize)]
pub struct GenerationMetricsResponse {
    pub text_stories: u64,
    pub audio_stories: u64,
    pub illustrations: u64,
    pub audio_seconds: f64,
}

impl GenerationMetrics {
    pub fn snapshot(&self, sample_rate: u32) -> GenerationMetricsResponse {
        let frames = self.audio_frames.load(Ordering::Relaxed);
        GenerationMetricsResponse {
            text_stories: self.text_stories.load(Ordering::Relaxed),
            audio_stories: self.audio_stories.load(Ordering::Relaxed),
            illustrations: self.illustrations.load(Ordering::Relaxed),
            audio_seconds: frames as f64 / f64::from(sample_rate.max(1)),
        }
    }
}
