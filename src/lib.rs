//! Workspace umbrella crate for filekit.
//!
//! Re-exports the local transcoding engine and adds multi-file jobs on top of
//! it. A job converts its files strictly one after another; one bad file is
//! recorded and the job moves on.
//!
//! The HTTP gateway lives in the `filekit-server` crate and has no dependency
//! on anything here.

pub use transcode::{
    ConfigError, ConversionResult, Dimensions, ImageFormat, SizeReport, SourceImage,
    TranscodeConfig, TranscodeError, TranscodeOptions, TranscodeResult, Transcoder,
    derive_filename, format_bytes, source_format,
};

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics observer for job conversions.
pub trait JobMetrics: Send + Sync {
    fn record_conversion(&self, latency: Duration, result: Result<(), TranscodeError>);
}

/// Install or clear the global job metrics recorder.
pub fn set_job_metrics(recorder: Option<Arc<dyn JobMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn JobMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn JobMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn JobMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn JobMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record(self, result: &TranscodeResult<ConversionResult>) {
        let outcome = match result {
            Ok(_) => Ok(()),
            Err(err) => Err(err.clone()),
        };
        self.recorder.record_conversion(self.start.elapsed(), outcome);
    }
}

/// What one file in a job turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Name of the source file.
    pub name: String,
    pub result: TranscodeResult<ConversionResult>,
}

/// Per-file outcomes of a job, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub outcomes: Vec<FileOutcome>,
}

impl JobReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ConversionResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &TranscodeError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Combined sizes over the successful conversions only.
    pub fn total_size(&self) -> SizeReport {
        let (original, converted) = self
            .succeeded()
            .fold((0, 0), |(o, c), r| (o + r.original_size, c + r.converted_size));
        SizeReport::new(original, converted)
    }
}

/// Convert every file with the same options, one at a time.
pub async fn convert_all(
    transcoder: &Transcoder,
    files: Vec<SourceImage>,
    options: TranscodeOptions,
) -> JobReport {
    let mut report = JobReport::default();
    for source in files {
        let name = source.name.clone();
        let span = MetricsSpan::start();
        let result = transcoder.convert(source, options).await;
        record(&mut report, name, result, span);
    }
    summarize(&report);
    report
}

/// Blocking twin of [`convert_all`].
pub fn convert_all_blocking(
    transcoder: &Transcoder,
    files: &[SourceImage],
    options: &TranscodeOptions,
) -> JobReport {
    let mut report = JobReport::default();
    for source in files {
        let span = MetricsSpan::start();
        let result = transcoder.convert_blocking(source, options);
        record(&mut report, source.name.clone(), result, span);
    }
    summarize(&report);
    report
}

fn record(
    report: &mut JobReport,
    name: String,
    result: TranscodeResult<ConversionResult>,
    span: Option<MetricsSpan>,
) {
    if let Some(span) = span {
        span.record(&result);
    }
    if let Err(err) = &result {
        warn!(file = %name, error = %err, "conversion failed, continuing with next file");
    }
    report.outcomes.push(FileOutcome { name, result });
}

fn summarize(report: &JobReport) {
    info!(
        files = report.outcomes.len(),
        failed = report.failed().count(),
        total = %report.total_size(),
        "job finished"
    );
}
