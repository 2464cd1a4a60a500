//! Integration module connecting detection feeds, the tracking core and the
//! report sink.
//!
//! Detection itself is external: anything that can hand over boxes for one
//! camera implements [`DetectionSource`]. [`CaptureHub`] polls those sources
//! on their own threads and [`TrafficPipeline`] runs the per-tick loop.

mod builder;
mod capture;
mod detector;
mod filter;
mod pipeline;
mod replay;
mod sink;

pub use builder::DetectionBuilder;
pub use capture::CaptureHub;
pub use detector::DetectionSource;
pub use filter::DetectionFilter;
pub use pipeline::{StatsSnapshot, TrafficPipeline};
pub use replay::ReplaySource;
pub use sink::{CsvReportSink, MemorySink, REPORT_HEADER, ReportSink};
