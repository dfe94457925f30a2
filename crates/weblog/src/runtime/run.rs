//! Run — validation pass, full pass with progress, and the summary.

use tracing::{error, info, warn};

use crate::pipeline::{self, FormatCheck, Pipeline};
use crate::runtime::progress::{ProgressReporter, DEFAULT_INTERVAL};
use crate::stats::MemorySink;

/// Entries kept per table in the printed summary
pub const SUMMARY_TOP: usize = 10;

/// Check the format on the first lines of a file, parse the whole log and
/// print the summary as JSON on stdout.
pub fn run(mut pipeline: Pipeline) -> Result<(), Box<dyn std::error::Error>> {
    // stdin cannot be rewound, so only files get a validation pass
    if pipeline.config().log_file.is_some() {
        let mut source = pipeline::open_source(pipeline.config())?;
        if let FormatCheck::LikelyInvalid(snap) = pipeline.check_format(source.as_mut())? {
            error!(
                "Nothing valid to process: {} of the first {} lines did not match the log format",
                snap.invalid, snap.processed
            );
            return Err("log format likely invalid, verify log and date formats".into());
        }
    } else {
        warn!("Reading from standard input; skipping the log format check");
    }

    let mut sink = MemorySink::new();
    let reporter = ProgressReporter::spawn(pipeline.counters(), DEFAULT_INTERVAL);
    let result = pipeline::parse_log(&mut pipeline, &mut sink, None);
    reporter.stop();
    let snap = result?;

    if snap.format_likely_invalid() {
        warn!("No valid lines were parsed");
    }
    info!(
        "Done: {} unique visitors, {} bytes served",
        sink.unique_visitors(),
        snap.total_bytes
    );

    let summary = sink.summary(snap, SUMMARY_TOP);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
