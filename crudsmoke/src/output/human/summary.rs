use std::fmt::Write as _;
use std::path::Path;

use crudsmoke_core::{OperationSummary, RunSummary};

use super::format::{format_duration_ns, format_percent};

pub(crate) fn render(summary: &RunSummary, results: &Path) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    if summary.operations.is_empty() {
        out.push_str("  no operations recorded\n");
    }
    for (op, s) in &summary.operations {
        writeln!(&mut out, "  {op}: {}", render_operation(s)).ok();
        if s.failures > 0 {
            writeln!(&mut out, "    status codes: {}", render_status_codes(s)).ok();
        }
    }
    out.push('\n');

    writeln!(
        &mut out,
        "totals: {} operations, {} success, {} failures (success rate {}) in {}ms",
        summary.total_operations,
        summary.total_success,
        summary.total_failures,
        format_percent(summary.success_rate),
        summary.elapsed_time_ms
    )
    .ok();

    if summary.deadline_exceeded {
        writeln!(
            &mut out,
            "deadline exceeded: {} units of work abandoned",
            summary.abandoned_operations
        )
        .ok();
    }

    if summary.is_success() {
        out.push_str("SUCCESS: All operations completed successfully\n");
    } else {
        writeln!(
            &mut out,
            "FAILURE: {} operations failed",
            summary.total_failures
        )
        .ok();
    }

    writeln!(&mut out, "results: {}", results.display()).ok();
    out
}

fn render_operation(s: &OperationSummary) -> String {
    format!(
        "{} total, {} success, {} failures, avg={} min={} max={} p95={}",
        s.count,
        s.success,
        s.failures,
        format_duration_ns(s.avg_duration_ns),
        format_duration_ns(s.min_duration_ns),
        format_duration_ns(s.max_duration_ns),
        format_duration_ns(s.p95_duration_ns)
    )
}

fn render_status_codes(s: &OperationSummary) -> String {
    s.status_codes
        .iter()
        .map(|(code, n)| format!("{code}={n}"))
        .collect::<Vec<_>>()
        .join(" ")
}
