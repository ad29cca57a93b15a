use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use easyprof_runtime::{Results, Seconds, SortBy};

use crate::error::Error;

/// A profiling run as written to disk by `easyprof demo --json`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Run {
    pub timestamp_ms: u128,
    pub total_calls: u64,
    /// Seconds spent in the profiler's own bookkeeping.
    pub overhead_s: f64,
    pub functions: Vec<FnEntry>,
}

/// Timing data for one call site within a run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FnEntry {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub calls: u64,
    pub internal_s: f64,
    pub cumulative_s: f64,
}

impl Run {
    /// Capture a collector snapshot, keeping its current order.
    pub fn from_results(results: &Results) -> Self {
        Self {
            timestamp_ms: timestamp_ms(),
            total_calls: results.total_calls(),
            overhead_s: results.overhead(),
            functions: results
                .iter()
                .map(|r| FnEntry {
                    function: r.function.to_owned(),
                    file: r.file.to_owned(),
                    line: r.line,
                    calls: r.calls,
                    internal_s: r.internal,
                    cumulative_s: r.cumulative,
                })
                .collect(),
        }
    }

    /// Reorder entries by one of the collector's built-in keys.
    pub fn sort(&mut self, by: SortBy) {
        self.functions.sort_by(|a, b| {
            by.compare_keys(
                (a.calls, a.internal_s, a.cumulative_s),
                (b.calls, b.internal_s, b.cumulative_s),
            )
        });
    }
}

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Write a run as pretty-printed JSON, creating parent directories.
pub fn save_run(run: &Run, path: &Path) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(run)?;
    let write_err = |source| Error::RunWriteError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, json).map_err(write_err)
}

/// Read a run from a JSON file on disk.
pub fn load_run(path: &Path) -> Result<Run, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::RunReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| Error::InvalidRunData {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Layout knobs for `format_table`.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Width of each numeric column.
    pub column_width: usize,
    /// Digits after the decimal point for times.
    pub precision: usize,
    /// Include per-call mean columns.
    pub show_per_call: bool,
    /// Absolute source paths under this directory are shown relative to it.
    pub relative_to: Option<PathBuf>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            column_width: 12,
            precision: 3,
            show_per_call: true,
            relative_to: std::env::current_dir().ok(),
        }
    }
}

/// Abbreviate a call count: 12345 -> "12K", 12345678 -> "12M".
/// Counts are truncated, never rounded up.
pub fn format_calls(n: u64) -> String {
    if n >= 10_000_000_000 {
        format!("{}B", n / 1_000_000_000)
    } else if n >= 10_000_000 {
        format!("{}M", n / 1_000_000)
    } else if n >= 10_000 {
        format!("{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

/// Format seconds with the largest unit that keeps the value at or above 1.
pub fn format_seconds(s: Seconds, precision: usize) -> String {
    if s < 0.000_001 {
        format!("{:.*}ns", precision, s * 1_000_000_000.0)
    } else if s < 0.001 {
        format!("{:.*}us", precision, s * 1_000_000.0)
    } else if s < 1.0 {
        format!("{:.*}ms", precision, s * 1_000.0)
    } else {
        format!("{:.*}s", precision, s)
    }
}

/// One table row, borrowed from either a live snapshot or a loaded run.
struct Row<'a> {
    function: &'a str,
    file: &'a str,
    line: u32,
    calls: u64,
    internal: Seconds,
    cumulative: Seconds,
}

/// Render a collector snapshot as a text table, in its current order.
pub fn format_table(results: &Results, opts: &FormatOptions) -> String {
    let rows = results.iter().map(|r| Row {
        function: r.function,
        file: r.file,
        line: r.line,
        calls: r.calls,
        internal: r.internal,
        cumulative: r.cumulative,
    });
    render(rows, results.len(), results.total_calls(), results.overhead(), opts)
}

/// Render a run loaded from disk, in its current order.
pub fn format_run(run: &Run, opts: &FormatOptions) -> String {
    let rows = run.functions.iter().map(|f| Row {
        function: &f.function,
        file: &f.file,
        line: f.line,
        calls: f.calls,
        internal: f.internal_s,
        cumulative: f.cumulative_s,
    });
    render(rows, run.functions.len(), run.total_calls, run.overhead_s, opts)
}

fn render<'a>(
    rows: impl Iterator<Item = Row<'a>>,
    count: usize,
    total_calls: u64,
    overhead: Seconds,
    opts: &FormatOptions,
) -> String {
    let w = opts.column_width;
    let mut out = format!("Profiler Results ({count} fns):\n");

    let mut header = vec!["calls", "internal"];
    if opts.show_per_call {
        header.push("int/call");
    }
    header.push("cumulative");
    if opts.show_per_call {
        header.push("cum/call");
    }
    for col in header {
        out.push_str(&format!("{col:<w$} "));
    }
    out.push_str("funcsig:line:file\n");

    for row in rows {
        let mut cells = vec![
            format_calls(row.calls),
            format_seconds(row.internal, opts.precision),
        ];
        if opts.show_per_call {
            cells.push(per_call(row.internal, row.calls, opts.precision));
        }
        cells.push(format_seconds(row.cumulative, opts.precision));
        if opts.show_per_call {
            cells.push(per_call(row.cumulative, row.calls, opts.precision));
        }
        for cell in cells {
            out.push_str(&format!("{cell:<w$} "));
        }
        out.push_str(&format!(
            "{}:{}:{}\n",
            row.function,
            row.line,
            display_path(row.file, opts.relative_to.as_deref())
        ));
    }

    out.push_str(&format!(
        "total calls: {}, profiler overhead: {}\n",
        format_calls(total_calls),
        format_seconds(overhead, opts.precision)
    ));
    out
}

fn per_call(total: Seconds, calls: u64, precision: usize) -> String {
    if calls == 0 {
        return "-".to_owned();
    }
    format_seconds(total / calls as f64, precision)
}

fn display_path(file: &str, base: Option<&Path>) -> String {
    let path = Path::new(file);
    match base {
        Some(base) if path.is_absolute() => path
            .strip_prefix(base)
            .unwrap_or(path)
            .display()
            .to_string(),
        _ => file.to_owned(),
    }
}
