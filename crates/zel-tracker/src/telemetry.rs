//! CSV telemetry: one row per tracked call.
//!
//! Rows are assembled into a single buffer and written with one `write_all`
//! followed by a flush, so a crash never leaves a torn line behind and a
//! concurrent reader sees whole rows only.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use zel_core::HandleCategory;

use crate::snapshot::{ResourceDelta, ResourceSnapshot};

/// Categories that get their own live-count column. Memory allocations are
/// reported by total bytes instead.
pub const COUNTED_CATEGORIES: usize = HandleCategory::COUNT - 1;

pub const HEADER: &str = "CallNumber,TimeMs,APICall,VmSize_KB,VmRSS_KB,VmData_KB,VmPeak_KB,Threads,\
Delta_VmSize_KB,Delta_VmRSS_KB,Delta_VmData_KB,\
Contexts,CommandQueues,Modules,Kernels,EventPools,CommandLists,\
Events,Fences,Images,Samplers,TotalMemory_Bytes";

const COLUMNS: usize = 11 + COUNTED_CATEGORIES + 1;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("cannot open telemetry file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("telemetry write failed: {0}")]
    Write(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// `trace.csv` becomes `trace_pid4242.csv`; `trace` becomes `trace_pid4242`.
pub fn pid_suffixed_path(path: &Path, pid: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_pid{}.{}", stem, pid, ext.to_string_lossy()),
        None => format!("{}_pid{}", stem, pid),
    };
    path.with_file_name(name)
}

/// Everything a row needs besides its number and timestamp.
#[derive(Debug, Clone, Copy)]
pub struct RowData<'a> {
    pub api_call: &'a str,
    pub current: &'a ResourceSnapshot,
    pub delta: &'a ResourceDelta,
    pub live_counts: &'a [u64; HandleCategory::COUNT],
    pub total_memory_bytes: u64,
}

/// Open telemetry file. Callers serialize access.
pub struct TelemetrySink {
    path: PathBuf,
    file: Option<File>,
    call_counter: u64,
    start: Instant,
}

impl TelemetrySink {
    /// Create (truncating) the file and write the header.
    pub fn create(path: impl Into<PathBuf>, start: Instant) -> Result<Self, TelemetryError> {
        let path = path.into();
        let mut file = File::create(&path).map_err(|source| TelemetryError::Open {
            path: path.clone(),
            source,
        })?;
        file.write_all(format!("{HEADER}\n").as_bytes())?;
        file.flush()?;
        Ok(Self {
            path,
            file: Some(file),
            call_counter: 0,
            start,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.call_counter
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn write_row(&mut self, row: RowData<'_>) -> Result<(), TelemetryError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let elapsed_ms = self.start.elapsed().as_millis();
        let c = row.current;
        let d = row.delta;

        let mut line = format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            self.call_counter,
            elapsed_ms,
            row.api_call,
            c.vm_size,
            c.vm_rss,
            c.vm_data,
            c.vm_peak,
            c.threads,
            d.vm_size,
            d.vm_rss,
            d.vm_data,
        );
        for count in &row.live_counts[..COUNTED_CATEGORIES] {
            line.push(',');
            line.push_str(&count.to_string());
        }
        line.push(',');
        line.push_str(&row.total_memory_bytes.to_string());
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.call_counter += 1;
        Ok(())
    }

    /// Flush and release the file. Later rows are dropped silently.
    pub fn close(&mut self) -> Result<(), TelemetryError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

/// One parsed telemetry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub call_number: u64,
    pub time_ms: u64,
    pub api_call: String,
    pub current: ResourceSnapshot,
    pub delta_vm_size: i64,
    pub delta_vm_rss: i64,
    pub delta_vm_data: i64,
    pub live_counts: [u64; COUNTED_CATEGORIES],
    pub total_memory_bytes: u64,
}

impl TelemetryRecord {
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self, TelemetryError> {
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != COLUMNS {
            return Err(TelemetryError::Parse {
                line: line_no,
                reason: format!("expected {} columns, found {}", COLUMNS, fields.len()),
            });
        }
        let num = |i: usize| -> Result<u64, TelemetryError> {
            fields[i].parse().map_err(|_| TelemetryError::Parse {
                line: line_no,
                reason: format!("column {} is not an unsigned number: {:?}", i, fields[i]),
            })
        };
        let signed = |i: usize| -> Result<i64, TelemetryError> {
            fields[i].parse().map_err(|_| TelemetryError::Parse {
                line: line_no,
                reason: format!("column {} is not a number: {:?}", i, fields[i]),
            })
        };

        let mut live_counts = [0u64; COUNTED_CATEGORIES];
        for (i, slot) in live_counts.iter_mut().enumerate() {
            *slot = num(11 + i)?;
        }
        Ok(Self {
            call_number: num(0)?,
            time_ms: num(1)?,
            api_call: fields[2].to_string(),
            current: ResourceSnapshot {
                vm_size: num(3)?,
                vm_rss: num(4)?,
                vm_data: num(5)?,
                vm_peak: num(6)?,
                threads: num(7)?,
                fds: 0,
            },
            delta_vm_size: signed(8)?,
            delta_vm_rss: signed(9)?,
            delta_vm_data: signed(10)?,
            live_counts,
            total_memory_bytes: num(COLUMNS - 1)?,
        })
    }
}

/// Read a telemetry file back, skipping the header and blank lines.
pub fn read_telemetry(path: &Path) -> Result<Vec<TelemetryRecord>, TelemetryError> {
    let file = File::open(path).map_err(|source| TelemetryError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if idx == 0 && line.starts_with("CallNumber") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        records.push(TelemetryRecord::parse_line(&line, idx + 1)?);
    }
    Ok(records)
}
