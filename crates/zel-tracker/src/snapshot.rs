//! Point-in-time process resource readings.
//!
//! On Linux the figures come from `/proc/self/status` (all in KB). Elsewhere a
//! snapshot reads as all zeros, which keeps every delta at zero.

use std::ops::{Add, AddAssign, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub vm_size: u64,
    pub vm_rss: u64,
    pub vm_data: u64,
    pub vm_peak: u64,
    pub threads: u64,
    /// Soft `RLIMIT_NOFILE`, standing in for the open descriptor count.
    pub fds: u64,
}

/// Signed difference between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceDelta {
    pub vm_size: i64,
    pub vm_rss: i64,
    pub vm_data: i64,
    pub vm_peak: i64,
    pub threads: i64,
    pub fds: i64,
}

impl ResourceSnapshot {
    pub fn capture() -> Self {
        let mut snapshot = match std::fs::read_to_string("/proc/self/status") {
            Ok(status) => Self::parse_status(&status),
            Err(_) => Self::default(),
        };
        snapshot.fds = open_file_limit();
        snapshot
    }

    /// Pick the tracked fields out of a `/proc/<pid>/status` body. Lines that
    /// are missing or unparsable leave their field at zero.
    pub fn parse_status(status: &str) -> Self {
        let mut s = Self::default();
        for line in status.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let field = match key {
                "VmSize" => &mut s.vm_size,
                "VmRSS" => &mut s.vm_rss,
                "VmData" => &mut s.vm_data,
                "VmPeak" => &mut s.vm_peak,
                "Threads" => &mut s.threads,
                _ => continue,
            };
            if let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
                *field = value;
            }
        }
        s
    }

    /// Any of VmSize, VmRSS or VmData non-zero.
    pub fn has_memory(&self) -> bool {
        self.vm_size != 0 || self.vm_rss != 0 || self.vm_data != 0
    }

    /// `self - earlier`, keeping the sign.
    pub fn signed_delta(&self, earlier: &ResourceSnapshot) -> ResourceDelta {
        fn d(a: u64, b: u64) -> i64 {
            (a as i128 - b as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
        }
        ResourceDelta {
            vm_size: d(self.vm_size, earlier.vm_size),
            vm_rss: d(self.vm_rss, earlier.vm_rss),
            vm_data: d(self.vm_data, earlier.vm_data),
            vm_peak: d(self.vm_peak, earlier.vm_peak),
            threads: d(self.threads, earlier.threads),
            fds: d(self.fds, earlier.fds),
        }
    }
}

impl ResourceDelta {
    /// Negative components become zero.
    pub fn floored(&self) -> ResourceSnapshot {
        let f = |v: i64| v.max(0) as u64;
        ResourceSnapshot {
            vm_size: f(self.vm_size),
            vm_rss: f(self.vm_rss),
            vm_data: f(self.vm_data),
            vm_peak: f(self.vm_peak),
            threads: f(self.threads),
            fds: f(self.fds),
        }
    }

    /// Only the memory sizes, each floored at zero. Peak, thread and fd
    /// columns are not memory a handle can hold on to.
    pub fn memory_floored(&self) -> ResourceSnapshot {
        let f = |v: i64| v.max(0) as u64;
        ResourceSnapshot {
            vm_size: f(self.vm_size),
            vm_rss: f(self.vm_rss),
            vm_data: f(self.vm_data),
            ..ResourceSnapshot::default()
        }
    }
}

/// Field-wise saturating subtraction.
impl Sub for ResourceSnapshot {
    type Output = ResourceSnapshot;

    fn sub(self, rhs: ResourceSnapshot) -> ResourceSnapshot {
        ResourceSnapshot {
            vm_size: self.vm_size.saturating_sub(rhs.vm_size),
            vm_rss: self.vm_rss.saturating_sub(rhs.vm_rss),
            vm_data: self.vm_data.saturating_sub(rhs.vm_data),
            vm_peak: self.vm_peak.saturating_sub(rhs.vm_peak),
            threads: self.threads.saturating_sub(rhs.threads),
            fds: self.fds.saturating_sub(rhs.fds),
        }
    }
}

impl Add for ResourceSnapshot {
    type Output = ResourceSnapshot;

    fn add(self, rhs: ResourceSnapshot) -> ResourceSnapshot {
        ResourceSnapshot {
            vm_size: self.vm_size.saturating_add(rhs.vm_size),
            vm_rss: self.vm_rss.saturating_add(rhs.vm_rss),
            vm_data: self.vm_data.saturating_add(rhs.vm_data),
            vm_peak: self.vm_peak.saturating_add(rhs.vm_peak),
            threads: self.threads.saturating_add(rhs.threads),
            fds: self.fds.saturating_add(rhs.fds),
        }
    }
}

impl AddAssign for ResourceSnapshot {
    fn add_assign(&mut self, rhs: ResourceSnapshot) {
        *self = *self + rhs;
    }
}

#[cfg(unix)]
fn open_file_limit() -> u64 {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we own.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
    if rc == 0 {
        rlim.rlim_cur as u64
    } else {
        0
    }
}

#[cfg(not(unix))]
fn open_file_limit() -> u64 {
    0
}
