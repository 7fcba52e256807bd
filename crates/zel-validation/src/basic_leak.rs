use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};
use zel_core::{CallFrame, CallOutput, EntryPoint, HandleCategory, HookSet, Layer, ZeResult};

pub const LAYER_NAME: &str = "basic_leak_checker";

/// Create/destroy call balance for one handle category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    pub category: HandleCategory,
    pub creates: Vec<(EntryPoint, u64)>,
    pub destroys: Vec<(EntryPoint, u64)>,
}

impl BalanceRow {
    /// Creates minus destroys; positive means handles were never released.
    pub fn balance(&self) -> i64 {
        let c: u64 = self.creates.iter().map(|(_, n)| n).sum();
        let d: u64 = self.destroys.iter().map(|(_, n)| n).sum();
        c as i64 - d as i64
    }
}

/// Counts successful creates and destroys without taking any lock.
pub struct BasicLeakChecker {
    counts: Vec<AtomicU64>,
}

impl Default for BasicLeakChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicLeakChecker {
    pub fn new() -> Self {
        Self {
            counts: (0..EntryPoint::COUNT).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn count(&self, entry_point: EntryPoint) -> u64 {
        self.counts[entry_point.index()].load(Ordering::Relaxed)
    }

    pub fn balance_table(&self) -> Vec<BalanceRow> {
        HandleCategory::ALL
            .iter()
            .map(|&category| {
                let mut row = BalanceRow {
                    category,
                    creates: Vec::new(),
                    destroys: Vec::new(),
                };
                for &ep in EntryPoint::ALL {
                    if ep.category() != Some(category) {
                        continue;
                    }
                    let entry = (ep, self.count(ep));
                    if ep.is_create() {
                        row.creates.push(entry);
                    } else {
                        row.destroys.push(entry);
                    }
                }
                row
            })
            .collect()
    }

    /// The balance table as printable lines.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for row in self.balance_table() {
            let mut line = String::new();
            for (i, (ep, n)) in row.creates.iter().enumerate() {
                if i > 0 {
                    line.push_str(" |");
                    lines.push(std::mem::take(&mut line));
                }
                let _ = write!(line, "{:>40} = {:<5}", ep.name(), n);
            }
            for (ep, n) in &row.destroys {
                let _ = write!(line, " \\---> {:>24} = {:<5}", ep.name(), n);
            }
            let balance = row.balance();
            if balance != 0 {
                let _ = write!(line, " ---> LEAK = {}", balance);
            }
            lines.push(line);
        }
        lines
    }
}

impl Layer for BasicLeakChecker {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn hooks(&self, entry_point: EntryPoint) -> HookSet {
        if entry_point.category().is_some() {
            HookSet::EPILOGUE
        } else {
            HookSet::empty()
        }
    }

    fn epilogue(&self, frame: &mut CallFrame<'_>, _output: &CallOutput, result: ZeResult) {
        if result.is_success() {
            self.counts[frame.entry_point().index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn teardown(&self) {
        info!("check balance of create/destroy calls");
        let leaking = self.balance_table().iter().any(|r| r.balance() != 0);
        for line in self.render() {
            if leaking && line.contains("LEAK") {
                warn!("{}", line);
            } else {
                info!("{}", line);
            }
        }
    }
}
