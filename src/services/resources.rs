//! Host resource signal used to decide when to recycle the renderer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

/// Reports how much of the host's memory is in use.
pub trait ResourceProbe: Send + Sync {
    /// Memory in use as a percentage of the total, or `None` if unknown.
    fn memory_percent(&self) -> Option<f64>;
}

const MEMINFO_PATH: &str = "/proc/meminfo";

/// Reads `/proc/meminfo`. On hosts without it nothing is reported, and the
/// first failed read logs a warning that the memory threshold is inactive.
#[derive(Debug)]
pub struct SystemMemoryProbe {
    path: PathBuf,
    warned: AtomicBool,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self::with_path(MEMINFO_PATH)
    }

    /// Probe reading a meminfo-format file at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            warned: AtomicBool::new(false),
        }
    }

    fn unavailable(&self, reason: &dyn std::fmt::Display) {
        if self.warned.swap(true, Ordering::Relaxed) {
            debug!("Memory usage unavailable: {}", reason);
        } else {
            warn!(
                "Cannot read memory usage from {} ({}); the renderer will not be restarted under memory pressure",
                self.path.display(),
                reason
            );
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemMemoryProbe {
    fn memory_percent(&self) -> Option<f64> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let percent = parse_meminfo(&contents);
                if percent.is_none() {
                    self.unavailable(&"unrecognized contents");
                }
                percent
            }
            Err(e) => {
                self.unavailable(&e);
                None
            }
        }
    }
}

/// Probe that never reports pressure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbe;

impl ResourceProbe for NoopProbe {
    fn memory_percent(&self) -> Option<f64> {
        None
    }
}

/// Used-memory percentage from `/proc/meminfo` contents.
///
/// Prefers `MemAvailable`; older kernels only report `MemFree`.
pub fn parse_meminfo(contents: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        contents
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<f64>().ok())
    };

    let total = field("MemTotal")?;
    if total <= 0.0 {
        return None;
    }
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(((total - available) / total * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16000000 kB\n\
                           MemFree:         1000000 kB\n\
                           MemAvailable:    4000000 kB\n\
                           Buffers:          200000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let used = parse_meminfo(MEMINFO).unwrap();
        assert!((used - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_falls_back_to_free() {
        let used = parse_meminfo("MemTotal: 1000 kB\nMemFree: 100 kB\n").unwrap();
        assert!((used - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_garbage() {
        assert_eq!(parse_meminfo(""), None);
        assert_eq!(parse_meminfo("MemTotal: lots\n"), None);
        assert_eq!(parse_meminfo("MemTotal: 0 kB\nMemFree: 0 kB\n"), None);
    }

    #[test]
    fn test_system_probe_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, MEMINFO).unwrap();
        let used = SystemMemoryProbe::with_path(&path).memory_percent().unwrap();
        assert!((used - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_probe_warns_once() {
        use crate::utils::log_capture::CapturedLogs;

        let probe = SystemMemoryProbe::with_path("/nonexistent/meminfo");
        let logs = CapturedLogs::default();
        logs.capture(|| {
            assert_eq!(probe.memory_percent(), None);
            assert_eq!(probe.memory_percent(), None);
            assert_eq!(probe.memory_percent(), None);
        });
        assert_eq!(logs.count("will not be restarted"), 1);
    }

    #[test]
    fn test_noop_probe() {
        assert_eq!(NoopProbe.memory_percent(), None);
    }
}
