//! Registry, host and filesystem fixtures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use charlie_host::{PluginHost, RunConfig};
use charlie_plugin::Registry;

use crate::stubs::{FailingSim, PanickingSim, SilentSim, StubSim};

/// Registry holding every stub: `stub`, `failing`, `panicking`, `silent`.
pub fn stub_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register::<StubSim>("stub")
        .register::<FailingSim>("failing")
        .register::<PanickingSim>("panicking")
        .register::<SilentSim>("silent");
    registry
}

/// In-process host bound to one stub type.
pub fn stub_host(type_id: &str) -> PluginHost {
    PluginHost::in_process(stub_registry(), type_id).expect("stub type is registered")
}

/// Small, fast run settings writing under `root`.
pub fn run_config(root: &Path) -> RunConfig {
    RunConfig {
        render_width: 8,
        render_height: 6,
        frame_delay: Duration::from_millis(1),
        data_root: Some(root.to_path_buf()),
        ..RunConfig::default()
    }
}

/// Sort key for `run-<stamp>[_k][-n].log`: base name, then part number.
fn part_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    // "run-yyyyMMdd-HHmmss" plus an optional "_k" never contains a third '-'.
    match stem.rsplit_once('-') {
        Some((base, n)) if base.matches('-').count() >= 2 => match n.parse() {
            Ok(n) => (base.to_string(), n),
            Err(_) => (stem, 0),
        },
        _ => (stem, 0),
    }
}

/// Every run log in `dir`, concatenated in sequence order.
pub fn read_run_log(dir: &Path) -> io::Result<String> {
    let mut parts: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .collect();
    parts.sort_by_key(|p| part_key(p));
    let mut out = String::new();
    for part in parts {
        out.push_str(&fs::read_to_string(part)?);
    }
    Ok(out)
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_keys_order_rotated_files() {
        assert_eq!(
            part_key(Path::new("run-20261016-120000.log")),
            ("run-20261016-120000".into(), 0)
        );
        assert_eq!(
            part_key(Path::new("run-20261016-120000-12.log")),
            ("run-20261016-120000".into(), 12)
        );
        assert_eq!(
            part_key(Path::new("run-20261016-120000_2-3.log")),
            ("run-20261016-120000_2".into(), 3)
        );
    }
}
