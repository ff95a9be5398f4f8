//! GPU presence/VRAM detection by shelling out to platform tools
//! (SPEC_FULL.md §4.5). Any subprocess failure is treated as "no GPU"
//! rather than propagated, since this runs once at startup purely to pick
//! a model size — a missing tool must never block the sidecar.
//!
//! Grounded on `mmogr-gglib/crates/gglib-runtime/src/system/gpu.rs`.

use std::process::Command;

pub struct GpuInfo {
    pub present: bool,
    pub vram_gb: f64,
}

pub fn detect() -> GpuInfo {
    let present = nvidia_smi_list_gpus() || lspci_reports_nvidia() || wmic_reports_nvidia();
    let vram_gb = if present { nvidia_vram_gb().unwrap_or(0.0) } else { 0.0 };
    GpuInfo { present, vram_gb }
}

fn nvidia_smi_list_gpus() -> bool {
    Command::new("nvidia-smi")
        .arg("--list-gpus")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn lspci_reports_nvidia() -> bool {
    if !cfg!(target_os = "linux") {
        return false;
    }
    Command::new("lspci")
        .output()
        .map(|o| {
            o.status.success()
                && String::from_utf8_lossy(&o.stdout)
                    .to_lowercase()
                    .contains("nvidia")
        })
        .unwrap_or(false)
}

fn wmic_reports_nvidia() -> bool {
    if !cfg!(target_os = "windows") {
        return false;
    }
    Command::new("wmic")
        .args(["path", "win32_VideoController", "get", "name"])
        .output()
        .map(|o| {
            o.status.success()
                && String::from_utf8_lossy(&o.stdout)
                    .to_lowercase()
                    .contains("nvidia")
        })
        .unwrap_or(false)
}

/// A CUDA-toolkit sanity check; currently informational only (not
/// consulted by the startup selection table, which only needs GPU + VRAM
/// presence), but kept since SPEC_FULL.md lists `nvcc` among the detection
/// tools.
pub fn cuda_toolkit_version() -> Option<String> {
    let output = Command::new("nvcc").arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().find(|l| l.contains("release"))?;
    let version = line.split("release").nth(1)?.trim().split(',').next()?.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

fn nvidia_vram_gb() -> Option<f64> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=memory.total", "--format=csv,noheader,nounits"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mib: f64 = stdout.lines().next()?.trim().parse().ok()?;
    Some(mib / 1024.0)
}
