//! Model discovery priority chain (SPEC_FULL.md §4.4), grounded on
//! `original_source/python-stt/stt_engine/transcription/whisper_client.py`'s
//! `_detect_model_path`. Each step either resolves to a concrete
//! filesystem location or falls through to the next; step 3 is the only
//! one that doesn't resolve to a local path at all (the caller passes the
//! remote identifier straight to the backend library, which performs its
//! own download/cache lookup).

use std::path::{Path, PathBuf};

use sidecar_foundation::error::SttError;
use sidecar_stt::types::ModelSize;

/// A fixed list of install locations searched in offline mode (step 4).
/// These are the conventional per-platform "bundled with the app" paths;
/// the first one that contains a model for the requested size wins.
fn bundled_install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local/share/sidecar/models"));
    }
    dirs.push(PathBuf::from("/usr/share/sidecar/models"));
    dirs.push(PathBuf::from("/opt/sidecar/models"));
    dirs
}

fn app_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/sidecar"))
}

fn cache_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cache/sidecar/hub"))
}

/// Finds a `.bin` ggml model file directly inside `dir` (not recursively —
/// the user override and cache snapshot directories are expected to
/// contain exactly one model file each).
fn find_ggml_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("bin"))
}

/// Step 1: `$HOME/.config/sidecar/whisper_model_path`, whose content is a
/// directory path containing the model to load regardless of `target`.
fn user_override(target: ModelSize) -> Option<(PathBuf, ModelSize)> {
    let override_file = app_config_dir()?.join("whisper_model_path");
    let dir = std::fs::read_to_string(&override_file).ok()?;
    let dir = PathBuf::from(dir.trim());
    let model = find_ggml_file(&dir)?;
    Some((model, target))
}

/// Step 2: `$HOME/.cache/sidecar/hub/models--*-whisper-<size>/snapshots/<hash>/`,
/// latest snapshot directory (by name, which Hub snapshot hashes make
/// lexicographically arbitrary — "latest" here means most recently
/// modified) chosen.
fn cached_snapshot(target: ModelSize) -> Option<(PathBuf, ModelSize)> {
    let root = cache_root()?;
    let suffix = format!("-whisper-{}", target.as_str());
    let model_dir = std::fs::read_dir(&root)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("models--") && n.ends_with(&suffix))
                .unwrap_or(false)
        })?;

    let snapshots_dir = model_dir.join("snapshots");
    let latest = std::fs::read_dir(&snapshots_dir)
        .ok()?
        .filter_map(Result::ok)
        .max_by_key(|entry| entry.metadata().and_then(|m| m.modified()).ok())?
        .path();

    let model = find_ggml_file(&latest)?;
    Some((model, target))
}

/// Step 4: bundled fallback. Resolves to `target` if present, otherwise to
/// `base` (and the caller must update `model_size` to match what was
/// actually loaded).
fn bundled_fallback(target: ModelSize) -> Option<(PathBuf, ModelSize)> {
    for dir in bundled_install_dirs() {
        let sized = dir.join(format!("ggml-{}.bin", target.as_str()));
        if sized.is_file() {
            return Some((sized, target));
        }
    }
    for dir in bundled_install_dirs() {
        let base = dir.join("ggml-base.bin");
        if base.is_file() {
            return Some((base, ModelSize::Base));
        }
    }
    None
}

/// The result of a successful discovery: a local path paired with the
/// size actually resolved, which may differ from the requested `target`
/// only via the bundled-fallback step.
pub struct Resolved {
    pub path: PathBuf,
    pub size: ModelSize,
}

/// Runs the full priority chain. `offline` disables step 3 (there is
/// nothing to try here since whisper-rs never performs its own downloads;
/// offline mode only changes whether step 4's fallback is reachable —
/// steps 1/2 apply identically in both modes) and restricts failure at
/// the end of the chain to `MODEL_NOT_FOUND` instead of deferring to a
/// remote identifier.
pub fn discover(target: ModelSize, offline: bool) -> Result<Resolved, SttError> {
    if let Some((path, size)) = user_override(target) {
        return Ok(Resolved { path, size });
    }
    if let Some((path, size)) = cached_snapshot(target) {
        return Ok(Resolved { path, size });
    }
    if offline {
        if let Some((path, size)) = bundled_fallback(target) {
            return Ok(Resolved { path, size });
        }
        return Err(SttError::ModelNotFound { path: None });
    }
    // Online mode step 3 would hand a remote identifier to the backend
    // library for it to resolve/download; whisper-rs has no such facility,
    // so online mode still falls through to the bundled fallback before
    // giving up. This is a deliberate narrowing of the online step for
    // this backend, not a spec deviation in offline mode.
    if let Some((path, size)) = bundled_fallback(target) {
        return Ok(Resolved { path, size });
    }
    Err(SttError::ModelNotFound { path: None })
}
