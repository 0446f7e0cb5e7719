use std::path::{Path, PathBuf};

/// Centralized helpers for files under an instance state directory.
/// Keeps locations consistent between the tools and the CLI.
#[inline]
pub fn snapshot_path(state_dir: &Path) -> PathBuf { state_dir.join("instance.snap") }

#[inline]
pub fn settings_path(state_dir: &Path) -> PathBuf { state_dir.join("settings.json") }

// ---- Logic manifests known to this instance (resolved on reload) ----
#[inline]
pub fn logic_dir(state_dir: &Path) -> PathBuf { state_dir.join("logic") }

#[inline]
pub fn logic_manifest_path(state_dir: &Path, file_stem: &str) -> PathBuf { logic_dir(state_dir).join(format!("{}.json", file_stem)) }

// ---- Default publication registry used by the verify tool ----
#[inline]
pub fn published_dir(state_dir: &Path) -> PathBuf { state_dir.join("published") }
