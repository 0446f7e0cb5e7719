//! Instance snapshot file
//! ----------------------
//! One framed record: 12-byte header (magic, kind, format version, pad,
//! payload length), a bincode payload and a trailing crc32 of the payload.
//! Written to `instance.snap.tmp`, synced, then renamed over
//! `instance.snap` so readers only ever see a complete image.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use crc32fast::Hasher as Crc32;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::Journal;
use crate::ident::{Address, LogicId};

use super::layout::StorageLayout;
use super::Slots;

const MAGIC_SNAP: u32 = 0x49565231; // 'IVR1'
const KIND_INSTANCE: u8 = 1;
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 12;

/// A logic unit that was active at some point, in activation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicRevision {
    pub logic: LogicId,
    pub version: u64,
    pub activated_at: DateTime<Utc>,
}

/// Everything needed to bring an instance back at the same stable address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceImage {
    pub address: Address,
    pub layout: StorageLayout,
    pub slots: Slots,
    pub history: Vec<LogicRevision>,
    pub journal: Journal,
}

impl InstanceImage {
    pub fn active(&self) -> Option<&LogicRevision> { self.history.last() }
}

fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| anyhow!("snapshot payload too large: {} bytes", payload.len()))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
    buf.extend_from_slice(&MAGIC_SNAP.to_le_bytes());
    buf.push(KIND_INSTANCE);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    let mut hasher = Crc32::new();
    hasher.update(payload);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());
    Ok(buf)
}

fn decode_frame(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < HEADER_LEN + 4 { bail!("snapshot truncated: {} bytes", bytes.len()); }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != MAGIC_SNAP { bail!("bad snapshot magic {:#010x}", magic); }
    if bytes[4] != KIND_INSTANCE { bail!("unexpected snapshot kind {}", bytes[4]); }
    if bytes[5] != FORMAT_VERSION { bail!("unsupported snapshot format version {}", bytes[5]); }
    let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if bytes.len() != HEADER_LEN + len + 4 {
        bail!("snapshot length mismatch: header says {} payload bytes, file has {}", len, bytes.len() - HEADER_LEN - 4);
    }
    let payload = &bytes[HEADER_LEN..HEADER_LEN + len];
    let tail = &bytes[HEADER_LEN + len..];
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let mut hasher = Crc32::new();
    hasher.update(payload);
    if hasher.finalize() != expected { bail!("snapshot crc mismatch"); }
    Ok(payload)
}

/// Serialize and atomically publish an image at `path`.
pub fn save_image(path: &Path, image: &InstanceImage, fsync: bool) -> Result<()> {
    if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
    let payload = bincode::serialize(image).context("encode instance image")?;
    let frame = encode_frame(&payload)?;
    let tmp = path.with_extension("snap.tmp");
    {
        let mut f = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(&frame)?;
        f.flush()?;
        if fsync { f.sync_all()?; }
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    info!(target: "invariance::storage", "snapshot saved: address={} bytes={} events={}", image.address, frame.len(), image.journal.len());
    Ok(())
}

/// Load an image if one exists. Corrupt files are an error, not an absence.
pub fn load_image(path: &Path) -> Result<Option<InstanceImage>> {
    if !path.exists() { return Ok(None); }
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let payload = decode_frame(&bytes).with_context(|| format!("decode {}", path.display()))?;
    let image: InstanceImage = bincode::deserialize(payload).context("decode instance image")?;
    debug!(target: "invariance::storage", "snapshot loaded: address={} revisions={}", image.address, image.history.len());
    Ok(Some(image))
}
