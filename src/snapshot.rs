use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::model::Document;

const MANIFEST_ENTRY: &str = "manifest.json";
const ROSTER_ENTRY: &str = "roster/roster.json";
pub const BUNDLE_FORMAT_V1: &str = "rollbook-snapshot-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub roster_sha256: String,
}

#[derive(Debug)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub document: Document,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Writes the whole document as a zip bundle: a manifest carrying the format
/// tag and a SHA-256 of the roster payload, plus the roster JSON itself.
pub fn export_snapshot(document: &Document, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let roster_json =
        serde_json::to_string_pretty(document).context("failed to serialize roster document")?;
    let roster_sha256 = sha256_hex(roster_json.as_bytes());

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "rosterSha256": roster_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(ROSTER_ENTRY, opts)
        .context("failed to start roster entry")?;
    zip.write_all(roster_json.as_bytes())
        .context("failed to write roster entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        roster_sha256,
    })
}

/// Reads a snapshot back. Accepts either a bundle produced by
/// `export_snapshot` (checksum verified) or a bare JSON document file, the
/// shape a user exported by hand. Document-level tolerance lives in
/// `Document::from_value`: a malformed `courses` field becomes the empty
/// mapping and `selectedDate` is reset; only unreadable input is an error.
pub fn import_snapshot(in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let raw: serde_json::Value =
            serde_json::from_str(&text).context("snapshot file is not valid JSON")?;
        return Ok(ImportSummary {
            bundle_format_detected: "plain-json".to_string(),
            document: Document::from_value(raw),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut roster_text = String::new();
    archive
        .by_name(ROSTER_ENTRY)
        .context("bundle missing roster/roster.json")?
        .read_to_string(&mut roster_text)
        .context("failed to read roster entry")?;

    if let Some(expected) = manifest.get("rosterSha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(roster_text.as_bytes());
        if actual != expected {
            return Err(anyhow!(
                "roster checksum mismatch: expected {}, got {}",
                expected,
                actual
            ));
        }
    }

    let raw: serde_json::Value =
        serde_json::from_str(&roster_text).context("roster entry is not valid JSON")?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        document: Document::from_value(raw),
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
