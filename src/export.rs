use anyhow::{anyhow, Context};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT: &str = "schoold-reports-v1";

/// A rendered report: what the screens offer as a downloadable document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            title: title.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> anyhow::Result<Vec<u8>> {
        let mut w = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(Vec::new());
        w.write_record(&self.headers)
            .context("failed to write csv header")?;
        for row in &self.rows {
            w.write_record(row).context("failed to write csv row")?;
        }
        w.into_inner()
            .map_err(|e| anyhow!("failed to flush csv: {}", e.error()))
    }
}

#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub table: ReportTable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub title: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub entries: Vec<ManifestEntry>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes one CSV per report plus `manifest.json` into a zip at `out_path`.
pub fn write_report_bundle(entries: &[BundleEntry], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut manifest_entries = Vec::with_capacity(entries.len());
    for entry in entries {
        let bytes = entry
            .table
            .to_csv()
            .with_context(|| format!("failed to render {}", entry.name))?;
        zip.start_file(entry.name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry.name))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write entry {}", entry.name))?;
        manifest_entries.push(ManifestEntry {
            name: entry.name.clone(),
            title: entry.table.title.clone(),
            rows: entry.table.rows.len(),
            sha256: sha256_hex(&bytes),
        });
    }

    let manifest = serde_json::json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "entries": manifest_entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: manifest_entries.len() + 1,
        entries: manifest_entries,
    })
}

/// File-name-safe form of a course name: ASCII lowercase, accents folded,
/// everything else collapsed to single dashes.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars().flat_map(|c| c.to_lowercase()) {
        let c = match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("untitled");
    }
    out
}
