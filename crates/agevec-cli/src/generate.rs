//! `agevec generate`: build catalog vectors and write them to disk

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::io::Read;
use std::path::Path;

use agevec_core::ManifestEntry;
use agevec_kit::{write_vector, EmitOptions, Fixtures};
use agevec_vectors::Definition;

pub const MANIFEST_FILE: &str = "index.json";

/// Every vector file starts with its expectation line.
const VECTOR_MAGIC: &[u8] = b"expect: ";

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub emit: EmitOptions,
    /// Write `index.json` next to the vectors
    pub manifest: bool,
    /// Worker threads (0 = rayon default)
    pub workers: usize,
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    pub written: Vec<ManifestEntry>,
    pub removed: usize,
}

/// Delete vector files and the manifest left by an earlier run.
///
/// Only files that start with an `expect:` line (or the manifest itself) are
/// touched; anything else in the directory is left alone.
pub fn remove_stale(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let is_manifest = entry.file_name() == MANIFEST_FILE;
        if is_manifest || is_vector_file(&path)? {
            std::fs::remove_file(&path)
                .with_context(|| format!("removing stale {}", path.display()))?;
            tracing::debug!(path = %path.display(), "removed stale file");
            removed += 1;
        }
    }
    Ok(removed)
}

fn is_vector_file(path: &Path) -> Result<bool> {
    let mut head = [0u8; 8];
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(&head[..filled] == VECTOR_MAGIC)
}

/// Build and write `definitions` into `out_dir`.
///
/// Vectors are independent sessions, so they are built in parallel. Every
/// definition is attempted; failures are reported together at the end.
pub fn generate(
    definitions: &[Definition],
    fixtures: &Fixtures,
    out_dir: &Path,
    options: &GenerateOptions,
    progress: Option<&ProgressBar>,
) -> Result<GenerateReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;
    let removed = remove_stale(out_dir)?;
    if removed > 0 {
        tracing::info!(removed, dir = %out_dir.display(), "removed stale vectors");
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .context("building worker pool")?;

    let results: Vec<(&'static str, Result<ManifestEntry>)> = pool.install(|| {
        definitions
            .par_iter()
            .map(|def| {
                let result = def
                    .build(fixtures)
                    .and_then(|vector| write_vector(out_dir, &vector, &options.emit));
                if let Some(pb) = progress {
                    pb.inc(1);
                    pb.set_message(def.name);
                }
                (def.name, result)
            })
            .collect()
    });

    let mut written = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(entry) => written.push(entry),
            Err(e) => {
                tracing::error!(vector = name, error = %format!("{e:#}"), "vector failed");
                failed.push(name);
            }
        }
    }
    if !failed.is_empty() {
        anyhow::bail!("{} vector(s) failed: {}", failed.len(), failed.join(", "));
    }

    written.sort_by(|a, b| a.name.cmp(&b.name));
    if options.manifest {
        write_manifest(out_dir, &written)?;
    }
    Ok(GenerateReport { written, removed })
}

pub fn write_manifest(dir: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(entries).context("serializing manifest")?;
    std::fs::write(&path, json + "\n").with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "wrote manifest");
    Ok(())
}
