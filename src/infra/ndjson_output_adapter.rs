use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::BatchSinkPort;
use crate::pipeline::stream::RowBatch;

/// File-based implementation of BatchSinkPort.
/// Writes each batch as `part-NNNNN.ndjson` in one directory, one row per line.
pub struct NdjsonDirSinkAdapter {
    dir: PathBuf,
}

impl NdjsonDirSinkAdapter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("creating output dir {}", dir.display()))?;
        info!("Writing batches to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn part_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("part-{:05}.ndjson", sequence))
    }
}

#[async_trait]
impl BatchSinkPort for NdjsonDirSinkAdapter {
    async fn write_batch(&self, batch: &RowBatch) -> Result<()> {
        let path = self.part_path(batch.sequence);
        if path.exists() {
            bail!("refusing to overwrite existing {}", path.display());
        }

        // Write to a temp file and rename so a failed hand-off leaves no partial part.
        let tmp_path = self.dir.join(format!(".part-{:05}.ndjson.tmp", batch.sequence));
        let write = || -> Result<()> {
            let file = fs::File::create(&tmp_path)
                .with_context(|| format!("creating {}", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            for row in &batch.rows {
                serde_json::to_writer(&mut writer, row)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
        info!(
            sequence = batch.sequence,
            rows = batch.len(),
            "Wrote {}",
            path.display()
        );
        Ok(())
    }
}
