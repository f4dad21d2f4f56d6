use crate::mat::Mat;
use crate::utils::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes the per-node clustering artifacts, keyed by the recursion label:
/// `similarity[_LABEL].bin` and `assignment[_LABEL].txt`.
pub struct MatrixWriter {
    out_dir: PathBuf,
}

impl MatrixWriter {
    pub fn new(out_dir: &Path) -> Result<MatrixWriter> {
        fs::create_dir_all(out_dir).map_err(|e| {
            format!(
                "Failed to create output directory {}: {}",
                out_dir.display(),
                e
            )
        })?;
        Ok(MatrixWriter {
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// Dense square of doubles, row-major, little-endian.
    pub fn write_matrix(&self, label: &str, mat: &Mat) -> Result<()> {
        let path = self.artifact_path("similarity", label, "bin");
        let file = File::create(&path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        mat.write_binary(&mut writer)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        log::debug!(
            "Wrote {}x{} similarity matrix to {}",
            mat.rows(),
            mat.cols(),
            path.display()
        );
        Ok(())
    }

    /// One soft-assignment value per cell, one per line.
    pub fn write_assignment(&self, label: &str, cluster: &[f64]) -> Result<()> {
        let path = self.artifact_path("assignment", label, "txt");
        let file = File::create(&path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        for value in cluster {
            writeln!(writer, "{}", value)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        }
        Ok(())
    }

    fn artifact_path(&self, stem: &str, label: &str, extension: &str) -> PathBuf {
        let name = if label.is_empty() {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}_{}.{}", stem, label, extension)
        };
        self.out_dir.join(name)
    }
}
