use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}

/// Expands the input path into the list of pileup files to read: the path
/// itself if it is a file, otherwise every `.pileup` / `.pileup.gz` inside
/// the directory, sorted by name.
pub fn find_pileup_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(format!("Input path does not exist: {}", input.display()));
    }

    let entries = fs::read_dir(input)
        .map_err(|e| format!("Failed to list directory {}: {}", input.display(), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.to_string())?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".pileup") || name.ends_with(".pileup.gz") {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(format!(
            "No .pileup files found in directory {}",
            input.display()
        ));
    }
    Ok(files)
}
