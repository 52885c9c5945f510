use walkdir::WalkDir;
use std::path::{Path, PathBuf};

/// Discover all CSV files below `root` (case-insensitive extension match).
///
/// A file path is returned as-is when it points at a single file. Results are
/// sorted so record order is stable between runs.
pub fn discover_csv_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    log::info!("Discovered {} CSV files in {}", files.len(), root.display());
    files
}

/// Expand a mix of file and directory arguments into CSV file paths.
pub fn expand_inputs<P: AsRef<Path>>(inputs: &[P]) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|input| {
            let input = input.as_ref();
            if input.is_dir() {
                discover_csv_files(input)
            } else {
                vec![input.to_path_buf()]
            }
        })
        .collect()
}
