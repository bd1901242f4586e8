use std::path::{Path, PathBuf};

pub fn read_folder(folder_path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        } else if path.is_dir() {
            files.extend(read_folder(&path)?);
        }
    }

    files.sort();

    Ok(files)
}

/// Request files of an input path: the file itself, or every `.json` file under
/// a folder except previously written outputs.
pub fn request_files(input: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = read_folder(input)?;
    files.retain(|path| {
        let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false);
        let is_output = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(OUTPUT_SUFFIX))
            .unwrap_or(false);
        is_json && !is_output
    });

    Ok(files)
}

pub const OUTPUT_SUFFIX: &str = ".matrices.json";

/// `<stem>.matrices.json`, next to the input unless an output folder is given.
pub fn output_path(input: &Path, output_folder: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("matrix");
    let filename = format!("{stem}{OUTPUT_SUFFIX}");

    match output_folder {
        Some(folder) => folder.join(filename),
        None => input.with_file_name(filename),
    }
}
