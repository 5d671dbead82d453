use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::types::OutputMode;

/// Inserted between the file stem and the extension in suffixed mode.
pub const OUTPUT_SUFFIX: &str = "-output";

/// Where the executed version of `input` is written.
pub fn output_path(input: &Path, mode: OutputMode) -> PathBuf {
    match mode {
        OutputMode::InPlace => input.to_path_buf(),
        OutputMode::Suffixed => {
            let stem = input.file_stem().map(OsString::from).unwrap_or_default();
            let mut name = stem;
            name.push(OUTPUT_SUFFIX);
            if let Some(ext) = input.extension() {
                name.push(".");
                name.push(ext);
            }
            input.with_file_name(name)
        }
    }
}

/// Absolute directory containing `input`; the kernel is started there.
pub fn working_dir(input: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(input)?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(
            output_path(Path::new("notebooks/analysis.ipynb"), OutputMode::Suffixed),
            PathBuf::from("notebooks/analysis-output.ipynb")
        );
        assert_eq!(
            output_path(Path::new("a.b.json"), OutputMode::Suffixed),
            PathBuf::from("a.b-output.json")
        );
        assert_eq!(
            output_path(Path::new("dir/plain"), OutputMode::Suffixed),
            PathBuf::from("dir/plain-output")
        );
    }

    #[test]
    fn only_the_extension_is_stripped() {
        // a directory component that looks like an extension is left alone
        assert_eq!(
            output_path(Path::new("x.ipynb/nb.ipynb"), OutputMode::Suffixed),
            PathBuf::from("x.ipynb/nb-output.ipynb")
        );
    }

    #[test]
    fn in_place_reuses_input() {
        let p = Path::new("nb.ipynb");
        assert_eq!(output_path(p, OutputMode::InPlace), p);
    }

    #[test]
    fn working_dir_is_absolute_parent() {
        let dir = working_dir(Path::new("some/dir/nb.ipynb")).unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("some/dir"));
    }
}
