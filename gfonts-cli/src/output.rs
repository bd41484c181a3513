use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use gfonts::FontInstance;

/// Write a merged font as `<name>.ttf`, or `<name>-<style>.ttf` when a
/// selection produced several styles.
pub fn write_instance(
    instance: &FontInstance,
    output_dir: &Path,
    with_style: bool,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create {}", output_dir.display()))?;

    let stem = if with_style {
        format!("{}-{}", file_stem(&instance.name), instance.key.style)
    } else {
        file_stem(&instance.name)
    };
    let output_path = output_dir.join(format!("{stem}.ttf"));

    std::fs::write(&output_path, &instance.data)
        .wrap_err_with(|| format!("Failed to write font: {}", output_path.display()))?;

    Ok(output_path)
}

/// Font names may contain characters that are not valid in file names.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match stem.trim().trim_matches('.') {
        "" => "font".to_string(),
        trimmed => trimmed.to_string(),
    }
}
