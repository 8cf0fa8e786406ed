//! `.gitignore` bootstrap.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Append each of `lines` that `.gitignore` in `workdir` does not already
/// contain. Returns the lines that were added.
///
/// Lines are compared after trimming, one entry per line.
///
/// # Errors
/// Returns error if the file cannot be read or written.
pub fn ensure_lines(workdir: &Path, lines: &[String]) -> Result<Vec<String>> {
    let path = workdir.join(".gitignore");
    let current = if path.exists() {
        String::from_utf8_lossy(&fs::read(&path)?).into_owned()
    } else {
        String::new()
    };

    let mut missing: Vec<String> = Vec::new();
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let present = current.lines().any(|existing| existing.trim() == line);
        if !present && !missing.iter().any(|m| m == line) {
            missing.push(line.to_string());
        }
    }

    if missing.is_empty() {
        return Ok(missing);
    }

    let mut block = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
        block.push('\n');
    }
    for line in &missing {
        block.push_str(line);
        block.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(block.as_bytes())?;

    Ok(missing)
}
