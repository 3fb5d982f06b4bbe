//! Remove the `DELETE THIS LINK` placeholders Doxygen leaves behind when a
//! reference is only used to pull a page into the navigation tree.

use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

static PLACEHOLDER_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<a(?: class="(?:el|m-doc)")? href="(?P<target>\w+?)\.html"(?: class="(?:el|m-doc)")?>DELETE THIS LINK</a>"#,
    )
    .unwrap()
});
static EMPTY_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<p>\s*</p>").unwrap());

pub const BACKUP_SUFFIX: &str = "_pre_cleaned";
const STAGED_SUFFIX: &str = "_cleaned";

/// Result of cleaning one HTML document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanedHtml {
    pub text: String,
    /// Targets of the removed links, in document order.
    pub removed: Vec<String>,
}

pub fn clean_html(html: &str) -> CleanedHtml {
    let mut cleaned = CleanedHtml::default();
    for line in html.split_inclusive('\n') {
        cleaned.removed.extend(
            PLACEHOLDER_LINK
                .captures_iter(line)
                .map(|caps| caps["target"].to_string()),
        );
        let line = PLACEHOLDER_LINK.replace_all(line, "");
        cleaned.text.push_str(&EMPTY_PARAGRAPH.replace_all(&line, ""));
    }
    cleaned
}

fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".html")
        && !["_", "class_", "dir_", "group_"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

pub fn collect_html_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_candidate(path))
        .collect();
    files.sort();
    files
}

/// Clean one file in place, keeping the original next to it.
/// Returns the number of links removed.
pub fn strip_file(path: &Path) -> Result<usize> {
    let html =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let cleaned = clean_html(&html);
    if cleaned.removed.is_empty() {
        return Ok(0);
    }
    for target in &cleaned.removed {
        tracing::debug!(file = %path.display(), link = %target, "removed placeholder link");
    }
    let sibling = |suffix: &str| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    // the page is replaced only once the cleaned copy is on disk
    let staged = sibling(STAGED_SUFFIX);
    fs::write(&staged, cleaned.text)
        .with_context(|| format!("Failed to write {}", staged.display()))?;
    fs::rename(path, sibling(BACKUP_SUFFIX))
        .with_context(|| format!("Failed to back up {}", path.display()))?;
    fs::rename(&staged, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(cleaned.removed.len())
}

pub fn strip_links(dirs: &[PathBuf]) -> Result<usize> {
    let files = collect_html_files(dirs);
    println!(
        "{} Cleaning {} HTML files...",
        "🧹".cyan(),
        files.len()
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let results: Vec<Result<usize>> = files
        .par_iter()
        .map(|path| {
            let removed = strip_file(path);
            pb.inc(1);
            removed
        })
        .collect();
    pb.finish_and_clear();

    let mut total = 0;
    for result in results {
        total += result?;
    }
    println!("{} Removed {} placeholder links", "✓".green(), total);
    Ok(total)
}
