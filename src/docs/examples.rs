//! Collect the leading doc block of every example sketch into one `.dox`
//! page so Doxygen lists the examples with navigation.

use anyhow::{Context, Result};
use colored::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BANNER_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/\*\*\s*[=_-]+$").unwrap());
static BANNER_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ *\*/\s*/\*\s*[=_-]+\s*\*/$").unwrap());
static BANNER_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ *\*\s*[=_-]+\s*\*/$").unwrap());

const EXAMPLE_NAVIGATION: &str = "@m_examplenavigation";
const FOOTER_NAVIGATION: &str = "@m_footernavigation";

/// Sketches following the Arduino layout `<dir>/<name>/<name>.ino`.
pub fn find_sketches(dir: &Path, skip: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut sketches = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_dir() || skip.iter().any(|s| s == name) {
            continue;
        }
        let sketch = path.join(format!("{}.ino", name));
        if sketch.is_file() {
            sketches.push(sketch);
        }
    }
    sketches.sort();
    Ok(sketches)
}

fn strip_banners(line: &str) -> String {
    let line = BANNER_OPEN.replace(line, "/**");
    let line = BANNER_SPLIT.replace(&line, " */");
    BANNER_CLOSE.replace(&line, " */").into_owned()
}

/// Render the doc block of one sketch.
///
/// `dir_label` is the directory given to `@dir`, e.g. `examples/simple_logging`.
/// Returns `None` when the sketch does not open with a `/**` block.
pub fn document_sketch(source: &str, dir_label: &str, example: &str) -> Option<String> {
    let mut out = String::new();
    let mut in_block = false;
    let mut has_example_nav = false;
    let mut has_footer_nav = false;
    let mut copied = false;

    for (i, raw) in source.lines().enumerate() {
        let line = strip_banners(raw);
        if i < 2 && line.starts_with("/**") {
            in_block = true;
        }
        if !in_block {
            continue;
        }
        has_example_nav |= line.contains(EXAMPLE_NAVIGATION);
        has_footer_nav |= line.contains(FOOTER_NAVIGATION);

        if let Some(end) = line.find("*/") {
            out.push_str(" *\n");
            if !has_example_nav {
                out.push_str(" * @m_examplenavigation{examples_page,}\n");
            }
            if !has_footer_nav {
                out.push_str(" * @m_footernavigation\n");
            }
            out.push_str(&line[..end + 2]);
            out.push_str(&format!(
                "\n/**\n * @dir {}\n * @brief Contains the {} example.\n */\n",
                dir_label, example
            ));
            copied = true;
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    copied.then_some(out)
}

fn dir_label(sketch: &Path) -> String {
    let parts: Vec<String> = sketch
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let n = parts.len();
    if n >= 3 {
        format!("{}/{}", parts[n - 3], parts[n - 2])
    } else {
        parts.first().cloned().unwrap_or_default()
    }
}

/// Write the doc blocks of all example and extra sketches under `root`.
pub fn write_examples_dox(root: &Path, output: &Path, skip: &[String]) -> Result<usize> {
    let mut sketches = find_sketches(&root.join("examples"), skip)?;
    sketches.extend(find_sketches(&root.join("extras"), skip)?);

    let mut dox = String::new();
    let mut documented = 0;
    for sketch in &sketches {
        let example = sketch
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let source = fs::read_to_string(sketch)
            .with_context(|| format!("Failed to read {}", sketch.display()))?;
        match document_sketch(&source, &dir_label(sketch), &example) {
            Some(block) => {
                println!("   {} {}", "✓".green(), example);
                dox.push_str(&block);
                documented += 1;
            }
            None => println!("   {} {} has no doc block", "!".yellow(), example),
        }
        dox.push_str("\n\n");
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, dox).with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), documented, "wrote example documentation");
    Ok(documented)
}
