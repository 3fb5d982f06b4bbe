//! Where things live, locally and on a GitHub runner.

use anyhow::{Context, Result};
use colored::*;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const EXAMPLES_DIR: &str = "examples";
pub const CI_DIR: &str = "continuous_integration";
pub const ARTIFACTS_DIR: &str = "continuous_integration_artifacts";

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    /// Set when running under GitHub Actions.
    pub in_ci: bool,
}

impl Workspace {
    pub fn at(root: impl Into<PathBuf>, in_ci: bool) -> Self {
        Self {
            root: root.into(),
            in_ci,
        }
    }

    /// `GITHUB_WORKSPACE` when set, the current directory otherwise.
    pub fn detect() -> Result<Self> {
        match env::var_os("GITHUB_WORKSPACE") {
            Some(root) => Ok(Self::at(root, true)),
            None => Ok(Self::at(env::current_dir()?, false)),
        }
    }

    pub fn examples_dir(&self) -> PathBuf {
        self.root.join(EXAMPLES_DIR)
    }

    pub fn ci_dir(&self) -> PathBuf {
        self.root.join(CI_DIR)
    }

    pub fn platformio_ini(&self) -> PathBuf {
        self.ci_dir().join("platformio.ini")
    }

    pub fn arduino_cli_config(&self) -> PathBuf {
        if self.in_ci {
            self.root.join("arduino_cli.yaml")
        } else {
            self.ci_dir().join("arduino_cli_local.yaml")
        }
    }

    pub fn artifacts_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join(ARTIFACTS_DIR);
        if !dir.exists() {
            tracing::info!(dir = %dir.display(), "creating artifact directory");
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(dir)
    }

    /// Make sure a shared support file is present in the CI directory.
    ///
    /// Missing files are downloaded from `support_url` on a runner, or
    /// locally when `fetch` is set. Returns `None` if the file is still
    /// missing afterwards.
    pub fn support_file(&self, name: &str, support_url: &str, fetch: bool) -> Result<Option<PathBuf>> {
        let path = self.ci_dir().join(name);
        if path.is_file() {
            return Ok(Some(path));
        }
        if !(self.in_ci || fetch) {
            return Ok(None);
        }
        let url = format!("{}/{}", support_url.trim_end_matches('/'), name);
        download(&url, &path)?;
        Ok(Some(path))
    }
}

fn download(url: &str, dest: &Path) -> Result<()> {
    println!("{} Fetching {}", "⚡".yellow(), url);
    let mut response = ureq::get(url)
        .call()
        .map_err(|e| anyhow::anyhow!("Download failed: {}", e))?;
    let content = response
        .body_mut()
        .read_to_string()
        .with_context(|| format!("Failed to read response from {}", url))?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, content).with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(())
}

/// Comma separated list from the environment; `None` when unset or blank.
pub fn env_list(name: &str) -> Option<Vec<String>> {
    let value = env::var(name).ok()?;
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}
