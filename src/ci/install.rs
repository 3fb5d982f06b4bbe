//! Bash scripts that install library dependencies and board platforms for
//! both the Arduino CLI and PlatformIO.

use anyhow::{Context, Result, bail};
use colored::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::boards::{
    BOARD_MAP_FILE, BoardMap, PLATFORM_TOOLS_FILE, PioProject, PlatformToolTable,
    load_platform_tools,
};
use super::workspace::{Workspace, env_list};
use crate::config::CiConfig;
use crate::error::DoxprepError;

const SCRIPT_PREAMBLE: &str = r#"#!/bin/bash


set -e # Exit with nonzero exit code if anything fails
if [ "$RUNNER_DEBUG" = "1" ]; then
    echo "Enabling debugging!"
    set -v # Prints shell input lines as they are read.
    set -x # Print command traces before executing command.
fi
"#;

const ARDUINO_LIBRARIES_HEAD: &str = r#"
echo "\e[32mCurrent Arduino CLI version:\e[0m"
arduino-cli version

echo "\e[32mUpdating the library index\e[0m"
arduino-cli --config-file arduino_cli.yaml lib update-index
"#;

const ARDUINO_LIBRARIES_TAIL: &str = r#"

echo "::group::Current globally installed libraries"
echo "\e[32mCurrently installed libraries:\e[0m"
arduino-cli --config-file arduino_cli.yaml lib update-index
arduino-cli --config-file arduino_cli.yaml lib list
echo "::endgroup::"
"#;

const PIO_LIBRARIES_HEAD: &str = r#"
echo "\e[32mCurrent PlatformIO version:\e[0m"
pio --version

echo "\e[32mCurrently installed libraries:\e[0m"
pio pkg list -g -v --only-libraries

"#;

const PIO_LIBRARIES_TAIL: &str = r#"

echo "::group::Current globally installed libraries"
echo "\e[32mCurrently installed packages:\e[0m"
pio pkg list -g -v --only-libraries
echo "::endgroup::"
"#;

const ARDUINO_PLATFORMS_HEAD: &str = r#"
echo "\e[32mCurrent Arduino CLI version:\e[0m"
arduino-cli version

echo "\e[32mUpdating the core index\e[0m"
arduino-cli --config-file arduino_cli.yaml core update-index
"#;

const ARDUINO_PLATFORMS_TAIL: &str = r#"

echo "\e[32mUpdating the core index\e[0m"
arduino-cli --config-file arduino_cli.yaml core update-index

echo "\e[32mUpgrading all cores\e[0m"
arduino-cli --config-file arduino_cli.yaml core upgrade

echo "\e[32mCurrently installed cores:\e[0m"
arduino-cli --config-file arduino_cli.yaml core list
"#;

const PIO_PLATFORMS_HEAD: &str = r#"
echo "\e[32mCurrent PlatformIO version:\e[0m"
pio --version
"#;

const PIO_PLATFORMS_TAIL: &str = r#"

echo "::group::Package List"
echo "\e[32mCurrently installed packages:\e[0m"
pio pkg list -g -v
echo "::endgroup::"
"#;

/// One entry of a PlatformIO `dependencies` list.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LibraryDependency {
    pub name: String,
    pub owner: Option<String>,
    pub version: Option<String>,
}

impl LibraryDependency {
    /// Version field holding a GitHub URL rather than a semver range.
    fn git_url(&self) -> Option<&str> {
        match (&self.owner, &self.version) {
            (Some(_), Some(version)) if version.contains("github") => Some(version),
            _ => None,
        }
    }

    pub fn arduino_command(&self, config: &Path) -> String {
        let target = match self.git_url() {
            Some(url) => format!("--git-url {}", url),
            None => self.name.clone(),
        };
        format!(
            "arduino-cli --config-file {} lib install {} --no-deps",
            config.display(),
            target
        )
    }

    pub fn pio_command(&self) -> String {
        let spec = match (self.git_url(), &self.owner, &self.version) {
            (Some(url), _, _) => url.to_string(),
            (None, Some(owner), Some(version)) => format!("{}/{}@{}", owner, self.name, version),
            (None, None, Some(version)) => format!("{}@{}", self.name, version),
            _ => self.name.clone(),
        };
        format!("pio pkg install --skip-dependencies -g --library {}", spec)
    }
}

#[derive(Deserialize, Default)]
struct DependencyList {
    #[serde(default)]
    dependencies: Vec<LibraryDependency>,
}

/// Dependencies of `library.json`, then those of the examples.
pub fn read_dependencies(library_json: &Path, example_json: &Path) -> Result<Vec<LibraryDependency>> {
    let content = fs::read_to_string(library_json)
        .with_context(|| format!("Failed to read {}", library_json.display()))?;
    let mut deps = serde_json::from_str::<DependencyList>(&content)
        .with_context(|| format!("Failed to parse {}", library_json.display()))?
        .dependencies;
    if example_json.is_file() {
        let content = fs::read_to_string(example_json)?;
        let examples: DependencyList = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", example_json.display()))?;
        deps.extend(examples.dependencies);
    }
    Ok(deps)
}

fn library_step(command: &str, title: &str) -> String {
    format!("\necho \"\\e[32m{}\\e[0m\"\n{}\n", title, command)
}

fn platform_step(command: &str, title: &str) -> String {
    format!(
        "\necho \"::group::{title}\"\necho \"\\e[32m{title}\\e[0m\"\n{command}\necho \"::endgroup::\"\n"
    )
}

pub fn library_scripts(deps: &[LibraryDependency], arduino_config: &Path) -> (String, String) {
    let mut arduino = format!("{}{}", SCRIPT_PREAMBLE, ARDUINO_LIBRARIES_HEAD);
    let mut pio = format!("{}{}", SCRIPT_PREAMBLE, PIO_LIBRARIES_HEAD);
    for dep in deps {
        let title = format!("Installing {}", dep.name);
        arduino.push_str(&library_step(&dep.arduino_command(arduino_config), &title));
        pio.push_str(&library_step(&dep.pio_command(), &title));
    }
    arduino.push_str(ARDUINO_LIBRARIES_TAIL);
    pio.push_str(PIO_LIBRARIES_TAIL);
    (arduino, pio)
}

/// Capitalise the first letter of every alphabetic run, e.g. `Envirodiy Avr`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

pub struct PlatformPlan {
    /// Arduino cores such as `arduino:avr`, in first-seen order.
    pub cores: Vec<String>,
    /// PlatformIO platforms, in first-seen order.
    pub platforms: Vec<String>,
}

impl PlatformPlan {
    pub fn new(boards: &[String], project: &PioProject, board_map: &BoardMap) -> Result<Self> {
        let mut cores = Vec::new();
        let mut platforms = Vec::new();
        for board in boards {
            push_unique(&mut cores, board_map.core(board)?);
            let env = project
                .env_for_board(board)
                .ok_or_else(|| DoxprepError::MissingEnvironmentKey {
                    env: format!("board {}", board),
                    key: "platform".to_string(),
                })?;
            push_unique(&mut platforms, env.platform()?.to_string());
        }
        Ok(Self { cores, platforms })
    }

    pub fn scripts(&self, tools: &PlatformToolTable, arduino_config: &Path) -> Result<(String, String)> {
        let mut arduino = format!("{}{}", SCRIPT_PREAMBLE, ARDUINO_PLATFORMS_HEAD);
        for core in &self.cores {
            let command = format!(
                "arduino-cli --config-file {} core install {}",
                arduino_config.display(),
                core
            );
            arduino.push_str(&platform_step(&command, &title_case(&core.replace(':', " "))));
        }
        arduino.push_str(ARDUINO_PLATFORMS_TAIL);

        let mut pio = format!("{}{}", SCRIPT_PREAMBLE, PIO_PLATFORMS_HEAD);
        for platform in &self.platforms {
            let entry = tools
                .get(platform)
                .ok_or_else(|| DoxprepError::MissingPlatformTools(platform.clone()))?;
            let mut command = format!("pio pkg install -g --platform {}", platform);
            for tool in &entry.tools {
                command.push_str(&format!("\npio pkg install -g --tool {}", tool));
            }
            pio.push_str(&platform_step(&command, &entry.name));
        }
        pio.push_str(PIO_PLATFORMS_TAIL);
        Ok((arduino, pio))
    }
}

fn write_script(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("   {} {}", "✓".green(), path.display());
    Ok(path)
}

pub fn install_libraries(ws: &Workspace, config: &CiConfig, fetch: bool) -> Result<()> {
    // the shared Arduino CLI settings travel with the scripts as an artifact
    let shared_config = if ws.in_ci || fetch {
        ws.support_file("arduino_cli.yaml", &config.support_url, fetch)?
    } else {
        None
    };
    let deps = read_dependencies(
        &ws.root.join("library.json"),
        &ws.examples_dir().join("example_dependencies.json"),
    )?;
    if deps.is_empty() {
        println!("{} No dependencies to install!", "!".yellow());
        return Ok(());
    }
    tracing::info!(count = deps.len(), "generating library install scripts");

    let arduino_config = shared_config.clone().unwrap_or_else(|| ws.arduino_cli_config());
    let (arduino, pio) = library_scripts(&deps, &arduino_config);
    let artifacts = ws.artifacts_dir()?;
    write_script(&artifacts, "install-libraries-arduino-cli.sh", &arduino)?;
    write_script(&artifacts, "install-libraries-platformio.sh", &pio)?;
    if let Some(shared) = shared_config {
        fs::copy(&shared, artifacts.join("arduino_cli.yaml"))
            .with_context(|| format!("Failed to copy {}", shared.display()))?;
    }
    Ok(())
}

pub fn install_platforms(ws: &Workspace, config: &CiConfig, fetch: bool) -> Result<()> {
    let Some(ini) = ws.support_file("platformio.ini", &config.support_url, fetch)? else {
        bail!(
            "{} not found (run with --fetch to download the shared one)",
            ws.platformio_ini().display()
        );
    };
    let project = PioProject::load(&ini)?;
    let board_map = BoardMap::load(ws.support_file(BOARD_MAP_FILE, &config.support_url, fetch)?.as_deref())?;
    let Some(tools_file) = ws.support_file(PLATFORM_TOOLS_FILE, &config.support_url, fetch)? else {
        bail!("{} not found (run with --fetch)", PLATFORM_TOOLS_FILE);
    };
    let tools = load_platform_tools(&tools_file)?;

    let boards = match env_list("BOARDS_TO_BUILD") {
        Some(boards) if boards != ["all"] => boards,
        _ => project
            .envs
            .iter()
            .map(|env| env.board().map(str::to_string))
            .collect::<crate::error::Result<Vec<_>>>()?,
    };

    let plan = PlatformPlan::new(&boards, &project, &board_map)?;
    tracing::info!(cores = ?plan.cores, platforms = ?plan.platforms, "platforms to install");
    let (arduino, pio) = plan.scripts(&tools, &ws.arduino_cli_config())?;
    let artifacts = ws.artifacts_dir()?;
    write_script(&artifacts, "install-platforms-arduino-cli.sh", &arduino)?;
    write_script(&artifacts, "install-platforms-platformio.sh", &pio)?;
    Ok(())
}
