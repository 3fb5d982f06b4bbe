//! GitHub Actions job matrices: one compile job per example for each tool.

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::boards::{BoardMap, PioProject};
use super::workspace::{Workspace, env_list};
use crate::config::CiConfig;

pub const SCRIPT_HEADER: &str = "#!/bin/bash\n\n\
# Makes the bash script print out every command before it is executed, except echo\n\
trap '[[ $BASH_COMMAND != echo* ]] && echo $BASH_COMMAND' DEBUG\n\n";

const JOB_START: &str = "status=0";
const JOB_END: &str = "\n\nexit $status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    ArduinoCli,
    PlatformIo,
}

impl Tool {
    pub fn job_prefix(self) -> &'static str {
        match self {
            Tool::ArduinoCli => "Arduino",
            Tool::PlatformIo => "Platformio",
        }
    }

    pub fn matrix_name(self) -> &'static str {
        match self {
            Tool::ArduinoCli => "arduino_job_matrix",
            Tool::PlatformIo => "pio_job_matrix",
        }
    }
}

/// A board to compile for, named after its PlatformIO environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub env: String,
    pub board: String,
}

impl BuildTarget {
    pub fn board(name: &str) -> Self {
        Self {
            env: name.to_string(),
            board: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatrixJob {
    pub job_name: String,
    pub script: String,
}

/// Everything needed to render build commands.
pub struct MatrixPlan {
    pub workspace: PathBuf,
    pub arduino_cli_config: PathBuf,
    /// Present when the targets came from a PlatformIO project file.
    pub project_conf: Option<PathBuf>,
    pub targets: Vec<BuildTarget>,
    pub examples: Vec<String>,
    pub boards: BoardMap,
}

/// One target per board, in first-seen order; a later env for the same
/// board replaces the earlier one.
pub fn targets_from_project(project: &PioProject) -> crate::error::Result<Vec<BuildTarget>> {
    let mut targets: Vec<BuildTarget> = Vec::new();
    for env in &project.envs {
        let board = env.board()?;
        match targets.iter_mut().find(|t| t.board == board) {
            Some(target) => target.env = env.name.clone(),
            None => targets.push(BuildTarget {
                env: env.name.clone(),
                board: board.to_string(),
            }),
        }
    }
    Ok(targets)
}

impl MatrixPlan {
    pub fn from_workspace(ws: &Workspace, config: &CiConfig, fetch: bool) -> Result<Self> {
        let ini = ws.platformio_ini();
        let (targets, project_conf) = if ini.is_file() {
            let project = PioProject::load(&ini)?;
            (targets_from_project(&project)?, Some(ini))
        } else {
            let names = env_list("BOARDS_TO_BUILD")
                .or_else(|| config.boards.clone())
                .unwrap_or_else(|| vec!["mayfly".to_string()]);
            (names.iter().map(|b| BuildTarget::board(b)).collect(), None)
        };

        let examples = match env_list("EXAMPLES_TO_BUILD") {
            Some(examples) => examples,
            None => list_examples(&ws.examples_dir(), &config.skip_examples)?,
        };

        let overrides = ws.support_file(super::boards::BOARD_MAP_FILE, &config.support_url, fetch)?;

        Ok(Self {
            workspace: ws.root.clone(),
            arduino_cli_config: ws.arduino_cli_config(),
            project_conf,
            targets,
            examples,
            boards: BoardMap::load(overrides.as_deref())?,
        })
    }

    fn example_path(&self, example: &str) -> String {
        self.workspace.join(example).display().to_string()
    }

    pub fn build_command(&self, tool: Tool, example: &str, target: &BuildTarget) -> Result<String> {
        let path = self.example_path(example);
        let command = match tool {
            Tool::ArduinoCli => format!(
                "arduino-cli compile --warnings more --config-file {} --format text --fqbn {} {}",
                self.arduino_cli_config.display(),
                self.boards.fqbn(&target.board)?,
                path
            ),
            Tool::PlatformIo => match &self.project_conf {
                Some(conf) => format!(
                    "pio ci --project-conf {} --environment {} {}",
                    conf.display(),
                    target.env,
                    path
                ),
                None => format!("pio ci --board {} {}", target.board, path),
            },
        };
        Ok(command)
    }

    /// Full bash body of one job, every target in its own log group.
    pub fn job_script(&self, tool: Tool, example: &str) -> Result<String> {
        let mut lines = vec![JOB_START.to_string()];
        for target in &self.targets {
            let command = self.build_command(tool, example, target)?;
            lines.extend(add_log_to_command(&command, &target.env));
        }
        lines.push(JOB_END.to_string());
        Ok(lines.join("\n"))
    }
}

/// Wrap a build command so its output is grouped, summarised and folded
/// into the job's exit status.
pub fn add_log_to_command(command: &str, title: &str) -> Vec<String> {
    vec![
        format!("\necho ::group::{}", title),
        format!("{} 2>&1 | tee output.log", command),
        "result_code=${PIPESTATUS[0]}".to_string(),
        format!(
            r#"if [ "$result_code" -eq "0" ]; then echo " - {title} :white_check_mark:" >> $GITHUB_STEP_SUMMARY; else echo " - {title} :x:" >> $GITHUB_STEP_SUMMARY; fi"#
        ),
        r#"if [ "$result_code" -eq "0" ] && [ "$status" -eq "0" ]; then status=0; else status=1; fi"#
            .to_string(),
        "echo ::endgroup::".to_string(),
        format!(
            r#"if [ "$result_code" -eq "0" ]; then echo -e "\e[32m{title} successfully compiled\e[0m"; else echo -e "\e[31m{title} failed to compile\e[0m"; fi"#
        ),
    ]
}

/// `examples/<dir>` for every example directory not skipped.
pub fn list_examples(examples_dir: &Path, skip: &[String]) -> Result<Vec<String>> {
    if !examples_dir.is_dir() {
        tracing::warn!(dir = %examples_dir.display(), "no examples directory");
        return Ok(Vec::new());
    }
    let mut examples = Vec::new();
    for entry in fs::read_dir(examples_dir)
        .with_context(|| format!("Failed to read {}", examples_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_dir() && !skip.contains(&name) {
            examples.push(format!("examples/{}", name));
        }
    }
    examples.sort();
    Ok(examples)
}

/// Script file name for a job: spaces dropped, path separators flattened.
pub fn script_file_name(job_name: &str) -> String {
    format!("{}.sh", job_name.replace(' ', "").replace('/', "_"))
}

/// Write every job script and return the Arduino and PlatformIO matrices.
pub fn write_matrices(plan: &MatrixPlan, artifacts: &Path) -> Result<(Vec<MatrixJob>, Vec<MatrixJob>)> {
    let mut arduino = Vec::new();
    let mut pio = Vec::new();
    for example in &plan.examples {
        for (tool, matrix) in [(Tool::ArduinoCli, &mut arduino), (Tool::PlatformIo, &mut pio)] {
            let job_name = format!("{} - {}", tool.job_prefix(), example);
            let script_path = artifacts.join(script_file_name(&job_name));
            let body = plan.job_script(tool, example)?;
            fs::write(&script_path, format!("{}{}", SCRIPT_HEADER, body))
                .with_context(|| format!("Failed to write {}", script_path.display()))?;
            tracing::debug!(script = %script_path.display(), "wrote job script");
            matrix.push(MatrixJob {
                job_name,
                script: script_path.display().to_string(),
            });
        }
    }
    Ok((arduino, pio))
}

/// Generate scripts and matrices for the workspace, publishing them as
/// step outputs when running in Actions.
pub fn generate(ws: &Workspace, config: &CiConfig, fetch: bool) -> Result<()> {
    let plan = MatrixPlan::from_workspace(ws, config, fetch)?;
    println!(
        "{} {} examples x {} boards",
        "⚙".cyan(),
        plan.examples.len(),
        plan.targets.len()
    );
    let artifacts = ws.artifacts_dir()?;
    let (arduino, pio) = write_matrices(&plan, &artifacts)?;

    let mut outputs = Vec::new();
    for (tool, matrix) in [(Tool::ArduinoCli, &arduino), (Tool::PlatformIo, &pio)] {
        let json = serde_json::to_string(matrix)?;
        println!("echo \"{}={}\" >> $GITHUB_OUTPUT", tool.matrix_name(), json);
        let file = artifacts.join(format!("{}.json", tool.matrix_name()));
        fs::write(&file, serde_json::to_string_pretty(matrix)?)
            .with_context(|| format!("Failed to write {}", file.display()))?;
        outputs.push(format!("{}={}\n", tool.matrix_name(), json));
    }

    if let Some(output) = std::env::var_os("GITHUB_OUTPUT") {
        let mut fh = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&output)
            .context("Failed to open GITHUB_OUTPUT")?;
        for line in &outputs {
            fh.write_all(line.as_bytes())?;
        }
    }

    println!(
        "{} Wrote {} job scripts to {}",
        "✓".green(),
        arduino.len() + pio.len(),
        artifacts.display()
    );
    Ok(())
}
