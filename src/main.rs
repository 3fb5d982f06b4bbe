//! # doxprep CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the library.
//!
//! ## Command Structure
//!
//! - **Docs**: `filter`, `escape`, `unescape`, `examples-dox`, `strip-links`
//! - **CI**: `matrix`, `install-libraries`, `install-platforms`
//! - **Shell**: `completion`

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doxprep::ci::{self, Workspace};
use doxprep::config::{self, DoxprepConfig};
use doxprep::docs::{self, FileContext, NameCodec, Prefilter};

#[derive(Parser)]
#[command(name = "doxprep")]
#[command(about = "Doxygen and CI helpers for Arduino libraries", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show diagnostic output on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a Markdown file for Doxygen (INPUT_FILTER)
    Filter {
        /// Markdown file; standard input when omitted
        input: Option<PathBuf>,
        /// Alternate way to pass the input file
        #[arg(long = "input_file", conflicts_with = "input")]
        input_file: Option<PathBuf>,
        /// Repository whose GitHub Pages links become references
        #[arg(long)]
        repo: Option<String>,
    },
    /// Print the Doxygen-escaped form of a name
    Escape {
        name: String,
        /// Keep dots as they are
        #[arg(long)]
        allow_dots: bool,
        /// Keep underscores as they are
        #[arg(long)]
        allow_underscore: bool,
        /// Keep uppercase letters (CASE_SENSE_NAMES)
        #[arg(long)]
        case_sense: bool,
        /// Print the output file name form (length bounded)
        #[arg(long)]
        file: bool,
    },
    /// Turn a Doxygen reference id back into the name it came from
    Unescape {
        reference: String,
        /// Only unescape, keep generated prefixes and suffixes
        #[arg(long)]
        raw: bool,
    },
    /// Collect example sketch doc blocks into a .dox page
    ExamplesDox {
        /// Library root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Output file [default: <root>/docs/examples.dox]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Remove placeholder links from generated HTML
    StripLinks {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Generate CI job matrices and per-job build scripts
    Matrix {
        /// Download missing support files
        #[arg(long)]
        fetch: bool,
    },
    /// Generate library install scripts
    InstallLibraries {
        #[arg(long)]
        fetch: bool,
    },
    /// Generate core and platform install scripts
    InstallPlatforms {
        #[arg(long)]
        fetch: bool,
    },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DOXPREP_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "doxprep=debug" } else { "warn" })
    });
    // stdout carries filter output, so diagnostics go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Filter {
            input,
            input_file,
            repo,
        } => {
            let config = config::load_config()?;
            let repo = repo.clone().or(config.docs.repo);
            run_filter(input.as_ref().or(input_file.as_ref()), repo)
        }
        Commands::Escape {
            name,
            allow_dots,
            allow_underscore,
            case_sense,
            file,
        } => {
            let config = config::load_config()?;
            let codec = NameCodec::new(*case_sense || config.docs.case_sense_names);
            let escaped = if *file {
                codec.convert_name_to_file(name, *allow_dots, *allow_underscore)
            } else {
                codec.escape(name, *allow_dots, *allow_underscore)
            };
            println!("{}", escaped);
            Ok(())
        }
        Commands::Unescape { reference, raw } => {
            if *raw {
                println!("{}", docs::unescape(reference));
            } else {
                println!("{}", docs::convert_ref_to_name(reference));
            }
            Ok(())
        }
        Commands::ExamplesDox { root, output } => {
            let config = config::load_config()?;
            let output = output
                .clone()
                .unwrap_or_else(|| root.join("docs").join("examples.dox"));
            println!("{} Documenting examples in {}", "📚".cyan(), root.display());
            let count =
                docs::examples::write_examples_dox(root, &output, &config.ci.skip_examples)?;
            println!(
                "{} Wrote {} examples to {}",
                "✓".green(),
                count,
                output.display()
            );
            Ok(())
        }
        Commands::StripLinks { dirs } => {
            docs::links::strip_links(dirs)?;
            Ok(())
        }
        Commands::Matrix { fetch } => {
            let (ws, config) = ci_setup()?;
            ci::matrix::generate(&ws, &config.ci, *fetch)
        }
        Commands::InstallLibraries { fetch } => {
            let (ws, config) = ci_setup()?;
            ci::install::install_libraries(&ws, &config.ci, *fetch)
        }
        Commands::InstallPlatforms { fetch } => {
            let (ws, config) = ci_setup()?;
            ci::install::install_platforms(&ws, &config.ci, *fetch)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_filter(path: Option<&PathBuf>, repo: Option<String>) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    match path {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            let ctx = FileContext::from_path(&path.to_string_lossy(), repo);
            Prefilter::new(ctx).run(BufReader::new(file), &mut writer)?;
        }
        None => {
            let ctx = FileContext::named("stdin", repo);
            Prefilter::new(ctx).run(io::stdin().lock(), &mut writer)?;
        }
    }
    Ok(())
}

fn ci_setup() -> Result<(Workspace, DoxprepConfig)> {
    let ws = Workspace::detect()?;
    let config = config::DoxprepConfig::load_from(&ws.root.join(config::CONFIG_FILE))?;
    tracing::info!(root = %ws.root.display(), in_ci = ws.in_ci, "workspace");
    Ok((ws, config))
}
