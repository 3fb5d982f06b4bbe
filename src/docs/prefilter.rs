//! Markdown to Doxygen pre-filter.
//!
//! Doxygen runs this over every Markdown input (`FILTER_PATTERNS`). The
//! filter rewrites GitHub flavored Markdown into the dialect Doxygen
//! understands, one line at a time:
//!
//! - GitHub-only blocks, fenced by `[//]: # ( Start GitHub Only )` and
//!   `[//]: # ( End GitHub Only )`, are commented out
//! - `[//]: # ( @command )` comments become bare Doxygen commands
//! - headers get a section label derived from the file name and the GitHub
//!   anchor of the header
//! - internal and same-repository GitHub Pages links become `@ref`s
//! - code fences become `@code`/`@endcode`, mermaid fences become `<pre>`
//!
//! Exactly one line is written for every line read. Doxygen reports warnings
//! by input line number, so a drift is treated as fatal.

use regex::{Captures, Regex};
use std::io::{BufRead, Write};
use std::sync::LazyLock;

use crate::docs::codec::convert_ref_to_name;
use crate::docs::text::{camel_to_snake, github_slugify};
use crate::error::{DoxprepError, Result};

pub const GITHUB_ONLY_START: &str = "[//]: # ( Start GitHub Only )";
pub const GITHUB_ONLY_END: &str = "[//]: # ( End GitHub Only )";
const CHANGE_LOG_FILE: &str = "ChangeLog";
const FENCE: &str = "```";

static COMMENT_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[//\]: # \( @(\w+?.*) \)").unwrap());
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<pounds>#{1,6})\s+(?P<name>[^<>{}#]+)").unwrap());
static HEADER_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{#(.+)\}").unwrap());
static HIDDEN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!-- \{#(.+)\} -->").unwrap());
static NAMED_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a name="(?P<anchor>\w+)"></a>"#).unwrap());
static CHANGE_LOG_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{2}\s+(?P<link>\[(?P<version>[^{}#]+?)\])(?P<info>.*)").unwrap()
});
static CHANGE_LOG_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{3}\s+(?P<action>Changed|Added|Removed|Fixed|Known Issues)").unwrap()
});
static INTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(#(?P<anchor>[\w/-]+)\)").unwrap());
static PAGES_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\]\(https://(?P<org>[\w-]+)\.github\.io/(?P<repo>[\w.-]+)/(?P<name>[\w.-]+?)\.html\)",
    )
    .unwrap()
});
static FENCE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?P<language>\w+)").unwrap());
static BARE_FENCE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?P<language>\w+)(?P<eol>\n?)$").unwrap());
static SECTIONING_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[//\]: # \( @(?:mainpage|page|.*section|paragraph)").unwrap()
});

/// Per-file facts every rule may consult.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// Path as given, for error reports.
    pub source: String,
    /// Namespace used for generated section labels.
    pub file_name: String,
    snake_name: String,
    /// Only GitHub Pages links into this repository become `@ref`s.
    pub repo: Option<String>,
}

impl FileContext {
    pub fn named(file_name: &str, repo: Option<String>) -> Self {
        Self {
            source: file_name.to_string(),
            file_name: file_name.to_string(),
            snake_name: camel_to_snake(file_name),
            repo,
        }
    }

    /// Derive the context from an input path, with either separator style.
    ///
    /// The walk-through of an example lives in `examples/<name>/ReadMe.md`,
    /// so such files are named after their example directory instead.
    pub fn from_path(path: &str, repo: Option<String>) -> Self {
        let sep = if path.contains('\\') { '\\' } else { '/' };
        let (dir, file) = path.rsplit_once(sep).unwrap_or(("", path));
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
        let file_name = if dir.contains("examples") && stem.eq_ignore_ascii_case("readme") {
            let example = dir.rsplit(sep).next().unwrap_or(dir);
            format!("example_{}", example)
        } else {
            stem.to_string()
        };
        Self {
            source: path.to_string(),
            ..Self::named(&file_name, repo)
        }
    }

    pub fn is_change_log(&self) -> bool {
        self.file_name == CHANGE_LOG_FILE
    }

    fn label(&self, slug: &str) -> String {
        format!("{}_{}", self.snake_name, slug)
    }
}

/// Parser state carried from one line to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    /// Cleared inside GitHub-only blocks.
    pub print_me: bool,
    /// Hides exactly one line, the header following a sectioning command.
    pub skip_me: bool,
    pub in_fence: bool,
    pub fence_language: String,
    pub change_log_version: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            print_me: true,
            skip_me: false,
            in_fence: false,
            fence_language: String::new(),
            change_log_version: String::new(),
        }
    }
}

impl FilterState {
    fn finish_line(&mut self, original: &str) {
        self.skip_me = SECTIONING_DIRECTIVE.is_match(original);
        if original.contains(GITHUB_ONLY_END) {
            self.print_me = true;
        }
    }
}

struct Line<'a> {
    original: &'a str,
    massaged: String,
}

type Rule = fn(&FileContext, &mut FilterState, &mut Line<'_>);

/// Applied top to bottom, each on the output of the previous one.
const RULES: &[(&str, Rule)] = &[
    ("github-only", start_github_only),
    ("comment-directives", convert_comment_directives),
    ("header-labels", label_headers),
    ("change-log", rewrite_change_log),
    ("internal-links", rewrite_internal_links),
    ("pages-links", rewrite_pages_links),
    ("fences", translate_fences),
    ("suppressed", comment_out_suppressed),
];

fn start_github_only(_ctx: &FileContext, state: &mut FilterState, line: &mut Line<'_>) {
    if line.original.contains(GITHUB_ONLY_START) {
        state.print_me = false;
    }
}

fn convert_comment_directives(_ctx: &FileContext, _state: &mut FilterState, line: &mut Line<'_>) {
    let converted = COMMENT_DIRECTIVE
        .replace_all(&line.massaged, "@${1}")
        .into_owned();
    line.massaged = converted
        .replace("thanks to @", r"thanks to \@")
        .replace("courtesy of @", r"courtesy of \@");
}

fn label_headers(ctx: &FileContext, _state: &mut FilterState, line: &mut Line<'_>) {
    if ctx.is_change_log() {
        return;
    }
    let text = &line.massaged;
    let relabeled = match HEADER.captures(text) {
        None => return,
        Some(_) if HEADER_LABEL.is_match(text) => {
            HIDDEN_LABEL.replace_all(text, "{#${1}}").into_owned()
        }
        Some(_) if NAMED_ANCHOR.is_match(text) => {
            NAMED_ANCHOR.replace_all(text, "{#${anchor}}").into_owned()
        }
        Some(header) => format!(
            "{} {}  {{#{}}}\n",
            &header["pounds"],
            header["name"].trim(),
            ctx.label(&github_slugify(&header["name"]))
        ),
    };
    line.massaged = relabeled;
}

fn rewrite_change_log(ctx: &FileContext, state: &mut FilterState, line: &mut Line<'_>) {
    if !ctx.is_change_log() {
        return;
    }
    if line.original.to_lowercase().starts_with("# changelog") {
        line.massaged = "# ChangeLog {#change_log}\n".to_string();
    }
    let text = &line.massaged;
    let rewritten = if let Some(version) = CHANGE_LOG_VERSION.captures(text) {
        state.change_log_version = version["version"].trim().to_lowercase().replace('.', "-");
        // the release line shares the newline of the heading to keep line numbers
        format!(
            "@section {} {}{}\nGitHub Release: {}",
            ctx.label(&state.change_log_version),
            &version["link"],
            &version["info"],
            &version["link"]
        )
    } else if let Some(action) = CHANGE_LOG_ACTION.captures(text) {
        let label = ctx.label(&format!(
            "{}_{}",
            state.change_log_version,
            camel_to_snake(&action["action"])
        ));
        format!("{}  {{#{}}}\n", text.trim_end(), label)
    } else {
        return;
    };
    line.massaged = rewritten;
}

fn rewrite_internal_links(ctx: &FileContext, _state: &mut FilterState, line: &mut Line<'_>) {
    line.massaged = INTERNAL_LINK
        .replace_all(&line.massaged, |caps: &Captures| {
            format!("](@ref {})", ctx.label(&github_slugify(&caps["anchor"])))
        })
        .into_owned();
}

fn rewrite_pages_links(ctx: &FileContext, _state: &mut FilterState, line: &mut Line<'_>) {
    let Some(repo) = ctx.repo.as_deref() else {
        return;
    };
    line.massaged = PAGES_LINK
        .replace_all(&line.massaged, |caps: &Captures| {
            if &caps["repo"] == repo {
                format!("](@ref {})", convert_ref_to_name(&caps["name"]))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned();
}

fn translate_fences(_ctx: &FileContext, state: &mut FilterState, line: &mut Line<'_>) {
    if !line.original.contains(FENCE) {
        return;
    }
    if state.in_fence {
        state.in_fence = false;
        let closer = if state.fence_language == "mermaid" {
            "</pre>"
        } else {
            "@endcode"
        };
        line.massaged = line.massaged.replace(FENCE, closer);
        return;
    }
    state.in_fence = true;
    let language = FENCE_LANGUAGE
        .captures(&line.massaged)
        .map(|caps| caps["language"].to_string());
    match language.as_deref() {
        Some("mermaid") => {
            line.massaged = line
                .massaged
                .replace("```mermaid", r#"<pre class="mermaid">"#);
        }
        Some(_) => {
            line.massaged = BARE_FENCE_LANGUAGE
                .replace(&line.massaged, "@code{${language}}${eol}")
                .into_owned();
        }
        None => line.massaged = line.massaged.replace(FENCE, "@code"),
    }
    state.fence_language = language.unwrap_or_default();
}

fn comment_out_suppressed(_ctx: &FileContext, state: &mut FilterState, line: &mut Line<'_>) {
    if state.skip_me || !state.print_me {
        line.massaged = format!("<!--{}-->\n", line.massaged.trim());
    }
}

/// Rewrite one newline-terminated line.
///
/// Pure apart from the returned state, so single lines can be checked
/// without a whole document.
pub fn step(ctx: &FileContext, mut state: FilterState, line: &str) -> (FilterState, String) {
    let mut current = Line {
        original: line,
        massaged: line.to_string(),
    };
    for (_name, rule) in RULES {
        rule(ctx, &mut state, &mut current);
    }
    state.finish_line(line);
    (state, current.massaged)
}

/// Drives [`step`] over the lines of one file and enforces the line count.
pub struct Prefilter {
    ctx: FileContext,
    state: FilterState,
    line_number: usize,
}

impl Prefilter {
    pub fn new(ctx: FileContext) -> Self {
        Self {
            ctx,
            state: FilterState::default(),
            line_number: 0,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Filter one line. `\r\n` is read as `\n`; a last line without a
    /// terminator comes back without one.
    pub fn process_line(&mut self, line: &str) -> Result<String> {
        self.line_number += 1;
        let (body, terminated) = match line.strip_suffix('\n') {
            Some(body) => (body.strip_suffix('\r').unwrap_or(body), true),
            None => (line, false),
        };
        let input = format!("{}\n", body);
        let (state, mut massaged) = step(&self.ctx, std::mem::take(&mut self.state), &input);
        self.state = state;

        if !terminated && massaged.ends_with('\n') {
            massaged.pop();
        }
        if massaged.matches('\n').count() != usize::from(terminated) {
            return Err(DoxprepError::LineCountMismatch {
                file: self.ctx.source.clone(),
                line_number: self.line_number,
                original: line.to_string(),
                massaged,
            });
        }
        tracing::trace!(line = self.line_number, state = ?self.state, "filtered");
        Ok(massaged)
    }

    /// Filter everything from `reader` into `writer`, returning the final state.
    ///
    /// Input bytes that are not valid UTF-8 are replaced, never rejected.
    pub fn run<R: BufRead, W: Write>(mut self, mut reader: R, writer: &mut W) -> Result<FilterState> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let massaged = self.process_line(&line)?;
            writer.write_all(massaged.as_bytes())?;
        }
        writer.flush()?;
        if self.state.in_fence {
            tracing::warn!(file = %self.ctx.source, "unterminated code fence at end of file");
        }
        Ok(self.state)
    }
}

/// Filter a whole document held in memory.
pub fn filter_str(ctx: FileContext, input: &str) -> Result<String> {
    let mut out = Vec::with_capacity(input.len());
    Prefilter::new(ctx).run(input.as_bytes(), &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readme() -> FileContext {
        FileContext::named("ReadMe", None)
    }

    fn change_log() -> FileContext {
        FileContext::from_path("ChangeLog.md", None)
    }

    fn one(ctx: &FileContext, line: &str) -> String {
        step(ctx, FilterState::default(), line).1
    }

    #[test]
    fn test_plain_lines_unchanged() {
        let input = "Some text.\n\n- a list item\n> a quote\n";
        assert_eq!(filter_str(readme(), input).unwrap(), input);
    }

    #[test]
    fn test_file_context_from_paths() {
        assert_eq!(FileContext::from_path("docs/ChangeLog.md", None).file_name, "ChangeLog");
        assert_eq!(
            FileContext::from_path("repo/examples/simple_logging/ReadMe.md", None).file_name,
            "example_simple_logging"
        );
        assert_eq!(
            FileContext::from_path(r"C:\repo\examples\menu\README.md", None).file_name,
            "example_menu"
        );
        assert_eq!(FileContext::from_path("docs/ReadMe.md", None).file_name, "ReadMe");
        assert_eq!(FileContext::from_path("NoExtension", None).file_name, "NoExtension");
    }

    #[test]
    fn test_header_gets_label() {
        assert_eq!(
            one(&readme(), "## Getting Started\n"),
            "## Getting Started  {#read_me_getting-started}\n"
        );
    }

    #[test]
    fn test_header_labelling_is_idempotent() {
        let once = one(&readme(), "# Sensor Setup\n");
        assert_eq!(one(&readme(), &once), once);
    }

    #[test]
    fn test_explicit_label_kept() {
        let ctx = FileContext::from_path("examples/Foo/ReadMe.md", None);
        assert_eq!(one(&ctx, "# Setup {#custom}\n"), "# Setup {#custom}\n");
    }

    #[test]
    fn test_hidden_label_unwrapped() {
        assert_eq!(
            one(&readme(), "## Power <!-- {#power_section} -->\n"),
            "## Power {#power_section}\n"
        );
    }

    #[test]
    fn test_named_anchor_becomes_label() {
        assert_eq!(
            one(&readme(), "## Wiring <a name=\"wiring\"></a>\n"),
            "## Wiring {#wiring}\n"
        );
    }

    #[test]
    fn test_comment_directive_unwrapped() {
        assert_eq!(
            one(&readme(), "[//]: # ( @tableofcontents )\n"),
            "@tableofcontents\n"
        );
        assert_eq!(
            one(&readme(), "Fix, thanks to @someone and courtesy of @other\n"),
            "Fix, thanks to \\@someone and courtesy of \\@other\n"
        );
    }

    #[test]
    fn test_sectioning_directive_hides_next_line() {
        let input = "[//]: # ( @section sensor_setup Sensor Setup )\n## Sensor Setup\ntext\n";
        let output = filter_str(readme(), input).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "@section sensor_setup Sensor Setup");
        assert_eq!(lines[1], "<!--## Sensor Setup  {#read_me_sensor-setup}-->");
        assert_eq!(lines[2], "text");
    }

    #[test]
    fn test_github_only_block_hidden() {
        let input = format!("{GITHUB_ONLY_START}\n[![badge](x.svg)](y)\n{GITHUB_ONLY_END}\nafter\n");
        let output = filter_str(readme(), &input).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|l| l.starts_with("<!--") && l.ends_with("-->")));
        assert_eq!(lines[1], "<!--[![badge](x.svg)](y)-->");
        assert_eq!(lines[3], "after");
    }

    #[test]
    fn test_change_log_headings() {
        let input = "# Changelog\n## [1.2.3] - Fixed something\n\n### Known Issues\n";
        let output = filter_str(change_log(), input).unwrap();
        assert_eq!(
            output,
            "# ChangeLog {#change_log}\n\
             @section change_log_1-2-3 [1.2.3] - Fixed something\n\
             GitHub Release: [1.2.3]\n\
             ### Known Issues  {#change_log_1-2-3_known__issues}\n"
        );
    }

    #[test]
    fn test_change_log_action_before_version() {
        assert_eq!(
            one(&change_log(), "### Added\n"),
            "### Added  {#change_log__added}\n"
        );
    }

    #[test]
    fn test_change_log_headers_not_labelled() {
        assert_eq!(one(&change_log(), "#### Details\n"), "#### Details\n");
    }

    #[test]
    fn test_internal_links_each_use_own_anchor() {
        assert_eq!(
            one(&readme(), "See [one](#first-part) and [two](#Second_Part).\n"),
            "See [one](@ref read_me_first-part) and [two](@ref read_me_secondpart).\n"
        );
    }

    #[test]
    fn test_pages_links_for_own_repo() {
        let ctx = FileContext::named("ReadMe", Some("ModularSensors".to_string()));
        assert_eq!(
            one(
                &ctx,
                "[base](https://envirodiy.github.io/ModularSensors/class_logger_base.html)\n"
            ),
            "[base](@ref LoggerBase)\n"
        );
        assert_eq!(
            one(
                &ctx,
                "[log](https://envirodiy.github.io/ModularSensors/change_log.html)\n"
            ),
            "[log](@ref change_log)\n"
        );
        let other = "[sdi](https://envirodiy.github.io/Arduino-SDI-12/class_s_d_i12.html)\n";
        assert_eq!(one(&ctx, other), other);
    }

    #[test]
    fn test_pages_links_untouched_without_repo() {
        let line = "[base](https://envirodiy.github.io/ModularSensors/class_logger_base.html)\n";
        assert_eq!(one(&readme(), line), line);
    }

    #[test]
    fn test_mermaid_fence() {
        let output = filter_str(readme(), "```mermaid\ngraph TD\n```\n").unwrap();
        assert_eq!(output, "<pre class=\"mermaid\">\ngraph TD\n</pre>\n");
    }

    #[test]
    fn test_code_fences() {
        let output = filter_str(readme(), "```cpp\nint x;\n```\n```\nplain\n```\n").unwrap();
        assert_eq!(
            output,
            "@code{cpp}\nint x;\n@endcode\n@code\nplain\n@endcode\n"
        );
    }

    #[test]
    fn test_balanced_fences_end_outside() {
        let mut out = Vec::new();
        let state = Prefilter::new(readme())
            .run("```ini\na=1\n```\n".as_bytes(), &mut out)
            .unwrap();
        assert!(!state.in_fence);
        assert_eq!(state.fence_language, "ini");
    }

    #[test]
    fn test_line_count_preserved() {
        let input = "# Title\n\n[//]: # ( @page p Title )\n# Title\n```\nx\n```\nlast";
        let output = filter_str(readme(), input).unwrap();
        assert_eq!(output.matches('\n').count(), input.matches('\n').count());
        assert!(!output.ends_with('\n'));
    }

    #[test]
    fn test_crlf_input() {
        assert_eq!(filter_str(readme(), "a\r\nb\r\n").unwrap(), "a\nb\n");
    }

    #[test]
    fn test_line_count_violation_is_fatal() {
        let mut filter = Prefilter::new(change_log());
        filter.process_line(&format!("{GITHUB_ONLY_START}\n")).unwrap();
        // a hidden release heading would carry its embedded newline into the comment
        let err = filter.process_line("## [1.0.0] x\n").unwrap_err();
        match err {
            DoxprepError::LineCountMismatch { line_number, .. } => assert_eq!(line_number, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unterminated_last_line_cannot_grow() {
        // the release line would add a line when the heading ends the file
        let err = filter_str(change_log(), "# Changelog\n## [1.0.0] - last").unwrap_err();
        match err {
            DoxprepError::LineCountMismatch { line_number, original, .. } => {
                assert_eq!(line_number, 2);
                assert_eq!(original, "## [1.0.0] - last");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
