use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use fmt_patcher::diff::print_diff;
use fmt_patcher::discover::{discover_files, excludes_from_file, DEFAULT_IGNORE_FILE};
use fmt_patcher::gate;
use fmt_patcher::job::verify_executable;
use fmt_patcher::vcs::ChangeProvider;
use fmt_patcher::{
    ExecOptions, ExecReport, Executor, ExitStatus, FileJob, GitChanges, RunConfig, TerminalPrompt,
};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fmt-patcher")]
#[command(about = "Wraps an external formatter for standalone use, CI, or a git pre-commit hook", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the formatter executable
    #[arg(long, visible_alias = "executable", default_value = "clang-format", global = true)]
    exe: PathBuf,

    /// Comma separated list of file extensions to format
    #[arg(
        long,
        value_name = "EXT",
        default_value = "c,h,C,H,cpp,hpp,cc,hh,c++,h++,cxx,hxx",
        global = true
    )]
    extensions: String,

    /// Exclude paths matching the given glob pattern (repeatable)
    #[arg(long, value_name = "PATTERN", global = true)]
    exclude: Vec<String>,

    /// Show colored diff
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,

    /// Run N formatter jobs in parallel (0 = one per CPU)
    #[arg(short = 'j', value_name = "N", default_value_t = 0, global = true)]
    jobs: usize,

    /// Formatting style to apply (LLVM, Google, Chromium, Mozilla, WebKit, file)
    #[arg(long, global = true)]
    style: Option<String>,

    /// Kill a formatter invocation after this many seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60, global = true)]
    timeout: u64,

    /// Disable diff output; useful for the exit code
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on entire files
    Wholefiles {
        /// Run recursively over directories
        #[arg(short, long)]
        recursive: bool,

        /// Format files in place instead of printing differences
        #[arg(short, long)]
        in_place: bool,

        /// Just print the formatter invocations
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Files or directories to format
        #[arg(value_name = "file", required = true)]
        files: Vec<PathBuf>,
    },

    /// Review and patch the pending changes in a git repo
    Patch,

    /// Run as a git pre-commit hook over the staged changes
    Githook,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
    let color_stderr = use_color(cli.color, io::stderr().is_terminal());

    match run(cli) {
        Ok(status) => status.into(),
        Err(err) => {
            print_trouble(&err, color_stderr);
            ExitStatus::Trouble.into()
        }
    }
}

fn use_color(mode: ColorMode, is_tty: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => is_tty,
    }
}

fn print_trouble(err: &anyhow::Error, color: bool) {
    let tag = if color {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    };
    eprintln!("fmt-patcher: {tag} {err:#}");
}

fn run(cli: Cli) -> Result<ExitStatus> {
    let color_stdout = use_color(cli.color, io::stdout().is_terminal());
    let color_stderr = use_color(cli.color, io::stderr().is_terminal());

    let mut config = RunConfig::new(cli.exe);
    config.style = cli.style;
    config.extensions = cli
        .extensions
        .split(',')
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect();
    config.exclude_patterns = excludes_from_file(Path::new(DEFAULT_IGNORE_FILE));
    config.exclude_patterns.extend(cli.exclude);
    config.jobs = cli.jobs;
    config.timeout = Duration::from_secs(cli.timeout);

    verify_executable(&config).context("formatter executable is not usable")?;

    match cli.command {
        Commands::Wholefiles {
            recursive,
            in_place,
            dry_run,
            files,
        } => run_whole_files(
            &config,
            &files,
            recursive,
            ExecOptions { in_place, dry_run },
            cli.quiet,
            color_stdout,
            color_stderr,
        ),
        Commands::Patch => run_review(&config, false, color_stdout, color_stderr),
        Commands::Githook => run_review(&config, true, color_stdout, color_stderr),
    }
}

fn run_whole_files(
    config: &RunConfig,
    roots: &[PathBuf],
    recursive: bool,
    options: ExecOptions,
    quiet: bool,
    color_stdout: bool,
    color_stderr: bool,
) -> Result<ExitStatus> {
    let files = discover_files(roots, recursive, config)?;
    let jobs: Vec<FileJob> = files.into_iter().map(FileJob::whole_file).collect();

    let report = Executor::new(config).run(&jobs, options)?;
    report_failures(&report, color_stderr);
    if report.all_failed() {
        anyhow::bail!("all {} formatter jobs failed", report.job_count);
    }

    if !quiet {
        print_diff(&mut io::stdout().lock(), &report.patch_lines, color_stdout)?;
    }
    Ok(if report.can_patch() {
        ExitStatus::Diff
    } else {
        ExitStatus::Success
    })
}

fn run_review(
    config: &RunConfig,
    hook: bool,
    color_stdout: bool,
    color_stderr: bool,
) -> Result<ExitStatus> {
    let git = if hook {
        GitChanges::staged()
    } else {
        GitChanges::working_tree()
    };
    let excludes = config.exclude_set()?;
    let executor = Executor::new(config);

    // Newly introduced files are reformatted as a whole.
    let added_jobs: Vec<FileJob> = git
        .added_paths()?
        .into_iter()
        .filter(|path| config.selects(path, &excludes))
        .map(FileJob::whole_file)
        .collect();
    let whole = executor.run(&added_jobs, ExecOptions::default())?;

    // Modified files are reformatted only over their changed line ranges.
    let modified_jobs: Vec<FileJob> = git
        .modified_line_ranges()?
        .into_iter()
        .filter(|(path, _)| config.selects(path, &excludes))
        .map(|(path, ranges)| FileJob::line_ranges(path, ranges))
        .collect();
    let partial = executor.run(&modified_jobs, ExecOptions::default())?;

    report_failures(&whole, color_stderr);
    report_failures(&partial, color_stderr);
    let total = whole.job_count + partial.job_count;
    if total > 0 && whole.failures.len() + partial.failures.len() == total {
        anyhow::bail!("all {total} formatter jobs failed");
    }

    let mut out = io::stdout().lock();
    print_diff(&mut out, &whole.patch_lines, color_stdout)?;
    print_diff(&mut out, &partial.patch_lines, color_stdout)?;
    drop(out);

    let mut policy = if hook {
        TerminalPrompt::hook()
    } else {
        TerminalPrompt::standalone()
    };
    let restager: Option<&dyn ChangeProvider> = if hook { Some(&git) } else { None };
    let status = gate::review(
        &whole.patch_lines,
        &partial.patch_lines,
        &mut policy,
        restager,
    )?;
    Ok(status)
}

fn report_failures(report: &ExecReport, color: bool) {
    for failure in &report.failures {
        let tag = if color {
            "warning:".yellow().bold().to_string()
        } else {
            "warning:".to_string()
        };
        eprintln!("fmt-patcher: {tag} {}", failure.message);
    }
}
