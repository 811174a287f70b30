//! CLI command definitions for docforge.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use crate::agent::Agent;
use crate::display::{self, ToolEvent};
use crate::prompt::{default_prompt, load_prompt};
use crate::result::{AgentFindings, CheckResult};
use crate::runtime::{resolve_runtime, ContainerRuntime};

/// Test whether a codebase's getting-started documentation is accurate and
/// easy to follow.
#[derive(Parser)]
#[command(name = "docforge")]
#[command(about = "Check that a project's getting-started docs actually work")]
#[command(version)]
#[command(
    long_about = "docforge points an autonomous agent at a project's getting-started \
documentation and has it follow the instructions end to end inside an isolated \
container, reporting a pass/fail verdict with actionable detail.\n\nExample usage:\n  \
docforge check .\n  docforge check docs/INSTALL.md --verbose"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the documentation check against a project.
    Check(CheckArgs),

    /// Container-side entrypoint (not for interactive use).
    ///
    /// Runs the agent and speaks the wire protocol: JSON tool events on
    /// stderr, one terminal findings JSON line on stdout.
    #[command(hide = true)]
    Agent(AgentArgs),
}

/// Arguments for `docforge check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Path to the getting-started documentation file, or '.' to let the
    /// agent find it.
    #[arg(default_value = ".")]
    pub target: String,

    /// Run the agent directly on the host instead of in a container.
    #[arg(long)]
    pub no_container: bool,

    /// Echo raw worker output and malformed event lines.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a custom prompt template file.
    #[arg(long)]
    pub prompt: Option<PathBuf>,

    /// Wall-clock timeout in seconds (container runs only). Disables live
    /// event streaming: output is collected and classified after exit.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the hidden `docforge agent` entrypoint.
#[derive(Parser, Debug)]
pub struct AgentArgs {
    /// Rendered instruction text.
    #[arg(long)]
    pub prompt: String,

    /// Target path, relative to the mounted workspace.
    #[arg(long, default_value = ".")]
    pub target: String,
}

/// Parses CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Executes the parsed CLI command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Check(args) => run_check(args).await,
        Commands::Agent(args) => run_agent(args).await,
    }
}

async fn run_check(args: CheckArgs) -> anyhow::Result<ExitCode> {
    if !Path::new(&args.target).exists() {
        anyhow::bail!("path '{}' does not exist", args.target);
    }

    let prompt = match &args.prompt {
        Some(path) => load_prompt(path)?,
        None => default_prompt(),
    };
    let rendered = prompt.render(&args.target)?;

    let result = match args.timeout {
        Some(secs) if !args.no_container => {
            let runtime = ContainerRuntime::new(args.verbose)?;
            runtime
                .run_collected(&rendered, &args.target, Duration::from_secs(secs))
                .await?
        }
        _ => {
            let runtime = resolve_runtime(args.no_container, args.verbose)?;
            let mut on_event = |event: &ToolEvent| display::print_tool_event(event);
            runtime.run(&rendered, &args.target, &mut on_event).await?
        }
    };

    println!("{}", render_summary(&result));

    Ok(if result.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs the agent inside the container and speaks the wire protocol.
///
/// Contractually always emits a terminal findings JSON line on stdout, even
/// when the agent errored internally — [`Agent::run`] already folds every
/// failure into a `passed=false` findings.
async fn run_agent(args: AgentArgs) -> anyhow::Result<ExitCode> {
    let agent = Agent::with_cli();

    let mut on_event = |event: &ToolEvent| {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    };

    let result = agent.run(&args.prompt, &mut on_event).await;
    let findings = AgentFindings {
        passed: result.passed,
        details: result.details,
        steps: result.steps,
        verification_command: result.verification_command,
    };

    let line = serde_json::to_string(&findings).unwrap_or_else(|_| {
        r#"{"passed": false, "details": "Failed to encode findings."}"#.to_string()
    });
    println!("{line}");

    Ok(ExitCode::SUCCESS)
}

/// Renders the end-of-run summary block.
fn render_summary(result: &CheckResult) -> String {
    let status = if result.passed { "PASSED" } else { "FAILED" };
    let mut out = format!("docforge: {status}\n\n{}", result.details.trim());

    if let Some(command) = &result.verification_command {
        out.push_str(&format!("\n\nVerified with: {command}"));
    }

    out.push_str(&format!(
        "\n\n{}",
        result.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_defaults_to_current_directory() {
        let cli = Cli::parse_from(["docforge", "check"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.target, ".");
                assert!(!args.no_container);
                assert!(!args.verbose);
            }
            _ => panic!("expected check subcommand"),
        }
    }

    #[test]
    fn agent_entrypoint_parses_wire_contract_args() {
        let cli = Cli::parse_from([
            "docforge", "agent", "--prompt", "follow the docs", "--target", "README.md",
        ]);
        match cli.command {
            Commands::Agent(args) => {
                assert_eq!(args.prompt, "follow the docs");
                assert_eq!(args.target, "README.md");
            }
            _ => panic!("expected agent subcommand"),
        }
    }

    #[test]
    fn agent_target_defaults_to_dot() {
        let cli = Cli::parse_from(["docforge", "agent", "--prompt", "p"]);
        match cli.command {
            Commands::Agent(args) => assert_eq!(args.target, "."),
            _ => panic!("expected agent subcommand"),
        }
    }

    #[test]
    fn summary_includes_status_details_and_verification() {
        let result = CheckResult::new(
            Vec::new(),
            AgentFindings {
                passed: false,
                details: "The pip install step is outdated.".to_string(),
                steps: Vec::new(),
                verification_command: Some("python -c 'import pkg'".to_string()),
            },
        );

        let summary = render_summary(&result);
        assert!(summary.contains("FAILED"));
        assert!(summary.contains("pip install step is outdated"));
        assert!(summary.contains("Verified with: python -c 'import pkg'"));
    }

    #[test]
    fn summary_shows_passed_status() {
        let result = CheckResult::new(Vec::new(), AgentFindings::success("All good"));
        assert!(render_summary(&result).contains("docforge: PASSED"));
    }
}
