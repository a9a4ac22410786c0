use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::runner::RunBuilder;
use crate::stack;
use crate::tb::Tb;
use crate::{retry, want};

#[derive(Parser)]
#[command(name = "fake-tb")]
#[command(about = "Run functions against a fake test context and inspect the outcome", long_about = None)]
pub struct Cli {
    /// Test name reported by the context (overrides FAKE_TB_NAME)
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Initial stack capture depth (overrides FAKE_TB_STACK_DEPTH)
    #[arg(long, global = true)]
    pub stack_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a built-in scenario and print its result
    Demo {
        scenario: Scenario,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that stack captures resolve to source locations
    Doctor,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Scenario {
    Pass,
    Fail,
    Skip,
    Fatal,
    Panic,
    Cleanup,
    Helper,
    Retry,
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::try_parse_from(args)?;
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    let mut builder = RunBuilder::from_env()?;
    if let Some(name) = cli.name {
        builder = builder.name(name);
    }
    if let Some(depth) = cli.stack_depth {
        builder = builder.stack_depth(depth);
    }

    match cli.command {
        Commands::Demo { scenario, json } => {
            let res = builder.run(|t| run_scenario(t, scenario));

            if json {
                println!("{}", serde_json::to_string_pretty(&res.report())?);
                return Ok(());
            }

            println!("Run: {}", res.run_id());
            println!("Name: {}", res.name());
            println!("Outcome: {}", res.outcome());
            if let Some(recovered) = res.recovered() {
                println!("Recovered: {}", recovered);
            }
            let helpers = res.helpers();
            if !helpers.is_empty() {
                println!("Helpers:");
                for helper in helpers {
                    println!("  {}", helper);
                }
            }
            if !res.logs().is_empty() {
                println!("\nLogs:");
                for line in res.logs() {
                    println!("  {}", line);
                }
            }
        }

        Commands::Doctor => {
            let frames = stack::capture_frames(stack::DEFAULT_DEPTH);
            let resolved = stack::symbolize(&frames);
            let Some(first) = resolved.first() else {
                bail!("stack capture returned no frames");
            };
            let Some(file) = &first.file else {
                bail!(
                    "frames captured ({}) but no source locations resolved; build with debug info",
                    frames.len()
                );
            };
            println!("Frames: {}", frames.len());
            println!("Caller: {}", first.function);
            println!("Location: {}:{}", file.display(), first.line.unwrap_or(0));
            println!("Symbolization OK");
        }
    }

    Ok(())
}

/* ===================== Scenarios ===================== */

fn check_positive(t: &dyn Tb, n: i64) {
    t.helper();
    if n <= 0 {
        t.errorf(format_args!("expected positive number, got {n}"));
    }
}

fn run_scenario(t: &dyn Tb, scenario: Scenario) {
    match scenario {
        Scenario::Pass => t.log("all good"),
        Scenario::Fail => {
            t.error("something went wrong");
            t.log("still running");
        }
        Scenario::Skip => t.skip("not supported here"),
        Scenario::Fatal => {
            t.fatal("cannot continue");
        }
        Scenario::Panic => panic!("boom"),
        Scenario::Cleanup => {
            t.cleanup(Box::new(|t| t.log("cleanup 1")));
            t.cleanup(Box::new(|t| {
                t.log("cleanup 2");
                t.cleanup(Box::new(|t| t.log("cleanup 2, nested")));
            }));
            t.log("body done");
        }
        Scenario::Helper => check_positive(t, -1),
        Scenario::Retry => {
            let attempts = std::sync::atomic::AtomicUsize::new(0);
            retry::n(t, 3, |t| {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                want::equal(t, "attempt", n, 3);
            });
        }
    }
}
