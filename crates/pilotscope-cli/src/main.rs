//! PilotScope CLI: inspect directives, unparse plan fixtures, replay hooks.

use clap::{Parser, Subcommand};
use pilotscope_core::config::PilotConfig;
use pilotscope_exec::{
    parse_directive, Abort, Estimator, HttpTransport, MemoryTransport, ParsedDirective,
    PilotScope, QueryDesc, Transport,
};
use pilotscope_planner::{parse_yaml_fixture, PlanFixture, ProbeTarget};
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pilotscope")]
#[command(about = "PilotScope anchor runtime: directive inspection and plan replay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the directive of a query file and show what it asks for
    Inspect {
        /// Path to a file holding the annotated query
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Print the probe query for a YAML plan fixture
    Unparse {
        /// Path to the plan fixture YAML file
        #[arg(short, long)]
        plan: PathBuf,
    },

    /// Run the full hook sequence for a query against a plan fixture
    Replay {
        /// Path to a file holding the annotated query
        #[arg(short, long)]
        query: PathBuf,

        /// Path to the plan fixture YAML file
        #[arg(short, long)]
        plan: PathBuf,

        /// Deliver the result over HTTP instead of printing it
        #[arg(long)]
        send: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    debug!(version = pilotscope_core::VERSION, "pilotscope cli");

    let cli = Cli::parse();
    let cfg = PilotConfig::from_env();
    if let Err(e) = cfg.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Inspect { query } => inspect(&query, &cfg),
        Commands::Unparse { plan } => unparse(&plan),
        Commands::Replay { query, plan, send } => {
            if send {
                HttpTransport::new(&cfg)
                    .map_err(Into::into)
                    .and_then(|http| replay(&query, &plan, PilotScope::new(cfg.clone(), http)))
            } else {
                replay(&query, &plan, PilotScope::new(cfg.clone(), MemoryTransport::new()))
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn inspect(query_path: &PathBuf, cfg: &PilotConfig) -> Result<(), Box<dyn std::error::Error>> {
    let query = fs::read_to_string(query_path)?;
    match parse_directive(&query, cfg)? {
        None => println!("No pilotscope directive; the query runs untouched."),
        Some(parsed) => {
            for line in describe(&parsed) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn describe(parsed: &ParsedDirective) -> Vec<String> {
    let mut lines = vec!["Directive".to_string(), "=========".to_string()];
    lines.push(format!("Anchors ({} pending):", parsed.anchors.enabled_count()));
    for anchor in parsed.anchors.iter() {
        lines.push(format!("  - {} (name: {})", anchor.kind, anchor.name));
    }
    for kind in &parsed.reserved {
        lines.push(format!("  - {kind} (reserved, ignored)"));
    }
    lines.push(match &parsed.endpoint {
        Some(endpoint) => format!("Destination: {endpoint}"),
        None => "Destination: none (result not sent)".to_string(),
    });
    lines.push(format!("Terminate after reporting: {}", parsed.enable_terminate));
    if let Some(tid) = &parsed.tid {
        lines.push(format!("Tid: {tid}"));
    }
    lines.push(format!("Query: {}", parsed.sql));
    lines
}

fn unparse(plan_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = fs::read_to_string(plan_path)?;
    let fixture = parse_yaml_fixture(&yaml)?;
    println!("{}", fixture.probe()?);
    Ok(())
}

/// Stand-in for the host planner: size every relation of the fixture the
/// way a join search would, members first.
fn plan_fixture(estimator: &mut Estimator<'_>, fixture: &PlanFixture) -> String {
    match &fixture.target {
        ProbeTarget::Base(rel) => {
            let rows = estimator.base_rel_rows(&fixture.catalog, *rel, fixture.default_rows);
            format!("Scan {rel} rows={rows:.0}")
        }
        ProbeTarget::Join(join) => {
            let mut plan = Vec::new();
            for rel in join.relids.iter() {
                let rows = estimator.base_rel_rows(&fixture.catalog, rel, fixture.default_rows);
                plan.push(format!("Scan {rel} rows={rows:.0}"));
            }
            let rows = estimator.join_rel_rows(&fixture.catalog, join, fixture.default_rows);
            plan.insert(0, format!("Join rows={rows:.0}"));
            plan.join("\n  ")
        }
    }
}

fn replay<T: Transport>(
    query_path: &PathBuf,
    plan_path: &PathBuf,
    mut scope: PilotScope<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = fs::read_to_string(query_path)?;
    let fixture = parse_yaml_fixture(&fs::read_to_string(plan_path)?)?;

    match scope.planner_hook(&query, |est| plan_fixture(est, &fixture)) {
        Ok(plan) => {
            println!("Plan:\n  {plan}");
            let mut desc = QueryDesc::new();
            scope.executor_start(&mut desc);
            if let Some(instr) = desc.instrument.as_mut() {
                instr.start();
                instr.stop();
            }
            if let Err(abort) = scope.executor_end(&mut desc) {
                println!("Aborted: {abort}");
            }
        }
        Err(abort @ Abort::Terminated(_)) => println!("Aborted: {abort}"),
        Err(abort) => return Err(abort.into()),
    }

    if scope.is_active() {
        println!("Still pending: {} anchor(s)", scope.pending());
    }
    match scope.take_report() {
        Some(report) => {
            println!("Delivery: {:?}", report.delivery);
            println!("{}", serde_json::to_string_pretty(&report.record)?);
        }
        None => println!("No result record produced."),
    }
    Ok(())
}
