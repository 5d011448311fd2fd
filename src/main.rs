//! TaskModel CLI Entry Point
//!
//! Runs a demonstration pipeline built from composite tasks against an
//! input mapping loaded from disk.
//!
//! # Usage
//!
//! ```bash
//! # Run the demo pipeline on a YAML input
//! taskmodel input.yaml
//!
//! # Print the subtask timeline after the run
//! taskmodel input.yaml --timeline
//!
//! # Emit the full result as JSON only
//! taskmodel input.json --json
//! ```
//!
//! # Pipeline
//!
//! ```text
//! outer
//! ├── inner
//! │   ├── add_task        a + b
//! │   └── multiply_task   x * y      (x <- add_task.result)
//! ├── final_add           a + b      (a <- inner.multiply_task.result)
//! └── label               prefix + value (value <- final_add.result)
//! ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};

use taskmodel::execution::{CompositeTask, WiringError};
use taskmodel::monitoring::{ExecutionObserver, ExecutionTimeline, LogObserver, TaskEvent};
use taskmodel::task::{load_input, Task, TaskResult};
use taskmodel::tasks::{AddTask, FormatTask, MultiplyTask};
use taskmodel::{APP_NAME, VERSION};

/// Default input file used when none is specified.
const DEFAULT_INPUT: &str = "input.yaml";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    input_path: String,
    timeline: bool,
    json: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: DEFAULT_INPUT.to_string(),
            timeline: false,
            json: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Composable Task Pipelines");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: taskmodel [OPTIONS] <INPUT_FILE>");
    println!();
    println!("Arguments:");
    println!("  <INPUT_FILE>   Flat YAML or JSON mapping (default: {})", DEFAULT_INPUT);
    println!();
    println!("Options:");
    println!("  --timeline     Print the subtask timeline after the run");
    println!("  --json         Print the full result as JSON only");
    println!("  --verbose      Enable debug logging");
    println!("  --help         Show this help message");
    println!("  --version      Show version information");
    println!();
    println!("Input keys:");
    println!("  inner.add_task.a, inner.add_task.b, inner.multiply_task.y,");
    println!("  final_add.b, label.prefix (optional)");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_seen = false;

    // Skip program name
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--timeline" => config.timeline = true,
            "--json" => config.json = true,
            "--verbose" | "-v" => config.verbose = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if positional_seen {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.input_path = arg.clone();
                positional_seen = true;
            }
        }
    }

    Ok(config)
}

/// Builds the demonstration pipeline.
fn build_pipeline(observer: Arc<dyn ExecutionObserver>) -> Result<CompositeTask, WiringError> {
    let mut inner = CompositeTask::new("inner", "Add then multiply").with_observer(observer.clone());
    inner.add_subtask(AddTask::new("add_task"));
    inner.add_subtask(MultiplyTask::new("multiply_task"));
    inner.connect("add_task", "result", "multiply_task", "x")?;

    let mut outer = CompositeTask::new("outer", "Demo pipeline").with_observer(observer);
    outer.add_subtask(inner);
    outer.add_subtask(AddTask::new("final_add"));
    outer.add_subtask(FormatTask::new("label"));
    outer.connect("inner", "multiply_task.result", "final_add", "a")?;
    outer.connect("final_add", "result", "label", "value")?;

    Ok(outer)
}

/// Fans events out to the log and, when requested, to a timeline.
struct Observers {
    log: LogObserver,
    timeline: Option<Arc<ExecutionTimeline>>,
}

impl ExecutionObserver for Observers {
    fn on_event(&self, event: &TaskEvent) {
        self.log.on_event(event);
        if let Some(timeline) = &self.timeline {
            timeline.on_event(event);
        }
    }
}

fn print_result(result: &TaskResult) -> Result<(), serde_json::Error> {
    if result.is_success() {
        println!("{} Pipeline completed", "✓".green());
    } else {
        println!(
            "{} Pipeline failed: {}",
            "✗".red(),
            result.error().unwrap_or_default()
        );
    }

    if !result.data().is_empty() {
        println!();
        println!("{}", "Output:".cyan().bold());
        println!("{}", serde_json::to_string_pretty(result.data())?);
    }

    Ok(())
}

/// Main application logic; returns whether the pipeline succeeded.
async fn run() -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    if !config.json {
        print_banner();
    }

    info!("Loading input: {}", config.input_path);
    let input = load_input(&config.input_path).map_err(|e| {
        error!("Failed to load input: {}", e);
        format!("Could not load input from '{}': {}", config.input_path, e)
    })?;
    info!("Input loaded: {} keys", input.len());

    let timeline = config.timeline.then(|| Arc::new(ExecutionTimeline::new()));
    let pipeline = build_pipeline(Arc::new(Observers {
        log: LogObserver,
        timeline: timeline.clone(),
    }))?;

    let result = pipeline.execute(input).await?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result)?;
    }

    if let Some(timeline) = timeline {
        println!("{}", timeline.gantt_chart());
    }

    Ok(result.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
