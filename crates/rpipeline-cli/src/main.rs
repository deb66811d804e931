use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use rpipeline_eval::{
    ConditionErrorPolicy, Engine, EngineConfig, FunctionRegistry, ProcessResult, compile_rule,
};
use rpipeline_rules::{RuleCollection, parse_rule_path};

#[derive(Parser)]
#[command(name = "rpipeline")]
#[command(about = "Validate and run message transformation rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a rule file or directory and print the documents as JSON
    Parse {
        /// Path to a rule YAML file or a directory of rules
        path: PathBuf,

        /// Pretty-print JSON output
        #[arg(short, long, default_value_t = true)]
        pretty: bool,
    },

    /// Parse and compile rules, reporting every error found
    Validate {
        /// Path to a rule YAML file or a directory of rules
        path: PathBuf,

        /// List each error (not just the summary)
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the functions available to rules
    Functions,

    /// Run messages through rules
    ///
    /// Load rules from a file or directory, then process JSON messages.
    /// Messages can be provided as a single JSON string (--event) or as
    /// NDJSON (newline-delimited JSON) from stdin. One JSON result is
    /// printed per message.
    Eval {
        /// Path to a rule file or directory of rules
        #[arg(short, long)]
        rules: PathBuf,

        /// A single message as a JSON string (if omitted, reads NDJSON from stdin)
        #[arg(short, long)]
        event: Option<String>,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,

        /// Stop processing a message when a rule's condition fails to evaluate
        #[arg(long)]
        halt_on_condition_error: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { path, pretty } => cmd_parse(path, pretty),
        Commands::Validate { path, verbose } => cmd_validate(path, verbose),
        Commands::Functions => cmd_functions(),
        Commands::Eval {
            rules,
            event,
            pretty,
            halt_on_condition_error,
        } => cmd_eval(rules, event, pretty, halt_on_condition_error),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_parse(path: PathBuf, pretty: bool) {
    match parse_rule_path(&path) {
        Ok(collection) => {
            print_warnings(&collection.errors);
            print_json(&collection, pretty);
        }
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn cmd_validate(path: PathBuf, verbose: bool) {
    let collection = match parse_rule_path(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let registry = FunctionRegistry::builtin();
    let mut compile_errors = Vec::new();
    for doc in &collection.rules {
        if let Err(e) = compile_rule(doc, &registry) {
            compile_errors.push(format!("{}: {e}", doc.name()));
        }
    }

    let parse_errors = collection.errors.len();
    let compiled = collection.rules.len() - compile_errors.len();
    println!("Parsed {} rules from {}", collection.len(), path.display());
    println!("  Compiled OK:    {compiled}");
    println!("  Parse errors:   {parse_errors}");
    println!("  Compile errors: {}", compile_errors.len());

    if verbose && (parse_errors > 0 || !compile_errors.is_empty()) {
        println!("\nErrors:");
        for err in collection.errors.iter().chain(&compile_errors) {
            println!("  - {err}");
        }
    }

    if parse_errors > 0 || !compile_errors.is_empty() {
        process::exit(1);
    }
}

fn cmd_functions() {
    let registry = FunctionRegistry::builtin();
    for descriptor in registry.descriptors() {
        println!("{}", descriptor.signature());
    }
}

fn cmd_eval(rules_path: PathBuf, event_json: Option<String>, pretty: bool, halt: bool) {
    let collection = load_collection(&rules_path);

    let config = EngineConfig {
        condition_error_policy: if halt {
            ConditionErrorPolicy::Halt
        } else {
            ConditionErrorPolicy::Continue
        },
        ..Default::default()
    };
    let mut engine = Engine::new(config);
    if let Err(e) = engine.add_collection(&collection, &FunctionRegistry::builtin()) {
        eprintln!("Error compiling rules: {e}");
        process::exit(1);
    }

    eprintln!(
        "Loaded {} rules from {}",
        engine.rules().len(),
        rules_path.display()
    );

    if let Some(json_str) = event_json {
        let value: serde_json::Value = match serde_json::from_str(&json_str) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Invalid JSON event: {e}");
                process::exit(1);
            }
        };

        match engine.process_json(&value) {
            Ok(result) => {
                report_errors(&result);
                print_json(&result.to_json(), pretty);
            }
            Err(e) => {
                eprintln!("Invalid message: {e}");
                process::exit(1);
            }
        }
    } else {
        let stdin = io::stdin();
        let mut line_num = 0u64;
        let mut dropped = 0u64;
        let mut error_count = 0u64;

        for line in stdin.lock().lines() {
            line_num += 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("Error reading line {line_num}: {e}");
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("Invalid JSON on line {line_num}: {e}");
                    continue;
                }
            };

            let result = match engine.process_json(&value) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Invalid message on line {line_num}: {e}");
                    continue;
                }
            };

            if result.dropped {
                dropped += 1;
            }
            error_count += result.errors.len() as u64;
            report_errors(&result);
            print_json(&result.to_json(), pretty);
        }

        eprintln!("Processed {line_num} messages, {dropped} dropped, {error_count} evaluation errors.");
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_collection(path: &Path) -> RuleCollection {
    let collection = match parse_rule_path(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading rules from {}: {e}", path.display());
            process::exit(1);
        }
    };

    if !collection.errors.is_empty() {
        eprintln!(
            "Warning: {} parse errors while loading rules",
            collection.errors.len()
        );
    }

    collection
}

fn report_errors(result: &ProcessResult) {
    for err in &result.errors {
        log::warn!("Rule '{}' failed at {}: {}", err.rule, err.expression, err.error);
    }
}

fn print_warnings(errors: &[String]) {
    if !errors.is_empty() {
        eprintln!("Warnings:");
        for err in errors {
            eprintln!("  - {err}");
        }
    }
}

fn print_json(value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    }
}
