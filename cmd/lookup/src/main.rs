//! Print the call path recorded for business codes.
//!
//! ```bash
//! lookup --registry error_codes.json 138040042 223040042
//! lookup --list
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use bizcode::{ErrorCode, Registry};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Look up business error codes in a registry file
#[derive(Parser, Debug)]
#[command(name = "lookup")]
#[command(version)]
#[command(about = "Print the first-seen trace for business error codes")]
struct Args {
    /// Registry JSON file
    #[arg(short, long, env = "BIZCODE_REGISTRY_FILE", default_value = bizcode::defaults::REGISTRY_FILE)]
    registry: PathBuf,

    /// List every known code
    #[arg(short, long)]
    list: bool,

    /// Codes, or full `#status:code#message` strings
    codes: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let registry = match Registry::load(&args.registry) {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.list {
        for code in registry.codes() {
            println!("{}", code);
        }
    }

    let mut missing = 0;
    for arg in &args.codes {
        let code = ErrorCode::parse_msg(arg)
            .map(|e| e.code().to_string())
            .unwrap_or_else(|| arg.trim().to_string());
        match registry.lookup(&code) {
            Some(trace) => {
                println!("{}", code);
                for node in &trace {
                    let site = if node.file.is_empty() {
                        format!("line {}", node.line)
                    } else {
                        node.file.clone()
                    };
                    println!(
                        "    {}  {}::{}  {}  {}",
                        node.code, node.package, node.function, site, node.message
                    );
                }
            }
            None => {
                println!("{}  (not recorded)", code);
                missing += 1;
            }
        }
    }

    if missing > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
