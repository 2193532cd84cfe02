//! Basic bizcode example
//!
//! Produces codes from a few failing call paths, records them in the
//! registry file, and prints the wire form of each.
//!
//! # Environment Variables
//!
//! - `BIZCODE_REGISTRY_FILE` - Registry path (default `error_codes.json`)
//! - `RUST_LOG=debug` - Show registry worker events

use std::fs;
use std::time::Duration;

use bizcode::{Formatter, FormatterConfig, ResultExt, StatusTable};
use tracing::info;
use tracing_subscriber::EnvFilter;

// RUST_LOG=debug cargo run -p bizcode-basic
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    println!("=== bizcode Basic Example ===\n");

    let config = FormatterConfig::from_env().include(["basic::"]);
    let (formatter, worker) = Formatter::standard(&config)?;
    let formatter = formatter.with_status_policy(
        StatusTable::new()
            .with_package("basic::users", 404)
            .with_function("basic::orders::place", 409),
    );

    let errors = vec![
        users::find(&formatter, 7),
        users::find(&formatter, 8),
        orders::place(&formatter),
        orders::load_config(&formatter),
        formatter.from_message_with_code("quota exceeded", 429, 1001),
    ];

    for err in &errors {
        println!("{}", err);
        for node in err.trace_info().iter().skip(1) {
            println!("    at {}::{} line {}", node.package, node.function, node.line);
        }
    }

    // Same call site, same code.
    assert_eq!(errors[0].code(), errors[1].code());

    // A serialized code crossing a boundary parses back unchanged.
    let echoed = formatter.from_message(&errors[2].to_string());
    assert_eq!(echoed.code(), errors[2].code());

    if let Some(worker) = worker {
        worker.flush(Duration::from_secs(2));
        info!(
            recorded = worker.recorded(),
            dropped = worker.dropped(),
            "registry updated"
        );
        let path = worker.registry().path().map(|p| p.display().to_string());
        worker.stop();
        if let Some(path) = path {
            println!("\nRegistry written to {}", path);
        }
    }

    println!("\n=== Done ===");
    Ok(())
}

mod users {
    use bizcode::{ErrorCode, Formatter};

    #[inline(never)]
    pub fn find(formatter: &Formatter, id: u32) -> ErrorCode {
        lookup(formatter, id)
    }

    #[inline(never)]
    fn lookup(formatter: &Formatter, id: u32) -> ErrorCode {
        formatter.from_message(&format!("user {} not found", id))
    }
}

mod orders {
    use super::*;
    use bizcode::ErrorCode;

    #[inline(never)]
    pub fn place(formatter: &Formatter) -> ErrorCode {
        formatter.from_message("order already placed")
    }

    #[inline(never)]
    pub fn load_config(formatter: &Formatter) -> ErrorCode {
        match fs::read_to_string("/nonexistent/orders.toml").traced() {
            Ok(_) => formatter.from_message("unexpected config"),
            Err(e) => formatter.from_error(e),
        }
    }
}
