//! Startup banner and URL display

use super::config::{AppConfig, is_all_interfaces};
use super::constants::APP_NAME;

/// Capture mode as shown to the operator
fn capture_mode(config: &AppConfig) -> &'static str {
    match (config.debug, config.capture.error_record) {
        (true, _) => "all events",
        (false, true) => "errors only",
        (false, false) => "off",
    }
}

/// Print the startup banner with URLs
pub fn print_banner(config: &AppConfig, data_dir: &str) {
    let host = config.server.host.as_str();
    let port = config.server.port;

    // Use localhost for display when binding to all interfaces
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };

    // Label width, padded for alignment
    const W: usize = 12;

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m \x1b[36mhttp://{}:{}/api/v1/entries\x1b[0m",
        "Entries:", display_host, port
    );
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Capture:",
        capture_mode(config)
    );
    if !config.capture.exclude.is_empty() {
        println!(
            "  \x1b[90m➜  {:<W$} {}\x1b[0m",
            "Excluded:",
            config.capture.exclude.join(", ")
        );
    }
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Data:", data_dir);
    println!();
}
