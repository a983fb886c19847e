//! Startup banner

use super::constants::APP_NAME;

/// Print the startup banner with the listen address and data directory
pub fn print_banner(host: &str, port: u16, data_dir: &str, api_key_configured: bool) {
    let display_host = if host == "0.0.0.0" || host == "::" {
        "localhost"
    } else {
        host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<10}\x1b[0m http://{}:{}/api",
        "API:", display_host, port
    );
    println!("  \x1b[90m➜\x1b[0m  {:<11} {}", "Data:", data_dir);
    if !api_key_configured {
        println!(
            "  \x1b[33m➜\x1b[0m  OPENROUTER_API_KEY is not set; streaming requests will fail"
        );
    }
    println!();
}
