//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     Gallery Downloader                                ║
║     Batch media downloads from gallery pages          ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(inputs: &[String], download_dir: &str, export_mode: bool) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Inputs: {}", inputs.join(", "));
    println!("  Directory: {}", download_dir);
    if export_mode {
        println!("  Mode: export URL list only");
    }
    println!();
}
