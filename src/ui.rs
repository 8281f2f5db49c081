use colored::Colorize;

use crate::role::HostRole;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// `10.0.0.1 (primary)`, uncolored
pub fn host_label(host: &str, role: HostRole) -> String {
    format!("{host} ({role})")
}

/// Print a host heading colored by role
pub fn host_section(host: &str, role: HostRole) {
    let label = host_label(host, role);
    println!();
    match role {
        HostRole::Primary => println!("{}", label.green().bold()),
        HostRole::Standby => println!("{}", label.cyan().bold()),
    }
}

/// Whether a secret is set, never its value
pub fn secret_state(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "set",
        _ => "not set",
    }
}

/// Print the pgpair banner
pub fn banner() {
    println!(
        "{}",
        r"
   ___  ___ ____  ___ _(_)___
  / _ \/ _ `/ _ \/ _ `/ / __/
 / .__/\_, / .__/\_,_/_/_/
/_/   /___/_/
"
        .cyan()
    );
}
