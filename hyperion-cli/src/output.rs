// Output formatting helpers for CLI commands

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a dim/muted message
pub fn dim(message: &str) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

/// Print a dim success message
pub fn dim_success(message: &str) {
    eprintln!("\x1b[32m{}\x1b[0m", message);
}

/// Print a dim failure message
pub fn dim_failure(message: &str) {
    eprintln!("\x1b[31m{}\x1b[0m", message);
}

/// Print a task group header
pub fn group_header(title: &str, work_items: usize, parallel: bool) {
    let mode = if parallel { "parallel" } else { "sequential" };
    eprintln!(
        "\x1b[1;34m  Group\x1b[0m '{}' ({} items, {})",
        title, work_items, mode
    );
}

/// Print a multi-line reader error block as is
pub fn block(text: &str) {
    eprint!("{}", text);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_every_helper_is_documented() {
        let source = include_str!("output.rs");
        let lines: Vec<&str> = source.lines().collect();
        for (index, line) in lines.iter().enumerate() {
            if line.starts_with("pub fn ") {
                assert!(
                    index > 0 && lines[index - 1].starts_with("///"),
                    "undocumented helper: {}",
                    line
                );
            }
        }
    }
}
