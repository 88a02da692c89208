//! Output formatting for the CLI
//!
//! Server tables and the coloured status lines used by every command.

use std::collections::HashMap;

use tabled::{settings::Style, Table, Tabled};

use sb_core::{GroupDescriptor, ServerDescriptor};

/// Format servers as a table.
///
/// Each entry carries its index in the full server list, which is what
/// `connect <index>` accepts. With `groups` the table gains a group column.
pub fn format_servers(servers: &[(usize, &ServerDescriptor)], groups: Option<&[GroupDescriptor]>) -> String {
    if servers.is_empty() {
        return "No servers found.".to_string();
    }

    #[derive(Tabled)]
    struct ServerRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Hostname")]
        ip: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    #[derive(Tabled)]
    struct ServerRowDetailed {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Hostname")]
        ip: String,
        #[tabled(rename = "Port")]
        port: u16,
        #[tabled(rename = "Login")]
        login: String,
        #[tabled(rename = "Group")]
        group: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    match groups {
        Some(groups) => {
            let names: HashMap<&str, &str> = groups
                .iter()
                .map(|g| (g.id.as_str(), g.name.as_str()))
                .collect();
            let rows: Vec<ServerRowDetailed> = servers
                .iter()
                .map(|(index, s)| ServerRowDetailed {
                    index: *index,
                    id: truncate(&s.id, 24),
                    name: s.name.clone(),
                    ip: s.ip.clone(),
                    port: s.port,
                    login: s.login_name.clone(),
                    group: s
                        .group
                        .as_deref()
                        .map(|id| names.get(id).copied().unwrap_or(id).to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    status: s.display_status().to_string(),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        None => {
            let rows: Vec<ServerRow> = servers
                .iter()
                .map(|(index, s)| ServerRow {
                    index: *index,
                    id: truncate(&s.id, 24),
                    name: s.name.clone(),
                    ip: s.ip.clone(),
                    status: s.display_status().to_string(),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a dimmed progress line
pub fn print_step(msg: &str) {
    use crossterm::style::{Attribute, Print, SetAttribute};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetAttribute(Attribute::Dim),
        Print(msg),
        SetAttribute(Attribute::Reset),
        Print("\n")
    );
}
