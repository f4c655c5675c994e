use std::fmt;
use std::time::Duration;

use console::Style;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use serde_json::Value;

use crate::dispatcher::AttemptRecord;
use crate::dispatcher::DispatchRequest;
use crate::relay::Relay;
use crate::session::Status;
use crate::viewer;

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error {
            write!(f, "{}", console::style(&self.message).red().bold())
        } else {
            write!(f, "{}", console::style(&self.message).blue())
        }
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match &self.error {
            None => console::style("✔").green().bold(),
            Some(_) => console::style("✘").red().bold(),
        };
        write!(f, "{mark} {} {}", self.attempt, console::style(&self.url).dim())?;

        if let Some(status) = self.status {
            write!(f, " -> {status}")?;
        }
        if let Some(error) = &self.error {
            write!(f, " {}", console::style(error).red())?;
        }
        Ok(())
    }
}

pub struct OutPutter {
    color: bool,
}

impl Default for OutPutter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutPutter {
    pub fn new() -> Self {
        Self {
            color: console::colors_enabled(),
        }
    }

    pub fn banner(&self, destination: &str, relay: Option<&Relay>) {
        let style = Style::new().bold().cyan();
        println!("{}", style.apply_to("JSON Editor & API Tool"));
        println!(
            "Destination: {}  (type `help` for commands)",
            console::style(destination).underlined()
        );
        match relay {
            Some(relay) => println!("Fallback relay: {}", console::style(relay.base()).dim()),
            None => println!("{}", console::style("Fallback relay disabled").dim()),
        }
    }

    pub fn status(&self, status: &Status) {
        println!("{status}");
    }

    pub fn document(&self, title: &str, value: &Value) {
        println!("{}", console::style(title).bold());
        println!("{}", viewer::render(value, self.color));
    }

    pub fn buffer(&self, text: &str) {
        println!("{}", console::style("Edit buffer").bold());
        if text.is_empty() {
            println!("{}", console::style("(empty)").dim());
        } else {
            println!("{text}");
        }
    }

    pub fn response(&self, text: &str) {
        println!("{}", console::style("Server Response").bold());
        println!("{text}");
    }

    pub fn attempts(&self, attempts: &[AttemptRecord]) {
        for attempt in attempts {
            println!("  {attempt}");
        }
    }

    pub fn line(&self, text: &str) {
        println!("{text}");
    }

    pub fn rejected(&self, text: &str) {
        println!("{}", console::style(text).yellow());
    }

    /// Full miette rendering for errors that point into user text.
    pub fn diagnostic(&self, report: miette::Report) {
        eprintln!("{report:?}");
    }

    pub fn help(&self) {
        let commands = [
            ("show", "print the current document"),
            ("buffer", "print the edit buffer"),
            ("edit", "replace the edit buffer, end input with a line containing only `.`"),
            ("load <path>", "replace the edit buffer with a file"),
            ("apply", "parse the buffer and make it the current document"),
            ("validate", "check the buffer without applying it"),
            ("clear", "empty the edit buffer"),
            ("reset", "restore the example document"),
            ("url [<url>]", "show or set the destination"),
            ("post | get | send", "send the current document"),
            ("response", "print the last response"),
            ("status", "print the status line"),
            ("quit", "leave"),
        ];

        for (command, description) in commands {
            println!(
                "  {:<18} {}",
                console::style(command).cyan(),
                console::style(description).dim()
            );
        }
    }

    /// Spinner on stderr for the duration of a request.
    pub fn spinner(&self, request: &DispatchRequest) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(format!(
            "Sending {} request to {}",
            request.method(),
            request.destination()
        ));
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}
