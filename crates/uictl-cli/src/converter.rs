use std::io::{self, Read};
use std::path::Path;

use uictl_core::command::{Command, CommandLog, CommandResult};

/// Converts command logs into shell scripts that replay them with `uictl`.
///
/// Accepts either the JSON array printed by `uictl -f json log` or one
/// [`CommandLog`] per line.
pub struct LogConverter;

impl LogConverter {
    pub fn convert_file(path: &Path) -> Result<String, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::convert_str(&content)
    }

    pub fn convert_stdin() -> Result<String, io::Error> {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        Self::convert_str(&content)
    }

    fn convert_str(content: &str) -> Result<String, io::Error> {
        let entries = Self::parse(content)?;

        let mut lines = vec![
            "#!/usr/bin/env bash".to_string(),
            "set -euo pipefail".to_string(),
            String::new(),
        ];
        for entry in &entries {
            let cmd = Self::command_line(&entry.command);
            match &entry.result {
                CommandResult::Success => lines.push(cmd),
                // Replaying a failure would abort the script under `set -e`.
                CommandResult::Failure { code, .. } => {
                    lines.push(format!("# failed ({}): {}", code, cmd))
                }
            }
        }

        Ok(lines.join("\n") + "\n")
    }

    fn parse(content: &str) -> Result<Vec<CommandLog>, io::Error> {
        let invalid = |e: serde_json::Error| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Invalid command log: {}", e))
        };
        if content.trim_start().starts_with('[') {
            return serde_json::from_str(content).map_err(invalid);
        }
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(invalid))
            .collect()
    }

    /// Renders one command as a `uictl` invocation. Option values are joined
    /// with `=` and positionals follow `--`, so values starting with `-` are
    /// never read as flags.
    fn command_line(command: &Command) -> String {
        let mut options: Vec<String> = Vec::new();
        let (subcommand, positionals) = match command {
            Command::ShowShortToast { message } => ("toast", vec![value_text(message)]),
            Command::ShowLongToast { message } => {
                options.push("--long".to_string());
                ("toast", vec![value_text(message)])
            }
            Command::ShowDialog { title, message, positive_label } => {
                push_option(&mut options, "--title", title.as_deref());
                push_option(&mut options, "--positive-label", positive_label.as_deref());
                ("dialog", vec![message.clone()])
            }
            Command::ShowNotification { tag, title, message, important } => {
                if *important {
                    options.push("--important".to_string());
                }
                ("notify", vec![tag.clone(), title.clone(), message.clone()])
            }
            Command::CancelNotification { tag } => ("cancel-notification", vec![tag.clone()]),
            Command::FindAndClickViewByText { text, scope } => {
                push_option(&mut options, "--scope", scope.as_deref());
                ("click-text", vec![text.clone()])
            }
            Command::FindAndClickViewById { id, scope } => {
                push_option(&mut options, "--scope", scope.as_deref());
                ("click-id", vec![id.clone()])
            }
            Command::ClickDelay { x, y, delay_millis } => (
                "click-delay",
                vec![x.to_string(), y.to_string(), delay_millis.to_string()],
            ),
        };

        let mut parts = vec!["uictl".to_string(), subcommand.to_string()];
        parts.extend(options);
        parts.push("--".to_string());
        parts.extend(positionals.iter().map(|p| shell_escape(p)));
        parts.join(" ")
    }
}

fn push_option(options: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(v) = value {
        options.push(format!("{}={}", flag, shell_escape(v)));
    }
}

/// Toast payloads are displayed as their text; other JSON values verbatim.
fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shell-escape a string using single quotes. Internal single quotes become `'\''`.
fn shell_escape(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
