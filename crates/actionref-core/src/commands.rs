//! Workflow commands echoed from `run:` scripts.
//!
//! ```text
//! ::set-output name=result,other=x::the value
//!   └─command─┘ └──properties───┘  └─data──┘
//! ```
//!
//! `set-output`, `save-state`, `set-env` and `add-path` have been replaced by
//! environment files and are reported as deprecated.

use serde::Serialize;
use std::collections::BTreeMap;

pub const COMMAND_MARKER: &str = "::";

const OUTPUT_CHANGELOG: &str = "https://github.blog/changelog/2022-10-11-github-actions-deprecating-save-state-and-set-output-commands/";
const ENV_CHANGELOG: &str = "https://github.blog/changelog/2020-10-01-github-actions-deprecating-set-env-and-add-path-commands/";

// ---------------------------------------------------------------------------
// WorkflowCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowCommand {
    /// Lowercased command name.
    pub command: String,
    /// Lowercased keys. Pairs with an empty key or value are dropped.
    pub properties: BTreeMap<String, String>,
    pub data: Option<String>,
}

impl WorkflowCommand {
    /// `None` unless `message` starts with `::` and has a closing `::`.
    pub fn try_parse(message: &str) -> Option<Self> {
        let msg = message.trim().strip_prefix(COMMAND_MARKER)?;
        let (info, data) = msg.split_once(COMMAND_MARKER)?;

        let (name, props) = match info.split_once(' ') {
            Some((name, props)) => (name, Some(props)),
            None => (info, None),
        };

        let mut properties = BTreeMap::new();
        for pair in props.map(str::trim).unwrap_or_default().split(',') {
            let mut parts = pair.split('=');
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let key = key.trim();
            if !key.is_empty() && !value.is_empty() {
                properties.insert(key.to_lowercase(), value.to_string());
            }
        }

        let data = data.trim();
        Some(Self {
            command: name.to_lowercase(),
            properties,
            data: (!data.is_empty()).then(|| data.to_string()),
        })
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Changelog announcing the deprecation, for deprecated commands.
    pub fn deprecation_url(&self) -> Option<&'static str> {
        match self.command.as_str() {
            "save-state" | "set-output" => Some(OUTPUT_CHANGELOG),
            "set-env" | "add-path" => Some(ENV_CHANGELOG),
            _ => None,
        }
    }

    /// Environment file that replaces a deprecated command.
    pub fn replacement(&self) -> Option<&'static str> {
        match self.command.as_str() {
            "save-state" => Some("GITHUB_STATE"),
            "set-output" => Some("GITHUB_OUTPUT"),
            "set-env" => Some("GITHUB_ENV"),
            "add-path" => Some("GITHUB_PATH"),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ShellType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellType {
    Cmd,
    Bash,
    PowerShell,
    PowerShellCore,
    Python,
    Custom,
}

impl ShellType {
    /// Value of a step's `shell:` key.
    pub fn from_shell(shell: &str) -> Self {
        match shell {
            "cmd" => ShellType::Cmd,
            "sh" | "bash" => ShellType::Bash,
            "powershell" => ShellType::PowerShell,
            "pwsh" => ShellType::PowerShellCore,
            "python" => ShellType::Python,
            _ => ShellType::Custom,
        }
    }

    /// Default shell of a hosted runner label.
    pub fn from_runner(runs_on: &str) -> Option<Self> {
        if runs_on.starts_with("windows-") {
            Some(ShellType::PowerShellCore)
        } else if runs_on.starts_with("ubuntu-") || runs_on.starts_with("macos-") {
            Some(ShellType::Bash)
        } else {
            None
        }
    }

    /// The step's explicit shell, else the runner's default, else bash.
    pub fn guess(shell: Option<&str>, runs_on: Option<&str>) -> Self {
        match shell {
            Some(shell) => Self::from_shell(shell),
            None => runs_on
                .and_then(Self::from_runner)
                .unwrap_or(ShellType::Bash),
        }
    }

    fn is_powershell(self) -> bool {
        matches!(self, ShellType::PowerShell | ShellType::PowerShellCore)
    }

    /// Shells whose `echo` lines can be read without interpreting the script.
    pub fn is_supported(self) -> bool {
        matches!(self, ShellType::Cmd | ShellType::Bash) || self.is_powershell()
    }
}

// ---------------------------------------------------------------------------
// Scanning run scripts
// ---------------------------------------------------------------------------

/// A deprecated command found in a `run:` script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename = "deprecated_command")]
pub struct DeprecatedCommand {
    /// 1-based line within the script.
    pub line: usize,
    pub text: String,
    pub command: WorkflowCommand,
    pub url: &'static str,
}

impl DeprecatedCommand {
    pub fn message(&self) -> String {
        match self.command.replacement() {
            Some(file) => format!(
                "the '{}' command is deprecated, write to ${file} instead ({})",
                self.command.command, self.url
            ),
            None => format!("the '{}' command is deprecated ({})", self.command.command, self.url),
        }
    }
}

/// Every line of `script` that echoes a deprecated workflow command. Blank
/// lines and `#` comments are skipped; unsupported shells yield nothing.
pub fn find_deprecated_commands(script: &str, shell: ShellType) -> Vec<DeprecatedCommand> {
    if !shell.is_supported() {
        return Vec::new();
    }
    script
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                return None;
            }
            let command = WorkflowCommand::try_parse(read_echo(text, shell)?)?;
            let url = command.deprecation_url()?;
            Some(DeprecatedCommand {
                line: index + 1,
                text: text.to_string(),
                command,
                url,
            })
        })
        .collect()
}

/// The text printed by a plain `echo` (or `Write-Output`) line. Escapes and
/// other shell features are not interpreted.
fn read_echo(line: &str, shell: ShellType) -> Option<&str> {
    if let Some(text) = line.strip_prefix("echo ") {
        let text = text.trim();
        // cmd echoes its argument verbatim; quotes are still stripped in
        // case the wrong shell is in use.
        if shell == ShellType::Cmd {
            return Some(unquote(text, '"').unwrap_or(text));
        }
        return unquote(text, '"').or_else(|| unquote(text, '\''));
    }
    if shell.is_powershell() {
        if let Some(text) = line.strip_prefix("Write-Output ") {
            let text = text.trim();
            return unquote(text, '"').or_else(|| unquote(text, '\''));
        }
    }
    None
}

fn unquote(text: &str, quote: char) -> Option<&str> {
    text.strip_prefix(quote)?.strip_suffix(quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_properties_and_data() {
        let command = WorkflowCommand::try_parse(
            "::workflow-command parameter1={data},parameter2={data}::{command value}",
        )
        .unwrap();
        assert_eq!(command.command, "workflow-command");
        assert_eq!(command.property("parameter1"), Some("{data}"));
        assert_eq!(command.property("parameter2"), Some("{data}"));
        assert_eq!(command.data.as_deref(), Some("{command value}"));
    }

    #[test]
    fn names_and_keys_are_case_insensitive() {
        let command = WorkflowCommand::try_parse("  ::Set-Output NAME=Result::  42  ").unwrap();
        assert_eq!(command.command, "set-output");
        assert_eq!(command.property("name"), Some("Result"));
        assert_eq!(command.property("Name"), Some("Result"));
        assert_eq!(command.data.as_deref(), Some("42"));
    }

    #[test]
    fn drops_empty_pairs_and_data() {
        let command = WorkflowCommand::try_parse("::debug a=,=b,noequals,c=d::").unwrap();
        assert_eq!(command.properties.len(), 1);
        assert_eq!(command.property("c"), Some("d"));
        assert_eq!(command.data, None);
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(WorkflowCommand::try_parse("set-output name=x::y"), None);
        assert_eq!(WorkflowCommand::try_parse("::set-output name=x"), None);
        assert_eq!(WorkflowCommand::try_parse(":: "), None);
    }

    #[test]
    fn deprecation_urls() {
        let output = WorkflowCommand::try_parse("::save-state name=a::b").unwrap();
        assert_eq!(output.deprecation_url(), Some(OUTPUT_CHANGELOG));
        assert_eq!(output.replacement(), Some("GITHUB_STATE"));
        let path = WorkflowCommand::try_parse("::add-path::/opt/bin").unwrap();
        assert_eq!(path.deprecation_url(), Some(ENV_CHANGELOG));
        let warning = WorkflowCommand::try_parse("::warning::careful").unwrap();
        assert_eq!(warning.deprecation_url(), None);
    }

    #[test]
    fn shell_guessing() {
        assert_eq!(ShellType::guess(Some("pwsh"), Some("ubuntu-latest")), ShellType::PowerShellCore);
        assert_eq!(ShellType::guess(None, Some("windows-2022")), ShellType::PowerShellCore);
        assert_eq!(ShellType::guess(None, Some("macos-14")), ShellType::Bash);
        assert_eq!(ShellType::guess(None, Some("self-hosted")), ShellType::Bash);
        assert_eq!(ShellType::guess(Some("fish {0}"), None), ShellType::Custom);
    }

    #[test]
    fn finds_deprecated_echo_lines() {
        let script = "\
# echo \"::set-output name=skip::me\"
echo \"::set-output name=version::1.2\"

echo '::save-state name=pid::42'
echo \"::warning::not deprecated\"
echo ::set-env name=A::b
echo \"::add-path::/opt/tool\"
";
        let found = find_deprecated_commands(script, ShellType::Bash);
        let lines: Vec<_> = found.iter().map(|d| (d.line, d.command.command.as_str())).collect();
        assert_eq!(lines, [(2, "set-output"), (4, "save-state"), (7, "add-path")]);
        assert_eq!(found[0].command.property("name"), Some("version"));
        assert!(found[0].message().contains("$GITHUB_OUTPUT"));
    }

    #[test]
    fn cmd_echo_needs_no_quotes() {
        let found = find_deprecated_commands("echo ::set-env name=A::b", ShellType::Cmd);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, ENV_CHANGELOG);
    }

    #[test]
    fn powershell_write_output() {
        let script = "Write-Output \"::set-output name=x::y\"";
        assert_eq!(find_deprecated_commands(script, ShellType::PowerShellCore).len(), 1);
        assert!(find_deprecated_commands(script, ShellType::Bash).is_empty());
    }

    #[test]
    fn unsupported_shells_are_skipped() {
        let script = "echo \"::set-output name=x::y\"";
        assert!(find_deprecated_commands(script, ShellType::Python).is_empty());
        assert!(find_deprecated_commands(script, ShellType::Custom).is_empty());
    }
}
