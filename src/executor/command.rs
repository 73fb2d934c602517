// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command string composition.

/// Join `commands` into one fail-fast shell command.
///
/// With `sudo`, every individual command is prefixed with `sudo ` before
/// joining, so a chain never silently drops privileges halfway through.
pub fn join_commands<S: AsRef<str>>(commands: &[S], sudo: bool) -> String {
    commands
        .iter()
        .map(|command| {
            if sudo {
                format!("sudo {}", command.as_ref())
            } else {
                command.as_ref().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Quote `value` for a POSIX shell.
///
/// Values made only of safe characters are returned unchanged. Everything
/// else is wrapped in single quotes, with embedded single quotes written as
/// `'\''`.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '=' | '@' | '+' | ','));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_single_command() {
        assert_eq!(join_commands(&["apt-get update"], false), "apt-get update");
        assert_eq!(join_commands(&["apt-get update"], true), "sudo apt-get update");
    }

    #[test]
    fn test_join_prefixes_every_command_with_sudo() {
        let commands = vec!["apt-get update".to_string(), "apt-get -y upgrade".to_string()];
        assert_eq!(
            join_commands(&commands, true),
            "sudo apt-get update && sudo apt-get -y upgrade"
        );
        assert_eq!(
            join_commands(&commands, false),
            "apt-get update && apt-get -y upgrade"
        );
    }

    #[test]
    fn test_join_empty_list() {
        let empty: [&str; 0] = [];
        assert_eq!(join_commands(&empty, true), "");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/etc/hosts"), "/etc/hosts");
        assert_eq!(shell_quote("my file"), "'my file'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
    }
}
