use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Starts external programs: autostart entries and `spawn` bindings.
pub trait Launcher {
    fn launch(&mut self, command: &str);
}

/// Spawns each command detached in its own session. Children are reaped by
/// ignoring `SIGCHLD`, see [`ignore_child_exits`].
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&mut self, command: &str) {
        let parts = split_command(command);
        let Some((program, args)) = parts.split_first() else {
            warn!("refusing to launch an empty command");
            return;
        };

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => debug!(command, pid = child.id(), "launched"),
            Err(err) => warn!(command, %err, "failed to launch"),
        }
    }
}

/// Makes the kernel reap exited children so launched programs never linger
/// as zombies.
pub fn ignore_child_exits() -> nix::Result<()> {
    use nix::sys::signal::{SigHandler, Signal, signal};
    // SAFETY: installs the default-ignore disposition, no handler code runs.
    unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) }.map(|_| ())
}

/// Splits a command line on whitespace, honouring single and double quotes
/// and backslash escapes inside quotes.
pub fn split_command(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(ch) = chars.next() {
        match (ch, quote) {
            ('\'' | '"', None) => quote = Some(ch),
            (c, Some(q)) if c == q => quote = None,
            ('\\', Some(_)) => match chars.next() {
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            (' ' | '\t', None) => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            (c, _) => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn splits_plain_words() {
        assert_eq!(split_command("  xterm  -e htop "), vec!["xterm", "-e", "htop"]);
    }

    #[test]
    fn keeps_quoted_arguments_together() {
        assert_eq!(
            split_command(r#"sh -c "echo 'hi there'" 'a b'"#),
            vec!["sh", "-c", "echo 'hi there'", "a b"]
        );
    }

    #[test]
    fn handles_escapes_inside_quotes() {
        assert_eq!(split_command(r#"printf "a\"b\n""#), vec!["printf", "a\"b\n"]);
    }

    #[test]
    fn empty_command_has_no_parts() {
        assert!(split_command("   ").is_empty());
    }
}
