//! Operator I/O — stdin command parsing and the console annotator.
//!
//! The session loop never blocks on input: lines typed at the terminal
//! are parsed here and forwarded through the command channel, to be
//! drained by the controller between frames.

use rollcall_core::session::{FrameAnnotator, FrameOutcome, SessionCommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Read operator commands from stdin and forward them to the session.
pub async fn read_commands(tx: mpsc::Sender<SessionCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                eprintln!("unrecognized command: {:?} (try 'save <name>' or 'quit')", line.trim());
            }
            continue;
        };
        let quit = command == SessionCommand::Quit;
        if tx.send(command).await.is_err() || quit {
            break;
        }
    }
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if matches!(line, "q" | "quit" | "exit") {
        return Some(SessionCommand::Quit);
    }
    let name = line
        .strip_prefix("save ")
        .or_else(|| line.strip_prefix("s "))?
        .trim();
    (!name.is_empty()).then(|| SessionCommand::Enroll {
        name: name.to_string(),
    })
}

/// Console stand-in for on-frame drawing: prints outcome transitions with
/// the running present count. Repeated identical outcomes are collapsed
/// so a steady state does not flood the terminal at frame rate.
#[derive(Default)]
pub struct ConsoleAnnotator {
    last: Option<FrameOutcome>,
}

impl ConsoleAnnotator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAnnotator for ConsoleAnnotator {
    fn annotate(&mut self, outcome: &FrameOutcome, present: usize) {
        if self.last.as_ref() == Some(outcome) {
            return;
        }
        println!("{}", format_outcome(outcome, present));
        self.last = Some(outcome.clone());
    }
}

fn format_outcome(outcome: &FrameOutcome, present: usize) -> String {
    match outcome {
        FrameOutcome::Scanning => format!("[present: {present}] scanning..."),
        FrameOutcome::Matched { name, distance } => {
            format!("[present: {present}] {name} present (distance {distance:.4})")
        }
        FrameOutcome::Unknown => {
            format!("[present: {present}] unknown face; type 'save <name>' to enroll")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quit_variants() {
        assert_eq!(parse_command("q"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("quit"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("  exit  "), Some(SessionCommand::Quit));
    }

    #[test]
    fn test_parse_save() {
        assert_eq!(
            parse_command("save Alice"),
            Some(SessionCommand::Enroll {
                name: "Alice".to_string()
            })
        );
        assert_eq!(
            parse_command("s bob"),
            Some(SessionCommand::Enroll {
                name: "bob".to_string()
            })
        );
    }

    #[test]
    fn test_parse_save_without_name() {
        assert_eq!(parse_command("save "), None);
        assert_eq!(parse_command("save"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_format_outcomes() {
        assert_eq!(
            format_outcome(&FrameOutcome::Scanning, 2),
            "[present: 2] scanning..."
        );
        let matched = FrameOutcome::Matched {
            name: "bob".to_string(),
            distance: 0.1234,
        };
        assert_eq!(
            format_outcome(&matched, 3),
            "[present: 3] bob present (distance 0.1234)"
        );
    }
}
