//! Line-oriented REPL front end.
//!
//! Terminal niceties (editing, completion, highlighting) are the
//! host's business; this loop only reads lines, feeds the session, and
//! prints results. Non-NIL results print in `show` form, failures as a
//! single `Error: <message>` line, and NIL prints nothing. When stdin
//! is not a terminal (piped input), prompts and history are skipped.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use tracing::debug;

use impi_eval::show;

use crate::Session;

/// Where input history is persisted: a newline-delimited file under
/// the user data directory.
pub fn default_history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("impi").join("history"))
}

/// Run the REPL until end of input.
pub async fn run(session: &mut Session, history_path: Option<PathBuf>) -> anyhow::Result<()> {
    let interactive = io::stdin().is_terminal();
    let mut history = if interactive {
        history_path.and_then(|path| open_history(&path))
    } else {
        None
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            let prompt = if session.ready() { "imp> " } else { "...> " };
            print!("{}", prompt);
            io::stdout().flush()?;
        }

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        if let Some(history) = history.as_mut() {
            let _ = writeln!(history, "{}", line);
        }

        match session.feed_line(&line).await {
            None => continue,
            Some(Ok(value)) => {
                if !value.is_nil() {
                    println!("{}", show(&value));
                }
            }
            Some(Err(error)) => println!("Error: {}", error),
        }
    }
    Ok(())
}

fn open_history(path: &PathBuf) -> Option<fs::File> {
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            debug!(path = %path.display(), "history directory unavailable");
            return None;
        }
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}
