//! JSON-line worker protocol.
//!
//! One JSON request per stdin line, one JSON response per stdout line:
//!
//! ```json
//! {"op": "eval", "code": "2 + 2"}
//! {"success": true, "result": "4"}
//! ```
//!
//! Supported ops: `eval`, `load` (parse without evaluating),
//! `list_words`, `inspect_word`, `reload` (reset the dictionary). NIL
//! results report success with no `result` field, matching the REPL's
//! print-nothing behavior.

use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};
use tracing::debug;

use impi_eval::show;
use impi_lex::{Loader, Value};
use impi_par::Parser;

use crate::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Eval,
    Load,
    ListWords,
    InspectWord,
    Reload,
}

#[derive(Debug, Deserialize)]
pub struct Request {
    pub op: Op,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub word: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(result: Option<String>) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Handle one request against the session.
pub async fn handle(session: &mut Session, request: Request) -> Response {
    debug!(op = ?request.op, "worker request");
    match request.op {
        Op::Eval => {
            let Some(code) = request.code else {
                return Response::fail("eval requires `code`");
            };
            match session.eval_source(&code).await {
                Ok(value) if value.is_nil() => Response::ok(None),
                Ok(value) => Response::ok(Some(show(&value))),
                Err(error) => Response::fail(error.to_string()),
            }
        }
        Op::Load => {
            let Some(code) = request.code else {
                return Response::fail("load requires `code`");
            };
            match Loader::load(&code) {
                Value::Err(message) => Response::fail(message),
                tree => Response::ok(Some(show(&Parser::new().parse(tree)))),
            }
        }
        Op::ListWords => {
            let mut names: Vec<&str> = session
                .evaluator()
                .words()
                .keys()
                .map(|name| name.as_str())
                .collect();
            names.sort_unstable();
            Response::ok(Some(names.join(" ")))
        }
        Op::InspectWord => {
            let Some(word) = request.word else {
                return Response::fail("inspect_word requires `word`");
            };
            match session.evaluator().lookup(&word) {
                Some(value) => Response::ok(Some(show(value))),
                None => Response::fail(format!("undefined word: {}", word)),
            }
        }
        Op::Reload => {
            session.reset();
            Response::ok(None)
        }
    }
}

/// Serve requests from stdin until end of input.
pub async fn run(session: &mut Session) -> anyhow::Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle(session, request).await,
            Err(error) => Response::fail(format!("invalid request: {}", error)),
        };
        println!("{}", serde_json::to_string(&response)?);
    }
    Ok(())
}
