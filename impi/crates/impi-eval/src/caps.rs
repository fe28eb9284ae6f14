//! I/O capabilities.
//!
//! The evaluator never touches stdin/stdout or the filesystem
//! directly: the `rd`/`wr`/`e?`/`rm`/`rln`/`echo` words go through the
//! traits below, which hosts swap out for their own providers (a REPL
//! bridges to the terminal, a browser runtime to fetch/OPFS, tests to
//! in-memory scripts). Every method is async so that a suspending host
//! can park the evaluation mid-program; the default native providers
//! complete immediately.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use async_trait::async_trait;

use impi_util::FxHashMap;

/// Line input capability (`rln`).
#[async_trait(?Send)]
pub trait InputProvider {
    /// Read one line, without its trailing newline. `None` is end of
    /// input.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Line output capability (`echo`).
#[async_trait(?Send)]
pub trait OutputProvider {
    async fn write_line(&mut self, text: &str) -> io::Result<()>;
}

/// File capability (`rd`, `wr`, `e?`, `rm`), keyed on native paths.
#[async_trait(?Send)]
pub trait FileAccess {
    async fn read(&self, path: &str) -> io::Result<String>;
    async fn write(&self, path: &str, contents: &str) -> io::Result<()>;
    async fn exists(&self, path: &str) -> io::Result<bool>;
    async fn remove(&self, path: &str) -> io::Result<()>;
}

/// Translate a `%`-path to a native one.
///
/// On Windows, `%/d/path` means `d:/path`; everywhere else the text is
/// used as-is.
pub fn native_path(path: &str) -> String {
    #[cfg(windows)]
    {
        let bytes = path.as_bytes();
        if bytes.len() >= 3
            && bytes[0] == b'/'
            && bytes[1].is_ascii_alphabetic()
            && bytes[2] == b'/'
        {
            return format!("{}:{}", path[1..2].to_string(), &path[2..]);
        }
    }
    path.to_string()
}

/// Default input: blocking reads from stdin.
#[derive(Default)]
pub struct StdInput;

#[async_trait(?Send)]
impl InputProvider for StdInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Default output: lines to stdout.
#[derive(Default)]
pub struct StdOutput;

#[async_trait(?Send)]
impl OutputProvider for StdOutput {
    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Default file capability backed by the local filesystem.
///
/// URLs are not fetched here; a networked host installs its own
/// provider.
#[derive(Default)]
pub struct NativeFiles;

fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[async_trait(?Send)]
impl FileAccess for NativeFiles {
    async fn read(&self, path: &str) -> io::Result<String> {
        if is_url(path) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "url access requires a host-provided file capability",
            ));
        }
        std::fs::read_to_string(path)
    }

    async fn write(&self, path: &str, contents: &str) -> io::Result<()> {
        if is_url(path) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "url access requires a host-provided file capability",
            ));
        }
        std::fs::write(path, contents)
    }

    async fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(std::path::Path::new(path).exists())
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Scripted input for tests and batch hosts: pops pre-loaded lines.
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait(?Send)]
impl InputProvider for ScriptedInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Capturing output: shares its line buffer with the host.
pub struct BufferOutput {
    lines: Rc<RefCell<Vec<String>>>,
}

impl BufferOutput {
    pub fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
        let lines = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                lines: Rc::clone(&lines),
            },
            lines,
        )
    }
}

#[async_trait(?Send)]
impl OutputProvider for BufferOutput {
    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.lines.borrow_mut().push(text.to_string());
        Ok(())
    }
}

/// In-memory file capability for tests.
pub struct MemFiles {
    files: Rc<RefCell<FxHashMap<String, String>>>,
}

impl MemFiles {
    pub fn new() -> (Self, Rc<RefCell<FxHashMap<String, String>>>) {
        let files = Rc::new(RefCell::new(FxHashMap::default()));
        (
            Self {
                files: Rc::clone(&files),
            },
            files,
        )
    }
}

#[async_trait(?Send)]
impl FileAccess for MemFiles {
    async fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path)))
    }

    async fn write(&self, path: &str, contents: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .insert(path.to_string(), contents.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.files.borrow().contains_key(path))
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_path_passthrough_on_unix() {
        #[cfg(not(windows))]
        assert_eq!(native_path("/tmp/file.imp"), "/tmp/file.imp");
    }

    #[tokio::test]
    async fn test_scripted_input_drains() {
        let mut input = ScriptedInput::new(["one", "two"]);
        assert_eq!(input.read_line().await.unwrap(), Some("one".to_string()));
        assert_eq!(input.read_line().await.unwrap(), Some("two".to_string()));
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_buffer_output_shares_lines() {
        let (mut output, lines) = BufferOutput::new();
        output.write_line("hello").await.unwrap();
        assert_eq!(*lines.borrow(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_mem_files_round_trip() {
        let (files, _handle) = MemFiles::new();
        files.write("a.imp", "echo 1").await.unwrap();
        assert!(files.exists("a.imp").await.unwrap());
        assert_eq!(files.read("a.imp").await.unwrap(), "echo 1");
        files.remove("a.imp").await.unwrap();
        assert!(!files.exists("a.imp").await.unwrap());
    }
}
