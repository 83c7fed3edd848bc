//! Offline doubles for [`CommandRunner`] and [`Fetcher`].

use crate::{CommandOutput, CommandRunner, Fetcher};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use wte_common::{Error, Result};

/// A [`CommandRunner`] that answers from a script and records every call.
///
/// Responses are keyed by the full command line (`"systemctl start gost"`).
/// Unscripted commands of a present program succeed with empty output;
/// commands of absent programs fail as if the binary was missing.
#[derive(Default)]
pub struct ScriptedRunner {
    present: HashSet<String>,
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_programs(mut self, programs: &[&str]) -> Self {
        self.present.extend(programs.iter().map(|p| p.to_string()));
        self
    }

    /// Script the exit code and stdout of one command line.
    pub fn respond(mut self, command_line: &str, status: i32, stdout: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            CommandOutput {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    /// Script a command line to exit with status 1.
    pub fn fail(self, command_line: &str) -> Self {
        self.respond(command_line, 1, "")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn was_called(&self, command_line: &str) -> bool {
        self.calls().iter().any(|c| c == command_line)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        if let Some(output) = self.responses.get(&line) {
            return Ok(output.clone());
        }
        if self.present.contains(program) {
            return Ok(CommandOutput {
                status: Some(0),
                ..Default::default()
            });
        }
        Err(Error::command(program, args, "No such file or directory"))
    }

    fn command_exists(&self, program: &str) -> bool {
        self.present.contains(program)
    }
}

/// A [`Fetcher`] serving fixed bodies by URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.with_bytes(url, body.as_bytes().to_vec())
    }

    pub fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lookup(&self, url: &str) -> Result<&Vec<u8>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        self.bodies.get(url).ok_or_else(|| Error::Download {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn get_text(&self, url: &str, _timeout: Duration) -> Result<String> {
        Ok(String::from_utf8_lossy(self.lookup(url)?).to_string())
    }

    async fn download(&self, url: &str, dest: &Path, _timeout: Duration) -> Result<u64> {
        let body = self.lookup(url)?;
        std::fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}
