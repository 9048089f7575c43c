//! Solver adapter: runs the probabilistic solver and parses its answers.
//!
//! The solver reads a program on stdin. Answers show up in its output as
//! `placement(<terms>): <probability>` lines, mixed with whatever else the
//! solver prints, and each one becomes one candidate placement.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use fogmesh_core::{Assignment, Placement};

use crate::error::{PlacementError, PlacementResult};

static PLACEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"placement\((?P<terms>.*)\):\s*(?P<probability>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\b",
    )
        .expect("placement pattern is valid")
});

static ON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"on\(\s*(?P<service>\w+)\s*,\s*(?P<node>\w+)\s*\)").expect("on pattern is valid")
});

/// Something that can evaluate a solver program.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Run `program` and return the solver's combined output.
    async fn run(&self, program: String) -> PlacementResult<String>;
}

/// Runs the solver as a child process, feeding the program on stdin.
///
/// Arguments go straight into the process argument vector; no shell is
/// involved.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    executable: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessSolver {
    pub fn new(executable: PathBuf, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            executable,
            args,
            timeout,
        }
    }

    /// Resolve `executable` on `PATH` and fail if it cannot be found.
    pub fn locate(executable: &str, args: Vec<String>, timeout: Duration) -> PlacementResult<Self> {
        let path = which::which(executable).map_err(|e| {
            PlacementError::Configuration(format!("cannot find solver {executable}: {e}"))
        })?;
        debug!(solver = %path.display(), "solver located");
        Ok(Self::new(path, args, timeout))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

#[async_trait]
impl Solver for ProcessSolver {
    async fn run(&self, program: String) -> PlacementResult<String> {
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlacementError::SolverLaunch {
                executable: self.executable.display().to_string(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlacementError::SolverIo(io::Error::other("solver stdin not captured")))?;

        // stdin is fed while stdout drains.
        let writer = tokio::spawn(async move {
            stdin.write_all(program.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PlacementError::SolverTimeout(self.timeout))?
            .map_err(PlacementError::SolverIo)?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!("solver closed stdin before the whole program was written");
            }
            Ok(Err(e)) => return Err(PlacementError::SolverIo(e)),
            Err(e) => return Err(PlacementError::SolverIo(io::Error::other(e))),
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(PlacementError::SolverFailed {
                status: output.status.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }
}

/// Join the fact blocks with the directive that loads `rules` and the
/// placement query.
pub fn build_program(app_facts: &str, infra_facts: &str, rules: &Path) -> String {
    let rules = rules
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!(
        "{app_facts}\n{infra_facts}\n\n:- consult('{rules}').\nquery(placement(Chain, Placement, Routes)).\n"
    )
}

/// Build the program and run it through `solver`.
pub async fn invoke(
    solver: &dyn Solver,
    app_facts: &str,
    infra_facts: &str,
    rules: &Path,
) -> PlacementResult<String> {
    let program = build_program(app_facts, infra_facts, rules);
    debug!(bytes = program.len(), rules = %rules.display(), "invoking solver");
    solver.run(program).await
}

/// Extract every candidate placement from raw solver output.
///
/// Assignments keep the solver's tokens in `service_id` / `node_id`;
/// `node_name` is left empty.
pub fn parse_placements(output: &str) -> PlacementResult<Vec<Placement>> {
    let mut placements = Vec::new();

    for caps in PLACEMENT_RE.captures_iter(output) {
        let raw = &caps["probability"];
        let probability = raw
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or_else(|| PlacementError::InvalidProbability(raw.to_string()))?;

        let assignments = ON_RE
            .captures_iter(&caps["terms"])
            .map(|on| Assignment {
                service_id: on["service"].to_string(),
                node_id: on["node"].to_string(),
                node_name: String::new(),
            })
            .collect();

        placements.push(Placement {
            probability,
            assignments,
        });
    }

    Ok(placements)
}

/// True when the solver reported no usable answer.
///
/// Both "nothing matched" and a single zero-probability answer mean the
/// problem is infeasible.
pub fn is_infeasible(candidates: &[Placement]) -> bool {
    match candidates {
        [] => true,
        [only] => only.probability == 0.0,
        _ => false,
    }
}
