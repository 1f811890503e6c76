//! Script Supervisor - runs scripts from the scripts directory
//!
//! Features:
//! - Filename validation with canonical-path containment
//! - One detached worker task per run; `run` never waits on the process
//! - Separate, byte-capped stdout/stderr capture
//! - Hard wall-clock ceiling, then process-group kill
//! - Bounded history of finished runs
//!
//! The live map, the history ring and the set of issued run ids share one
//! mutex; every state transition happens under it.

use super::capture::OutputCapture;
use super::process;
use super::record::{RunId, RunTicket, ScriptInfo, ScriptRun};
use super::validate::{self, ResolvedScript};
use crate::state::ScriptRunState;
use chrono::{DateTime, Utc};
use hub_foundation::{Error, Result, ScriptSettings};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to wait for pipe readers after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// Run table
// ============================================================================

/// Live record plus the token of its worker, held until the worker finishes
struct LiveRun {
    record: ScriptRun,
    worker: Option<CancellationToken>,
}

#[derive(Default)]
struct RunTable {
    live: HashMap<RunId, LiveRun>,
    history: VecDeque<ScriptRun>,
    issued: HashSet<RunId>,
}

impl RunTable {
    /// Fresh id, never handed out before in this process
    fn allocate_id(&mut self) -> RunId {
        loop {
            let id = RunId::generate();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    fn push_history(&mut self, run: ScriptRun, capacity: usize) {
        self.history.push_back(run);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    fn is_running(&self, filename: &str) -> bool {
        self.live
            .values()
            .any(|r| r.record.is_running() && r.record.filename == filename)
    }
}

// ============================================================================
// Outcome of one process execution
// ============================================================================

#[derive(Debug)]
struct RunOutcome {
    state: ScriptRunState,
    return_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl RunOutcome {
    fn fault(message: String) -> Self {
        Self {
            state: ScriptRunState::Error,
            return_code: None,
            stdout: String::new(),
            stderr: message,
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Supervisor for script runs
pub struct ScriptSupervisor {
    root: PathBuf,
    settings: Arc<ScriptSettings>,
    table: Arc<Mutex<RunTable>>,
}

impl ScriptSupervisor {
    /// Create the supervisor, creating the scripts directory if needed
    pub fn new(settings: ScriptSettings) -> Result<Self> {
        std::fs::create_dir_all(&settings.dir)?;
        let root = std::fs::canonicalize(&settings.dir)?;
        debug!("Scripts directory: {}", root.display());

        Ok(Self {
            root,
            settings: Arc::new(settings),
            table: Arc::new(Mutex::new(RunTable::default())),
        })
    }

    /// Canonical scripts directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    /// Start `filename` and return immediately
    pub async fn run(&self, filename: &str) -> Result<RunTicket> {
        let script = validate::resolve(filename, &self.root, &self.settings).await?;

        let stop = CancellationToken::new();
        let record = {
            let mut table = self.table.lock().await;
            let id = table.allocate_id();
            let record = ScriptRun::started(id.clone(), &script.filename);
            table.live.insert(
                id,
                LiveRun {
                    record: record.clone(),
                    worker: Some(stop.clone()),
                },
            );
            record
        };

        info!("Script run {} started: {}", record.id, script.filename);

        tokio::spawn(supervise(
            self.table.clone(),
            self.settings.clone(),
            self.root.clone(),
            record.id.clone(),
            script,
            stop,
        ));

        Ok(record.ticket())
    }

    /// Live record for `run_id`. Records dropped by `clear_finished` are
    /// only reachable through `history`.
    pub async fn status(&self, run_id: &RunId) -> Result<ScriptRun> {
        let table = self.table.lock().await;
        table
            .live
            .get(run_id)
            .map(|r| r.record.clone())
            .ok_or_else(|| Error::NotFound(format!("Script run not found: {}", run_id)))
    }

    /// Request termination. Does not wait for the process to exit.
    pub async fn stop(&self, run_id: &RunId) -> Result<ScriptRun> {
        let mut table = self.table.lock().await;
        let run = table
            .live
            .get_mut(run_id)
            .ok_or_else(|| Error::NotFound(format!("Script run not found: {}", run_id)))?;

        if run.record.is_running() {
            if let Some(worker) = &run.worker {
                worker.cancel();
            }
            run.record.status = ScriptRunState::Stopped;
            run.record.finished_at = Some(Utc::now());
            run.record.pid = None;
            info!("Script run {} stopped", run_id);
        }

        Ok(run.record.clone())
    }

    /// Records still in `running`
    pub async fn list_running(&self) -> Vec<ScriptRun> {
        let table = self.table.lock().await;
        let mut running: Vec<ScriptRun> = table
            .live
            .values()
            .filter(|r| r.record.is_running())
            .map(|r| r.record.clone())
            .collect();
        running.sort_by_key(|r| r.started_at);
        running
    }

    /// Finished runs, oldest first
    pub async fn history(&self) -> Vec<ScriptRun> {
        let table = self.table.lock().await;
        table.history.iter().cloned().collect()
    }

    /// Drop finished records from the live map; returns how many were removed.
    ///
    /// A stopped run stays until its worker has recorded the final output.
    pub async fn clear_finished(&self) -> usize {
        let mut table = self.table.lock().await;
        let before = table.live.len();
        table
            .live
            .retain(|_, r| r.record.is_running() || r.worker.is_some());
        before - table.live.len()
    }

    /// Allow-listed scripts in the scripts directory, sorted by name
    pub async fn list_scripts(&self) -> Result<Vec<ScriptInfo>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(extension) = validate::validate_filename(&filename, &self.settings) else {
                continue;
            };

            found.push(ScriptInfo {
                path: entry.path(),
                extension,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                is_running: false,
                filename,
            });
        }

        let table = self.table.lock().await;
        for info in &mut found {
            info.is_running = table.is_running(&info.filename);
        }
        found.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(found)
    }
}

// ============================================================================
// Worker
// ============================================================================

async fn supervise(
    table: Arc<Mutex<RunTable>>,
    settings: Arc<ScriptSettings>,
    root: PathBuf,
    id: RunId,
    script: ResolvedScript,
    stop: CancellationToken,
) {
    let outcome = execute(&table, &settings, &root, &id, &script, &stop).await;
    finish(&table, &settings, &id, outcome).await;
}

async fn execute(
    table: &Mutex<RunTable>,
    settings: &ScriptSettings,
    root: &Path,
    id: &RunId,
    script: &ResolvedScript,
    stop: &CancellationToken,
) -> RunOutcome {
    let mut cmd = Command::new(&script.interpreter);
    cmd.arg(&script.path)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Script run {} failed to spawn: {}", id, e);
            return RunOutcome::fault(format!(
                "Failed to start {} {}: {}",
                script.interpreter, script.filename, e
            ));
        }
    };

    let pid = child.id();
    if let Some(run) = table.lock().await.live.get_mut(id) {
        if run.record.is_running() {
            run.record.pid = pid;
        }
    }
    debug!("Script run {} spawned pid {:?}", id, pid);

    let stdout = OutputCapture::new(settings.max_output_bytes);
    let stderr = OutputCapture::new(settings.max_output_bytes);
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        let capture = stdout.clone();
        readers.push(tokio::spawn(async move { capture.drain_from(pipe).await }));
    }
    if let Some(pipe) = child.stderr.take() {
        let capture = stderr.clone();
        readers.push(tokio::spawn(async move { capture.drain_from(pipe).await }));
    }

    let deadline = tokio::time::sleep(settings.timeout());
    tokio::pin!(deadline);
    let mut stop_sent = false;

    let (state, return_code) = loop {
        tokio::select! {
            result = child.wait() => {
                break match result {
                    Ok(status) => {
                        let code = status.code();
                        let state = if status.success() {
                            ScriptRunState::Completed
                        } else {
                            ScriptRunState::Failed
                        };
                        (state, code)
                    }
                    Err(e) => {
                        warn!("Script run {} wait failed: {}", id, e);
                        stderr.push(format!("Failed to wait for process: {}", e).as_bytes());
                        (ScriptRunState::Error, None)
                    }
                };
            }
            _ = &mut deadline => {
                warn!(
                    "Script run {} exceeded {}s, killing",
                    id,
                    settings.timeout().as_secs()
                );
                process::kill(&mut child, pid).await;
                break (ScriptRunState::Timeout, None);
            }
            _ = stop.cancelled(), if !stop_sent => {
                stop_sent = true;
                debug!("Script run {} terminating", id);
                process::terminate(&mut child, pid);
            }
        }
    };

    for reader in readers {
        match tokio::time::timeout(READER_GRACE, reader).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => debug!("Script run {} pipe read failed: {}", id, e),
            Ok(Err(e)) => debug!("Script run {} reader task failed: {}", id, e),
            Err(_) => debug!("Script run {} reader still open after exit", id),
        }
    }

    if stdout.dropped() > 0 || stderr.dropped() > 0 {
        debug!(
            "Script run {} output truncated (stdout -{}, stderr -{})",
            id,
            stdout.dropped(),
            stderr.dropped()
        );
    }

    RunOutcome {
        state,
        return_code,
        stdout: stdout.text(),
        stderr: stderr.text(),
    }
}

/// Record the outcome. A run already marked terminal (stopped) keeps its state.
async fn finish(
    table: &Mutex<RunTable>,
    settings: &ScriptSettings,
    id: &RunId,
    outcome: RunOutcome,
) {
    let mut table = table.lock().await;
    let Some(run) = table.live.get_mut(id) else {
        return;
    };

    let record = &mut run.record;
    if !record.status.is_terminal() {
        record.status = outcome.state;
    }
    record.finished_at.get_or_insert_with(Utc::now);
    record.output = outcome.stdout;
    record.error = if outcome.state == ScriptRunState::Error {
        truncate_chars(&outcome.stderr, settings.max_error_message_chars)
    } else {
        outcome.stderr
    };
    record.return_code = outcome.return_code;
    record.pid = None;
    run.worker = None;

    let finished = record.clone();
    info!(
        "Script run {} finished: {} ({:?}, code {:?})",
        id,
        finished.status,
        finished.duration(),
        finished.return_code
    );
    table.push_history(finished, settings.history_size);
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
