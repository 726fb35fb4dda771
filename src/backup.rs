// src/backup.rs
//! Incremental page copy from one session into another
//!
//! Source and destination keep their own keys: pages are decoded through
//! the source handle and re-encoded by the destination's. A job is an
//! iterator of progress reports; it cannot resume after a failure, and a
//! failed or abandoned job poisons the destination session.

use std::path::PathBuf;

use rusqlite::backup::{Backup, StepResult};

use crate::config;
use crate::enums::{BackupStatus, KeyCheck, StepSize};
use crate::error::{BackupError, CoreError, CorruptionKind, Result};
use crate::session::{Session, SessionState};

/// Snapshot after one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub remaining: u32,
    pub page_count: u32,
    pub status: BackupStatus,
}

impl Progress {
    pub fn copied(&self) -> u32 {
        self.page_count.saturating_sub(self.remaining)
    }

    pub fn is_done(&self) -> bool {
        self.status == BackupStatus::Done
    }
}

pub struct BackupJob<'a, 'b> {
    inner: Backup<'a, 'b>,
    step: StepSize,
    destination: PathBuf,
    dest_state: &'b mut SessionState,
    finished: bool,
}

impl<'a, 'b> BackupJob<'a, 'b> {
    /// Both sessions must read under their current keys before copying starts
    pub fn start(
        source: &'a mut Session,
        destination: &'b mut Session,
        step: StepSize,
    ) -> Result<Self> {
        source.touch().map_err(|e| session_error("source", e))?;
        destination
            .touch()
            .map_err(|e| session_error("destination", e))?;

        let source: &'a Session = source;
        let from = source.usable()?;
        let destination_path = destination.path().to_path_buf();
        let (to, dest_state) = destination.parts_mut()?;

        let inner = Backup::new(from, to).map_err(BackupError::Init)?;

        tracing::info!(
            source = %source.path().display(),
            destination = %destination_path.display(),
            ?step,
            "backup started"
        );

        Ok(Self {
            inner,
            step,
            destination: destination_path,
            dest_state,
            finished: false,
        })
    }

    /// Drive the job to completion and return the final progress
    pub fn finish(mut self) -> Result<Progress> {
        let mut last = None;
        while let Some(step) = self.next() {
            last = Some(step?);
        }
        Ok(last.unwrap_or_else(|| self.snapshot(BackupStatus::Done)))
    }

    fn snapshot(&self, status: BackupStatus) -> Progress {
        let p = self.inner.progress();
        Progress {
            remaining: u32::try_from(p.remaining).unwrap_or(0),
            page_count: u32::try_from(p.pagecount).unwrap_or(0),
            status,
        }
    }

    fn fail(&mut self, err: BackupError) -> CoreError {
        self.finished = true;
        self.dest_state.poisoned = true;
        tracing::warn!(destination = %self.destination.display(), error = %err, "backup failed");
        err.into()
    }
}

impl Iterator for BackupJob<'_, '_> {
    type Item = Result<Progress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let status = match self.inner.step(self.step.as_engine_pages()) {
            Ok(StepResult::Done) => BackupStatus::Done,
            Ok(StepResult::More) => BackupStatus::More,
            Ok(StepResult::Locked) => return Some(Err(self.fail(BackupError::Locked))),
            Ok(_) => return Some(Err(self.fail(BackupError::Busy))),
            Err(err) => return Some(Err(self.fail(BackupError::Step(err)))),
        };

        let progress = self.snapshot(status);
        if progress.is_done() {
            self.finished = true;
            // pages were replaced underneath the handle
            self.dest_state.trust = KeyCheck::Unverified;
            tracing::info!(
                destination = %self.destination.display(),
                pages = progress.page_count,
                "backup complete"
            );
        } else {
            tracing::debug!(
                destination = %self.destination.display(),
                remaining = progress.remaining,
                "backup step"
            );
        }
        Some(Ok(progress))
    }
}

impl Drop for BackupJob<'_, '_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(destination = %self.destination.display(), "backup abandoned midway");
            self.dest_state.poisoned = true;
        }
    }
}

/// Copy `source` into `destination` and confirm the copy reads under the
/// destination key
pub fn run(source: &mut Session, destination: &mut Session, step: StepSize) -> Result<Progress> {
    let progress = BackupJob::start(source, destination, step)?.finish()?;

    if destination.verify()? != KeyCheck::Verified {
        return Err(CoreError::KeyOrCorruption {
            path: destination.path().to_path_buf(),
            kind: CorruptionKind::Undecodable,
        });
    }
    Ok(progress)
}

/// [`run`] with the configured pages per step
pub fn run_configured(source: &mut Session, destination: &mut Session) -> Result<Progress> {
    let step = StepSize::from(config::load().backup.pages_per_step);
    run(source, destination, step)
}

fn session_error(role: &'static str, err: CoreError) -> CoreError {
    BackupError::Session {
        role,
        source: Box::new(err),
    }
    .into()
}
