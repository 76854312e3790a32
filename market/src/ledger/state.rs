// market/src/ledger/state.rs

//! Authoritative task/worker state under a single lock.
//!
//! Every public operation takes the lock once, performs its guard check
//! and mutation inside that single acquisition, and releases it before
//! returning. That makes each guard a genuine check-and-act step: two
//! concurrent submissions for the same task cannot both pass the `active`
//! guard, because the first to acquire the lock moves the task to
//! `in_progress` before the second ever observes it. No awaits happen
//! under the lock.

use std::sync::Mutex;

use crate::evaluator::VerificationResult;
use crate::monitor::PaymentDetection;
use crate::reward;
use crate::types::{Task, TaskId, TaskStatus, Worker};

/// Result of settling an approved submission.
#[derive(Clone, Debug)]
pub struct Settlement {
    /// The completed task, including recorded score and feedback.
    pub task: Task,
    /// Multiplier-adjusted payout in KAS.
    pub payout: f64,
    /// Worker aggregate state after the update.
    pub worker: Worker,
}

/// Outcome of applying a verification result to a task.
#[derive(Clone, Debug)]
pub enum VerificationOutcome {
    /// Approved: task completed, worker credited.
    Settled(Settlement),
    /// Rejected: task reverted to `active` for resubmission.
    Rejected { score: f64, feedback: String },
    /// The task was not `in_progress`; nothing happened.
    Ignored,
}

struct LedgerInner {
    /// Newest-first, mirroring the browse order of the task feed.
    tasks: Vec<Task>,
    worker: Worker,
    live_balance: f64,
}

/// The authoritative task collection and worker state.
///
/// Tasks are never deleted; the collection accumulates for the process
/// lifetime, which is acceptable for this reference scope.
pub struct TaskLedger {
    inner: Mutex<LedgerInner>,
}

impl Default for TaskLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskLedger {
    /// Creates an empty ledger with a fresh rank-D worker.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                tasks: Vec::new(),
                worker: Worker::default(),
                live_balance: 0.0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.inner.lock().expect("ledger lock poisoned")
    }

    /// Inserts a task at the front of the feed.
    ///
    /// Returns `false` (without inserting) when a task with the same id is
    /// already present.
    pub fn add_task(&self, task: Task) -> bool {
        let mut inner = self.lock();
        if inner.tasks.iter().any(|t| t.id == task.id) {
            return false;
        }
        inner.tasks.insert(0, task);
        true
    }

    /// Merges externally sourced tasks by identity.
    ///
    /// Tasks whose id is already present are skipped; the rest are
    /// inserted at the front of the feed. Returns the adopted tasks so
    /// the caller can register address watches for them.
    pub fn merge_external(&self, incoming: Vec<Task>) -> Vec<Task> {
        let mut inner = self.lock();
        let mut adopted = Vec::new();
        for task in incoming {
            if inner.tasks.iter().any(|t| t.id == task.id) {
                continue;
            }
            inner.tasks.insert(0, task.clone());
            adopted.push(task);
        }
        adopted
    }

    /// Returns a snapshot of all tasks, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Returns a snapshot of one task.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| &t.id == id).cloned()
    }

    /// Returns a snapshot of the worker aggregate state.
    pub fn worker(&self) -> Worker {
        self.lock().worker.clone()
    }

    /// Returns the currently available balance in KAS.
    pub fn live_balance(&self) -> f64 {
        self.lock().live_balance
    }

    /// Applies a payment detection: `pending → active`, recording the
    /// payer address.
    ///
    /// Returns `false` when the task is unknown or not `pending`; late or
    /// duplicate detections on an already-funded task are ignored here as
    /// a backstop even though the monitor should have been unregistered
    /// for that address already.
    pub fn fund(&self, id: &TaskId, detection: &PaymentDetection) -> bool {
        let mut inner = self.lock();
        let Some(task) = inner.tasks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            return false;
        }
        task.status = TaskStatus::Active;
        task.client_address = Some(detection.from_address.clone());
        true
    }

    /// Accepts a submission: `active → in_progress`, recording the text.
    ///
    /// Returns a snapshot of the task (for verification) on success and
    /// `None` when the task is unknown or not `active`. Because the guard
    /// and the status update share one lock acquisition, at most one
    /// submission per task can ever be in flight.
    pub fn begin_submission(&self, id: &TaskId, submission: &str) -> Option<Task> {
        let mut inner = self.lock();
        let task = inner.tasks.iter_mut().find(|t| &t.id == id)?;
        if task.status != TaskStatus::Active {
            return None;
        }
        task.status = TaskStatus::InProgress;
        task.submission_data = Some(submission.to_string());
        Some(task.clone())
    }

    /// Reverts an in-flight submission to `active` without recording an
    /// outcome. Used when the verification step aborts before producing a
    /// result, so the task is never left stuck in `in_progress`.
    pub fn revert_submission(&self, id: &TaskId) {
        let mut inner = self.lock();
        if let Some(task) = inner.tasks.iter_mut().find(|t| &t.id == id) {
            if task.status == TaskStatus::InProgress {
                task.status = TaskStatus::Active;
            }
        }
    }

    /// Applies a verification result: `in_progress → completed` on
    /// approval, `in_progress → active` on rejection.
    ///
    /// On approval the payout uses the multiplier the worker holds at
    /// completion time, not the one held at task creation, and the
    /// worker aggregate is updated as one unit: completed count, total
    /// earned, rank, multiplier (both recomputed through the reward
    /// engine), and streak, plus the live balance credit.
    pub fn apply_verification(
        &self,
        id: &TaskId,
        result: &VerificationResult,
    ) -> VerificationOutcome {
        let mut inner = self.lock();
        let Some(index) = inner.tasks.iter().position(|t| &t.id == id) else {
            return VerificationOutcome::Ignored;
        };
        if inner.tasks[index].status != TaskStatus::InProgress {
            return VerificationOutcome::Ignored;
        }

        {
            let task = &mut inner.tasks[index];
            task.verification_score = Some(result.score);
            task.verification_feedback = Some(result.feedback.clone());
        }

        if !result.approved {
            inner.tasks[index].status = TaskStatus::Active;
            return VerificationOutcome::Rejected {
                score: result.score,
                feedback: result.feedback.clone(),
            };
        }

        inner.tasks[index].status = TaskStatus::Completed;

        let payout = reward::payout(inner.tasks[index].reward, inner.worker.multiplier);

        let completed = inner.worker.tasks_completed + 1;
        inner.worker.tasks_completed = completed;
        inner.worker.total_earned += payout;
        inner.worker.rank = reward::rank_for(completed);
        inner.worker.multiplier = reward::multiplier_for(inner.worker.rank);
        inner.worker.current_streak += 1;

        inner.live_balance += payout;

        VerificationOutcome::Settled(Settlement {
            task: inner.tasks[index].clone(),
            payout,
            worker: inner.worker.clone(),
        })
    }

    /// Resets the worker aggregate and live balance to a fresh state.
    ///
    /// Non-production tooling only (the demo panel's "reset" button); not
    /// part of the core contract, and the only mutation path that touches
    /// worker state outside settlement.
    pub fn reset_worker(&self) {
        let mut inner = self.lock();
        inner.worker = Worker::default();
        inner.live_balance = 0.0;
    }
}
