// market/src/ledger/service.rs

//! Marketplace orchestration.
//!
//! [`Marketplace`] wires together:
//!
//! - a [`TaskLedger`] for authoritative state,
//! - a [`PaymentMonitor`] for funding detection,
//! - an [`Evaluator`] for submission verification,
//! - an optional [`IntakeClient`] for the external bridge, and
//! - a [`NotificationCenter`] plus metrics for observability.
//!
//! It exposes the money-affecting operations: task creation, funding
//! detection, and the submit → verify → settle sequence. The evaluator
//! call always happens outside the ledger lock; exclusivity per task
//! comes from the ledger's single-acquisition guards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::NotifyConfig;
use crate::evaluator::Evaluator;
use crate::intake::{IntakeClient, IntakeError};
use crate::metrics::MetricsRegistry;
use crate::monitor::{MonitorError, NodeRpc, PaymentDetection, PaymentMonitor};
use crate::notify::NotificationCenter;
use crate::types::{
    Address, PaymentNotification, Task, TaskId, TaskStatus, Worker, current_unix_millis,
};

use super::state::{Settlement, TaskLedger, VerificationOutcome};

/// Outcome of a submit → verify → settle sequence, reported synchronously
/// to the actor who submitted.
#[derive(Clone, Debug)]
pub enum SubmissionOutcome {
    /// The task was not in a submittable state; nothing happened.
    Ignored,
    /// Verification rejected the submission; the task is `active` again.
    Rejected { score: f64, feedback: String },
    /// Verification approved the submission and the worker was credited.
    Completed(Settlement),
}

/// The assembled settlement core.
///
/// Generic over:
///
/// - `R`: chain node RPC implementing [`NodeRpc`],
/// - `E`: submission evaluator implementing [`Evaluator`].
///
/// Shared behind an [`Arc`]; the address-watch callbacks hold a `Weak`
/// back-reference, so dropping the last `Arc` tears the cycle down.
pub struct Marketplace<R, E> {
    notify_cfg: NotifyConfig,
    ledger: TaskLedger,
    monitor: PaymentMonitor<R>,
    evaluator: E,
    intake: Option<IntakeClient>,
    notifications: Arc<NotificationCenter>,
    metrics: Arc<MetricsRegistry>,
    task_seq: AtomicU64,
}

impl<R, E> Marketplace<R, E>
where
    R: NodeRpc,
    E: Evaluator + 'static,
{
    /// Creates a new marketplace over the given collaborators.
    pub fn new(
        notify_cfg: NotifyConfig,
        monitor: PaymentMonitor<R>,
        evaluator: E,
        intake: Option<IntakeClient>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            notify_cfg,
            ledger: TaskLedger::new(),
            monitor,
            evaluator,
            intake,
            notifications: Arc::new(NotificationCenter::new()),
            metrics,
            task_seq: AtomicU64::new(0),
        }
    }

    /// Starts payment monitoring.
    ///
    /// Propagates subscription failure; the caller decides whether to
    /// retry or treat funding detection as unavailable.
    pub fn start(&self) -> Result<(), MonitorError> {
        self.monitor.start_monitoring()
    }

    /// Stops monitoring and cancels the outstanding notification timer.
    pub fn shutdown(&self) {
        self.monitor.stop_monitoring();
        self.notifications.shutdown();
    }

    /// Creates a local task from a draft and registers its address watch.
    pub fn create_task(self: &Arc<Self>, draft: crate::evaluator::ParsedTask) -> Task {
        let id = TaskId::new_local(
            current_unix_millis(),
            self.task_seq.fetch_add(1, Ordering::Relaxed),
        );
        let task = Task {
            payment_address: Address::for_task(&id),
            id,
            title: draft.title,
            description: draft.description,
            reward: draft.reward,
            status: TaskStatus::Pending,
            created_at: current_unix_millis(),
            client_address: None,
            submission_data: None,
            verification_score: None,
            verification_feedback: None,
            estimated_time: draft.estimated_time,
            requirements: draft.requirements,
        };

        // Ids carry a process-unique sequence number, so insertion cannot
        // collide.
        self.ledger.add_task(task.clone());
        self.metrics.market.tasks_created_total.inc();
        self.watch_task(&task);

        tracing::info!(id = %task.id, reward = task.reward, "task created");
        task
    }

    /// Parses natural-language text into a task draft.
    pub async fn parse_task(&self, input: &str) -> crate::evaluator::ParsedTask {
        self.evaluator.parse(input).await
    }

    /// Registers a funding watch for a pending task's payment address.
    ///
    /// The callback holds a `Weak` reference; a detection arriving after
    /// the marketplace is dropped is silently discarded.
    fn watch_task(self: &Arc<Self>, task: &Task) {
        let weak = Arc::downgrade(self);
        let id = task.id.clone();
        self.monitor
            .watch_address(task.payment_address.clone(), move |detection| {
                if let Some(market) = weak.upgrade() {
                    market.handle_detection(&id, detection);
                }
            });
    }

    /// Applies a payment detection to the ledger.
    ///
    /// On the first detection the task moves `pending → active`, the
    /// address watch is removed, and a funding banner is published. The
    /// ledger guard makes any further detections no-ops.
    pub fn handle_detection(self: &Arc<Self>, id: &TaskId, detection: PaymentDetection) {
        if !self.ledger.fund(id, &detection) {
            tracing::debug!(id = %id, tx_id = %detection.tx_id, "stale detection ignored");
            return;
        }

        self.metrics.market.payments_detected_total.inc();
        self.monitor.unwatch_address(&detection.to_address);

        tracing::info!(
            id = %id,
            amount = detection.amount,
            from = %detection.from_address,
            "task funded"
        );

        self.notifications.publish(
            PaymentNotification {
                tx_id: detection.tx_id,
                amount: detection.amount,
                from_address: detection.from_address,
                timestamp: detection.timestamp,
                message: format!("Task funded with {:.4} KAS!", detection.amount),
            },
            self.notify_cfg.payment_ttl,
        );
    }

    /// Runs the submit → verify → settle sequence for one task.
    ///
    /// `image` is an optional data-URI proof forwarded to the evaluator.
    /// The outcome is returned synchronously to the submitting actor;
    /// background effects (bridge callback, banner, metrics) never block
    /// or roll back settlement.
    pub async fn submit(
        self: &Arc<Self>,
        id: &TaskId,
        submission: &str,
        image: Option<&str>,
    ) -> SubmissionOutcome {
        let Some(task) = self.ledger.begin_submission(id, submission) else {
            tracing::debug!(id = %id, "submission ignored: task not active");
            return SubmissionOutcome::Ignored;
        };

        // If this future is dropped while awaiting the evaluator (the
        // submitting request went away), the task must not stay stuck in
        // `in_progress`.
        let mut guard = RevertOnDrop {
            ledger: &self.ledger,
            id,
            armed: true,
        };

        let started = Instant::now();
        let result = self
            .evaluator
            .verify(&task.description, submission, image)
            .await;
        self.metrics
            .market
            .verification_seconds
            .observe(started.elapsed().as_secs_f64());
        guard.armed = false;

        match self.ledger.apply_verification(id, &result) {
            VerificationOutcome::Settled(settlement) => {
                self.metrics.market.tasks_completed_total.inc();
                self.metrics.market.payout_kas_total.inc_by(settlement.payout);

                tracing::info!(
                    id = %id,
                    payout = settlement.payout,
                    rank = ?settlement.worker.rank,
                    "task settled"
                );

                self.notifications.publish(
                    PaymentNotification {
                        tx_id: format!("payout_{id}"),
                        amount: settlement.payout,
                        from_address: "KaspaStream Platform".to_string(),
                        timestamp: current_unix_millis(),
                        message: format!("Earned {:.4} KAS!", settlement.payout),
                    },
                    self.notify_cfg.payment_ttl,
                );

                if id.is_external() {
                    self.report_external_completion(id).await;
                }

                SubmissionOutcome::Completed(settlement)
            }
            VerificationOutcome::Rejected { score, feedback } => {
                self.metrics.market.verifications_rejected_total.inc();
                tracing::info!(id = %id, score, "submission rejected");
                SubmissionOutcome::Rejected { score, feedback }
            }
            VerificationOutcome::Ignored => SubmissionOutcome::Ignored,
        }
    }

    /// Best-effort completion callback to the intake bridge.
    async fn report_external_completion(&self, id: &TaskId) {
        let Some(intake) = &self.intake else {
            return;
        };
        if let Err(e) = intake.report_completion(id).await {
            // Local settlement stands regardless.
            tracing::warn!(id = %id, "completion callback to bridge failed: {e}");
        }
    }

    /// Merges externally sourced tasks and watches the adopted ones.
    ///
    /// Returns the number of tasks adopted. Publishes an arrival banner
    /// when that number is nonzero.
    pub fn adopt_external(self: &Arc<Self>, incoming: Vec<Task>) -> usize {
        let adopted = self.ledger.merge_external(incoming);
        if adopted.is_empty() {
            return 0;
        }

        for task in &adopted {
            if task.status == TaskStatus::Pending {
                self.watch_task(task);
            }
        }

        self.metrics
            .market
            .tasks_adopted_total
            .inc_by(adopted.len() as u64);

        self.notifications.publish(
            PaymentNotification {
                tx_id: "system".to_string(),
                amount: 0.0,
                from_address: "Intake Bridge".to_string(),
                timestamp: current_unix_millis(),
                message: format!("{} new tasks arrived via the bridge!", adopted.len()),
            },
            self.notify_cfg.intake_ttl,
        );

        adopted.len()
    }

    /// One intake poll cycle: fetch open external tasks and adopt them.
    pub async fn poll_intake_once(self: &Arc<Self>) -> Result<usize, IntakeError> {
        let Some(intake) = &self.intake else {
            return Ok(0);
        };
        let incoming = intake.fetch_open_tasks().await?;
        Ok(self.adopt_external(incoming))
    }

    /// Synthesizes a funding detection for a pending task.
    ///
    /// Demo tooling: stands in for a real on-chain payment so the full
    /// settlement path can be exercised without a node. Returns `false`
    /// when the task is unknown or not pending.
    pub fn simulate_funding(self: &Arc<Self>, id: &TaskId) -> bool {
        let Some(task) = self.ledger.task(id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            return false;
        }

        self.handle_detection(
            id,
            PaymentDetection {
                tx_id: format!("simulated_{id}"),
                amount: task.reward,
                to_address: task.payment_address,
                from_address: "Demo tools".to_string(),
                timestamp: current_unix_millis(),
            },
        );
        true
    }

    /// Snapshot of all tasks, newest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.ledger.tasks()
    }

    /// Snapshot of one task.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.ledger.task(id)
    }

    /// Snapshot of the worker aggregate state.
    pub fn worker(&self) -> Worker {
        self.ledger.worker()
    }

    /// Currently available balance in KAS.
    pub fn live_balance(&self) -> f64 {
        self.ledger.live_balance()
    }

    /// On-demand confirmed balance of an arbitrary address, in KAS.
    pub async fn check_balance(&self, address: &Address) -> f64 {
        self.monitor.check_balance(address).await
    }

    /// The outstanding transient notification, if any.
    pub fn notification(&self) -> Option<PaymentNotification> {
        self.notifications.current()
    }

    /// Dismisses the outstanding notification.
    pub fn clear_notification(&self) {
        self.notifications.clear();
    }

    /// Resets the worker aggregate (demo tooling).
    pub fn reset_worker(&self) {
        self.ledger.reset_worker();
    }

    /// Number of addresses the monitor is currently watching.
    pub fn watched_addresses(&self) -> usize {
        self.monitor.registry().watched_count()
    }

    /// `true` while the payment monitor's dispatch loop is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_monitoring()
    }
}

/// Reverts an in-flight submission if dropped while still armed.
struct RevertOnDrop<'a> {
    ledger: &'a TaskLedger,
    id: &'a TaskId,
    armed: bool,
}

impl Drop for RevertOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ledger.revert_submission(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{ParsedTask, VerificationResult, mock_parse};
    use crate::monitor::ChannelNodeRpc;
    use crate::types::{Block, Rank, Transaction, TxOutput};
    use std::time::Duration;

    /// Evaluator returning a fixed score, no network involved.
    struct ScriptedEvaluator {
        score: f64,
    }

    impl Evaluator for ScriptedEvaluator {
        async fn verify(
            &self,
            _description: &str,
            _submission: &str,
            _image: Option<&str>,
        ) -> VerificationResult {
            VerificationResult::from_score(self.score, "scripted".to_string())
        }

        async fn parse(&self, input: &str) -> ParsedTask {
            mock_parse(input)
        }
    }

    fn market_with(
        rpc: Arc<ChannelNodeRpc>,
        score: f64,
    ) -> Arc<Marketplace<ChannelNodeRpc, ScriptedEvaluator>> {
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry"));
        Arc::new(Marketplace::new(
            NotifyConfig::default(),
            PaymentMonitor::new(rpc),
            ScriptedEvaluator { score },
            None,
            metrics,
        ))
    }

    fn draft(reward: f64) -> ParsedTask {
        ParsedTask {
            title: "Test".to_string(),
            description: "Do the thing".to_string(),
            reward,
            estimated_time: None,
            requirements: vec![],
        }
    }

    fn payment_block(to: &Address, sompi: u64) -> Block {
        Block {
            transactions: vec![Transaction {
                tx_id: Some("tx".to_string()),
                inputs: vec![],
                outputs: vec![TxOutput {
                    address: Some(to.clone()),
                    value: sompi,
                }],
            }],
        }
    }

    async fn wait_for_status(
        market: &Arc<Marketplace<ChannelNodeRpc, ScriptedEvaluator>>,
        id: &TaskId,
        status: TaskStatus,
    ) {
        for _ in 0..100 {
            if market.task(id).map(|t| t.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never reached {status:?}");
    }

    #[tokio::test]
    async fn funding_then_submission_settles_end_to_end() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 95.0);
        market.start().expect("monitoring starts");

        let task = market.create_task(draft(1.0));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(market.watched_addresses(), 1);

        rpc.publish_block(payment_block(&task.payment_address, 100_000_000));
        wait_for_status(&market, &task.id, TaskStatus::Active).await;

        // Funding removed the watch and recorded the banner.
        assert_eq!(market.watched_addresses(), 0);
        let banner = market.notification().expect("funding banner");
        assert!(banner.message.contains("funded"));

        let outcome = market.submit(&task.id, "all done", None).await;
        let SubmissionOutcome::Completed(settlement) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };

        assert_eq!(settlement.payout, 0.8);
        assert_eq!(settlement.worker.rank, Rank::D);
        assert_eq!(market.live_balance(), 0.8);
        assert_eq!(
            market.task(&task.id).unwrap().status,
            TaskStatus::Completed
        );

        // Settled tasks take no further submissions and never double-credit.
        let outcome = market.submit(&task.id, "once more", None).await;
        assert!(matches!(outcome, SubmissionOutcome::Ignored));
        assert_eq!(market.worker().tasks_completed, 1);
        assert_eq!(market.live_balance(), 0.8);

        market.shutdown();
    }

    #[tokio::test]
    async fn repeated_detections_fund_at_most_once() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 95.0);
        market.start().expect("monitoring starts");

        let task = market.create_task(draft(1.0));

        // Two payments in one block, then another block later: only the
        // first detection transitions the task.
        let block = Block {
            transactions: vec![Transaction {
                tx_id: Some("tx".to_string()),
                inputs: vec![],
                outputs: vec![
                    TxOutput {
                        address: Some(task.payment_address.clone()),
                        value: 100_000_000,
                    },
                    TxOutput {
                        address: Some(task.payment_address.clone()),
                        value: 100_000_000,
                    },
                ],
            }],
        };
        rpc.publish_block(block);
        rpc.publish_block(payment_block(&task.payment_address, 100_000_000));

        wait_for_status(&market, &task.id, TaskStatus::Active).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(market.task(&task.id).unwrap().status, TaskStatus::Active);
        assert_eq!(market.watched_addresses(), 0);

        market.shutdown();
    }

    #[tokio::test]
    async fn rejection_reverts_and_allows_resubmission() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 89.0);

        let task = market.create_task(draft(1.0));
        market.simulate_funding(&task.id);

        let outcome = market.submit(&task.id, "half done", None).await;
        assert!(matches!(
            outcome,
            SubmissionOutcome::Rejected { score, .. } if score == 89.0
        ));
        assert_eq!(market.task(&task.id).unwrap().status, TaskStatus::Active);
        assert_eq!(market.worker().tasks_completed, 0);

        // The worker can try again.
        let outcome = market.submit(&task.id, "actually done", None).await;
        assert!(matches!(outcome, SubmissionOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn abandoned_submission_reverts_to_active() {
        /// Evaluator whose verify never resolves.
        struct StalledEvaluator;

        impl Evaluator for StalledEvaluator {
            async fn verify(
                &self,
                _description: &str,
                _submission: &str,
                _image: Option<&str>,
            ) -> VerificationResult {
                std::future::pending().await
            }

            async fn parse(&self, input: &str) -> ParsedTask {
                mock_parse(input)
            }
        }

        let rpc = Arc::new(ChannelNodeRpc::new());
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics registry"));
        let market = Arc::new(Marketplace::new(
            NotifyConfig::default(),
            PaymentMonitor::new(rpc),
            StalledEvaluator,
            None,
            metrics,
        ));

        let task = market.create_task(draft(1.0));
        market.simulate_funding(&task.id);

        // Dropping the timed-out submit future must not leave the task
        // stuck in `in_progress`.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            market.submit(&task.id, "never finishes", None),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(market.task(&task.id).unwrap().status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn submission_on_pending_task_is_ignored() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 95.0);

        let task = market.create_task(draft(1.0));
        let outcome = market.submit(&task.id, "too early", None).await;
        assert!(matches!(outcome, SubmissionOutcome::Ignored));
        assert_eq!(market.task(&task.id).unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn adopt_external_dedupes_and_watches_pending() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 95.0);

        let external = Task {
            id: TaskId("tg_77".to_string()),
            title: "Bridge task".to_string(),
            description: "From the bridge".to_string(),
            reward: 0.5,
            payment_address: Address::for_task(&TaskId("tg_77".to_string())),
            status: TaskStatus::Pending,
            created_at: current_unix_millis(),
            client_address: None,
            submission_data: None,
            verification_score: None,
            verification_feedback: None,
            estimated_time: None,
            requirements: vec![],
        };

        assert_eq!(market.adopt_external(vec![external.clone()]), 1);
        assert_eq!(market.watched_addresses(), 1);
        let banner = market.notification().expect("arrival banner");
        assert!(banner.message.contains("1 new tasks"));

        // A second poll returning the same task adopts nothing.
        assert_eq!(market.adopt_external(vec![external]), 0);
        assert_eq!(market.tasks().len(), 1);

        market.shutdown();
    }

    #[tokio::test]
    async fn simulate_funding_only_applies_to_pending_tasks() {
        let rpc = Arc::new(ChannelNodeRpc::new());
        let market = market_with(rpc.clone(), 95.0);

        let task = market.create_task(draft(1.0));
        assert!(market.simulate_funding(&task.id));
        assert!(!market.simulate_funding(&task.id));
        assert!(!market.simulate_funding(&TaskId("task_missing".to_string())));
    }
}
