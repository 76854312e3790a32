// market/src/types/task.rs

//! Task, worker, and notification types.
//!
//! These are the shapes owned by the task ledger. Serialization uses
//! camelCase field names so the JSON matches the shape produced by the
//! intake bridge and consumed by the dashboard.

use serde::{Deserialize, Serialize};

use super::{Address, TaskId};

/// Lifecycle status of a task.
///
/// Transitions are applied exclusively by the ledger:
///
/// ```text
/// pending --[payment detected]--> active
/// active  --[submission]-------> in_progress
/// in_progress --[approved]-----> completed
/// in_progress --[rejected]-----> active
/// ```
///
/// `Verified` is reserved vocabulary for a future human-audit stage; no
/// transition currently reaches it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    InProgress,
    Completed,
    Verified,
}

/// A unit of work with a reward, a dedicated payment address, and a
/// lifecycle status.
///
/// Tasks are created either locally or by the intake bridge, and are
/// mutated only through the ledger's transition operations. They are never
/// deleted; the collection accumulates for the lifetime of the process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Base reward in KAS, before the worker's rank multiplier.
    pub reward: f64,
    /// Dedicated payment address, assigned at creation, never reused.
    pub payment_address: Address,
    pub status: TaskStatus,
    /// Creation time, milliseconds since Unix epoch.
    pub created_at: u64,
    /// Payer address, recorded when funding is detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    /// Worker submission text, recorded on submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// Worker rank tier, ordered D < C < B < A < S.
///
/// Rank is a pure function of the completed-task count; see the reward
/// module for the threshold table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Rank {
    D,
    C,
    B,
    A,
    S,
}

/// The local worker identity, tracked by rank, multiplier, and earnings.
///
/// Rank and multiplier must always agree with the reward engine's mapping
/// for `tasks_completed`; the only mutation path is the ledger's
/// settlement step, which recomputes both through that mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub tasks_completed: u64,
    /// Cumulative multiplier-adjusted earnings in KAS.
    pub total_earned: f64,
    pub rank: Rank,
    pub multiplier: f64,
    pub current_streak: u64,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            total_earned: 0.0,
            rank: Rank::D,
            multiplier: 0.8,
            current_streak: 0,
        }
    }
}

/// Transient notification driving a timed UI banner.
///
/// Not persisted; replaced wholesale when a newer notification arrives and
/// cleared automatically after a fixed display window.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub tx_id: String,
    pub amount: f64,
    pub from_address: String,
    /// Milliseconds since Unix epoch.
    pub timestamp: u64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_ordering_matches_tier_ladder() {
        assert!(Rank::D < Rank::C);
        assert!(Rank::C < Rank::B);
        assert!(Rank::B < Rank::A);
        assert!(Rank::A < Rank::S);
    }

    #[test]
    fn worker_starts_at_rank_d_with_base_multiplier() {
        let w = Worker::default();
        assert_eq!(w.rank, Rank::D);
        assert_eq!(w.multiplier, 0.8);
        assert_eq!(w.tasks_completed, 0);
        assert_eq!(w.total_earned, 0.0);
        assert_eq!(w.current_streak, 0);
    }

    #[test]
    fn task_json_uses_bridge_field_names() {
        let task = Task {
            id: TaskId("tg_1".to_string()),
            title: "Survey".to_string(),
            description: "Fill in the survey".to_string(),
            reward: 0.5,
            payment_address: Address::for_task(&TaskId("tg_1".to_string())),
            status: TaskStatus::Pending,
            created_at: 1_700_000_000_000,
            client_address: None,
            submission_data: None,
            verification_score: None,
            verification_feedback: None,
            estimated_time: Some("5m".to_string()),
            requirements: vec![],
        };

        let json = serde_json::to_string(&task).expect("task serializes");
        assert!(json.contains("\"paymentAddress\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"status\":\"pending\""));

        let back: Task = serde_json::from_str(&json).expect("task deserializes");
        assert_eq!(back.id, task.id);
        assert_eq!(back.status, TaskStatus::Pending);
    }

    #[test]
    fn bridge_tasks_with_missing_optional_fields_deserialize() {
        // The bridge omits provenance fields and may omit requirements.
        let json = r#"{
            "id": "tg_99",
            "title": "Test the beta app",
            "description": "Install and report bugs",
            "reward": 1.5,
            "paymentAddress": "kaspa:qqabc",
            "status": "pending",
            "createdAt": 1700000000000
        }"#;

        let task: Task = serde_json::from_str(json).expect("bridge task parses");
        assert!(task.requirements.is_empty());
        assert!(task.client_address.is_none());
    }
}
