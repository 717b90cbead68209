//! Recovery Stage Machine: explicit stages and legal transition guards.
//!
//! The escalation engine moves through remediation stages in a fixed order
//! of increasing intrusiveness. This module owns the current stage so that:
//! 1. Every transition is auditable and logged.
//! 2. Skipping or reordering stages is rejected by `advance()`.
//! 3. The end-of-run summary can reconstruct the recent path taken.
//!
//! ```text
//! Monitor → Rescan → ToggleManaged → RestartService → Terminal
//!    ▲         │            │               │
//!    └─────────┴────────────┴───────────────┘   reset on count > 0
//! ```

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The set of recovery stages.
///
/// Every run starts at `Monitor`. `Terminal` is reached only by exhausting
/// the remediation stages and is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    /// Steady state, no action.
    Monitor,
    /// Ask the network-management service to re-survey.
    Rescan,
    /// Mark the interface unmanaged, then managed again.
    ToggleManaged,
    /// Restart the network-management service unit.
    RestartService,
    /// All remediation exhausted.
    Terminal,
}

impl RecoveryStage {
    /// Remediation stages in escalation order.
    pub const REMEDIATIONS: [RecoveryStage; 3] = [
        RecoveryStage::Rescan,
        RecoveryStage::ToggleManaged,
        RecoveryStage::RestartService,
    ];

    pub fn is_terminal(self) -> bool {
        self == Self::Terminal
    }

    /// The stage that follows this one when a re-probe still sees nothing.
    pub fn next(self) -> Option<RecoveryStage> {
        match self {
            Self::Monitor => Some(Self::Rescan),
            Self::Rescan => Some(Self::ToggleManaged),
            Self::ToggleManaged => Some(Self::RestartService),
            Self::RestartService => Some(Self::Terminal),
            Self::Terminal => None,
        }
    }

    /// Human label used in "... WORKED" / "... did NOT work" log lines.
    pub fn action_label(self) -> &'static str {
        match self {
            Self::Monitor => "Monitoring",
            Self::Rescan => "Scanning",
            Self::ToggleManaged => "Unmanaged/managed",
            Self::RestartService => "Restarting NetworkManager",
            Self::Terminal => "Recovery",
        }
    }
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor => write!(f, "Monitor"),
            Self::Rescan => write!(f, "Rescan"),
            Self::ToggleManaged => write!(f, "ToggleManaged"),
            Self::RestartService => write!(f, "RestartService"),
            Self::Terminal => write!(f, "Terminal"),
        }
    }
}

/// Legal transitions between stages.
///
/// Forward edges follow `next()`. Any non-terminal stage other than
/// `Monitor` may reset to `Monitor`.
fn is_legal_transition(from: RecoveryStage, to: RecoveryStage) -> bool {
    use RecoveryStage::*;

    if to == Monitor {
        return !from.is_terminal() && from != Monitor;
    }

    from.next() == Some(to)
}

/// A single recorded stage transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RecoveryStage,
    pub to: RecoveryStage,
    /// Remediation cycle this transition belongs to (0 before the first).
    pub cycle: u32,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: RecoveryStage,
    pub to: RecoveryStage,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal stage transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// The recovery stage machine.
///
/// Tracks the active stage, enforces legal transitions, and keeps the most
/// recent transitions for the run summary. Older records are dropped once
/// the log is full; the running totals still count them.
#[derive(Debug)]
pub struct StageMachine {
    current: RecoveryStage,
    cycles: u32,
    transitions: VecDeque<TransitionRecord>,
    capacity: usize,
    total_transitions: u64,
}

impl StageMachine {
    /// Records kept by [`StageMachine::new`]: sixteen full escalations.
    pub const DEFAULT_LOG_CAPACITY: usize = 64;

    /// Create a new machine in `Monitor`.
    pub fn new() -> Self {
        Self::with_log_capacity(Self::DEFAULT_LOG_CAPACITY)
    }

    /// Create a machine that retains at most `capacity` transition records
    /// (at least one).
    pub fn with_log_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            current: RecoveryStage::Monitor,
            cycles: 0,
            transitions: VecDeque::with_capacity(capacity),
            capacity,
            total_transitions: 0,
        }
    }

    pub fn current(&self) -> RecoveryStage {
        self.current
    }

    /// Number of times the machine has left `Monitor`.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Attempt to advance to `to`.
    ///
    /// Returns `Err(IllegalTransition)` for any edge that skips, reorders,
    /// or leaves `Terminal`.
    pub fn advance(
        &mut self,
        to: RecoveryStage,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        if self.current == RecoveryStage::Monitor {
            self.cycles += 1;
        }

        tracing::debug!(
            from = %self.current,
            to = %to,
            cycle = self.cycles,
            "Stage transition"
        );

        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(TransitionRecord {
            from: self.current,
            to,
            cycle: self.cycles,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.total_transitions += 1;
        self.current = to;
        Ok(())
    }

    /// Return to `Monitor` after a successful probe.
    ///
    /// No-op when already monitoring.
    pub fn reset(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        if self.current == RecoveryStage::Monitor {
            return Ok(());
        }
        self.advance(RecoveryStage::Monitor, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Retained transition records, oldest first.
    pub fn transitions(&self) -> &VecDeque<TransitionRecord> {
        &self.transitions
    }

    /// Transitions made over the machine's lifetime, retained or not.
    pub fn total_transitions(&self) -> u64 {
        self.total_transitions
    }

    /// Stages entered among the retained records, in order (resets excluded).
    pub fn escalation_path(&self) -> Vec<RecoveryStage> {
        self.transitions
            .iter()
            .map(|t| t.to)
            .filter(|s| *s != RecoveryStage::Monitor)
            .collect()
    }

    /// Summary string of the machine's history.
    pub fn summary(&self) -> String {
        let path: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({} cycles, {} transitions)",
            RecoveryStage::Monitor,
            self.current,
            self.cycles,
            self.total_transitions,
        );
        if !path.is_empty() {
            let elided = if self.total_transitions > self.transitions.len() as u64 {
                "… → "
            } else {
                ""
            };
            out.push_str(&format!(" [{}{}]", elided, path.join(" → ")));
        }
        out
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_at(stage: RecoveryStage) -> StageMachine {
        StageMachine {
            current: stage,
            cycles: 1,
            ..StageMachine::new()
        }
    }

    #[test]
    fn test_initial_stage() {
        let sm = StageMachine::new();
        assert_eq!(sm.current(), RecoveryStage::Monitor);
        assert!(!sm.is_terminal());
        assert_eq!(sm.cycles(), 0);
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_full_escalation_path() {
        let mut sm = StageMachine::new();
        for stage in RecoveryStage::REMEDIATIONS {
            sm.advance(stage, None).unwrap();
        }
        sm.advance(RecoveryStage::Terminal, Some("exhausted"))
            .unwrap();

        assert!(sm.is_terminal());
        assert_eq!(sm.cycles(), 1);
        assert_eq!(
            sm.escalation_path(),
            vec![
                RecoveryStage::Rescan,
                RecoveryStage::ToggleManaged,
                RecoveryStage::RestartService,
                RecoveryStage::Terminal,
            ]
        );
    }

    #[test]
    fn test_cannot_skip_stage() {
        let mut sm = StageMachine::new();
        let err = sm
            .advance(RecoveryStage::ToggleManaged, None)
            .unwrap_err();
        assert_eq!(err.from, RecoveryStage::Monitor);
        assert_eq!(err.to, RecoveryStage::ToggleManaged);

        sm.advance(RecoveryStage::Rescan, None).unwrap();
        assert!(sm.advance(RecoveryStage::RestartService, None).is_err());
        assert!(sm.advance(RecoveryStage::Terminal, None).is_err());
    }

    #[test]
    fn test_cannot_go_backwards() {
        let mut sm = machine_at(RecoveryStage::RestartService);
        assert!(sm.advance(RecoveryStage::Rescan, None).is_err());
        assert!(sm.advance(RecoveryStage::ToggleManaged, None).is_err());
    }

    #[test]
    fn test_reset_from_any_remediation_stage() {
        for stage in RecoveryStage::REMEDIATIONS {
            let mut sm = machine_at(stage);
            sm.reset("access points visible").unwrap();
            assert_eq!(sm.current(), RecoveryStage::Monitor);
            assert_eq!(sm.transitions().len(), 1);
            assert_eq!(
                sm.transitions()[0].reason.as_deref(),
                Some("access points visible")
            );
        }
    }

    #[test]
    fn test_reset_in_monitor_is_noop() {
        let mut sm = StageMachine::new();
        sm.reset("steady").unwrap();
        sm.reset("steady").unwrap();
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_terminal_is_never_left() {
        let mut sm = machine_at(RecoveryStage::Terminal);
        assert!(sm.reset("late success").is_err());
        assert!(sm.advance(RecoveryStage::Rescan, None).is_err());
        assert_eq!(sm.current(), RecoveryStage::Terminal);
    }

    #[test]
    fn test_cycles_count_each_departure_from_monitor() {
        let mut sm = StageMachine::new();
        sm.advance(RecoveryStage::Rescan, None).unwrap();
        sm.reset("recovered").unwrap();
        sm.advance(RecoveryStage::Rescan, None).unwrap();
        sm.advance(RecoveryStage::ToggleManaged, None).unwrap();
        sm.reset("recovered").unwrap();
        assert_eq!(sm.cycles(), 2);
        assert_eq!(sm.transitions()[3].cycle, 2);
    }

    #[test]
    fn test_transition_record_serializes() {
        let mut sm = StageMachine::new();
        sm.advance(RecoveryStage::Rescan, Some("no access points"))
            .unwrap();

        let json = serde_json::to_value(&sm.transitions()[0]).unwrap();
        assert_eq!(json["from"], "monitor");
        assert_eq!(json["to"], "rescan");
        assert_eq!(json["cycle"], 1);
        assert_eq!(json["reason"], "no access points");
    }

    #[test]
    fn test_summary() {
        let mut sm = StageMachine::new();
        sm.advance(RecoveryStage::Rescan, None).unwrap();
        sm.reset("ok").unwrap();
        let summary = sm.summary();
        assert!(summary.contains("Rescan → Monitor"));
        assert!(summary.contains("2 transitions"));
    }

    #[test]
    fn test_transition_log_is_capped() {
        let mut sm = StageMachine::with_log_capacity(4);
        for _ in 0..10 {
            sm.advance(RecoveryStage::Rescan, None).unwrap();
            sm.reset("recovered").unwrap();
        }

        assert_eq!(sm.transitions().len(), 4);
        assert_eq!(sm.total_transitions(), 20);
        assert_eq!(sm.cycles(), 10);
        // Oldest records go first; the newest cycle is always retained.
        assert!(sm.transitions().iter().all(|t| t.cycle >= 9));
        assert_eq!(sm.transitions().back().unwrap().to, RecoveryStage::Monitor);

        let summary = sm.summary();
        assert!(summary.contains("20 transitions"));
        assert!(summary.contains("[… → Rescan"));
    }
}
