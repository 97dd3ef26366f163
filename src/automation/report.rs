//! Converts a run's terminal state into the one value callers ever see.
//!
//! Every run exits through this module, on every path, and nothing here can
//! fail: whatever went wrong inside the pipeline arrives as a terminal state
//! or an error string and leaves as a well-formed [`AutomationResult`].

use serde::Serialize;

use super::sequencer::SequencerState;

/// Fixed message for a completed run.
pub const SUCCESS_MESSAGE: &str = "Server started successfully!";

/// Outcome of one automation run.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationResult {
    pub success: bool,
    pub message: String,
}

impl AutomationResult {
    pub fn success() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Map the sequencer's terminal state to a result.
pub fn report(terminal: SequencerState) -> AutomationResult {
    match terminal {
        SequencerState::LoggedOut => AutomationResult::success(),
        SequencerState::Failed { reason } => AutomationResult::failure(reason),
        // The sequencer only returns terminal states; treat anything else as
        // a failed run rather than trusting it.
        other => AutomationResult::failure(format!("Run ended in unexpected state: {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_out_maps_to_success() {
        let result = report(SequencerState::LoggedOut);
        assert!(result.success);
        assert_eq!(result.message, SUCCESS_MESSAGE);
    }

    #[test]
    fn failed_carries_its_reason() {
        let result = report(SequencerState::Failed {
            reason: "Could not find login button".to_string(),
        });
        assert!(!result.success);
        assert_eq!(result.message, "Could not find login button");
    }

    #[test]
    fn non_terminal_state_is_still_a_failure() {
        let result = report(SequencerState::Started);
        assert!(!result.success);
        assert!(result.message.contains("Started"));
    }
}
