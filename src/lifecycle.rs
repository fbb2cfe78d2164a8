//! Status vocabulary shared by every entity state machine.
//!
//! Each concrete status enum maps its variants onto a [`Phase`]; the phase is
//! what derived predicates and store-side filters reason about, so adding an
//! entity never means re-deriving "is this terminal" by hand.
use super::error::IllegalStateError;
use serde::Serialize;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Active,
    Completed,
    Aborted,
}

impl Phase {
    pub const INITIAL_ONLY: &'static [Phase] = &[Phase::Initial];
    pub const NON_TERMINAL: &'static [Phase] = &[Phase::Initial, Phase::Active];

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted)
    }
}

pub trait Status: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every variant, in lifecycle order.
    const ALL: &'static [Self];

    /// Code persisted in the store and exchanged with the HTTP layer.
    fn code(self) -> &'static str;

    fn phase(self) -> Phase;

    fn initial() -> Self;

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.code() == code)
    }

    fn is_terminal(self) -> bool {
        self.phase().is_terminal()
    }

    fn codes_in(phases: &[Phase]) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|status| phases.contains(&status.phase()))
            .map(|status| status.code())
            .collect()
    }

    /// Guard used by every status-gated method before it touches state.
    fn require(self, operation: &'static str, allowed: &[Self]) -> Result<(), IllegalStateError> {
        if allowed.contains(&self) {
            return Ok(());
        }

        Err(IllegalStateError {
            operation,
            required: allowed.iter().map(|status| status.code()).collect(),
            actual: self.code(),
        })
    }
}
