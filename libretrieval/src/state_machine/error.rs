use crate::state_machine::DealStatus;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum TransitionError {
    /// The (state, event) pair is not in the transition table. The record is
    /// untouched; the caller reports the violation and the deal stays put.
    #[error("event {event} is not valid in state {status}")]
    InvalidTransition { status: DealStatus, event: String },
    /// Terminal deals no longer accept events of any kind.
    #[error("deal has reached terminal state {0}")]
    Terminal(DealStatus),
}
