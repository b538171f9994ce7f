use crate::amount::TokenAmount;
use crate::deal::DealId;
use crate::state_machine::DealEvent;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Status codes a provider can attach to a deal response.
///
/// Codes outside the set the client understands are preserved verbatim so the
/// failure message can name them.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ResponseStatus {
    Accepted,
    Rejected,
    DealNotFound,
    FundsNeeded,
    FundsNeededLastPayment,
    Completed,
    Other(u64),
}

impl Display for ResponseStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseStatus::Accepted => write!(f, "Accepted"),
            ResponseStatus::Rejected => write!(f, "Rejected"),
            ResponseStatus::DealNotFound => write!(f, "DealNotFound"),
            ResponseStatus::FundsNeeded => write!(f, "FundsNeeded"),
            ResponseStatus::FundsNeededLastPayment => write!(f, "FundsNeededLastPayment"),
            ResponseStatus::Completed => write!(f, "Completed"),
            ResponseStatus::Other(code) => write!(f, "{code}"),
        }
    }
}

/// A decoded provider response, as delivered by the network reader.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DealResponse {
    pub id: DealId,
    pub status: ResponseStatus,
    pub message: String,
    pub payment_owed: TokenAmount,
}

impl DealResponse {
    /// Translates the response into exactly one deal event. The dispatcher
    /// decides whether that event is legal in the deal's current state.
    pub fn into_event(self) -> DealEvent {
        match self.status {
            ResponseStatus::Accepted => DealEvent::DealAccepted,
            ResponseStatus::Rejected => DealEvent::DealRejected(self.message),
            ResponseStatus::DealNotFound => DealEvent::DealNotFound(self.message),
            ResponseStatus::FundsNeeded => DealEvent::PaymentRequested(self.payment_owed),
            ResponseStatus::FundsNeededLastPayment => DealEvent::LastPaymentRequested(self.payment_owed),
            ResponseStatus::Completed => DealEvent::Complete,
            other @ ResponseStatus::Other(_) => DealEvent::UnknownResponseReceived(other),
        }
    }
}
