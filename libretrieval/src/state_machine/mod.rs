pub mod error;
mod events;
mod handlers;
mod runner;
mod transitions;

pub use events::DealEvent;
pub use runner::{DealHandle, DealNotification, SubmitError};
pub use transitions::{apply, Applied};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The closed set of states a client retrieval deal moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealStatus {
    /// The deal record exists but nothing has been sent to the provider yet.
    New,
    /// The proposal is on the wire; waiting for the provider's verdict.
    WaitForAcceptance,
    /// The provider accepted; payment channel setup starts here.
    Accepted,
    /// A channel-creation message is pending on chain.
    PaymentChannelCreating,
    /// An add-funds message for an existing channel is pending on chain.
    PaymentChannelAddingFunds,
    /// Bytes are flowing and payment can be requested at any time.
    Ongoing,
    /// All blocks arrived; only the final payment exchange remains.
    BlocksComplete,
    FundsNeeded,
    FundsNeededLastPayment,
    SendFunds,
    SendFundsLastPayment,
    /// Final voucher written; waiting for the provider's completion response.
    Finalizing,
    Completed,
    Rejected,
    DealNotFound,
    /// A failure was recorded; teardown runs before the deal errors out.
    Failing,
    Errored,
}

impl DealStatus {
    /// Terminal states freeze the record: no event mutates it afterwards.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Completed | DealStatus::Errored)
    }

    /// States with no outgoing transitions; the deal task stops here.
    pub fn is_resolved(&self) -> bool {
        self.is_terminal() || matches!(self, DealStatus::Rejected | DealStatus::DealNotFound)
    }

    /// States during which the payment channel may still be under construction.
    /// Data and payment-request events arriving here are recorded without
    /// moving the deal.
    pub fn in_payment_channel_setup(&self) -> bool {
        matches!(
            self,
            DealStatus::WaitForAcceptance
                | DealStatus::Accepted
                | DealStatus::PaymentChannelCreating
                | DealStatus::PaymentChannelAddingFunds
        )
    }
}

impl Display for DealStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DealStatus::New => write!(f, "New"),
            DealStatus::WaitForAcceptance => write!(f, "WaitForAcceptance"),
            DealStatus::Accepted => write!(f, "Accepted"),
            DealStatus::PaymentChannelCreating => write!(f, "PaymentChannelCreating"),
            DealStatus::PaymentChannelAddingFunds => write!(f, "PaymentChannelAddingFunds"),
            DealStatus::Ongoing => write!(f, "Ongoing"),
            DealStatus::BlocksComplete => write!(f, "BlocksComplete"),
            DealStatus::FundsNeeded => write!(f, "FundsNeeded"),
            DealStatus::FundsNeededLastPayment => write!(f, "FundsNeededLastPayment"),
            DealStatus::SendFunds => write!(f, "SendFunds"),
            DealStatus::SendFundsLastPayment => write!(f, "SendFundsLastPayment"),
            DealStatus::Finalizing => write!(f, "Finalizing"),
            DealStatus::Completed => write!(f, "Completed"),
            DealStatus::Rejected => write!(f, "Rejected"),
            DealStatus::DealNotFound => write!(f, "DealNotFound"),
            DealStatus::Failing => write!(f, "Failing"),
            DealStatus::Errored => write!(f, "Errored"),
        }
    }
}
