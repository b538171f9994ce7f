use crate::amount::TokenAmount;
use crate::content::Cid;
use crate::deal::{Address, TransferId};
use crate::messages::ResponseStatus;
use std::fmt::{Display, Formatter};

/// Everything that can happen to a client retrieval deal. Events are submitted
/// by entry handlers, by the network reader's response mapping, and by the
/// data-transfer driver; the dispatcher applies them in submission order.
///
/// Failure payloads are carried as rendered strings: they cross task
/// boundaries and their only destination is the deal's `message` field.
#[derive(Clone, Debug)]
pub enum DealEvent {
    /// Admission signal; re-enters `New` to kick off the proposal.
    Open,
    DealProposed(TransferId),
    WriteDealProposalErrored(String),
    DealAccepted,
    DealRejected(String),
    DealNotFound(String),
    UnknownResponseReceived(ResponseStatus),
    PaymentChannelCreateInitiated(Cid),
    PaymentChannelAddingFunds(Cid, Address),
    PaymentChannelReady(Address, u64),
    PaymentChannelErrored(String),
    PaymentChannelAddFundsErrored(String),
    AllocateLaneErrored(String),
    /// Cumulative byte count delivered so far.
    BlocksReceived(u64),
    AllBlocksReceived,
    PaymentRequested(TokenAmount),
    LastPaymentRequested(TokenAmount),
    SendFunds,
    PaymentSent,
    FundsExpended { expected: TokenAmount, actual: TokenAmount },
    BadPaymentRequested(String),
    CreateVoucherFailed(String),
    WriteDealPaymentErrored(String),
    DataTransferError(String),
    Complete,
    CancelComplete,
}

impl Display for DealEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DealEvent::Open => write!(f, "Open"),
            DealEvent::DealProposed(_) => write!(f, "DealProposed"),
            DealEvent::WriteDealProposalErrored(_) => write!(f, "WriteDealProposalErrored"),
            DealEvent::DealAccepted => write!(f, "DealAccepted"),
            DealEvent::DealRejected(_) => write!(f, "DealRejected"),
            DealEvent::DealNotFound(_) => write!(f, "DealNotFound"),
            DealEvent::UnknownResponseReceived(_) => write!(f, "UnknownResponseReceived"),
            DealEvent::PaymentChannelCreateInitiated(_) => write!(f, "PaymentChannelCreateInitiated"),
            DealEvent::PaymentChannelAddingFunds(_, _) => write!(f, "PaymentChannelAddingFunds"),
            DealEvent::PaymentChannelReady(_, _) => write!(f, "PaymentChannelReady"),
            DealEvent::PaymentChannelErrored(_) => write!(f, "PaymentChannelErrored"),
            DealEvent::PaymentChannelAddFundsErrored(_) => write!(f, "PaymentChannelAddFundsErrored"),
            DealEvent::AllocateLaneErrored(_) => write!(f, "AllocateLaneErrored"),
            DealEvent::BlocksReceived(_) => write!(f, "BlocksReceived"),
            DealEvent::AllBlocksReceived => write!(f, "AllBlocksReceived"),
            DealEvent::PaymentRequested(_) => write!(f, "PaymentRequested"),
            DealEvent::LastPaymentRequested(_) => write!(f, "LastPaymentRequested"),
            DealEvent::SendFunds => write!(f, "SendFunds"),
            DealEvent::PaymentSent => write!(f, "PaymentSent"),
            DealEvent::FundsExpended { .. } => write!(f, "FundsExpended"),
            DealEvent::BadPaymentRequested(_) => write!(f, "BadPaymentRequested"),
            DealEvent::CreateVoucherFailed(_) => write!(f, "CreateVoucherFailed"),
            DealEvent::WriteDealPaymentErrored(_) => write!(f, "WriteDealPaymentErrored"),
            DealEvent::DataTransferError(_) => write!(f, "DataTransferError"),
            DealEvent::Complete => write!(f, "Complete"),
            DealEvent::CancelComplete => write!(f, "CancelComplete"),
        }
    }
}
