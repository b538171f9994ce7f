use crate::amount::TokenAmount;
use crate::content::Cid;
use crate::deal::TransferId;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum NetworkError {
    #[error("connection to provider failed: {0}")]
    Connection(String),
    #[error("writing message to provider failed: {0}")]
    Write(String),
}

#[derive(Clone, Debug, Error)]
pub enum TransferError {
    #[error("data transfer could not be opened: {0}")]
    Open(String),
    #[error("unknown data transfer {0}")]
    UnknownTransfer(TransferId),
    #[error("data transfer failed: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, Error)]
pub enum ChannelManagerError {
    #[error("insufficient wallet funds: {0}")]
    InsufficientFunds(String),
    #[error("on-chain message {0} failed")]
    MessageFailed(Cid),
    #[error("payment channel error: {0}")]
    Other(String),
}

#[derive(Clone, Debug, Error)]
pub enum VoucherError {
    /// The channel cannot cover the cumulative voucher amount. The amounts are
    /// surfaced verbatim in the deal's failure message.
    #[error("not enough funds in channel: needed {expected}, available {actual}")]
    Shortfall { expected: TokenAmount, actual: TokenAmount },
    #[error("voucher signing failed: {0}")]
    Signing(String),
}
