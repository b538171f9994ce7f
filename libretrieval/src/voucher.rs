use crate::amount::TokenAmount;
use crate::deal::{Address, DealId};
use serde::{Deserialize, Serialize};

/// A signed off-chain payment claim, redeemable by the provider against the
/// channel and lane it names. Voucher amounts are cumulative per lane.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignedVoucher {
    pub channel: Address,
    pub lane: u64,
    /// Monotonic per-lane counter; a later voucher supersedes an earlier one.
    pub nonce: u64,
    pub amount: TokenAmount,
    pub signature: Vec<u8>,
}

/// The payment message written on the wire after a voucher is signed.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DealPayment {
    pub deal_id: DealId,
    pub channel: Address,
    pub voucher: SignedVoucher,
}
