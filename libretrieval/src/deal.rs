use crate::amount::TokenAmount;
use crate::content::{Cid, Selector};
use crate::state_machine::DealStatus;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

//------------------------------------        Identifiers          ------------------------------------------------//

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DealId(u64);

impl DealId {
    pub fn new(id: u64) -> Self {
        DealId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for DealId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "deal-{}", self.0)
    }
}

/// Identifier of a data-transfer session, assigned by the transfer driver when
/// the pull request is accepted on the wire.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    pub fn new(id: u64) -> Self {
        TransferId(id)
    }
}

impl Display for TransferId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// An on-chain actor address, carried opaquely.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Address {
    addr: String,
}

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.addr
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Network identity of the content provider.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PeerId {
    id: String,
}

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

//------------------------------------         Deal record         ------------------------------------------------//

/// Where to send vouchers once the payment channel is usable.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PaymentInfo {
    pub channel: Address,
    pub lane: u64,
}

/// The immutable terms of a retrieval deal, agreed before any bytes move.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DealProposal {
    pub id: DealId,
    pub payload_cid: Cid,
    pub selector: Selector,
    /// Price the provider charges per delivered byte.
    pub price_per_byte: TokenAmount,
    /// Number of received bytes after which the provider requests payment.
    pub payment_interval: u64,
    /// Growth of the interval after each settled payment.
    pub payment_interval_increase: u64,
    pub piece_cid: Option<Cid>,
    /// One-off price for unsealing the piece, charged with the first payment.
    pub unseal_price: TokenAmount,
    pub provider: PeerId,
}

/// The full client-side state of one retrieval deal: the proposal, the payment
/// parties, and the mutable accounting the state machine owns. This record is
/// the persistence unit; a snapshot of it is enough to resume the deal.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClientDealState {
    pub proposal: DealProposal,
    /// On-chain address funding the payment channel.
    pub client_address: Address,
    /// On-chain address of the provider, the channel counterparty.
    pub provider_address: Address,
    /// Budget the client is willing to spend on this deal; the payment channel
    /// is sized by it and payment requests beyond it fail the deal.
    pub total_funds: TokenAmount,
    pub status: DealStatus,
    pub transfer_id: Option<TransferId>,
    pub payment_info: Option<PaymentInfo>,
    /// CID of the pending on-chain message while creating or funding the channel.
    pub wait_msg_cid: Option<Cid>,
    pub total_received: u64,
    pub bytes_paid_for: u64,
    pub current_interval: u64,
    pub payment_requested: TokenAmount,
    pub funds_spent: TokenAmount,
    pub all_blocks_received: bool,
    pub last_payment_requested: bool,
    /// User-visible last error or rejection reason.
    pub message: String,
}

impl ClientDealState {
    pub fn new(
        proposal: DealProposal,
        client_address: Address,
        provider_address: Address,
        total_funds: TokenAmount,
    ) -> Self {
        let current_interval = proposal.payment_interval;
        ClientDealState {
            proposal,
            client_address,
            provider_address,
            total_funds,
            status: DealStatus::New,
            transfer_id: None,
            payment_info: None,
            wait_msg_cid: None,
            total_received: 0,
            bytes_paid_for: 0,
            current_interval,
            payment_requested: TokenAmount::zero(),
            funds_spent: TokenAmount::zero(),
            all_blocks_received: false,
            last_payment_requested: false,
            message: String::new(),
        }
    }

    pub fn id(&self) -> DealId {
        self.proposal.id
    }

    /// The cumulative value the next voucher must carry: everything already
    /// committed plus the outstanding request.
    pub fn voucher_amount(&self) -> TokenAmount {
        self.funds_spent.saturating_add(self.payment_requested)
    }

    /// Bytes delivered but not yet covered by an issued voucher.
    pub fn unpaid_bytes(&self) -> u64 {
        self.total_received.saturating_sub(self.bytes_paid_for)
    }
}
