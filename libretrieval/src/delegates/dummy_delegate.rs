use crate::amount::TokenAmount;
use crate::content::{Cid, Selector};
use crate::deal::{Address, DealProposal, PeerId, TransferId};
use crate::delegates::error::{ChannelManagerError, NetworkError, TransferError, VoucherError};
use crate::delegates::traits::{
    ChannelAvailability, DataTransferDriver, DealNetwork, PaymentChannelManager, RetrievalDelegate, VoucherSigner,
};
use crate::voucher::{DealPayment, SignedVoucher};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted in-memory implementation of every collaborator port.
///
/// The channel availability and the channel's spendable funds are configured
/// up front; everything the machine does (proposals written, transfers opened
/// and resumed, on-chain waits, payments) is recorded for inspection.
#[derive(Clone)]
pub struct DummyDelegate {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    availability: ChannelAvailability,
    channel: Address,
    channel_funds: TokenAmount,
    refuse_proposal: Option<String>,
    next_transfer: u64,
    next_lane: u64,
    voucher_nonce: u64,
    get_or_create_calls: u64,
    proposals: Vec<DealProposal>,
    payments: Vec<DealPayment>,
    opened: Vec<TransferId>,
    paused: Vec<TransferId>,
    resumed: Vec<TransferId>,
    closed: Vec<TransferId>,
    waited_create: Vec<Cid>,
    waited_add_funds: Vec<Cid>,
}

impl DummyDelegate {
    /// A channel that is usable immediately.
    pub fn ready(channel: Address, channel_funds: TokenAmount) -> Self {
        let availability = ChannelAvailability::Ready(channel.clone());
        Self::with_availability(availability, channel, channel_funds)
    }

    /// A channel whose creation message is pending; `wait_for_create` resolves
    /// to `channel`.
    pub fn creating(msg_cid: Cid, channel: Address, channel_funds: TokenAmount) -> Self {
        Self::with_availability(ChannelAvailability::Creating(msg_cid), channel, channel_funds)
    }

    /// An existing channel with an add-funds message pending.
    pub fn adding_funds(msg_cid: Cid, channel: Address, channel_funds: TokenAmount) -> Self {
        let availability = ChannelAvailability::AddingFunds(msg_cid, channel.clone());
        Self::with_availability(availability, channel, channel_funds)
    }

    fn with_availability(availability: ChannelAvailability, channel: Address, channel_funds: TokenAmount) -> Self {
        DummyDelegate {
            inner: Arc::new(Mutex::new(Inner {
                availability,
                channel,
                channel_funds,
                refuse_proposal: None,
                next_transfer: 0,
                next_lane: 0,
                voucher_nonce: 0,
                get_or_create_calls: 0,
                proposals: Vec::new(),
                payments: Vec::new(),
                opened: Vec::new(),
                paused: Vec::new(),
                resumed: Vec::new(),
                closed: Vec::new(),
                waited_create: Vec::new(),
                waited_add_funds: Vec::new(),
            })),
        }
    }

    /// Makes every proposal write fail with `message`.
    pub fn failing_proposal_writes(self, message: impl Into<String>) -> Self {
        self.inner().refuse_proposal = Some(message.into());
        self
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn proposals(&self) -> Vec<DealProposal> {
        self.inner().proposals.clone()
    }

    pub fn payments(&self) -> Vec<DealPayment> {
        self.inner().payments.clone()
    }

    pub fn opened(&self) -> Vec<TransferId> {
        self.inner().opened.clone()
    }

    pub fn paused(&self) -> Vec<TransferId> {
        self.inner().paused.clone()
    }

    pub fn resumed(&self) -> Vec<TransferId> {
        self.inner().resumed.clone()
    }

    pub fn closed(&self) -> Vec<TransferId> {
        self.inner().closed.clone()
    }

    pub fn waited_create(&self) -> Vec<Cid> {
        self.inner().waited_create.clone()
    }

    pub fn waited_add_funds(&self) -> Vec<Cid> {
        self.inner().waited_add_funds.clone()
    }

    pub fn get_or_create_calls(&self) -> u64 {
        self.inner().get_or_create_calls
    }
}

impl DealNetwork for DummyDelegate {
    async fn write_deal_proposal(&self, proposal: &DealProposal) -> Result<(), NetworkError> {
        let mut inner = self.inner();
        if let Some(message) = inner.refuse_proposal.clone() {
            return Err(NetworkError::Write(message));
        }
        inner.proposals.push(proposal.clone());
        Ok(())
    }

    async fn write_deal_payment(&self, payment: &DealPayment) -> Result<(), NetworkError> {
        self.inner().payments.push(payment.clone());
        Ok(())
    }
}

impl DataTransferDriver for DummyDelegate {
    async fn open_pull(
        &self,
        _provider: &PeerId,
        _payload_cid: &Cid,
        _selector: &Selector,
    ) -> Result<TransferId, TransferError> {
        let mut inner = self.inner();
        inner.next_transfer += 1;
        let transfer = TransferId::new(inner.next_transfer);
        inner.opened.push(transfer);
        Ok(transfer)
    }

    async fn pause(&self, transfer: TransferId) -> Result<(), TransferError> {
        self.inner().paused.push(transfer);
        Ok(())
    }

    async fn resume(&self, transfer: TransferId) -> Result<(), TransferError> {
        self.inner().resumed.push(transfer);
        Ok(())
    }

    async fn close(&self, transfer: TransferId) -> Result<(), TransferError> {
        self.inner().closed.push(transfer);
        Ok(())
    }
}

impl PaymentChannelManager for DummyDelegate {
    async fn get_or_create(
        &self,
        _client: &Address,
        _provider: &Address,
        _amount: TokenAmount,
    ) -> Result<ChannelAvailability, ChannelManagerError> {
        let mut inner = self.inner();
        inner.get_or_create_calls += 1;
        Ok(inner.availability.clone())
    }

    async fn wait_for_create(&self, msg_cid: &Cid) -> Result<Address, ChannelManagerError> {
        let mut inner = self.inner();
        inner.waited_create.push(msg_cid.clone());
        Ok(inner.channel.clone())
    }

    async fn wait_for_add_funds(&self, msg_cid: &Cid) -> Result<(), ChannelManagerError> {
        self.inner().waited_add_funds.push(msg_cid.clone());
        Ok(())
    }

    async fn allocate_lane(&self, _channel: &Address) -> Result<u64, ChannelManagerError> {
        let mut inner = self.inner();
        let lane = inner.next_lane;
        inner.next_lane += 1;
        Ok(lane)
    }
}

impl VoucherSigner for DummyDelegate {
    async fn create_voucher(
        &self,
        channel: &Address,
        lane: u64,
        amount: TokenAmount,
    ) -> Result<SignedVoucher, VoucherError> {
        let mut inner = self.inner();
        if amount > inner.channel_funds {
            return Err(VoucherError::Shortfall { expected: amount, actual: inner.channel_funds });
        }
        inner.voucher_nonce += 1;
        Ok(SignedVoucher {
            channel: channel.clone(),
            lane,
            nonce: inner.voucher_nonce,
            amount,
            signature: b"dummy-voucher-sig".to_vec(),
        })
    }
}

impl RetrievalDelegate for DummyDelegate {}
