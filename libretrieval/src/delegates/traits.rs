use crate::amount::TokenAmount;
use crate::content::{Cid, Selector};
use crate::deal::{Address, DealProposal, PeerId, TransferId};
use crate::delegates::error::{ChannelManagerError, NetworkError, TransferError, VoucherError};
use crate::voucher::{DealPayment, SignedVoucher};
use std::future::Future;

//--------------------------------------   Wire writes    -------------------------------------------------------------

pub trait DealNetwork {
    fn write_deal_proposal(&self, proposal: &DealProposal) -> impl Future<Output = Result<(), NetworkError>> + Send;

    fn write_deal_payment(&self, payment: &DealPayment) -> impl Future<Output = Result<(), NetworkError>> + Send;
}

//--------------------------------------   Data transfer   ------------------------------------------------------------

/// Control surface of the data-transfer driver. Progress (`BlocksReceived`,
/// `AllBlocksReceived`, `DataTransferError`) arrives as deal events submitted
/// by whoever drives the transport.
pub trait DataTransferDriver {
    fn open_pull(
        &self,
        provider: &PeerId,
        payload_cid: &Cid,
        selector: &Selector,
    ) -> impl Future<Output = Result<TransferId, TransferError>> + Send;

    fn pause(&self, transfer: TransferId) -> impl Future<Output = Result<(), TransferError>> + Send;

    fn resume(&self, transfer: TransferId) -> impl Future<Output = Result<(), TransferError>> + Send;

    fn close(&self, transfer: TransferId) -> impl Future<Output = Result<(), TransferError>> + Send;
}

//--------------------------------------   Payment channel   ----------------------------------------------------------

/// What `get_or_create` found: a channel that is usable right now, or a pending
/// on-chain message the deal has to wait out first.
#[derive(Clone, Debug)]
pub enum ChannelAvailability {
    Ready(Address),
    Creating(Cid),
    AddingFunds(Cid, Address),
}

/// The payment-channel manager mediates the process-global channel shared by
/// every deal with the same provider; lane allocation and funding are mutually
/// exclusive behind it.
pub trait PaymentChannelManager {
    fn get_or_create(
        &self,
        client: &Address,
        provider: &Address,
        amount: TokenAmount,
    ) -> impl Future<Output = Result<ChannelAvailability, ChannelManagerError>> + Send;

    /// Waits for the channel-creation message to land on chain.
    fn wait_for_create(&self, msg_cid: &Cid) -> impl Future<Output = Result<Address, ChannelManagerError>> + Send;

    /// Waits for the add-funds message to land on chain.
    fn wait_for_add_funds(&self, msg_cid: &Cid) -> impl Future<Output = Result<(), ChannelManagerError>> + Send;

    fn allocate_lane(&self, channel: &Address) -> impl Future<Output = Result<u64, ChannelManagerError>> + Send;
}

//--------------------------------------   Voucher signing   ----------------------------------------------------------

pub trait VoucherSigner {
    fn create_voucher(
        &self,
        channel: &Address,
        lane: u64,
        amount: TokenAmount,
    ) -> impl Future<Output = Result<SignedVoucher, VoucherError>> + Send;
}

//--------------------       Convenience all-inclusive delegate trait     ----------------------------------------------

pub trait RetrievalDelegate:
    Clone + Send + Sync + 'static + DealNetwork + DataTransferDriver + PaymentChannelManager + VoucherSigner
{
}
