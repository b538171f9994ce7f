use crate::deal::ClientDealState;
use crate::delegates::{
    ChannelAvailability, DataTransferDriver, DealNetwork, PaymentChannelManager, RetrievalDelegate, VoucherError,
    VoucherSigner,
};
use crate::state_machine::{DealEvent, DealStatus};
use crate::voucher::DealPayment;
use futures::channel::mpsc;
use log::*;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything an entry handler may touch: the collaborators, a read handle on
/// the deal record, and the event inbox. Handlers never mutate the record;
/// all mutation funnels through submitted events.
pub(crate) struct HandlerContext<D: RetrievalDelegate> {
    pub delegate: D,
    pub record: Arc<RwLock<ClientDealState>>,
    pub events: mpsc::UnboundedSender<DealEvent>,
}

impl<D: RetrievalDelegate> Clone for HandlerContext<D> {
    fn clone(&self) -> Self {
        HandlerContext {
            delegate: self.delegate.clone(),
            record: Arc::clone(&self.record),
            events: self.events.clone(),
        }
    }
}

impl<D: RetrievalDelegate> HandlerContext<D> {
    fn submit(&self, event: DealEvent) {
        if self.events.unbounded_send(event).is_err() {
            debug!("deal machine stopped before the event could be delivered");
        }
    }

    async fn snapshot(&self) -> ClientDealState {
        self.record.read().await.clone()
    }
}

/// Runs the entry action for `status`. States without one return immediately.
pub(crate) async fn run_entry_handler<D: RetrievalDelegate>(status: DealStatus, ctx: HandlerContext<D>) {
    match status {
        DealStatus::New => propose_deal(ctx).await,
        DealStatus::Accepted => setup_payment_channel(ctx).await,
        DealStatus::PaymentChannelCreating => wait_for_create(ctx).await,
        DealStatus::PaymentChannelAddingFunds => wait_for_add_funds(ctx).await,
        DealStatus::Ongoing => ongoing(ctx).await,
        DealStatus::FundsNeeded | DealStatus::FundsNeededLastPayment => process_payment_requested(ctx).await,
        DealStatus::SendFunds | DealStatus::SendFundsLastPayment => send_funds(ctx).await,
        DealStatus::Failing => cancel_deal(ctx).await,
        _ => {}
    }
}

/// Writes the proposal on the wire and opens the pull transfer.
async fn propose_deal<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    debug!("{}: proposing retrieval of {} to {}", deal.id(), deal.proposal.payload_cid, deal.proposal.provider);
    if let Err(e) = ctx.delegate.write_deal_proposal(&deal.proposal).await {
        ctx.submit(DealEvent::WriteDealProposalErrored(e.to_string()));
        return;
    }
    match ctx
        .delegate
        .open_pull(&deal.proposal.provider, &deal.proposal.payload_cid, &deal.proposal.selector)
        .await
    {
        Ok(transfer) => ctx.submit(DealEvent::DealProposed(transfer)),
        Err(e) => ctx.submit(DealEvent::WriteDealProposalErrored(e.to_string())),
    }
}

/// Asks the channel manager for a channel sized by the deal's budget.
async fn setup_payment_channel<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    match ctx.delegate.get_or_create(&deal.client_address, &deal.provider_address, deal.total_funds).await {
        Ok(ChannelAvailability::Ready(channel)) => match ctx.delegate.allocate_lane(&channel).await {
            Ok(lane) => ctx.submit(DealEvent::PaymentChannelReady(channel, lane)),
            // Still in Accepted; the lane failure surfaces as a channel failure.
            Err(e) => ctx.submit(DealEvent::PaymentChannelErrored(e.to_string())),
        },
        Ok(ChannelAvailability::Creating(msg_cid)) => {
            ctx.submit(DealEvent::PaymentChannelCreateInitiated(msg_cid))
        }
        Ok(ChannelAvailability::AddingFunds(msg_cid, channel)) => {
            ctx.submit(DealEvent::PaymentChannelAddingFunds(msg_cid, channel))
        }
        Err(e) => ctx.submit(DealEvent::PaymentChannelErrored(e.to_string())),
    }
}

/// Waits out the recorded channel-creation message, then claims a lane.
/// Reading the message CID from the record makes re-entry after a restart
/// idempotent: the pending message is never resubmitted.
async fn wait_for_create<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    let Some(msg_cid) = deal.wait_msg_cid else {
        ctx.submit(DealEvent::PaymentChannelErrored("no pending channel message recorded".to_string()));
        return;
    };
    match ctx.delegate.wait_for_create(&msg_cid).await {
        Ok(channel) => match ctx.delegate.allocate_lane(&channel).await {
            Ok(lane) => ctx.submit(DealEvent::PaymentChannelReady(channel, lane)),
            Err(e) => ctx.submit(DealEvent::AllocateLaneErrored(e.to_string())),
        },
        Err(e) => ctx.submit(DealEvent::PaymentChannelErrored(e.to_string())),
    }
}

/// Waits out the recorded add-funds message on the already-known channel.
async fn wait_for_add_funds<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    let (Some(msg_cid), Some(info)) = (deal.wait_msg_cid, deal.payment_info) else {
        ctx.submit(DealEvent::PaymentChannelAddFundsErrored(
            "no pending add-funds message recorded".to_string(),
        ));
        return;
    };
    match ctx.delegate.wait_for_add_funds(&msg_cid).await {
        Ok(()) => match ctx.delegate.allocate_lane(&info.channel).await {
            Ok(lane) => ctx.submit(DealEvent::PaymentChannelReady(info.channel, lane)),
            Err(e) => ctx.submit(DealEvent::AllocateLaneErrored(e.to_string())),
        },
        Err(e) => ctx.submit(DealEvent::PaymentChannelAddFundsErrored(e.to_string())),
    }
}

/// Unpauses the transfer; progress from here is event-driven.
async fn ongoing<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    let Some(transfer) = deal.transfer_id else {
        return;
    };
    if let Err(e) = ctx.delegate.resume(transfer).await {
        ctx.submit(DealEvent::DataTransferError(e.to_string()));
    }
}

/// Checks the provider's request against the budget and the delivered bytes.
async fn process_payment_requested<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    let required = deal.funds_spent.saturating_add(deal.payment_requested);
    if required > deal.total_funds {
        ctx.submit(DealEvent::FundsExpended { expected: required, actual: deal.total_funds });
        return;
    }
    match deal.proposal.price_per_byte.checked_mul_bytes(deal.unpaid_bytes()) {
        Some(covered) if deal.payment_requested <= covered => ctx.submit(DealEvent::SendFunds),
        _ => ctx.submit(DealEvent::BadPaymentRequested("too much money requested for bytes sent".to_string())),
    }
}

/// Signs a voucher for everything owed so far, writes it, and unpauses the
/// transfer so the provider keeps sending while the payment settles.
async fn send_funds<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    let Some(info) = deal.payment_info.clone() else {
        ctx.submit(DealEvent::CreateVoucherFailed("payment channel is not ready".to_string()));
        return;
    };
    let amount = deal.voucher_amount();
    let voucher = match ctx.delegate.create_voucher(&info.channel, info.lane, amount).await {
        Ok(voucher) => voucher,
        Err(VoucherError::Shortfall { expected, actual }) => {
            ctx.submit(DealEvent::FundsExpended { expected, actual });
            return;
        }
        Err(e) => {
            ctx.submit(DealEvent::CreateVoucherFailed(e.to_string()));
            return;
        }
    };
    let payment = DealPayment { deal_id: deal.id(), channel: info.channel, voucher };
    if let Err(e) = ctx.delegate.write_deal_payment(&payment).await {
        ctx.submit(DealEvent::WriteDealPaymentErrored(e.to_string()));
        return;
    }
    if let Some(transfer) = deal.transfer_id {
        if let Err(e) = ctx.delegate.resume(transfer).await {
            ctx.submit(DealEvent::DataTransferError(e.to_string()));
            return;
        }
    }
    ctx.submit(DealEvent::PaymentSent);
}

/// Tears the transfer down before the deal errors out.
async fn cancel_deal<D: RetrievalDelegate>(ctx: HandlerContext<D>) {
    let deal = ctx.snapshot().await;
    if let Some(transfer) = deal.transfer_id {
        if let Err(e) = ctx.delegate.close(transfer).await {
            warn!("{}: closing data transfer during cancel failed: {e}", deal.id());
        }
    }
    ctx.submit(DealEvent::CancelComplete);
}
