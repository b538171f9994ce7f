use crate::amount::TokenAmount;
use crate::deal::{ClientDealState, PaymentInfo};
use crate::state_machine::error::TransitionError;
use crate::state_machine::{DealEvent, DealStatus};
use log::*;

/// Outcome of a successfully applied event.
#[derive(Clone, Copy, Debug)]
pub struct Applied {
    pub from: DealStatus,
    pub to: DealStatus,
}

impl Applied {
    pub fn entered_new_state(&self) -> bool {
        self.from != self.to
    }
}

/// Applies one event to the deal record.
///
/// This is the entire transition table: every legal `(status, event)` pair is
/// an arm, every other pair falls through to `InvalidTransition` with the
/// record untouched. Terminal deals reject everything.
pub fn apply(deal: &mut ClientDealState, event: DealEvent) -> Result<Applied, TransitionError> {
    use DealEvent::*;
    use DealStatus as S;

    let from = deal.status;
    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }

    let to = match (from, event) {
        (S::New, Open) => S::New,
        (S::New, DealProposed(transfer)) => {
            deal.transfer_id = Some(transfer);
            S::WaitForAcceptance
        }
        (_, WriteDealProposalErrored(err)) => {
            deal.message = format!("proposing deal: {err}");
            S::Errored
        }

        // Initial provider verdict
        (S::WaitForAcceptance, DealAccepted) => S::Accepted,
        (S::WaitForAcceptance, DealRejected(msg)) => {
            deal.message = format!("deal rejected: {msg}");
            S::Rejected
        }
        (S::WaitForAcceptance, DealNotFound(msg)) => {
            deal.message = format!("deal not found: {msg}");
            S::DealNotFound
        }
        (_, UnknownResponseReceived(status)) => {
            deal.message = format!("Unexpected deal response status: {status}");
            S::Failing
        }

        // Payment channel setup
        (S::Accepted, PaymentChannelCreateInitiated(msg_cid)) => {
            deal.wait_msg_cid = Some(msg_cid);
            S::PaymentChannelCreating
        }
        (S::Accepted, PaymentChannelAddingFunds(msg_cid, channel)) => {
            deal.wait_msg_cid = Some(msg_cid);
            // The lane is assigned once the channel is usable.
            deal.payment_info = Some(PaymentInfo { channel, lane: 0 });
            S::PaymentChannelAddingFunds
        }
        (S::Accepted | S::PaymentChannelCreating | S::PaymentChannelAddingFunds, PaymentChannelReady(channel, lane)) => {
            deal.payment_info = Some(PaymentInfo { channel, lane });
            deal.wait_msg_cid = None;
            S::Ongoing
        }
        (S::Accepted | S::PaymentChannelCreating, PaymentChannelErrored(err)) => {
            deal.message = format!("get or create payment channel: {err}");
            S::Failing
        }
        (S::PaymentChannelCreating | S::PaymentChannelAddingFunds, AllocateLaneErrored(err)) => {
            deal.message = format!("allocating payment lane: {err}");
            S::Failing
        }
        (S::PaymentChannelAddingFunds, PaymentChannelAddFundsErrored(err)) => {
            deal.message = format!("wait for add funds: {err}");
            S::Failing
        }

        (_, DataTransferError(err)) => {
            deal.message = format!("error generated by data transfer: {err}");
            S::Errored
        }

        // Receiving data
        (S::Ongoing | S::FundsNeeded | S::FundsNeededLastPayment, BlocksReceived(total)) => {
            record_received(deal, total);
            from
        }
        (s, BlocksReceived(total)) if s.in_payment_channel_setup() => {
            record_received(deal, total);
            from
        }
        (S::Ongoing | S::BlocksComplete, AllBlocksReceived) => {
            deal.all_blocks_received = true;
            S::BlocksComplete
        }
        (S::FundsNeededLastPayment, AllBlocksReceived) => {
            deal.all_blocks_received = true;
            S::SendFundsLastPayment
        }
        (s, AllBlocksReceived) if s.in_payment_channel_setup() => {
            deal.all_blocks_received = true;
            from
        }

        // Requests for payment
        (S::Ongoing | S::BlocksComplete | S::FundsNeeded, PaymentRequested(owed)) => {
            add_owed(deal, owed);
            S::FundsNeeded
        }
        (s, PaymentRequested(owed)) if s.in_payment_channel_setup() => {
            add_owed(deal, owed);
            from
        }
        (S::Ongoing | S::FundsNeeded | S::FundsNeededLastPayment, LastPaymentRequested(owed)) => {
            add_owed(deal, owed);
            deal.last_payment_requested = true;
            S::FundsNeededLastPayment
        }
        (S::BlocksComplete, LastPaymentRequested(owed)) => {
            add_owed(deal, owed);
            deal.last_payment_requested = true;
            S::SendFundsLastPayment
        }
        (s, LastPaymentRequested(owed)) if s.in_payment_channel_setup() => {
            add_owed(deal, owed);
            deal.last_payment_requested = true;
            from
        }

        // Sending payments
        (S::FundsNeeded, SendFunds) => S::SendFunds,
        (S::FundsNeededLastPayment, SendFunds) => S::SendFundsLastPayment,
        (
            S::FundsNeeded | S::FundsNeededLastPayment | S::SendFunds | S::SendFundsLastPayment,
            FundsExpended { expected, actual },
        ) => {
            deal.message = format!("not enough funds left: expected amt = {expected}, actual amt = {actual}");
            S::Failing
        }
        (
            S::FundsNeeded | S::FundsNeededLastPayment | S::SendFunds | S::SendFundsLastPayment,
            BadPaymentRequested(msg),
        ) => {
            deal.message = msg;
            S::Failing
        }
        (S::SendFunds | S::SendFundsLastPayment, CreateVoucherFailed(err)) => {
            deal.message = format!("creating payment voucher: {err}");
            S::Failing
        }
        (_, WriteDealPaymentErrored(err)) => {
            deal.message = format!("writing deal payment: {err}");
            S::Errored
        }
        (S::SendFunds, PaymentSent) => {
            settle_payment(deal);
            S::Ongoing
        }
        (S::SendFundsLastPayment, PaymentSent) => {
            settle_payment(deal);
            S::Finalizing
        }

        (S::Finalizing, Complete) => S::Completed,
        (S::Failing, CancelComplete) => S::Errored,

        (status, event) => {
            return Err(TransitionError::InvalidTransition { status, event: event.to_string() });
        }
    };

    deal.status = to;
    if to != from {
        debug!("{}: {from} -> {to}", deal.id());
    }
    Ok(Applied { from, to })
}

/// The driver reports cumulative totals; a stale total must never lower the count.
fn record_received(deal: &mut ClientDealState, total_received: u64) {
    if total_received < deal.total_received {
        warn!(
            "{}: ignoring stale transfer progress ({total_received} < {})",
            deal.id(),
            deal.total_received
        );
        return;
    }
    deal.total_received = total_received;
}

fn add_owed(deal: &mut ClientDealState, owed: TokenAmount) {
    deal.payment_requested = deal.payment_requested.saturating_add(owed);
}

/// Settles the outstanding request into the accounting. The interval grows at
/// most once per settled payment, however many intervals the payment spans:
/// payment cadence tracks provider requests, not client-side batching.
fn settle_payment(deal: &mut ClientDealState) {
    let owed = deal.payment_requested;
    deal.funds_spent = deal.funds_spent.saturating_add(owed);
    let bytes_paid = owed.full_bytes_at(deal.proposal.price_per_byte);
    if bytes_paid >= deal.current_interval {
        deal.current_interval = deal.current_interval.saturating_add(deal.proposal.payment_interval_increase);
    }
    deal.bytes_paid_for = deal.bytes_paid_for.saturating_add(bytes_paid);
    deal.payment_requested = TokenAmount::zero();
}
