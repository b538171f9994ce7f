use crate::deal::{ClientDealState, DealId};
use crate::delegates::RetrievalDelegate;
use crate::state_machine::handlers::{run_entry_handler, HandlerContext};
use crate::state_machine::{transitions, DealEvent, DealStatus};
use futures::channel::mpsc;
use futures::StreamExt;
use log::*;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Published after every applied event.
#[derive(Clone, Debug)]
pub struct DealNotification {
    pub deal_id: DealId,
    pub event: DealEvent,
    pub status: DealStatus,
}

#[derive(Debug, Error)]
#[error("deal machine for {0} has stopped and no longer accepts events")]
pub struct SubmitError(DealId);

/// The owner's handle on a running deal: submit events, watch transitions,
/// query the record. The deal record itself is owned by the machine task and
/// only ever mutated there, one event at a time.
pub struct DealHandle {
    deal_id: DealId,
    record: Arc<RwLock<ClientDealState>>,
    events: mpsc::UnboundedSender<DealEvent>,
    notifications: broadcast::Sender<DealNotification>,
    task: JoinHandle<()>,
}

impl DealHandle {
    /// Spawns the state machine task for `deal`.
    ///
    /// A fresh record waits in `New` for the owner to submit `Open`. A record
    /// recovered from a snapshot re-enters its current state's entry action
    /// instead, which picks pending on-chain work back up via the recorded
    /// wait-message CID.
    pub fn spawn<D: RetrievalDelegate>(deal: ClientDealState, delegate: D) -> DealHandle {
        let deal_id = deal.id();
        let (events, inbox) = mpsc::unbounded();
        let (notifications, _) = broadcast::channel(64);
        let record = Arc::new(RwLock::new(deal));
        let ctx = HandlerContext { delegate, record: Arc::clone(&record), events: events.clone() };
        let task = tokio::spawn(run_deal(Arc::clone(&record), ctx, inbox, notifications.clone()));
        DealHandle { deal_id, record, events, notifications, task }
    }

    pub fn deal_id(&self) -> DealId {
        self.deal_id
    }

    /// Pushes an event into the deal's inbox. Events are applied strictly in
    /// submission order.
    pub fn submit(&self, event: DealEvent) -> Result<(), SubmitError> {
        self.events.unbounded_send(event).map_err(|_| SubmitError(self.deal_id))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DealNotification> {
        self.notifications.subscribe()
    }

    pub async fn state(&self) -> ClientDealState {
        self.record.read().await.clone()
    }

    pub async fn status(&self) -> DealStatus {
        self.record.read().await.status
    }

    /// Waits for the machine to stop (a resolved status) and returns the final
    /// record.
    pub async fn joined(self) -> ClientDealState {
        if let Err(e) = self.task.await {
            error!("{}: deal task ended abnormally: {e}", self.deal_id);
        }
        self.record.read().await.clone()
    }
}

async fn run_deal<D: RetrievalDelegate>(
    record: Arc<RwLock<ClientDealState>>,
    ctx: HandlerContext<D>,
    mut inbox: mpsc::UnboundedReceiver<DealEvent>,
    notifications: broadcast::Sender<DealNotification>,
) {
    let mut active_handler: Option<JoinHandle<()>> = None;
    let (deal_id, status) = {
        let deal = record.read().await;
        (deal.id(), deal.status)
    };
    if status.is_resolved() {
        debug!("{deal_id}: already resolved as {status}, nothing to drive");
        return;
    }
    // A recovered record re-enters its current state. Fresh deals sit in New
    // until the owner submits Open.
    if status != DealStatus::New {
        debug!("{deal_id}: resuming at {status}");
        active_handler = Some(tokio::spawn(run_entry_handler(status, ctx.clone())));
    }
    while let Some(event) = inbox.next().await {
        let mut deal = record.write().await;
        let applied = match transitions::apply(&mut deal, event.clone()) {
            Ok(applied) => applied,
            Err(e) => {
                drop(deal);
                warn!("{deal_id}: rejected event {event}: {e}");
                continue;
            }
        };
        let status = deal.status;
        drop(deal);
        let _ = notifications.send(DealNotification { deal_id, event: event.clone(), status });
        // Open re-enters New without a status change; it must still start the
        // proposal action.
        if applied.entered_new_state() || matches!(event, DealEvent::Open) {
            if let Some(handler) = active_handler.take() {
                // A handler of a state we just left has nothing valid left to
                // do; it is cancelled at its next suspension point.
                handler.abort();
            }
            if status.is_resolved() {
                info!("{deal_id}: resolved as {status}");
                break;
            }
            active_handler = Some(tokio::spawn(run_entry_handler(status, ctx.clone())));
        }
    }
    if let Some(handler) = active_handler.take() {
        handler.abort();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::amount::TokenAmount;
    use crate::content::{Cid, Selector};
    use crate::deal::{Address, ClientDealState, DealId, DealProposal, PaymentInfo, PeerId, TransferId};
    use crate::delegates::dummy_delegate::DummyDelegate;
    use crate::messages::{DealResponse, ResponseStatus};
    use std::time::Duration;
    use tokio::time::timeout;

    fn atto(n: u128) -> TokenAmount {
        TokenAmount::from_atto(n)
    }

    fn proposal() -> DealProposal {
        DealProposal {
            id: DealId::new(7),
            payload_cid: Cid::new("bafypayload"),
            selector: Selector::all(),
            price_per_byte: atto(2),
            payment_interval: 1000,
            payment_interval_increase: 500,
            piece_cid: None,
            unseal_price: TokenAmount::zero(),
            provider: PeerId::new("provider-1"),
        }
    }

    fn new_deal(total_funds: u128) -> ClientDealState {
        ClientDealState::new(
            proposal(),
            Address::new("f1client"),
            Address::new("f1provider"),
            atto(total_funds),
        )
    }

    /// Drains notifications until one matches, with a timeout so a wedged
    /// machine fails the test instead of hanging it.
    async fn next_matching(
        rx: &mut broadcast::Receiver<DealNotification>,
        pred: impl Fn(&DealNotification) -> bool,
    ) -> DealNotification {
        loop {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Ok(note)) => {
                    if pred(&note) {
                        return note;
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => panic!("machine stopped before the expected event"),
                Err(_) => panic!("timed out waiting for the expected event"),
            }
        }
    }

    #[tokio::test]
    async fn happy_path_end_to_end() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::ready(Address::new("paychA"), atto(5000));
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());
        let mut rx = handle.subscribe();

        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        handle.submit(DealEvent::DealAccepted).unwrap();
        next_matching(&mut rx, |n| n.status == DealStatus::Ongoing).await;

        handle.submit(DealEvent::BlocksReceived(1000)).unwrap();
        handle.submit(DealEvent::PaymentRequested(atto(2000))).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::PaymentSent)).await;

        handle.submit(DealEvent::AllBlocksReceived).unwrap();
        handle.submit(DealEvent::LastPaymentRequested(TokenAmount::zero())).unwrap();
        next_matching(&mut rx, |n| n.status == DealStatus::Finalizing).await;

        handle.submit(DealEvent::Complete).unwrap();
        let final_state = handle.joined().await;

        assert_eq!(final_state.status, DealStatus::Completed);
        assert_eq!(final_state.funds_spent, atto(2000));
        assert_eq!(final_state.bytes_paid_for, 1000);
        assert_eq!(final_state.current_interval, 1500);
        assert_eq!(
            final_state.payment_info,
            Some(PaymentInfo { channel: Address::new("paychA"), lane: 0 })
        );

        assert_eq!(delegate.proposals().len(), 1);
        assert_eq!(delegate.opened(), vec![TransferId::new(1)]);
        let payments = delegate.payments();
        assert_eq!(payments.len(), 2);
        // Voucher amounts are cumulative per lane.
        assert_eq!(payments[0].voucher.amount, atto(2000));
        assert_eq!(payments[1].voucher.amount, atto(2000));
        assert!(delegate.resumed().contains(&TransferId::new(1)));
        assert!(delegate.closed().is_empty());
    }

    #[tokio::test]
    async fn channel_create_flow_waits_for_the_recorded_message() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::creating(Cid::new("bafymsg1"), Address::new("paychA"), atto(5000));
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());
        let mut rx = handle.subscribe();

        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        handle.submit(DealEvent::DealAccepted).unwrap();
        next_matching(&mut rx, |n| n.status == DealStatus::PaymentChannelCreating).await;
        next_matching(&mut rx, |n| n.status == DealStatus::Ongoing).await;

        let state = handle.state().await;
        assert_eq!(state.payment_info, Some(PaymentInfo { channel: Address::new("paychA"), lane: 0 }));
        assert_eq!(state.wait_msg_cid, None);
        assert_eq!(delegate.waited_create(), vec![Cid::new("bafymsg1")]);
        assert_eq!(delegate.get_or_create_calls(), 1);
    }

    #[tokio::test]
    async fn add_funds_flow_reuses_the_existing_channel() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::adding_funds(Cid::new("bafymsg2"), Address::new("paychB"), atto(5000));
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());
        let mut rx = handle.subscribe();

        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        handle.submit(DealEvent::DealAccepted).unwrap();
        next_matching(&mut rx, |n| n.status == DealStatus::PaymentChannelAddingFunds).await;
        next_matching(&mut rx, |n| n.status == DealStatus::Ongoing).await;

        let state = handle.state().await;
        assert_eq!(state.payment_info, Some(PaymentInfo { channel: Address::new("paychB"), lane: 0 }));
        assert_eq!(delegate.waited_add_funds(), vec![Cid::new("bafymsg2")]);
    }

    #[tokio::test]
    async fn provider_rejection_resolves_the_deal() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::ready(Address::new("paychA"), atto(5000));
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());
        let mut rx = handle.subscribe();

        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        let response = DealResponse {
            id: DealId::new(7),
            status: ResponseStatus::Rejected,
            message: "price too low".to_string(),
            payment_owed: TokenAmount::zero(),
        };
        handle.submit(response.into_event()).unwrap();
        let final_state = handle.joined().await;

        assert_eq!(final_state.status, DealStatus::Rejected);
        assert_eq!(final_state.message, "deal rejected: price too low");
        // Rejection is not a failure path; nothing is torn down.
        assert!(delegate.closed().is_empty());
    }

    #[tokio::test]
    async fn exhausted_funds_cancel_the_transfer_and_error_the_deal() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::ready(Address::new("paychA"), atto(1000));
        let handle = DealHandle::spawn(new_deal(1000), delegate.clone());
        let mut rx = handle.subscribe();

        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        handle.submit(DealEvent::DealAccepted).unwrap();
        next_matching(&mut rx, |n| n.status == DealStatus::Ongoing).await;

        handle.submit(DealEvent::BlocksReceived(1000)).unwrap();
        handle.submit(DealEvent::PaymentRequested(atto(2000))).unwrap();
        let final_state = handle.joined().await;

        assert_eq!(final_state.status, DealStatus::Errored);
        // expected = amount needed, actual = amount available.
        assert_eq!(final_state.message, "not enough funds left: expected amt = 2000, actual amt = 1000");
        assert_eq!(delegate.closed(), vec![TransferId::new(1)]);
        assert!(delegate.payments().is_empty());
    }

    #[tokio::test]
    async fn failed_proposal_write_errors_the_deal() {
        env_logger::try_init().ok();
        let delegate =
            DummyDelegate::ready(Address::new("paychA"), atto(5000)).failing_proposal_writes("connection refused");
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());

        handle.submit(DealEvent::Open).unwrap();
        let final_state = handle.joined().await;

        assert_eq!(final_state.status, DealStatus::Errored);
        assert!(final_state.message.starts_with("proposing deal:"), "got: {}", final_state.message);
        assert!(final_state.message.contains("connection refused"));
        assert!(delegate.opened().is_empty());
    }

    #[tokio::test]
    async fn recovery_resumes_a_pending_channel_create() {
        env_logger::try_init().ok();
        let mut deal = new_deal(5000);
        deal.status = DealStatus::PaymentChannelCreating;
        deal.transfer_id = Some(TransferId::new(9));
        deal.wait_msg_cid = Some(Cid::new("bafypending"));

        let delegate = DummyDelegate::creating(Cid::new("bafypending"), Address::new("paychC"), atto(5000));
        let handle = DealHandle::spawn(deal, delegate.clone());
        let mut rx = handle.subscribe();

        next_matching(&mut rx, |n| n.status == DealStatus::Ongoing).await;

        let state = handle.state().await;
        assert_eq!(state.payment_info, Some(PaymentInfo { channel: Address::new("paychC"), lane: 0 }));
        // The pending message was waited out, never resubmitted.
        assert_eq!(delegate.get_or_create_calls(), 0);
        assert_eq!(delegate.waited_create(), vec![Cid::new("bafypending")]);
    }

    #[tokio::test]
    async fn contract_violations_do_not_kill_the_machine() {
        env_logger::try_init().ok();
        let delegate = DummyDelegate::ready(Address::new("paychA"), atto(5000));
        let handle = DealHandle::spawn(new_deal(5000), delegate.clone());
        let mut rx = handle.subscribe();

        // PaymentSent out of nowhere is a reported violation, nothing more.
        handle.submit(DealEvent::PaymentSent).unwrap();
        handle.submit(DealEvent::Open).unwrap();
        next_matching(&mut rx, |n| matches!(n.event, DealEvent::DealProposed(_))).await;
        assert_eq!(handle.status().await, DealStatus::WaitForAcceptance);
    }
}
