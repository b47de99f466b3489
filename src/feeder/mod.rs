//! Feeder orchestrator
//!
//! Single reactive loop that owns the current governance params, assembles
//! one ordered vote list per voting period and hands it to the price poster.
//! States are running -> stopped, nothing in between: every reaction happens
//! inline within one loop iteration.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::provider::PriceProvider;
use crate::types::{Params, Price, VotingPeriod};

/// Vote price substituted for any invalid answer before posting.
const ABSTAIN_VOTE: f64 = 0.0;

/// Governance event feed consumed by the feeder.
///
/// The two receiver-returning methods are called exactly once, at feeder
/// construction, to take ownership of the inbound event channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStream: Send {
    /// Stream of wholesale governance parameter replacements.
    fn params_updates(&mut self) -> mpsc::Receiver<Params>;

    /// Stream of voting-period-start triggers.
    fn voting_periods(&mut self) -> mpsc::Receiver<VotingPeriod>;

    /// Releases the underlying event transport. Called exactly once.
    async fn close(&mut self);
}

/// Builds, signs and broadcasts the vote transaction for one voting period.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricePoster: Send {
    /// Submits the ordered vote list assembled for the period at `height`.
    async fn send_prices(&mut self, height: u64, prices: Vec<Price>);

    /// Releases broadcast resources. Called exactly once.
    async fn close(&mut self);
}

/// Central orchestrator: reacts to governance events until closed.
pub struct Feeder {
    stop: Option<oneshot::Sender<()>>,
    reactor: Option<JoinHandle<()>>,
    params_rx: watch::Receiver<Params>,
}

impl Feeder {
    /// Spawns the reactive loop. Must be called from within a tokio runtime.
    pub fn new(
        mut event_stream: Box<dyn EventStream>,
        price_provider: Box<dyn PriceProvider>,
        price_poster: Box<dyn PricePoster>,
    ) -> Self {
        let params_updates = event_stream.params_updates();
        let voting_periods = event_stream.voting_periods();
        let (params_tx, params_rx) = watch::channel(Params::default());
        let (stop_tx, stop_rx) = oneshot::channel();
        let reactor = tokio::spawn(react(
            stop_rx,
            params_updates,
            voting_periods,
            event_stream,
            price_provider,
            price_poster,
            params_tx,
        ));
        Self {
            stop: Some(stop_tx),
            reactor: Some(reactor),
            params_rx,
        }
    }

    /// Snapshot of the params currently held by the loop. Safe to call from
    /// any task; never reads the loop's state directly.
    pub fn params(&self) -> Params {
        self.params_rx.borrow().clone()
    }

    /// Stops the loop and waits until the event stream, the price provider
    /// and the price poster have each been closed exactly once. Safe to call
    /// twice; the second call returns immediately.
    pub async fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(reactor) = self.reactor.take() {
            let _ = reactor.await;
        }
    }
}

/// The reactive loop. Exits on the stop signal or when the event stream
/// ends, then closes every owned collaborator before completing.
async fn react(
    mut stop: oneshot::Receiver<()>,
    mut params_updates: mpsc::Receiver<Params>,
    mut voting_periods: mpsc::Receiver<VotingPeriod>,
    mut event_stream: Box<dyn EventStream>,
    mut price_provider: Box<dyn PriceProvider>,
    mut price_poster: Box<dyn PricePoster>,
    params_tx: watch::Sender<Params>,
) {
    let mut params = Params::default();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            update = params_updates.recv() => match update {
                Some(new_params) => {
                    info!(pairs = new_params.pairs.len(),
                          vote_period_blocks = new_params.vote_period_blocks,
                          "governance params updated");
                    params = new_params.clone();
                    let _ = params_tx.send(new_params);
                }
                None => {
                    debug!("params update stream ended");
                    break;
                }
            },
            period = voting_periods.recv() => match period {
                Some(voting_period) => {
                    let votes = assemble_votes(&params, price_provider.as_ref());
                    debug!(height = voting_period.height, votes = votes.len(),
                           "voting period started, posting prices");
                    price_poster.send_prices(voting_period.height, votes).await;
                }
                None => {
                    debug!("voting period stream ended");
                    break;
                }
            },
        }
    }

    event_stream.close().await;
    price_provider.close().await;
    price_poster.close().await;
    info!("feeder stopped");
}

/// One vote per configured pair, in params order. Invalid answers keep their
/// valid flag but have the price rewritten to the abstain convention.
fn assemble_votes(params: &Params, provider: &dyn PriceProvider) -> Vec<Price> {
    params
        .pairs
        .iter()
        .map(|pair| {
            let mut price = provider.get_price(pair);
            if !price.valid {
                price.price = ABSTAIN_VOTE;
            }
            price
        })
        .collect()
}
