//! End-to-end feeder flow over channel-backed collaborators
//!
//! Drives ticks through real providers into the feeder and checks the vote
//! lists handed to the poster, then the shutdown fan-out.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use price_feeder::feeder::{EventStream, Feeder, PricePoster};
use price_feeder::provider::sources::{ChannelSource, Source, SourceRegistry, TickBatch};
use price_feeder::provider::{AggregatePriceProvider, CachedPriceProvider, PriceProvider};
use price_feeder::types::{AssetPair, Params, Price, RawPrice, Symbol, VotingPeriod};

struct ChannelEventStream {
    params: Option<mpsc::Receiver<Params>>,
    periods: Option<mpsc::Receiver<VotingPeriod>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl EventStream for ChannelEventStream {
    fn params_updates(&mut self) -> mpsc::Receiver<Params> {
        self.params.take().expect("params receiver taken twice")
    }

    fn voting_periods(&mut self) -> mpsc::Receiver<VotingPeriod> {
        self.periods.take().expect("period receiver taken twice")
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct RecordingPoster {
    posted: mpsc::Sender<(u64, Vec<Price>)>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl PricePoster for RecordingPoster {
    async fn send_prices(&mut self, height: u64, prices: Vec<Price>) {
        self.posted.send((height, prices)).await.expect("test sink");
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn pair(s: &str) -> AssetPair {
    s.parse().unwrap()
}

struct Rig {
    feeder: Feeder,
    params_tx: mpsc::Sender<Params>,
    period_tx: mpsc::Sender<VotingPeriod>,
    posted_rx: mpsc::Receiver<(u64, Vec<Price>)>,
    stream_closes: Arc<AtomicUsize>,
    poster_closes: Arc<AtomicUsize>,
}

fn rig(provider: Box<dyn PriceProvider>) -> Rig {
    let (params_tx, params_rx) = mpsc::channel(4);
    let (period_tx, period_rx) = mpsc::channel(4);
    let (posted_tx, posted_rx) = mpsc::channel(4);
    let stream_closes = Arc::new(AtomicUsize::new(0));
    let poster_closes = Arc::new(AtomicUsize::new(0));

    let feeder = Feeder::new(
        Box::new(ChannelEventStream {
            params: Some(params_rx),
            periods: Some(period_rx),
            closes: Arc::clone(&stream_closes),
        }),
        provider,
        Box::new(RecordingPoster {
            posted: posted_tx,
            closes: Arc::clone(&poster_closes),
        }),
    );

    Rig {
        feeder,
        params_tx,
        period_tx,
        posted_rx,
        stream_closes,
        poster_closes,
    }
}

#[tokio::test]
async fn ticks_flow_from_sources_to_posted_votes() {
    // two exchanges: binance prices BTC, bitfinex prices nothing yet
    let (binance_source, binance_tx) = ChannelSource::new(8);
    let binance = CachedPriceProvider::new(
        Box::new(binance_source),
        "binance",
        HashMap::from([(pair("ubtc:unusd"), Symbol::from("BTCUSDT"))]),
    );
    let (bitfinex_source, _bitfinex_tx) = ChannelSource::new(8);
    let bitfinex = CachedPriceProvider::new(
        Box::new(bitfinex_source),
        "bitfinex",
        HashMap::from([
            (pair("ubtc:unusd"), Symbol::from("tBTCUSD")),
            (pair("ueth:unusd"), Symbol::from("tETHUSD")),
        ]),
    );
    let aggregate = AggregatePriceProvider::new(vec![Box::new(binance), Box::new(bitfinex)]);

    let mut rig = rig(Box::new(aggregate));

    rig.params_tx
        .send(Params {
            pairs: vec![pair("ubtc:unusd"), pair("ueth:unusd")],
            vote_period_blocks: 50,
        })
        .await
        .unwrap();

    let batch = TickBatch::from([(Symbol::from("BTCUSDT"), RawPrice::new(100_000.8, Utc::now()))]);
    binance_tx.send(batch).await.unwrap();
    sleep(Duration::from_millis(30)).await;

    assert_eq!(rig.feeder.params().pairs.len(), 2);

    rig.period_tx.send(VotingPeriod { height: 100 }).await.unwrap();
    let (height, votes) = rig.posted_rx.recv().await.unwrap();

    assert_eq!(height, 100);
    assert_eq!(votes.len(), 2);

    // BTC: first valid source wins
    assert_eq!(votes[0].pair, pair("ubtc:unusd"));
    assert_eq!(votes[0].price, 100_000.8);
    assert_eq!(votes[0].source_name, "binance");
    assert!(votes[0].valid);

    // ETH: mapped on bitfinex but never ticked -> abstain entry, order kept
    assert_eq!(votes[1].pair, pair("ueth:unusd"));
    assert_eq!(votes[1].price, 0.0);
    assert!(!votes[1].valid);

    rig.feeder.close().await;
    assert_eq!(rig.stream_closes.load(Ordering::SeqCst), 1);
    assert_eq!(rig.poster_closes.load(Ordering::SeqCst), 1);
    // providers were closed too: the source channel is gone
    assert!(binance_tx.send(TickBatch::new()).await.is_err());
}

#[tokio::test]
async fn voting_period_before_params_posts_no_votes() {
    let (source, _tx) = ChannelSource::new(1);
    let provider = CachedPriceProvider::new(Box::new(source), "binance", HashMap::new());
    let mut rig = rig(Box::new(provider));

    rig.period_tx.send(VotingPeriod { height: 1 }).await.unwrap();
    let (height, votes) = rig.posted_rx.recv().await.unwrap();
    assert_eq!(height, 1);
    assert!(votes.is_empty());

    rig.feeder.close().await;
}

#[tokio::test]
async fn registry_built_aggregate_serves_the_feeder() {
    let mut registry = SourceRegistry::new();
    registry.register(
        "binance",
        Box::new(|_symbols| {
            let (source, _tx) = ChannelSource::new(1);
            Box::new(source) as Box<dyn Source>
        }),
    );

    let maps = HashMap::from([(
        "binance".to_string(),
        HashMap::from([(pair("ubtc:unusd"), Symbol::from("BTCUSDT"))]),
    )]);
    let aggregate = AggregatePriceProvider::from_registry(&registry, &maps).unwrap();
    let mut rig = rig(Box::new(aggregate));

    rig.params_tx
        .send(Params {
            pairs: vec![pair("ubtc:unusd")],
            vote_period_blocks: 10,
        })
        .await
        .unwrap();
    sleep(Duration::from_millis(20)).await;

    rig.period_tx.send(VotingPeriod { height: 5 }).await.unwrap();
    let (_, votes) = rig.posted_rx.recv().await.unwrap();

    // mapped but unseen: abstain vote, still one entry for the pair
    assert_eq!(votes.len(), 1);
    assert!(!votes[0].valid);

    rig.feeder.close().await;

    let missing = AggregatePriceProvider::from_registry(
        &registry,
        &HashMap::from([("kraken".to_string(), HashMap::new())]),
    );
    assert!(missing.is_err());
}
