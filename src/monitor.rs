//! Watches the ledger for resolution requests and drives the pipeline end to
//! end. Two trigger sources feed one entry point: a ws event subscription
//! (push) and a bounded periodic scan (poll backstop). Dedup, retry, and
//! sequencing live here and nowhere else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::consensus::ConsensusEngine;
use crate::error::OracleError;
use crate::eth::client::ChainClient;
use crate::eth::events;
use crate::relay::SettlementSink;
use crate::store::ProcessedStore;
use crate::types::{RelayTask, ResolutionRequest};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct EventMonitor {
    engine: Arc<ConsensusEngine>,
    relay: Arc<dyn SettlementSink>,
    store: Arc<dyn ProcessedStore>,
    chain: Arc<ChainClient>,
    relay_url: String,
    poll_interval: Duration,
    poll_window_blocks: u64,
    retry_delay: Duration,
    watching: AtomicBool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub watching: bool,
    pub addresses: StatusAddresses,
    pub chain_id: u64,
    pub processed_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusAddresses {
    pub market: String,
    pub relay: String,
}

impl EventMonitor {
    pub fn new(
        engine: Arc<ConsensusEngine>,
        relay: Arc<dyn SettlementSink>,
        store: Arc<dyn ProcessedStore>,
        chain: Arc<ChainClient>,
        config: &OracleConfig,
    ) -> Self {
        Self {
            engine,
            relay,
            store,
            chain,
            relay_url: config.relay_url.clone(),
            poll_interval: config.poll_interval,
            poll_window_blocks: config.poll_window_blocks,
            retry_delay: config.retry_delay,
            watching: AtomicBool::new(false),
        }
    }

    /// Long-running entry point: subscribes to pushed events and arms the
    /// periodic poll, then dispatches requests as they arrive. Distinct
    /// requests are processed concurrently, each in its own task.
    pub async fn run(self: Arc<Self>) {
        let (tx, mut rx) = mpsc::channel::<ResolutionRequest>(64);

        let push = Arc::clone(&self);
        tokio::spawn(async move { push.push_loop(tx).await });

        let poll = Arc::clone(&self);
        tokio::spawn(async move { poll.poll_loop().await });

        self.watching.store(true, Ordering::SeqCst);
        info!("event monitor watching for resolution requests");

        while let Some(request) = rx.recv().await {
            let monitor = Arc::clone(&self);
            tokio::spawn(async move { monitor.handle_request(request).await });
        }
    }

    async fn push_loop(self: Arc<Self>, tx: mpsc::Sender<ResolutionRequest>) {
        loop {
            match self.chain.connect_ws().await {
                Ok(contract) => {
                    if let Err(err) = events::stream_requests(&contract, &tx).await {
                        warn!(error = %err, "event subscription failed");
                    } else {
                        warn!("event subscription ended, reconnecting");
                    }
                }
                Err(err) => warn!(error = %err, "ws connect failed"),
            }

            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = self.scan_once().await {
                warn!(error = %err, "backup scan failed");
            }
        }
    }

    /// Single bounded scan of the recent block window. Everything found goes
    /// through the same dedup/retry pipeline as pushed events, so cron-style
    /// deployments can call this instead of [`run`](Self::run).
    pub async fn scan_once(self: &Arc<Self>) -> Result<usize, OracleError> {
        let requests = events::scan_recent(&self.chain, self.poll_window_blocks).await?;
        let count = requests.len();
        for request in requests {
            let monitor = Arc::clone(self);
            tokio::spawn(async move { monitor.handle_request(request).await });
        }
        Ok(count)
    }

    /// Shared entry for every trigger source. The store claim makes the
    /// duplicate check and the mark one atomic step, so a request is
    /// processed at most once at a time regardless of which path saw it.
    pub async fn handle_request(self: Arc<Self>, request: ResolutionRequest) {
        loop {
            if !self.store.insert(request.request_id).await {
                debug!(request_id = %request.request_id, "duplicate request dropped");
                return;
            }

            info!(
                request_id = %request.request_id,
                market_id = %request.market_id,
                "processing resolution request"
            );

            match self.process(&request).await {
                Ok(task) => {
                    info!(
                        request_id = %request.request_id,
                        task_id = %task.task_id,
                        "resolution settled via relay"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        request_id = %request.request_id,
                        error = %err,
                        "pipeline failed, retrying after backoff"
                    );
                    // Release the claim so the retry (or any other path)
                    // reprocesses from scratch; stale votes are never reused.
                    self.store.remove(request.request_id).await;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Consensus strictly before relay for a given request.
    async fn process(&self, request: &ResolutionRequest) -> Result<RelayTask, OracleError> {
        let consensus = self.engine.resolve(&request.question, None).await?;

        info!(
            request_id = %request.request_id,
            outcome = %consensus.outcome,
            agreement = consensus.agreement_percent,
            responding = consensus.total_votes,
            "consensus reached"
        );

        self.relay
            .submit(request.market_id, consensus.outcome, consensus.agreement_percent)
            .await
    }

    /// Pure read; never affected by pipeline failures.
    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            watching: self.watching.load(Ordering::SeqCst),
            addresses: StatusAddresses {
                market: format!("{:?}", self.chain.address()),
                relay: self.relay_url.clone(),
            },
            chain_id: self.chain.chain_id(),
            processed_count: self.store.len().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKeys;
    use crate::error::ProviderError;
    use crate::providers::{vote_from_answer, ProviderAdapter};
    use crate::store::InMemoryStore;
    use crate::types::{Outcome, ProviderVote, TaskState};
    use async_trait::async_trait;
    use chrono::Utc;
    use ethers::types::{Address, H256, U256};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct AlwaysYes {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for AlwaysYes {
        fn id(&self) -> &'static str {
            "always-yes"
        }

        fn confidence(&self) -> u8 {
            50
        }

        async fn classify(
            &self,
            _question: &str,
            _context: Option<&str>,
        ) -> Result<ProviderVote, ProviderError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(vote_from_answer("always-yes", 50, "YES".into()))
        }
    }

    /// Counts submissions; the first `fail_times` calls are rejected.
    struct CountingSink {
        submissions: AtomicUsize,
        fail_times: usize,
    }

    impl CountingSink {
        fn new(fail_times: usize) -> Self {
            Self { submissions: AtomicUsize::new(0), fail_times }
        }

        fn count(&self) -> usize {
            self.submissions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettlementSink for CountingSink {
        async fn submit(
            &self,
            _market_id: U256,
            _outcome: Outcome,
            _agreement_percent: u8,
        ) -> Result<RelayTask, OracleError> {
            let call = self.submissions.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err(OracleError::Relay("relay outage".into()));
            }
            Ok(RelayTask {
                task_id: format!("task-{call}"),
                target: Address::zero(),
                payload: Default::default(),
                submitted_at: Utc::now(),
                status: TaskState::Pending,
            })
        }
    }

    fn test_config() -> OracleConfig {
        OracleConfig {
            rpc_url: "http://localhost:8545".into(),
            ws_url: "ws://localhost:8546".into(),
            market_address: Address::zero(),
            chain_id: 137,
            relay_url: "http://localhost:9000".into(),
            relay_api_key: "test".into(),
            required_agreement: 0.8,
            poll_interval: Duration::from_secs(60),
            poll_window_blocks: 10_000,
            retry_delay: Duration::from_secs(300),
            bind_addr: ([127, 0, 0, 1], 0).into(),
            providers: ProviderKeys::default(),
        }
    }

    fn monitor_with(sink: Arc<CountingSink>, provider: Arc<AlwaysYes>) -> Arc<EventMonitor> {
        let config = test_config();
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![provider];
        let engine = Arc::new(ConsensusEngine::new(adapters, 0.8));
        let store = Arc::new(InMemoryStore::new());
        let chain = Arc::new(ChainClient::new(&config).unwrap());
        Arc::new(EventMonitor::new(engine, sink, store, chain, &config))
    }

    fn monitor_with_sink(sink: Arc<CountingSink>) -> Arc<EventMonitor> {
        monitor_with(sink, Arc::new(AlwaysYes::default()))
    }

    fn request(id: u8) -> ResolutionRequest {
        ResolutionRequest::new(H256::repeat_byte(id), U256::from(id), "did it happen?".into())
    }

    #[tokio::test]
    async fn duplicate_requests_submit_once() {
        let sink = Arc::new(CountingSink::new(0));
        let monitor = monitor_with_sink(sink.clone());

        let first = tokio::spawn(Arc::clone(&monitor).handle_request(request(1)));
        let second = tokio::spawn(Arc::clone(&monitor).handle_request(request(1)));
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(sink.count(), 1);
        assert_eq!(monitor.store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_is_retried_fresh_after_backoff() {
        let sink = Arc::new(CountingSink::new(1));
        let provider = Arc::new(AlwaysYes::default());
        let monitor = monitor_with(sink.clone(), provider.clone());

        Arc::clone(&monitor).handle_request(request(2)).await;

        // One rejected submission plus one successful retry after the backoff
        // window, each with its own consensus query; votes are never reused.
        assert_eq!(sink.count(), 2);
        assert_eq!(provider.queries.load(Ordering::SeqCst), 2);
        assert!(monitor.store.contains(H256::repeat_byte(2)).await);
    }

    #[tokio::test]
    async fn distinct_requests_each_submit() {
        let sink = Arc::new(CountingSink::new(0));
        let monitor = monitor_with_sink(sink.clone());

        Arc::clone(&monitor).handle_request(request(3)).await;
        Arc::clone(&monitor).handle_request(request(4)).await;

        assert_eq!(sink.count(), 2);
        assert_eq!(monitor.store.len().await, 2);
    }

    #[tokio::test]
    async fn status_reports_configuration() {
        let sink = Arc::new(CountingSink::new(0));
        let monitor = monitor_with_sink(sink);

        let status = monitor.status().await;
        assert!(!status.watching);
        assert_eq!(status.chain_id, 137);
        assert_eq!(status.processed_count, 0);
        assert_eq!(status.addresses.relay, "http://localhost:9000");
    }
}
