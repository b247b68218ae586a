//! Periodic refresh of live arrival data for subscribed stops.
//!
//! [`Refresher`] owns the subscription set and the per-stop arrival records.
//! Every fetch result is merged by key, so refreshing one stop never touches
//! another stop's record. [`RefreshSession`] drives [`Refresher::tick`] on a
//! fixed period until it is shut down or dropped.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::CompanionError;
use crate::services::transit_api::{ArrivalRecord, TransitApi};

/// Fetches the current arrival record for one stop.
#[async_trait]
pub trait ArrivalSource: Send + Sync + 'static {
    async fn fetch_arrivals(&self, stop_code: &str) -> Result<ArrivalRecord>;
}

/// Adapts any [`TransitApi`] into an [`ArrivalSource`].
pub struct TransitArrivals<T>(pub Arc<T>);

#[async_trait]
impl<T: TransitApi + 'static> ArrivalSource for TransitArrivals<T> {
    async fn fetch_arrivals(&self, stop_code: &str) -> Result<ArrivalRecord> {
        self.0.get_arrivals(stop_code).await
    }
}

/// What happened to a single refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The record was replaced with fresh data.
    Updated,
    /// The fetch failed; the previous record is kept.
    Failed,
    /// A fetch for this stop was already in flight, so none was started.
    Coalesced,
    /// The result arrived after shutdown or for a stop no longer listed.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl TickReport {
    fn record(&mut self, stop_code: String, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Updated => self.refreshed.push(stop_code),
            RefreshOutcome::Failed => self.failed.push(stop_code),
            RefreshOutcome::Coalesced => self.skipped.push(stop_code),
            RefreshOutcome::Discarded => {}
        }
    }
}

#[derive(Default)]
struct State {
    /// Stop codes of the last-fetched stop collection. `None` until one is
    /// installed, in which case any code may be subscribed.
    known: Option<HashSet<String>>,
    subscriptions: BTreeSet<String>,
    records: HashMap<String, ArrivalRecord>,
}

impl State {
    fn is_known(&self, stop_code: &str) -> bool {
        self.known.as_ref().is_none_or(|k| k.contains(stop_code))
    }
}

type InFlight = Arc<StdMutex<HashSet<String>>>;

/// Marks one stop as being fetched. The mark is cleared when the guard is
/// dropped, including when the fetch is cancelled or panics.
struct InFlightGuard {
    in_flight: InFlight,
    stop_code: String,
}

impl InFlightGuard {
    /// `None` if a fetch for `stop_code` is already in flight.
    fn claim(in_flight: &InFlight, stop_code: &str) -> Option<Self> {
        let claimed = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(stop_code.to_string());
        claimed.then(|| Self {
            in_flight: in_flight.clone(),
            stop_code: stop_code.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.stop_code);
    }
}

pub struct Refresher<S> {
    source: Arc<S>,
    state: Arc<Mutex<State>>,
    in_flight: InFlight,
    closed: Arc<AtomicBool>,
    updates: broadcast::Sender<String>,
}

impl<S> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            state: self.state.clone(),
            in_flight: self.in_flight.clone(),
            closed: self.closed.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl<S: ArrivalSource> Refresher<S> {
    pub fn new(source: S) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: Arc<S>) -> Self {
        // Receivers only need the latest codes; lagging ones re-read snapshot()
        let (updates, _) = broadcast::channel(64);
        Self {
            source,
            state: Arc::new(Mutex::new(State::default())),
            in_flight: Arc::default(),
            closed: Arc::new(AtomicBool::new(false)),
            updates,
        }
    }

    /// Receives the stop code of every record replaced from now on.
    pub fn updates(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }

    /// Installs the stop codes of a freshly fetched stop collection.
    ///
    /// Subscriptions and records for codes missing from it are dropped.
    pub async fn replace_entities<I>(&self, stop_codes: I)
    where
        I: IntoIterator<Item = String>,
    {
        let known: HashSet<String> = stop_codes.into_iter().collect();
        let mut state = self.state.lock().await;

        let before = state.subscriptions.len();
        state.subscriptions.retain(|code| known.contains(code));
        state.records.retain(|code, _| known.contains(code));
        let pruned = before - state.subscriptions.len();

        debug!(entities = known.len(), pruned, "Entity collection replaced");
        state.known = Some(known);
    }

    /// Adds `stop_code` to the subscription set and fetches it once right away.
    ///
    /// A failed first fetch still leaves the stop subscribed; later ticks
    /// retry it.
    ///
    /// # Errors
    ///
    /// [`CompanionError::UnknownEntity`] if an entity collection is installed
    /// and does not contain `stop_code`.
    pub async fn subscribe(&self, stop_code: &str) -> Result<RefreshOutcome, CompanionError> {
        {
            let mut state = self.state.lock().await;
            if !state.is_known(stop_code) {
                return Err(CompanionError::UnknownEntity(stop_code.to_string()));
            }
            if state.subscriptions.insert(stop_code.to_string()) {
                info!(stop_code, "Subscribed");
            }
        }
        Ok(self.refresh_one(stop_code).await)
    }

    /// Stops refreshing `stop_code`. Its last record stays readable.
    pub async fn unsubscribe(&self, stop_code: &str) -> bool {
        let removed = self.state.lock().await.subscriptions.remove(stop_code);
        if removed {
            info!(stop_code, "Unsubscribed");
        }
        removed
    }

    /// Subscribes if not subscribed, unsubscribes otherwise. Returns whether
    /// the stop is subscribed afterwards.
    pub async fn toggle(&self, stop_code: &str) -> Result<bool, CompanionError> {
        if self.is_subscribed(stop_code).await {
            self.unsubscribe(stop_code).await;
            Ok(false)
        } else {
            self.subscribe(stop_code).await?;
            Ok(true)
        }
    }

    pub async fn is_subscribed(&self, stop_code: &str) -> bool {
        self.state.lock().await.subscriptions.contains(stop_code)
    }

    /// Subscribed stop codes in ascending order.
    pub async fn subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .subscriptions
            .iter()
            .cloned()
            .collect()
    }

    pub async fn record(&self, stop_code: &str) -> Option<ArrivalRecord> {
        self.state.lock().await.records.get(stop_code).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, ArrivalRecord> {
        self.state.lock().await.records.clone()
    }

    /// Replaces the record for `stop_code`, leaving every other record as is.
    pub async fn merge(&self, stop_code: &str, record: ArrivalRecord) -> RefreshOutcome {
        if self.is_closed() {
            return RefreshOutcome::Discarded;
        }
        {
            let mut state = self.state.lock().await;
            if !state.is_known(stop_code) {
                return RefreshOutcome::Discarded;
            }
            state.records.insert(stop_code.to_string(), record);
        }
        // No receivers is fine
        let _ = self.updates.send(stop_code.to_string());
        RefreshOutcome::Updated
    }

    /// Refreshes every subscribed stop concurrently.
    ///
    /// Stops whose previous fetch is still in flight are skipped. Failures
    /// are logged and never abort the other fetches.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if self.is_closed() {
            return report;
        }

        let subscribed = self.subscriptions().await;
        let mut to_fetch = Vec::with_capacity(subscribed.len());
        for code in subscribed {
            match InFlightGuard::claim(&self.in_flight, &code) {
                Some(guard) => to_fetch.push(guard),
                None => {
                    debug!(stop_code = %code, "Previous fetch still in flight, skipping");
                    report.record(code, RefreshOutcome::Coalesced);
                }
            }
        }

        let mut fetches = JoinSet::new();
        for guard in to_fetch {
            let this = self.clone();
            let code = guard.stop_code.clone();
            let span = tracing::debug_span!("refresh_stop", stop_code = %code);
            fetches.spawn(
                async move {
                    let outcome = this.fetch_and_merge(guard).await;
                    (code, outcome)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((code, outcome)) => report.record(code, outcome),
                Err(e) => error!(error = %e, "Refresh task panicked"),
            }
        }

        report
    }

    /// Refreshes a single stop unless a fetch for it is already in flight.
    pub async fn refresh_one(&self, stop_code: &str) -> RefreshOutcome {
        if self.is_closed() {
            return RefreshOutcome::Discarded;
        }
        match InFlightGuard::claim(&self.in_flight, stop_code) {
            Some(guard) => self.fetch_and_merge(guard).await,
            None => RefreshOutcome::Coalesced,
        }
    }

    /// Marks the refresher closed: results still in flight are dropped
    /// instead of merged, and ticks become no-ops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn fetch_and_merge(&self, guard: InFlightGuard) -> RefreshOutcome {
        let stop_code = guard.stop_code.clone();
        let result = self.source.fetch_arrivals(&stop_code).await;
        drop(guard);

        match result {
            Ok(record) => {
                let outcome = self.merge(&stop_code, record).await;
                if outcome == RefreshOutcome::Discarded {
                    debug!(%stop_code, "Dropping late arrival result");
                }
                outcome
            }
            Err(e) => {
                let err = CompanionError::fetch_failed(format!("arrivals for {stop_code}"), e);
                warn!(error = %err, "Keeping last known arrivals");
                RefreshOutcome::Failed
            }
        }
    }
}

/// A running periodic refresh bound to the lifetime of the command that
/// started it.
///
/// Each period spawns one [`Refresher::tick`], so a slow tick never delays
/// the next; overlapping fetches for the same stop are coalesced by the
/// refresher. Dropping the session cancels the timer.
pub struct RefreshSession<S> {
    refresher: Refresher<S>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<S: ArrivalSource> RefreshSession<S> {
    /// Starts ticking `period` from now. The first tick fires after one full
    /// period, since subscribing already fetches immediately.
    pub fn start(refresher: Refresher<S>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let loop_refresher = refresher.clone();

        info!(period_secs = period.as_secs(), "Starting refresh loop");
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = JoinSet::new();

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {
                        let refresher = loop_refresher.clone();
                        ticks.spawn(async move { refresher.tick().await });
                    }
                    Some(joined) = ticks.join_next(), if !ticks.is_empty() => match joined {
                        Ok(report) => debug!(
                            refreshed = report.refreshed.len(),
                            failed = report.failed.len(),
                            skipped = report.skipped.len(),
                            "Tick finished"
                        ),
                        Err(e) => error!(error = %e, "Tick task panicked"),
                    },
                }
            }

            // Let in-flight fetches finish; the closed refresher discards them
            ticks.detach_all();
            info!("Refresh loop stopped");
        });

        Self {
            refresher,
            token,
            handle: Some(handle),
        }
    }

    pub fn refresher(&self) -> &Refresher<S> {
        &self.refresher
    }

    /// Cancels the timer and waits for the loop to exit. Results of fetches
    /// still in flight are discarded.
    pub async fn shutdown(mut self) {
        self.refresher.close();
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Refresh loop panicked");
            }
        }
    }
}

impl<S> Drop for RefreshSession<S> {
    fn drop(&mut self) {
        self.refresher.closed.store(true, Ordering::SeqCst);
        self.token.cancel();
    }
}
