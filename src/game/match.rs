//! Match task - drives a controller from inputs and timers

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{
    BattleSnapshot, ClientRequest, Language, MatchEvent, MatchPhase, MatchReply, MatchResults, SubmitReply,
    TriggerReply,
};
use crate::util::rate_limit::PlayerRateLimiter;

use super::buttons::ActionButton;
use super::controller::{MatchController, MatchError};

const INPUT_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;
const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// A participant request plus the channel its answer goes back on
#[derive(Debug)]
pub struct MatchInput {
    pub participant: Uuid,
    pub request: ClientRequest,
    pub reply: oneshot::Sender<Result<MatchReply, MatchError>>,
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub participants: (Uuid, Uuid),
    input_tx: mpsc::Sender<MatchInput>,
    event_tx: broadcast::Sender<MatchEvent>,
    latest: Arc<RwLock<Option<BattleSnapshot>>>,
    spectators: Arc<AtomicUsize>,
    limiters: Arc<HashMap<Uuid, PlayerRateLimiter>>,
}

impl MatchHandle {
    /// Send a request and wait for the match task to answer it
    pub async fn request(&self, participant: Uuid, request: ClientRequest) -> Result<MatchReply, MatchError> {
        if matches!(request, ClientRequest::TriggerAction { .. }) {
            let limiter = self
                .limiters
                .get(&participant)
                .ok_or(MatchError::UnknownParticipant(participant))?;
            if !limiter.check_trigger() {
                debug!(match_id = %self.id, participant = %participant, "Trigger rate limited");
                return Err(MatchError::RateLimited);
            }
        }

        let (reply, answer) = oneshot::channel();
        self.input_tx
            .send(MatchInput {
                participant,
                request,
                reply,
            })
            .await
            .map_err(|_| MatchError::Closed)?;
        answer.await.map_err(|_| MatchError::Closed)?
    }

    pub async fn submit_strategy(
        &self,
        participant: Uuid,
        language: Language,
        source: impl Into<String>,
    ) -> Result<SubmitReply, MatchError> {
        let request = ClientRequest::SubmitStrategy {
            language,
            source: source.into(),
        };
        match self.request(participant, request).await? {
            MatchReply::Submitted(reply) => Ok(reply),
            _ => Err(MatchError::Closed),
        }
    }

    pub async fn set_ready(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(participant, ClientRequest::SetReady).await.map(|_| ())
    }

    pub async fn leave(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(participant, ClientRequest::Leave).await.map(|_| ())
    }

    pub async fn register_action(
        &self,
        participant: Uuid,
        name: Option<String>,
        payload: impl Into<String>,
    ) -> Result<ActionButton, MatchError> {
        let request = ClientRequest::RegisterAction {
            name,
            payload: payload.into(),
        };
        match self.request(participant, request).await? {
            MatchReply::Registered(button) => Ok(button),
            _ => Err(MatchError::Closed),
        }
    }

    pub async fn trigger_action(&self, participant: Uuid, action_id: Uuid) -> Result<TriggerReply, MatchError> {
        match self
            .request(participant, ClientRequest::TriggerAction { action_id })
            .await?
        {
            MatchReply::Triggered(reply) => Ok(reply),
            _ => Err(MatchError::Closed),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.event_tx.subscribe()
    }

    /// State as of the last processed tick or input
    pub fn latest_snapshot(&self) -> Option<BattleSnapshot> {
        self.latest.read().clone()
    }

    pub fn spectator_join(&self) -> usize {
        self.spectators.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn spectator_leave(&self) -> usize {
        let previous = self
            .spectators
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.load(Ordering::Relaxed)
    }

    /// True once the match task has stopped
    pub fn is_closed(&self) -> bool {
        self.input_tx.is_closed()
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_spectators(&self) -> usize {
        self.matches.iter().map(|m| m.value().spectator_count()).sum()
    }

    /// Match a participant is seated in
    pub fn find_by_participant(&self, participant: Uuid) -> Option<MatchHandle> {
        self.matches
            .iter()
            .find(|m| {
                let (a, b) = m.value().participants;
                a == participant || b == participant
            })
            .map(|m| m.value().clone())
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match task
pub struct GameMatch {
    controller: MatchController,
    input_rx: mpsc::Receiver<MatchInput>,
    event_tx: broadcast::Sender<MatchEvent>,
    latest: Arc<RwLock<Option<BattleSnapshot>>>,
    spectators: Arc<AtomicUsize>,
}

impl GameMatch {
    pub fn new(controller: MatchController) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let latest = Arc::new(RwLock::new(Some(controller.snapshot())));
        let spectators = Arc::new(AtomicUsize::new(0));

        let (a, b) = controller.participants();
        let rate = controller.config().trigger_rate_limit;
        let limiters: HashMap<Uuid, PlayerRateLimiter> = [a, b]
            .into_iter()
            .map(|participant| (participant, PlayerRateLimiter::new(rate)))
            .collect();

        let handle = MatchHandle {
            id: controller.id(),
            participants: (a, b),
            input_tx,
            event_tx: event_tx.clone(),
            latest: latest.clone(),
            spectators: spectators.clone(),
            limiters: Arc::new(limiters),
        };

        let game_match = Self {
            controller,
            input_rx,
            event_tx,
            latest,
            spectators,
        };

        (game_match, handle)
    }

    /// Run until the match finishes; dropping every handle aborts it
    pub async fn run(mut self) -> Result<MatchResults, MatchError> {
        let match_id = self.controller.id();
        info!(match_id = %match_id, phase = %self.controller.phase(), "Match task started");

        let tick_period = self.controller.config().tick_interval();
        let mut countdown = interval_at(Instant::now() + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticker = interval_at(Instant::now() + tick_period, tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.publish();

        while self.controller.phase() != MatchPhase::Finished {
            let phase = self.controller.phase();

            tokio::select! {
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        info!(match_id = %match_id, "All handles dropped, aborting match");
                        let _ = self.controller.abort();
                    }
                },
                _ = countdown.tick(), if phase == MatchPhase::Preparation => {
                    let _ = self.controller.countdown_tick();
                }
                _ = ticker.tick(), if phase == MatchPhase::Battle => {
                    self.controller
                        .set_spectator_count(self.spectators.load(Ordering::Relaxed));
                    let _ = self.controller.tick();
                }
            }

            if phase == MatchPhase::Preparation && self.controller.phase() == MatchPhase::Battle {
                ticker.reset();
            }
            self.publish();
        }

        info!(match_id = %match_id, "Match task stopped");
        self.controller.results().cloned().ok_or(MatchError::Closed)
    }

    fn handle_input(&mut self, input: MatchInput) {
        let MatchInput {
            participant,
            request,
            reply,
        } = input;

        let result = match request {
            ClientRequest::SubmitStrategy { language, source } => self
                .controller
                .submit_strategy(participant, language, &source)
                .map(MatchReply::Submitted),
            ClientRequest::SetReady => self.controller.set_ready(participant).map(|()| MatchReply::Ready),
            ClientRequest::Leave => self.controller.leave(participant).map(|_| MatchReply::Left),
            ClientRequest::RegisterAction { name, payload } => self
                .controller
                .register_action(participant, name.as_deref(), &payload)
                .map(MatchReply::Registered),
            ClientRequest::TriggerAction { action_id } => self
                .controller
                .trigger_action(participant, action_id)
                .map(MatchReply::Triggered),
        };

        if let Err(err) = &result {
            debug!(match_id = %self.controller.id(), participant = %participant, error = %err, "Request refused");
        }
        let _ = reply.send(result);
    }

    /// Broadcast queued events and refresh the polled snapshot
    fn publish(&mut self) {
        for event in self.controller.drain_events() {
            let _ = self.event_tx.send(event);
        }
        *self.latest.write() = Some(self.controller.snapshot());
    }
}
