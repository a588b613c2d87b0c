//! The per-room game engine.
//!
//! Every room runs exactly one controller task that owns all mutable room
//! state and consumes a FIFO mailbox. Sockets, timers, and background loaders
//! never touch the state directly; they post [`RoomMessage`]s. The controller
//! publishes read-only snapshots through `watch` channels so listings never
//! block on a busy room.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        room::{PlayerInfo, RoomConfigPatch, RoomConfiguration, RoomListing, RoomStatus},
        ws::{ClientCommand, ServerCommand},
    },
    library::{LibraryError, LibraryResult, SongLibrary},
    state::{
        machine::{RoomEvent, RoomMachine, RoomPhase},
        quiz::{self, Quiz},
        registry::RoomRegistry,
        sessions::SessionDirectory,
        timer::{self, TimerGuard},
    },
};

pub type SessionId = String;
pub type LinkId = Uuid;

/// Why the server is closing a WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Room full, unknown, or the session is not a committed player.
    NotAccepting,
    /// Another connection took over this session.
    Superseded,
    /// The room (or the process) is going away.
    Terminating,
    /// The connection broke the framing contract.
    Protocol,
}

impl CloseReason {
    /// RFC 6455 close code for the close frame.
    pub fn code(self) -> u16 {
        match self {
            Self::NotAccepting => 1003,
            Self::Superseded | Self::Terminating => 1001,
            Self::Protocol => 1002,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NotAccepting => "room is not accepting new players",
            Self::Superseded => "superseded by another connection",
            Self::Terminating => "room is terminating",
            Self::Protocol => "protocol error",
        }
    }
}

/// Items queued towards one socket's writer task.
///
/// A song transfer is a single item so the writer can emit the `SONG_DATA`
/// announcement and its binary payload back to back; nothing else can slip in
/// between them on that socket.
#[derive(Debug, Clone)]
pub enum Outbound {
    Command(ServerCommand),
    Song { round: u32, audio: Bytes },
    Pong(Bytes),
    Close(CloseReason),
}

/// Sending half of one player's outbound queue, held by the controller.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    pub id: LinkId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl LinkHandle {
    /// Create a link and the receiving end its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn send(&self, item: Outbound) -> Result<(), mpsc::error::SendError<Outbound>> {
        self.tx.send(item)
    }
}

/// Mailbox protocol of a room controller.
pub enum RoomMessage {
    /// A socket wants to attach; `reply` is completed exactly once with
    /// `None` (accepted) or a close reason (rejected).
    Connect {
        session: SessionId,
        link: LinkHandle,
        reply: oneshot::Sender<Option<CloseReason>>,
    },
    /// A socket went away. Carries the link id so a disconnect racing a
    /// replacement join does not evict the replacement.
    Disconnect { session: SessionId, link: LinkId },
    /// A decoded client command.
    Command {
        session: SessionId,
        command: ClientCommand,
    },
    /// Background quiz load finished.
    QuizLoaded(LibraryResult<Quiz>),
    /// Background audio load finished.
    AudioLoaded { round: u32, audio: Bytes },
    AudioFailed { round: u32, error: LibraryError },
    /// Playback window for `round` elapsed; stale rounds are ignored.
    RoundTimeout { round: u32 },
    /// Review window for `round` elapsed; stale rounds are ignored.
    ReviewTimeout { round: u32 },
    /// Process shutdown: close every socket and terminate.
    Shutdown,
}

/// Snapshot published on every state change; readers get some previous
/// complete value without synchronizing with the controller.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Live sockets, which is not the same as committed players.
    pub connected: usize,
    pub status: RoomStatus,
}

/// Cheap cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: String,
    pub created_at_ms: i64,
    mailbox: mpsc::UnboundedSender<RoomMessage>,
    config: watch::Receiver<RoomConfiguration>,
    snapshot: watch::Receiver<RoomSnapshot>,
}

impl RoomHandle {
    /// Post a message; fails once the controller has terminated.
    pub fn send(&self, message: RoomMessage) -> Result<(), mpsc::error::SendError<RoomMessage>> {
        self.mailbox.send(message)
    }

    pub fn config(&self) -> RoomConfiguration {
        self.config.borrow().clone()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch endpoint for snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.snapshot.clone()
    }

    pub fn listing(&self) -> RoomListing {
        let snapshot = self.snapshot();
        RoomListing {
            id: self.id.clone(),
            players: snapshot.connected,
            max_players: self.config().max_players,
            phase: snapshot.status.phase_tag().to_string(),
            created_at: self.created_at_ms,
        }
    }
}

/// Single-writer actor owning all mutable state of one room.
pub struct RoomController {
    id: String,
    registry: Weak<RoomRegistry>,
    library: Arc<dyn SongLibrary>,
    sessions: Arc<SessionDirectory>,
    mailbox: mpsc::UnboundedReceiver<RoomMessage>,
    /// Sender half kept for timers and background loaders.
    loopback: mpsc::UnboundedSender<RoomMessage>,
    config_tx: watch::Sender<RoomConfiguration>,
    snapshot_tx: watch::Sender<RoomSnapshot>,

    config: RoomConfiguration,
    machine: RoomMachine,
    /// Session of the first player admitted in the lobby; sticky for the
    /// room's lifetime, across disconnects.
    host: Option<SessionId>,
    /// Live sockets in join order, at most one per session.
    links: IndexMap<SessionId, LinkHandle>,
    /// Identities of everyone the room has admitted and kept.
    players: IndexMap<SessionId, PlayerInfo>,
    /// Sessions snapshotted when the host pressed start; only these may
    /// score or rejoin mid-game.
    committed: IndexSet<SessionId>,
    quiz: Option<Quiz>,
    /// Rounds each session has acknowledged buffering for.
    buffered: HashMap<SessionId, HashSet<u32>>,
    scores: IndexMap<SessionId, u32>,
    /// Guesses for the current round; last write per session wins.
    guesses: IndexMap<SessionId, String>,
    correct: IndexSet<SessionId>,
    /// Loaded audio, kept for the whole game so rejoins re-stream from memory.
    audio_cache: HashMap<u32, Bytes>,
    audio_pending: HashSet<u32>,
    timer: Option<TimerGuard>,
}

impl RoomController {
    /// Launch a controller task. Returns the handle other components use and
    /// the task itself, which the registry joins during shutdown.
    pub(crate) fn spawn(
        id: String,
        config: RoomConfiguration,
        library: Arc<dyn SongLibrary>,
        sessions: Arc<SessionDirectory>,
        registry: Weak<RoomRegistry>,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (loopback, mailbox) = mpsc::unbounded_channel();
        let (config_tx, config_rx) = watch::channel(config.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(RoomSnapshot {
            connected: 0,
            status: RoomStatus::Lobby {
                players: Vec::new(),
            },
        });

        let controller = Self {
            id: id.clone(),
            registry,
            library,
            sessions,
            mailbox,
            loopback: loopback.clone(),
            config_tx,
            snapshot_tx,
            config,
            machine: RoomMachine::new(),
            host: None,
            links: IndexMap::new(),
            players: IndexMap::new(),
            committed: IndexSet::new(),
            quiz: None,
            buffered: HashMap::new(),
            scores: IndexMap::new(),
            guesses: IndexMap::new(),
            correct: IndexSet::new(),
            audio_cache: HashMap::new(),
            audio_pending: HashSet::new(),
            timer: None,
        };

        let task = tokio::spawn(controller.run());

        (
            RoomHandle {
                id,
                created_at_ms: epoch_ms(),
                mailbox: loopback,
                config: config_rx,
                snapshot: snapshot_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        debug!(room = %self.id, "room controller started");

        while let Some(message) = self.mailbox.recv().await {
            match message {
                RoomMessage::Connect {
                    session,
                    link,
                    reply,
                } => self.on_connect(session, link, reply),
                RoomMessage::Disconnect { session, link } => self.on_disconnect(session, link),
                RoomMessage::Command { session, command } => self.on_command(session, command),
                RoomMessage::QuizLoaded(result) => self.on_quiz_loaded(result),
                RoomMessage::AudioLoaded { round, audio } => self.on_audio_loaded(round, audio),
                RoomMessage::AudioFailed { round, error } => self.on_audio_failed(round, error),
                RoomMessage::RoundTimeout { round } => self.on_round_timeout(round),
                RoomMessage::ReviewTimeout { round } => self.on_review_timeout(round),
                RoomMessage::Shutdown => {
                    info!(room = %self.id, "room shutting down");
                    self.close_all(CloseReason::Terminating);
                    break;
                }
            }

            // A finished room lives until its last socket closes.
            if self.machine.phase().is_finished() && self.links.is_empty() {
                break;
            }
        }

        self.timer.take();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
        debug!(room = %self.id, "room controller stopped");
    }

    // ---- connections -------------------------------------------------------

    fn on_connect(
        &mut self,
        session: SessionId,
        link: LinkHandle,
        reply: oneshot::Sender<Option<CloseReason>>,
    ) {
        if let Some(reason) = self.admission(&session) {
            info!(room = %self.id, session = %session, ?reason, "rejecting connection");
            let _ = reply.send(Some(reason));
            return;
        }

        if matches!(self.machine.phase(), RoomPhase::Lobby) && !self.players.contains_key(&session)
        {
            let host = match &self.host {
                None => {
                    self.host = Some(session.clone());
                    true
                }
                Some(host) => *host == session,
            };
            let name = self.sessions.display_name(&session);
            self.players.insert(
                session.clone(),
                PlayerInfo {
                    id: session.clone(),
                    name,
                    host,
                },
            );
        }

        let link_id = link.id;
        if let Some(previous) = self.links.insert(session.clone(), link.clone()) {
            info!(room = %self.id, session = %session, "superseding previous connection");
            let _ = previous.send(Outbound::Close(CloseReason::Superseded));
        }
        let _ = reply.send(None);
        info!(room = %self.id, session = %session, "player connected");

        let _ = link.send(Outbound::Command(ServerCommand::RoomConfig {
            config: self.config.clone(),
        }));
        let _ = link.send(Outbound::Command(ServerCommand::RoomState {
            state: self.current_status(),
        }));

        // Mid-game attach: re-stream what the client needs to resume.
        let mut audio_send_failed = false;
        if let Some(round) = self.machine.phase().round() {
            match self.audio_cache.get(&round) {
                Some(audio) => {
                    audio_send_failed |= link
                        .send(Outbound::Song {
                            round,
                            audio: audio.clone(),
                        })
                        .is_err();
                }
                None => self.spawn_audio_load(round),
            }
            if matches!(self.machine.phase(), RoomPhase::Playing { .. }) {
                if let Some(audio) = self.audio_cache.get(&(round + 1)) {
                    audio_send_failed |= link
                        .send(Outbound::Song {
                            round: round + 1,
                            audio: audio.clone(),
                        })
                        .is_err();
                }
            }
        }

        self.publish();
        self.broadcast_state_except(Some(link_id));

        if audio_send_failed {
            self.close_link(&session, CloseReason::Protocol);
        }
    }

    /// Admission policy per phase; `None` means accepted.
    fn admission(&self, session: &str) -> Option<CloseReason> {
        // A second upgrade for a live session always replaces the first.
        if self.links.contains_key(session) {
            return None;
        }

        match self.machine.phase() {
            RoomPhase::Lobby => {
                if self.links.len() >= self.config.max_players as usize {
                    Some(CloseReason::NotAccepting)
                } else {
                    None
                }
            }
            _ => {
                if self.committed.contains(session) {
                    None
                } else {
                    Some(CloseReason::NotAccepting)
                }
            }
        }
    }

    fn on_disconnect(&mut self, session: SessionId, link_id: LinkId) {
        let is_current = self
            .links
            .get(&session)
            .is_some_and(|link| link.id == link_id);
        if !is_current {
            debug!(room = %self.id, session = %session, "ignoring disconnect of superseded link");
            return;
        }

        self.links.shift_remove(&session);
        info!(room = %self.id, session = %session, "player disconnected");
        self.after_departure(&session);
    }

    /// Close one link with `reason` and drop it, then run the same
    /// bookkeeping a normal disconnect does. Other players are unaffected;
    /// a late `Disconnect` for the removed link is deduplicated as usual.
    fn close_link(&mut self, session: &str, reason: CloseReason) {
        let Some(link) = self.links.shift_remove(session) else {
            return;
        };
        warn!(room = %self.id, session = %session, ?reason, "closing link");
        let _ = link.send(Outbound::Close(reason));
        self.after_departure(session);
    }

    /// Shared tail of every link departure: prune lobby identities, publish,
    /// and re-check a round that may have been waiting on the departed player.
    fn after_departure(&mut self, session: &str) {
        if matches!(self.machine.phase(), RoomPhase::Lobby) {
            self.players.shift_remove(session);
        }

        self.publish_and_broadcast();

        if let RoomPhase::Buffering { round } = self.machine.phase() {
            self.maybe_advance(round);
        }
    }

    fn close_all(&mut self, reason: CloseReason) {
        for (_, link) in self.links.drain(..) {
            let _ = link.send(Outbound::Close(reason));
        }
    }

    // ---- client commands ---------------------------------------------------

    fn on_command(&mut self, session: SessionId, command: ClientCommand) {
        match command {
            ClientCommand::Start => self.on_start(&session),
            ClientCommand::Next => self.on_next(&session),
            ClientCommand::BufferComplete { round } => self.on_buffer_complete(session, round),
            ClientCommand::Guess { round, guess } => self.on_guess(session, round, guess),
            ClientCommand::Configure { config } => self.on_configure(&session, config),
            ClientCommand::Unknown => {
                debug!(room = %self.id, session = %session, "ignoring unknown command tag");
            }
        }
    }

    fn is_host(&self, session: &str) -> bool {
        self.host.as_deref() == Some(session)
    }

    fn on_start(&mut self, session: &str) {
        if !self.is_host(session) || !matches!(self.machine.phase(), RoomPhase::Lobby) {
            debug!(room = %self.id, session = %session, "ignoring START");
            return;
        }
        if let Err(err) = self.machine.apply(RoomEvent::Start) {
            debug!(room = %self.id, error = %err, "ignoring START");
            return;
        }

        self.committed = self.links.keys().cloned().collect();
        self.scores = self
            .committed
            .iter()
            .map(|session| (session.clone(), 0))
            .collect();

        let library = self.library.clone();
        let rounds = self.config.rounds;
        let mailbox = self.loopback.clone();
        tokio::spawn(async move {
            let result = quiz::load(library, rounds).await;
            let _ = mailbox.send(RoomMessage::QuizLoaded(result));
        });

        info!(room = %self.id, players = self.committed.len(), "game starting");
        self.publish_and_broadcast();
    }

    fn on_next(&mut self, session: &str) {
        if !self.is_host(session) {
            debug!(room = %self.id, session = %session, "ignoring NEXT from non-host");
            return;
        }
        match self.machine.phase() {
            RoomPhase::Buffering { round } => self.begin_playing(round),
            RoomPhase::Playing { round, .. } => self.begin_review(round),
            RoomPhase::Reviewing { round } => self.finish_review(round),
            phase => debug!(room = %self.id, ?phase, "NEXT has no effect in this phase"),
        }
    }

    fn on_buffer_complete(&mut self, session: SessionId, round: u32) {
        if !self.committed.contains(&session) {
            debug!(room = %self.id, session = %session, "ignoring BUFFER_COMPLETE from non-committed session");
            return;
        }
        if !self.quiz.as_ref().is_some_and(|quiz| quiz.has_round(round)) {
            debug!(room = %self.id, round, "ignoring BUFFER_COMPLETE for unknown round");
            return;
        }

        let newly_buffered = self.buffered.entry(session).or_default().insert(round);
        if !newly_buffered {
            return;
        }

        // Only the current round's ready set is observable.
        if matches!(self.machine.phase(), RoomPhase::Buffering { round: current } if current == round)
        {
            self.publish_and_broadcast();
            self.maybe_advance(round);
        }
    }

    fn on_guess(&mut self, session: SessionId, round: u32, guess: String) {
        let current = match self.machine.phase() {
            RoomPhase::Playing { round, .. } => round,
            phase => {
                debug!(room = %self.id, ?phase, "discarding guess outside of playing");
                return;
            }
        };
        if current != round || !self.committed.contains(&session) {
            debug!(room = %self.id, session = %session, round, "discarding stale guess");
            return;
        }

        // Repeated guesses overwrite; only the last one counts.
        self.guesses.insert(session, guess);
        self.publish_and_broadcast();
    }

    fn on_configure(&mut self, session: &str, patch: RoomConfigPatch) {
        if !self.is_host(session) || !matches!(self.machine.phase(), RoomPhase::Lobby) {
            debug!(room = %self.id, session = %session, "ignoring CONFIGURE");
            return;
        }
        if let Err(err) = patch.validate() {
            debug!(room = %self.id, error = %err, "rejecting out-of-bounds configuration patch");
            return;
        }

        self.config = self.config.merged(&patch);
        let _ = self.config_tx.send(self.config.clone());
        info!(room = %self.id, config = ?self.config, "room configuration updated");
        self.broadcast(ServerCommand::RoomConfig {
            config: self.config.clone(),
        });
    }

    // ---- quiz & audio ------------------------------------------------------

    fn on_quiz_loaded(&mut self, result: LibraryResult<Quiz>) {
        if !matches!(self.machine.phase(), RoomPhase::Loading) {
            debug!(room = %self.id, "ignoring stale quiz load result");
            return;
        }

        match result {
            Ok(quiz) => {
                if let Err(err) = self.machine.apply(RoomEvent::QuizReady) {
                    debug!(room = %self.id, error = %err, "ignoring quiz load");
                    return;
                }
                info!(room = %self.id, questions = quiz.len(), "quiz loaded");
                self.quiz = Some(quiz);
                self.enter_buffering(0);
            }
            Err(error) => {
                error!(room = %self.id, error = %error, "quiz load failed");
                let _ = self.machine.apply(RoomEvent::QuizFailed);
                // Nobody played; the scoreboard is empty, not all-zeroes.
                self.scores.clear();
                self.publish_and_broadcast();
            }
        }
    }

    /// Kick off a background load for `round` unless already cached or in
    /// flight. The helper task only posts back into the mailbox.
    fn spawn_audio_load(&mut self, round: u32) {
        if self.audio_cache.contains_key(&round) || !self.audio_pending.insert(round) {
            return;
        }
        let Some(handle) = self
            .quiz
            .as_ref()
            .and_then(|quiz| quiz.question(round))
            .map(|question| question.audio.clone())
        else {
            self.audio_pending.remove(&round);
            return;
        };

        let library = self.library.clone();
        let mailbox = self.loopback.clone();
        tokio::spawn(async move {
            let message = match library.load_audio(&handle).await {
                Ok(audio) => RoomMessage::AudioLoaded { round, audio },
                Err(error) => RoomMessage::AudioFailed { round, error },
            };
            let _ = mailbox.send(message);
        });
    }

    fn on_audio_loaded(&mut self, round: u32, audio: Bytes) {
        self.audio_pending.remove(&round);
        self.audio_cache.insert(round, audio.clone());

        let current = match self.machine.phase().round() {
            Some(current) => current,
            None => return,
        };
        if round != current && round != current + 1 {
            return;
        }

        debug!(room = %self.id, round, bytes = audio.len(), "streaming audio");
        self.stream_to_links(round, &audio);
    }

    /// Queue a song transfer on every connected link. A link that cannot
    /// accept the transfer is closed with a protocol-error reason.
    fn stream_to_links(&mut self, round: u32, audio: &Bytes) {
        let failed: Vec<SessionId> = self
            .links
            .iter()
            .filter(|(_, link)| {
                link.send(Outbound::Song {
                    round,
                    audio: audio.clone(),
                })
                .is_err()
            })
            .map(|(session, _)| session.clone())
            .collect();

        for session in failed {
            warn!(room = %self.id, session = %session, round, "failed to queue audio");
            self.close_link(&session, CloseReason::Protocol);
        }
    }

    fn on_audio_failed(&mut self, round: u32, error: LibraryError) {
        self.audio_pending.remove(&round);

        if self.machine.phase().round() == Some(round) {
            error!(room = %self.id, round, error = %error, "failed to load audio for the current round");
            self.abort();
        } else {
            warn!(room = %self.id, round, error = %error, "failed to prefetch audio");
        }
    }

    /// Unrecoverable failure: park the room on the scoreboard with whatever
    /// scores accumulated. Other rooms are unaffected.
    fn abort(&mut self) {
        if self.machine.apply(RoomEvent::Abort).is_ok() {
            self.timer.take();
            self.publish_and_broadcast();
        }
    }

    // ---- phase flow --------------------------------------------------------

    fn enter_buffering(&mut self, round: u32) {
        self.guesses.clear();
        self.correct.clear();
        // Acknowledgements for past rounds are no longer interesting.
        for rounds in self.buffered.values_mut() {
            rounds.retain(|&buffered| buffered >= round);
        }

        self.ensure_streamed(round);
        self.publish_and_broadcast();
        // Prefetched acknowledgements may already cover this round.
        self.maybe_advance(round);
    }

    fn ensure_streamed(&mut self, round: u32) {
        match self.audio_cache.get(&round) {
            Some(audio) => {
                let audio = audio.clone();
                self.stream_to_links(round, &audio);
            }
            None => self.spawn_audio_load(round),
        }
    }

    /// Advance Buffering → Playing once every connected committed player has
    /// acknowledged the round. An empty intersection never auto-advances; a
    /// deserted room parks until someone rejoins or the host forces it.
    fn maybe_advance(&mut self, round: u32) {
        if !matches!(self.machine.phase(), RoomPhase::Buffering { round: current } if current == round)
        {
            return;
        }

        let mut present = self
            .committed
            .iter()
            .filter(|session| self.links.contains_key(*session))
            .peekable();
        if present.peek().is_none() {
            return;
        }
        let all_ready = present.all(|session| {
            self.buffered
                .get(session)
                .is_some_and(|rounds| rounds.contains(&round))
        });

        if all_ready {
            debug!(room = %self.id, round, "all connected players buffered");
            self.begin_playing(round);
        }
    }

    fn begin_playing(&mut self, round: u32) {
        let started_at_ms = epoch_ms();
        if let Err(err) = self.machine.apply(RoomEvent::Buffered { started_at_ms }) {
            debug!(room = %self.id, error = %err, "ignoring advance");
            return;
        }

        self.timer = Some(timer::schedule(
            self.config.round_duration(),
            RoomMessage::RoundTimeout { round },
            self.loopback.clone(),
        ));

        // Get the next round's audio moving while this one plays.
        if self.quiz.as_ref().is_some_and(|quiz| quiz.has_round(round + 1)) {
            self.spawn_audio_load(round + 1);
        }

        info!(room = %self.id, round, "round playing");
        self.publish_and_broadcast();
    }

    fn begin_review(&mut self, round: u32) {
        if let Err(err) = self.machine.apply(RoomEvent::RoundOver) {
            debug!(room = %self.id, error = %err, "ignoring review transition");
            return;
        }
        self.timer.take();
        self.score_round(round);

        self.timer = Some(timer::schedule(
            self.config.review_duration(),
            RoomMessage::ReviewTimeout { round },
            self.loopback.clone(),
        ));

        info!(room = %self.id, round, correct = self.correct.len(), "round reviewing");
        self.publish_and_broadcast();
    }

    fn finish_review(&mut self, round: u32) {
        let has_next = self.quiz.as_ref().is_some_and(|quiz| quiz.has_round(round + 1));
        if let Err(err) = self.machine.apply(RoomEvent::ReviewOver { has_next }) {
            debug!(room = %self.id, error = %err, "ignoring review end");
            return;
        }
        self.timer.take();

        if has_next {
            self.enter_buffering(round + 1);
        } else {
            info!(room = %self.id, scores = ?self.scores, "game finished");
            self.publish_and_broadcast();
        }
    }

    fn score_round(&mut self, round: u32) {
        let Some(solution) = self
            .quiz
            .as_ref()
            .and_then(|quiz| quiz.question(round))
            .map(|question| question.solution.clone())
        else {
            return;
        };

        for (session, guess) in &self.guesses {
            if matches_solution(guess, &solution) {
                self.correct.insert(session.clone());
                if let Some(score) = self.scores.get_mut(session) {
                    *score += 1;
                }
            }
        }
    }

    fn on_round_timeout(&mut self, round: u32) {
        match self.machine.phase() {
            RoomPhase::Playing { round: current, .. } if current == round => {
                self.begin_review(round)
            }
            _ => debug!(room = %self.id, round, "ignoring stale round timeout"),
        }
    }

    fn on_review_timeout(&mut self, round: u32) {
        match self.machine.phase() {
            RoomPhase::Reviewing { round: current } if current == round => {
                self.finish_review(round)
            }
            _ => debug!(room = %self.id, round, "ignoring stale review timeout"),
        }
    }

    // ---- published views ---------------------------------------------------

    /// Roster of the current status: connected players in the lobby, the
    /// committed set afterwards.
    fn roster(&self) -> Vec<PlayerInfo> {
        let sessions: Vec<&SessionId> = match self.machine.phase() {
            RoomPhase::Lobby => self.links.keys().collect(),
            _ => self.committed.iter().collect(),
        };
        sessions
            .into_iter()
            .filter_map(|session| self.players.get(session).cloned())
            .collect()
    }

    fn current_status(&self) -> RoomStatus {
        let players = self.roster();
        match self.machine.phase() {
            RoomPhase::Lobby => RoomStatus::Lobby { players },
            RoomPhase::Loading => RoomStatus::Loading { players },
            RoomPhase::Buffering { round } => RoomStatus::Buffering {
                players,
                round,
                ready: self
                    .committed
                    .iter()
                    .filter(|session| {
                        self.buffered
                            .get(*session)
                            .is_some_and(|rounds| rounds.contains(&round))
                    })
                    .cloned()
                    .collect(),
                scores: self.scores.clone(),
            },
            RoomPhase::Playing {
                round,
                started_at_ms,
            } => RoomStatus::Playing {
                players,
                round,
                round_start: started_at_ms,
                prompt: self.prompt_for(round),
                guessed: self.guesses.keys().cloned().collect(),
                scores: self.scores.clone(),
            },
            RoomPhase::Reviewing { round } => RoomStatus::Reviewing {
                players,
                round,
                prompt: self.prompt_for(round),
                solution: self
                    .quiz
                    .as_ref()
                    .and_then(|quiz| quiz.question(round))
                    .map(|question| question.solution.clone())
                    .unwrap_or_default(),
                guesses: self.guesses.clone(),
                correct: self.correct.iter().cloned().collect(),
                scores: self.scores.clone(),
            },
            RoomPhase::Finished => RoomStatus::Finished {
                players,
                scores: self.scores.clone(),
            },
        }
    }

    fn prompt_for(&self, round: u32) -> String {
        self.quiz
            .as_ref()
            .and_then(|quiz| quiz.question(round))
            .map(|question| question.prompt.clone())
            .unwrap_or_default()
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(RoomSnapshot {
            connected: self.links.len(),
            status: self.current_status(),
        });
    }

    fn broadcast(&self, command: ServerCommand) {
        for (session, link) in &self.links {
            if link.send(Outbound::Command(command.clone())).is_err() {
                warn!(room = %self.id, session = %session, "failed to queue message for player");
            }
        }
    }

    fn broadcast_state_except(&self, skip: Option<LinkId>) {
        let command = ServerCommand::RoomState {
            state: self.current_status(),
        };
        for (session, link) in &self.links {
            if skip == Some(link.id) {
                continue;
            }
            if link.send(Outbound::Command(command.clone())).is_err() {
                warn!(room = %self.id, session = %session, "failed to queue message for player");
            }
        }
    }

    fn publish_and_broadcast(&self) {
        self.publish();
        self.broadcast_state_except(None);
    }
}

/// A guess scores iff it equals the solution after trimming and case folding.
pub fn matches_solution(guess: &str, solution: &str) -> bool {
    guess.trim().to_lowercase() == solution.trim().to_lowercase()
}

fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
