//! The election state machine.
//!
//! One [`ElectionCandidate`] owns one candidate's lifecycle: connect,
//! ensure the election root exists, register an ephemeral-sequential
//! candidate node, rank the sibling snapshot, and re-arm watches until
//! closed. All mutable state lives inside a single spawned driver task;
//! commands from the owner and notices from the session are delivered to
//! it over channels and processed one at a time, so no locks guard
//! election state.

use std::sync::Arc;

use alder_ensemble::CreateMode;
use alder_ensemble::EnsembleClient;
use alder_ensemble::EnsembleSession;
use alder_ensemble::NodeStat;
use alder_ensemble::SessionNotice;
use alder_ensemble::WatchEvent;
use alder_ensemble::WatchEventKind;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::CandidateConfig;
use crate::error::ElectionError;
use crate::events::ElectionEvent;
use crate::events::EventRegistry;
use crate::pure;

/// Lifecycle phase of a candidate.
///
/// `Registered` is re-entered on every children-watch firing; `Closed` is
/// terminal for election progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidatePhase {
    /// Built, not yet started.
    Idle,
    /// Session establishment in flight.
    Connecting,
    /// Session established.
    Connected,
    /// Existence check on the election root in flight, creation watch armed.
    RootCheckPending,
    /// Durable create of the election root in flight.
    RootCreatePending,
    /// Ephemeral-sequential create of the candidate node in flight.
    CandidateCreatePending,
    /// Candidate node exists; ranking against sibling snapshots.
    Registered,
    /// Teardown requested; watch callbacks no longer progress the machine.
    Closing,
    /// Session torn down after a requested close.
    Closed,
}

/// Snapshot of a candidate's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStatus {
    /// Current lifecycle phase.
    pub phase: CandidatePhase,
    /// Whether this candidate currently leads its group.
    pub is_leader: bool,
    /// The ensemble-assigned id, set once the candidate node is created.
    pub candidate_id: Option<u64>,
}

impl CandidateStatus {
    fn idle() -> Self {
        Self {
            phase: CandidatePhase::Idle,
            is_leader: false,
            candidate_id: None,
        }
    }
}

/// Owner requests served by the driver task.
enum Command {
    Close,
    RemoveRoot,
    CreateRoot,
}

/// One election participant.
///
/// Construction cannot fail at runtime: the paths inside
/// [`CandidateConfig`] are validated newtypes, so a malformed root or
/// prefix never reaches the async path.
///
/// # Example
///
/// ```ignore
/// let config = CandidateConfig::new("ensemble-a:2181", "/workers", "candidate_")?;
/// let candidate = ElectionCandidate::new(client, config);
/// let mut events = candidate.subscribe();
/// let handle = candidate.start();
///
/// while let Some(event) = events.recv().await {
///     if let ElectionEvent::LeaderChanged { is_leader: true, .. } = event {
///         // leader-only work
///     }
/// }
/// ```
pub struct ElectionCandidate<C: EnsembleClient + ?Sized> {
    client: Arc<C>,
    config: CandidateConfig,
    registry: EventRegistry,
}

impl<C: EnsembleClient + ?Sized + 'static> ElectionCandidate<C> {
    /// Create a candidate for the election group in `config`.
    pub fn new(client: Arc<C>, config: CandidateConfig) -> Self {
        Self {
            client,
            config,
            registry: EventRegistry::default(),
        }
    }

    /// Register an event subscriber.
    ///
    /// Subscribing before [`start`](Self::start) guarantees no event is
    /// missed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ElectionEvent> {
        self.registry.subscribe()
    }

    /// Start participating in the election.
    ///
    /// Fire-and-forget: the returned handle observes progress, the driver
    /// task does the work. Restarting after a disconnect means building a
    /// fresh candidate, which registers a fresh node and id; retired ids
    /// are never reused.
    pub fn start(self) -> CandidateHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CandidateStatus::idle());

        let registry = self.registry.clone();
        let driver = Driver {
            client: self.client,
            config: self.config,
            registry: self.registry,
            status_tx,
            commands: command_rx,
            notices: notice_rx,
            notice_tx,
            phase: CandidatePhase::Idle,
            session: None,
            root_stat: None,
            candidate_path: None,
            candidate_id: None,
            is_leader: false,
            closing: false,
            disconnected: false,
        };
        tokio::spawn(driver.run());

        CandidateHandle {
            commands: command_tx,
            status_rx,
            registry,
        }
    }
}

/// Handle to a started candidate.
///
/// All operations are fire-and-forget; outcomes arrive on the event
/// surface. Dropping the handle requests a close.
pub struct CandidateHandle {
    commands: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<CandidateStatus>,
    registry: EventRegistry,
}

impl CandidateHandle {
    /// Register an event subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ElectionEvent> {
        self.registry.subscribe()
    }

    /// Subscribe to status snapshots.
    pub fn subscribe_status(&self) -> watch::Receiver<CandidateStatus> {
        self.status_rx.clone()
    }

    /// The current status snapshot.
    pub fn status(&self) -> CandidateStatus {
        self.status_rx.borrow().clone()
    }

    /// Whether this candidate currently leads its group.
    pub fn is_leader(&self) -> bool {
        self.status_rx.borrow().is_leader
    }

    /// The ensemble-assigned candidate id, once registered.
    pub fn candidate_id(&self) -> Option<u64> {
        self.status_rx.borrow().candidate_id
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> CandidatePhase {
        self.status_rx.borrow().phase
    }

    /// Request teardown.
    ///
    /// In-flight ensemble calls are not aborted; their callbacks become
    /// no-ops. The ensemble destroys this candidate's ephemeral node when
    /// the session ends, which is what hands leadership to the next
    /// candidate in line.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Request deletion of the election root.
    ///
    /// Usable independent of the election flow; with no live session a
    /// fresh one is established solely for the delete. Deletion is refused
    /// while sibling candidate nodes exist, surfaced as an
    /// [`ElectionError::Ensemble`] wrapping `NotEmpty`; removing other
    /// candidates' ephemeral nodes out from under their sessions is never
    /// done.
    pub fn remove_election_root(&self) {
        let _ = self.commands.send(Command::RemoveRoot);
    }

    /// Force an immediate create of the election root, bypassing the
    /// existence check.
    ///
    /// Unlike the internal ensure-root path, a lost creation race here IS
    /// surfaced, as an [`ElectionError::Ensemble`] wrapping `NodeExists`:
    /// the caller asked to create, not to ensure.
    pub fn create_election_root(&self) {
        let _ = self.commands.send(Command::CreateRoot);
    }
}

impl Drop for CandidateHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// The driver task: sole owner of all mutable election state.
struct Driver<C: EnsembleClient + ?Sized> {
    client: Arc<C>,
    config: CandidateConfig,
    registry: EventRegistry,
    status_tx: watch::Sender<CandidateStatus>,
    commands: mpsc::UnboundedReceiver<Command>,
    notices: mpsc::UnboundedReceiver<SessionNotice>,
    /// Kept so the notice channel never reports closed while the driver
    /// lives.
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    phase: CandidatePhase,
    session: Option<Arc<dyn EnsembleSession>>,
    root_stat: Option<NodeStat>,
    candidate_path: Option<String>,
    candidate_id: Option<u64>,
    is_leader: bool,
    closing: bool,
    disconnected: bool,
}

impl<C: EnsembleClient + ?Sized + 'static> Driver<C> {
    async fn run(mut self) {
        self.register().await;

        loop {
            tokio::select! {
                biased;
                notice = self.notices.recv() => {
                    if let Some(notice) = notice {
                        self.handle_notice(notice).await;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // Handle dropped; nothing can reach us anymore.
                        None => break,
                    }
                }
            }
        }
    }

    /// Connect and walk the registration sequence to the first ranking.
    async fn register(&mut self) {
        self.set_phase(CandidatePhase::Connecting);
        debug!(host = %self.config.host, root = %self.config.election_root, "connecting to ensemble");

        let connected = self
            .client
            .connect(&self.config.host, &self.config.session, self.notice_tx.clone())
            .await;
        let session = match connected {
            Ok(session) => session,
            Err(cause) => {
                self.fail(cause.into());
                return;
            }
        };
        self.session = Some(session);
        self.set_phase(CandidatePhase::Connected);
        info!(host = %self.config.host, "session established");
        self.emit(ElectionEvent::ClientConnected {
            host: self.config.host.clone(),
        });

        self.check_root().await;
    }

    /// Existence check on the election root with a creation watch armed.
    async fn check_root(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.set_phase(CandidatePhase::RootCheckPending);

        let root = self.config.election_root.as_str().to_owned();
        match session.exists(&root, true).await {
            Ok(Some(stat)) => {
                self.root_stat = Some(stat);
                self.create_candidate().await;
            }
            Ok(None) => self.create_root_then_candidate().await,
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// Durable create of the election root, then candidate registration.
    ///
    /// Losing the creation race to a concurrent candidate is benign on
    /// this path: the intent was "ensure the root exists", and it does.
    async fn create_root_then_candidate(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.set_phase(CandidatePhase::RootCreatePending);

        let root = self.config.election_root.as_str().to_owned();
        match session.create(&root, CreateMode::Durable).await {
            Ok(_) => {}
            Err(cause) if cause.is_node_exists() => {
                debug!(path = %root, "election root creation race lost, continuing");
            }
            Err(cause) => {
                self.fail(cause.into());
                return;
            }
        }

        // The creation watch armed by check_root fires for this session's
        // own create, and the ensemble queues that notice ahead of the
        // create result. Process it now so the emitted event order matches
        // the ensemble's delivery order.
        self.drain_pending_notices().await;
        self.create_candidate().await;
    }

    /// Ephemeral-sequential create of this candidate's node.
    async fn create_candidate(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.set_phase(CandidatePhase::CandidateCreatePending);
        debug_assert!(self.candidate_id.is_none(), "candidate id is assigned at most once per session");

        let request_path = self.config.candidate_path();
        match session.create(&request_path, CreateMode::EphemeralSequential).await {
            Ok(actual_path) => {
                let Some(id) = pure::extract_candidate_id(&actual_path) else {
                    self.fail(ElectionError::UnparseableCandidate { path: actual_path });
                    return;
                };
                self.candidate_id = Some(id);
                self.candidate_path = Some(actual_path.clone());
                self.sync_status();
                info!(path = %actual_path, id, "candidate node registered");
                self.emit(ElectionEvent::ChildCreated {
                    path: actual_path,
                    is_leader: self.is_leader,
                    candidate_id: id,
                });
                self.fetch_children().await;
            }
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// Fetch the sibling snapshot with a children watch armed, then re-rank.
    async fn fetch_children(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.set_phase(CandidatePhase::Registered);

        let root = self.config.election_root.as_str().to_owned();
        match session.get_children(&root, true).await {
            Ok(siblings) => self.rerank(&siblings),
            // The children watch is not re-armed past a fetch failure.
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// Run the ranking scan against a sibling snapshot.
    fn rerank(&mut self, siblings: &[String]) {
        let (Some(id), Some(path)) = (self.candidate_id, self.candidate_path.clone()) else {
            return;
        };

        let leads_now = pure::leads(id, siblings);
        debug!(id, siblings = siblings.len(), leads_now, "ranked sibling snapshot");
        if leads_now == self.is_leader {
            return;
        }
        self.is_leader = leads_now;
        self.sync_status();
        if leads_now {
            info!(id, path = %path, "acquired leadership");
        } else {
            info!(id, path = %path, "lost leadership");
        }
        self.emit(ElectionEvent::LeaderChanged {
            path,
            is_leader: leads_now,
            candidate_id: id,
        });
    }

    async fn handle_notice(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::Watch(event) => self.handle_watch(event).await,
            SessionNotice::Disconnected => self.handle_session_loss(),
        }
    }

    async fn handle_watch(&mut self, event: WatchEvent) {
        // A watch that fires during teardown lapses silently; re-arming
        // after close would leak subscriptions on the ensemble.
        if self.closing || self.disconnected {
            debug!(path = %event.path, "watch fired during teardown, lapsing");
            return;
        }

        match event.kind {
            WatchEventKind::NodeCreated => {
                self.emit(ElectionEvent::NodeCreated { path: event.path });
                self.recheck_root().await;
            }
            WatchEventKind::ChildrenChanged => {
                self.emit(ElectionEvent::NodeChildrenChanged {
                    path: event.path,
                    is_leader: self.is_leader,
                    candidate_id: self.candidate_id,
                });
                self.fetch_children().await;
            }
        }
    }

    /// Re-issue the existence check, re-arming the creation watch.
    ///
    /// This repeats on every creation-watch firing until the root is
    /// observed stably present, mirroring the ensemble's repeated-notify
    /// semantics for nodes that are deleted and recreated.
    async fn recheck_root(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let root = self.config.election_root.as_str().to_owned();
        match session.exists(&root, true).await {
            Ok(Some(stat)) => {
                let prior = self.root_stat.replace(stat);
                if prior.is_some_and(|prior| prior.create_revision != stat.create_revision) {
                    debug!(path = %root, "election root was recreated");
                }
            }
            Ok(None) => {}
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// An unexpected session loss reported by the ensemble.
    fn handle_session_loss(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.session = None;
        warn!(host = %self.config.host, "session lost");
        if self.closing {
            self.set_phase(CandidatePhase::Closed);
        }
        self.emit_disconnected();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Close => self.close_session().await,
            Command::RemoveRoot => self.remove_root().await,
            Command::CreateRoot => self.create_root_direct().await,
        }
    }

    /// Requested teardown.
    async fn close_session(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        self.set_phase(CandidatePhase::Closing);
        info!(host = %self.config.host, id = ?self.candidate_id, "closing candidate");

        let already_disconnected = self.disconnected;
        if let Some(session) = self.session.take() {
            if let Err(cause) = session.disconnect().await {
                self.fail(cause.into());
            }
        }
        self.disconnected = true;
        self.set_phase(CandidatePhase::Closed);
        if !already_disconnected {
            self.emit_disconnected();
        }
    }

    fn emit_disconnected(&mut self) {
        let path = self
            .candidate_path
            .clone()
            .unwrap_or_else(|| self.config.election_root.as_str().to_owned());
        self.emit(ElectionEvent::ClientDisconnected {
            host: self.config.host.clone(),
            path,
            candidate_id: self.candidate_id,
        });
    }

    /// Delete the election root, bootstrapping a throwaway session when no
    /// live one is held.
    async fn remove_root(&mut self) {
        let root = self.config.election_root.as_str().to_owned();

        let live = if self.disconnected { None } else { self.session.clone() };
        let (session, temporary) = match live {
            Some(session) => (session, false),
            None => {
                // Notices from the throwaway session are never consumed.
                let (notice_tx, _notice_rx) = mpsc::unbounded_channel();
                let connected = self
                    .client
                    .connect(&self.config.host, &self.config.session, notice_tx)
                    .await;
                match connected {
                    Ok(session) => (session, true),
                    Err(cause) => {
                        self.fail(cause.into());
                        return;
                    }
                }
            }
        };

        let outcome = session.remove(&root).await;
        if temporary {
            let _ = session.disconnect().await;
        }

        match outcome {
            Ok(()) => {
                info!(path = %root, "election root removed");
                self.emit(ElectionEvent::NodeRemoved {
                    path: root,
                    is_leader: self.is_leader,
                    candidate_id: self.candidate_id,
                });
            }
            // NotEmpty lands here: deletion is refused, not retried.
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// Forced create of the election root on the live session.
    async fn create_root_direct(&mut self) {
        let live = if self.disconnected { None } else { self.session.clone() };
        let Some(session) = live else {
            self.fail(ElectionError::NotConnected {
                operation: "create_election_root".to_string(),
            });
            return;
        };

        let root = self.config.election_root.as_str().to_owned();
        match session.create(&root, CreateMode::Durable).await {
            Ok(path) => self.emit(ElectionEvent::NodeCreated { path }),
            // NodeExists is surfaced on this path, unlike the internal
            // ensure-root sequence.
            Err(cause) => self.fail(cause.into()),
        }
    }

    /// Process notices the session has already queued.
    async fn drain_pending_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            self.handle_notice(notice).await;
        }
    }

    fn set_phase(&mut self, phase: CandidatePhase) {
        self.phase = phase;
        self.sync_status();
    }

    fn sync_status(&self) {
        let _ = self.status_tx.send(CandidateStatus {
            phase: self.phase,
            is_leader: self.is_leader,
            candidate_id: self.candidate_id,
        });
    }

    fn emit(&self, event: ElectionEvent) {
        self.registry.emit(event);
    }

    fn fail(&self, cause: ElectionError) {
        warn!(error = %cause, "election fault");
        self.emit(ElectionEvent::Error { cause });
    }
}
