use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{AnswerOutcome, GameHandle, LeaderboardEntry, PlayerIdentity, Question},
    protocol::{
        AnswerRequest, AnswerResult, GameRequest, JoinRequest, JoinResponse, LeaderboardSnapshot,
        QuestionCard,
    },
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

mod store;
pub mod transport;

pub use store::SessionStore;
pub use transport::HttpGameRpc;

/// How long a per-question result stays on screen before the next fetch.
pub const RESULT_HOLD_DELAY: Duration = Duration::from_millis(5000);

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait GameRpc: Send + Sync {
    async fn join_game(&self, request: JoinRequest) -> Result<JoinResponse>;
    async fn next_question(&self, request: GameRequest) -> Result<QuestionCard>;
    async fn submit_answer(&self, request: AnswerRequest) -> Result<AnswerResult>;
    async fn leaderboard(&self, request: GameRequest) -> Result<LeaderboardSnapshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcOp {
    JoinGame,
    GetNextQuestion,
    SubmitAnswer,
    GetLeaderboard,
}

impl std::fmt::Display for RpcOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::JoinGame => "JoinGame",
            Self::GetNextQuestion => "GetNextQuestion",
            Self::SubmitAnswer => "SubmitAnswer",
            Self::GetLeaderboard => "GetLeaderboard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Joining,
    InLobby,
    FetchingQuestion,
    AwaitingAnswer,
    Submitting,
    ShowingResult,
    GameOver,
    LeaderboardLoading,
    LeaderboardReady,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("player name must not be empty")]
    EmptyPlayerName,
    #[error("no answer option selected")]
    EmptyAnswer,
    #[error("{action} is not valid while the session is {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: Phase,
    },
    #[error("no active game session; join a game first")]
    NotJoined,
    #[error("{op} failed: {source}")]
    Remote {
        op: RpcOp,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Lobby,
    Leaderboard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub phase: Phase,
    pub question: Option<Question>,
    pub selected: Option<String>,
    pub result: Option<AnswerOutcome>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Navigate(Screen),
    ViewModel(ViewModel),
}

/// Drives the join -> lobby -> question-loop -> leaderboard lifecycle over an
/// injected [`GameRpc`]. One instance per logical session.
pub struct SessionController {
    rpc: Arc<dyn GameRpc>,
    result_hold: Duration,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

struct SessionState {
    phase: Phase,
    store: SessionStore,
    question: Option<Question>,
    selected_option: Option<String>,
    outcome: Option<AnswerOutcome>,
    leaderboard: Vec<LeaderboardEntry>,
    loading: bool,
    last_error: Option<String>,
    /// Request epoch; continuations re-check it under the lock and discard
    /// themselves on mismatch.
    generation: u64,
    hold_timer: Option<JoinHandle<()>>,
}

impl SessionState {
    fn view_model(&self) -> ViewModel {
        ViewModel {
            phase: self.phase,
            question: self.question.clone(),
            selected: self.selected_option.clone(),
            result: self.outcome.clone(),
            leaderboard: self.leaderboard.clone(),
            loading: self.loading,
            error: self.last_error.clone(),
        }
    }

    fn begin_question_fetch(&mut self) -> u64 {
        self.phase = Phase::FetchingQuestion;
        self.loading = true;
        self.last_error = None;
        self.generation += 1;
        self.generation
    }

    fn session_request(&self) -> Result<GameRequest, SessionError> {
        match (self.store.identity(), self.store.game()) {
            (Some(identity), Some(game)) => Ok(GameRequest {
                game_id: game.game_id.clone(),
                player_id: identity.player_id.clone(),
            }),
            _ => Err(SessionError::NotJoined),
        }
    }
}

impl SessionController {
    pub fn new(rpc: Arc<dyn GameRpc>) -> Arc<Self> {
        Self::new_with_result_hold(rpc, RESULT_HOLD_DELAY)
    }

    pub fn new_with_result_hold(rpc: Arc<dyn GameRpc>, result_hold: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            rpc,
            result_hold,
            inner: Mutex::new(SessionState {
                phase: Phase::Idle,
                store: SessionStore::default(),
                question: None,
                selected_option: None,
                outcome: None,
                leaderboard: Vec::new(),
                loading: false,
                last_error: None,
                generation: 0,
                hold_timer: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn view_model(&self) -> ViewModel {
        self.inner.lock().await.view_model()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub async fn identity(&self) -> Option<PlayerIdentity> {
        self.inner.lock().await.store.identity().cloned()
    }

    pub async fn game(&self) -> Option<GameHandle> {
        self.inner.lock().await.store.game().cloned()
    }

    /// Valid from `Idle`, and from `Joining` again after a failed attempt.
    pub async fn join(&self, name: &str) -> Result<(), SessionError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyPlayerName);
        }

        let issued = {
            let mut state = self.inner.lock().await;
            if !matches!(state.phase, Phase::Idle | Phase::Joining) {
                return Err(SessionError::InvalidPhase {
                    action: "join",
                    phase: state.phase,
                });
            }
            state.phase = Phase::Joining;
            state.loading = true;
            state.last_error = None;
            state.generation += 1;
            self.emit_view_model(&state);
            state.generation
        };

        let outcome = self
            .rpc
            .join_game(JoinRequest {
                player_name: trimmed.to_string(),
            })
            .await;

        let mut state = self.inner.lock().await;
        if state.generation != issued {
            debug!(op = %RpcOp::JoinGame, "discarding stale response");
            return Ok(());
        }
        match outcome {
            Ok(response) => {
                info!(
                    player_id = %response.player_id,
                    game_id = %response.game_id,
                    "joined game"
                );
                state.store.set(
                    PlayerIdentity {
                        player_id: response.player_id,
                        display_name: trimmed.to_string(),
                    },
                    GameHandle {
                        game_id: response.game_id,
                    },
                );
                state.phase = Phase::InLobby;
                state.loading = false;
                self.emit_navigate(Screen::Lobby);
                self.emit_view_model(&state);
                Ok(())
            }
            Err(source) => {
                warn!(op = %RpcOp::JoinGame, error = %source, "remote call failed");
                state.loading = false;
                state.last_error = Some(source.to_string());
                self.emit_view_model(&state);
                Err(SessionError::Remote {
                    op: RpcOp::JoinGame,
                    source,
                })
            }
        }
    }

    pub async fn start_game(&self) -> Result<(), SessionError> {
        let (issued, request) = {
            let mut state = self.inner.lock().await;
            if state.phase != Phase::InLobby {
                return Err(SessionError::InvalidPhase {
                    action: "start_game",
                    phase: state.phase,
                });
            }
            let request = state.session_request()?;
            let issued = state.begin_question_fetch();
            self.emit_view_model(&state);
            (issued, request)
        };
        self.fetch_question(issued, request).await
    }

    /// Any older in-flight fetch or pending result-hold timer becomes stale.
    pub async fn refetch_question(&self) -> Result<(), SessionError> {
        let (issued, request) = {
            let mut state = self.inner.lock().await;
            if !matches!(
                state.phase,
                Phase::FetchingQuestion | Phase::AwaitingAnswer | Phase::ShowingResult
            ) {
                return Err(SessionError::InvalidPhase {
                    action: "refetch_question",
                    phase: state.phase,
                });
            }
            let request = state.session_request()?;
            let issued = state.begin_question_fetch();
            self.emit_view_model(&state);
            (issued, request)
        };
        self.fetch_question(issued, request).await
    }

    /// A no-op while a submission is in flight or once the current question
    /// already has an outcome.
    pub async fn submit_answer(self: &Arc<Self>, option: &str) -> Result<(), SessionError> {
        let selected = option.trim();
        if selected.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let (issued, request) = {
            let mut state = self.inner.lock().await;
            if state.phase == Phase::Submitting || state.outcome.is_some() {
                debug!(phase = ?state.phase, "ignoring duplicate answer submission");
                return Ok(());
            }
            if state.phase != Phase::AwaitingAnswer {
                return Err(SessionError::InvalidPhase {
                    action: "submit_answer",
                    phase: state.phase,
                });
            }
            let ids = state.session_request()?;
            let question = state.question.as_ref().ok_or(SessionError::InvalidPhase {
                action: "submit_answer",
                phase: state.phase,
            })?;
            let request = AnswerRequest {
                game_id: ids.game_id,
                player_id: ids.player_id,
                question_id: question.question_id.clone(),
                selected_option: selected.to_string(),
                answer_timestamp: Utc::now().timestamp_millis(),
            };
            state.selected_option = Some(selected.to_string());
            state.phase = Phase::Submitting;
            state.loading = true;
            state.last_error = None;
            self.emit_view_model(&state);
            (state.generation, request)
        };

        let outcome = self.rpc.submit_answer(request).await;

        let mut state = self.inner.lock().await;
        if state.generation != issued {
            debug!(op = %RpcOp::SubmitAnswer, "discarding stale response");
            return Ok(());
        }
        match outcome {
            Ok(result) => {
                info!(
                    correct = result.correct,
                    points = result.points_awarded,
                    "answer result received"
                );
                state.outcome = Some(AnswerOutcome::from(result));
                state.phase = Phase::ShowingResult;
                state.loading = false;
                self.emit_view_model(&state);
                self.schedule_refetch(&mut state);
                Ok(())
            }
            Err(source) => {
                warn!(op = %RpcOp::SubmitAnswer, error = %source, "remote call failed");
                state.phase = Phase::AwaitingAnswer;
                state.loading = false;
                state.selected_option = None;
                state.last_error = Some(source.to_string());
                self.emit_view_model(&state);
                Err(SessionError::Remote {
                    op: RpcOp::SubmitAnswer,
                    source,
                })
            }
        }
    }

    pub async fn refresh_leaderboard(&self) -> Result<(), SessionError> {
        let (issued, request, announce) = {
            let mut state = self.inner.lock().await;
            if !matches!(
                state.phase,
                Phase::LeaderboardLoading | Phase::LeaderboardReady
            ) {
                return Err(SessionError::InvalidPhase {
                    action: "refresh_leaderboard",
                    phase: state.phase,
                });
            }
            let request = state.session_request()?;
            // Navigation is announced only when the board first becomes ready.
            let announce = state.phase == Phase::LeaderboardLoading;
            state.phase = Phase::LeaderboardLoading;
            state.loading = true;
            state.last_error = None;
            state.generation += 1;
            self.emit_view_model(&state);
            (state.generation, request, announce)
        };
        self.fetch_leaderboard(issued, request, announce).await
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        state.generation += 1;
        if let Some(timer) = state.hold_timer.take() {
            timer.abort();
        }
        state.store.clear();
        state.question = None;
        state.selected_option = None;
        state.outcome = None;
        state.leaderboard.clear();
        state.loading = false;
        state.last_error = None;
        state.phase = Phase::Idle;
        info!("session reset");
        self.emit_view_model(&state);
    }

    async fn fetch_question(
        &self,
        issued: u64,
        request: GameRequest,
    ) -> Result<(), SessionError> {
        let outcome = self.rpc.next_question(request.clone()).await;

        let mut state = self.inner.lock().await;
        if state.generation != issued {
            debug!(op = %RpcOp::GetNextQuestion, "discarding stale response");
            return Ok(());
        }

        let card = match outcome {
            Ok(card) => card,
            Err(source) => {
                warn!(op = %RpcOp::GetNextQuestion, error = %source, "remote call failed");
                state.loading = false;
                state.last_error = Some(source.to_string());
                self.emit_view_model(&state);
                return Err(SessionError::Remote {
                    op: RpcOp::GetNextQuestion,
                    source,
                });
            }
        };

        match card.into_question() {
            Some(question) => {
                info!(question_id = %question.question_id, "next question received");
                state.question = Some(question);
                state.outcome = None;
                state.selected_option = None;
                state.phase = Phase::AwaitingAnswer;
                state.loading = false;
                self.emit_view_model(&state);
                Ok(())
            }
            None => {
                info!("empty question text; no further questions");
                state.question = None;
                state.outcome = None;
                state.selected_option = None;
                state.phase = Phase::GameOver;
                self.emit_view_model(&state);
                state.phase = Phase::LeaderboardLoading;
                state.loading = true;
                self.emit_view_model(&state);
                drop(state);
                self.fetch_leaderboard(issued, request, true).await
            }
        }
    }

    async fn fetch_leaderboard(
        &self,
        issued: u64,
        request: GameRequest,
        announce: bool,
    ) -> Result<(), SessionError> {
        let outcome = self.rpc.leaderboard(request).await;

        let mut state = self.inner.lock().await;
        if state.generation != issued {
            debug!(op = %RpcOp::GetLeaderboard, "discarding stale response");
            return Ok(());
        }
        match outcome {
            Ok(snapshot) => {
                info!(entries = snapshot.entries.len(), "leaderboard received");
                state.leaderboard = snapshot.entries;
                state.phase = Phase::LeaderboardReady;
                state.loading = false;
                if announce {
                    self.emit_navigate(Screen::Leaderboard);
                }
                self.emit_view_model(&state);
                Ok(())
            }
            Err(source) => {
                warn!(op = %RpcOp::GetLeaderboard, error = %source, "remote call failed");
                state.loading = false;
                state.last_error = Some(source.to_string());
                self.emit_view_model(&state);
                Err(SessionError::Remote {
                    op: RpcOp::GetLeaderboard,
                    source,
                })
            }
        }
    }

    /// At most one timer is pending; reset aborts it, and a generation
    /// mismatch at fire time suppresses the fetch.
    fn schedule_refetch(self: &Arc<Self>, state: &mut SessionState) {
        if let Some(previous) = state.hold_timer.take() {
            previous.abort();
        }
        let issued = state.generation;
        let controller = Arc::clone(self);
        state.hold_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(controller.result_hold).await;
            controller.refetch_after_result(issued).await;
        }));
    }

    async fn refetch_after_result(&self, issued: u64) {
        let (next_issued, request) = {
            let mut state = self.inner.lock().await;
            if state.generation != issued {
                debug!("discarding result-hold timer from a superseded session");
                return;
            }
            let Ok(request) = state.session_request() else {
                return;
            };
            let next_issued = state.begin_question_fetch();
            self.emit_view_model(&state);
            (next_issued, request)
        };
        if let Err(error) = self.fetch_question(next_issued, request).await {
            debug!(%error, "scheduled question fetch failed");
        }
    }

    fn emit_view_model(&self, state: &SessionState) {
        let _ = self.events.send(SessionEvent::ViewModel(state.view_model()));
    }

    fn emit_navigate(&self, screen: Screen) {
        let _ = self.events.send(SessionEvent::Navigate(screen));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
