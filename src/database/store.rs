//! # State Store Actor
//!
//! Single-writer owner of the SQLite pool. Callers hold a cheap, cloneable
//! [`StateStore`] handle and send commands over a bounded channel; one worker task
//! executes them sequentially and answers through `oneshot` replies.

use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::constants::ActionKind;
use crate::error::{StoreError, StoreResult};
use crate::models::{ActionRecord, ActorScheduleState, KnownVideo, NewActionRecord};

type Reply<T> = oneshot::Sender<StoreResult<T>>;

/// Commands understood by the store worker
enum StoreCommand {
    LoadActorState {
        actor_id: String,
        reply: Reply<Option<ActorScheduleState>>,
    },
    SaveActorState {
        state: ActorScheduleState,
        reply: Reply<()>,
    },
    RecordAction {
        record: NewActionRecord,
        reply: Reply<i64>,
    },
    CountActions {
        actor_id: String,
        kind: ActionKind,
        since: f64,
        reply: Reply<i64>,
    },
    HasActionOn {
        actor_id: String,
        kind: ActionKind,
        video_id: String,
        since: f64,
        reply: Reply<bool>,
    },
    ActionTexts {
        actor_id: String,
        kind: ActionKind,
        since: f64,
        reply: Reply<Vec<String>>,
    },
    ActionsFor {
        actor_id: String,
        reply: Reply<Vec<ActionRecord>>,
    },
    TrackVideo {
        video_id: String,
        seen_at: f64,
        reply: Reply<()>,
    },
    LoadKnownVideos {
        reply: Reply<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the store worker
#[derive(Clone, Debug)]
pub struct StateStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LoadActorState { .. } => "LoadActorState",
            Self::SaveActorState { .. } => "SaveActorState",
            Self::RecordAction { .. } => "RecordAction",
            Self::CountActions { .. } => "CountActions",
            Self::HasActionOn { .. } => "HasActionOn",
            Self::ActionTexts { .. } => "ActionTexts",
            Self::ActionsFor { .. } => "ActionsFor",
            Self::TrackVideo { .. } => "TrackVideo",
            Self::LoadKnownVideos { .. } => "LoadKnownVideos",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

impl StateStore {
    /// Connect, create the schema, and spawn the worker
    pub async fn open(database_url: &str, channel_capacity: usize) -> StoreResult<Self> {
        let pool = super::connect(database_url).await?;
        super::migrations::ensure_schema(&pool).await?;
        Ok(Self::spawn(pool, channel_capacity))
    }

    /// Spawn the worker over an already-prepared pool
    pub fn spawn(pool: SqlitePool, channel_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        tokio::spawn(StoreWorker { pool, rx }.run());
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> StoreCommand) -> StoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| StoreError::ChannelClosed)?;
        rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn load_actor_state(&self, actor_id: &str) -> StoreResult<Option<ActorScheduleState>> {
        let actor_id = actor_id.to_string();
        self.request(|reply| StoreCommand::LoadActorState { actor_id, reply })
            .await
    }

    pub async fn save_actor_state(&self, state: ActorScheduleState) -> StoreResult<()> {
        self.request(|reply| StoreCommand::SaveActorState { state, reply })
            .await
    }

    pub async fn record_action(&self, record: NewActionRecord) -> StoreResult<i64> {
        self.request(|reply| StoreCommand::RecordAction { record, reply })
            .await
    }

    pub async fn count_actions(&self, actor_id: &str, kind: ActionKind, since: f64) -> StoreResult<i64> {
        let actor_id = actor_id.to_string();
        self.request(|reply| StoreCommand::CountActions {
            actor_id,
            kind,
            since,
            reply,
        })
        .await
    }

    pub async fn has_action_on(
        &self,
        actor_id: &str,
        kind: ActionKind,
        video_id: &str,
        since: f64,
    ) -> StoreResult<bool> {
        let actor_id = actor_id.to_string();
        let video_id = video_id.to_string();
        self.request(|reply| StoreCommand::HasActionOn {
            actor_id,
            kind,
            video_id,
            since,
            reply,
        })
        .await
    }

    pub async fn action_texts(&self, actor_id: &str, kind: ActionKind, since: f64) -> StoreResult<Vec<String>> {
        let actor_id = actor_id.to_string();
        self.request(|reply| StoreCommand::ActionTexts {
            actor_id,
            kind,
            since,
            reply,
        })
        .await
    }

    pub async fn actions_for(&self, actor_id: &str) -> StoreResult<Vec<ActionRecord>> {
        let actor_id = actor_id.to_string();
        self.request(|reply| StoreCommand::ActionsFor { actor_id, reply })
            .await
    }

    pub async fn track_video(&self, video_id: &str, seen_at: f64) -> StoreResult<()> {
        let video_id = video_id.to_string();
        self.request(|reply| StoreCommand::TrackVideo {
            video_id,
            seen_at,
            reply,
        })
        .await
    }

    pub async fn load_known_videos(&self) -> StoreResult<Vec<String>> {
        self.request(|reply| StoreCommand::LoadKnownVideos { reply })
            .await
    }

    /// Drain queued commands, close the pool, and stop the worker
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(StoreCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct StoreWorker {
    pool: SqlitePool,
    rx: mpsc::Receiver<StoreCommand>,
}

impl StoreWorker {
    async fn run(mut self) {
        debug!("🗄️ STATE_STORE: Worker started");
        while let Some(command) = self.rx.recv().await {
            if let StoreCommand::Shutdown { reply } = command {
                self.rx.close();
                while let Ok(pending) = self.rx.try_recv() {
                    self.handle(pending).await;
                }
                self.pool.close().await;
                info!("🗄️ STATE_STORE: Worker stopped");
                let _ = reply.send(());
                return;
            }
            self.handle(command).await;
        }
        self.pool.close().await;
        debug!("🗄️ STATE_STORE: All handles dropped, worker exiting");
    }

    async fn handle(&self, command: StoreCommand) {
        let pool = &self.pool;
        match command {
            StoreCommand::LoadActorState { actor_id, reply } => {
                let result = ActorScheduleState::find(pool, &actor_id).await;
                respond(reply, result, "load_actor_state");
            }
            StoreCommand::SaveActorState { state, reply } => {
                let result = ActorScheduleState::upsert(pool, &state).await;
                respond(reply, result, "save_actor_state");
            }
            StoreCommand::RecordAction { record, reply } => {
                let result = ActionRecord::create(pool, &record).await;
                respond(reply, result, "record_action");
            }
            StoreCommand::CountActions {
                actor_id,
                kind,
                since,
                reply,
            } => {
                let result = ActionRecord::count_since(pool, &actor_id, kind, since).await;
                respond(reply, result, "count_actions");
            }
            StoreCommand::HasActionOn {
                actor_id,
                kind,
                video_id,
                since,
                reply,
            } => {
                let result = ActionRecord::exists_on_video_since(pool, &actor_id, kind, &video_id, since).await;
                respond(reply, result, "has_action_on");
            }
            StoreCommand::ActionTexts {
                actor_id,
                kind,
                since,
                reply,
            } => {
                let result = ActionRecord::texts_since(pool, &actor_id, kind, since).await;
                respond(reply, result, "action_texts");
            }
            StoreCommand::ActionsFor { actor_id, reply } => {
                let result = ActionRecord::list_for_actor(pool, &actor_id).await;
                respond(reply, result, "actions_for");
            }
            StoreCommand::TrackVideo {
                video_id,
                seen_at,
                reply,
            } => {
                let result = KnownVideo::track(pool, &video_id, seen_at).await;
                respond(reply, result, "track_video");
            }
            StoreCommand::LoadKnownVideos { reply } => {
                let result = KnownVideo::all_ids(pool).await;
                respond(reply, result, "load_known_videos");
            }
            StoreCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, sqlx::Error>, operation: &str) {
    if let Err(e) = &result {
        error!(operation = operation, error = %e, "❌ STATE_STORE: Query failed");
    }
    // Caller may have given up waiting; nothing to do then
    let _ = reply.send(result.map_err(StoreError::from));
}
