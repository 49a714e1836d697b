use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use habit_core::notifications::NoticeHandler;
use habit_core::{Action, Notifier, SnapshotData, reduce};
use habit_persistence::{DataError, Store, Subscription, SubscriptionEvent};
use habit_types::{AccountInfo, Collection, Notice, ServerMessage, SessionState, UserSlice};

use crate::websocket::connection::ConnectionId;

/// Forwards published notices to the connection's outbound queue.
struct OutboundNotices {
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl NoticeHandler for OutboundNotices {
    fn handle(&mut self, notice: &Notice) {
        let _ = self.sender.send(ServerMessage::Notice {
            notice: notice.clone(),
        });
    }
}

/// One authenticated connection's live view. The session subscribes to
/// the owner's collections (and the partner's, while paired), routes
/// every snapshot through the reducer, and streams the resulting state
/// to the client. All subscriptions die with the session.
pub struct SyncSession {
    connection_id: ConnectionId,
    account: AccountInfo,
    state: Mutex<SessionState>,
    notifier: Mutex<Notifier>,
    sender: mpsc::UnboundedSender<ServerMessage>,
    store: Arc<Store>,
    activity_limit: usize,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    partner_pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncSession {
    async fn start(
        connection_id: ConnectionId,
        account: AccountInfo,
        sender: mpsc::UnboundedSender<ServerMessage>,
        store: Arc<Store>,
        activity_limit: usize,
    ) -> Result<Arc<Self>, DataError> {
        // The ledger row exists before anything subscribes to it.
        store.scores.get_or_init(account.user_id).await?;

        let session = Arc::new(Self {
            connection_id,
            account: account.clone(),
            state: Mutex::new(SessionState::new(account.user_id)),
            notifier: Mutex::new(Notifier::new()),
            sender,
            store,
            activity_limit,
            pumps: Mutex::new(Vec::new()),
            partner_pumps: Mutex::new(Vec::new()),
        });

        session
            .notifier
            .lock()
            .unwrap()
            .add_handler(Box::new(OutboundNotices {
                sender: session.sender.clone(),
            }));

        session.spawn_primary_pumps();
        session.push_state();
        Ok(session)
    }

    pub fn user_id(&self) -> Uuid {
        self.account.user_id
    }

    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    /// Run an action through the reducer and stream the new state.
    pub fn apply(&self, action: Action) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            reduce(&mut state, action);
            state.clone()
        };
        let _ = self
            .sender
            .send(ServerMessage::StateChanged { state: snapshot });
    }

    pub fn notify_success(&self, message: impl Into<String>) {
        self.notifier.lock().unwrap().success(message);
    }

    pub fn notify_info(&self, message: impl Into<String>) {
        self.notifier.lock().unwrap().info(message);
    }

    fn push_state(&self) {
        let state = self.state.lock().unwrap().clone();
        let _ = self.sender.send(ServerMessage::StateChanged { state });
    }

    /// Snapshots are routed by their owner id; one that matches neither
    /// user (a stale feed after re-pairing) is dropped.
    fn apply_snapshot(&self, owner: Uuid, data: SnapshotData) {
        let slice = self.state.lock().unwrap().slice_for(owner);
        match slice {
            Some(slice) => self.apply(Action::Snapshot { slice, data }),
            None => tracing::warn!(
                "Dropping snapshot for user {} not part of session {}",
                owner,
                self.connection_id
            ),
        }
    }

    fn apply_snapshot_error(&self, owner: Uuid, collection: Collection, err: DataError) {
        let slice = self.state.lock().unwrap().slice_for(owner);
        if let Some(slice) = slice {
            self.apply(Action::SnapshotError {
                slice,
                collection,
                message: err.to_string(),
            });
        }
    }

    fn mark_all_loading(&self, slice: UserSlice) {
        let mut state = self.state.lock().unwrap();
        for collection in [
            Collection::Tasks,
            Collection::Rewards,
            Collection::Activities,
            Collection::Score,
        ] {
            reduce(&mut state, Action::MarkLoading { slice, collection });
        }
    }

    fn spawn_primary_pumps(self: &Arc<Self>) {
        let user_id = self.account.user_id;
        self.mark_all_loading(UserSlice::Current);

        let mut handles = Vec::new();
        self.spawn_collection_pumps(user_id, &mut handles);

        let mut profile_sub = self.store.profiles.subscribe(user_id);
        let session = self.clone();
        handles.push(tokio::spawn(async move {
            while let Some(profile) = profile_sub.next().await {
                session.apply(Action::ProfileChanged {
                    slice: UserSlice::Current,
                    profile,
                });
            }
        }));

        let mut invitations_sub = self.store.pairing.subscribe_invitations(&self.account.email);
        let session = self.clone();
        handles.push(tokio::spawn(async move {
            while let Some(invitations) = invitations_sub.next().await {
                session.apply(Action::InvitationsChanged { invitations });
            }
        }));

        // The pair link drives the partner-side subscriptions.
        let mut pair_sub = self.store.pairing.subscribe_pair(user_id);
        let session = self.clone();
        handles.push(tokio::spawn(async move {
            while let Some(partner) = pair_sub.next().await {
                session.handle_partner_change(partner);
            }
        }));

        *self.pumps.lock().unwrap() = handles;
    }

    /// Swap the partner slice over to a new (or no) partner. The old
    /// partner's feeds are stopped before the slice is reassigned, so a
    /// late snapshot can never land in the wrong slice.
    fn handle_partner_change(self: &Arc<Self>, partner: Option<Uuid>) {
        let changed = { self.state.lock().unwrap().partner_user_id != partner };
        if !changed {
            return;
        }

        {
            let mut partner_pumps = self.partner_pumps.lock().unwrap();
            for pump in partner_pumps.drain(..) {
                pump.abort();
            }
        }

        self.apply(Action::PartnerChanged {
            partner_id: partner,
        });

        if let Some(partner_id) = partner {
            self.mark_all_loading(UserSlice::Partner);

            let mut handles = Vec::new();
            self.spawn_collection_pumps(partner_id, &mut handles);

            let mut profile_sub = self.store.profiles.subscribe(partner_id);
            let session = self.clone();
            handles.push(tokio::spawn(async move {
                while let Some(profile) = profile_sub.next().await {
                    session.apply(Action::ProfileChanged {
                        slice: UserSlice::Partner,
                        profile,
                    });
                }
            }));

            *self.partner_pumps.lock().unwrap() = handles;
        }
    }

    fn spawn_collection_pumps(self: &Arc<Self>, owner: Uuid, handles: &mut Vec<JoinHandle<()>>) {
        handles.push(pump(
            self.clone(),
            owner,
            Collection::Tasks,
            self.store.tasks.subscribe(owner),
            SnapshotData::Tasks,
        ));
        handles.push(pump(
            self.clone(),
            owner,
            Collection::Rewards,
            self.store.rewards.subscribe(owner),
            SnapshotData::Rewards,
        ));
        handles.push(pump(
            self.clone(),
            owner,
            Collection::Activities,
            self.store.activities.subscribe(owner, self.activity_limit),
            SnapshotData::Activities,
        ));
        handles.push(pump(
            self.clone(),
            owner,
            Collection::Score,
            self.store.scores.subscribe(owner),
            SnapshotData::Score,
        ));
    }

    /// Aborting the pump tasks drops their subscription guards, which in
    /// turn aborts the underlying watchers. Must be called explicitly:
    /// the pumps hold `Arc<Self>`, so the session never drops on its own.
    pub(crate) fn shutdown(&self) {
        for pump in self.pumps.lock().unwrap().drain(..) {
            pump.abort();
        }
        for pump in self.partner_pumps.lock().unwrap().drain(..) {
            pump.abort();
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forwards one subscription into the session, snapshots and side-channel
/// errors both.
fn pump<T: Send + 'static>(
    session: Arc<SyncSession>,
    owner: Uuid,
    collection: Collection,
    mut sub: Subscription<T>,
    wrap: impl Fn(T) -> SnapshotData + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = sub.next_event().await {
            match event {
                SubscriptionEvent::Snapshot(data) => session.apply_snapshot(owner, wrap(data)),
                SubscriptionEvent::Error(err) => {
                    session.apply_snapshot_error(owner, collection, err)
                }
            }
        }
    })
}

pub struct SessionManager {
    sessions: RwLock<HashMap<ConnectionId, Arc<SyncSession>>>,
    store: Arc<Store>,
    activity_limit: usize,
}

impl SessionManager {
    pub fn new(store: Arc<Store>, activity_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            activity_limit,
        }
    }

    pub async fn start_session(
        &self,
        connection_id: ConnectionId,
        account: AccountInfo,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<Arc<SyncSession>, DataError> {
        let session = SyncSession::start(
            connection_id,
            account,
            sender,
            self.store.clone(),
            self.activity_limit,
        )
        .await?;

        let mut sessions = self.sessions.write().await;
        if let Some(old) = sessions.insert(connection_id, session.clone()) {
            old.shutdown();
        }
        Ok(session)
    }

    pub async fn get(&self, connection_id: ConnectionId) -> Option<Arc<SyncSession>> {
        let sessions = self.sessions.read().await;
        sessions.get(&connection_id).cloned()
    }

    pub async fn end_session(&self, connection_id: ConnectionId) {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&connection_id)
        };
        if let Some(session) = session {
            tracing::info!("Ending session for connection {}", connection_id);
            session.shutdown();
        }
    }

    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}
