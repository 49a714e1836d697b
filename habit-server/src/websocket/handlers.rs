use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use habit_core::{Action, format_points, validation};
use habit_persistence::{DataError, Store};
use habit_types::{
    ActiveTab, ClientMessage, RewardDraft, RewardPatch, ServerMessage, SyncErrorCode, TaskDraft,
    TaskPatch, UserSlice, ViewedUser,
};

use crate::auth::AuthService;
use crate::session::{SessionManager, SyncSession};
use crate::websocket::connection::{ConnectionId, ConnectionManager};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    session_manager: Arc<SessionManager>,
    auth_service: Arc<AuthService>,
    store: Arc<Store>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        session_manager: Arc<SessionManager>,
        auth_service: Arc<AuthService>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            session_manager,
            auth_service,
            store,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::Authenticate { token } => self.handle_authenticate(token).await,
            ClientMessage::SetupProfile { username } => self.handle_setup_profile(username).await,
            ClientMessage::SetActiveTab { tab } => self.handle_set_active_tab(tab).await,
            ClientMessage::SetViewingUser { view } => self.handle_set_viewing_user(view).await,
            ClientMessage::SetTaskModal { visible } => {
                self.handle_ui_action(Action::SetTaskModal { visible }).await
            }
            ClientMessage::SetRewardModal { visible } => {
                self.handle_ui_action(Action::SetRewardModal { visible }).await
            }
            ClientMessage::CreateTask { draft } => self.handle_create_task(draft).await,
            ClientMessage::UpdateTask { task_id, patch } => {
                self.handle_update_task(task_id, patch).await
            }
            ClientMessage::DeleteTask { task_id } => self.handle_delete_task(task_id).await,
            ClientMessage::CompleteTask { task_id } => self.handle_complete_task(task_id).await,
            ClientMessage::CreateReward { draft } => self.handle_create_reward(draft).await,
            ClientMessage::UpdateReward { reward_id, patch } => {
                self.handle_update_reward(reward_id, patch).await
            }
            ClientMessage::DeleteReward { reward_id } => self.handle_delete_reward(reward_id).await,
            ClientMessage::ClaimReward { reward_id } => self.handle_claim_reward(reward_id).await,
            ClientMessage::UndoActivity { activity_id } => {
                self.handle_undo_activity(activity_id).await
            }
            ClientMessage::SendInvitation { to_email } => {
                self.handle_send_invitation(to_email).await
            }
            ClientMessage::AcceptInvitation { invitation_id } => {
                self.handle_accept_invitation(invitation_id).await
            }
            ClientMessage::RejectInvitation { invitation_id } => {
                self.handle_reject_invitation(invitation_id).await
            }
            ClientMessage::Unpair => self.handle_unpair().await,
            ClientMessage::Heartbeat => Ok(()),
        }
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);
        self.session_manager.end_session(self.connection_id).await;
    }

    async fn handle_authenticate(&self, token: String) -> Result<(), String> {
        info!("Authenticating connection {}", self.connection_id);

        let account = match self.auth_service.validate_token(&token).await {
            Ok(account) => account,
            Err(err) => {
                warn!(
                    "Authentication failed for connection {}: {}",
                    self.connection_id, err
                );
                return self
                    .send_message(ServerMessage::AuthenticationFailed {
                        reason: err.to_string(),
                    })
                    .await;
            }
        };

        if let Err(reason) = self
            .connection_manager
            .authenticate_connection(self.connection_id, account.clone())
            .await
        {
            return self
                .send_message(ServerMessage::AuthenticationFailed { reason })
                .await;
        }

        let profile = match self.store.profiles.get(account.user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Failed to load profile for {}: {}", account.user_id, err);
                None
            }
        };
        self.send_message(ServerMessage::AuthenticationSuccess {
            user: account.clone(),
            profile,
        })
        .await?;

        let sender = self
            .connection_manager
            .get_connection(self.connection_id)
            .await
            .map(|conn| conn.sender)
            .ok_or("Connection not found")?;

        match self
            .session_manager
            .start_session(self.connection_id, account, sender)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                self.send_error(&format!("Failed to start session: {}", err))
                    .await
            }
        }
    }

    async fn handle_setup_profile(&self, username: String) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        if username.trim().is_empty() {
            return self.send_error("Username cannot be empty").await;
        }

        match self
            .store
            .profiles
            .upsert(session.user_id(), username.trim(), &session.account().email)
            .await
        {
            Ok(profile) => {
                session.notify_success(format!("Welcome, {}!", profile.username));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_set_active_tab(&self, tab: ActiveTab) -> Result<(), String> {
        self.handle_ui_action(Action::SetActiveTab { tab }).await
    }

    async fn handle_set_viewing_user(&self, view: ViewedUser) -> Result<(), String> {
        self.handle_ui_action(Action::SetViewingUser { view }).await
    }

    async fn handle_ui_action(&self, action: Action) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        session.apply(action);
        Ok(())
    }

    async fn handle_create_task(&self, draft: TaskDraft) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        if let Err(err) = validation::validate_task_draft(&draft) {
            return self.send_error(&err.to_string()).await;
        }

        match self.store.tasks.create(session.user_id(), draft).await {
            Ok(task) => {
                session.notify_success(format!("Task \"{}\" created", task.name));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_update_task(&self, task_id: Uuid, patch: TaskPatch) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .tasks
            .update(session.user_id(), task_id, patch)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_delete_task(&self, task_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self.store.tasks.delete(session.user_id(), task_id).await {
            Ok(()) => {
                session.notify_info("Task deleted");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_complete_task(&self, task_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .ledger
            .complete_task(session.user_id(), task_id)
            .await
        {
            Ok(done) => {
                session.apply(Action::ScoreCommitted {
                    slice: UserSlice::Current,
                    score: done.score.clone(),
                });
                session.notify_success(format!(
                    "\"{}\" completed ({} points)",
                    done.task.name,
                    format_points(done.activity.points_earned)
                ));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_create_reward(&self, draft: RewardDraft) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        if let Err(err) = validation::validate_reward_draft(&draft) {
            return self.send_error(&err.to_string()).await;
        }

        match self.store.rewards.create(session.user_id(), draft).await {
            Ok(reward) => {
                session.notify_success(format!("Reward \"{}\" created", reward.name));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_update_reward(
        &self,
        reward_id: Uuid,
        patch: RewardPatch,
    ) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .rewards
            .update(session.user_id(), reward_id, patch)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_delete_reward(&self, reward_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self.store.rewards.delete(session.user_id(), reward_id).await {
            Ok(()) => {
                session.notify_info("Reward deleted");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_claim_reward(&self, reward_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .ledger
            .claim_reward(session.user_id(), reward_id)
            .await
        {
            Ok(claim) => {
                session.apply(Action::ScoreCommitted {
                    slice: UserSlice::Current,
                    score: claim.score.clone(),
                });
                session.notify_success(format!(
                    "Redeemed \"{}\" ({} points)",
                    claim.reward.name,
                    format_points(claim.activity.points_earned)
                ));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_undo_activity(&self, activity_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .ledger
            .delete_activity(session.user_id(), activity_id)
            .await
        {
            Ok(reversal) => {
                if let Some(score) = reversal.score.clone() {
                    session.apply(Action::ScoreCommitted {
                        slice: UserSlice::Current,
                        score,
                    });
                }
                session.notify_info(format!(
                    "\"{}\" undone ({} points reversed)",
                    reversal.activity.task_name,
                    format_points(-reversal.activity.points_earned)
                ));
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_send_invitation(&self, to_email: String) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        let to_email = to_email.trim().to_string();
        if let Err(err) =
            validation::validate_invitation_target(&session.account().email, &to_email)
        {
            return self.send_error(&err.to_string()).await;
        }

        match self.store.profiles.exists_by_email(&to_email).await {
            Ok(true) => {}
            Ok(false) => {
                return self
                    .send_message(ServerMessage::MutationFailed {
                        code: SyncErrorCode::NotFound,
                        message: "No user is registered with that email".to_string(),
                    })
                    .await;
            }
            Err(err) => return self.send_mutation_failed(err).await,
        }

        let from_user_name = self
            .store
            .profiles
            .get(session.user_id())
            .await
            .ok()
            .flatten()
            .map(|profile| profile.username)
            .unwrap_or_else(|| "Unnamed User".to_string());

        match self
            .store
            .pairing
            .send_invitation(session.user_id(), &from_user_name, &to_email)
            .await
        {
            Ok(_) => {
                session.notify_success("Invitation sent!");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_accept_invitation(&self, invitation_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self
            .store
            .pairing
            .accept_invitation(invitation_id, session.user_id())
            .await
        {
            Ok(_) => {
                session.notify_success("Invitation accepted!");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_reject_invitation(&self, invitation_id: Uuid) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        match self.store.pairing.reject_invitation(invitation_id).await {
            Ok(()) => {
                session.notify_info("Invitation rejected");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn handle_unpair(&self) -> Result<(), String> {
        let Some(session) = self.session().await else {
            return self.send_unauthenticated().await;
        };
        let partner = match self.store.pairing.partner_of(session.user_id()).await {
            Ok(Some(partner)) => partner,
            Ok(None) => return self.send_error("No partner to unpair from").await,
            Err(err) => return self.send_mutation_failed(err).await,
        };

        match self.store.pairing.unpair(session.user_id(), partner).await {
            Ok(()) => {
                session.notify_info("Unpaired");
                Ok(())
            }
            Err(err) => self.send_mutation_failed(err).await,
        }
    }

    async fn session(&self) -> Option<Arc<SyncSession>> {
        self.session_manager.get(self.connection_id).await
    }

    async fn send_unauthenticated(&self) -> Result<(), String> {
        self.send_message(ServerMessage::MutationFailed {
            code: SyncErrorCode::Unauthenticated,
            message: "Authentication required".to_string(),
        })
        .await
    }

    async fn send_mutation_failed(&self, err: DataError) -> Result<(), String> {
        self.send_message(ServerMessage::MutationFailed {
            code: err.code(),
            message: err.to_string(),
        })
        .await
    }

    async fn send_error(&self, message: &str) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: message.to_string(),
        })
        .await
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }
}
