use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use uuid::Uuid;

use habit_types::{InvitationStatus, PairInvitation};

use crate::entities::{pair_invitations, prelude::*, user_pairs};
use crate::error::{DataError, RecordKind};
use crate::watch::{ChangeBus, ChangeEvent, Subscription, spawn_watch};

pub struct PairingRepository {
    db: DatabaseConnection,
    bus: ChangeBus,
}

impl PairingRepository {
    pub fn new(db: DatabaseConnection, bus: ChangeBus) -> Self {
        Self { db, bus }
    }

    pub async fn send_invitation(
        &self,
        from_user_id: Uuid,
        from_user_name: &str,
        to_email: &str,
    ) -> Result<PairInvitation, DataError> {
        let to_email = to_email.to_lowercase();
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let model = pair_invitations::ActiveModel {
            id: Set(Uuid::new_v4()),
            from_user_id: Set(from_user_id),
            from_user_name: Set(from_user_name.to_string()),
            to_email: Set(to_email.clone()),
            status: Set(InvitationStatus::Pending.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            accepted_at: Set(None),
            rejected_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        self.bus.publish(ChangeEvent::Invitations { to_email });
        Ok(model.into())
    }

    pub async fn pending_invitations(
        &self,
        to_email: &str,
    ) -> Result<Vec<PairInvitation>, DataError> {
        load_pending(&self.db, to_email.to_lowercase()).await
    }

    /// Accept in one transaction: flip the invitation and upsert both
    /// directions of the link. An accepting user who already has a
    /// partner gets their link replaced by the new one. Returns the new
    /// partner's id.
    pub async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        accepting_user: Uuid,
    ) -> Result<Uuid, DataError> {
        let (partner_id, to_email) = self
            .db
            .transaction::<_, (Uuid, String), DataError>(|txn| {
                Box::pin(async move {
                    // Reads complete before any write.
                    let invitation = PairInvitations::find_by_id(invitation_id)
                        .one(txn)
                        .await?
                        .ok_or(DataError::NotFound(RecordKind::Invitation))?;
                    let partner_id = invitation.from_user_id;
                    let to_email = invitation.to_email.clone();
                    let own_link = UserPairs::find_by_id(accepting_user).one(txn).await?;
                    let partner_link = UserPairs::find_by_id(partner_id).one(txn).await?;

                    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
                    let mut active = invitation.into_active_model();
                    active.status = Set(InvitationStatus::Accepted.as_str().to_string());
                    active.accepted_at = Set(Some(now));
                    active.updated_at = Set(now);
                    active.update(txn).await?;

                    upsert_link(txn, own_link, accepting_user, partner_id, now).await?;
                    upsert_link(txn, partner_link, partner_id, accepting_user, now).await?;

                    Ok((partner_id, to_email))
                })
            })
            .await
            .map_err(DataError::from_txn)?;

        self.bus.publish(ChangeEvent::Pair {
            user_id: accepting_user,
        });
        self.bus.publish(ChangeEvent::Pair {
            user_id: partner_id,
        });
        self.bus.publish(ChangeEvent::Invitations { to_email });
        Ok(partner_id)
    }

    pub async fn reject_invitation(&self, invitation_id: Uuid) -> Result<(), DataError> {
        let model = PairInvitations::find_by_id(invitation_id)
            .one(&self.db)
            .await?
            .ok_or(DataError::NotFound(RecordKind::Invitation))?;
        let to_email = model.to_email.clone();

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let mut active = model.into_active_model();
        active.status = Set(InvitationStatus::Rejected.as_str().to_string());
        active.rejected_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        self.bus.publish(ChangeEvent::Invitations { to_email });
        Ok(())
    }

    pub async fn partner_of(&self, user_id: Uuid) -> Result<Option<Uuid>, DataError> {
        load_partner(&self.db, user_id).await
    }

    /// Deletes both directions of the link in one transaction. Task,
    /// reward and activity data are untouched.
    pub async fn unpair(&self, user_id: Uuid, partner_id: Uuid) -> Result<(), DataError> {
        self.db
            .transaction::<_, (), DataError>(|txn| {
                Box::pin(async move {
                    UserPairs::delete_by_id(user_id).exec(txn).await?;
                    UserPairs::delete_by_id(partner_id).exec(txn).await?;
                    Ok(())
                })
            })
            .await
            .map_err(DataError::from_txn)?;

        self.bus.publish(ChangeEvent::Pair { user_id });
        self.bus.publish(ChangeEvent::Pair {
            user_id: partner_id,
        });
        Ok(())
    }

    pub fn subscribe_pair(&self, user_id: Uuid) -> Subscription<Option<Uuid>> {
        let db = self.db.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| matches!(event, ChangeEvent::Pair { user_id: owner } if *owner == user_id),
            move || {
                let db = db.clone();
                async move { load_partner(&db, user_id).await }
            },
        )
    }

    pub fn subscribe_invitations(&self, to_email: &str) -> Subscription<Vec<PairInvitation>> {
        let db = self.db.clone();
        let to_email = to_email.to_lowercase();
        let filter_email = to_email.clone();
        spawn_watch(
            self.bus.subscribe(),
            move |event| {
                matches!(event, ChangeEvent::Invitations { to_email: addr } if *addr == filter_email)
            },
            move || {
                let db = db.clone();
                let to_email = to_email.clone();
                async move { load_pending(&db, to_email).await }
            },
        )
    }
}

async fn upsert_link(
    txn: &DatabaseTransaction,
    existing: Option<user_pairs::Model>,
    user_id: Uuid,
    partner_id: Uuid,
    now: DateTimeWithTimeZone,
) -> Result<(), DataError> {
    match existing {
        Some(model) => {
            let mut active = model.into_active_model();
            active.partner_id = Set(partner_id);
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        None => {
            user_pairs::ActiveModel {
                user_id: Set(user_id),
                partner_id: Set(partner_id),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
        }
    }
    Ok(())
}

async fn load_partner(db: &DatabaseConnection, user_id: Uuid) -> Result<Option<Uuid>, DataError> {
    let model = UserPairs::find_by_id(user_id).one(db).await?;
    Ok(model.map(|pair| pair.partner_id))
}

async fn load_pending(
    db: &DatabaseConnection,
    to_email: String,
) -> Result<Vec<PairInvitation>, DataError> {
    let mut models = PairInvitations::find()
        .filter(pair_invitations::Column::ToEmail.eq(to_email))
        .filter(pair_invitations::Column::Status.eq(InvitationStatus::Pending.as_str()))
        .all(db)
        .await?;

    models.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(models.into_iter().map(PairInvitation::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use std::time::Duration;

    async fn setup_test_repo() -> PairingRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        PairingRepository::new(db, ChangeBus::new(16))
    }

    #[tokio::test]
    async fn test_accept_creates_both_links_and_flips_status() {
        let repo = setup_test_repo().await;
        let inviter = Uuid::new_v4();
        let invitee = Uuid::new_v4();

        let invitation = repo
            .send_invitation(inviter, "Alice", "Bob@Example.com")
            .await
            .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert_eq!(invitation.to_email, "bob@example.com");

        let partner = repo
            .accept_invitation(invitation.id, invitee)
            .await
            .unwrap();
        assert_eq!(partner, inviter);

        assert_eq!(repo.partner_of(invitee).await.unwrap(), Some(inviter));
        assert_eq!(repo.partner_of(inviter).await.unwrap(), Some(invitee));

        // The invitation is no longer pending.
        let pending = repo.pending_invitations("bob@example.com").await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_accept_missing_invitation_is_not_found() {
        let repo = setup_test_repo().await;
        let result = repo.accept_invitation(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(DataError::NotFound(RecordKind::Invitation))
        ));
    }

    #[tokio::test]
    async fn test_reject_flips_status_without_links() {
        let repo = setup_test_repo().await;
        let inviter = Uuid::new_v4();

        let invitation = repo
            .send_invitation(inviter, "Alice", "bob@example.com")
            .await
            .unwrap();
        repo.reject_invitation(invitation.id).await.unwrap();

        assert!(
            repo.pending_invitations("bob@example.com")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(repo.partner_of(inviter).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unpair_removes_both_directions() {
        let repo = setup_test_repo().await;
        let inviter = Uuid::new_v4();
        let invitee = Uuid::new_v4();

        let invitation = repo
            .send_invitation(inviter, "Alice", "bob@example.com")
            .await
            .unwrap();
        repo.accept_invitation(invitation.id, invitee).await.unwrap();

        repo.unpair(invitee, inviter).await.unwrap();
        assert_eq!(repo.partner_of(invitee).await.unwrap(), None);
        assert_eq!(repo.partner_of(inviter).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_accepting_while_paired_replaces_own_link() {
        let repo = setup_test_repo().await;
        let user = Uuid::new_v4();
        let first_partner = Uuid::new_v4();
        let second_partner = Uuid::new_v4();

        let invitation = repo
            .send_invitation(first_partner, "First", "user@example.com")
            .await
            .unwrap();
        repo.accept_invitation(invitation.id, user).await.unwrap();

        let invitation = repo
            .send_invitation(second_partner, "Second", "user@example.com")
            .await
            .unwrap();
        repo.accept_invitation(invitation.id, user).await.unwrap();

        assert_eq!(repo.partner_of(user).await.unwrap(), Some(second_partner));
        assert_eq!(repo.partner_of(second_partner).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_pair_subscription_tracks_link_changes() {
        let repo = setup_test_repo().await;
        let inviter = Uuid::new_v4();
        let invitee = Uuid::new_v4();

        let mut sub = repo.subscribe_pair(invitee);
        let initial = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(initial, None);

        let invitation = repo
            .send_invitation(inviter, "Alice", "bob@example.com")
            .await
            .unwrap();
        repo.accept_invitation(invitation.id, invitee).await.unwrap();

        let paired = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paired, Some(inviter));

        repo.unpair(invitee, inviter).await.unwrap();
        let unpaired = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unpaired, None);
    }

    #[tokio::test]
    async fn test_invitation_subscription_filters_by_email() {
        let repo = setup_test_repo().await;
        let inviter = Uuid::new_v4();

        let mut sub = repo.subscribe_invitations("Bob@Example.com");
        let initial = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert!(initial.is_empty());

        repo.send_invitation(inviter, "Alice", "bob@example.com")
            .await
            .unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].from_user_name, "Alice");

        // Invitations for other addresses never show up here.
        repo.send_invitation(inviter, "Alice", "carol@example.com")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sub.try_next().is_none());
    }
}
