use habit_types::{
    ActiveTab, ActivityRecord, Collection, PairInvitation, Reward, SessionState, Task, UserData,
    UserId, UserProfile, UserScore, UserSlice, ViewedUser,
};

/// One remote collection's worth of data, already resolved to a slice.
#[derive(Debug, Clone)]
pub enum SnapshotData {
    Tasks(Vec<Task>),
    Rewards(Vec<Reward>),
    Activities(Vec<ActivityRecord>),
    Score(UserScore),
}

impl SnapshotData {
    pub fn collection(&self) -> Collection {
        match self {
            SnapshotData::Tasks(_) => Collection::Tasks,
            SnapshotData::Rewards(_) => Collection::Rewards,
            SnapshotData::Activities(_) => Collection::Activities,
            SnapshotData::Score(_) => Collection::Score,
        }
    }
}

/// Inputs to the state transition: gateway snapshots (tagged with an
/// explicit slice selector), UI intents, and mutation results.
#[derive(Debug, Clone)]
pub enum Action {
    Snapshot {
        slice: UserSlice,
        data: SnapshotData,
    },
    SnapshotError {
        slice: UserSlice,
        collection: Collection,
        message: String,
    },
    MarkLoading {
        slice: UserSlice,
        collection: Collection,
    },
    /// A mutation committed remotely; install its authoritative score as
    /// a pending overlay until the next score snapshot lands.
    ScoreCommitted {
        slice: UserSlice,
        score: UserScore,
    },
    PartnerChanged {
        partner_id: Option<UserId>,
    },
    ProfileChanged {
        slice: UserSlice,
        profile: Option<UserProfile>,
    },
    InvitationsChanged {
        invitations: Vec<PairInvitation>,
    },
    SetActiveTab {
        tab: ActiveTab,
    },
    SetViewingUser {
        view: ViewedUser,
    },
    SetTaskModal {
        visible: bool,
    },
    SetRewardModal {
        visible: bool,
    },
}

/// Pure state transition. Remote snapshots are the source of truth:
/// a snapshot for a collection replaces that collection wholesale and
/// discards any pending overlay for it, never merging the two.
pub fn reduce(state: &mut SessionState, action: Action) {
    match action {
        Action::Snapshot { slice, data } => {
            let collection = data.collection();
            let user = state.data_mut(slice);
            match data {
                SnapshotData::Tasks(tasks) => user.tasks = tasks,
                SnapshotData::Rewards(rewards) => user.rewards = rewards,
                SnapshotData::Activities(activities) => user.activities = activities,
                SnapshotData::Score(score) => {
                    if user.pending_score.take().is_some() {
                        tracing::debug!(?slice, "authoritative score snapshot superseded overlay");
                    }
                    user.score = Some(score);
                }
            }
            user.loading.set(collection, false);
            user.errors.set(collection, None);
        }
        Action::SnapshotError {
            slice,
            collection,
            message,
        } => {
            let user = state.data_mut(slice);
            user.loading.set(collection, false);
            user.errors.set(collection, Some(message));
        }
        Action::MarkLoading { slice, collection } => {
            state.data_mut(slice).loading.set(collection, true);
        }
        Action::ScoreCommitted { slice, score } => {
            state.data_mut(slice).pending_score = Some(score);
        }
        Action::PartnerChanged { partner_id } => {
            if state.partner_user_id == partner_id {
                return;
            }
            state.partner_user_id = partner_id;
            state.partner_user = UserData::default();
            state.partner_profile = None;
            if partner_id.is_none() && state.viewing_user == ViewedUser::Partner {
                state.viewing_user = ViewedUser::Current;
            }
        }
        Action::ProfileChanged { slice, profile } => match slice {
            UserSlice::Current => state.current_profile = profile,
            UserSlice::Partner => state.partner_profile = profile,
        },
        Action::InvitationsChanged { invitations } => {
            state.pending_invitations = invitations;
        }
        Action::SetActiveTab { tab } => {
            state.active_tab = tab;
        }
        Action::SetViewingUser { view } => {
            // There is nothing to view without a partner.
            if view == ViewedUser::Partner && state.partner_user_id.is_none() {
                return;
            }
            state.viewing_user = view;
        }
        Action::SetTaskModal { visible } => {
            state.show_task_modal = visible;
        }
        Action::SetRewardModal { visible } => {
            state.show_reward_modal = visible;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habit_types::TaskType;
    use uuid::Uuid;

    fn test_task(user_id: Uuid, name: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            task_type: TaskType::Daily,
            point_value: 25,
            is_achieved: false,
            is_active: true,
            created_at: "2024-03-01T00:00:00Z".to_string(),
            updated_at: "2024-03-01T00:00:00Z".to_string(),
        }
    }

    fn test_score(user_id: Uuid, current: i32) -> UserScore {
        UserScore {
            user_id,
            current_score: current,
            total_earned: current.max(0),
            total_spent: 0,
            tasks_completed: 0,
            rewards_claimed: 0,
            last_updated: "2024-03-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_snapshot_routing_never_crosses_slices() {
        let current = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let mut state = SessionState::new(current);
        reduce(
            &mut state,
            Action::PartnerChanged {
                partner_id: Some(partner),
            },
        );

        // Interleave snapshots for both users in arbitrary order.
        let partner_tasks = vec![test_task(partner, "Walk the dog")];
        let current_tasks = vec![test_task(current, "Read"), test_task(current, "Run")];

        let slice = state.slice_for(partner).unwrap();
        reduce(
            &mut state,
            Action::Snapshot {
                slice,
                data: SnapshotData::Tasks(partner_tasks),
            },
        );
        let slice = state.slice_for(current).unwrap();
        reduce(
            &mut state,
            Action::Snapshot {
                slice,
                data: SnapshotData::Tasks(current_tasks),
            },
        );

        assert_eq!(state.current_user.tasks.len(), 2);
        assert_eq!(state.partner_user.tasks.len(), 1);
        assert!(state.current_user.tasks.iter().all(|t| t.user_id == current));
        assert!(state.partner_user.tasks.iter().all(|t| t.user_id == partner));
    }

    #[test]
    fn test_unknown_user_id_has_no_slice() {
        let state = SessionState::new(Uuid::new_v4());
        assert_eq!(state.slice_for(Uuid::new_v4()), None);
    }

    #[test]
    fn test_score_snapshot_discards_pending_overlay() {
        let user_id = Uuid::new_v4();
        let mut state = SessionState::new(user_id);

        reduce(
            &mut state,
            Action::ScoreCommitted {
                slice: UserSlice::Current,
                score: test_score(user_id, 70),
            },
        );
        assert_eq!(
            state.current_user.effective_score().unwrap().current_score,
            70
        );
        assert!(state.current_user.score.is_none());

        // The authoritative snapshot replaces the overlay, it is not merged.
        reduce(
            &mut state,
            Action::Snapshot {
                slice: UserSlice::Current,
                data: SnapshotData::Score(test_score(user_id, 70)),
            },
        );
        assert!(state.current_user.pending_score.is_none());
        assert_eq!(
            state.current_user.effective_score().unwrap().current_score,
            70
        );
    }

    #[test]
    fn test_snapshot_clears_loading_and_error() {
        let user_id = Uuid::new_v4();
        let mut state = SessionState::new(user_id);

        reduce(
            &mut state,
            Action::MarkLoading {
                slice: UserSlice::Current,
                collection: Collection::Tasks,
            },
        );
        assert!(state.current_user.loading.get(Collection::Tasks));

        reduce(
            &mut state,
            Action::SnapshotError {
                slice: UserSlice::Current,
                collection: Collection::Tasks,
                message: "connection reset".to_string(),
            },
        );
        assert!(!state.current_user.loading.get(Collection::Tasks));
        assert!(state.current_user.errors.get(Collection::Tasks).is_some());

        reduce(
            &mut state,
            Action::Snapshot {
                slice: UserSlice::Current,
                data: SnapshotData::Tasks(vec![test_task(user_id, "Read")]),
            },
        );
        assert!(state.current_user.errors.get(Collection::Tasks).is_none());
    }

    #[test]
    fn test_snapshot_error_keeps_existing_data() {
        let user_id = Uuid::new_v4();
        let mut state = SessionState::new(user_id);

        reduce(
            &mut state,
            Action::Snapshot {
                slice: UserSlice::Current,
                data: SnapshotData::Tasks(vec![test_task(user_id, "Read")]),
            },
        );
        reduce(
            &mut state,
            Action::SnapshotError {
                slice: UserSlice::Current,
                collection: Collection::Tasks,
                message: "timed out".to_string(),
            },
        );

        assert_eq!(state.current_user.tasks.len(), 1);
    }

    #[test]
    fn test_partner_change_resets_partner_slice() {
        let current = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let mut state = SessionState::new(current);

        reduce(
            &mut state,
            Action::PartnerChanged {
                partner_id: Some(partner),
            },
        );
        reduce(
            &mut state,
            Action::Snapshot {
                slice: UserSlice::Partner,
                data: SnapshotData::Tasks(vec![test_task(partner, "Walk")]),
            },
        );
        reduce(
            &mut state,
            Action::SetViewingUser {
                view: ViewedUser::Partner,
            },
        );
        assert_eq!(state.partner_user.tasks.len(), 1);

        // Unpairing clears the slice and snaps the view back.
        reduce(&mut state, Action::PartnerChanged { partner_id: None });
        assert!(state.partner_user.tasks.is_empty());
        assert_eq!(state.partner_user_id, None);
        assert_eq!(state.viewing_user, ViewedUser::Current);
    }

    #[test]
    fn test_cannot_view_partner_without_one() {
        let mut state = SessionState::new(Uuid::new_v4());
        reduce(
            &mut state,
            Action::SetViewingUser {
                view: ViewedUser::Partner,
            },
        );
        assert_eq!(state.viewing_user, ViewedUser::Current);
    }

    #[test]
    fn test_ui_intents() {
        let mut state = SessionState::new(Uuid::new_v4());

        reduce(
            &mut state,
            Action::SetActiveTab {
                tab: ActiveTab::Rewards,
            },
        );
        assert_eq!(state.active_tab, ActiveTab::Rewards);

        reduce(&mut state, Action::SetTaskModal { visible: true });
        assert!(state.show_task_modal);
        reduce(&mut state, Action::SetTaskModal { visible: false });
        assert!(!state.show_task_modal);

        reduce(&mut state, Action::SetRewardModal { visible: true });
        assert!(state.show_reward_modal);
    }
}
