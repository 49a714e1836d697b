use habit_core::{Action, SnapshotData, reduce};
use habit_types::{
    ActivityRecord, ActivityType, SessionState, Task, TaskType, UserScore, UserSlice, ViewedUser,
};
use uuid::Uuid;

fn score(user_id: Uuid, current: i32) -> UserScore {
    UserScore {
        user_id,
        current_score: current,
        total_earned: 0,
        total_spent: 0,
        tasks_completed: 0,
        rewards_claimed: 0,
        last_updated: "2024-03-01T12:00:00Z".to_string(),
    }
}

fn activity(user_id: Uuid, points: i32) -> ActivityRecord {
    ActivityRecord {
        id: Uuid::new_v4(),
        user_id,
        task_name: "Morning run".to_string(),
        points_earned: points,
        activity_type: ActivityType::TaskCompleted,
        timestamp: "2024-03-01T12:00:00Z".to_string(),
        related_id: None,
        previous_score: None,
        new_score: None,
        metadata: None,
    }
}

fn task(user_id: Uuid, name: &str) -> Task {
    Task {
        id: Uuid::new_v4(),
        user_id,
        name: name.to_string(),
        task_type: TaskType::Daily,
        point_value: 20,
        is_achieved: false,
        is_active: true,
        created_at: "2024-03-01T08:00:00Z".to_string(),
        updated_at: "2024-03-01T08:00:00Z".to_string(),
    }
}

/// Drives the reducer through a realistic session: pair up, receive
/// interleaved snapshots for both users, apply an optimistic score after
/// a mutation, then watch the authoritative snapshot supersede it.
#[test]
fn full_session_round_trip() {
    let me = Uuid::new_v4();
    let partner = Uuid::new_v4();
    let mut state = SessionState::new(me);

    reduce(
        &mut state,
        Action::PartnerChanged {
            partner_id: Some(partner),
        },
    );

    // Snapshots arrive in no particular order; each is routed by owner id.
    let deliveries: Vec<(Uuid, SnapshotData)> = vec![
        (partner, SnapshotData::Score(score(partner, 320))),
        (me, SnapshotData::Tasks(vec![task(me, "Read"), task(me, "Run")])),
        (me, SnapshotData::Score(score(me, 50))),
        (partner, SnapshotData::Tasks(vec![task(partner, "Stretch")])),
        (me, SnapshotData::Activities(vec![activity(me, 20)])),
    ];
    for (owner, data) in deliveries {
        let slice = state.slice_for(owner).expect("known user");
        reduce(&mut state, Action::Snapshot { slice, data });
    }

    assert_eq!(state.current_user.score.as_ref().unwrap().current_score, 50);
    assert_eq!(state.partner_user.score.as_ref().unwrap().current_score, 320);
    assert_eq!(state.current_user.tasks.len(), 2);
    assert_eq!(state.partner_user.tasks.len(), 1);

    // A completed task commits remotely; its returned score becomes the
    // pending overlay while the snapshot is still in flight.
    reduce(
        &mut state,
        Action::ScoreCommitted {
            slice: UserSlice::Current,
            score: score(me, 70),
        },
    );
    assert_eq!(
        state.current_user.effective_score().unwrap().current_score,
        70
    );
    // The canonical cache is untouched until the snapshot lands.
    assert_eq!(state.current_user.score.as_ref().unwrap().current_score, 50);

    reduce(
        &mut state,
        Action::Snapshot {
            slice: UserSlice::Current,
            data: SnapshotData::Score(score(me, 70)),
        },
    );
    assert!(state.current_user.pending_score.is_none());
    assert_eq!(
        state.current_user.effective_score().unwrap().current_score,
        70
    );

    // Switching the viewed user never touches the data slices.
    reduce(
        &mut state,
        Action::SetViewingUser {
            view: ViewedUser::Partner,
        },
    );
    assert_eq!(state.viewed_data().score.as_ref().unwrap().current_score, 320);
    assert_eq!(state.current_user.tasks.len(), 2);
}
