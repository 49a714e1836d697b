use std::sync::Arc;

use uuid::Uuid;
use warp::Filter;

use habit_persistence::Store;

use crate::auth::AuthService;
use crate::session::SessionManager;
use crate::websocket::ConnectionManager;

pub mod auth;
pub mod config;
pub mod session;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    session_manager: Arc<SessionManager>,
    auth_service: Arc<AuthService>,
    store: Arc<Store>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Clone for filters
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let session_manager_filter = warp::any().map({
        let session_manager = session_manager.clone();
        move || session_manager.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    let store_filter = warp::any().map({
        let store = store.clone();
        move || store.clone()
    });

    // WebSocket endpoint carrying the whole sync protocol
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(session_manager_filter.clone())
        .and(auth_filter.clone())
        .and(store_filter.clone())
        .map(
            |ws: warp::ws::Ws, conn_mgr, session_mgr, auth, store| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, conn_mgr, session_mgr, auth, store)
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Read-only score lookup; a user may read their own score and their
    // partner's, nobody else's.
    let user_score = warp::path!("user" / String / "score")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(store_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_user_score_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    websocket
        .or(health)
        .or(user_score)
        .with(cors)
        .with(warp::log("habit_sync"))
}

async fn handle_user_score_request(
    user_id: String,
    auth_header: Option<String>,
    store: Arc<Store>,
    auth_service: Arc<AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let target = match Uuid::parse_str(&user_id) {
        Ok(uuid) => uuid,
        Err(_) => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Invalid user ID format"
                })),
                warp::http::StatusCode::BAD_REQUEST,
            ));
        }
    };

    let Some(auth_header) = auth_header else {
        return Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Authentication required"
            })),
            warp::http::StatusCode::UNAUTHORIZED,
        ));
    };
    let token = auth_header.strip_prefix("Bearer ").unwrap_or(&auth_header);

    let account = match auth_service.validate_token(token).await {
        Ok(account) => account,
        Err(_) => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Invalid authentication token"
                })),
                warp::http::StatusCode::UNAUTHORIZED,
            ));
        }
    };

    let is_partner = matches!(
        store.pairing.partner_of(account.user_id).await,
        Ok(Some(partner)) if partner == target
    );
    if account.user_id != target && !is_partner {
        return Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Not authorized to view this user's score"
            })),
            warp::http::StatusCode::FORBIDDEN,
        ));
    }

    match store.scores.get(target).await {
        Ok(Some(score)) => Ok(warp::reply::with_status(
            warp::reply::json(&score),
            warp::http::StatusCode::OK,
        )),
        Ok(None) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Score not found"
            })),
            warp::http::StatusCode::NOT_FOUND,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch score: {}", err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch score"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use habit_types::{
        ClientMessage, ServerMessage, SessionState, SyncErrorCode, TaskDraft, TaskType, ViewedUser,
    };
    use migration::{Migrator, MigratorTrait};
    use std::time::Duration;

    async fn create_dev_test_app()
    -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let db = habit_persistence::connection::connect_to_memory_database()
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();
        let store = Arc::new(Store::new(db, 256));

        let connection_manager = Arc::new(ConnectionManager::new());
        let session_manager = Arc::new(SessionManager::new(store.clone(), 50));
        let auth_service = Arc::new(AuthService::new_dev_mode());

        create_routes(connection_manager, session_manager, auth_service, store)
    }

    async fn recv_server_msg(ws: &mut warp::test::WsClient) -> ServerMessage {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.recv())
            .await
            .expect("Timed out waiting for server message")
            .expect("Connection closed");
        let text = msg.to_str().expect("Expected text message");
        serde_json::from_str(text).expect("Should be valid ServerMessage")
    }

    /// Reads messages until a `StateChanged` satisfying the predicate
    /// arrives, skipping notices and interim states.
    async fn wait_for_state(
        ws: &mut warp::test::WsClient,
        pred: impl Fn(&SessionState) -> bool,
    ) -> SessionState {
        for _ in 0..100 {
            if let ServerMessage::StateChanged { state } = recv_server_msg(ws).await {
                if pred(&state) {
                    return state;
                }
            }
        }
        panic!("State predicate never satisfied");
    }

    async fn authenticate(
        ws: &mut warp::test::WsClient,
        user_id: Uuid,
        email: &str,
        name: &str,
    ) {
        let auth_msg = ClientMessage::Authenticate {
            token: format!("{}:{}:{}", user_id, email, name),
        };
        ws.send_text(serde_json::to_string(&auth_msg).unwrap()).await;

        match recv_server_msg(ws).await {
            ServerMessage::AuthenticationSuccess { user, .. } => {
                assert_eq!(user.user_id, user_id);
            }
            other => panic!("Expected AuthenticationSuccess, got: {:?}", other),
        }
    }

    async fn send(ws: &mut warp::test::WsClient, message: &ClientMessage) {
        ws.send_text(serde_json::to_string(message).unwrap()).await;
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_dev_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_invalid_routes() {
        let app = create_dev_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/invalid")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_unauthenticated_mutation_is_rejected() {
        let app = create_dev_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let msg = ClientMessage::CreateTask {
            draft: TaskDraft {
                name: "Run".to_string(),
                task_type: TaskType::Daily,
                point_value: 25,
            },
        };
        send(&mut ws, &msg).await;

        match recv_server_msg(&mut ws).await {
            ServerMessage::MutationFailed { code, .. } => {
                assert_eq!(code, SyncErrorCode::Unauthenticated);
            }
            other => panic!("Expected MutationFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_token_fails_authentication() {
        let app = create_dev_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let auth_msg = ClientMessage::Authenticate {
            token: "garbage".to_string(),
        };
        send(&mut ws, &auth_msg).await;

        match recv_server_msg(&mut ws).await {
            ServerMessage::AuthenticationFailed { reason } => {
                assert!(reason.contains("Invalid token"));
            }
            other => panic!("Expected AuthenticationFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authentication_starts_session_with_initial_state() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut ws, user_id, "alice@example.com", "Alice").await;

        // The score row is initialized for new users and its snapshot
        // arrives without any action on our part.
        let state = wait_for_state(&mut ws, |state| state.current_user.score.is_some()).await;
        assert_eq!(state.current_user_id, user_id);
        assert_eq!(state.current_user.score.as_ref().unwrap().current_score, 0);
        assert!(state.partner_user_id.is_none());
    }

    #[tokio::test]
    async fn test_create_and_complete_task_flow() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut ws, user_id, "alice@example.com", "Alice").await;

        send(
            &mut ws,
            &ClientMessage::CreateTask {
                draft: TaskDraft {
                    name: "Morning run".to_string(),
                    task_type: TaskType::Daily,
                    point_value: 25,
                },
            },
        )
        .await;

        let state = wait_for_state(&mut ws, |state| state.current_user.tasks.len() == 1).await;
        let task_id = state.current_user.tasks[0].id;

        send(&mut ws, &ClientMessage::CompleteTask { task_id }).await;

        let state = wait_for_state(&mut ws, |state| {
            state
                .current_user
                .score
                .as_ref()
                .is_some_and(|score| score.current_score == 25)
                && state.current_user.activities.len() == 1
        })
        .await;
        assert_eq!(state.current_user.activities[0].points_earned, 25);
        assert_eq!(
            state.current_user.score.as_ref().unwrap().tasks_completed,
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_task_draft_is_rejected() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut ws, user_id, "alice@example.com", "Alice").await;

        // Daily tasks must carry a positive point value.
        send(
            &mut ws,
            &ClientMessage::CreateTask {
                draft: TaskDraft {
                    name: "Backwards".to_string(),
                    task_type: TaskType::Daily,
                    point_value: -10,
                },
            },
        )
        .await;

        for _ in 0..20 {
            match recv_server_msg(&mut ws).await {
                ServerMessage::Error { message } => {
                    assert!(message.contains("positive"));
                    return;
                }
                ServerMessage::StateChanged { state } => {
                    assert!(state.current_user.tasks.is_empty());
                }
                _ => {}
            }
        }
        panic!("Expected an error for the invalid draft");
    }

    #[tokio::test]
    async fn test_insufficient_score_claim_is_rejected() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut ws, user_id, "alice@example.com", "Alice").await;

        send(
            &mut ws,
            &ClientMessage::CreateReward {
                draft: habit_types::RewardDraft {
                    name: "Weekend trip".to_string(),
                    description: String::new(),
                    point_cost: 90,
                },
            },
        )
        .await;
        let state = wait_for_state(&mut ws, |state| state.current_user.rewards.len() == 1).await;
        let reward_id = state.current_user.rewards[0].id;

        send(&mut ws, &ClientMessage::ClaimReward { reward_id }).await;

        for _ in 0..20 {
            match recv_server_msg(&mut ws).await {
                ServerMessage::MutationFailed { code, .. } => {
                    assert_eq!(code, SyncErrorCode::InsufficientScore);
                    return;
                }
                _ => {}
            }
        }
        panic!("Expected InsufficientScore rejection");
    }

    #[tokio::test]
    async fn test_pairing_and_partner_sync_flow() {
        let app = create_dev_test_app().await;
        let alice_id = Uuid::new_v4();
        let bob_id = Uuid::new_v4();

        let mut alice = warp::test::ws()
            .path("/ws")
            .handshake(app.clone())
            .await
            .expect("WebSocket handshake should succeed");
        let mut bob = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut alice, alice_id, "alice@example.com", "Alice").await;
        authenticate(&mut bob, bob_id, "bob@example.com", "Bob").await;

        send(
            &mut alice,
            &ClientMessage::SetupProfile {
                username: "alice".to_string(),
            },
        )
        .await;
        send(
            &mut bob,
            &ClientMessage::SetupProfile {
                username: "bob".to_string(),
            },
        )
        .await;
        wait_for_state(&mut alice, |state| state.current_profile.is_some()).await;
        wait_for_state(&mut bob, |state| state.current_profile.is_some()).await;

        // Alice invites Bob; the invitation shows up in Bob's state.
        send(
            &mut alice,
            &ClientMessage::SendInvitation {
                to_email: "bob@example.com".to_string(),
            },
        )
        .await;
        let bob_state =
            wait_for_state(&mut bob, |state| state.pending_invitations.len() == 1).await;
        let invitation_id = bob_state.pending_invitations[0].id;
        assert_eq!(bob_state.pending_invitations[0].from_user_id, alice_id);

        // Accepting pairs both sessions, in both directions.
        send(&mut bob, &ClientMessage::AcceptInvitation { invitation_id }).await;
        let bob_state =
            wait_for_state(&mut bob, |state| state.partner_user_id == Some(alice_id)).await;
        assert!(bob_state.pending_invitations.is_empty());
        wait_for_state(&mut alice, |state| state.partner_user_id == Some(bob_id)).await;

        // Alice's completed task reaches Bob's partner slice.
        send(
            &mut alice,
            &ClientMessage::CreateTask {
                draft: TaskDraft {
                    name: "Yoga".to_string(),
                    task_type: TaskType::Daily,
                    point_value: 30,
                },
            },
        )
        .await;
        let alice_state =
            wait_for_state(&mut alice, |state| state.current_user.tasks.len() == 1).await;
        let task_id = alice_state.current_user.tasks[0].id;

        send(&mut alice, &ClientMessage::CompleteTask { task_id }).await;
        wait_for_state(&mut bob, |state| {
            state
                .partner_user
                .score
                .as_ref()
                .is_some_and(|score| score.current_score == 30)
        })
        .await;

        // Bob can flip the viewed user to watch Alice's progress.
        send(
            &mut bob,
            &ClientMessage::SetViewingUser {
                view: ViewedUser::Partner,
            },
        )
        .await;
        let bob_state = wait_for_state(&mut bob, |state| {
            state.viewing_user == ViewedUser::Partner && state.partner_user.tasks.len() == 1
        })
        .await;
        assert_eq!(bob_state.viewed_data().tasks[0].name, "Yoga");

        // Unpairing clears the partner slice on both sides.
        send(&mut bob, &ClientMessage::Unpair).await;
        wait_for_state(&mut bob, |state| state.partner_user_id.is_none()).await;
        wait_for_state(&mut alice, |state| state.partner_user_id.is_none()).await;
    }

    #[tokio::test]
    async fn test_self_invitation_is_rejected() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        authenticate(&mut ws, user_id, "alice@example.com", "Alice").await;

        send(
            &mut ws,
            &ClientMessage::SendInvitation {
                to_email: "ALICE@example.com".to_string(),
            },
        )
        .await;

        for _ in 0..20 {
            match recv_server_msg(&mut ws).await {
                ServerMessage::Error { message } => {
                    assert!(message.contains("yourself"));
                    return;
                }
                _ => {}
            }
        }
        panic!("Expected a self-invitation error");
    }

    #[tokio::test]
    async fn test_score_endpoint_requires_auth() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/user/{}/score", user_id))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 401);

        let response = warp::test::request()
            .method("GET")
            .path("/user/not-a-uuid/score")
            .header("authorization", format!("{}:a@b.com:A", user_id))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_score_endpoint_forbids_strangers() {
        let app = create_dev_test_app().await;
        let user_id = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/user/{}/score", user_id))
            .header(
                "authorization",
                format!("Bearer {}:stranger@example.com:Stranger", stranger),
            )
            .reply(&app)
            .await;
        assert_eq!(response.status(), 403);
    }
}
