//! Quiz relay server
//!
//! Error frames carry `{code, message}` instead of a bare message string.

mod config;
mod engine;
mod error;
mod gateway;
mod handlers;
mod protocol;
mod quiz;
mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use error::RelayError;
use futures::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use quiz::QuizCatalog;
use state::AppState;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let catalog = match QuizCatalog::load(&config.quiz_catalog_path) {
        Ok(catalog) => {
            tracing::info!(path = %config.quiz_catalog_path, quizzes = catalog.len(), "Quiz catalog loaded");
            catalog
        }
        Err(e) => {
            tracing::error!(path = %config.quiz_catalog_path, error = %e, "Quiz catalog unavailable, only inline quizzes will work");
            QuizCatalog::default()
        }
    };

    let state = Arc::new(AppState::new(config.clone(), catalog));

    // Expired session sweeper
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_state.config.session.cleanup_interval());
        loop {
            interval.tick().await;
            handlers::cleanup_expired_sessions(&cleanup_state);
        }
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Quiz relay started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let origins = if state.config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            state
                .config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/sessions/:pin", get(session_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Quiz Relay</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "quiz-relay",
        "sessions": state.sessions.len(),
        "connections": state.connections.len(),
        "timestamp": unix_now(),
    }))
}

/// Public summary of one room; never includes answers
async fn session_handler(
    Path(pin): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = state.sessions.get(&pin).ok_or(StatusCode::NOT_FOUND)?;
    let total = session.quiz().questions.len();
    let body = serde_json::json!({
        "pin": session.pin(),
        "phase": session.phase().label(),
        "players": session.players().iter().map(|p| p.username.as_str()).collect::<Vec<_>>(),
        "questionNumber": (session.current_question_index() + 1).min(total),
        "totalQuestions": total,
        "answered": session.answer_count(),
        "secondsSinceLastAnswer": session.last_answer_at().map(|t| t.elapsed().as_secs()),
    });
    Ok(Json(body))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let peer_id = handlers::handle_connection(&state, tx.clone());

    // Outbound
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode message"),
            }
        }
    });

    // Inbound, one event at a time
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &peer_id, &tx, msg),
                Err(e) => {
                    tracing::debug!(peer_id = %peer_id, error = %e, "Unparsable message");
                    handlers::send_error(&state, &peer_id, &RelayError::BadRequest);
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    handlers::handle_disconnect(&state, &peer_id);
    send_task.abort();
}

fn handle_client_message(
    state: &AppState,
    peer_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => handlers::handle_heartbeat(sender),
        ClientMessage::CreateRoom(request) => handlers::handle_create_room(state, peer_id, request),
        ClientMessage::JoinRoom(request) => handlers::handle_join_room(state, peer_id, request),
        ClientMessage::StartGame(pin) => handlers::handle_start_game(state, peer_id, &pin),
        ClientMessage::SubmitAnswer(submission) => {
            handlers::handle_submit_answer(state, peer_id, submission)
        }
        ClientMessage::NextState(pin) => handlers::handle_next_state(state, peer_id, &pin),
        ClientMessage::ContinueGame(pin) => handlers::handle_continue_game(state, peer_id, &pin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Command;
    use crate::quiz::tests::two_question_quiz;
    use crate::quiz::{QuizId, QuizRequest};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    use tower::ServiceExt;

    type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Config::default(),
            QuizCatalog::new(vec![two_question_quiz()]),
        ))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Option<Value>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    async fn serve(state: Arc<AppState>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Ws {
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        assert!(matches!(recv(&mut ws).await, ServerMessage::Connected { .. }));
        ws
    }

    async fn send(ws: &mut Ws, event: Value) {
        ws.send(WsMessage::Text(event.to_string())).await.unwrap();
    }

    async fn recv_raw(ws: &mut Ws) -> String {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return text;
            }
        }
    }

    async fn recv(ws: &mut Ws) -> ServerMessage {
        serde_json::from_str(&recv_raw(ws).await).unwrap()
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let (status, body) = get_json(build_router(test_state()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn session_summary_hides_answers() {
        let state = test_state();
        let pin = state
            .sessions
            .create_session(
                &state.catalog,
                QuizRequest::Id(QuizId::Number(1)),
                "host",
                10,
            )
            .unwrap();

        let (status, body) = get_json(build_router(state.clone()), &format!("/sessions/{pin}")).await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["phase"], "lobby");
        assert_eq!(body["totalQuestions"], 2);
        assert!(!body.to_string().contains("correct"));
        assert!(body["secondsSinceLastAnswer"].is_null());

        state
            .sessions
            .with_session(&pin, |session| {
                session.handle("p1", Command::Join(crate::engine::tests::player("p1")))?;
                session.handle("host", Command::Start)?;
                session.handle("p1", Command::SubmitAnswer { answer_index: 0 })
            })
            .unwrap();
        let (_, body) = get_json(build_router(state.clone()), &format!("/sessions/{pin}")).await;
        let body = body.unwrap();
        assert_eq!(body["phase"], "question");
        assert_eq!(body["answered"], 1);
        assert_eq!(body["secondsSinceLastAnswer"], 0);

        let (status, _) = get_json(build_router(state), "/sessions/000000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn websocket_game_round_trip() {
        let addr = serve(test_state()).await;
        let mut host = connect(addr).await;
        let mut player = connect(addr).await;

        send(&mut player, json!({ "type": "no_such_event" })).await;
        assert!(matches!(
            recv(&mut player).await,
            ServerMessage::Error { code, .. } if code == "bad_request"
        ));

        send(
            &mut host,
            json!({
                "type": "create_room",
                "payload": {
                    "questions": [
                        { "text": "Largest planet?", "options": ["Mars", "Jupiter", "Venus"], "correctAnswer": 1 }
                    ]
                }
            }),
        )
        .await;
        let pin = match recv(&mut host).await {
            ServerMessage::RoomCreated { pin } => pin,
            other => panic!("unexpected {other:?}"),
        };

        send(
            &mut player,
            json!({ "type": "join_room", "payload": { "pin": pin, "username": "ana", "avatar": { "hairColor": "red" } } }),
        )
        .await;
        assert_eq!(
            recv(&mut player).await,
            ServerMessage::JoinedSuccess { pin: pin.clone() }
        );
        assert!(matches!(recv(&mut host).await, ServerMessage::PlayerJoined(p) if p.username == "ana"));

        send(&mut host, json!({ "type": "start_game", "payload": pin })).await;
        assert!(matches!(
            recv(&mut host).await,
            ServerMessage::NewQuestionHost(q) if q.correct_answer == 1 && q.options.len() == 3
        ));
        let raw = recv_raw(&mut player).await;
        assert!(!raw.contains("correctAnswer"));
        assert!(!raw.contains("Jupiter"));
        assert!(matches!(
            serde_json::from_str(&raw).unwrap(),
            ServerMessage::NewQuestionPlayer(q) if q.options_count == 3
        ));

        send(
            &mut player,
            json!({ "type": "submit_answer", "payload": { "pin": pin, "answerIndex": 1 } }),
        )
        .await;
        assert_eq!(
            recv(&mut host).await,
            ServerMessage::PlayerAnswered { count: 1 }
        );

        send(&mut host, json!({ "type": "next_state", "payload": pin })).await;
        for ws in [&mut host, &mut player] {
            match recv(ws).await {
                ServerMessage::ShowResults { leaderboard } => {
                    assert_eq!(leaderboard.len(), 1);
                    assert_eq!(leaderboard[0].score, 100);
                    assert_eq!(leaderboard[0].avatar, json!({ "hairColor": "red" }));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        send(&mut host, json!({ "type": "continue_game", "payload": pin })).await;
        for ws in [&mut host, &mut player] {
            assert!(matches!(recv(ws).await, ServerMessage::GameOver { leaderboard } if leaderboard[0].score == 100));
        }

        host.close(None).await.unwrap();
        match recv(&mut player).await {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, "host_disconnected");
                assert_eq!(message, "Host disconnected");
            }
            other => panic!("unexpected {other:?}"),
        }

        send(
            &mut player,
            json!({ "type": "submit_answer", "payload": { "pin": pin, "answerIndex": 0 } }),
        )
        .await;
        assert!(matches!(
            recv(&mut player).await,
            ServerMessage::Error { code, .. } if code == "session_not_found"
        ));
    }
}
