//! arenagrid-api — REST API for ArenaGrid.
//!
//! Serves the client-facing session endpoint and, for standalone
//! deployments, admin endpoints that stand in for the fleet, cluster and
//! stack services.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET/POST | `/api/v1/sessions` | Request a game session |
//! | GET | `/api/v1/game-server-groups/{group}/servers` | List game servers |
//! | POST | `/api/v1/game-server-groups/{group}/servers` | Register a game server |
//! | PUT | `/api/v1/game-server-groups/{group}/servers/{id}` | Utilization/health heartbeat |
//! | DELETE | `/api/v1/game-server-groups/{group}/servers/{id}` | Deregister a game server |
//! | GET/POST | `/api/v1/clusters/{cluster}/nodes` | List / register worker nodes |
//! | GET | `/api/v1/clusters/{cluster}/tasks` | List running tasks |
//! | DELETE | `/api/v1/clusters/{cluster}/tasks/{id}` | Stop a task |
//! | POST | `/api/v1/task-definitions` | Register a task definition |
//! | PUT | `/api/v1/stacks/{stack}/outputs/{key}` | Set a stack output |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod sessions;

use axum::Router;
use axum::routing::{get, post, put};

use arenagrid_broker::SessionBroker;
use arenagrid_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub broker: SessionBroker,
}

/// Build the complete API router.
pub fn build_router(store: StateStore, broker: SessionBroker) -> Router {
    let state = ApiState { store, broker };

    let api_routes = Router::new()
        .route(
            "/sessions",
            get(sessions::request_session).post(sessions::request_session),
        )
        .route(
            "/game-server-groups/{group}/servers",
            get(handlers::list_game_servers).post(handlers::register_game_server),
        )
        .route(
            "/game-server-groups/{group}/servers/{id}",
            put(handlers::update_game_server).delete(handlers::deregister_game_server),
        )
        .route(
            "/clusters/{cluster}/nodes",
            get(handlers::list_nodes).post(handlers::register_node),
        )
        .route("/clusters/{cluster}/tasks", get(handlers::list_tasks))
        .route(
            "/clusters/{cluster}/tasks/{id}",
            axum::routing::delete(handlers::stop_task),
        )
        .route("/task-definitions", post(handlers::register_task_definition))
        .route("/stacks/{stack}/outputs/{key}", put(handlers::put_stack_output))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
