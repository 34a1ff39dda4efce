use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tile_packer::config::SolverConfig;
use tile_packer::deadline::Deadline;
use tile_packer::solver::{HybridSolver, PackingSolver};
use tile_packer::types::{Problem, Rect, Solution};
use tile_packer::validation::{self, Metrics};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct SolveRequest {
    container: Rect,
    tile: Rect,
    #[serde(default = "default_true")]
    allow_rotation: bool,
    #[serde(default = "default_true")]
    center: bool,
    #[serde(default)]
    max_tiles: Option<usize>,
    #[serde(default)]
    time_limit_secs: Option<f64>,
    #[serde(default)]
    max_solutions: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl SolveRequest {
    fn into_problem(self) -> Result<Problem, String> {
        if self.container.w == 0 || self.container.h == 0 {
            return Err("container dimensions must be non-zero".to_string());
        }
        if self.tile.w == 0 || self.tile.h == 0 {
            return Err("tile dimensions must be non-zero".to_string());
        }
        let time_limit = match self.time_limit_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(format!("time_limit_secs must be positive, got {secs}")),
            None => None,
        };
        Ok(Problem::new(self.container, self.tile)
            .with_rotation(self.allow_rotation)
            .with_centering(self.center)
            .with_max_tiles(self.max_tiles)
            .with_time_limit(time_limit)
            .with_max_solutions(self.max_solutions))
    }
}

#[derive(Serialize)]
struct SolutionResponse {
    #[serde(flatten)]
    solution: Solution,
    tile_count: usize,
    efficiency: f64,
    metrics: Metrics,
}

impl SolutionResponse {
    fn new(solution: Solution, problem: &Problem) -> Self {
        Self {
            tile_count: solution.tile_count(),
            efficiency: solution.efficiency(),
            metrics: validation::metrics(&solution, problem),
            solution,
        }
    }
}

#[derive(Serialize)]
struct SolveAllResponse {
    solutions: Vec<SolutionResponse>,
    count: usize,
}

fn parse(req: SolveRequest, route: &str) -> Result<Problem, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST {route}"
    );
    req.into_problem().map_err(|e| (StatusCode::BAD_REQUEST, e))
}

async fn solve(
    Json(req): Json<SolveRequest>,
) -> Result<Json<SolutionResponse>, (StatusCode, String)> {
    let problem = parse(req, "/solve")?;

    let response = tokio::task::spawn_blocking(move || {
        let config = SolverConfig::default();
        let deadline = Deadline::after(problem.time_limit().unwrap_or_else(|| config.time_limit()));
        HybridSolver::new(config)
            .solve(&problem, deadline)
            .map(|s| SolutionResponse::new(s, &problem))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(response))
}

async fn solve_all(
    Json(req): Json<SolveRequest>,
) -> Result<Json<SolveAllResponse>, (StatusCode, String)> {
    let problem = parse(req, "/solve-all")?;

    let solutions = tokio::task::spawn_blocking(move || {
        let config = SolverConfig::default();
        let deadline = Deadline::after(problem.time_limit().unwrap_or_else(|| config.time_limit()));
        let max = problem.max_solutions().unwrap_or(config.max_solutions);
        HybridSolver::new(config)
            .solve_all_optimal(&problem, max, deadline)
            .map(|all| {
                all.into_iter()
                    .map(|s| SolutionResponse::new(s, &problem))
                    .collect::<Vec<_>>()
            })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SolveAllResponse {
        count: solutions.len(),
        solutions,
    }))
}

fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(serve());
}

async fn serve() {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/solve", post(solve))
        .route("/solve-all", post(solve_all))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
