use std::time::Duration;

use clap::Parser;
use tile_packer::config::{GreedyStrategy, SolverConfig};
use tile_packer::deadline::Deadline;
use tile_packer::solver::{self, PackingSolver};
use tile_packer::types::{Orientation, Problem, Rect, Solution, SolverKind};
use tile_packer::validation;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "tile_packer",
    about = "Pack identical rectangular tiles into a rectangular container"
)]
struct Cli {
    /// Container dimensions (WxH, e.g. 30x20)
    #[arg(long)]
    container: String,

    /// Tile dimensions (WxH, e.g. 6x8)
    #[arg(long)]
    tile: String,

    /// Disable 90° tile rotation
    #[arg(long)]
    no_rotate: bool,

    /// Leave the arrangement where the solver put it instead of centring it
    #[arg(long)]
    no_center: bool,

    /// Place at most this many tiles
    #[arg(long)]
    max_tiles: Option<usize>,

    /// Wall-clock budget in seconds (default: from config, 60)
    #[arg(long)]
    time_limit: Option<f64>,

    /// Solver: hybrid, mathematical, greedy, backtrack, or ilp
    #[arg(long, default_value = "hybrid", value_parser = parse_solver)]
    solver: SolverKind,

    /// Greedy placement order: bottom-left or center-out
    #[arg(long, value_parser = parse_greedy_strategy)]
    greedy_strategy: Option<GreedyStrategy>,

    /// Enumerate symmetry-distinct optimal arrangements
    #[arg(long)]
    all: bool,

    /// Upper limit on arrangements printed with --all
    #[arg(long)]
    max_solutions: Option<usize>,

    /// Solver configuration as a JSON file
    #[arg(long)]
    config: Option<String>,

    /// Print solutions as JSON
    #[arg(long)]
    json: bool,

    /// Log solver progress to stderr
    #[arg(long)]
    verbose: bool,
}

fn parse_solver(s: &str) -> Result<SolverKind, String> {
    match s {
        "hybrid" => Ok(SolverKind::Hybrid),
        "mathematical" => Ok(SolverKind::Mathematical),
        "greedy" => Ok(SolverKind::Greedy),
        "backtrack" => Ok(SolverKind::Backtrack),
        "ilp" => Ok(SolverKind::Ilp),
        _ => Err(format!(
            "invalid solver '{}', expected: hybrid, mathematical, greedy, backtrack, or ilp",
            s
        )),
    }
}

fn parse_greedy_strategy(s: &str) -> Result<GreedyStrategy, String> {
    match s {
        "bottom-left" => Ok(GreedyStrategy::BottomLeft),
        "center-out" => Ok(GreedyStrategy::CenterOut),
        _ => Err(format!(
            "invalid greedy strategy '{}', expected: bottom-left or center-out",
            s
        )),
    }
}

fn parse_dimensions(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let w = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let h = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok(Rect::new(w, h))
}

fn load_config(path: &str) -> Result<SolverConfig, String> {
    let text =
        std::fs::read_to_string(path).map_err(|e| format!("cannot read config '{}': {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config '{}': {}", path, e))
}

fn print_solution(index: Option<usize>, solution: &Solution, problem: &Problem) {
    match index {
        Some(i) => println!("Solution {}:", i + 1),
        None => println!("Solution:"),
    }
    for p in &solution.placements {
        let rot = if p.orientation == Orientation::Rotated {
            " [rotated]"
        } else {
            ""
        };
        println!("  {} @ ({}, {}){}", p.rect, p.x, p.y, rot);
    }
    if let Some(reason) = solution.metadata.get("reason") {
        println!("  no tiles: {}", reason);
    }
    let metrics = validation::metrics(solution, problem);
    let tier = solution
        .metadata
        .get("tier")
        .map(String::as_str)
        .unwrap_or(solution.solver.name());
    println!(
        "Summary: {} tile{}, {:.1}% efficiency, {:.0}% of bound, tier {}, {}{}",
        solution.tile_count(),
        if solution.tile_count() == 1 { "" } else { "s" },
        solution.efficiency(),
        metrics.optimality_ratio * 100.0,
        tier,
        solution.proof,
        if solution.time_limit_reached {
            " (time limit reached)"
        } else {
            ""
        },
    );
    println!();
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_max_level(Level::DEBUG)
            .init();
    }

    let container = parse_dimensions(&cli.container).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let tile = parse_dimensions(&cli.tile).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let mut config = match &cli.config {
        Some(path) => load_config(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => SolverConfig::default(),
    };
    if let Some(strategy) = cli.greedy_strategy {
        config = config.with_greedy_strategy(strategy);
    }
    if let Some(max) = cli.max_solutions {
        config = config.with_max_solutions(max);
    }

    let time_limit = match cli.time_limit {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => {
            eprintln!("Error: time limit must be positive, got {}", secs);
            std::process::exit(1);
        }
        None => None,
    };

    let problem = Problem::new(container, tile)
        .with_rotation(!cli.no_rotate)
        .with_centering(!cli.no_center)
        .with_max_tiles(cli.max_tiles)
        .with_time_limit(time_limit)
        .with_max_solutions(cli.max_solutions);

    let (_, warnings) = validation::feasible(&problem);
    for w in &warnings {
        eprintln!("Warning: {}", w);
    }

    let deadline = Deadline::after(time_limit.unwrap_or_else(|| config.time_limit()));
    let solver: Box<dyn PackingSolver> = solver::for_kind(cli.solver, &config);

    let solutions = if cli.all {
        solver.solve_all_optimal(&problem, config.max_solutions, deadline)
    } else {
        solver.solve(&problem, deadline).map(|s| vec![s])
    }
    .unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if cli.json {
        let out = if cli.all {
            serde_json::to_string_pretty(&solutions)
        } else {
            serde_json::to_string_pretty(&solutions[0])
        };
        match out {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    for (i, solution) in solutions.iter().enumerate() {
        print_solution(cli.all.then_some(i), solution, &problem);
    }
    if cli.all {
        println!(
            "Found {} distinct arrangement{}",
            solutions.len(),
            if solutions.len() == 1 { "" } else { "s" }
        );
    }
}
