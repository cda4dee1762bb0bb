use clap::{Parser, Subcommand};
use colored::*;
use gacha_odds::config::ScenarioFile;
use gacha_odds::engine::{evaluate, Evaluation, EvaluationCache, Scenario};
use gacha_odds::feeling::FeelingTable;
use gacha_odds::report::{
    format_analytic, format_evaluation, format_feeling_line, format_planned_line,
    format_simulation_line,
};
use gacha_odds::rng::Rng;
use gacha_odds::sim::simulate_stats;
use gacha_odds::worker::SimulationPool;
use gacha_odds::{evaluate_analytic, AnalyticResult};
use log::{error, info, warn};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::time::Instant;

const MAX_SIMULATIONS: usize = 1_000_000;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario file
    #[arg(short, long, default_value = "data/config.json")]
    config: String,

    /// Override the feelings table path from the scenario file
    #[arg(short, long)]
    feelings: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Exact distribution report (default)
    Evaluate,
    /// Closed-form estimate for flat-rate banners
    Analytic,
    /// Monte Carlo cross-check against the exact engine
    Simulate {
        /// Number of simulated players
        #[arg(short = 'n', long, default_value_t = 10_000)]
        count: usize,
        /// Random seed (optional)
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Prompt for budgets and pity state, reusing cached distributions
    Interactive,
    /// Look up what a probability feels like
    Feel {
        /// Probability in percent
        percent: f64,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("[Output] Failed to serialize result: {}", e),
    }
}

fn evaluate_or_neutral(scenario: &Scenario) -> Evaluation {
    evaluate(scenario).unwrap_or_else(|e| {
        warn!("[Engine] {}", e);
        Evaluation::default()
    })
}

fn run_evaluate(file: &ScenarioFile, feelings: &FeelingTable, json: bool) {
    let eval = evaluate_or_neutral(&file.scenario());
    if json {
        print_json(&eval);
        return;
    }
    print!("{}", format_evaluation(&file.pool_name, file.planned_pulls, &eval));
    let matched = feelings.find_closest(eval.planned_success_rate);
    println!("{}", format_feeling_line(eval.planned_success_rate, matched.as_ref()));
}

fn run_analytic(file: &ScenarioFile, feelings: &FeelingTable, json: bool) {
    let result = evaluate_analytic(&file.analytic_input()).unwrap_or_else(|e| {
        warn!("[Analytic] {}", e);
        AnalyticResult::default()
    });
    if json {
        print_json(&result);
        return;
    }
    print!("{}", format_analytic(&result, file.planned_pulls));
    let matched = feelings.find_closest(result.planned_success_rate);
    println!("{}", format_feeling_line(result.planned_success_rate, matched.as_ref()));
}

fn run_simulate(file: &ScenarioFile, count: usize, seed: Option<u64>, json: bool) {
    let count = if count > MAX_SIMULATIONS {
        println!(
            "{}",
            format!("Simulation count capped at {}.", MAX_SIMULATIONS).red()
        );
        MAX_SIMULATIONS
    } else {
        count
    };
    let pool = match SimulationPool::new(&file.worker) {
        Ok(pool) => pool,
        Err(e) => {
            error!("[Worker] {}", e);
            std::process::exit(1);
        }
    };
    let seed = seed.unwrap_or_else(|| Rng::from_entropy().next_u64());
    info!("[Sim] Seed {}", seed);

    let scenario = file.scenario();
    let exact = evaluate_or_neutral(&scenario);
    let start = Instant::now();
    let summary = match simulate_stats(
        &scenario.config,
        &scenario.state,
        count,
        seed,
        scenario.planned_pulls,
        &pool,
    ) {
        Ok(summary) => summary,
        Err(e) => {
            error!("[Sim] Simulation failed: {}", e);
            return;
        }
    };
    let elapsed = start.elapsed();

    if json {
        print_json(&summary);
        return;
    }
    println!("{}", format_simulation_line(&summary, &exact));
    println!("Time taken: {:.2?}", elapsed);
    if elapsed.as_secs_f64() > 0.0 {
        println!("Throughput: {:.0} sims/sec", count as f64 / elapsed.as_secs_f64());
    }
}

fn run_feel(feelings: &FeelingTable, percent: f64, json: bool) {
    let matched = feelings.find_closest(percent);
    if json {
        print_json(&matched);
        return;
    }
    println!("{}", format_feeling_line(percent, matched.as_ref()));
}

/// `None` on EOF or a read error.
fn prompt(stdin: &mut impl BufRead, text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    let mut input = String::new();
    match stdin.read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input.trim().to_string()),
    }
}

fn run_interactive(file: &ScenarioFile, feelings: &FeelingTable) {
    let mut cache = EvaluationCache::new();
    let mut scenario = file.scenario();
    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    println!("{}", format!("=== {} ===", file.pool_name).bold());
    loop {
        let Some(input) = prompt(
            &mut stdin,
            &format!(
                "\nPlanned pulls (default {}, or 'q' to quit): ",
                scenario.planned_pulls
            ),
        ) else {
            break;
        };
        if input.eq_ignore_ascii_case("q") {
            println!("Exiting. Goodbye!");
            break;
        }
        if !input.is_empty() {
            match input.parse::<f64>() {
                Ok(val) if val > 0.0 => scenario.planned_pulls = val,
                _ => println!("{}", "Invalid input. Keeping the previous budget.".red()),
            }
        }

        let Some(input) = prompt(
            &mut stdin,
            &format!(
                "Pulls already made (default {}): ",
                scenario.state.current_pulls
            ),
        ) else {
            break;
        };
        if !input.is_empty() {
            match input.parse::<u32>() {
                Ok(val) => scenario.state.current_pulls = val,
                Err(_) => println!("{}", "Invalid input. Keeping the previous count.".red()),
            }
        }

        let eval = cache.evaluate(&scenario).unwrap_or_else(|e| {
            warn!("[Engine] {}", e);
            Evaluation::default()
        });
        let stats = eval.stats();
        println!(
            "Expected {:.2} pulls | median {} | p90 {}",
            stats.mean,
            stats.percentile(50),
            stats.percentile(90)
        );
        println!("{}", format_planned_line(scenario.planned_pulls, eval.planned_success_rate));
        let matched = feelings.find_closest(eval.planned_success_rate);
        println!("{}", format_feeling_line(eval.planned_success_rate, matched.as_ref()));
        info!(
            "[Cache] {} distributions cached, {} hits",
            cache.len(),
            cache.hits()
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let file = match ScenarioFile::load(&args.config) {
        Ok(file) => file,
        Err(e) => {
            error!("[Config] {}", e);
            std::process::exit(1);
        }
    };
    info!("[Config] Loaded pool {:?} from {}", file.pool_name, args.config);

    let feelings_path = args.feelings.clone().unwrap_or_else(|| file.feelings_path.clone());
    let feelings = FeelingTable::load(&feelings_path).unwrap_or_else(|e| {
        warn!("[Feeling] {}; analogies disabled", e);
        FeelingTable::default()
    });

    match args.command.unwrap_or(Commands::Evaluate) {
        Commands::Evaluate => run_evaluate(&file, &feelings, args.json),
        Commands::Analytic => run_analytic(&file, &feelings, args.json),
        Commands::Simulate { count, seed } => run_simulate(&file, count, seed, args.json),
        Commands::Interactive => run_interactive(&file, &feelings),
        Commands::Feel { percent } => run_feel(&feelings, percent, args.json),
    }
}
