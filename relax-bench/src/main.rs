//! Benchmark driver: root-node propagation on random multi-knapsack models.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use lp_relax::{
    BoundsTrail, IntegerTrail, IntegerVariable, LinearConstraint, LinearProgrammingConstraint, LpSettings,
    SimplexBackend, TimeLimit,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use simplex_core::SimplexSettings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Root LP relaxation benchmarks on random multi-knapsack models")]
struct Cli {
    /// Number of binary items
    #[arg(long, default_value_t = 40)]
    items: usize,

    /// Number of knapsack rows
    #[arg(long, default_value_t = 5)]
    rows: usize,

    /// Number of models to generate
    #[arg(long, default_value_t = 5)]
    instances: usize,

    /// Seed of the first model
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Cut rounds at the root
    #[arg(long, default_value_t = 10)]
    cut_rounds: usize,

    /// Disable the built-in separators
    #[arg(long)]
    no_cuts: bool,

    /// Run the reduced-cost reasoning instead of the exact one
    #[arg(long)]
    inexact: bool,

    /// Wall-clock limit per model, in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Print the full statistics of each run
    #[arg(long)]
    verbose: bool,
}

/// A generated model: item weights per row, capacities and item values.
struct Instance {
    weights: Vec<Vec<i64>>,
    capacities: Vec<i64>,
    values: Vec<i64>,
}

fn generate_multi_knapsack(items: usize, rows: usize, seed: u64) -> Instance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let weights: Vec<Vec<i64>> = (0..rows)
        .map(|_| (0..items).map(|_| rng.gen_range(1..=50)).collect())
        .collect();
    let capacities = weights
        .iter()
        .map(|row| {
            let total: i64 = row.iter().sum();
            (total as f64 * rng.gen_range(0.25..0.6)) as i64
        })
        .collect();
    let values = (0..items).map(|_| rng.gen_range(1..=100)).collect();
    Instance {
        weights,
        capacities,
        values,
    }
}

/// Outcome of one root propagation.
struct RunSummary {
    feasible: bool,
    lp_objective: f64,
    objective_bound: i64,
    elapsed: Duration,
}

fn run_root(instance: &Instance, cli: &Cli) -> Result<(RunSummary, String)> {
    let mut trail = BoundsTrail::new();
    let items: Vec<IntegerVariable> = instance.values.iter().map(|_| trail.new_variable(0, 1)).collect();
    let max_value: i64 = instance.values.iter().sum();
    let objective = trail.new_variable(-max_value, 0);

    let mut settings = LpSettings::default()
        .with_exact_reason(!cli.inexact)
        .with_cut_rounds(cli.cut_rounds);
    if cli.no_cuts {
        settings = settings.without_cuts();
    }
    let time_limit = TimeLimit::new(cli.time_limit.map(Duration::from_secs_f64), None);
    let backend = SimplexBackend::new(SimplexSettings::default());

    let mut lp = LinearProgrammingConstraint::new(settings, items.clone(), Box::new(backend), time_limit)
        .context("creating the relaxation")?;
    for (row, &capacity) in instance.weights.iter().zip(&instance.capacities) {
        let terms: Vec<(IntegerVariable, i64)> = items.iter().copied().zip(row.iter().copied()).collect();
        lp.add_linear_constraint(LinearConstraint::less_or_equal(&terms, capacity))?;
    }
    for (&var, &value) in items.iter().zip(&instance.values) {
        lp.set_objective_coefficient(var, -value)?;
    }
    lp.set_main_objective_variable(objective);
    lp.register_with(&mut trail).context("registering the relaxation")?;

    let start = Instant::now();
    let feasible = lp.propagate(&mut trail);
    let elapsed = start.elapsed();

    let summary = RunSummary {
        feasible,
        lp_objective: lp.lp_objective(),
        objective_bound: trail.lower_bound(objective),
        elapsed,
    };
    Ok((summary, lp.statistics().to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.items == 0 || cli.rows == 0 {
        bail!("need at least one item and one row");
    }

    println!("LP relaxation root benchmarks");
    println!("{}", "=".repeat(72));
    println!(
        "{:>10} {:>10} {:>16} {:>12} {:>12}",
        "seed", "feasible", "LP objective", "bound", "time (ms)"
    );

    let mut total = Duration::ZERO;
    for k in 0..cli.instances {
        let seed = cli.seed.wrapping_add(k as u64);
        let instance = generate_multi_knapsack(cli.items, cli.rows, seed);
        let (summary, stats) = run_root(&instance, &cli).with_context(|| format!("model with seed {seed}"))?;
        total += summary.elapsed;
        println!(
            "{:>10} {:>10} {:>16.4} {:>12} {:>12.3}",
            seed,
            summary.feasible,
            summary.lp_objective,
            summary.objective_bound,
            summary.elapsed.as_secs_f64() * 1000.0
        );
        if cli.verbose {
            println!("{stats}");
        }
    }

    println!("{}", "=".repeat(72));
    println!(
        "{} models ({} items, {} rows), total {:.3} ms",
        cli.instances,
        cli.items,
        cli.rows,
        total.as_secs_f64() * 1000.0
    );
    Ok(())
}
