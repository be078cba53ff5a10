//! Gridworld planning command

use anyhow::Result;
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use tabula_env::gridworld::planning::{MdpSolver, PlanSummary, PolicyIteration, ValueIteration};
use tabula_env::GridWorld;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Policy iteration from the equiprobable random policy
    Policy,
    /// Value iteration with greedy extraction
    Value,
}

#[derive(Args)]
pub struct PlanArgs {
    #[arg(short, long, value_enum, default_value_t = Method::Policy)]
    pub method: Method,

    /// Convergence threshold on value changes
    #[arg(long, default_value_t = 1e-9)]
    pub theta: f64,

    /// Maximum improvement iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Cap the sweeps of each policy evaluation phase
    #[arg(long)]
    pub max_sweeps: Option<usize>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PlanArgs, config: &Config) -> Result<()> {
    let world = GridWorld::new(config.gridworld.clone())?;
    let summary = solve(&world, &args);

    if !summary.stable {
        warn!(
            iterations = summary.iterations,
            "Planner stopped before the policy was stable"
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Plan ({})", summary.solver);
    println!("==========================\n");
    println!("Stable:      {}", summary.stable);
    println!("Iterations:  {}\n", summary.iterations);
    println!("Values:");
    for row in &summary.values {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:>7.2}")).collect();
        println!("{}", cells.join(" "));
    }
    println!("\nPolicy:");
    println!("{}", summary.policy);

    Ok(())
}

fn solve(world: &GridWorld, args: &PlanArgs) -> PlanSummary {
    match args.method {
        Method::Policy => {
            let mut solver = PolicyIteration::new(world);
            if let Some(max_sweeps) = args.max_sweeps {
                solver = solver.with_max_sweeps(max_sweeps);
            }
            let (stable, iterations) = solver.exec(args.theta, args.max_iterations);
            info!(stable, iterations, "Policy iteration finished");
            PlanSummary::from_solver("policy_iteration", &solver, world, stable, iterations)
        }
        Method::Value => {
            let mut solver = ValueIteration::new(world);
            let (stable, iterations) = solver.exec(args.theta, args.max_iterations);
            info!(stable, iterations, "Value iteration finished");
            PlanSummary::from_solver("value_iteration", &solver, world, stable, iterations)
        }
    }
}
