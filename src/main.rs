use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use climate_risk::config::EngineConfig;
use climate_risk::demo;
use climate_risk::memory::InMemoryStore;
use climate_risk::monte_carlo::{MonteCarloConfig, MonteCarloResult};
use climate_risk::providers::RiskStore;
use climate_risk::scenario::{ScenarioForecast, apply_scenario, baseline_forecast};
use climate_risk::types::AssetId;
use climate_risk::{RiskCalculation, RiskEngine};

#[derive(Parser, Debug)]
#[command(name = "climate_risk", about = "Climate receivables risk scoring and cash-flow forecasting")]
struct Args {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// TOML file overriding the default engine configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monte Carlo NPV forecast over the demo portfolio.
    Forecast {
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,
        #[arg(long, default_value_t = 12)]
        months: u32,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0.95)]
        confidence: f64,
    },
    /// Score every due demo receivable.
    Assess,
    /// Deterministic baseline adjusted under a named scenario template.
    Scenario {
        #[arg(long, default_value = "base")]
        name: String,
        #[arg(long, default_value_t = 12)]
        months: u32,
    },
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::canonical(),
    };

    let now = Utc::now();
    let today = now.date_naive();
    let store = Arc::new(InMemoryStore::new(demo::portfolio(today)));
    let engine = RiskEngine::new(
        config,
        store.clone(),
        Arc::new(demo::weather(today)),
        Arc::new(demo::credit()),
        Arc::new(demo::news(now)),
    )?;
    let asset_ids: Vec<AssetId> = demo::assets().iter().map(|a| a.id).collect();

    match args.command {
        Command::Forecast { iterations, months, seed, confidence } => {
            let mc = MonteCarloConfig { iterations, confidence, horizon_months: months, seed, ..MonteCarloConfig::default() };
            let result = engine.run_monte_carlo_forecast_at(&asset_ids, mc, today).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_forecast(&result);
            }
        }
        Command::Assess => {
            let summary = engine.run_due_calculations_at(now).await?;
            let mut calculations = Vec::new();
            for r in demo::receivables(today) {
                if let Some(calc) = store.latest_calculation(r.id).await? {
                    calculations.push(calc);
                }
            }
            if args.json {
                let out = serde_json::json!({ "summary": summary, "calculations": calculations });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_assessments(&calculations);
                println!(
                    "\nProcessed {} | successful {} | failed {} | alerts {}",
                    summary.processed, summary.successful, summary.failed, summary.alerts_raised
                );
            }
        }
        Command::Scenario { name, months } => {
            let model = engine.cash_flow_model(&asset_ids, today, months).await?;
            let baseline = baseline_forecast(&model);
            let scenario = apply_scenario(&baseline, &name)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&scenario)?);
            } else {
                print_scenario(&scenario, baseline.total);
            }
        }
    }
    Ok(())
}

fn print_forecast(r: &MonteCarloResult) {
    const THOUSANDS: f64 = 1_000.0;
    println!(
        "=== Monte Carlo NPV forecast ({} iterations, {} months, seed {}) ===",
        r.simulations, r.horizon_months, r.seed
    );
    let s = &r.statistics;
    println!(
        "  mean {:>10.1}k | median {:>10.1}k | std {:>9.1}k | skew {:>6.3} | kurt {:>6.3}",
        s.mean / THOUSANDS,
        s.median / THOUSANDS,
        s.std_dev / THOUSANDS,
        s.skewness,
        s.kurtosis
    );

    println!("\n--- Percentiles (k) ---");
    println!("{:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9}", "p5", "p10", "p25", "p50", "p75", "p90", "p95");
    let p = &r.percentiles;
    println!(
        "{:>9.1} | {:>9.1} | {:>9.1} | {:>9.1} | {:>9.1} | {:>9.1} | {:>9.1}",
        p.p5 / THOUSANDS,
        p.p10 / THOUSANDS,
        p.p25 / THOUSANDS,
        p.p50 / THOUSANDS,
        p.p75 / THOUSANDS,
        p.p90 / THOUSANDS,
        p.p95 / THOUSANDS
    );

    let sc = &r.scenarios;
    println!("\n--- Scenarios (k) ---");
    println!(
        "  optimistic {:.1} | realistic {:.1} | pessimistic {:.1} | worst case {:.1}",
        sc.optimistic / THOUSANDS,
        sc.realistic / THOUSANDS,
        sc.pessimistic / THOUSANDS,
        sc.worst_case / THOUSANDS
    );

    let m = &r.risk_metrics;
    println!("\n--- Tail risk at {:.0}% ---", r.confidence * 100.0);
    println!(
        "  VaR {:.1}k | CVaR {:.1}k | P(loss) {:.2}%",
        m.var_95 / THOUSANDS,
        m.cvar / THOUSANDS,
        m.probability_of_loss * 100.0
    );
}

fn print_assessments(calculations: &[RiskCalculation]) {
    println!("=== Risk assessments ===");
    println!(
        "{:>14} | {:>8} | {:>5} | {:>5} | {:>6} | {:>5} | {:>5} | {:>5} | {:>6} | {:>8}",
        "Receivable", "Level", "Score", "Conf", "Rate%", "Prod", "Cred", "Pol", "Alerts", "Degraded"
    );
    println!("{}", "-".repeat(92));
    for c in calculations {
        println!(
            "{:>14} | {:>8} | {:>5.0} | {:>5.2} | {:>5.2}% | {:>5.0} | {:>5.0} | {:>5.0} | {:>6} | {:>8}",
            c.entity_id.to_string(),
            c.composite.level.as_str(),
            c.composite.score,
            c.composite.confidence,
            c.discount_rate.calculated * 100.0,
            c.production.value().score,
            c.credit.value().score,
            c.policy.value().score,
            c.alerts.len(),
            if c.is_degraded() { "yes" } else { "no" },
        );
    }
    for c in calculations.iter().filter(|c| !c.alerts.is_empty()) {
        println!("\n  {}:", c.entity_id);
        for a in &c.alerts {
            println!("    [{:?}] {} -> {}", a.level, a.message, a.action);
        }
    }
}

fn print_scenario(s: &ScenarioForecast, baseline_total: f64) {
    const THOUSANDS: f64 = 1_000.0;
    let f = &s.forecast;
    println!(
        "=== Scenario '{}' (total {:.1}k vs baseline {:.1}k) ===",
        s.name,
        f.total / THOUSANDS,
        baseline_total / THOUSANDS
    );
    println!(
        "{:>5} | {:>11} | {:>11} | {:>11} | {:>10} | {:>10} | {:>10}",
        "Month", "Prod(k)", "Recv(k)", "Incent(k)", "Total(k)", "Lower(k)", "Upper(k)"
    );
    for m in &f.months {
        println!(
            "{:>5} | {:>11.1} | {:>11.1} | {:>11.1} | {:>10.1} | {:>10.1} | {:>10.1}",
            m.month,
            m.production / THOUSANDS,
            m.receivables_risk_adjusted / THOUSANDS,
            m.incentives_risk_adjusted / THOUSANDS,
            m.total / THOUSANDS,
            m.lower / THOUSANDS,
            m.upper / THOUSANDS,
        );
    }
    println!(
        "\n  average {:.1}k | volatility {:.1}k",
        f.average / THOUSANDS,
        f.volatility / THOUSANDS
    );
}
