//! Polymarket Monitoring and Scoring
//!
//! Watches prediction markets and scores them for momentum, structural
//! risk, and wash trading.

use clap::{Parser, Subcommand};
use polymarket_monitor::{
    client::VenueClient,
    config::Config,
    engine::{
        prediction::Direction, MarketRiskScorer, PredictionEngine, RiskInput, WashTradeDetector,
        WashTradeInput,
    },
    storage::{Database, MarketHistoryStore},
};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "polymarket-monitor")]
#[command(about = "Market monitoring and signal scoring for Polymarket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (falls back to default locations)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show trending markets
    Markets {
        /// Number of markets to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
    /// Poll markets into the store and stream live trades
    Monitor {
        /// Only monitor markets matching this search term
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Generate a prediction for a market
    Predict {
        /// Market ID or slug
        market_id: String,
    },
    /// Grade a market's structural risk
    Risk {
        /// Market ID or slug
        market_id: String,
    },
    /// Score a market for wash trading
    Wash {
        /// Market ID or slug
        market_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Markets { limit } => show_markets(config, limit).await,
        Commands::Monitor { query } => run_monitor(config, query).await,
        Commands::Predict { market_id } => predict_market(config, &market_id).await,
        Commands::Risk { market_id } => grade_market(config, &market_id).await,
        Commands::Wash { market_id } => score_wash_trading(config, &market_id).await,
    }
}

async fn show_markets(config: Config, limit: u32) -> anyhow::Result<()> {
    let client = VenueClient::new(&config.api)?;
    let markets = client.gamma.get_trending_markets(limit).await?;

    println!("\nTop {} markets by 24h volume:\n", limit);
    println!("{:<50} {:>7} {:>12} {:>12}", "Question", "Yes", "24h Vol", "Liquidity");
    println!("{}", "-".repeat(85));

    for market in markets {
        let question = if market.question.len() > 47 {
            format!("{}...", &market.question[..47])
        } else {
            market.question.clone()
        };

        println!(
            "{:<50} {:>6.0}% ${:>11.0} ${:>11.0}",
            question,
            market.probability() * 100.0,
            market.volume_24h.to_f64().unwrap_or(0.0),
            market.liquidity.to_f64().unwrap_or(0.0),
        );
    }

    Ok(())
}

async fn run_monitor(config: Config, query: Option<String>) -> anyhow::Result<()> {
    tracing::info!("Starting market monitor");

    let client = VenueClient::new(&config.api)?;
    let db = Arc::new(Database::connect(config.database_path()).await?);
    let engine = PredictionEngine::new(
        Arc::clone(&db) as Arc<dyn MarketHistoryStore>,
        config.engine.to_prediction_config(),
    );
    let scorer = MarketRiskScorer::new();

    let (shutdown_tx, _) = broadcast::channel(1);

    // Live trades stream into the store while the poller takes snapshots
    let feed = Arc::new(client.trade_feed());
    {
        let db = Arc::clone(&db);
        feed.subscribe_all(Arc::new(move |trade| {
            let db = Arc::clone(&db);
            Box::pin(async move {
                if let Err(e) = db.save_trade(&trade).await {
                    tracing::warn!("Failed to store trade: {}", e);
                }
            })
        }));
    }
    let feed_task = tokio::spawn({
        let feed = Arc::clone(&feed);
        let shutdown = shutdown_tx.subscribe();
        async move { feed.run(shutdown).await }
    });

    tracing::info!("Monitor initialized. Starting polling loop...");

    loop {
        let markets = match client.gamma.get_trending_markets(config.monitor.markets_per_poll).await
        {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Failed to fetch markets: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(config.monitor.poll_interval_secs)) => continue,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        };

        let markets = match &query {
            Some(q) => {
                let needle = q.to_lowercase();
                markets
                    .into_iter()
                    .filter(|m| m.question.to_lowercase().contains(&needle))
                    .collect()
            }
            None => markets,
        };

        let markets = polymarket_monitor::client::gamma::filter_fresh_markets(
            markets,
            24,
            config.monitor.min_volume,
        );
        tracing::info!("Scanning {} markets", markets.len());

        let now = chrono::Utc::now();
        for market in &markets {
            if let Err(e) = db.save_snapshot(&market.to_snapshot(now)).await {
                tracing::error!("Failed to store snapshot for {}: {}", market.id, e);
                continue;
            }

            match engine.score_with(&market.id, Some(market), None).await {
                Ok(Some(prediction)) if prediction.direction != Direction::Neutral => {
                    tracing::info!(
                        "{} | {:?} {:+.1}pp over {}h (confidence {:.0}%)",
                        market.question,
                        prediction.direction,
                        prediction.probability_change,
                        prediction.horizon_hours,
                        prediction.confidence * 100.0
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Scoring failed for {}: {}", market.id, e),
            }

            let assessment = scorer.score_market(&RiskInput::from_market(market));
            for warning in &assessment.warnings {
                tracing::debug!("{} [{}]: {}", market.id, assessment.overall_grade, warning);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.monitor.poll_interval_secs)) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(());
    match feed_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Trade feed exited with error: {}", e),
        Err(e) => tracing::warn!("Trade feed task panicked: {}", e),
    }

    Ok(())
}

async fn predict_market(config: Config, market_id: &str) -> anyhow::Result<()> {
    let client = VenueClient::new(&config.api)?;
    let db = Arc::new(Database::connect(config.database_path()).await?);
    let engine = PredictionEngine::new(
        Arc::clone(&db) as Arc<dyn MarketHistoryStore>,
        config.engine.to_prediction_config(),
    );

    let market = client.gamma.get_market(market_id).await?;
    let book = match market.outcomes.first() {
        Some(outcome) if !outcome.token_id.is_empty() => {
            client.clob.get_order_book(&outcome.token_id, 20).await.ok()
        }
        _ => None,
    };

    println!("\nPrediction: {}\n", market.question);

    match engine.score_with(&market.id, Some(&market), book.as_ref()).await? {
        Some(prediction) => {
            println!(
                "Direction: {:?} ({:+.1}pp over {}h)",
                prediction.direction, prediction.probability_change, prediction.horizon_hours
            );
            println!("Confidence: {:.0}%\n", prediction.confidence * 100.0);
            println!("Signals:");
            for signal in &prediction.signals {
                println!(
                    "  {:?} [{:?}, strength {:.2}]: {}",
                    signal.signal_type, signal.direction, signal.strength, signal.description
                );
            }
        }
        None => println!("Not enough data to score this market yet."),
    }

    Ok(())
}

async fn grade_market(config: Config, market_id: &str) -> anyhow::Result<()> {
    let client = VenueClient::new(&config.api)?;
    let scorer = MarketRiskScorer::new();

    let market = client.gamma.get_market(market_id).await?;
    let assessment = scorer.score_market(&RiskInput::from_market(&market));

    println!("\nRisk assessment: {}\n", assessment.market_title);
    println!(
        "Grade: {} ({:.0}/100) - {}",
        assessment.overall_grade,
        assessment.overall_score,
        scorer.get_grade_description(&assessment.overall_grade)
    );

    println!("\nFactors:");
    let mut factors: Vec<_> = assessment.factors.iter().collect();
    factors.sort_by(|a, b| a.0.cmp(b.0));
    for (name, factor) in factors {
        println!("  {:<20} {:>5.0}  {}", name, factor.score, factor.detail);
    }

    if !assessment.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &assessment.warnings {
            println!("  - {}", warning);
        }
    }

    println!("\nRecommendations:");
    for recommendation in &assessment.recommendations {
        println!("  - {}", recommendation);
    }

    Ok(())
}

async fn score_wash_trading(config: Config, market_id: &str) -> anyhow::Result<()> {
    let client = VenueClient::new(&config.api)?;
    let db = Database::connect(config.database_path()).await?;
    let detector = WashTradeDetector::new();

    let market = client.gamma.get_market(market_id).await?;
    let trades = db.get_market_trades(&market.id, 24, 1000).await?;

    let input = WashTradeInput::from_trades(
        &market.id,
        &market.question,
        market.volume_24h.to_f64(),
        market.liquidity.to_f64(),
        &trades,
    );
    let analysis = detector.analyze_market(&input);

    println!("\nWash trading analysis: {}\n", analysis.market_title);
    println!(
        "Score: {:.0}/100 ({:?}) - {}",
        analysis.overall_score,
        analysis.risk_level,
        detector.get_risk_description(analysis.risk_level)
    );

    if analysis.indicators.is_empty() {
        println!("\nNo indicator data available; score reflects uncertainty.");
    } else {
        println!("\nIndicators:");
        for indicator in &analysis.indicators {
            println!(
                "  {:<22} {:>5.0}  {}",
                indicator.indicator_type, indicator.score, indicator.description
            );
        }
    }

    Ok(())
}
