//! News Signal Bot
//!
//! Reads crypto news, posts calibrated futures signals to Telegram and
//! checks them against the market a few hours later.

use clap::{Parser, Subcommand};
use news_signal_bot::{
    client::{BinanceFutures, LlmAnalyst},
    config::Config,
    feedback::OutcomeVerifier,
    ingester::{self, NewsProcessor, NewsSource, ProcessorSettings, RssSource},
    monitor::Monitor,
    notify::{Distributor, LogDistributor, TelegramNotifier},
    resolver::{InstrumentResolver, ResolverHandle},
    storage::{SqliteStore, WeightStore},
    strategy::{ContradictionDetector, WeightLearner, WeightsHandle},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "news-signal-bot")]
#[command(about = "Crypto news to calibrated futures signals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingestion, verification and learning on their schedules
    Run {
        /// Log signals instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one ingestion cycle
    Ingest {
        /// Log signals instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one verification pass
    Verify,
    /// Recompute penalty weights from resolved signals
    Learn,
    /// Print the accuracy report
    Report {
        /// Look-back window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
        /// Also send it to Telegram
        #[arg(long)]
        send: bool,
    },
    /// Test Telegram notification
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("news_signal_bot=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => run_bot(config, dry_run).await,
        Commands::Ingest { dry_run } => ingest_once(config, dry_run).await,
        Commands::Verify => verify_once(config).await,
        Commands::Learn => learn_once(config).await,
        Commands::Report { hours, send } => show_report(config, hours, send).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

/// Long-lived collaborators shared by every schedule
struct Services {
    config: Config,
    store: Arc<SqliteStore>,
    market: Arc<BinanceFutures>,
    weights: Arc<WeightsHandle>,
}

impl Services {
    async fn init(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config.database.path).await?);
        let market = Arc::new(BinanceFutures::new(&config.market)?);

        let weights = match store.load_weights().await? {
            Some(w) => {
                tracing::info!(
                    "Loaded learned weights: inferred {}, single source {}, no move {}",
                    w.inferred_instrument,
                    w.single_source,
                    w.no_move
                );
                w
            }
            None => config.calibration,
        };

        Ok(Self {
            config,
            store,
            market,
            weights: Arc::new(WeightsHandle::new(weights)),
        })
    }

    async fn resolver(&self) -> InstrumentResolver {
        let ambiguous = self.config.resolver.ambiguous_tokens.clone();
        if self.config.resolver.refresh_universe {
            InstrumentResolver::load(
                &*self.market,
                self.config.market.top_volume_count,
                ambiguous,
            )
            .await
        } else {
            InstrumentResolver::with_fallback(ambiguous)
        }
    }

    fn distributor(&self, dry_run: bool) -> anyhow::Result<Arc<dyn Distributor>> {
        if dry_run {
            tracing::warn!("DRY RUN: signals are logged, not sent");
            return Ok(Arc::new(LogDistributor));
        }
        match &self.config.telegram {
            Some(tg) if !tg.chat_ids.is_empty() => Ok(Arc::new(TelegramNotifier::new(tg)?)),
            _ => {
                tracing::warn!("Telegram not configured, signals will only be logged");
                Ok(Arc::new(LogDistributor))
            }
        }
    }

    fn sources(&self) -> anyhow::Result<Vec<Arc<dyn NewsSource>>> {
        let mut sources: Vec<Arc<dyn NewsSource>> = Vec::new();
        for url in &self.config.feeds.urls {
            sources.push(Arc::new(RssSource::new(url.clone(), self.config.feeds.timeout_secs)?));
        }
        Ok(sources)
    }

    fn processor(&self, resolver: Arc<ResolverHandle>, dry_run: bool) -> anyhow::Result<NewsProcessor> {
        let analyst = Arc::new(LlmAnalyst::new(self.config.llm.clone())?);
        Ok(NewsProcessor::new(
            self.store.clone(),
            analyst,
            self.market.clone(),
            self.distributor(dry_run)?,
            resolver,
            self.weights.clone(),
            ContradictionDetector::new(
                self.store.clone(),
                self.config.pipeline.contradiction_window_mins,
            ),
            ProcessorSettings::from_config(&self.config),
        ))
    }

    fn verifier(&self) -> OutcomeVerifier {
        OutcomeVerifier::new(self.store.clone(), self.market.clone(), self.weights.clone())
    }

    fn learner(&self) -> WeightLearner {
        WeightLearner::new(
            self.store.clone(),
            self.store.clone(),
            self.weights.clone(),
            self.config.calibration,
            self.config.pipeline.learn_window,
        )
    }
}

fn every(secs: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_bot(config: Config, dry_run: bool) -> anyhow::Result<()> {
    tracing::info!("Starting news signal bot");

    let services = Arc::new(Services::init(config).await?);
    let resolver = Arc::new(ResolverHandle::new(services.resolver().await));
    let processor = Arc::new(services.processor(resolver.clone(), dry_run)?);
    let sources = services.sources()?;
    let ingest_secs = services.config.pipeline.ingest_interval_secs;
    let verify_secs = services.config.pipeline.verify_interval_secs;
    let learn_secs = services.config.pipeline.learn_interval_secs;

    let ingest_task = {
        let processor = processor.clone();
        tokio::spawn(async move {
            let mut interval = every(ingest_secs);
            loop {
                interval.tick().await;
                let items = ingester::collect(&sources).await;
                processor.process_batch(items).await;
            }
        })
    };

    let verify_task = {
        let verifier = services.verifier();
        tokio::spawn(async move {
            let mut interval = every(verify_secs);
            loop {
                interval.tick().await;
                if let Err(e) = verifier.run_once(chrono::Utc::now()).await {
                    tracing::error!("Verification pass failed: {}", e);
                }
            }
        })
    };

    let learn_task = {
        let services = services.clone();
        let learner = services.learner();
        tokio::spawn(async move {
            let mut interval = every(learn_secs);
            // first tick fires immediately; weights were just loaded
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = learner.run_once().await {
                    tracing::error!("Weight learning failed: {}", e);
                }
                if services.config.resolver.refresh_universe {
                    resolver.replace(services.resolver().await);
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    ingest_task.abort();
    verify_task.abort();
    learn_task.abort();
    Ok(())
}

async fn ingest_once(config: Config, dry_run: bool) -> anyhow::Result<()> {
    let services = Services::init(config).await?;
    let resolver = Arc::new(ResolverHandle::new(services.resolver().await));
    let processor = services.processor(resolver, dry_run)?;

    let items = ingester::collect(&services.sources()?).await;
    let report = processor.process_batch(items).await;
    println!(
        "Fetched {}, emitted {}, rejected {}, dropped {}",
        report.fetched, report.emitted, report.rejected, report.dropped
    );
    Ok(())
}

async fn verify_once(config: Config) -> anyhow::Result<()> {
    let services = Services::init(config).await?;
    let report = services.verifier().run_once(chrono::Utc::now()).await?;
    println!(
        "Due {}, resolved {}, failed {}, discarded {}",
        report.due, report.resolved, report.failed, report.discarded
    );
    Ok(())
}

async fn learn_once(config: Config) -> anyhow::Result<()> {
    let services = Services::init(config).await?;
    let weights = services.learner().run_once().await?;
    println!(
        "Penalty weights: inferred {}, single source {}, no move {}",
        weights.inferred_instrument, weights.single_source, weights.no_move
    );
    Ok(())
}

async fn show_report(config: Config, hours: i64, send: bool) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::connect(&config.database.path).await?);
    let monitor = Monitor::new(store.clone(), store);
    let since = chrono::Utc::now() - chrono::Duration::hours(hours);
    let text = monitor.log_stats(since).await?.render();
    println!("{}", text);

    if send {
        let tg = config
            .telegram
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Telegram not configured in config.toml"))?;
        let failed = TelegramNotifier::new(tg)?
            .deliver(&text)
            .await
            .into_iter()
            .filter(|d| !d.is_ok())
            .count();
        if failed > 0 {
            anyhow::bail!("report not delivered to {} recipient(s)", failed);
        }
    }
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let tg = config
        .telegram
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Telegram not configured in config.toml"))?;

    let notifier = TelegramNotifier::new(tg)?;
    let deliveries = notifier
        .deliver("🧪 <b>Test Notification</b>\n\nIf you see this, Telegram integration is working!")
        .await;

    for d in &deliveries {
        match &d.error {
            None => println!("✅ {}", d.recipient),
            Some(e) => println!("❌ {}: {}", d.recipient, e),
        }
    }
    Ok(())
}
