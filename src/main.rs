use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn, Level};

use outbreak_spike_analyzer::config::{AppConfig, LoadOptions, LogFormat};
use outbreak_spike_analyzer::models::{
    Campaign, ConfidenceScore, PeriodType, SalesRecord, SpikeAnalysis,
};
use outbreak_spike_analyzer::narrative::{self, OpenAiNarrator};
use outbreak_spike_analyzer::risk::{self, RiskStatus};
use outbreak_spike_analyzer::{data, db, report, spike};

#[derive(Parser)]
#[command(name = "outbreak-spike")]
#[command(about = "Medicine sales spike and outbreak confidence analysis", long_about = None)]
struct Cli {
    /// Config file (defaults to OUTBREAK_CONFIG or ./outbreak.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Sales CSV; when omitted, sales are read from Postgres
    #[arg(long)]
    sales: Option<PathBuf>,
    /// Campaigns CSV used together with --sales
    #[arg(long)]
    campaigns: Option<PathBuf>,
    /// Only read database sales on or after this date
    #[arg(long)]
    since: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import sales and campaigns from CSV files
    Import {
        #[arg(long)]
        sales: PathBuf,
        #[arg(long)]
        campaigns: Option<PathBuf>,
    },
    /// Analyze one medicine and score its outbreak confidence
    Analyze {
        #[arg(long)]
        medicine: String,
        #[arg(long, default_value = "weekly")]
        period: PeriodType,
        /// Print the analysis and score as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Weekly risk overview across monitored medicines
    Overview {
        /// Medicines to monitor; defaults to the first --limit medicines in the data
        #[arg(long)]
        medicine: Vec<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate a markdown report
    Report {
        /// Report on a single medicine instead of the network overview
        #[arg(long)]
        medicine: Option<String>,
        /// Period for the single-medicine report; the overview is always weekly
        #[arg(long, default_value = "weekly")]
        period: PeriodType,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Append an AI-generated narrative (requires OPENAI_API_KEY)
        #[arg(long)]
        narrative: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn init_logging(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_inputs(
    config: &AppConfig,
    source: &SourceArgs,
) -> anyhow::Result<(Vec<SalesRecord>, Vec<Campaign>)> {
    if let Some(sales_path) = &source.sales {
        let sales = data::load_sales(sales_path)?;
        let campaigns = match &source.campaigns {
            Some(path) => data::load_campaigns(path)?,
            None => {
                warn!("no campaign source given; continuing without campaigns");
                Vec::new()
            }
        };
        return Ok((sales, campaigns));
    }

    let pool = connect(config).await?;
    let sales = db::fetch_sales(&pool, source.since).await?;
    let campaigns = match db::fetch_campaigns(&pool).await {
        Ok(campaigns) => campaigns,
        Err(error) => {
            warn!(%error, "campaign data unavailable; continuing without campaigns");
            Vec::new()
        }
    };
    Ok((sales, campaigns))
}

async fn generate_narrative(
    config: &AppConfig,
    analysis: &SpikeAnalysis,
    score: &ConfidenceScore,
) -> Option<String> {
    match OpenAiNarrator::from_config(&config.narrative) {
        Ok(Some(narrator)) => Some(narrative::narrate_outbreak(&narrator, analysis, score).await),
        Ok(None) => {
            warn!("OPENAI_API_KEY not set; skipping narrative");
            None
        }
        Err(error) => {
            warn!(%error, "could not build narrative client");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
    })
    .context("failed to load configuration")?;
    init_logging(&config);
    let policy = &config.policy;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { sales, campaigns } => {
            let pool = connect(&config).await?;
            let inserted = db::import_sales_csv(&pool, &sales).await?;
            println!("Inserted {inserted} sales from {}.", sales.display());
            if let Some(path) = campaigns {
                let inserted = db::import_campaigns_csv(&pool, &path).await?;
                println!("Inserted {inserted} campaigns from {}.", path.display());
            }
        }
        Commands::Analyze {
            medicine,
            period,
            json,
            source,
        } => {
            let (sales, campaigns) = load_inputs(&config, &source).await?;
            let Some(analysis) = spike::analyze(&medicine, period, &sales, &campaigns, policy)
            else {
                println!(
                    "No sales data found for {medicine} on {}.",
                    period.as_str().to_lowercase()
                );
                return Ok(());
            };
            let scored = risk::score(&analysis, policy);
            info!(medicine = %medicine, confidence = scored.confidence, "analysis scored");

            if json {
                let payload = serde_json::json!({ "analysis": analysis, "score": scored });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let status = RiskStatus::from_confidence(scored.confidence, &policy.status);
                println!(
                    "{} ({}): {} units vs baseline {:.1} ({:+.1}%), confidence {}% [{}]",
                    analysis.medicine,
                    analysis.current_period,
                    analysis.current_sales,
                    analysis.baseline_avg,
                    analysis.spike_percentage,
                    scored.confidence,
                    status.label()
                );
                if analysis.insufficient_data() {
                    println!(
                        "Limited data: {} complete periods; baseline uses the overall daily average.",
                        analysis.period_count
                    );
                }
                for factor in &analysis.factors {
                    let marker = if factor.reduces_outbreak_probability() {
                        "-"
                    } else {
                        "+"
                    };
                    println!(
                        "  {marker} {} ({}): {}",
                        factor.kind.title(),
                        factor.impact.as_str(),
                        factor.details
                    );
                }
            }
        }
        Commands::Overview {
            medicine,
            limit,
            source,
        } => {
            let (sales, campaigns) = load_inputs(&config, &source).await?;
            let monitored = if medicine.is_empty() {
                risk::default_monitored(&sales, limit)
            } else {
                medicine
            };
            let overview = risk::network_overview(&monitored, &sales, &campaigns, policy);

            if overview.rows.is_empty() {
                println!("No medicine analysis data available.");
                return Ok(());
            }

            println!(
                "{} high risk of {} analyzed ({} monitored), average risk {:.0}%",
                overview.high_risk_count,
                overview.analyzed,
                overview.monitored,
                overview.avg_confidence
            );
            for row in &overview.rows {
                println!(
                    "- {} {} units, spike {:.1}%, risk {}% [{}] {}",
                    row.medicine,
                    row.current_sales,
                    row.spike_percentage,
                    row.confidence,
                    row.status.label(),
                    row.factors_summary
                );
            }
            if !overview.affected_branches.is_empty() {
                println!(
                    "Affected branches: {}",
                    overview.affected_branches.join(", ")
                );
            }
        }
        Commands::Report {
            medicine,
            period,
            limit,
            out,
            narrative,
            source,
        } => {
            let (sales, campaigns) = load_inputs(&config, &source).await?;

            let report = match medicine {
                Some(medicine) => {
                    let analysis = spike::analyze(&medicine, period, &sales, &campaigns, policy)
                        .with_context(|| format!("no sales data found for {medicine}"))?;
                    let scored = risk::score(&analysis, policy);
                    let text = if narrative {
                        generate_narrative(&config, &analysis, &scored).await
                    } else {
                        None
                    };
                    report::build_analysis_report(&analysis, &scored, policy, text.as_deref())
                }
                None => {
                    if period != PeriodType::Weekly {
                        warn!(
                            %period,
                            "overview reports are weekly; --period applies with --medicine"
                        );
                    }
                    let monitored = risk::default_monitored(&sales, limit);
                    let overview = risk::network_overview(&monitored, &sales, &campaigns, policy);
                    let details = risk::elevated_details(&overview, &sales, &campaigns, policy);

                    let text = match (narrative, details.first()) {
                        (true, Some((analysis, scored))) => {
                            generate_narrative(&config, analysis, scored).await
                        }
                        _ => None,
                    };
                    report::build_report(&overview, &details, text.as_deref())
                }
            };

            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
