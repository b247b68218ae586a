//! CLI entry point for the transit companion.
//!
//! Each subcommand is one screen of the companion: the home weather summary,
//! nearby bus stops, a live arrival board, taxis around the user, and
//! transit directions.

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_companion::{
    board::{arrival_rows, format_distance, ranked_stops, stop_heading},
    config::Config,
    directions::{describe_route, plan, suggest},
    error::CompanionError,
    fetch::{BasicClient, check_connectivity},
    infra::{datagov::DataGovClient, datamall::DataMallClient, google::GoogleMapsClient},
    location::{FixedLocation, LocationProvider},
    proximity::{Entity, GeoPoint, within},
    refresher::{RefreshSession, Refresher, TransitArrivals},
    services::{directions_api::TravelMode, transit_api::TransitApi},
    weather::{ForecastState, format_date, summarize},
};

#[derive(Parser)]
#[command(name = "transit_companion")]
#[command(about = "Bus arrivals, taxis, weather and directions around you", long_about = None)]
struct Cli {
    /// JSON config file; environment variables override it
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Current latitude (overrides CURRENT_LAT)
    #[arg(long, global = true, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Current longitude (overrides CURRENT_LON)
    #[arg(long, global = true, allow_negative_numbers = true)]
    lon: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's date, average temperature and the nearest area's forecast
    Home,
    /// List the bus stops closest to you
    Stops {
        /// Number of stops to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Follow live arrivals for bus stops, refreshing periodically
    Watch {
        /// Bus stop codes to follow (defaults to the nearest stops)
        #[arg(value_name = "STOP_CODE")]
        stops: Vec<String>,

        /// How many of the nearest stops to follow when none are given
        #[arg(short = 'n', long, default_value_t = 3)]
        nearest: usize,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(long)]
        for_secs: Option<u64>,
    },
    /// Show available taxis near you
    Taxis {
        /// Search radius in metres
        #[arg(short, long, default_value_t = 1000.0)]
        radius: f64,

        /// Maximum number of taxis to list
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Suggest places matching partial input
    Autocomplete {
        #[arg(value_name = "TEXT")]
        input: String,
    },
    /// Plan a journey between two places
    Directions {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, value_enum, default_value_t = TravelMode::Transit)]
        mode: TravelMode,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transit_companion.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_companion.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("RUST_LOG")
                .from_env_lossy(),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .with_env_var("RUST_LOG_JSON")
                .from_env_lossy(),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env(cli.config.as_deref())?;

    let cli_point = match (cli.lat, cli.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        (None, None) => None,
        _ => {
            let err = CompanionError::Config("--lat and --lon must be given together".into());
            return Err(err.into());
        }
    };
    let location = FixedLocation::from_config(&config.location, cli_point);

    let http = BasicClient::new(config.http.timeout())?;
    if let Err(e) = check_connectivity(&http, &config.http.connectivity_probe_url).await {
        error!("Please connect to the internet to use the app.");
        return Err(e);
    }

    let result = match cli.command {
        Commands::Home => home(&config, http, &location).await,
        Commands::Stops { limit } => stops(&config, http, &location, limit).await,
        Commands::Watch {
            stops,
            nearest,
            for_secs,
        } => watch(&config, http, &location, stops, nearest, for_secs).await,
        Commands::Taxis { radius, limit } => taxis(&config, http, &location, radius, limit).await,
        Commands::Autocomplete { input } => autocomplete(&config, http, &input).await,
        Commands::Directions { from, to, mode } => {
            directions(&config, http, &from, &to, mode).await
        }
    };

    if let Err(e) = &result {
        match e.downcast_ref::<CompanionError>() {
            Some(err) if err.is_systemic() => error!(error = %err, "Cannot continue"),
            _ => error!(error = %e, "Command failed"),
        }
    }
    result
}

fn datamall(config: &Config, http: BasicClient) -> Result<DataMallClient<BasicClient>> {
    DataMallClient::new(http, &config.datamall, config.datamall_key()?)
}

fn google(config: &Config, http: BasicClient) -> Result<GoogleMapsClient<BasicClient>> {
    Ok(GoogleMapsClient::new(http, &config.google, config.google_key()?))
}

#[tracing::instrument(skip_all)]
async fn home(config: &Config, http: BasicClient, location: &impl LocationProvider) -> Result<()> {
    println!("{}", format_date(&Local::now()));

    let at = location.current_location().await?;
    let api = DataGovClient::new(http, &config.weather);
    let summary = summarize(&api, at).await;

    let temperature = summary
        .temperature_c
        .map(|t| format!("{t:.1}°C"))
        .unwrap_or_else(|| "--°C".to_string());
    println!("{temperature}  {}", summary.forecast.describe());

    if let ForecastState::Available(f) = &summary.forecast {
        info!(area = %f.area, icon = f.icon, distance_m = f.distance_m.round(), "Nearest forecast area");
        println!("{} ({})", f.area, f.icon);
    }
    Ok(())
}

#[tracing::instrument(skip(config, http, location))]
async fn stops(
    config: &Config,
    http: BasicClient,
    location: &impl LocationProvider,
    limit: usize,
) -> Result<()> {
    let at = location.current_location().await?;
    let api = datamall(config, http)?;
    let ranked = ranked_stops(&api, at).await?;

    for stop in ranked.iter().take(limit) {
        println!("{}  {}", stop_heading(stop), stop.entity.payload.road_name);
    }
    Ok(())
}

#[tracing::instrument(skip(config, http, location, stops))]
async fn watch(
    config: &Config,
    http: BasicClient,
    location: &impl LocationProvider,
    stops: Vec<String>,
    nearest: usize,
    for_secs: Option<u64>,
) -> Result<()> {
    let at = location.current_location().await?;
    let api = Arc::new(datamall(config, http)?);
    let ranked = ranked_stops(api.as_ref(), at).await?;

    let headings: HashMap<String, String> = ranked
        .iter()
        .map(|r| (r.entity.id.clone(), stop_heading(r)))
        .collect();

    let refresher = Refresher::new(TransitArrivals(api.clone()));
    refresher
        .replace_entities(ranked.iter().map(|r| r.entity.id.clone()))
        .await;

    let targets: Vec<String> = if stops.is_empty() {
        ranked.iter().take(nearest).map(|r| r.entity.id.clone()).collect()
    } else {
        stops
    };

    let mut updates = refresher.updates();
    for code in &targets {
        if let Err(e) = refresher.subscribe(code).await {
            warn!(error = %e, "Not following stop");
        }
    }

    let following = refresher.subscriptions().await;
    if following.is_empty() {
        return Err(CompanionError::NoCandidates.into());
    }
    for code in &following {
        print_stop(&refresher, &headings, code).await;
    }

    let session = RefreshSession::start(refresher.clone(), config.refresh.interval());
    let deadline = async {
        match for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => break,
            update = updates.recv() => match update {
                Ok(code) => print_stop(&refresher, &headings, &code).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Display fell behind, redrawing");
                    for code in refresher.subscriptions().await {
                        print_stop(&refresher, &headings, &code).await;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn print_stop<S>(
    refresher: &Refresher<S>,
    headings: &HashMap<String, String>,
    stop_code: &str,
) where
    S: transit_companion::refresher::ArrivalSource,
{
    let heading = headings
        .get(stop_code)
        .map(String::as_str)
        .unwrap_or(stop_code);
    println!("\n{heading}");

    match refresher.record(stop_code).await {
        Some(record) => {
            for row in arrival_rows(&record, &Utc::now()) {
                println!("  {row}");
            }
        }
        None => println!("  Arrivals unavailable"),
    }
}

#[tracing::instrument(skip(config, http, location))]
async fn taxis(
    config: &Config,
    http: BasicClient,
    location: &impl LocationProvider,
    radius: f64,
    limit: usize,
) -> Result<()> {
    let at = location.current_location().await?;
    let api = datamall(config, http)?;
    let positions = api.taxi_availability().await?;

    let entities = positions
        .into_iter()
        .enumerate()
        .map(|(i, p)| Entity::new(i.to_string(), p, ()))
        .collect();
    let nearby = within(at, entities, radius);

    println!(
        "{} available taxis within {}",
        nearby.len(),
        format_distance(radius)
    );
    for taxi in nearby.iter().take(limit) {
        println!(
            "  {}  {}",
            taxi.entity.location,
            format_distance(taxi.distance_m)
        );
    }
    Ok(())
}

#[tracing::instrument(skip(config, http))]
async fn autocomplete(config: &Config, http: BasicClient, input: &str) -> Result<()> {
    let api = google(config, http)?;
    let places = suggest(&api, input).await?;
    if places.is_empty() {
        println!("No suggestions");
    }
    for place in places {
        println!("{}", place.description);
    }
    Ok(())
}

#[tracing::instrument(skip(config, http))]
async fn directions(
    config: &Config,
    http: BasicClient,
    from: &str,
    to: &str,
    mode: TravelMode,
) -> Result<()> {
    let api = google(config, http)?;
    let route = plan(&api, from, to, mode).await?;

    if let Some(leg) = route.legs.first() {
        println!(
            "{} → {} ({}, {})",
            leg.start_address, leg.end_address, leg.distance_text, leg.duration_text
        );
    }
    for block in describe_route(&api, &route).await {
        println!();
        for line in block {
            println!("  {line}");
        }
    }
    Ok(())
}
