use chrono::Duration;
use cpu_forecast::logging::init_logger;
use cpu_forecast::metrics::evaluate_rollout;
use cpu_forecast::models::{FeatureVector, NaivePredictor, Predictor};
use cpu_forecast::synthetic::{expected_load, generate_telemetry, SyntheticConfig};
use cpu_forecast::{FeaturePipeline, ForecastPoint, LinearPredictor, RolloutConfig, RolloutEngine};
use fleet_calendar::ServiceCategory;
use rand::rngs::StdRng;
use rand::SeedableRng;

const SERVER: i64 = 638939;
const SERVICE: ServiceCategory = ServiceCategory::CpuUsageSql;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    println!("CPU Forecast: Rollout Backtest");
    println!("==============================\n");

    let config = SyntheticConfig {
        server_ids: vec![SERVER],
        services: vec![SERVICE],
        samples_per_series: 14 * 48,
        ..SyntheticConfig::default()
    };
    let data = generate_telemetry(&config, &mut StdRng::seed_from_u64(7))?;
    let table = FeaturePipeline::new().transform(&data)?;

    // Start forecasting right where the history ends and compare against
    // the noise-free signal for the following three days
    let anchor = config.start + Duration::minutes(config.cadence_minutes * 14 * 48);
    let rollout = RolloutConfig::new(3 * 48, config.cadence_minutes)?;

    let linear = LinearPredictor::new(
        2.0,
        [0.8, 0.1, 0.05, 0.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0],
    )?;
    let seasonal = |features: &FeatureVector| -> cpu_forecast::Result<f64> {
        let hour = features.hour as f64;
        let daily = -(2.0 * std::f64::consts::PI * hour / 24.0).cos();
        Ok(0.5 * features.cpu_lag_1 + 0.5 * (config.base_level + config.daily_amplitude * daily))
    };

    report("Naive", &NaivePredictor, &table, &rollout, anchor, &config)?;
    report("Linear", &linear, &table, &rollout, anchor, &config)?;
    report("Seasonal blend", &seasonal, &table, &rollout, anchor, &config)?;

    println!("\nSummary:");
    println!("1. Every lag after the third step is a model output");
    println!("2. Error growth per 12-hour window shows how fast each model drifts");

    Ok(())
}

fn report<P: Predictor + ?Sized>(
    label: &str,
    predictor: &P,
    table: &cpu_forecast::FeatureTable,
    rollout: &RolloutConfig,
    anchor: chrono::NaiveDateTime,
    config: &SyntheticConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = RolloutEngine::new(predictor, rollout.clone())?;
    let points: Vec<ForecastPoint> = engine.forecast_at(table, SERVER, SERVICE, anchor)?;
    let actual: Vec<f64> = points
        .iter()
        .map(|p| expected_load(config, SERVER, SERVICE, p.timestamp))
        .collect();

    let evaluation = evaluate_rollout(&points, &actual, 24)?;
    println!("\n{} ({} steps)", label, points.len());
    print!("{}", evaluation);
    match evaluation.drift_ratio() {
        Some(ratio) => println!("  Drift ratio: {:.2}", ratio),
        None => println!("  Drift ratio: n/a"),
    }
    Ok(())
}
