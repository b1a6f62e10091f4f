use cpu_forecast::logging::init_logger;
use cpu_forecast::synthetic::{generate_telemetry, SyntheticConfig};
use cpu_forecast::utils::forecast_to_json;
use cpu_forecast::{FeaturePipeline, LinearPredictor, RolloutConfig, RolloutEngine};
use fleet_calendar::ServiceCategory;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    println!("CPU Forecast: Basic Rollout Example");
    println!("===================================\n");

    // One week of half-hourly telemetry for two servers
    println!("Generating telemetry...");
    let config = SyntheticConfig {
        server_ids: vec![638939, 640112],
        services: vec![ServiceCategory::CpuUsage, ServiceCategory::WindowsCpuUsage],
        shuffle: true,
        ..SyntheticConfig::default()
    };
    let data = generate_telemetry(&config, &mut StdRng::seed_from_u64(2024))?;
    println!("Telemetry generated: {} samples\n", data.len());

    // Derive lag, gap and season features
    let table = FeaturePipeline::new().transform(&data)?;
    println!(
        "Feature table: {} rows across {} targets\n",
        table.len(),
        table.targets().len()
    );

    // A linear model mostly driven by the latest lag, with a working-hours bump
    let model = LinearPredictor::from_json(
        r#"{
            "intercept": 1.5,
            "weights": [0.7, 0.15, 0.1, 0.0, 0.05, 0.0, -1.0, 4.0, 0.0, 0.5]
        }"#,
    )?;

    let engine = RolloutEngine::new(&model, RolloutConfig::default())?;
    let points = engine.forecast(&table, 638939, ServiceCategory::CpuUsage)?;

    println!("14-day forecast for server 638939 (every 8 hours):");
    for point in points.iter().step_by(16) {
        println!(
            "  {}: {:.2}%",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.predicted_cpu_percent
        );
    }

    println!("\nForecasting the whole fleet in parallel...");
    for (target, result) in table
        .targets()
        .iter()
        .zip(engine.forecast_many(&table, &table.targets()))
    {
        match result {
            Ok(points) => println!(
                "  server {} / {}: {} points, last {:.2}%",
                target.server_id,
                target.service,
                points.len(),
                points.last().map_or(f64::NAN, |p| p.predicted_cpu_percent)
            ),
            Err(e) => println!("  server {} / {}: {}", target.server_id, target.service, e),
        }
    }

    let json = forecast_to_json(&points[..2])?;
    println!("\nFirst two records as JSON:\n{}", json);

    Ok(())
}
