use cpu_forecast::{ErrorKind, ForecastError};
use fleet_calendar::{CalendarError, ServiceCategory};
use std::error::Error;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);
    assert!(matches!(forecast_error, ForecastError::IoError(_)));

    let calendar_error = CalendarError::UnknownLabel {
        kind: "service",
        label: "Disk_Usage".to_string(),
    };
    let forecast_error = ForecastError::from(calendar_error);
    assert!(matches!(forecast_error, ForecastError::SchemaError(_)));
    assert!(forecast_error.to_string().contains("Disk_Usage"));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::SerializationError(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidParameter("steps must be positive".to_string());
    assert!(error.to_string().contains("steps must be positive"));

    let error = ForecastError::InsufficientHistory {
        server_id: 638939,
        service: ServiceCategory::WindowsCpuUsage,
    };
    assert_eq!(
        error.to_string(),
        "No historical data for server 638939 with service Windows_CPU_Usage"
    );

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error_string = ForecastError::from(io_error).to_string();
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));
}

#[test]
fn test_prediction_error_keeps_source() {
    let error = ForecastError::Prediction {
        server_id: 7,
        service: ServiceCategory::CpuUsage,
        step: 12,
        source: Box::new(ForecastError::ModelError("NaN output".to_string())),
    };

    let message = error.to_string();
    assert!(message.contains("step 12"));
    assert!(message.contains("NaN output"));

    let source = error.source().expect("prediction error has a source");
    assert_eq!(source.to_string(), "Model error: NaN output");
}

#[test]
fn test_error_kinds() {
    let cases = vec![
        (ForecastError::SchemaError("missing column".to_string()), ErrorKind::Schema),
        (
            ForecastError::InsufficientHistory {
                server_id: 1,
                service: ServiceCategory::CpuUsageSql,
            },
            ErrorKind::InsufficientHistory,
        ),
        (ForecastError::ModelError("failed".to_string()), ErrorKind::Prediction),
        (ForecastError::ValidationError("length".to_string()), ErrorKind::Other),
        (ForecastError::PolarsError("frame".to_string()), ErrorKind::Other),
    ];

    for (error, kind) in cases {
        assert_eq!(error.kind(), kind, "{}", error);
        assert_eq!(
            error.is_insufficient_history(),
            kind == ErrorKind::InsufficientHistory
        );
    }
}
