use anyhow::Context;
use churn_etl::domain::ports::TableSink;
use churn_etl::utils::error::{EtlError, ErrorSeverity};
use churn_etl::utils::{logger, validation::Validate};
use churn_etl::{
    BigQuerySink, ChurnConfig, ChurnPipeline, CliArgs, CsvFileSink, EtlEngine, InputSource,
    LocalStorage, RunReport, SinkKind, VertexInferenceClient,
};
use clap::Parser;

const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match ChurnConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML or JSON");
            std::process::exit(1);
        }
    };

    // 命令列覆蓋設定
    if let Some(sink) = &args.sink {
        config.sink.kind = sink.parse::<SinkKind>()?;
        tracing::info!("🔧 Sink overridden to: {:?}", config.sink.kind);
    }

    if config.access_token().is_none() {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            tracing::debug!("Using access token from {}", TOKEN_ENV);
            config.inference.access_token = Some(token);
        }
    }

    if let Err(e) = config.validate() {
        exit_with(&e, 1);
    }

    if !args.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character, got '{}'", args.delimiter);
    }
    let input = InputSource {
        path: args.input.clone(),
        delimiter: args.delimiter as u8,
    };

    let predictor = VertexInferenceClient::new(&config).context("creating inference client")?;
    let sink: Box<dyn TableSink> = match config.sink.kind {
        SinkKind::Bigquery => {
            Box::new(BigQuerySink::new(&config).context("creating BigQuery sink")?)
        }
        SinkKind::Csv => Box::new(CsvFileSink::new(
            LocalStorage::new(config.sink.output_path.clone()),
            &config,
        )),
    };

    let pipeline = ChurnPipeline::new(LocalStorage::new("."), input, &config, predictor, sink);

    tracing::info!(
        "✅ {} | endpoint {} -> {}",
        config.display.title,
        pipeline.endpoint_name(),
        pipeline.sink_destination()
    );

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no remote calls will be made");
        match pipeline.validate_only().await {
            Ok(validated) => {
                println!("✅ Input is valid: {} rows", validated.len());
                return Ok(());
            }
            Err(e) => exit_with(&e, 1),
        }
    }

    let engine = EtlEngine::new(pipeline);
    match engine.run().await {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::error!(
                "❌ Run failed at {} stage: {} (Category: {:?}, Severity: {:?})",
                e.stage(),
                e,
                e.category(),
                e.severity()
            );
            let code = match e.severity() {
                ErrorSeverity::Medium => 2, // 遠端服務錯誤，可重新上傳
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            exit_with(&e, code);
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("✅ Scored {} rows ({} unknown)", report.rows, report.unknown);
    println!("\nPrediction summary");
    println!("{:<12} {:>8} {:>11}", "Category", "Rows", "Percentage");
    for share in &report.summary.entries {
        println!(
            "{:<12} {:>8} {:>10.2}%",
            share.label.as_str(),
            share.count,
            share.percentage
        );
    }
    println!(
        "\n📁 Stored {} rows in {}{}",
        report.receipt.rows_written,
        report.receipt.destination,
        report
            .receipt
            .job_id
            .as_ref()
            .map(|id| format!(" (job {})", id))
            .unwrap_or_default()
    );
}

fn exit_with(e: &EtlError, code: i32) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(code);
}
