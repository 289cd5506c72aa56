use clap::Parser;
use std::fs::File;
use tms_bulk_import::domain::model::RunStatus;
use tms_bulk_import::utils::error::ImportError;
use tms_bulk_import::utils::{logger, validation::Validate};
use tms_bulk_import::{
    CliConfig, ImportEngine, ImportReport, LocalStorage, PhraseGateway, TracingProgress,
};

#[tokio::main]
async fn main() {
    // .env 不存在時忽略
    let _ = dotenvy::dotenv();
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting tms-bulk-import");

    match run(&cli).await {
        Ok((report, storage)) => {
            println!("{} {}", status_icon(report.run.status()), report.summary);
            match &report.files {
                Ok(files) => {
                    println!("📁 Outcomes: {}", storage.path_of(&files.outcomes));
                    println!("📁 Failures: {}", storage.path_of(&files.failures));
                    println!("📁 Summary: {}", storage.path_of(&files.summary));
                }
                Err(e) => {
                    eprintln!("⚠️ Report files were not written: {}", e.user_friendly_message());
                    eprintln!("💡 建議: {}", e.recovery_suggestion());
                }
            }
            if let Some(halt) = report.run.halted() {
                eprintln!("❌ Run stopped: {}", halt);
            }

            let exit_code = report.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn run(cli: &CliConfig) -> Result<(ImportReport, LocalStorage), ImportError> {
    let settings = cli.resolve_settings()?;
    settings.validate()?;
    if cli.verbose {
        tracing::debug!(
            "Settings: base_url={}, dry_run={}, delimiter={:?}, output_dir={}",
            settings.base_url,
            settings.dry_run,
            settings.delimiter,
            settings.output_dir
        );
    }

    let input = File::open(&cli.file)?;
    let gateway = PhraseGateway::new(
        &settings.base_url,
        settings.token_or_empty(),
        settings.timeout(),
    )?;
    let storage = LocalStorage::new(settings.output_dir.clone());
    let engine = ImportEngine::new(gateway, storage.clone(), settings.import_options());
    let mut progress = TracingProgress::new(settings.progress_every);

    let report = engine.run(input, &mut progress).await?;
    Ok((report, storage))
}

fn status_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "✅",
        RunStatus::PartialFailure => "⚠️",
        RunStatus::Fatal => "❌",
    }
}
