use clap::Parser;
use es_lifecycle::config::cli::{ReindexCli, ReindexCommand};
use es_lifecycle::utils::logger;
use es_lifecycle::{EsClient, LifecycleError, Poller, ReindexJob, ShrinkJob};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ReindexCli::parse();

    // 初始化日誌
    logger::init(cli.log.verbose, cli.log.log_json);
    tracing::debug!("CLI config: {:?}", cli.command);

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            command_name(&cli.command),
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn command_name(command: &ReindexCommand) -> &'static str {
    match command {
        ReindexCommand::Reindex(_) => "Reindex",
        ReindexCommand::Shrink(_) => "Shrink",
    }
}

async fn run(cli: &ReindexCli) -> Result<(), LifecycleError> {
    // 驗證配置
    let connection = cli.connection.to_settings()?;
    let poller = Poller::new(cli.poll.to_settings()?);
    let client = EsClient::new(&connection)?;
    tracing::info!("🔗 Cluster: {}", client.base_url());

    match &cli.command {
        ReindexCommand::Reindex(args) => {
            let request = args.to_request()?;
            let outcome = ReindexJob::new(client, poller).run(&request).await?;
            println!(
                "✅ Reindexed {} -> {}: {} documents in {:?} (task {})",
                request.source,
                request.dest,
                outcome.progress.processed(),
                outcome.elapsed,
                outcome.task_id
            );
        }
        ReindexCommand::Shrink(args) => {
            let request = args.to_request()?;
            let outcome = ShrinkJob::new(client, poller).run(&request).await?;
            println!(
                "✅ Shrunk {} ({} shards) -> {} ({} shards) on {} in {:?}",
                outcome.source,
                outcome.source_shards,
                outcome.target,
                outcome.target_shards,
                outcome.node,
                outcome.elapsed
            );
            if outcome.source_deleted {
                println!("🗑️ Source index {} deleted", outcome.source);
            }
        }
    }

    Ok(())
}
