use clap::Parser;
use es_lifecycle::config::cli::CuratorCli;
use es_lifecycle::utils::{logger, validation::Validate};
use es_lifecycle::{Curator, EsClient, LifecycleError, Policy, Poller, RunSummary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CuratorCli::parse();

    // 初始化日誌
    logger::init(cli.log.verbose, cli.log.log_json);

    tracing::info!("🚀 Starting es-curator");
    tracing::info!("📁 Loading policy from: {}", cli.policy.display());

    // 即使部分動作失敗，也先印出摘要
    let result = run(&cli).await.and_then(|summary| {
        print_summary(&summary);
        summary.into_result()
    });

    if let Err(e) = result {
        tracing::error!(
            "❌ Curator run failed: {} (Category: {:?}, Severity: {:?})",
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

async fn run(cli: &CuratorCli) -> Result<RunSummary, LifecycleError> {
    let policy = Policy::from_file(&cli.policy)?;
    policy.validate()?;
    tracing::info!("✅ Policy loaded: {} rule(s)", policy.rules.len());

    let connection = cli.connection.to_settings()?;
    let poller = Poller::new(cli.poll.to_settings()?);
    let client = EsClient::new(&connection)?;
    tracing::info!("🔗 Cluster: {}", client.base_url());

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no index will be changed");
    }

    let curator = Curator::new(client, &policy, poller, cli.options())?;
    curator.run_report(cli.evaluation_date()).await
}

fn print_summary(summary: &RunSummary) {
    println!("📋 Curator Summary:");
    println!("  Indices evaluated: {}", summary.evaluated);
    println!("  Indices skipped: {}", summary.skipped);
    println!("  Actions planned: {}", summary.planned);
    if summary.dry_run {
        println!("  🔍 DRY RUN - nothing was executed");
    } else {
        println!("  Actions executed: {}", summary.executed);
        if !summary.failed.is_empty() {
            println!("  ❌ Actions failed: {}", summary.failed.len());
            for failed in &summary.failed {
                println!("    - {} {}: {}", failed.action, failed.index, failed.error);
            }
        }
    }
}
