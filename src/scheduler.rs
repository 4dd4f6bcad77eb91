use crate::config::Config;
use crate::i18n::validate_language_choice;
use crate::notify;
use crate::processor::process_batch;
use crate::report;
use crate::store::EntityStore;
use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Initialize and start the scheduler.
///
/// One job per configured time; each run walks every configured language
/// pair over the full entity set without force, so only missing target
/// revisions are filled in.
pub async fn start_scheduler(config: Arc<Config>, store: EntityStore) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    for time in &config.schedule_times {
        let cron_expr = time_to_cron(time)?;
        info!("Scheduling sync job for {} (cron: {})", time, cron_expr);

        let config_clone = Arc::clone(&config);
        let store_clone = store.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = Arc::clone(&config_clone);
            let store = store_clone.clone();

            Box::pin(async move {
                info!("Scheduled sync job triggered");
                if let Err(e) = run_sync_job(&config, &store).await {
                    error!("Scheduled sync job failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;
    info!("Scheduler started");

    Ok(scheduler)
}

/// Convert time string (HH:MM, UTC) to a cron expression
fn time_to_cron(time: &str) -> Result<String> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 2 {
        anyhow::bail!("Invalid time format: {}. Expected HH:MM", time);
    }

    let hour: u8 = parts[0].parse()?;
    let minute: u8 = parts[1].parse()?;
    if hour > 23 || minute > 59 {
        anyhow::bail!("Invalid time: {}", time);
    }

    // Cron format: "second minute hour day month day_of_week"
    Ok(format!("0 {} {} * * *", minute, hour))
}

/// Run one sync pass: every configured language pair over all entities.
pub async fn run_sync_job(config: &Config, store: &EntityStore) -> Result<()> {
    let ids = store.list_entity_ids()?;
    if ids.is_empty() {
        info!("No entities to sync");
        return Ok(());
    }

    let client = reqwest::Client::new();

    for (from, to) in &config.sync_pairs {
        if let Err(e) = validate_language_choice(from, to) {
            error!("Skipping sync pair {from}->{to}: {e}");
            continue;
        }

        let mut batch = store.load_batch(&ids)?;
        info!("Syncing {} entities {from}->{to}", batch.len());

        let tally = process_batch(&mut batch, from, to, false);
        let notices = report::report(&tally, from, to);

        if let Some(webhook_url) = &config.notify_webhook_url {
            if let Err(e) =
                notify::send_notices(&client, webhook_url, from, to, &tally, &notices).await
            {
                error!("Failed to deliver sync notices: {e:#}");
            }
        }
    }

    Ok(())
}
