//! Batch translation binary - runs one bulk-translation pass from the
//! command line, without the HTTP surface.
//!
//! Usage:
//!   cargo run --bin translate-batch -- en fr 1 2 3   # translate entities 1,2,3 en->fr
//!   cargo run --bin translate-batch -- en fr --force # all entities, overwrite targets
//!
//! Required environment variables: none
//!
//! Optional:
//! - DATABASE_PATH (defaults to data/entities.db)
//! - NOTIFY_WEBHOOK_URL (deliver notices to a webhook as well)

use anyhow::{bail, Context, Result};
use entity_bulk_translation::config::Config;
use entity_bulk_translation::i18n::{
    ensure_in_catalog, validate_language_choice, LanguageCode,
};
use entity_bulk_translation::processor::{process_batch, EntityId};
use entity_bulk_translation::store::EntityStore;
use entity_bulk_translation::{notify, report};

struct Args {
    from: LanguageCode,
    to: LanguageCode,
    force: bool,
    ids: Vec<EntityId>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);

    let from = args.next().context("Usage: translate-batch <from> <to> [--force] [ids...]")?;
    let to = args.next().context("Usage: translate-batch <from> <to> [--force] [ids...]")?;

    let mut force = false;
    let mut ids = Vec::new();
    for arg in args {
        if arg == "--force" {
            force = true;
        } else {
            ids.push(
                arg.parse::<EntityId>()
                    .with_context(|| format!("Not an entity id: '{arg}'"))?,
            );
        }
    }

    Ok(Args {
        from: LanguageCode::new(from),
        to: LanguageCode::new(to),
        force,
        ids,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entity_bulk_translation=info".parse()?),
        )
        .init();

    let args = parse_args()?;

    if let Err(e) = validate_language_choice(&args.from, &args.to) {
        bail!("{e}");
    }
    ensure_in_catalog(&args.from)?;
    ensure_in_catalog(&args.to)?;

    let config = Config::from_env()?;
    let store = EntityStore::new(&config.database_path)?;

    // No ids on the command line means the whole store
    let ids = if args.ids.is_empty() {
        store.list_entity_ids()?
    } else {
        args.ids
    };

    let mut batch = store.load_batch(&ids)?;
    println!(
        "Translating {} entities {} -> {}{}",
        batch.len(),
        args.from,
        args.to,
        if args.force { " (force)" } else { "" }
    );

    let tally = process_batch(&mut batch, &args.from, &args.to, args.force);
    let notices = report::report(&tally, &args.from, &args.to);

    if notices.is_empty() {
        println!("Nothing to do.");
    }
    for notice in &notices {
        println!("{notice}");
    }

    if let Some(webhook_url) = &config.notify_webhook_url {
        let client = reqwest::Client::new();
        notify::send_notices(&client, webhook_url, &args.from, &args.to, &tally, &notices)
            .await
            .context("Failed to deliver notices")?;
    }

    Ok(())
}
