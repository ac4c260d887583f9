use std::{collections::HashSet, sync::Arc};

use serenity::all::{Command, Http};

use crate::registry::Registry;

/// Makes Discord's global slash commands match the registry's structured commands.
pub async fn sync_commands(http: &Http, registry: &Registry) -> anyhow::Result<()> {
    let schemas = registry.structured_schemas();

    let registered: HashSet<_> = Command::get_global_commands(http)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let ours: HashSet<_> = schemas.iter().map(|s| s.name.clone()).collect();
    for removed in registered.difference(&ours) {
        tracing::info!(command = %removed, "removing slash command");
    }
    for added in ours.difference(&registered) {
        tracing::info!(command = %added, "adding slash command");
    }

    // Overwriting the whole set also picks up schema changes to existing commands
    let commands = schemas.iter().map(|s| s.to_discord_command()).collect();
    Command::set_global_commands(http, commands).await?;
    tracing::info!(count = schemas.len(), "synced slash commands");

    Ok(())
}

/// Re-syncs slash commands whenever the loader reports a change.
pub async fn sync_on_change(http: Arc<Http>, registry: Arc<Registry>, rx: flume::Receiver<()>) {
    while rx.recv_async().await.is_ok() {
        // Coalesce a burst of changes into one sync
        rx.drain().for_each(drop);

        if let Err(err) = sync_commands(&http, &registry).await {
            tracing::error!("failed to sync slash commands: {err:?}");
        }
    }
}
