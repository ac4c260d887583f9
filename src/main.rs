use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::Context as AnyhowContext;
use serenity::{
    Client,
    all::{Context, EventHandler, Interaction, Message, Ready, UserId},
    async_trait,
    model::prelude::GatewayIntents,
};
use tracing_subscriber::EnvFilter;

mod command;
mod config;
mod context;
mod control;
mod dispatcher;
mod error;
mod loader;
mod lua;
mod process;
mod registry;
mod schema;
mod slash;

use config::Configuration;

use crate::{
    context::{InteractionContext, MessageContext},
    control::ControlSurface,
    dispatcher::Dispatcher,
    loader::Loader,
    process::HostProcess,
    registry::Registry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Configuration::load()?;
    let discord_token = config.discord_token().context(
        "Expected authentication.discord_token to be filled in config, or DISCORD_TOKEN to be set",
    )?;

    let registry = Arc::new(Registry::default());
    let (change_tx, change_rx) = flume::unbounded::<()>();
    let loader = Arc::new(
        Loader::new(
            &config.commands.root,
            &config.discord.prefix,
            registry.clone(),
        )?
        .with_change_notifier(change_tx),
    );

    let report = loader.reload_all().await;
    tracing::info!(
        commands = report.total,
        units = report.units,
        "loaded commands from {}",
        config.commands.root.display()
    );
    for err in &report.errors {
        tracing::warn!("{err}");
    }

    let control = Arc::new(ControlSurface::new(
        loader.clone(),
        config
            .discord
            .owners
            .iter()
            .filter(|&&id| id != 0)
            .map(|&id| UserId::new(id)),
        &config.commands.control_unit,
        Duration::from_millis(config.commands.ack_delay_ms),
        Arc::new(HostProcess),
    ));
    let dispatcher = Dispatcher::new(&config.discord.prefix, registry.clone(), control);

    let mut client = Client::builder(
        discord_token,
        GatewayIntents::default()
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT,
    )
    .event_handler(Handler {
        dispatcher,
        registry,
        change_rx,
        syncing: AtomicBool::new(false),
    })
    .await
    .context("Error creating client")?;

    if let Err(why) = client.start().await {
        tracing::error!("Client error: {why:?}");
    }

    Ok(())
}

pub struct Handler {
    dispatcher: Dispatcher,
    registry: Arc<Registry>,
    change_rx: flume::Receiver<()>,
    /// Set once the slash-command sync task is running
    syncing: AtomicBool,
}
#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("{} is connected; registering commands...", ready.user.name);
        if let Err(err) = slash::sync_commands(&ctx.http, &self.registry).await {
            tracing::error!("Error while registering commands: {err:?}");
        }

        // Reconnects fire `ready` again; only one sync task should exist
        if !self.syncing.swap(true, Ordering::SeqCst) {
            tokio::spawn(slash::sync_on_change(
                ctx.http.clone(),
                self.registry.clone(),
                self.change_rx.clone(),
            ));
        }
        tracing::info!("{} is good to go!", ready.user.name);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            let invocation = Arc::new(InteractionContext::new(ctx.http.clone(), cmd));
            self.dispatcher.dispatch_structured(invocation).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore messages from bots
        if msg.author.bot {
            return;
        }

        let message = Arc::new(MessageContext::new(ctx.http.clone(), msg));
        self.dispatcher.dispatch_text(message).await;
    }
}
