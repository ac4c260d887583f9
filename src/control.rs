use std::{collections::HashSet, sync::Arc, time::Duration};

use serenity::all::UserId;

use crate::{
    context::TextContext,
    error::{ControlError, LoadError},
    loader::Loader,
    process::ProcessControl,
};

/// Owner-only commands that manage units and the process. These are built in,
/// so a broken or unloaded unit can never take them away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Panel,
    Load,
    Unload,
    Reload,
    Shutdown,
    Restart,
}
impl ControlCommand {
    pub const ALL: [Self; 6] = [
        Self::Panel,
        Self::Load,
        Self::Unload,
        Self::Reload,
        Self::Shutdown,
        Self::Restart,
    ];

    pub fn resolve(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == key || cmd.aliases().contains(&key))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Panel => "ctl",
            Self::Load => "load",
            Self::Unload => "unload",
            Self::Reload => "reload",
            Self::Shutdown => "shutdown",
            Self::Restart => "restart",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Panel => &["control", "botctl"],
            Self::Reload => &["rl"],
            Self::Shutdown => &["stop", "exit"],
            Self::Restart => &["reboot"],
            Self::Load | Self::Unload => &[],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Panel => "Bot control panel",
            Self::Load => "Load a command unit",
            Self::Unload => "Unload a command unit",
            Self::Reload => "Reload all commands",
            Self::Shutdown => "Shut the bot down",
            Self::Restart => "Restart the bot process",
        }
    }
}

pub struct ControlSurface {
    loader: Arc<Loader>,
    owners: HashSet<UserId>,
    control_unit: String,
    ack_delay: Duration,
    process: Arc<dyn ProcessControl>,
}
impl ControlSurface {
    pub fn new(
        loader: Arc<Loader>,
        owners: impl IntoIterator<Item = UserId>,
        control_unit: &str,
        ack_delay: Duration,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            loader,
            owners: owners.into_iter().collect(),
            control_unit: control_unit.to_string(),
            ack_delay,
            process,
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owners.contains(&user)
    }

    pub async fn execute(
        &self,
        cmd: ControlCommand,
        ctx: &dyn TextContext,
        args: &[String],
    ) -> Result<(), ControlError> {
        if !self.is_owner(ctx.author_id()) {
            tracing::warn!(
                user = %ctx.author_id(),
                command = cmd.name(),
                "refused control command from a non-owner"
            );
            return Err(ControlError::Unauthorized);
        }
        tracing::info!(user = %ctx.author_id(), command = cmd.name(), "control command");

        match cmd {
            ControlCommand::Panel => ctx.reply(&self.panel()).await?,
            ControlCommand::Load => self.load(ctx, args).await?,
            ControlCommand::Unload => self.unload(ctx, args).await?,
            ControlCommand::Reload => self.reload(ctx).await?,
            ControlCommand::Shutdown => {
                self.acknowledge(ctx, "shutdown").await?;
                self.process.shutdown();
            }
            ControlCommand::Restart => {
                self.acknowledge(ctx, "restart").await?;
                self.process.restart()?;
            }
        }
        Ok(())
    }

    fn panel(&self) -> String {
        let mut tree = format!("**Bot Control Panel**\n```\n{}/\n└── botctl/\n", self.control_unit);
        let last = ControlCommand::ALL.len() - 1;
        for (i, cmd) in ControlCommand::ALL.into_iter().enumerate() {
            let branch = if i == last { "    └── " } else { "    ├── " };
            tree += &format!("{branch}{:<10} - {}\n", cmd.name(), cmd.description());
        }
        tree += "```";
        tree
    }

    async fn load(&self, ctx: &dyn TextContext, args: &[String]) -> Result<(), ControlError> {
        let requested = self.unit_argument(args, "load <unit>").await?;
        let available = self.loader.available_units().await;
        let Some(unit) = find_unit(&available, &requested) else {
            return Err(ControlError::UnknownUnit {
                unit: requested,
                available,
            });
        };

        let report = self.loader.load_unit(&unit).await;
        let mut response = if report.loaded.is_empty() {
            format!("[botctl/error]: No commands loaded from unit `{unit}/`")
        } else {
            format!(
                "[botctl/info]: Loaded **{}** commands from unit `{unit}/`:\n`{}`",
                report.loaded.len(),
                report.loaded.join("`, `")
            )
        };
        response += &error_block(&report.errors);

        ctx.reply(&response).await?;
        Ok(())
    }

    async fn unload(&self, ctx: &dyn TextContext, args: &[String]) -> Result<(), ControlError> {
        let requested = self.unit_argument(args, "unload <unit>").await?;
        if requested.eq_ignore_ascii_case(&self.control_unit) {
            return Err(ControlError::ProtectedUnit(self.control_unit.clone()));
        }
        let available = self.loader.available_units().await;
        let loaded = self.loader.registry().loaded_units();
        let Some(unit) =
            find_unit(&loaded, &requested).or_else(|| find_unit(&available, &requested))
        else {
            return Err(ControlError::UnknownUnit {
                unit: requested,
                available,
            });
        };

        let report = self.loader.unload_unit(&unit).await;
        let mut response = if report.unloaded.is_empty() {
            format!("[botctl/warning]: No commands unloaded from `{unit}/`")
        } else {
            format!(
                "[botctl/info]: Unloaded **{}** commands from `{unit}/`:\n`{}`",
                report.unloaded.len(),
                report.unloaded.join("`, `")
            )
        };
        response += &error_block(&report.errors);

        ctx.reply(&response).await?;
        Ok(())
    }

    async fn reload(&self, ctx: &dyn TextContext) -> Result<(), ControlError> {
        ctx.reply("[botctl/info]: Reloading all commands from all units")
            .await?;

        let report = self.loader.reload_all().await;
        let mut response = format!(
            "[botctl/info]: Reloaded **{}** commands from **{}** units",
            report.total, report.units
        );
        response += &error_block(&report.errors);

        ctx.send(&response).await?;
        Ok(())
    }

    async fn acknowledge(&self, ctx: &dyn TextContext, process: &str) -> anyhow::Result<()> {
        ctx.reply(&format!("[botctl/info]: executed process `{process}`"))
            .await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }

    async fn unit_argument(
        &self,
        args: &[String],
        usage: &'static str,
    ) -> Result<String, ControlError> {
        match args.first() {
            Some(unit) => Ok(unit.clone()),
            None => Err(ControlError::Usage {
                usage,
                available: self.loader.available_units().await,
            }),
        }
    }
}

/// The unit named `requested`, preferring an exact match over one that differs only in case.
fn find_unit(units: &[String], requested: &str) -> Option<String> {
    units
        .iter()
        .find(|unit| *unit == requested)
        .or_else(|| units.iter().find(|unit| unit.eq_ignore_ascii_case(requested)))
        .cloned()
}

fn error_block(errors: &[LoadError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let errors: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
    format!("\n[botctl/error]:\n```\n{}\n```", errors.join("\n"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts process requests instead of acting on them.
    #[derive(Default)]
    pub struct FakeProcess {
        pub shutdowns: AtomicUsize,
        pub restarts: AtomicUsize,
    }
    impl ProcessControl for FakeProcess {
        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        fn restart(&self) -> anyhow::Result<()> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub const OWNER: u64 = 42;

    pub fn surface(loader: Arc<Loader>, process: Arc<FakeProcess>) -> ControlSurface {
        ControlSurface::new(
            loader,
            [UserId::new(OWNER)],
            "ctl",
            Duration::ZERO,
            process,
        )
    }
}
