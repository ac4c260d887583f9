use anyhow::Context as _;

/// Ends or replaces the running bot process.
pub trait ProcessControl: Send + Sync {
    fn shutdown(&self);
    fn restart(&self) -> anyhow::Result<()>;
}

/// Controls the current OS process.
pub struct HostProcess;
impl ProcessControl for HostProcess {
    fn shutdown(&self) {
        tracing::info!("shutting down");
        std::process::exit(0);
    }

    fn restart(&self) -> anyhow::Result<()> {
        let exe = std::env::current_exe().context("failed to locate the running executable")?;
        let args: Vec<_> = std::env::args_os().skip(1).collect();

        tracing::info!(exe = %exe.display(), "restarting");
        std::process::Command::new(&exe)
            .args(args)
            .spawn()
            .with_context(|| format!("failed to spawn {}", exe.display()))?;

        std::process::exit(0);
    }
}
