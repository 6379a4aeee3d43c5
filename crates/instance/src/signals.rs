// OS termination signals
// Decision: Signals are forwarded into the coordinator inbox as Terminate events,
//           so the coordinator has one entry point for stopping
// Decision: Handlers are installed before anything is spawned; failing to install is fatal

use anyhow::Result;
use helloapi_core::CoordinatorHandle;

/// Registered termination signal streams (SIGINT, SIGTERM, SIGABRT)
#[cfg(unix)]
pub struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    abort: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    /// Register the handlers; must run inside the runtime
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            abort: signal(SignalKind::from_raw(libc::SIGABRT))?,
        })
    }

    async fn recv(&mut self) -> Result<&'static str> {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.abort.recv() => "SIGABRT",
        };
        Ok(name)
    }
}

#[cfg(not(unix))]
pub struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    pub fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

impl TerminationSignals {
    /// Forward the first termination signal to the coordinator
    pub async fn forward(mut self, handle: CoordinatorHandle) -> Result<&'static str> {
        let signal = self.recv().await?;
        tracing::info!(signal, "Received termination signal");
        handle.terminate().await?;
        Ok(signal)
    }
}
