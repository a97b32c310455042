//! Blocks until the process is asked to terminate and turns that into an exit code.

use std::future::Future;
use tracing::{info, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermSignal {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

/// Delivers termination requests. `None` means the source closed without a recognized signal.
pub trait SignalSource {
    fn recv(&mut self) -> impl Future<Output = Option<TermSignal>> + Send;
}

pub fn exit_code(received: Option<TermSignal>) -> i32 {
    match received {
        Some(
            TermSignal::Hangup | TermSignal::Interrupt | TermSignal::Terminate | TermSignal::Quit,
        ) => EXIT_OK,
        None => EXIT_FAILURE,
    }
}

/// Wait for the first delivery from `source`. The source is consumed; there is no second wait.
pub async fn wait_for_termination<S: SignalSource>(mut source: S) -> i32 {
    let received = source.recv().await;
    match received {
        Some(sig) => info!(signal = ?sig, "termination requested"),
        None => warn!("signal source closed unexpectedly"),
    }
    exit_code(received)
}

#[cfg(unix)]
pub use unix::UnixSignals;

#[cfg(unix)]
mod unix {
    use super::{SignalSource, TermSignal};
    use tokio::signal::unix::{signal, Signal, SignalKind};

    /// SIGHUP, SIGINT, SIGTERM and SIGQUIT.
    pub struct UnixSignals {
        hangup: Signal,
        interrupt: Signal,
        terminate: Signal,
        quit: Signal,
    }

    impl UnixSignals {
        pub fn register() -> std::io::Result<Self> {
            Ok(Self {
                hangup: signal(SignalKind::hangup())?,
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
                quit: signal(SignalKind::quit())?,
            })
        }
    }

    impl SignalSource for UnixSignals {
        async fn recv(&mut self) -> Option<TermSignal> {
            tokio::select! {
                s = self.hangup.recv() => s.map(|()| TermSignal::Hangup),
                s = self.interrupt.recv() => s.map(|()| TermSignal::Interrupt),
                s = self.terminate.recv() => s.map(|()| TermSignal::Terminate),
                s = self.quit.recv() => s.map(|()| TermSignal::Quit),
            }
        }
    }
}

#[cfg(not(unix))]
pub use ctrl_c::CtrlC;

#[cfg(not(unix))]
mod ctrl_c {
    use super::{SignalSource, TermSignal};

    pub struct CtrlC;

    impl SignalSource for CtrlC {
        async fn recv(&mut self) -> Option<TermSignal> {
            tokio::signal::ctrl_c().await.ok().map(|()| TermSignal::Interrupt)
        }
    }
}

impl SignalSource for tokio::sync::mpsc::Receiver<TermSignal> {
    async fn recv(&mut self) -> Option<TermSignal> {
        tokio::sync::mpsc::Receiver::recv(self).await
    }
}
