//! Stop on SIGINT/SIGTERM

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::DaemonError;

/// Run `stop` when the process receives an interrupt or terminate signal
///
/// The listener exits without calling `stop` once `shutdown` is cancelled.
/// On unix both handlers are installed before this returns, so a signal that
/// arrives right after `start` is not lost. Elsewhere only Ctrl-C is watched,
/// from inside the listener task.
pub(crate) fn listen<F>(shutdown: CancellationToken, stop: F) -> Result<JoinHandle<()>, DaemonError>
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(unix)]
    let (mut interrupt, mut terminate) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?,
            signal(SignalKind::terminate()).map_err(DaemonError::Signal)?,
        )
    };

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        let (interrupted, terminated) = (interrupt.recv(), terminate.recv());
        #[cfg(not(unix))]
        let (interrupted, terminated) = (tokio::signal::ctrl_c(), std::future::pending::<Option<()>>());

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            _ = interrupted => info!(signal = "SIGINT", "Received shutdown signal"),
            _ = terminated => info!(signal = "SIGTERM", "Received shutdown signal"),
        }

        stop();
    }))
}
