//! Routing of SIGINT/SIGTERM.
//!
//! The process listens for signals once, for its whole lifetime, via
//! [`route_signals`]. A signal is handed to the blocker only while an
//! [`InterruptWindow`] is open; the window closes when it is dropped. A
//! signal that arrives with no open window, or a second signal within the
//! same window, is returned to the caller, which aborts the run.

use std::fmt;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::info;

/// A termination request from outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl Signal {
    /// Conventional shell exit status for a process killed by this signal.
    pub fn exit_code(self) -> i32 {
        match self {
            Signal::Interrupt => 130,
            Signal::Terminate => 143,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
        })
    }
}

/// Hands signals to at most one open [`InterruptWindow`].
#[derive(Debug, Default)]
pub struct InterruptGate {
    armed: Mutex<Option<oneshot::Sender<Signal>>>,
}

impl InterruptGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window. Signals delivered until it is dropped go to it.
    pub fn arm(&self) -> InterruptWindow<'_> {
        let (tx, rx) = oneshot::channel();
        *self.slot() = Some(tx);
        InterruptWindow { gate: self, rx }
    }

    /// Offer `signal` to the open window. Returns `false` when nothing
    /// consumed it.
    pub fn deliver(&self, signal: Signal) -> bool {
        match self.slot().take() {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<Signal>>> {
        self.armed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An open interrupt window. Dropping it disarms the gate.
#[derive(Debug)]
pub struct InterruptWindow<'a> {
    gate: &'a InterruptGate,
    rx: oneshot::Receiver<Signal>,
}

impl InterruptWindow<'_> {
    /// Resolves once a signal is delivered to this window.
    pub async fn interrupted(&mut self) {
        match (&mut self.rx).await {
            Ok(signal) => info!("received {}, cancelling downstream build", signal),
            Err(_) => std::future::pending::<()>().await,
        }
    }
}

impl Drop for InterruptWindow<'_> {
    fn drop(&mut self) {
        *self.gate.slot() = None;
    }
}

/// Listen for SIGINT and SIGTERM (Ctrl-C only on non-unix) for the life of
/// the process, offering each to `gate`. Returns the first signal no window
/// consumed.
pub async fn route_signals(gate: &InterruptGate) -> std::io::Result<Signal> {
    let mut listener = SignalListener::install()?;
    loop {
        let received = listener.recv().await?;
        if !gate.deliver(received) {
            return Ok(received);
        }
    }
}

#[cfg(unix)]
struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(SignalListener {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<Signal> {
        Ok(tokio::select! {
            _ = self.interrupt.recv() => Signal::Interrupt,
            _ = self.terminate.recv() => Signal::Terminate,
        })
    }
}

#[cfg(not(unix))]
struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn install() -> std::io::Result<Self> {
        Ok(SignalListener)
    }

    async fn recv(&mut self) -> std::io::Result<Signal> {
        tokio::signal::ctrl_c().await?;
        Ok(Signal::Interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_without_window_is_not_consumed() {
        let gate = InterruptGate::new();
        assert!(!gate.is_armed());
        assert!(!gate.deliver(Signal::Interrupt));
    }

    #[tokio::test]
    async fn test_open_window_receives_signal() {
        let gate = InterruptGate::new();
        let mut window = gate.arm();
        assert!(gate.is_armed());

        assert!(gate.deliver(Signal::Terminate));
        window.interrupted().await;

        // one signal per window; a second one goes back to the caller
        assert!(!gate.deliver(Signal::Interrupt));
    }

    #[test]
    fn test_dropped_window_disarms_gate() {
        let gate = InterruptGate::new();
        {
            let _window = gate.arm();
            assert!(gate.is_armed());
        }
        assert!(!gate.is_armed());
        assert!(!gate.deliver(Signal::Interrupt));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Signal::Interrupt.exit_code(), 130);
        assert_eq!(Signal::Terminate.exit_code(), 143);
        assert_eq!(Signal::Terminate.to_string(), "SIGTERM");
    }
}
