//! The listener role: a background loop that hands accepted channels to a
//! callback until told to stop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{Channel, Listener};

/// Cloneable trigger that stops an accept loop.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Handle to a running accept loop. The loop also stops once this handle
/// and every [`ShutdownTrigger`] cloned from it are dropped.
#[derive(Debug)]
pub struct AcceptLoopHandle {
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
}

impl AcceptLoopHandle {
    pub fn shutdown(&self) {
        self.trigger.shutdown();
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "accept loop task failed");
        }
    }
}

/// Spawns a task that accepts channels from `listener` and passes each to
/// `on_accept`.
///
/// The loop ends when shutdown is requested or when `accept` fails, e.g.
/// because the listening socket was closed underneath it. A channel that
/// arrives after shutdown was requested is closed instead of handed over.
/// [`Listener::close`] runs once on the way out.
pub fn spawn_accept_loop<L, F>(mut listener: L, mut on_accept: F) -> AcceptLoopHandle
where
    L: Listener,
    F: FnMut(Channel) + Send + 'static,
{
    let (tx, mut rx) = watch::channel(false);
    let trigger = ShutdownTrigger { tx: Arc::new(tx) };

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                // The wait's `Ref` must not outlive the branch, or the
                // accept arm below can't borrow `rx`.
                () = async {
                    let _ = rx.wait_for(|stop| *stop).await;
                } => break,

                result = listener.accept() => match result {
                    Ok(channel) => {
                        if *rx.borrow() {
                            tracing::debug!(id = %channel.id(), "closing channel accepted after shutdown");
                            channel.close();
                            break;
                        }
                        on_accept(channel);
                    }
                    Err(e) => {
                        if *rx.borrow() {
                            tracing::debug!(error = %e, "accept interrupted by shutdown");
                        } else {
                            tracing::warn!(error = %e, "accept failed, stopping");
                        }
                        break;
                    }
                },
            }
        }
        listener.close();
        tracing::debug!("accept loop exited");
    });

    AcceptLoopHandle { trigger, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TransportError, TransportKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    /// Listener fed by a channel of results.
    struct ScriptedListener {
        rx: mpsc::UnboundedReceiver<Result<Channel, TransportError>>,
        closed: Arc<AtomicBool>,
        // Fired right before `accept` returns, to race shutdown.
        trip: Arc<Mutex<Option<ShutdownTrigger>>>,
    }

    impl Listener for ScriptedListener {
        async fn accept(&mut self) -> Result<Channel, TransportError> {
            let next = self.rx.recv().await.ok_or(TransportError::Shutdown)?;
            if let Some(trigger) = self.trip.lock().unwrap().as_ref() {
                trigger.shutdown();
            }
            next
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn memory_channel() -> (Channel, tokio::io::DuplexStream) {
        let (a, b) = tokio::io::duplex(8);
        (Channel::from_stream(TransportKind::Memory, "test", a), b)
    }

    fn scripted() -> (
        ScriptedListener,
        mpsc::UnboundedSender<Result<Channel, TransportError>>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let listener = ScriptedListener {
            rx,
            closed: closed.clone(),
            trip: Arc::new(Mutex::new(None)),
        };
        (listener, tx, closed)
    }

    #[tokio::test]
    async fn test_accepted_channels_reach_callback_until_shutdown() {
        let (listener, tx, closed) = scripted();
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let sink = accepted.clone();
        let handle = spawn_accept_loop(listener, move |channel| {
            sink.lock().unwrap().push(channel);
        });

        let (first, _keep1) = memory_channel();
        let (second, _keep2) = memory_channel();
        tx.send(Ok(first)).unwrap();
        tx.send(Ok(second)).unwrap();

        while accepted.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }
        handle.shutdown();
        handle.join().await;

        assert!(closed.load(Ordering::SeqCst));
        assert!(accepted.lock().unwrap().iter().all(Channel::is_open));
    }

    #[tokio::test]
    async fn test_channel_accepted_after_shutdown_is_closed() {
        let (listener, tx, closed) = scripted();
        let trip = listener.trip.clone();

        let delivered = Arc::new(AtomicBool::new(false));
        let flag = delivered.clone();
        let handle = spawn_accept_loop(listener, move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        *trip.lock().unwrap() = Some(handle.trigger());

        let (late, _keep) = memory_channel();
        let control = late.control();
        tx.send(Ok(late)).unwrap();
        handle.join().await;

        assert!(!delivered.load(Ordering::SeqCst));
        assert!(!control.is_open());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_loop() {
        let (listener, _tx, closed) = scripted();
        let handle = spawn_accept_loop(listener, |_| {});
        let task_done = {
            let AcceptLoopHandle { trigger, task } = handle;
            drop(trigger);
            task
        };
        task_done.await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_accept_error_stops_loop() {
        let (listener, tx, closed) = scripted();
        let handle = spawn_accept_loop(listener, |_| {});
        tx.send(Err(TransportError::ConnectionClosed("socket closed".into())))
            .unwrap();
        handle.join().await;
        assert!(closed.load(Ordering::SeqCst));
    }
}
