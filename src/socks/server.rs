use std::future::Future;
use std::io;
use std::sync::Arc;

use anyhow::bail;
use slog::{error, info, o};
use tokio::sync::watch;

use crate::config::Config;
use crate::listener::{ListenAddr, Listener};
use crate::socks::handler::Handler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Listening,
    Stopping,
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Accepts SOCKS clients and hands each one to its own task.
///
/// Hooks are attached before the server is shared; `start` and `stop` are
/// then called on an `Arc<Server>`.
pub struct Server {
    config: Arc<Config>,
    logger: slog::Logger,
    on_started: Option<Hook>,
    on_stopped: Option<Hook>,
    state: watch::Sender<State>,
}

impl Server {
    pub fn new(config: Config, logger: slog::Logger) -> Self {
        Self {
            config: Arc::new(config),
            logger,
            on_started: None,
            on_stopped: None,
            state: watch::channel(State::Stopped).0,
        }
    }

    pub fn on_started(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_started = Some(Box::new(hook));
        self
    }

    pub fn on_stopped(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stopped = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Binds the configured listener and spawns the accept loop.
    ///
    /// Fails if the server is not stopped or the bind fails.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<ListenAddr> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == State::Stopped {
                *state = State::Listening;
                true
            } else {
                false
            }
        });
        if !claimed {
            bail!("server is already running");
        }

        let bound = match Listener::bind(&self.config).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (listener, addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.state.send_replace(State::Stopped);
                bail!("failed to bind: {e}");
            }
        };
        info!(self.logger, "server started"; "addr" => %addr);
        if let Some(hook) = &self.on_started {
            hook();
        }

        let server = Arc::clone(self);
        tokio::spawn(server.accept_loop(listener));
        Ok(addr)
    }

    /// Closes the listener. Connections already accepted keep running.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == State::Listening {
                *state = State::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the accept loop has exited.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == State::Stopped).await;
    }

    /// Serves until `shutdown` resolves or the accept loop ends on its own.
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = io::Result<()>>,
    ) -> anyhow::Result<()> {
        tokio::select! {
            signal = shutdown => {
                signal?;
                if self.state() == State::Listening {
                    self.stop();
                }
                self.stopped().await;
            }
            _ = self.stopped() => {}
        }
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: Listener) {
        let mut state_rx = self.state.subscribe();
        let mut conn_id: u64 = 0;
        loop {
            tokio::select! {
                _ = state_rx.wait_for(|state| *state == State::Stopping) => break,
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        conn_id += 1;
                        let h = Handler {
                            logger: self.logger.new(o!("id" => conn_id, "peer" => peer.clone())),
                            config: Arc::clone(&self.config),
                            peer,
                        };
                        tokio::spawn(h.handle(client));
                    }
                    Err(err) => {
                        error!(self.logger, "failed to accept"; "err" => %err);
                        break;
                    }
                },
            }
        }

        drop(listener);
        info!(self.logger, "server stopped");
        if let Some(hook) = &self.on_stopped {
            hook();
        }
        self.state.send_replace(State::Stopped);
    }
}
