use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener as TokioTcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{AuthError, CallbackResult};

use super::config::{LocalServerConfig, redirect_uri};
use super::http::{
    LocalServerState, ResponseReceiver, SharedResponseSender, callback_handler, send_response,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// One-shot redirect receiver for a single login attempt.
///
/// The port is bound in [`CallbackServer::bind`] so a busy port fails the
/// attempt before anything is shown to the user. Serving starts with
/// [`CallbackServer::start`]; [`CallbackServer::shutdown`] must run on every
/// exit path. Dropping a server that was never shut down stops it as well.
#[derive(Debug)]
pub struct CallbackServer {
    config: LocalServerConfig,
    local_addr: SocketAddr,
    listener: Option<TcpListener>,
    response_tx: SharedResponseSender,
    response_rx: Option<ResponseReceiver>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    pub fn bind(config: LocalServerConfig) -> Result<Self, AuthError> {
        let addr = config.bind_addr();
        let listener =
            TcpListener::bind(addr.as_str()).map_err(|source| AuthError::ListenerBind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "callback listener bound");

        let (response_tx, response_rx) = oneshot::channel();
        Ok(Self {
            config,
            local_addr,
            listener: Some(listener),
            response_tx: Arc::new(Mutex::new(Some(response_tx))),
            response_rx: Some(response_rx),
            shutdown_tx: None,
            server_handle: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn redirect_uri(&self) -> String {
        redirect_uri(self.local_addr.port())
    }

    /// Starts serving callbacks in the background. Any path is accepted.
    pub fn start(&mut self) -> Result<(), AuthError> {
        let listener = self.listener.take().ok_or_else(|| AuthError::Server {
            message: "callback server already started".to_string(),
        })?;

        let state = LocalServerState {
            success_html: self.config.success_html.clone(),
            error_html: self.config.error_html.clone(),
            response_tx: self.response_tx.clone(),
        };
        let app = Router::new().fallback(callback_handler).with_state(state);

        listener.set_nonblocking(true)?;
        let listener = TokioTcpListener::from_std(listener)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        let response_tx = self.response_tx.clone();
        self.server_handle = Some(tokio::spawn(async move {
            if let Err(err) = server.await {
                send_response(
                    &response_tx,
                    Err(AuthError::Server {
                        message: err.to_string(),
                    }),
                );
            }
        }));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    /// Waits for the first delivered callback, the deadline, or cancellation,
    /// whichever comes first. The server keeps running until [`Self::shutdown`].
    pub async fn wait_for_callback(
        &mut self,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<CallbackResult, AuthError> {
        let response_rx = self.response_rx.take().ok_or_else(|| AuthError::Server {
            message: "callback result already consumed".to_string(),
        })?;

        tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            outcome = tokio::time::timeout(timeout, response_rx) => match outcome {
                Err(_) => Err(AuthError::Timeout { timeout }),
                Ok(Err(_)) => Err(AuthError::Server {
                    message: "callback channel closed".to_string(),
                }),
                Ok(Ok(result)) => result,
            },
        }
    }

    /// Stops serving and releases the port. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(mut handle) = self.server_handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                .await
                .is_err()
            {
                tracing::debug!("callback server did not drain in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }
        // Releases the port when `start` never ran.
        self.listener = None;
        tracing::debug!(local_addr = %self.local_addr, "callback listener shut down");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}
