//! TCP server side of the coordinator protocol
//!
//! Thin adapter: every request is answered by calling straight into the
//! shared `Coordinator`, which does all of its work under its own lock. Each
//! worker connection gets its own tokio task.

use crate::coordinator::{Coordinator, FinishStatus};
use crate::distributed::protocol::*;
use crate::error::{TransportError, TransportResult};
use crate::task::Computation;
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Network endpoint for a coordinator
pub struct CoordinatorServer<C: Computation> {
    coordinator: Arc<Coordinator<C>>,
    listener: TcpListener,
}

impl<C: Computation> CoordinatorServer<C> {
    /// Bind the listening socket
    pub async fn bind(coordinator: Arc<Coordinator<C>>, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind coordinator on {}", addr))?;

        Ok(Self {
            coordinator,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accept worker connections until `shutdown` resolves
    ///
    /// Connections still open at shutdown are closed, exactly as if the
    /// coordinator process had exited.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "coordinator listening");

        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let coordinator = self.coordinator.clone();
                    connections.spawn(async move {
                        match handle_connection(coordinator, stream, peer).await {
                            Ok(()) | Err(TransportError::Closed) => {
                                tracing::debug!(%peer, "worker disconnected");
                            }
                            Err(e) => tracing::warn!(%peer, "connection failed: {}", e),
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!("connection task failed: {}", e);
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!(open = connections.len(), "coordinator server shutting down");
                    connections.abort_all();
                    return Ok(());
                }
            }
        }
    }
}

/// Serve one worker connection
async fn handle_connection<C: Computation>(
    coordinator: Arc<Coordinator<C>>,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> TransportResult<()> {
    stream.set_nodelay(true)?;

    let worker_id = match read_message::<C, _>(&mut stream).await? {
        Message::Hello(hello) if hello.protocol_version == PROTOCOL_VERSION => hello.worker_id,
        Message::Hello(hello) => {
            let error = format!(
                "Protocol version mismatch: coordinator={}, worker={}",
                PROTOCOL_VERSION, hello.protocol_version
            );
            write_message::<C, _>(&mut stream, &Message::Error(ErrorMessage { error })).await?;
            return Err(TransportError::VersionMismatch {
                coordinator: PROTOCOL_VERSION,
                worker: hello.protocol_version,
            });
        }
        other => {
            let error = format!("Expected HELLO, got {}", other.kind());
            write_message::<C, _>(&mut stream, &Message::Error(ErrorMessage { error })).await?;
            return Err(TransportError::Unexpected {
                expected: "HELLO",
                got: other.kind().to_string(),
            });
        }
    };

    write_message::<C, _>(
        &mut stream,
        &Message::Welcome(WelcomeMessage {
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await?;
    tracing::info!(%worker_id, %peer, "worker connected");

    loop {
        let request = read_message::<C, _>(&mut stream).await?;

        let response = match request {
            Message::Pull => match coordinator.pull() {
                Some(task) => {
                    tracing::debug!(%worker_id, task = %task.id(), "task handed out");
                    Message::Task(task)
                }
                None => Message::NoTask {
                    completed: coordinator.is_completed(),
                },
            },
            Message::Finish(finish) => {
                let status = coordinator.finish_report(finish.task_id, finish.outcome);
                if status == FinishStatus::Duplicate {
                    tracing::debug!(%worker_id, task = %finish.task_id, "late finish ignored");
                }
                Message::Ack
            }
            other => {
                tracing::warn!(%worker_id, "unexpected {} from worker", other.kind());
                Message::Error(ErrorMessage {
                    error: format!("Unexpected message {}", other.kind()),
                })
            }
        };

        write_message(&mut stream, &response).await?;
    }
}
