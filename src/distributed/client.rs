//! TCP client side of the coordinator protocol
//!
//! A `RemoteCoordinator` owns one connection. Requests on it are strictly
//! request/response, so the stream sits behind an async mutex and each call
//! holds it for one exchange.

use crate::distributed::protocol::*;
use crate::distributed::service::CoordinatorService;
use crate::error::{TransportError, TransportResult};
use crate::task::{Computation, Task};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Connection to a coordinator over TCP
pub struct RemoteCoordinator<C: Computation> {
    stream: Mutex<TcpStream>,
    worker_id: String,
    completed: AtomicBool,
    _computation: PhantomData<fn() -> C>,
}

impl<C: Computation> RemoteCoordinator<C> {
    /// Connect and perform the HELLO/WELCOME handshake
    pub async fn connect(addr: &str, worker_id: impl Into<String>) -> TransportResult<Self> {
        let worker_id = worker_id.into();
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let hello: Message<C> = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            worker_id: worker_id.clone(),
        });
        write_message(&mut stream, &hello).await?;

        match read_message::<C, _>(&mut stream).await? {
            Message::Welcome(welcome) if welcome.protocol_version == PROTOCOL_VERSION => {}
            Message::Welcome(welcome) => {
                return Err(TransportError::VersionMismatch {
                    coordinator: welcome.protocol_version,
                    worker: PROTOCOL_VERSION,
                })
            }
            Message::Error(err) => return Err(TransportError::Rejected(err.error)),
            other => {
                return Err(TransportError::Unexpected {
                    expected: "WELCOME",
                    got: other.kind().to_string(),
                })
            }
        }

        tracing::debug!(%worker_id, %addr, "connected to coordinator");

        Ok(Self {
            stream: Mutex::new(stream),
            worker_id,
            completed: AtomicBool::new(false),
            _computation: PhantomData,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    async fn exchange(&self, request: &Message<C>) -> TransportResult<Message<C>> {
        let mut stream = self.stream.lock().await;
        write_message(&mut *stream, request).await?;
        read_message(&mut *stream).await
    }
}

#[async_trait]
impl<C: Computation> CoordinatorService<C> for RemoteCoordinator<C> {
    async fn pull(&self) -> TransportResult<Option<Task<C>>> {
        match self.exchange(&Message::Pull).await? {
            Message::Task(task) => Ok(Some(task)),
            Message::NoTask { completed } => {
                self.completed.store(completed, Ordering::Release);
                Ok(None)
            }
            Message::Error(err) => Err(TransportError::Rejected(err.error)),
            other => Err(TransportError::Unexpected {
                expected: "TASK or NO_TASK",
                got: other.kind().to_string(),
            }),
        }
    }

    async fn finish(&self, task: Task<C>) -> TransportResult<()> {
        let (task_id, outcome) = task.into_report()?;
        let request = Message::Finish(FinishMessage { task_id, outcome });

        match self.exchange(&request).await? {
            Message::Ack => Ok(()),
            Message::Error(err) => Err(TransportError::Rejected(err.error)),
            other => Err(TransportError::Unexpected {
                expected: "ACK",
                got: other.kind().to_string(),
            }),
        }
    }

    fn coordinator_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}
