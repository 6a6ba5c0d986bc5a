//! Background send worker
//!
//! Callers hand requests to a tokio task that owns the [`BindingSender`] and
//! get [`Status`] updates back on a channel, so a prompt or UI never blocks
//! on BLE traffic.

use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::link::UartLink;
use crate::sender::{BindingSender, Connected};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Connect,
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Connected,
    ConnectError(String),
    Sent(String),
    SendError(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => write!(f, "Status: Ready"),
            Status::Connected => write!(f, "Status: Connected"),
            Status::ConnectError(e) => write!(f, "Status: Connection error {e}"),
            Status::Sent(text) => write!(f, "Status: Sent binding '{text}'"),
            Status::SendError(e) => write!(f, "Status: Failed to send {e}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("send worker has stopped")]
pub struct WorkerClosed;

/// Submits requests to a running worker
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn connect(&self) -> Result<(), WorkerClosed> {
        self.requests.send(Request::Connect).map_err(|_| WorkerClosed)
    }

    pub fn send(&self, text: impl Into<String>) -> Result<(), WorkerClosed> {
        self.requests
            .send(Request::Send(text.into()))
            .map_err(|_| WorkerClosed)
    }

    /// Finish queued requests, then stop
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(e) = self.task.await {
            log::error!("send worker panicked: {}", e);
        }
    }
}

/// Spawn a task that serves requests one at a time, in order.
///
/// `Status::Ready` is reported first. The status channel closes once the
/// handle is shut down and every queued request has been served.
pub fn spawn_worker<L>(mut sender: BindingSender<L>) -> (WorkerHandle, mpsc::UnboundedReceiver<Status>)
where
    L: UartLink + Send + 'static,
{
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let _ = status_tx.send(Status::Ready);

        while let Some(request) = request_rx.recv().await {
            let text = match request {
                Request::Connect => {
                    let status = match sender.connect().await {
                        Ok(_) => Status::Connected,
                        Err(e) => Status::ConnectError(e.to_string()),
                    };
                    let _ = status_tx.send(status);
                    continue;
                }
                Request::Send(text) => text,
            };

            match sender.connect().await {
                Ok(Connected::Established) => {
                    let _ = status_tx.send(Status::Connected);
                }
                Ok(Connected::Already) => {}
                Err(e) => {
                    log::warn!("Failed to reconnect: {}", e);
                    let _ = status_tx.send(Status::ConnectError(e.to_string()));
                    continue;
                }
            }

            let status = match sender.send_binding(&text).await {
                Ok(sent) => Status::Sent(sent.text),
                Err(e) => Status::SendError(e.to_string()),
            };
            let _ = status_tx.send(status);
        }
        log::debug!("send worker stopped");
    });

    (
        WorkerHandle {
            requests: request_tx,
            task,
        },
        status_rx,
    )
}
