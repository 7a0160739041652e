//! Single-flight transport between the client and the native host.
//!
//! Requests are queued on an unbounded channel and handled one at a time by
//! a dispatcher running on its own OS thread. Each caller waits on a oneshot
//! reply, so nobody polls and only one request is ever being executed.

use std::io;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::error::{BridgeError, SqlError};
use crate::native::NativeHost;
use crate::protocol::{
    BatchResult, CloseArgs, EndTransactionArgs, OpenArgs, OpenResult, Request, Response,
    RunBatchArgs,
};

/// Name of the dispatcher thread.
pub const DISPATCHER_THREAD: &str = "websql-native";

type Reply = Result<Response, SqlError>;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Reply>,
}

/// Cloneable sending side of the bridge channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    sender: mpsc::UnboundedSender<Envelope>,
}

/// Moves `host` onto a dedicated dispatcher thread and returns a handle for
/// sending it requests.
///
/// The thread exits once every handle has been dropped, closing all
/// connections the host still holds.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn(host: NativeHost) -> io::Result<ChannelHandle> {
    let (sender, receiver) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name(DISPATCHER_THREAD.to_string())
        .spawn(move || dispatch(host, receiver))?;
    Ok(ChannelHandle { sender })
}

fn dispatch(mut host: NativeHost, mut receiver: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(Envelope { request, reply }) = receiver.blocking_recv() {
        let method = request.method();
        let name = request.database_name().to_string();
        let result = host.handle(request);
        if reply.send(result).is_err() {
            log::debug!("caller of {method} on '{name}' went away before the reply");
        }
    }
    log::debug!("native dispatcher stopped");
}

impl ChannelHandle {
    /// Sends `request` and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns the native failure, or [`BridgeError::ChannelClosed`] if the
    /// dispatcher is gone.
    pub async fn call(&self, request: Request) -> Result<Response, SqlError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope { request, reply })
            .map_err(|_| SqlError::detached(BridgeError::ChannelClosed))?;
        response
            .await
            .map_err(|_| SqlError::detached(BridgeError::ChannelClosed))?
    }

    /// `open` round trip.
    ///
    /// # Errors
    ///
    /// See [`ChannelHandle::call`].
    pub async fn open(&self, args: OpenArgs) -> Result<OpenResult, SqlError> {
        match self.call(Request::Open(args)).await? {
            Response::Open(result) => Ok(result),
            other => Err(unexpected("open", &other)),
        }
    }

    /// `close` round trip.
    ///
    /// # Errors
    ///
    /// See [`ChannelHandle::call`].
    pub async fn close(&self, args: CloseArgs) -> Result<(), SqlError> {
        match self.call(Request::Close(args)).await? {
            Response::Close => Ok(()),
            other => Err(unexpected("close", &other)),
        }
    }

    /// `runBatch` round trip.
    ///
    /// # Errors
    ///
    /// See [`ChannelHandle::call`].
    pub async fn run_batch(&self, args: RunBatchArgs) -> Result<BatchResult, SqlError> {
        match self.call(Request::RunBatch(args)).await? {
            Response::RunBatch(result) => Ok(result),
            other => Err(unexpected("runBatch", &other)),
        }
    }

    /// `forceEndTransaction` round trip.
    ///
    /// # Errors
    ///
    /// See [`ChannelHandle::call`].
    pub async fn end_transaction(&self, args: EndTransactionArgs) -> Result<(), SqlError> {
        match self.call(Request::ForceEndTransaction(args)).await? {
            Response::ForceEndTransaction => Ok(()),
            other => Err(unexpected("forceEndTransaction", &other)),
        }
    }

    /// Queues a `close` without waiting for its reply.
    ///
    /// Used when nobody is left to await the round trip; the dispatcher logs
    /// the outcome.
    pub(crate) fn close_detached(&self, args: CloseArgs) {
        let (reply, _) = oneshot::channel();
        let request = Request::Close(args);
        if self.sender.send(Envelope { request, reply }).is_err() {
            log::debug!("dispatcher gone, dropping detached close");
        }
    }
}

fn unexpected(method: &str, response: &Response) -> SqlError {
    log::error!("native side answered {method} with {response:?}");
    SqlError::detached(BridgeError::UnexpectedResponse {
        method: method.to_string(),
    })
}
