//! Async ZeroMQ client for the shell, control and iopub channels of one kernel.
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep, sleep_until, timeout, timeout_at};
use tracing::{debug, trace, warn};
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use super::connection::ConnectionInfo;
use super::launcher::KernelProcess;
use super::message::{Message, Session};
use super::outputs::OutputCollector;
use crate::core::executor::{CellReply, ReplyStatus};
use crate::error::{Error, KernelError, Result};
use crate::notebook::CodeCell;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const KERNEL_INFO_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
/// How long to wait for an iopub message after a kernel_info reply before
/// assuming the subscription is not live yet.
const IOPUB_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);
const CONTROL_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KernelClient {
    session: Session,
    shell: DealerSocket,
    control: DealerSocket,
    iopub: SubSocket,
}

impl KernelClient {
    async fn connect(info: &ConnectionInfo) -> Result<Self> {
        let mut shell = DealerSocket::new();
        shell
            .connect(&info.endpoint(info.shell_port))
            .await
            .map_err(KernelError::transport)?;

        let mut control = DealerSocket::new();
        control
            .connect(&info.endpoint(info.control_port))
            .await
            .map_err(KernelError::transport)?;

        let mut iopub = SubSocket::new();
        iopub
            .connect(&info.endpoint(info.iopub_port))
            .await
            .map_err(KernelError::transport)?;
        iopub.subscribe("").await.map_err(KernelError::transport)?;

        Ok(Self {
            session: Session::new(&info.key),
            shell,
            control,
            iopub,
        })
    }

    /// Connect to a freshly launched kernel and wait until it answers
    /// `kernel_info_request` with iopub delivering messages.
    /// Returns the client and the `kernel_info_reply` content.
    pub async fn connect_when_ready(
        info: &ConnectionInfo,
        process: &mut KernelProcess,
        startup_timeout: Duration,
    ) -> Result<(Self, Value)> {
        let deadline = Instant::now() + startup_timeout;
        let check = |process: &mut KernelProcess| -> Result<()> {
            if process.has_exited() {
                return Err(KernelError::DeadKernel.into());
            }
            if Instant::now() >= deadline {
                return Err(KernelError::StartupTimeout(startup_timeout).into());
            }
            Ok(())
        };

        let mut client = loop {
            check(process)?;
            match timeout(CONNECT_ATTEMPT_TIMEOUT, Self::connect(info)).await {
                Ok(Ok(client)) => break client,
                Ok(Err(e)) => trace!("Kernel {} not accepting connections yet: {}", process.name(), e),
                Err(_) => trace!("Connecting to kernel {} timed out, retrying", process.name()),
            }
            sleep(RETRY_INTERVAL).await;
        };

        loop {
            check(process)?;
            let request = client.session.request("kernel_info_request", json!({}));
            client.send_shell(&request).await?;

            let attempt_deadline = Instant::now() + KERNEL_INFO_ATTEMPT_TIMEOUT;
            let Some(reply) = client.recv_reply(request.msg_id(), attempt_deadline.min(deadline)).await? else {
                continue;
            };
            if client.iopub_is_live().await? {
                debug!("Kernel {} is ready", process.name());
                return Ok((client, reply.content));
            }
            trace!("No iopub traffic from kernel {} yet, retrying kernel_info", process.name());
        }
    }

    /// Run `cell` and stream its iopub output into it.
    pub async fn execute(
        &mut self,
        cell_index: usize,
        cell: &mut CodeCell,
        cell_timeout: Option<Duration>,
        process: &mut KernelProcess,
    ) -> Result<CellReply> {
        let request = self.session.request(
            "execute_request",
            json!({
                "code": cell.source.as_str(),
                "silent": false,
                "store_history": true,
                "user_expressions": {},
                "allow_stdin": false,
                "stop_on_error": true,
            }),
        );
        let msg_id = request.msg_id().to_string();
        self.send_shell(&request).await?;

        let deadline = cell_timeout.map(|t| Instant::now() + t);
        let timer = async move {
            match deadline {
                Some(d) => sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
        let mut collector = OutputCollector::new();
        let mut idle = false;
        let mut reply: Option<Message> = None;

        while !idle || reply.is_none() {
            tokio::select! {
                frames = self.iopub.recv() => {
                    let msg = parse(&self.session, frames.map_err(KernelError::transport)?)?;
                    if msg.is_reply_to(&msg_id) && collector.handle(&msg, cell) {
                        idle = true;
                    }
                }
                frames = self.shell.recv(), if reply.is_none() => {
                    let msg = parse(&self.session, frames.map_err(KernelError::transport)?)?;
                    if msg.is_reply_to(&msg_id) && msg.msg_type() == "execute_reply" {
                        reply = Some(msg);
                    }
                }
                _ = liveness.tick() => {
                    if process.has_exited() {
                        return Err(KernelError::DeadKernel.into());
                    }
                }
                _ = &mut timer => {
                    let limit = cell_timeout.unwrap_or_default();
                    warn!("Cell {} exceeded {:?}, interrupting kernel", cell_index, limit);
                    self.interrupt().await;
                    return Err(Error::CellTimeout { cell_index, timeout: limit });
                }
            }
        }

        match reply {
            Some(reply) => Ok(cell_reply(&reply.content)),
            None => Err(KernelError::Protocol("missing execute_reply".into()).into()),
        }
    }

    /// Ask the kernel to interrupt the running request. Best effort.
    pub async fn interrupt(&mut self) {
        let request = self.session.request("interrupt_request", json!({}));
        if let Err(e) = self.control_round_trip(&request).await {
            warn!("Interrupt request failed: {}", e);
        }
    }

    /// Ask the kernel to exit. Best effort; the process is killed afterwards if needed.
    pub async fn shutdown(&mut self) {
        let request = self.session.request("shutdown_request", json!({"restart": false}));
        if let Err(e) = self.control_round_trip(&request).await {
            debug!("Shutdown request got no reply: {}", e);
        }
    }

    /// Send on control and wait for the matching reply. The send is bounded
    /// by the same deadline since the kernel may already be gone.
    async fn control_round_trip(&mut self, request: &Message) -> Result<Message> {
        let deadline = Instant::now() + CONTROL_REPLY_TIMEOUT;
        let no_reply = || KernelError::Protocol(format!("no reply to {}", request.msg_type()));

        timeout_at(deadline, send(&mut self.control, &self.session, request))
            .await
            .map_err(|_| no_reply())??;
        loop {
            let frames = timeout_at(deadline, self.control.recv())
                .await
                .map_err(|_| no_reply())?
                .map_err(KernelError::transport)?;
            let msg = parse(&self.session, frames)?;
            if msg.is_reply_to(request.msg_id()) {
                return Ok(msg);
            }
        }
    }

    async fn send_shell(&mut self, msg: &Message) -> Result<()> {
        send(&mut self.shell, &self.session, msg).await
    }

    /// Wait on the shell channel for the reply to `msg_id`; `None` on deadline.
    async fn recv_reply(&mut self, msg_id: &str, deadline: Instant) -> Result<Option<Message>> {
        loop {
            let frames = match timeout_at(deadline, self.shell.recv()).await {
                Ok(frames) => frames.map_err(KernelError::transport)?,
                Err(_) => return Ok(None),
            };
            let msg = parse(&self.session, frames)?;
            if msg.is_reply_to(msg_id) {
                return Ok(Some(msg));
            }
        }
    }

    async fn iopub_is_live(&mut self) -> Result<bool> {
        match timeout(IOPUB_PROBE_TIMEOUT, self.iopub.recv()).await {
            Ok(frames) => {
                parse(&self.session, frames.map_err(KernelError::transport)?)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}

async fn send(socket: &mut DealerSocket, session: &Session, msg: &Message) -> Result<()> {
    let frames = session.serialize(msg)?;
    let zmq_msg = ZmqMessage::try_from(frames).map_err(KernelError::transport)?;
    socket.send(zmq_msg).await.map_err(KernelError::transport)?;
    Ok(())
}

fn parse(session: &Session, msg: ZmqMessage) -> Result<Message> {
    let frames: Vec<Bytes> = msg.iter().cloned().collect();
    session.deserialize(&frames)
}

fn cell_reply(content: &Value) -> CellReply {
    let text = |key: &str| content.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let status = match content.get("status").and_then(Value::as_str) {
        Some("error") => ReplyStatus::Error {
            ename: text("ename"),
            evalue: text("evalue"),
            traceback: content
                .get("traceback")
                .and_then(Value::as_array)
                .map(|lines| lines.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default(),
        },
        Some("aborted") => ReplyStatus::Aborted,
        _ => ReplyStatus::Ok,
    };
    CellReply {
        status,
        execution_count: content.get("execution_count").and_then(Value::as_i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_reply_statuses() {
        let ok = cell_reply(&json!({"status": "ok", "execution_count": 2}));
        assert_eq!(ok, CellReply::ok(2));

        let err = cell_reply(&json!({
            "status": "error",
            "execution_count": 3,
            "ename": "ValueError",
            "evalue": "bad",
            "traceback": ["line 1", "line 2"]
        }));
        assert_eq!(
            err.status,
            ReplyStatus::Error {
                ename: "ValueError".into(),
                evalue: "bad".into(),
                traceback: vec!["line 1".into(), "line 2".into()],
            }
        );

        assert_eq!(cell_reply(&json!({"status": "aborted"})).status, ReplyStatus::Aborted);
    }
}
