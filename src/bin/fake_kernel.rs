//! Scripted Jupyter kernel used by the integration tests.
//!
//! Speaks the real wire protocol over the ports of the connection file passed
//! with `-f`, but instead of Python it understands one statement per line:
//!
//! - `print(x)` writes `x` to stdout
//! - `raise Name()` fails the cell with `Name`
//! - `sleep(n)` blocks for `n` seconds unless interrupted
//! - `cwd()` prints the working directory
//! - `exit()` kills the process without replying
//!
//! Anything else runs silently.
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Value, json};
use zeromq::{PubSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use nbrun::kernel::connection::ConnectionInfo;
use nbrun::kernel::message::{DELIMITER, Message, PROTOCOL_VERSION, Session};
use nbrun::{KernelError, Result};

/// An inbound request plus the routing identities to answer it on.
struct Request {
    identities: Vec<Bytes>,
    message: Message,
}

struct FakeKernel {
    session: Session,
    shell: RouterSocket,
    control: RouterSocket,
    iopub: PubSocket,
    execution_count: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let path = connection_file()?;
    let text = std::fs::read_to_string(&path)?;
    let info: ConnectionInfo = serde_json::from_str(&text).map_err(KernelError::protocol)?;

    let mut kernel = FakeKernel::bind(&info).await?;
    kernel.serve().await
}

fn connection_file() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-f" {
            if let Some(path) = args.next() {
                return Ok(PathBuf::from(path));
            }
        }
    }
    Err(KernelError::Launch {
        name: "fake".into(),
        reason: "usage: nbrun-fake-kernel -f <connection_file>".into(),
    }
    .into())
}

impl FakeKernel {
    async fn bind(info: &ConnectionInfo) -> Result<Self> {
        let mut shell = RouterSocket::new();
        shell
            .bind(&info.endpoint(info.shell_port))
            .await
            .map_err(KernelError::transport)?;
        let mut control = RouterSocket::new();
        control
            .bind(&info.endpoint(info.control_port))
            .await
            .map_err(KernelError::transport)?;
        let mut iopub = PubSocket::new();
        iopub
            .bind(&info.endpoint(info.iopub_port))
            .await
            .map_err(KernelError::transport)?;

        Ok(Self {
            session: Session::new(&info.key),
            shell,
            control,
            iopub,
            execution_count: 0,
        })
    }

    /// Answer shell and control requests until asked to shut down.
    async fn serve(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                frames = self.shell.recv() => {
                    let request = parse(&self.session, frames.map_err(KernelError::transport)?)?;
                    self.handle_shell(request).await?;
                }
                frames = self.control.recv() => {
                    let request = parse(&self.session, frames.map_err(KernelError::transport)?)?;
                    if self.handle_control(request).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_shell(&mut self, request: Request) -> Result<()> {
        let parent = &request.message;
        self.publish(parent, "status", json!({"execution_state": "busy"})).await?;

        match parent.msg_type() {
            "kernel_info_request" => {
                let content = json!({
                    "status": "ok",
                    "protocol_version": PROTOCOL_VERSION,
                    "implementation": "nbrun-fake-kernel",
                    "language_info": {"name": "fake-python", "file_extension": ".py"},
                });
                reply(&mut self.shell, &self.session, &request, "kernel_info_reply", content).await?;
            }
            "execute_request" => {
                self.execution_count += 1;
                let code = parent.content_str("code").unwrap_or_default().to_string();
                let input = json!({"code": code, "execution_count": self.execution_count});
                self.publish(parent, "execute_input", input).await?;

                let content = self.run(parent, &code).await?;
                reply(&mut self.shell, &self.session, &request, "execute_reply", content).await?;
            }
            _ => {}
        }

        self.publish(parent, "status", json!({"execution_state": "idle"})).await
    }

    /// Returns true when the kernel should exit.
    async fn handle_control(&mut self, request: Request) -> Result<bool> {
        match request.message.msg_type() {
            "interrupt_request" => {
                reply(&mut self.control, &self.session, &request, "interrupt_reply", json!({"status": "ok"})).await?;
                Ok(false)
            }
            "shutdown_request" => {
                let content = json!({"status": "ok", "restart": false});
                reply(&mut self.control, &self.session, &request, "shutdown_reply", content).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Execute `code` line by line and build the `execute_reply` content.
    async fn run(&mut self, parent: &Message, code: &str) -> Result<Value> {
        for line in code.lines().map(str::trim) {
            if let Some(arg) = call(line, "print") {
                self.print(parent, arg).await?;
            } else if line == "cwd()" {
                let dir = std::env::current_dir()?;
                self.print(parent, &dir.to_string_lossy()).await?;
            } else if let Some(name) = line.strip_prefix("raise ").and_then(|s| s.strip_suffix("()")) {
                return self.fail(parent, name).await;
            } else if let Some(secs) = call(line, "sleep") {
                let secs = secs.parse().unwrap_or(0);
                if self.sleep(Duration::from_secs(secs)).await? {
                    return self.fail(parent, "KeyboardInterrupt").await;
                }
            } else if line == "exit()" {
                std::process::exit(1);
            }
        }
        Ok(json!({
            "status": "ok",
            "execution_count": self.execution_count,
            "user_expressions": {},
            "payload": [],
        }))
    }

    async fn print(&mut self, parent: &Message, text: &str) -> Result<()> {
        let content = json!({"name": "stdout", "text": format!("{text}\n")});
        self.publish(parent, "stream", content).await
    }

    async fn fail(&mut self, parent: &Message, ename: &str) -> Result<Value> {
        let traceback = vec![
            "Traceback (most recent call last):".to_string(),
            format!("{ename}: "),
        ];
        let error = json!({"ename": ename, "evalue": "", "traceback": traceback});
        self.publish(parent, "error", error).await?;
        Ok(json!({
            "status": "error",
            "execution_count": self.execution_count,
            "ename": ename,
            "evalue": "",
            "traceback": traceback,
        }))
    }

    /// Sleep while still serving control. Returns true if interrupted.
    async fn sleep(&mut self, duration: Duration) -> Result<bool> {
        let timer = tokio::time::sleep(duration);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => return Ok(false),
                frames = self.control.recv() => {
                    let request = parse(&self.session, frames.map_err(KernelError::transport)?)?;
                    let interrupted = request.message.msg_type() == "interrupt_request";
                    if self.handle_control(request).await? {
                        std::process::exit(0);
                    }
                    if interrupted {
                        return Ok(true);
                    }
                }
            }
        }
    }

    async fn publish(&mut self, parent: &Message, msg_type: &str, content: Value) -> Result<()> {
        let msg = self.session.reply(parent, msg_type, content);
        let mut frames = vec![Bytes::from(format!("kernel.fake.{msg_type}"))];
        frames.extend(self.session.serialize(&msg)?);
        send(&mut self.iopub, frames).await
    }
}

/// Argument of a one-argument call such as `print(x)`, quotes stripped.
fn call<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let arg = line.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(arg.trim_matches(|c| c == '"' || c == '\''))
}

fn parse(session: &Session, msg: ZmqMessage) -> Result<Request> {
    let frames: Vec<Bytes> = msg.iter().cloned().collect();
    let split = frames
        .iter()
        .position(|f| f.as_ref() == DELIMITER)
        .unwrap_or_default();
    Ok(Request {
        identities: frames[..split].to_vec(),
        message: session.deserialize(&frames)?,
    })
}

async fn reply(
    socket: &mut RouterSocket,
    session: &Session,
    request: &Request,
    msg_type: &str,
    content: Value,
) -> Result<()> {
    let msg = session.reply(&request.message, msg_type, content);
    let mut frames = request.identities.clone();
    frames.extend(session.serialize(&msg)?);
    send(socket, frames).await
}

async fn send<S: SocketSend>(socket: &mut S, frames: Vec<Bytes>) -> Result<()> {
    let msg = ZmqMessage::try_from(frames).map_err(KernelError::transport)?;
    socket.send(msg).await.map_err(KernelError::transport)?;
    Ok(())
}
