//! Connection info shared with a launched kernel through its connection file.
use std::io::Write;
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Result;

pub const SIGNATURE_SCHEME: &str = "hmac-sha256";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub transport: String,
    pub ip: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
    pub key: String,
    pub signature_scheme: String,
    pub kernel_name: String,
}

impl ConnectionInfo {
    /// Fresh loopback ports and a random signing key.
    pub fn allocate(kernel_name: &str) -> Result<Self> {
        let [shell, iopub, stdin, control, hb] = free_ports()?;
        Ok(Self {
            transport: "tcp".into(),
            ip: Ipv4Addr::LOCALHOST.to_string(),
            shell_port: shell,
            iopub_port: iopub,
            stdin_port: stdin,
            control_port: control,
            hb_port: hb,
            key: uuid::Uuid::new_v4().to_string(),
            signature_scheme: SIGNATURE_SCHEME.into(),
            kernel_name: kernel_name.into(),
        })
    }

    pub fn endpoint(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }

    /// Write the connection file; it is removed when the handle is dropped.
    pub fn write_file(&self, dir: Option<&Path>) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("kernel-").suffix(".json");
        let mut file = match dir {
            Some(d) => builder.tempfile_in(d)?,
            None => builder.tempfile()?,
        };
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

/// Bind all five listeners before releasing any so the ports are distinct.
fn free_ports() -> Result<[u16; 5]> {
    let listeners = (0..5)
        .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)))
        .collect::<std::io::Result<Vec<_>>>()?;
    let mut ports = [0u16; 5];
    for (slot, listener) in ports.iter_mut().zip(&listeners) {
        *slot = listener.local_addr()?.port();
    }
    Ok(ports)
}
