use crate::domain::ports::SocketTable;
use crate::utils::error::{Result, WardenError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const TCP_LISTEN: u8 = 0x0A;

fn malformed(reason: String) -> WardenError {
    WardenError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, reason))
}

/// Parses `/proc/net/tcp` or `/proc/net/tcp6`, returning the local port of
/// every socket in `LISTEN` state.
pub fn parse_proc_net_tcp(content: &str) -> Result<Vec<u16>> {
    let mut ports = Vec::new();

    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }

        // local_address -> "0100007F:1F90"
        let local_addr = parts[1];
        let state = u8::from_str_radix(parts[3], 16)
            .map_err(|e| malformed(format!("bad socket state '{}': {}", parts[3], e)))?;
        if state != TCP_LISTEN {
            continue;
        }

        let (_ip, port_hex) = local_addr
            .rsplit_once(':')
            .ok_or_else(|| malformed(format!("bad local address '{}'", local_addr)))?;
        let port = u16::from_str_radix(port_hex, 16)
            .map_err(|e| malformed(format!("bad port '{}': {}", port_hex, e)))?;
        ports.push(port);
    }

    Ok(ports)
}

/// Parses netstat output from either `netstat -lnt` (Linux, `0.0.0.0:8080`)
/// or `netstat -an -p tcp` (BSD/macOS, `*.8080`, `127.0.0.1.5432`).
/// Only rows in `LISTEN` state are kept.
pub fn parse_netstat_output(output: &str) -> Vec<u16> {
    output
        .lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [.., local, _foreign, "LISTEN"] => Some(*local),
                _ => None,
            }
        })
        // BSD 用 '.' 分隔 port，Linux 用 ':'
        .filter_map(|local| local.rsplit_once(|c: char| c == ':' || c == '.'))
        .filter_map(|(_, port)| port.parse::<u16>().ok())
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProcNetTcp {
    paths: Vec<PathBuf>,
}

impl ProcNetTcp {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl Default for ProcNetTcp {
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from("/proc/net/tcp"),
            PathBuf::from("/proc/net/tcp6"),
        ])
    }
}

#[async_trait]
impl SocketTable for ProcNetTcp {
    async fn listening_ports(&self) -> Result<Vec<u16>> {
        let mut ports = Vec::new();
        for path in &self.paths {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                // 沒有 IPv6 的主機不會有 tcp6
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            ports.extend(parse_proc_net_tcp(&content)?);
        }
        Ok(ports)
    }
}

#[derive(Debug, Clone)]
pub struct Netstat {
    program: String,
    args: Vec<String>,
}

impl Netstat {
    pub fn new(program: impl Into<String>) -> Self {
        let args: &[&str] = if cfg!(target_os = "linux") {
            &["-lnt"]
        } else {
            &["-an", "-p", "tcp"]
        };
        Self::with_args(program, args.iter().map(|a| a.to_string()).collect())
    }

    pub fn with_args(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for Netstat {
    fn default() -> Self {
        Self::new("netstat")
    }
}

#[async_trait]
impl SocketTable for Netstat {
    async fn listening_ports(&self) -> Result<Vec<u16>> {
        let output = Command::new(&self.program).args(&self.args).output().await?;
        if !output.status.success() {
            return Err(malformed(format!(
                "{} {} exited with {}",
                self.program,
                self.args.join(" "),
                output.status
            )));
        }
        Ok(parse_netstat_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// procfs when the host has it, netstat otherwise.
#[derive(Debug, Clone)]
pub enum SystemSocketTable {
    Proc(ProcNetTcp),
    Netstat(Netstat),
}

impl SystemSocketTable {
    pub fn detect() -> Self {
        if Path::new("/proc/net/tcp").exists() {
            SystemSocketTable::Proc(ProcNetTcp::default())
        } else {
            SystemSocketTable::Netstat(Netstat::default())
        }
    }
}

#[async_trait]
impl SocketTable for SystemSocketTable {
    async fn listening_ports(&self) -> Result<Vec<u16>> {
        match self {
            SystemSocketTable::Proc(table) => table.listening_ports().await,
            SystemSocketTable::Netstat(table) => table.listening_ports().await,
        }
    }
}
