//! Sentinel Link
//!
//! Short-lived connections to a single Sentinel or Redis node. A link is
//! opened per node per operation and dropped when the operation finishes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{Parser, RespValue, encode_command};

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-command timeout
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum reply buffer size
const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// One pod as reported by `SENTINEL MASTER` / `SENTINEL MASTERS`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterInfo {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub flags: String,
    pub quorum: u32,
    pub num_slaves: u32,
    pub num_other_sentinels: u32,
    /// Every field in reply order, including the ones above
    pub fields: Vec<(String, String)>,
}

impl MasterInfo {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        let name = name.into();
        let ip = ip.into();
        Self {
            fields: vec![
                ("name".to_string(), name.clone()),
                ("ip".to_string(), ip.clone()),
                ("port".to_string(), port.to_string()),
            ],
            name,
            ip,
            port,
            flags: "master".to_string(),
            ..Default::default()
        }
    }

    /// Build from the flat `[key, value, key, value, ...]` reply
    pub fn from_resp(addr: &str, value: &RespValue) -> Result<Self> {
        let items = match value {
            RespValue::Array(items) => items,
            _ => return Err(Error::protocol(addr, "expected array for master record")),
        };
        if items.len() % 2 != 0 {
            return Err(Error::protocol(addr, "odd number of fields in master record"));
        }

        let mut info = MasterInfo::default();
        for pair in items.chunks(2) {
            let (Some(key), Some(val)) = (pair[0].to_string_lossy(), pair[1].to_string_lossy())
            else {
                return Err(Error::protocol(addr, "non-string field in master record"));
            };

            match key.as_str() {
                "name" => info.name = val.clone(),
                "ip" => info.ip = val.clone(),
                "port" => info.port = val.parse().unwrap_or(0),
                "flags" => info.flags = val.clone(),
                "quorum" => info.quorum = val.parse().unwrap_or(0),
                "num-slaves" => info.num_slaves = val.parse().unwrap_or(0),
                "num-other-sentinels" => info.num_other_sentinels = val.parse().unwrap_or(0),
                _ => {}
            }
            info.fields.push((key, val));
        }

        if info.name.is_empty() {
            return Err(Error::protocol(addr, "master record has no name"));
        }
        Ok(info)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Summarized state derived from the flags field
    pub fn state(&self) -> &'static str {
        let has = |flag: &str| self.flags.split(',').any(|f| f == flag);
        if has("o_down") {
            "odown"
        } else if has("s_down") {
            "sdown"
        } else if has("disconnected") {
            "disconnected"
        } else {
            "ok"
        }
    }
}

/// A live connection to one node
#[async_trait]
pub trait SentinelLink: Send {
    /// `host:port` this link is connected to
    fn address(&self) -> &str;

    async fn ping(&mut self) -> Result<()>;

    async fn sentinel_monitor(&mut self, name: &str, host: &str, port: u16, quorum: u32)
    -> Result<()>;

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()>;

    /// Returns false when the sentinel did not know the pod
    async fn sentinel_remove(&mut self, pod: &str) -> Result<bool>;

    /// Returns the number of pods the sentinel reset
    async fn sentinel_reset(&mut self, pod: &str) -> Result<i64>;

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo>;

    async fn sentinel_masters(&mut self) -> Result<Vec<MasterInfo>>;
}

/// Opens links by address
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and, when a password is given, authenticate
    async fn dial(&self, addr: &str, password: Option<&str>) -> Result<Box<dyn SentinelLink>>;
}

/// TCP/RESP connector with explicit timeouts
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn dial(&self, addr: &str, password: Option<&str>) -> Result<Box<dyn SentinelLink>> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                return Err(Error::Connectivity {
                    addr: addr.to_string(),
                    source: e,
                });
            }
            Err(_) => {
                return Err(Error::Timeout {
                    addr: addr.to_string(),
                    after: self.connect_timeout,
                });
            }
        };
        stream.set_nodelay(true)?;

        let mut link = TcpLink {
            addr: addr.to_string(),
            stream,
            buffer: BytesMut::with_capacity(4096),
            command_timeout: self.command_timeout,
            broken: false,
        };

        if let Some(password) = password {
            match link.raw(&["AUTH", password]).await? {
                RespValue::Error(msg) => {
                    return Err(Error::Authentication {
                        addr: addr.to_string(),
                        message: String::from_utf8_lossy(&msg).into_owned(),
                    });
                }
                _ => log::debug!("authenticated with {}", addr),
            }
        }

        Ok(Box::new(link))
    }
}

/// RESP connection over TCP
pub struct TcpLink {
    addr: String,
    stream: TcpStream,
    buffer: BytesMut,
    command_timeout: Duration,
    /// Set once a reply may still be in flight; the link is unusable after that
    broken: bool,
}

impl TcpLink {
    /// Send a command and read one reply; error replies are returned as values
    async fn raw(&mut self, parts: &[&str]) -> Result<RespValue> {
        if self.broken {
            return Err(self.io_error(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link closed after an earlier failure",
            )));
        }

        let after = self.command_timeout;
        let result = match timeout(after, self.round_trip(parts)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                addr: self.addr.clone(),
                after,
            }),
        };
        if matches!(&result, Err(e) if e.is_connectivity()) {
            self.broken = true;
        }
        result
    }

    async fn round_trip(&mut self, parts: &[&str]) -> Result<RespValue> {
        let request = encode_command(parts);
        self.stream
            .write_all(&request)
            .await
            .map_err(|e| self.io_error(e))?;

        loop {
            match Parser::parse(&mut self.buffer) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => return Err(Error::protocol(&self.addr, e.to_string())),
            }

            if self.buffer.len() > MAX_BUFFER_SIZE {
                return Err(Error::protocol(&self.addr, "reply exceeds max buffer size"));
            }

            let n = self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .map_err(|e| self.io_error(e))?;
            if n == 0 {
                return Err(self.io_error(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
        }
    }

    /// Like `raw`, but error replies become errors
    async fn call(&mut self, parts: &[&str]) -> Result<RespValue> {
        match self.raw(parts).await? {
            RespValue::Error(msg) => Err(self.reply_error(&msg)),
            value => Ok(value),
        }
    }

    fn reply_error(&self, msg: &[u8]) -> Error {
        let message = String::from_utf8_lossy(msg).into_owned();
        if message.starts_with("NOAUTH") || message.starts_with("WRONGPASS") {
            Error::Authentication {
                addr: self.addr.clone(),
                message,
            }
        } else {
            Error::Protocol {
                addr: self.addr.clone(),
                message,
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Connectivity {
            addr: self.addr.clone(),
            source,
        }
    }

    fn expect_ok(&self, value: RespValue) -> Result<()> {
        if value.is_ok() {
            Ok(())
        } else {
            Err(Error::protocol(
                &self.addr,
                format!("expected OK, got {:?}", value),
            ))
        }
    }
}

fn is_no_such_master(msg: &[u8]) -> bool {
    String::from_utf8_lossy(msg)
        .to_ascii_lowercase()
        .contains("no such master")
}

#[async_trait]
impl SentinelLink for TcpLink {
    fn address(&self) -> &str {
        &self.addr
    }

    async fn ping(&mut self) -> Result<()> {
        match self.call(&["PING"]).await? {
            RespValue::SimpleString(s) if s.as_ref() == b"PONG" => Ok(()),
            other => Err(Error::protocol(
                &self.addr,
                format!("unexpected PING reply {:?}", other),
            )),
        }
    }

    async fn sentinel_monitor(
        &mut self,
        name: &str,
        host: &str,
        port: u16,
        quorum: u32,
    ) -> Result<()> {
        let port = port.to_string();
        let quorum = quorum.to_string();
        let reply = self
            .call(&["SENTINEL", "MONITOR", name, host, port.as_str(), quorum.as_str()])
            .await?;
        self.expect_ok(reply)
    }

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()> {
        let reply = self.call(&["SENTINEL", "SET", pod, key, value]).await?;
        self.expect_ok(reply)
    }

    async fn sentinel_remove(&mut self, pod: &str) -> Result<bool> {
        match self.raw(&["SENTINEL", "REMOVE", pod]).await? {
            RespValue::Error(msg) if is_no_such_master(&msg) => Ok(false),
            RespValue::Error(msg) => Err(self.reply_error(&msg)),
            reply => self.expect_ok(reply).map(|_| true),
        }
    }

    async fn sentinel_reset(&mut self, pod: &str) -> Result<i64> {
        let reply = self.call(&["SENTINEL", "RESET", pod]).await?;
        reply.as_int().ok_or_else(|| {
            Error::protocol(&self.addr, format!("unexpected RESET reply {:?}", reply))
        })
    }

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo> {
        match self.raw(&["SENTINEL", "MASTER", pod]).await? {
            RespValue::Error(msg) if is_no_such_master(&msg) => {
                Err(Error::NoSuchMaster(pod.to_string()))
            }
            RespValue::Error(msg) => Err(self.reply_error(&msg)),
            reply => MasterInfo::from_resp(&self.addr, &reply),
        }
    }

    async fn sentinel_masters(&mut self) -> Result<Vec<MasterInfo>> {
        match self.call(&["SENTINEL", "MASTERS"]).await? {
            RespValue::Array(items) => items
                .iter()
                .map(|item| MasterInfo::from_resp(&self.addr, item))
                .collect(),
            other => Err(Error::protocol(
                &self.addr,
                format!("unexpected MASTERS reply {:?}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn master_record(name: &str, flags: &str) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string("name"),
            RespValue::bulk_string(name),
            RespValue::bulk_string("ip"),
            RespValue::bulk_string("10.0.0.5"),
            RespValue::bulk_string("port"),
            RespValue::bulk_string("6379"),
            RespValue::bulk_string("flags"),
            RespValue::bulk_string(flags),
            RespValue::bulk_string("quorum"),
            RespValue::bulk_string("2"),
            RespValue::bulk_string("num-slaves"),
            RespValue::bulk_string("1"),
        ])
    }

    /// Serve one connection, answering each request with the next scripted reply
    async fn fake_node(replies: Vec<RespValue>) -> String {
        recording_node(replies).await.0
    }

    /// Like `fake_node`, also handing back every request it received
    async fn recording_node(
        replies: Vec<RespValue>,
    ) -> (String, mpsc::UnboundedReceiver<RespValue>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::with_capacity(1024);
            for reply in replies {
                // Wait for one full request
                let request = loop {
                    if let Some(request) = crate::protocol::Parser::parse(&mut buf).unwrap() {
                        break request;
                    }
                    if socket.read_buf(&mut buf).await.unwrap() == 0 {
                        return;
                    }
                };
                let _ = tx.send(request);
                socket.write_all(&reply.serialize()).await.unwrap();
            }
        });

        (addr, rx)
    }

    fn command(args: &[&str]) -> RespValue {
        RespValue::array(args.iter().map(|a| RespValue::bulk_string(a)).collect())
    }

    #[test]
    fn test_master_info_from_resp() {
        let info = MasterInfo::from_resp("a", &master_record("cache1", "master")).unwrap();

        assert_eq!(info.name, "cache1");
        assert_eq!(info.addr(), "10.0.0.5:6379");
        assert_eq!(info.quorum, 2);
        assert_eq!(info.num_slaves, 1);
        assert_eq!(info.fields.len(), 6);
        assert_eq!(info.state(), "ok");

        let info = MasterInfo::from_resp("a", &master_record("cache1", "master,s_down")).unwrap();
        assert_eq!(info.state(), "sdown");
        let info =
            MasterInfo::from_resp("a", &master_record("cache1", "master,s_down,o_down")).unwrap();
        assert_eq!(info.state(), "odown");
    }

    #[test]
    fn test_master_info_rejects_bad_shapes() {
        assert!(MasterInfo::from_resp("a", &RespValue::ok()).is_err());
        let odd = RespValue::array(vec![RespValue::bulk_string("name")]);
        assert!(MasterInfo::from_resp("a", &odd).is_err());
    }

    #[tokio::test]
    async fn test_tcp_link_ping_and_master() {
        let addr = fake_node(vec![RespValue::PONG, master_record("cache1", "master")]).await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        assert_eq!(link.address(), addr);
        link.ping().await.unwrap();
        let info = link.sentinel_master("cache1").await.unwrap();
        assert_eq!(info.name, "cache1");
    }

    #[tokio::test]
    async fn test_tcp_link_auth_rejected() {
        let addr = fake_node(vec![RespValue::error("ERR invalid password")]).await;

        let err = match TcpConnector::default().dial(&addr, Some("wrong")).await {
            Err(e) => e,
            Ok(_) => panic!("expected auth failure"),
        };
        assert!(matches!(err, Error::Authentication { .. }));
    }

    #[tokio::test]
    async fn test_tcp_link_remove_absent_pod() {
        let addr = fake_node(vec![
            RespValue::error("ERR No such master with that name"),
            RespValue::ok(),
        ])
        .await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        assert!(!link.sentinel_remove("ghost").await.unwrap());
        assert!(link.sentinel_remove("cache1").await.unwrap());
    }

    #[tokio::test]
    async fn test_tcp_link_rejected_command_is_protocol_error() {
        let addr = fake_node(vec![
            RespValue::error("ERR Unknown option or number of arguments for SENTINEL SET 'bogus'"),
            RespValue::error("ERR No such master with that name"),
        ])
        .await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        let err = link.sentinel_set("cache1", "bogus", "1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(!err.is_unreachable());

        let err = link.sentinel_master("ghost").await.unwrap_err();
        assert!(matches!(err, Error::NoSuchMaster(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_tcp_link_refused_is_connectivity() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = match TcpConnector::default().dial(&addr, None).await {
            Err(e) => e,
            Ok(_) => panic!("expected connect failure"),
        };
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_tcp_link_hung_node_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let connector = TcpConnector::new(Duration::from_secs(1), Duration::from_millis(100));
        let mut link = connector.dial(&addr, None).await.unwrap();
        let err = link.ping().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        let err = link.ping().await.unwrap_err();
        assert!(matches!(err, Error::Connectivity { .. }));
    }

    #[tokio::test]
    async fn test_tcp_link_monitor_sends_full_command() {
        let (addr, mut requests) = recording_node(vec![RespValue::ok()]).await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        link.sentinel_monitor("cache1", "10.0.0.5", 6379, 2)
            .await
            .unwrap();

        assert_eq!(
            requests.recv().await,
            Some(command(&["SENTINEL", "MONITOR", "cache1", "10.0.0.5", "6379", "2"]))
        );
    }

    #[tokio::test]
    async fn test_tcp_link_reset_returns_count() {
        let (addr, mut requests) =
            recording_node(vec![RespValue::Integer(1), RespValue::ok()]).await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        assert_eq!(link.sentinel_reset("cache1").await.unwrap(), 1);
        assert_eq!(
            requests.recv().await,
            Some(command(&["SENTINEL", "RESET", "cache1"]))
        );

        let err = link.sentinel_reset("cache1").await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_tcp_link_masters_lists_every_pod() {
        let addr = fake_node(vec![RespValue::array(vec![
            master_record("cache1", "master"),
            master_record("cache2", "master,s_down"),
        ])])
        .await;

        let mut link = TcpConnector::default().dial(&addr, None).await.unwrap();
        let masters = link.sentinel_masters().await.unwrap();

        let names: Vec<_> = masters.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["cache1", "cache2"]);
        assert_eq!(masters[1].state(), "sdown");
        assert!(masters.iter().all(|m| m.addr() == "10.0.0.5:6379"));
    }
}
