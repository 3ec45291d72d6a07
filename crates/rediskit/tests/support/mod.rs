//! In-process RESP server with scripted replies.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rediskit::RedisConfig;

/// Unroutable address used for connect failures
pub const UNREACHABLE: &str = "127.0.0.1:1";

pub enum Reply {
    Simple(&'static str),
    Bulk(Option<String>),
    Integer(i64),
    Array(Vec<String>),
    /// Array of bulk-string arrays, as `SENTINEL MASTERS` answers
    Nested(Vec<Vec<String>>),
    Error(&'static str),
}

type Handler = dyn Fn(&[String]) -> Option<Reply> + Send + Sync;

pub struct FakeRedis {
    addr: String,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeRedis {
    /// Serve with default replies only.
    pub fn start() -> Self {
        Self::with_handler(|_| None)
    }

    /// Serve with `handler` first; `None` falls back to the default reply.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&[String]) -> Option<Reply> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = Arc::clone(&commands);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let recorded = Arc::clone(&recorded);
                let handler = Arc::clone(&handler);
                thread::spawn(move || serve(stream, &recorded, handler.as_ref()));
            }
        });

        Self { addr, commands }
    }

    pub fn address(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> RedisConfig {
        RedisConfig {
            max_retries: 1,
            dial_timeout: 1,
            read_timeout: 2,
            ..RedisConfig::new(self.addr.clone())
        }
    }

    /// Every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().expect("commands").clone()
    }

    /// Received commands whose name is `name`.
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args.first().is_some_and(|cmd| cmd.eq_ignore_ascii_case(name)))
            .collect()
    }
}

/// Config for an instance nothing listens on.
pub fn unreachable_config() -> RedisConfig {
    RedisConfig {
        max_retries: 1,
        dial_timeout: 1,
        ..RedisConfig::new(UNREACHABLE)
    }
}

fn serve(stream: TcpStream, recorded: &Mutex<Vec<Vec<String>>>, handler: &Handler) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
    let mut writer = stream.try_clone().expect("clone");
    let mut reader = BufReader::new(stream);

    while let Ok(Some(args)) = read_command(&mut reader) {
        recorded.lock().expect("commands").push(args.clone());
        let reply = handler(&args).unwrap_or_else(|| default_reply(&args));
        if write_reply(&mut writer, &reply).is_err() {
            break;
        }
    }
}

fn default_reply(args: &[String]) -> Reply {
    match args.first().map(|cmd| cmd.to_ascii_uppercase()).as_deref() {
        Some("PING") => Reply::Simple("PONG"),
        Some("GET" | "HGET" | "LPOP" | "RPOP") => Reply::Bulk(None),
        Some("HGETALL") => Reply::Array(Vec::new()),
        Some("EXPIRE" | "EXISTS" | "HEXISTS") => Reply::Integer(1),
        Some("HSET") => Reply::Integer(count(args.len().saturating_sub(2) / 2)),
        Some("DEL") => Reply::Integer(count(args.len().saturating_sub(1))),
        Some("HDEL" | "SADD" | "LPUSH" | "RPUSH") => {
            Reply::Integer(count(args.len().saturating_sub(2)))
        }
        Some("TTL") => Reply::Integer(-2),
        Some("ROLE") => Reply::Array(vec!["master".to_string()]),
        _ => Reply::Simple("OK"),
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<String>>> {
    let Some(header) = read_line(reader)? else {
        return Ok(None);
    };
    let count: usize = header
        .strip_prefix('*')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| invalid("expected array"))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_line(reader)?.ok_or_else(|| invalid("eof"))?;
        let len: usize = line
            .strip_prefix('$')
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| invalid("expected bulk"))?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        data.truncate(len);
        args.push(String::from_utf8_lossy(&data).into_owned());
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn write_reply(stream: &mut TcpStream, reply: &Reply) -> std::io::Result<()> {
    let mut out = String::new();
    encode(&mut out, reply);
    stream.write_all(out.as_bytes())?;
    stream.flush()
}

fn encode(out: &mut String, reply: &Reply) {
    match reply {
        Reply::Simple(msg) => out.push_str(&format!("+{msg}\r\n")),
        Reply::Error(msg) => out.push_str(&format!("-{msg}\r\n")),
        Reply::Integer(value) => out.push_str(&format!(":{value}\r\n")),
        Reply::Bulk(None) => out.push_str("$-1\r\n"),
        Reply::Bulk(Some(data)) => out.push_str(&format!("${}\r\n{data}\r\n", data.len())),
        Reply::Array(items) => {
            out.push_str(&format!("*{}\r\n", items.len()));
            for item in items {
                encode(out, &Reply::Bulk(Some(item.clone())));
            }
        }
        Reply::Nested(rows) => {
            out.push_str(&format!("*{}\r\n", rows.len()));
            for row in rows {
                encode(out, &Reply::Array(row.clone()));
            }
        }
    }
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}
