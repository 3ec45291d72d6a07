//! rediskit CLI
//!
//! Connects every instance configured through `REDIS_*` variables (or a
//! `.env` file) and runs one command against the selected instance.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rediskit::{configs_from_env, Redis, Registry, Ttl, DEFAULT_INSTANCE};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rediskit")]
#[command(about = "Run commands against named Redis instances")]
struct Args {
    /// Instance to run the command against
    #[arg(short, long, global = true, default_value = DEFAULT_INSTANCE)]
    instance: String,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected instances
    Instances,
    /// Ping the instance
    Ping,
    Get {
        key: String,
    },
    /// Set a value (one-day expiry unless --ttl is given)
    Set {
        key: String,
        value: String,
        /// Expiry in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    Del {
        key: String,
    },
    Ttl {
        key: String,
    },
    /// Print a hash as a JSON object
    Hgetall {
        key: String,
    },
    Hset {
        key: String,
        field: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.json_logs)?;

    let configs = configs_from_env();
    info!(instances = configs.len(), "Connecting Redis instances");

    let registry = match Registry::from_configs(&configs).await {
        Ok(registry) => registry,
        Err(err) if err.is_fatal() => {
            error!("{err}");
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    if let Command::Instances = args.command {
        for name in registry.names() {
            let client = registry.client_named(name);
            println!("{name}\t{:?}\t{}", client.mode(), client.address());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let redis = Redis::new(registry.try_client(&args.instance)?);
    run(&redis, args.command).await?;

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("rediskit=info".parse()?);

    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries command output only
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
    Ok(())
}

async fn run(redis: &Redis, command: Command) -> Result<()> {
    match command {
        Command::Instances => {}
        Command::Ping => {
            redis.client().ping().await?;
            println!("PONG");
        }
        Command::Get { key } => match redis.get(&key).await? {
            Some(value) => println!("{value}"),
            None => println!("(nil)"),
        },
        Command::Set { key, value, ttl } => {
            match ttl {
                Some(secs) => redis.set_ex(&key, &value, Duration::from_secs(secs)).await?,
                None => redis.set(&key, &value).await?,
            }
            println!("OK");
        }
        Command::Del { key } => {
            println!("{}", u8::from(redis.del(&key).await?));
        }
        Command::Ttl { key } => match redis.ttl(&key).await? {
            Ttl::Expires(left) => println!("{}", left.as_secs()),
            Ttl::Persistent => println!("-1 (no expiry)"),
            Ttl::Missing => println!("-2 (no such key)"),
        },
        Command::Hgetall { key } => match redis.hgetall_map(&key).await {
            Ok(fields) => {
                let sorted: std::collections::BTreeMap<_, _> = fields.into_iter().collect();
                println!("{}", serde_json::to_string_pretty(&sorted)?);
            }
            Err(err) if err.is_no_data() => println!("(empty)"),
            Err(err) => return Err(err.into()),
        },
        Command::Hset { key, field, value } => {
            redis.hset(&key, &field, value).await?;
            println!("OK");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_with_ttl() {
        let args = Args::try_parse_from(["rediskit", "-i", "cache", "set", "k", "v", "--ttl", "60"])
            .unwrap();

        assert_eq!(args.instance, "cache");
        match args.command {
            Command::Set { key, value, ttl } => {
                assert_eq!(key, "k");
                assert_eq!(value, "v");
                assert_eq!(ttl, Some(60));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_instance_defaults_to_default() {
        let args = Args::try_parse_from(["rediskit", "ttl", "session:1"]).unwrap();
        assert_eq!(args.instance, DEFAULT_INSTANCE);
        assert!(!args.json_logs);
        assert!(matches!(args.command, Command::Ttl { ref key } if key == "session:1"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["rediskit", "ping", "--json-logs", "--instance", "queue"])
            .unwrap();
        assert!(args.json_logs);
        assert_eq!(args.instance, "queue");
    }
}
