mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rediskit::{ConnectionMode, Error, Redis, RedisClient, RedisConfig};
use support::{FakeRedis, Reply};
use tokio_test::{assert_err, assert_ok};

const MASTER: &str = "mymaster";

/// Sentinel that reports whatever address `master` currently holds.
fn sentinel(master: Arc<Mutex<String>>) -> FakeRedis {
    FakeRedis::with_handler(move |args| {
        if !args[0].eq_ignore_ascii_case("SENTINEL") {
            return None;
        }
        let addr = master.lock().unwrap().clone();
        let (ip, port) = addr.rsplit_once(':').unwrap();
        match args.get(1).map(|sub| sub.to_ascii_uppercase()).as_deref() {
            Some("MASTERS") => Some(Reply::Nested(vec![vec![
                "name".into(),
                MASTER.into(),
                "ip".into(),
                ip.into(),
                "port".into(),
                port.into(),
                "flags".into(),
                "master".into(),
            ]])),
            Some("GET-MASTER-ADDR-BY-NAME") => Some(Reply::Array(vec![ip.into(), port.into()])),
            _ => None,
        }
    })
}

/// Master that turns into a replica once `demoted` is set.
fn demotable_master(demoted: Arc<AtomicBool>) -> FakeRedis {
    FakeRedis::with_handler(move |args| {
        if !demoted.load(Ordering::SeqCst) {
            return None;
        }
        match args[0].to_ascii_uppercase().as_str() {
            "ROLE" => Some(Reply::Array(vec!["slave".into()])),
            "SET" => Some(Reply::Error(
                "READONLY You can't write against a read only replica.",
            )),
            _ => None,
        }
    })
}

fn sentinel_config(sentinel: &FakeRedis) -> RedisConfig {
    RedisConfig {
        max_retries: 1,
        dial_timeout: 1,
        read_timeout: 2,
        ..RedisConfig::sentinel(MASTER, [sentinel.address()])
    }
}

#[tokio::test]
async fn resolves_master_through_sentinel() {
    let master = FakeRedis::start();
    let sentinel = sentinel(Arc::new(Mutex::new(master.address().to_string())));

    let client = assert_ok!(RedisClient::open("default", &sentinel_config(&sentinel)).await);
    assert_eq!(client.mode(), ConnectionMode::Sentinel);
    assert_ok!(client.ping().await);

    assert!(!master.commands_named("PING").is_empty());
}

#[tokio::test]
async fn follows_master_after_failover() {
    let demoted = Arc::new(AtomicBool::new(false));
    let old_master = demotable_master(Arc::clone(&demoted));
    let new_master = FakeRedis::start();
    let current = Arc::new(Mutex::new(old_master.address().to_string()));
    let sentinel = sentinel(Arc::clone(&current));

    let client = assert_ok!(RedisClient::open("default", &sentinel_config(&sentinel)).await);
    let redis = Redis::new(Arc::new(client));
    assert_ok!(redis.set("order:1", "placed").await);

    demoted.store(true, Ordering::SeqCst);
    *current.lock().unwrap() = new_master.address().to_string();

    let err = assert_err!(redis.set("order:1", "paid").await);
    assert!(matches!(err, Error::Redis(_)), "{err}");
    assert!(err.to_string().contains("READONLY"), "{err}");

    assert_ok!(redis.set("order:1", "shipped").await);

    let old_sets = old_master.commands_named("SET");
    let new_sets = new_master.commands_named("SET");
    assert_eq!(old_sets.len(), 2);
    assert_eq!(new_sets.len(), 1);
    assert_eq!(new_sets[0][2], "shipped");
    assert_eq!(redis.client().mode(), ConnectionMode::Sentinel);
}

#[tokio::test]
async fn unchanged_master_keeps_connection() {
    let master = FakeRedis::with_handler(|args| {
        (args[0] == "SET").then_some(Reply::Error("READONLY read only replica"))
    });
    let sentinel = sentinel(Arc::new(Mutex::new(master.address().to_string())));

    let client = assert_ok!(RedisClient::open("default", &sentinel_config(&sentinel)).await);
    let redis = Redis::new(Arc::new(client));

    assert_err!(redis.set("order:1", "paid").await);
    assert_err!(redis.set("order:1", "paid").await);

    assert_eq!(master.commands_named("SET").len(), 2);
}
