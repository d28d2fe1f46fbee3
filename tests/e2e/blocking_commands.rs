// E2E tests for BLPOP / BRPOP wake-ups, ordering and timeouts

mod common;

use common::{exec_cmd, TestRedisServer};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

type Popped = Option<(String, String)>;

async fn spawn_pop(server: &TestRedisServer, cmd: &'static str, args: Vec<&'static str>) -> JoinHandle<Popped> {
    let mut conn = server.get_async_connection().await.unwrap();
    tokio::spawn(async move { exec_cmd(&mut conn, cmd, &args).await.unwrap() })
}

#[tokio::test]
async fn test_blpop_wakes_on_push() {
    let server = TestRedisServer::start().await;
    let waiter = spawn_pop(&server, "BLPOP", vec!["jobs", "0"]).await;
    server.wait_blocked(1).await;

    let mut conn = server.get_async_connection().await.unwrap();
    let len: i64 = exec_cmd(&mut conn, "RPUSH", &["jobs", "j1"]).await.unwrap();
    assert_eq!(len, 1);

    let popped = waiter.await.unwrap();
    assert_eq!(popped, Some(("jobs".to_string(), "j1".to_string())));

    let len: i64 = exec_cmd(&mut conn, "LLEN", &["jobs"]).await.unwrap();
    assert_eq!(len, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_waiters_served_in_arrival_order() {
    let server = TestRedisServer::start().await;

    let first = spawn_pop(&server, "BLPOP", vec!["q", "0"]).await;
    server.wait_blocked(1).await;
    let second = spawn_pop(&server, "BLPOP", vec!["q", "0"]).await;
    server.wait_blocked(2).await;
    let third = spawn_pop(&server, "BLPOP", vec!["q", "0"]).await;
    server.wait_blocked(3).await;

    let mut conn = server.get_async_connection().await.unwrap();
    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["q", "a", "b"]).await.unwrap();

    assert_eq!(first.await.unwrap(), Some(("q".to_string(), "a".to_string())));
    assert_eq!(second.await.unwrap(), Some(("q".to_string(), "b".to_string())));
    server.wait_blocked(1).await;

    let _: i64 = exec_cmd(&mut conn, "LPUSH", &["q", "c"]).await.unwrap();
    assert_eq!(third.await.unwrap(), Some(("q".to_string(), "c".to_string())));

    server.stop().await;
}

#[tokio::test]
async fn test_blpop_times_out_with_nil() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let start = Instant::now();
    let popped: Popped = exec_cmd(&mut conn, "BLPOP", &["empty", "1"]).await.unwrap();
    assert_eq!(popped, None);
    assert!(start.elapsed() >= Duration::from_millis(900));
    assert_eq!(server.ctx.blocking.blocked_count(), 0);

    // the connection is usable again afterwards
    let pong: String = exec_cmd(&mut conn, "PING", &[]).await.unwrap();
    assert_eq!(pong, "PONG");

    server.stop().await;
}

#[tokio::test]
async fn test_brpop_multiple_keys() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["b", "1", "2"]).await.unwrap();
    let popped: Popped = exec_cmd(&mut conn, "BRPOP", &["a", "b", "0"]).await.unwrap();
    assert_eq!(popped, Some(("b".to_string(), "2".to_string())));

    let waiter = spawn_pop(&server, "BRPOP", vec!["x", "y", "0"]).await;
    server.wait_blocked(1).await;
    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["y", "last"]).await.unwrap();
    assert_eq!(waiter.await.unwrap(), Some(("y".to_string(), "last".to_string())));
    assert_eq!(server.ctx.blocking.queue_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_closed_waiter_does_not_consume() {
    let server = TestRedisServer::start().await;

    let gone = spawn_pop(&server, "BLPOP", vec!["q", "0"]).await;
    server.wait_blocked(1).await;
    let stays = spawn_pop(&server, "BLPOP", vec!["q", "0"]).await;
    server.wait_blocked(2).await;

    gone.abort();
    server.wait_blocked(1).await;

    let mut conn = server.get_async_connection().await.unwrap();
    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["q", "only"]).await.unwrap();
    assert_eq!(stays.await.unwrap(), Some(("q".to_string(), "only".to_string())));

    let len: i64 = exec_cmd(&mut conn, "LLEN", &["q"]).await.unwrap();
    assert_eq!(len, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_block_timeout_validation() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let err = exec_cmd::<Popped>(&mut conn, "BLPOP", &["q", "-1"]).await.unwrap_err();
    assert!(err.to_string().contains("timeout can't be a negative value"));

    let err = exec_cmd::<Popped>(&mut conn, "BLPOP", &["q", "soon"]).await.unwrap_err();
    assert!(err.to_string().contains("not an integer"));
    assert_eq!(server.ctx.blocking.blocked_count(), 0);

    server.stop().await;
}
