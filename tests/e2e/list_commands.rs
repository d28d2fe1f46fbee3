// E2E tests for list commands over a real socket

mod common;

use common::{exec_cmd, TestRedisServer};

#[tokio::test]
async fn test_push_len_range() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let len: i64 = redis::cmd("LPUSH")
        .arg("mylist")
        .arg("World")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(len, 1);

    let len: i64 = exec_cmd(&mut conn, "LPUSH", &["mylist", "Hello"]).await.unwrap();
    assert_eq!(len, 2);

    let len: i64 = exec_cmd(&mut conn, "RPUSH", &["mylist", "!", "?"]).await.unwrap();
    assert_eq!(len, 4);

    let values: Vec<String> = redis::cmd("LRANGE")
        .arg("mylist")
        .arg(0)
        .arg(-1)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(values, vec!["Hello", "World", "!", "?"]);

    let len: i64 = exec_cmd(&mut conn, "LLEN", &["mylist"]).await.unwrap();
    assert_eq!(len, 4);

    server.stop().await;
}

#[tokio::test]
async fn test_pushx_on_missing_key() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let len: i64 = exec_cmd(&mut conn, "LPUSHX", &["nolist", "a"]).await.unwrap();
    assert_eq!(len, 0);
    let len: i64 = exec_cmd(&mut conn, "RPUSHX", &["nolist", "a"]).await.unwrap();
    assert_eq!(len, 0);

    let exists: i64 = exec_cmd(&mut conn, "EXISTS", &["nolist"]).await.unwrap();
    assert_eq!(exists, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_pop_with_count() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["l", "a", "b", "c", "d"]).await.unwrap();

    let head: String = exec_cmd(&mut conn, "LPOP", &["l"]).await.unwrap();
    assert_eq!(head, "a");
    let tail: Vec<String> = exec_cmd(&mut conn, "RPOP", &["l", "2"]).await.unwrap();
    assert_eq!(tail, vec!["d", "c"]);

    let last: Option<String> = exec_cmd(&mut conn, "LPOP", &["l"]).await.unwrap();
    assert_eq!(last, Some("b".to_string()));
    let empty: Option<String> = exec_cmd(&mut conn, "LPOP", &["l"]).await.unwrap();
    assert_eq!(empty, None);

    let ty: String = exec_cmd(&mut conn, "TYPE", &["l"]).await.unwrap();
    assert_eq!(ty, "none");

    server.stop().await;
}

#[tokio::test]
async fn test_lindex_lset_errors() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["l", "x", "y"]).await.unwrap();

    let v: Option<String> = exec_cmd(&mut conn, "LINDEX", &["l", "-1"]).await.unwrap();
    assert_eq!(v, Some("y".to_string()));
    let v: Option<String> = exec_cmd(&mut conn, "LINDEX", &["l", "9"]).await.unwrap();
    assert_eq!(v, None);

    let _: () = exec_cmd(&mut conn, "LSET", &["l", "0", "z"]).await.unwrap();
    let err = exec_cmd::<()>(&mut conn, "LSET", &["l", "5", "z"]).await.unwrap_err();
    assert!(err.to_string().contains("index out of range"));
    let err = exec_cmd::<()>(&mut conn, "LSET", &["missing", "0", "z"]).await.unwrap_err();
    assert!(err.to_string().contains("no such key"));

    server.stop().await;
}

#[tokio::test]
async fn test_ltrim_lrem_linsert() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["l", "a", "b", "a", "c", "a"]).await.unwrap();

    let removed: i64 = exec_cmd(&mut conn, "LREM", &["l", "-2", "a"]).await.unwrap();
    assert_eq!(removed, 2);

    let len: i64 = exec_cmd(&mut conn, "LINSERT", &["l", "BEFORE", "c", "x"]).await.unwrap();
    assert_eq!(len, 4);
    let len: i64 = exec_cmd(&mut conn, "LINSERT", &["l", "after", "zz", "x"]).await.unwrap();
    assert_eq!(len, -1);

    let _: () = exec_cmd(&mut conn, "LTRIM", &["l", "1", "-1"]).await.unwrap();
    let values: Vec<String> = exec_cmd(&mut conn, "LRANGE", &["l", "0", "-1"]).await.unwrap();
    assert_eq!(values, vec!["b", "x", "c"]);

    server.stop().await;
}

#[tokio::test]
async fn test_rpoplpush_rotation() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["ring", "1", "2", "3"]).await.unwrap();

    let moved: String = exec_cmd(&mut conn, "RPOPLPUSH", &["ring", "ring"]).await.unwrap();
    assert_eq!(moved, "3");
    let values: Vec<String> = exec_cmd(&mut conn, "LRANGE", &["ring", "0", "-1"]).await.unwrap();
    assert_eq!(values, vec!["3", "1", "2"]);

    let moved: String = exec_cmd(&mut conn, "RPOPLPUSH", &["ring", "other"]).await.unwrap();
    assert_eq!(moved, "2");
    let other: Vec<String> = exec_cmd(&mut conn, "LRANGE", &["other", "0", "-1"]).await.unwrap();
    assert_eq!(other, vec!["2"]);

    let none: Option<String> = exec_cmd(&mut conn, "RPOPLPUSH", &["nosuch", "other"]).await.unwrap();
    assert_eq!(none, None);

    server.stop().await;
}

#[tokio::test]
async fn test_databases_are_isolated() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let _: i64 = exec_cmd(&mut conn, "RPUSH", &["k", "in-db0"]).await.unwrap();
    let _: () = exec_cmd(&mut conn, "SELECT", &["3"]).await.unwrap();
    let len: i64 = exec_cmd(&mut conn, "LLEN", &["k"]).await.unwrap();
    assert_eq!(len, 0);

    let err = exec_cmd::<()>(&mut conn, "SELECT", &["99"]).await.unwrap_err();
    assert!(err.to_string().contains("DB index is out of range"));

    server.flush_all().await.unwrap();
    let _: () = exec_cmd(&mut conn, "SELECT", &["0"]).await.unwrap();
    let size: i64 = exec_cmd(&mut conn, "DBSIZE", &[]).await.unwrap();
    assert_eq!(size, 0);

    server.stop().await;
}

#[tokio::test]
async fn test_dispatch_errors() {
    let server = TestRedisServer::start().await;
    let mut conn = server.get_async_connection().await.unwrap();

    let err = exec_cmd::<()>(&mut conn, "NOSUCHCMD", &["a"]).await.unwrap_err();
    assert!(err.to_string().contains("unknown command"));

    let err = exec_cmd::<()>(&mut conn, "LPUSH", &["onlykey"]).await.unwrap_err();
    assert!(err.to_string().contains("wrong number of arguments"));

    let err = exec_cmd::<()>(&mut conn, "CONFIG", &["FROB"]).await.unwrap_err();
    assert!(err.to_string().contains("unknown subcommand"));

    let pong: String = exec_cmd(&mut conn, "PING", &[]).await.unwrap();
    assert_eq!(pong, "PONG");

    server.stop().await;
}

#[tokio::test]
async fn test_follower_redirects_writes() {
    let mut config = redis_dispatch::ServerConfig::default();
    config.use_consensus = true;
    config.consensus_role = "follower".to_string();
    config.consensus_leader = "10.0.0.1:6379".to_string();
    let server = TestRedisServer::start_with_config(config).await;
    let mut conn = server.get_async_connection().await.unwrap();

    let err = exec_cmd::<i64>(&mut conn, "RPUSH", &["l", "a"]).await.unwrap_err();
    assert_eq!(err.kind(), redis::ErrorKind::Moved);

    let len: i64 = exec_cmd(&mut conn, "LLEN", &["l"]).await.unwrap();
    assert_eq!(len, 0);

    server.stop().await;
}
