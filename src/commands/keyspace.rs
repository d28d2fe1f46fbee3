// Keyspace commands (DEL, EXISTS, TYPE, KEYS, DBSIZE, FLUSHDB, FLUSHALL)

use super::client::Client;
use super::descriptor::{AclCategory, CommandFlags, CommandResult, FnCommand, LockScope, Outcome};
use super::table::CommandTable;
use crate::context::ServerContext;
use crate::protocol::RespValue;
use tracing::info;

pub fn register(table: &mut CommandTable) {
    let keyspace = AclCategory::KEYSPACE;
    let flush = CommandFlags::WRITE | CommandFlags::EXCLUSIVE;
    let flush_acl = keyspace | AclCategory::WRITE | AclCategory::SLOW | AclCategory::DANGEROUS;

    table.add(
        FnCommand::new("del", -2, CommandFlags::WRITE, keyspace | AclCategory::WRITE | AclCategory::SLOW, del)
            .boxed(),
    );
    table.add(
        FnCommand::new(
            "exists",
            -2,
            CommandFlags::READONLY | CommandFlags::FAST,
            keyspace | AclCategory::READ | AclCategory::FAST,
            exists,
        )
        .boxed(),
    );
    table.add(
        FnCommand::new(
            "type",
            2,
            CommandFlags::READONLY | CommandFlags::FAST,
            keyspace | AclCategory::READ | AclCategory::FAST,
            key_type,
        )
        .boxed(),
    );
    table.add(
        FnCommand::new(
            "keys",
            2,
            CommandFlags::READONLY,
            keyspace | AclCategory::READ | AclCategory::SLOW | AclCategory::DANGEROUS,
            keys,
        )
        .boxed(),
    );
    table.add(
        FnCommand::new(
            "dbsize",
            1,
            CommandFlags::READONLY | CommandFlags::FAST,
            keyspace | AclCategory::READ | AclCategory::FAST,
            dbsize,
        )
        .boxed(),
    );
    table.add(FnCommand::new("flushdb", 1, flush, flush_acl, flushdb).boxed());
    table.add(
        FnCommand::new("flushall", 1, flush, flush_acl, flushall)
            .with_lock_scope(LockScope::AllDbs)
            .boxed(),
    );
}

/// DEL key [key ...]
fn del(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let removed = ctx.storage.del(client.db, &client.argv()[1..])?;
    Ok(RespValue::Integer(removed as i64).into())
}

/// EXISTS key [key ...]
fn exists(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let found = ctx.storage.exists(client.db, &client.argv()[1..])?;
    Ok(RespValue::Integer(found as i64).into())
}

/// TYPE key
fn key_type(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let name = ctx.storage.key_type(client.db, client.key())?.unwrap_or("none");
    Ok(RespValue::SimpleString(name.to_string()).into())
}

/// KEYS pattern
fn keys(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let mut keys = ctx.storage.keys(client.db, client.arg(1))?;
    keys.sort();
    Ok(RespValue::bulk_array(keys).into())
}

/// DBSIZE
fn dbsize(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let size = ctx.storage.db_size(client.db)?;
    Ok(RespValue::Integer(size as i64).into())
}

/// FLUSHDB
fn flushdb(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    ctx.storage.flush_db(client.db)?;
    info!(db = client.db, "database flushed");
    Ok(RespValue::ok().into())
}

/// FLUSHALL
fn flushall(ctx: &ServerContext, _client: &mut Client) -> CommandResult<Outcome> {
    ctx.storage.flush_all()?;
    info!("all databases flushed");
    Ok(RespValue::ok().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandDispatcher;
    use crate::config::ServerConfig;
    use bytes::Bytes;
    use std::sync::Arc;

    fn run(dispatcher: &CommandDispatcher, client: &mut Client, args: &[&str]) -> RespValue {
        client.set_argv(args.iter().map(|a| Bytes::from(a.to_string())).collect());
        match dispatcher.dispatch(client) {
            Outcome::Reply(value) => value,
            Outcome::Blocked => panic!("unexpected block"),
        }
    }

    fn setup() -> (CommandDispatcher, Client) {
        let ctx = Arc::new(ServerContext::new(ServerConfig::default()));
        (CommandDispatcher::new(ctx), Client::new(1))
    }

    #[test]
    fn test_del_exists_type() {
        let (d, mut c) = setup();
        run(&d, &mut c, &["RPUSH", "a", "1"]);
        run(&d, &mut c, &["RPUSH", "b", "1"]);

        assert_eq!(run(&d, &mut c, &["EXISTS", "a", "b", "zz", "a"]), RespValue::Integer(3));
        assert_eq!(run(&d, &mut c, &["TYPE", "a"]), RespValue::SimpleString("list".to_string()));
        assert_eq!(run(&d, &mut c, &["TYPE", "zz"]), RespValue::SimpleString("none".to_string()));
        assert_eq!(run(&d, &mut c, &["DEL", "a", "zz"]), RespValue::Integer(1));
        assert_eq!(run(&d, &mut c, &["DBSIZE"]), RespValue::Integer(1));
    }

    #[test]
    fn test_keys_sorted() {
        let (d, mut c) = setup();
        for key in ["user:2", "post:1", "user:1"] {
            run(&d, &mut c, &["RPUSH", key, "v"]);
        }
        assert_eq!(
            run(&d, &mut c, &["KEYS", "user:*"]),
            RespValue::bulk_array(["user:1", "user:2"])
        );
    }

    #[test]
    fn test_flush() {
        let (d, mut c) = setup();
        run(&d, &mut c, &["RPUSH", "a", "1"]);
        run(&d, &mut c, &["SELECT", "1"]);
        run(&d, &mut c, &["RPUSH", "b", "1"]);

        assert_eq!(run(&d, &mut c, &["FLUSHDB"]), RespValue::ok());
        assert_eq!(run(&d, &mut c, &["DBSIZE"]), RespValue::Integer(0));
        run(&d, &mut c, &["SELECT", "0"]);
        assert_eq!(run(&d, &mut c, &["DBSIZE"]), RespValue::Integer(1));

        assert_eq!(run(&d, &mut c, &["FLUSHALL"]), RespValue::ok());
        assert_eq!(run(&d, &mut c, &["DBSIZE"]), RespValue::Integer(0));
    }
}
