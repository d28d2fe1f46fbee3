// List command handlers

use super::client::Client;
use super::descriptor::{AclCategory, CommandFlags, CommandResult, FnCommand, Outcome};
use super::table::CommandTable;
use crate::blocking::{parse_block_timeout, PopDirection};
use crate::context::ServerContext;
use crate::error::CommandError;
use crate::protocol::RespValue;
use crate::storage::{current_timestamp_ms, InsertPosition, StorageError};
use bytes::Bytes;

pub fn register(table: &mut CommandTable) {
    let write = CommandFlags::WRITE;
    let read = CommandFlags::READONLY;
    let w_fast = AclCategory::WRITE | AclCategory::LIST | AclCategory::FAST;
    let w_slow = AclCategory::WRITE | AclCategory::LIST | AclCategory::SLOW;
    let r_fast = AclCategory::READ | AclCategory::LIST | AclCategory::FAST;
    let r_slow = AclCategory::READ | AclCategory::LIST | AclCategory::SLOW;
    let blocking = AclCategory::WRITE | AclCategory::LIST | AclCategory::SLOW | AclCategory::BLOCKING;

    table.add(FnCommand::new("lpush", -3, write | CommandFlags::FAST, w_fast, lpush).boxed());
    table.add(FnCommand::new("rpush", -3, write | CommandFlags::FAST, w_fast, rpush).boxed());
    table.add(FnCommand::new("lpushx", -3, write | CommandFlags::FAST, w_fast, lpushx).boxed());
    table.add(FnCommand::new("rpushx", -3, write | CommandFlags::FAST, w_fast, rpushx).boxed());
    table.add(
        FnCommand::new("lpop", -2, write | CommandFlags::FAST, w_fast, lpop)
            .with_initial(check_pop_args)
            .boxed(),
    );
    table.add(
        FnCommand::new("rpop", -2, write | CommandFlags::FAST, w_fast, rpop)
            .with_initial(check_pop_args)
            .boxed(),
    );
    table.add(FnCommand::new("lrange", 4, read, r_slow, lrange).boxed());
    table.add(FnCommand::new("lrem", 4, write, w_slow, lrem).boxed());
    table.add(FnCommand::new("ltrim", 4, write, w_slow, ltrim).boxed());
    table.add(FnCommand::new("lset", 4, write, w_slow, lset).boxed());
    table.add(
        FnCommand::new("linsert", 5, write, w_slow, linsert)
            .with_initial(check_linsert_args)
            .boxed(),
    );
    table.add(FnCommand::new("lindex", 3, read, r_slow, lindex).boxed());
    table.add(FnCommand::new("llen", 2, read | CommandFlags::FAST, r_fast, llen).boxed());
    table.add(FnCommand::new("rpoplpush", 3, write, w_slow, rpoplpush).boxed());
    table.add(
        FnCommand::new("blpop", -3, write | CommandFlags::BLOCKING, blocking, blpop)
            .with_initial(check_block_timeout)
            .boxed(),
    );
    table.add(
        FnCommand::new("brpop", -3, write | CommandFlags::BLOCKING, blocking, brpop)
            .with_initial(check_block_timeout)
            .boxed(),
    );
}

fn reply(value: RespValue) -> CommandResult<Outcome> {
    Ok(Outcome::Reply(value))
}

/// Shared body of the four push commands
fn push(
    ctx: &ServerContext,
    client: &Client,
    direction: PopDirection,
    only_existing: bool,
) -> CommandResult<Outcome> {
    let key = client.key();
    let values = &client.argv()[2..];
    let result = match (direction, only_existing) {
        (PopDirection::Left, false) => ctx.storage.lpush(client.db, key, values),
        (PopDirection::Right, false) => ctx.storage.rpush(client.db, key, values),
        (PopDirection::Left, true) => ctx.storage.lpushx(client.db, key, values),
        (PopDirection::Right, true) => ctx.storage.rpushx(client.db, key, values),
    };

    match result {
        Ok(len) => {
            ctx.serve_blocked(client.db, key);
            reply(RespValue::Integer(len as i64))
        }
        Err(e) if only_existing && e.is_not_found() => reply(RespValue::Integer(0)),
        Err(e) => Err(e.into()),
    }
}

/// LPUSH key element [element ...]
fn lpush(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    push(ctx, client, PopDirection::Left, false)
}

/// RPUSH key element [element ...]
fn rpush(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    push(ctx, client, PopDirection::Right, false)
}

/// LPUSHX key element [element ...]
fn lpushx(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    push(ctx, client, PopDirection::Left, true)
}

/// RPUSHX key element [element ...]
fn rpushx(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    push(ctx, client, PopDirection::Right, true)
}

fn check_pop_args(client: &mut Client) -> CommandResult<()> {
    if client.argc() > 3 {
        return Err(CommandError::WrongArgs(client.cmd_name()));
    }
    pop_count(client).map(|_| ())
}

fn pop_count(client: &Client) -> CommandResult<Option<usize>> {
    if client.argc() < 3 {
        return Ok(None);
    }
    let count = client.arg_i64(2)?;
    if count < 0 {
        return Err(CommandError::Other(
            "value is out of range, must be positive".to_string(),
        ));
    }
    Ok(Some(count as usize))
}

fn pop(ctx: &ServerContext, client: &Client, direction: PopDirection) -> CommandResult<Outcome> {
    let count = pop_count(client)?;
    let n = count.unwrap_or(1);
    let result = match direction {
        PopDirection::Left => ctx.storage.lpop(client.db, client.key(), n),
        PopDirection::Right => ctx.storage.rpop(client.db, client.key(), n),
    };

    match (result, count) {
        (Ok(items), Some(_)) => reply(RespValue::bulk_array(items)),
        (Ok(items), None) => reply(
            items
                .into_iter()
                .next()
                .map_or_else(RespValue::nil_bulk, RespValue::bulk),
        ),
        (Err(e), Some(_)) if e.is_not_found() => reply(RespValue::nil_array()),
        (Err(e), None) if e.is_not_found() => reply(RespValue::nil_bulk()),
        (Err(e), _) => Err(e.into()),
    }
}

/// LPOP key [count]
fn lpop(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    pop(ctx, client, PopDirection::Left)
}

/// RPOP key [count]
fn rpop(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    pop(ctx, client, PopDirection::Right)
}

/// LRANGE key start stop
fn lrange(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let start = client.arg_i64(2)?;
    let stop = client.arg_i64(3)?;
    match ctx.storage.lrange(client.db, client.key(), start, stop) {
        Ok(items) => reply(RespValue::bulk_array(items)),
        Err(e) if e.is_not_found() => reply(RespValue::Array(Some(Vec::new()))),
        Err(e) => Err(e.into()),
    }
}

/// LREM key count element
fn lrem(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let count = client.arg_i64(2)?;
    match ctx.storage.lrem(client.db, client.key(), count, client.arg(3)) {
        Ok(removed) => reply(RespValue::Integer(removed as i64)),
        Err(e) if e.is_not_found() => reply(RespValue::Integer(0)),
        Err(e) => Err(e.into()),
    }
}

/// LTRIM key start stop
fn ltrim(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let start = client.arg_i64(2)?;
    let stop = client.arg_i64(3)?;
    match ctx.storage.ltrim(client.db, client.key(), start, stop) {
        Ok(()) => reply(RespValue::ok()),
        Err(e) if e.is_not_found() => reply(RespValue::ok()),
        Err(e) => Err(e.into()),
    }
}

/// LSET key index element
fn lset(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let index = client.arg_i64(2)?;
    match ctx.storage.lset(client.db, client.key(), index, client.arg_bytes(3)) {
        Ok(()) => reply(RespValue::ok()),
        Err(StorageError::NotFound) => Err(CommandError::NoSuchKey),
        Err(StorageError::Corruption(_)) => Err(CommandError::OutOfRange),
        Err(e) => Err(e.into()),
    }
}

fn insert_position(arg: &[u8]) -> CommandResult<InsertPosition> {
    if arg.eq_ignore_ascii_case(b"before") {
        Ok(InsertPosition::Before)
    } else if arg.eq_ignore_ascii_case(b"after") {
        Ok(InsertPosition::After)
    } else {
        Err(CommandError::syntax())
    }
}

fn check_linsert_args(client: &mut Client) -> CommandResult<()> {
    insert_position(client.arg(2)).map(|_| ())
}

/// LINSERT key BEFORE|AFTER pivot element
fn linsert(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let position = insert_position(client.arg(2))?;
    let key = client.key();
    match ctx
        .storage
        .linsert(client.db, key, position, client.arg(3), client.arg_bytes(4))
    {
        Ok(len) => {
            if len > 0 {
                ctx.serve_blocked(client.db, key);
            }
            reply(RespValue::Integer(len))
        }
        Err(e) if e.is_not_found() => reply(RespValue::Integer(0)),
        Err(e) => Err(e.into()),
    }
}

/// LINDEX key index
fn lindex(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let index = client.arg_i64(2)?;
    match ctx.storage.lindex(client.db, client.key(), index) {
        Ok(value) => reply(RespValue::bulk(value)),
        Err(e) if e.is_not_found() => reply(RespValue::nil_bulk()),
        Err(e) => Err(e.into()),
    }
}

/// LLEN key
fn llen(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    match ctx.storage.llen(client.db, client.key()) {
        Ok(len) => reply(RespValue::Integer(len as i64)),
        Err(e) if e.is_not_found() => reply(RespValue::Integer(0)),
        Err(e) => Err(e.into()),
    }
}

/// RPOPLPUSH source destination
fn rpoplpush(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let destination = client.arg(2);
    match ctx.storage.rpoplpush(client.db, client.key(), destination) {
        Ok(value) => {
            ctx.serve_blocked(client.db, destination);
            reply(RespValue::bulk(value))
        }
        Err(e) if e.is_not_found() => reply(RespValue::nil_bulk()),
        Err(e) => Err(e.into()),
    }
}

fn check_block_timeout(client: &mut Client) -> CommandResult<()> {
    parse_block_timeout(client.arg(client.argc() - 1), current_timestamp_ms()).map(|_| ())
}

/// Shared body of BLPOP and BRPOP: pop now or park the client
fn blocking_pop(
    ctx: &ServerContext,
    client: &Client,
    direction: PopDirection,
) -> CommandResult<Outcome> {
    let last = client.argc() - 1;
    let deadline = parse_block_timeout(client.arg(last), current_timestamp_ms())?;
    let keys: &[Bytes] = &client.argv()[1..last];

    let hit = ctx.blocking.pop_or_block(
        ctx.storage.as_ref(),
        client.db,
        keys,
        direction,
        deadline,
        client.id(),
    )?;
    match hit {
        Some((key, value)) => reply(RespValue::bulk_array([key, value])),
        None => Ok(Outcome::Blocked),
    }
}

/// BLPOP key [key ...] timeout
fn blpop(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    blocking_pop(ctx, client, PopDirection::Left)
}

/// BRPOP key [key ...] timeout
fn brpop(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    blocking_pop(ctx, client, PopDirection::Right)
}
