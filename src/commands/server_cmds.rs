// Server and connection commands (PING, ECHO, SELECT) and the
// CONFIG, CLIENT and COMMAND groups

use super::client::Client;
use super::descriptor::{
    AclCategory, Command, CommandFlags, CommandGroup, CommandResult, FnCommand, Outcome,
};
use super::table::CommandTable;
use crate::context::ServerContext;
use crate::error::CommandError;
use crate::protocol::RespValue;

pub fn register(table: &mut CommandTable) {
    let conn = AclCategory::CONNECTION | AclCategory::FAST;
    let admin = AclCategory::ADMIN | AclCategory::SLOW | AclCategory::DANGEROUS;

    table.add(FnCommand::new("ping", -1, CommandFlags::FAST, conn, ping).boxed());
    table.add(FnCommand::new("echo", 2, CommandFlags::FAST, conn, echo).boxed());
    table.add(FnCommand::new("select", 2, CommandFlags::FAST, conn, select).boxed());

    let mut config = CommandGroup::new("config", CommandFlags::ADMIN);
    config.add_sub_command(
        FnCommand::new("config|get", -3, CommandFlags::ADMIN, admin, config_get).boxed(),
    );
    config.add_sub_command(
        FnCommand::new("config|set", -4, CommandFlags::ADMIN, admin, config_set).boxed(),
    );
    table.add(Box::new(config));

    let mut client = CommandGroup::new("client", CommandFlags::empty());
    client.add_sub_command(FnCommand::new("client|id", 2, CommandFlags::FAST, conn, client_id).boxed());
    client.add_sub_command(
        FnCommand::new("client|getname", 2, CommandFlags::FAST, conn, client_getname).boxed(),
    );
    client.add_sub_command(
        FnCommand::new("client|setname", 3, CommandFlags::FAST, conn, client_setname).boxed(),
    );
    client.add_sub_command(
        FnCommand::new("client|list", 2, CommandFlags::ADMIN, admin, client_list).boxed(),
    );
    table.add(Box::new(client));

    let mut command = CommandGroup::new("command", CommandFlags::empty());
    command.add_sub_command(
        FnCommand::new("command|count", 2, CommandFlags::empty(), AclCategory::CONNECTION, command_count)
            .boxed(),
    );
    command.add_sub_command(
        FnCommand::new("command|info", -2, CommandFlags::empty(), AclCategory::CONNECTION, command_info)
            .boxed(),
    );
    command.add_sub_command(
        FnCommand::new("command|list", 2, CommandFlags::empty(), AclCategory::CONNECTION, command_list)
            .boxed(),
    );
    table.add(Box::new(command));
}

/// PING [message]
fn ping(_ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    match client.argc() {
        1 => Ok(RespValue::SimpleString("PONG".to_string()).into()),
        2 => Ok(RespValue::bulk(client.arg(1)).into()),
        _ => Err(CommandError::WrongArgs("ping".to_string())),
    }
}

/// ECHO message
fn echo(_ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    Ok(RespValue::bulk(client.arg(1)).into())
}

/// SELECT index
fn select(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let index = client.arg_i64(1)?;
    if index < 0 || index as usize >= ctx.db_locks.len() {
        return Err(CommandError::Other("DB index is out of range".to_string()));
    }
    client.db = index as usize;
    Ok(RespValue::ok().into())
}

/// CONFIG GET pattern [pattern ...]
fn config_get(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for i in 2..client.argc() {
        for pair in ctx.config.get(&client.arg_string(i)) {
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
    }
    let flat = pairs.into_iter().flat_map(|(k, v)| [k, v]);
    Ok(RespValue::bulk_array(flat).into())
}

/// CONFIG SET parameter value [parameter value ...]
fn config_set(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    if client.argc() % 2 != 0 {
        return Err(CommandError::WrongArgs("config|set".to_string()));
    }
    for i in (2..client.argc()).step_by(2) {
        ctx.config
            .set(&client.arg_string(i), &client.arg_string(i + 1))
            .map_err(|e| CommandError::Other(e.to_string()))?;
    }
    Ok(RespValue::ok().into())
}

/// CLIENT ID
fn client_id(_ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    Ok(RespValue::Integer(client.id() as i64).into())
}

/// CLIENT GETNAME
fn client_getname(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    Ok(ctx
        .clients
        .get_name(client.id())
        .map_or_else(RespValue::nil_bulk, RespValue::bulk)
        .into())
}

/// CLIENT SETNAME connection-name
fn client_setname(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let name = client.arg_string(2);
    if name.bytes().any(|b| b <= b' ' || b > b'~') {
        return Err(CommandError::Other(
            "Client names cannot contain spaces, newlines or special characters.".to_string(),
        ));
    }
    ctx.clients.set_name(client.id(), name);
    Ok(RespValue::ok().into())
}

/// CLIENT LIST
fn client_list(ctx: &ServerContext, _client: &mut Client) -> CommandResult<Outcome> {
    Ok(RespValue::bulk(ctx.clients.list()).into())
}

/// COMMAND COUNT
fn command_count(ctx: &ServerContext, _client: &mut Client) -> CommandResult<Outcome> {
    Ok(RespValue::Integer(ctx.commands.len() as i64).into())
}

/// COMMAND INFO [command-name ...]
fn command_info(ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
    let infos = if client.argc() == 2 {
        ctx.commands.iter().map(|cmd| cmd.descriptor().info()).collect()
    } else {
        (2..client.argc())
            .map(|i| {
                let name = client.arg_string(i).to_ascii_lowercase();
                resolve(ctx, &name).map_or_else(RespValue::nil_array, |cmd| cmd.descriptor().info())
            })
            .collect()
    };
    Ok(RespValue::Array(Some(infos)).into())
}

/// Look up `name` or `group|sub`
fn resolve<'a>(ctx: &'a ServerContext, name: &str) -> Option<&'a dyn Command> {
    match name.split_once('|') {
        Some((group, sub)) => ctx.commands.get(group)?.sub_command(sub),
        None => ctx.commands.get(name),
    }
}

/// COMMAND LIST
fn command_list(ctx: &ServerContext, _client: &mut Client) -> CommandResult<Outcome> {
    let names: Vec<String> = ctx
        .commands
        .iter()
        .map(|cmd| cmd.descriptor().name().to_string())
        .collect();
    Ok(RespValue::bulk_array(names).into())
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
        let (id, _rx) = ctx.clients.register("127.0.0.1:5000".to_string());
        (CommandDispatcher::new(ctx), Client::new(id))
    }

    #[test]
    fn test_ping_echo() {
        let (d, mut c) = setup();
        assert_eq!(run(&d, &mut c, &["PING"]), RespValue::SimpleString("PONG".to_string()));
        assert_eq!(run(&d, &mut c, &["PING", "hi"]), RespValue::bulk("hi"));
        assert_eq!(
            run(&d, &mut c, &["PING", "a", "b"]),
            RespValue::Error("ERR wrong number of arguments for 'ping' command".to_string())
        );
        assert_eq!(run(&d, &mut c, &["ECHO", "hello"]), RespValue::bulk("hello"));
    }

    #[test]
    fn test_select() {
        let (d, mut c) = setup();
        assert_eq!(run(&d, &mut c, &["SELECT", "15"]), RespValue::ok());
        assert_eq!(c.db, 15);
        assert_eq!(
            run(&d, &mut c, &["SELECT", "16"]),
            RespValue::Error("ERR DB index is out of range".to_string())
        );
        assert_eq!(
            run(&d, &mut c, &["SELECT", "x"]),
            RespValue::Error("ERR value is not an integer or out of range".to_string())
        );
        assert_eq!(c.db, 15);
    }

    #[test]
    fn test_config() {
        let (d, mut c) = setup();
        assert_eq!(
            run(&d, &mut c, &["CONFIG", "GET", "maxclients", "port", "maxclients"]),
            RespValue::bulk_array(["maxclients", "10000", "port", "6379"])
        );
        assert_eq!(run(&d, &mut c, &["config", "set", "maxclients", "10"]), RespValue::ok());
        assert_eq!(
            run(&d, &mut c, &["CONFIG", "GET", "maxclients"]),
            RespValue::bulk_array(["maxclients", "10"])
        );
        assert_eq!(
            run(&d, &mut c, &["CONFIG", "SET", "port", "1"]),
            RespValue::Error(
                "ERR Configuration parameter 'port' cannot be changed at runtime".to_string()
            )
        );
        assert_eq!(
            run(&d, &mut c, &["CONFIG", "SET", "loglevel", "debug", "maxclients"]),
            RespValue::Error(
                "ERR wrong number of arguments for 'config|set' command".to_string()
            )
        );
    }

    #[test]
    fn test_client_group() {
        let (d, mut c) = setup();
        assert_eq!(run(&d, &mut c, &["CLIENT", "ID"]), RespValue::Integer(c.id() as i64));
        assert_eq!(run(&d, &mut c, &["CLIENT", "GETNAME"]), RespValue::nil_bulk());
        assert_eq!(run(&d, &mut c, &["CLIENT", "SETNAME", "worker-1"]), RespValue::ok());
        assert_eq!(run(&d, &mut c, &["CLIENT", "GETNAME"]), RespValue::bulk("worker-1"));
        assert!(run(&d, &mut c, &["CLIENT", "SETNAME", "bad name"]).is_error());

        let list = run(&d, &mut c, &["CLIENT", "LIST"]);
        let text = String::from_utf8(list.as_bulk_string().unwrap().to_vec()).unwrap();
        assert!(text.contains("name=worker-1"));
        assert_eq!(
            run(&d, &mut c, &["CLIENT", "KILL"]),
            RespValue::Error("ERR CLIENT unknown subcommand for 'kill'".to_string())
        );
    }

    #[test]
    fn test_command_group() {
        let (d, mut c) = setup();
        assert_eq!(run(&d, &mut c, &["COMMAND", "COUNT"]), RespValue::Integer(29));

        let info = run(&d, &mut c, &["COMMAND", "INFO", "llen", "config|get", "nosuch"]);
        let entries = info.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].as_array().unwrap()[1], RespValue::Integer(2));
        assert_eq!(entries[1].as_array().unwrap()[0], RespValue::bulk("config|get"));
        assert_eq!(entries[2], RespValue::nil_array());

        let list = run(&d, &mut c, &["COMMAND", "LIST"]);
        assert_eq!(list.as_array().unwrap().len(), 29);
    }
}
