// Command dispatcher - the execution pipeline every command goes through

use super::client::Client;
use super::descriptor::{Command, CommandFlags, CommandResult, LockScope, Outcome};
use crate::context::ServerContext;
use crate::error::CommandError;
use std::sync::Arc;
use tracing::debug;

pub struct CommandDispatcher {
    ctx: Arc<ServerContext>,
}

impl CommandDispatcher {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Run the request currently held in `client`.
    ///
    /// Errors come back as `Outcome::Reply` carrying the error reply.
    pub fn dispatch(&self, client: &mut Client) -> Outcome {
        match self.try_dispatch(client) {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Reply(err.into()),
        }
    }

    fn try_dispatch(&self, client: &mut Client) -> CommandResult<Outcome> {
        if client.argc() == 0 {
            return Err(CommandError::EmptyCommand);
        }

        let name = client.cmd_name();
        let cmd = self
            .ctx
            .commands
            .get(&name)
            .ok_or_else(|| CommandError::UnknownCommand(client.arg_string(0)))?;

        if !cmd.descriptor().check_arity(client.argc()) {
            return Err(CommandError::WrongArgs(name));
        }

        if !cmd.is_group() {
            return self.execute(cmd, client);
        }

        // Selector resolution touches no storage and runs before any lock
        cmd.do_initial(client)?;
        let sub = cmd.sub_command(client.sub_cmd_name()).ok_or_else(|| {
            CommandError::unknown_subcommand(&client.arg_string(0), client.sub_cmd_name())
        })?;
        if !sub.descriptor().check_arity(client.argc()) {
            return Err(CommandError::WrongArgs(sub.descriptor().name().to_string()));
        }
        self.execute(sub, client)
    }

    /// Gates, lock, `do_initial`, `do_cmd`. The lock is released on return.
    pub fn execute(&self, cmd: &dyn Command, client: &mut Client) -> CommandResult<Outcome> {
        let desc = cmd.descriptor();
        debug!(client = client.id(), db = client.db, "execute command: {}", desc.name());

        if self.ctx.config.use_consensus() {
            let consensus = &self.ctx.consensus;
            if !consensus.is_initialized()
                && desc.has_flag(CommandFlags::READONLY | CommandFlags::WRITE)
            {
                debug!("drop command: {}", desc.name());
                return Err(CommandError::NotReady(
                    "consensus layer is not initialized".to_string(),
                ));
            }
            if desc.has_flag(CommandFlags::WRITE) && !consensus.is_leader() {
                debug!("redirect command: {}", desc.name());
                return Err(CommandError::Moved(consensus.leader_address()));
            }
        }

        let locks = &self.ctx.db_locks;
        let invalid_db = || CommandError::Other("DB index is out of range".to_string());
        let _guard = match cmd.lock_scope() {
            LockScope::AllDbs => locks.lock_all(),
            LockScope::CurrentDb if desc.has_flag(CommandFlags::EXCLUSIVE) => {
                locks.lock_exclusive(client.db).ok_or_else(invalid_db)?
            }
            LockScope::CurrentDb => locks.lock_shared(client.db).ok_or_else(invalid_db)?,
        };

        cmd.do_initial(client)?;
        cmd.do_cmd(&self.ctx, client)
    }
}
