// Command metadata, the Command trait and command groups

use crate::commands::client::Client;
use crate::context::ServerContext;
use crate::error::CommandError;
use crate::protocol::RespValue;
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

static COMMAND_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

bitflags! {
    /// Capability flags consulted by the dispatcher
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u32 {
        const WRITE = 1 << 0;
        const READONLY = 1 << 1;
        /// Runs with the database lock held exclusively
        const EXCLUSIVE = 1 << 2;
        const FAST = 1 << 3;
        const BLOCKING = 1 << 4;
        const ADMIN = 1 << 5;
    }
}

bitflags! {
    /// ACL categories, carried for an external ACL layer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AclCategory: u32 {
        const KEYSPACE = 1 << 0;
        const READ = 1 << 1;
        const WRITE = 1 << 2;
        const LIST = 1 << 3;
        const ADMIN = 1 << 4;
        const FAST = 1 << 5;
        const SLOW = 1 << 6;
        const BLOCKING = 1 << 7;
        const DANGEROUS = 1 << 8;
        const CONNECTION = 1 << 9;
    }
}

/// Result of a command that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(RespValue),
    /// Parked in the wait registry; the reply arrives later on the client's channel
    Blocked,
}

impl From<RespValue> for Outcome {
    fn from(value: RespValue) -> Self {
        Outcome::Reply(value)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Which database locks a command holds while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// The client's current database, shared or exclusive per `EXCLUSIVE`
    CurrentDb,
    /// Every database exclusively
    AllDbs,
}

/// Static description of one command.
///
/// `arity` counts the command name itself: positive means exactly that many
/// arguments, negative means at least `|arity|`.
#[derive(Debug)]
pub struct CommandDescriptor {
    name: String,
    arity: i16,
    flags: AtomicU32,
    acl: AtomicU32,
    id: u32,
}

impl CommandDescriptor {
    pub fn new(name: &str, arity: i16, flags: CommandFlags, acl: AclCategory) -> Self {
        Self {
            name: name.to_string(),
            arity,
            flags: AtomicU32::new(flags.bits()),
            acl: AtomicU32::new(acl.bits()),
            id: COMMAND_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> i16 {
        self.arity
    }

    /// Process-unique, increasing in construction order
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn check_arity(&self, argc: usize) -> bool {
        if self.arity > 0 {
            argc == self.arity as usize
        } else {
            argc >= self.arity.unsigned_abs() as usize
        }
    }

    pub fn flags(&self) -> CommandFlags {
        CommandFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    /// True if any of the bits in `flag` is set
    pub fn has_flag(&self, flag: CommandFlags) -> bool {
        self.flags().intersects(flag)
    }

    pub fn set_flag(&self, flag: CommandFlags) {
        self.flags.fetch_or(flag.bits(), Ordering::Relaxed);
    }

    pub fn reset_flag(&self, flag: CommandFlags) {
        self.flags.fetch_and(!flag.bits(), Ordering::Relaxed);
    }

    pub fn acl_category(&self) -> AclCategory {
        AclCategory::from_bits_truncate(self.acl.load(Ordering::Relaxed))
    }

    pub fn add_acl_category(&self, category: AclCategory) {
        self.acl.fetch_or(category.bits(), Ordering::Relaxed);
    }

    /// `[name, arity, [flags], [categories]]` as COMMAND INFO reports it
    pub fn info(&self) -> RespValue {
        let flags = self
            .flags()
            .iter_names()
            .map(|(name, _)| RespValue::SimpleString(name.to_ascii_lowercase()))
            .collect();
        let acl = self
            .acl_category()
            .iter_names()
            .map(|(name, _)| RespValue::SimpleString(format!("@{}", name.to_ascii_lowercase())))
            .collect();
        RespValue::Array(Some(vec![
            RespValue::bulk(&self.name),
            RespValue::Integer(self.arity as i64),
            RespValue::Array(Some(flags)),
            RespValue::Array(Some(acl)),
        ]))
    }
}

/// One executable command.
///
/// The dispatcher runs `do_initial` then `do_cmd` with the database lock held.
pub trait Command: Send + Sync {
    fn descriptor(&self) -> &CommandDescriptor;

    /// Argument checks that need no storage access
    fn do_initial(&self, _client: &mut Client) -> CommandResult<()> {
        Ok(())
    }

    fn do_cmd(&self, ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome>;

    fn lock_scope(&self) -> LockScope {
        LockScope::CurrentDb
    }

    /// Groups return the named sub-command
    fn sub_command(&self, _name: &str) -> Option<&dyn Command> {
        None
    }

    fn is_group(&self) -> bool {
        false
    }
}

pub type CommandHandler = fn(&ServerContext, &mut Client) -> CommandResult<Outcome>;
pub type InitialHandler = fn(&mut Client) -> CommandResult<()>;

/// A command backed by plain functions
pub struct FnCommand {
    descriptor: CommandDescriptor,
    initial: Option<InitialHandler>,
    handler: CommandHandler,
    lock_scope: LockScope,
}

impl FnCommand {
    pub fn new(
        name: &str,
        arity: i16,
        flags: CommandFlags,
        acl: AclCategory,
        handler: CommandHandler,
    ) -> Self {
        Self {
            descriptor: CommandDescriptor::new(name, arity, flags, acl),
            initial: None,
            handler,
            lock_scope: LockScope::CurrentDb,
        }
    }

    pub fn with_initial(mut self, initial: InitialHandler) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn with_lock_scope(mut self, scope: LockScope) -> Self {
        self.lock_scope = scope;
        self
    }

    pub fn boxed(self) -> Box<dyn Command> {
        Box::new(self)
    }
}

impl Command for FnCommand {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    fn do_initial(&self, client: &mut Client) -> CommandResult<()> {
        match self.initial {
            Some(initial) => initial(client),
            None => Ok(()),
        }
    }

    fn do_cmd(&self, ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
        (self.handler)(ctx, client)
    }

    fn lock_scope(&self) -> LockScope {
        self.lock_scope
    }
}

/// A command whose first argument selects one of its sub-commands
pub struct CommandGroup {
    descriptor: CommandDescriptor,
    subcommands: HashMap<String, Box<dyn Command>>,
}

impl CommandGroup {
    /// Groups need at least a selector, so arity defaults to -2
    pub fn new(name: &str, flags: CommandFlags) -> Self {
        Self::with_arity(name, -2, flags)
    }

    pub fn with_arity(name: &str, arity: i16, flags: CommandFlags) -> Self {
        Self {
            descriptor: CommandDescriptor::new(name, arity, flags, AclCategory::empty()),
            subcommands: HashMap::new(),
        }
    }

    /// Register a sub-command under the part of its name after `|`
    pub fn add_sub_command(&mut self, command: Box<dyn Command>) {
        let full = command.descriptor().name();
        let short = full.rsplit('|').next().unwrap_or(full).to_string();
        self.subcommands.insert(short, command);
    }

    pub fn sub_command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.subcommands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Command for CommandGroup {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    /// Resolve `argv[1]` into the client's sub-command name
    fn do_initial(&self, client: &mut Client) -> CommandResult<()> {
        let sub = String::from_utf8_lossy(client.arg(1)).to_ascii_lowercase();
        client.set_sub_cmd_name(sub);
        if !self.subcommands.contains_key(client.sub_cmd_name()) {
            return Err(CommandError::unknown_subcommand(
                &String::from_utf8_lossy(client.arg(0)),
                client.sub_cmd_name(),
            ));
        }
        Ok(())
    }

    fn do_cmd(&self, _ctx: &ServerContext, client: &mut Client) -> CommandResult<Outcome> {
        Err(CommandError::unknown_subcommand(
            self.descriptor.name(),
            client.sub_cmd_name(),
        ))
    }

    fn sub_command(&self, name: &str) -> Option<&dyn Command> {
        self.subcommands.get(name).map(|cmd| cmd.as_ref())
    }

    fn is_group(&self) -> bool {
        true
    }
}
