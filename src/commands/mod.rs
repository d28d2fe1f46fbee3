// Commands module - descriptors, registry, dispatcher and handlers

pub mod client;
pub mod descriptor;
pub mod dispatcher;
pub mod keyspace;
pub mod list;
pub mod server_cmds;
pub mod table;

pub use client::Client;
pub use descriptor::{
    AclCategory, Command, CommandDescriptor, CommandFlags, CommandGroup, CommandResult,
    FnCommand, LockScope, Outcome,
};
pub use dispatcher::CommandDispatcher;
pub use table::CommandTable;
