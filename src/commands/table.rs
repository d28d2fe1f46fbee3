// Command table - every command the server knows, by lowercase name

use super::descriptor::Command;
use super::{keyspace, list, server_cmds};
use std::collections::HashMap;

pub struct CommandTable {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandTable {
    /// Table with every built-in command registered
    pub fn new() -> Self {
        let mut table = Self::empty();
        list::register(&mut table);
        keyspace::register(&mut table);
        server_cmds::register(&mut table);
        table
    }

    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    pub fn add(&mut self, command: Box<dyn Command>) {
        let name = command.descriptor().name().to_string();
        debug_assert_eq!(name, name.to_ascii_lowercase(), "command names are registered lowercase");
        self.commands.insert(name, command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|cmd| cmd.as_ref())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Top-level commands sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        let mut commands: Vec<&dyn Command> = self.commands.values().map(|c| c.as_ref()).collect();
        commands.sort_by(|a, b| a.descriptor().name().cmp(b.descriptor().name()));
        commands.into_iter()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
