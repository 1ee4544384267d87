use dashmap::DashMap;
use shoot_config::model::tool_alias;

use crate::types::ToolDescriptor;

/// Maps `mcp__{server}__{tool}` aliases back to the server and the name the
/// server knows the tool by.
pub struct ToolIndex {
    /// alias -> (server_id, original_name)
    aliases: DashMap<String, (String, String)>,
    /// server_id -> list of tool names
    server_tools: DashMap<String, Vec<String>>,
}

impl ToolIndex {
    pub fn new() -> Self {
        Self {
            aliases: DashMap::new(),
            server_tools: DashMap::new(),
        }
    }

    /// Registers a server's exposed tools, returning their aliases in order.
    pub fn register_server_tools(&self, server_id: &str, tools: &[ToolDescriptor]) -> Vec<String> {
        let mut aliases = Vec::with_capacity(tools.len());
        let mut tool_names = Vec::with_capacity(tools.len());

        for tool in tools {
            let alias = tool_alias(server_id, &tool.name);
            self.aliases
                .insert(alias.clone(), (server_id.to_string(), tool.name.clone()));
            tool_names.push(tool.name.clone());
            aliases.push(alias);
        }

        self.server_tools.insert(server_id.to_string(), tool_names);
        aliases
    }

    pub fn remove_server_tools(&self, server_id: &str) {
        if let Some((_, tools)) = self.server_tools.remove(server_id) {
            for tool_name in tools {
                self.aliases.remove(&tool_alias(server_id, &tool_name));
            }
        }
    }

    /// Lookup a tool by its alias
    pub fn lookup(&self, alias: &str) -> Option<(String, String)> {
        self.aliases.get(alias).map(|entry| entry.value().clone())
    }

    pub fn get_server_tools(&self, server_id: &str) -> Option<Vec<String>> {
        self.server_tools.get(server_id).map(|entry| entry.clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for ToolIndex {
    fn default() -> Self {
        Self::new()
    }
}
