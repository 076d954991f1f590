use super::current_time::CurrentTimeTool;
use super::tool::{Tool, ToolDef, ToolResult};
use super::web_reader::WebReaderTool;
use super::web_search::WebSearchTool;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// `currentTime`, `webSearch` and `webReader`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CurrentTimeTool));
        registry.register(Arc::new(WebSearchTool::new()));
        registry.register(Arc::new(WebReaderTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Run the named tool. Unknown names come back as an error result.
    pub async fn invoke(&self, name: &str, args: &str) -> ToolResult {
        match self.get(name) {
            Some(tool) => tool.call(args).await,
            None => ToolResult::err(format!("Tool not found: {name}")),
        }
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self
            .tools
            .values()
            .map(|t| ToolDef {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
