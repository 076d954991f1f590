pub mod current_time;
pub mod registry;
pub mod tool;
pub mod web_reader;
pub mod web_search;

pub use current_time::CurrentTimeTool;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDef, ToolResult};
pub use web_reader::WebReaderTool;
pub use web_search::WebSearchTool;
