pub mod agent;

pub use agent::{Agent, AgentEvent, OrenoAgent, OrenoAgentBuilder, Subscription};
