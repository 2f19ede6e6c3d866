pub mod bridge;
pub mod channel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fill;
pub mod imports;
pub mod indicator;
pub mod matcher;
pub mod recheck;
pub mod report;
pub mod rule;
pub mod store;
pub mod tab;
pub mod workflow;

// Public API
pub use bridge::{Bridge, BridgeServer};
pub use channel::{HostEvent, PageChannel, PageConnection, PagePush, PageReply, PageRequest};
pub use config::{Config, Settings};
pub use engine::{Engine, EngineEvent, EngineHandle, EngineOptions, PassOutcome, Services};
pub use error::EngineError;
pub use fill::{BeforeHook, FillPipeline, FillReport, HookContext, HookRegistry, ScreenCapture};
pub use rule::{Field, MatchSet, Rule, RunningWorkflowState, Workflow};
pub use store::{JsonFileStore, MemoryStore, RuleBook, StateKey, StateStore};
pub use tab::{Tab, TabId};
