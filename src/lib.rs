pub mod config;
pub mod datatypes;
pub mod debug;
pub mod header;
pub mod io;
pub mod leveled;
pub mod merger;
pub mod plugin;
pub mod record;
pub mod subrecord;
pub mod utils;

// 重新导出主要结构
pub use config::MergeConfig;
pub use debug::EspDebugger;
pub use header::{HeaderRecord, MasterEntry};
pub use leveled::{LeveledEntry, LeveledList, ListKind};
pub use merger::{FoldStep, LevelListMerger, MergeOutcome, MergeReport};
pub use plugin::{ListDiff, MergeDiff, Plugin, PluginStats};
pub use record::{Record, RecordBody};
pub use subrecord::Subrecord;
pub use utils::EspError;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["esm", "esp", "omwaddon"];
