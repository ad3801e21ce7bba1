//! 合并配置
//!
//! 以 JSON 文件保存，所有字段都有默认值，缺省的字段自动补全。
//!
//! ```json
//! {
//!   "never_merge": ["Morrowind.esm", "Tribunal.esm", "Bloodmoon.esm", "Merged_Lists.esp"],
//!   "output": "Merged_Lists.esp",
//!   "keep_unmerged": false
//! }
//! ```

use crate::utils::EspError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 默认不参与合并的文件
pub const DEFAULT_NEVER_MERGE: &[&str] = &[
    "Morrowind.esm",
    "Tribunal.esm",
    "Bloodmoon.esm",
    "Merged_Lists.esp",
];

/// 默认输出文件名
pub const DEFAULT_OUTPUT: &str = "Merged_Lists.esp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// 不参与合并的插件文件名（大小写不敏感）
    pub never_merge: Vec<String>,
    /// 输出文件路径
    pub output: PathBuf,
    /// 初始累加器模板；为空时新建空插件
    pub template: Option<PathBuf>,
    /// 输出文件头部的作者（最多 32 字节）
    pub author: Option<String>,
    /// 输出文件头部的描述（最多 256 字节）
    pub description: Option<String>,
    /// 保留只在一个来源出现过的列表（跳过 post_merge）
    pub keep_unmerged: bool,
    /// 覆盖前备份已存在的输出文件
    pub backup_existing: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            never_merge: DEFAULT_NEVER_MERGE.iter().map(|name| name.to_string()).collect(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            template: None,
            author: None,
            description: None,
            keep_unmerged: false,
            backup_existing: true,
        }
    }
}

impl MergeConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self, EspError> {
        let content = std::fs::read_to_string(path).map_err(|e| EspError::from_io(e, path))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 保存为 JSON 文件
    pub fn save(&self, path: &Path) -> Result<(), EspError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
