//! 多插件等级列表合并
//!
//! 按调用方给出的加载顺序，把每个启用的插件依次合并进一个累加器，
//! 最后删除未合并的列表并写出结果。

use crate::config::MergeConfig;
use crate::io::{DefaultEspReader, EspReader};
use crate::plugin::{MergeDiff, Plugin};
use crate::utils::{create_backup, is_blacklisted, EspError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 单个插件的合并结果
#[derive(Debug, Clone, Serialize)]
pub struct FoldStep {
    /// 插件文件名
    pub plugin: String,
    pub path: PathBuf,
    pub diff: MergeDiff,
    pub change_count: usize,
}

/// 整个合并过程的报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub steps: Vec<FoldStep>,
    /// 因黑名单跳过的插件
    pub skipped: Vec<String>,
    /// post_merge 删除的列表数
    pub removed_unmerged: usize,
}

impl MergeReport {
    /// 所有插件的变更总数
    pub fn total_changes(&self) -> usize {
        self.steps.iter().map(|step| step.change_count).sum()
    }
}

/// 合并结果：累加器 + 报告
#[derive(Debug)]
pub struct MergeOutcome {
    pub plugin: Plugin,
    pub report: MergeReport,
}

impl MergeOutcome {
    /// 写出合并结果；`backup` 为真且目标已存在时先备份
    ///
    /// 返回备份文件路径（如有）。
    pub fn write(&mut self, path: &Path, backup: bool) -> Result<Option<PathBuf>, EspError> {
        let backup_path = if backup && path.exists() {
            let backup_path = create_backup(path)?;
            tracing::info!(backup = %backup_path.display(), "已备份现有输出文件");
            Some(backup_path)
        } else {
            None
        };

        self.plugin.write_to_file(path)?;
        tracing::info!(
            output = %path.display(),
            records = self.plugin.records().len(),
            "合并结果已写入"
        );

        Ok(backup_path)
    }
}

/// 等级列表合并器
#[derive(Debug, Clone, Default)]
pub struct LevelListMerger {
    config: MergeConfig,
}

impl LevelListMerger {
    pub fn new(config: MergeConfig) -> Self {
        LevelListMerger { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// 按顺序合并所有启用的插件
    pub fn run(&self, enabled_plugins: &[PathBuf]) -> Result<MergeOutcome, EspError> {
        self.run_with_reader(enabled_plugins, &DefaultEspReader)
    }

    /// 使用自定义 Reader 合并
    ///
    /// 任意一个插件解析或合并失败都会中止整个过程，错误中带有该插件路径。
    pub fn run_with_reader(
        &self,
        enabled_plugins: &[PathBuf],
        reader: &dyn EspReader,
    ) -> Result<MergeOutcome, EspError> {
        let mut accumulator = self.build_accumulator(reader)?;
        let mut report = MergeReport::default();

        for path in enabled_plugins {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            if is_blacklisted(&name, &self.config.never_merge) {
                tracing::info!(plugin = %name, "跳过黑名单中的插件");
                report.skipped.push(name);
                continue;
            }

            tracing::info!(plugin = %name, "正在合并");
            let source = Plugin::load_with_reader(path.clone(), reader)
                .map_err(|e| e.in_source(path))?;
            let (diff, change_count) = accumulator
                .merge_with(&source)
                .map_err(|e| e.in_source(path))?;

            report.steps.push(FoldStep {
                plugin: name,
                path: path.clone(),
                diff,
                change_count,
            });
        }

        if !self.config.keep_unmerged {
            report.removed_unmerged = accumulator.post_merge();
        }

        let record_count = i32::try_from(accumulator.records().len()).unwrap_or(i32::MAX);
        if accumulator.header().record_count() != record_count {
            accumulator.header_mut().set_record_count(record_count);
        }

        Ok(MergeOutcome {
            plugin: accumulator,
            report,
        })
    }

    /// 初始累加器：模板文件或新建空插件，然后应用作者与描述
    fn build_accumulator(&self, reader: &dyn EspReader) -> Result<Plugin, EspError> {
        let mut accumulator = match &self.config.template {
            Some(template) => Plugin::load_with_reader(template.clone(), reader)
                .map_err(|e| e.in_source(template))?,
            None => Plugin::new_empty(self.config.output.clone()),
        };

        if let Some(author) = &self.config.author {
            accumulator.header_mut().set_author(author)?;
        }
        if let Some(description) = &self.config.description {
            accumulator.header_mut().set_description(description)?;
        }

        Ok(accumulator)
    }
}
