use super::Plugin;
use crate::leveled::{LeveledList, ListKind};
use crate::record::Record;
use crate::utils::EspError;
use serde::Serialize;
use std::collections::HashMap;

/// 单种列表类型的合并结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListDiff {
    /// 累加器中原本没有、直接加入的列表
    pub added: Vec<String>,
    /// 与累加器中同名列表合并的列表
    pub merged: Vec<String>,
}

impl ListDiff {
    pub fn len(&self) -> usize {
        self.added.len() + self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.merged.is_empty()
    }
}

/// 一次合并的变更报告，按列表类型分组
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeDiff {
    #[serde(rename = "LEVC")]
    pub creatures: ListDiff,
    #[serde(rename = "LEVI")]
    pub items: ListDiff,
}

impl MergeDiff {
    pub fn get(&self, kind: ListKind) -> &ListDiff {
        match kind {
            ListKind::Creature => &self.creatures,
            ListKind::Item => &self.items,
        }
    }

    fn get_mut(&mut self, kind: ListKind) -> &mut ListDiff {
        match kind {
            ListKind::Creature => &mut self.creatures,
            ListKind::Item => &mut self.items,
        }
    }

    /// 新增与合并的列表总数
    pub fn change_count(&self) -> usize {
        self.creatures.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

impl Plugin {
    /// 将另一个插件的等级列表合并进来
    ///
    /// 对两种列表类型分别按列表 ID 匹配：本插件没有的直接复制追加到末尾，
    /// 已有的调用 `LeveledList::merge_with`，本插件中同名的记录都替换为合并结果。
    /// 有任何变更时把 `other` 加为依赖主文件（大小取其加载时的字节数），
    /// 并把头部记录数更新为当前记录总数。
    ///
    /// 返回 (变更报告, 变更数)。
    pub fn merge_with(&mut self, other: &Plugin) -> Result<(MergeDiff, usize), EspError> {
        let mut diff = MergeDiff::default();

        for kind in ListKind::ALL {
            // 同名列表的全部位置，合并目标取最后一个
            let mut mine: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
            for (index, record) in self.records.iter().enumerate() {
                if let Some(list) = record.as_list(kind) {
                    mine.entry(list.name_bytes().to_vec()).or_default().push(index);
                }
            }

            for record in Self::unique_lists(other, kind) {
                let Some(list) = record.as_list(kind) else {
                    continue;
                };
                let name = list.name_bytes().to_vec();

                match mine.get(&name) {
                    Some(indices) => {
                        self.merge_into_all(indices, list)?;
                        diff.get_mut(kind).merged.push(list.name());
                    }
                    None => {
                        mine.insert(name, vec![self.records.len()]);
                        self.records.push(record.clone());
                        diff.get_mut(kind).added.push(list.name());
                    }
                }
            }
        }

        let change_count = diff.change_count();
        if change_count > 0 {
            let record_count = i32::try_from(self.records.len()).unwrap_or(i32::MAX);
            let source_size = i64::try_from(other.file_size()).unwrap_or(i64::MAX);
            let header = self.header_mut();
            header.add_master_entry(&other.get_name(), source_size)?;
            header.set_record_count(record_count);
        }

        tracing::info!(
            source = %other.get_name(),
            added = diff.creatures.added.len() + diff.items.added.len(),
            merged = diff.creatures.merged.len() + diff.items.merged.len(),
            "合并等级列表"
        );

        Ok((diff, change_count))
    }

    /// 合并进最后一个同名列表，再用合并结果替换前面的同名记录
    fn merge_into_all(&mut self, indices: &[usize], list: &LeveledList) -> Result<(), EspError> {
        let Some((&last, earlier)) = indices.split_last() else {
            return Ok(());
        };

        if let Some(target) = self.records[last].leveled_mut() {
            target.merge_with(list)?;
        }

        if !earlier.is_empty() {
            let merged = self.records[last].clone();
            for &index in earlier {
                self.records[index] = merged.clone();
            }
        }

        Ok(())
    }

    /// 按列表 ID 去重：位置取首次出现，内容取最后一次出现
    fn unique_lists(other: &Plugin, kind: ListKind) -> Vec<&Record> {
        let mut order: Vec<&Record> = Vec::new();
        let mut positions: HashMap<&[u8], usize> = HashMap::new();

        for record in &other.records {
            if let Some(list) = record.as_list(kind) {
                match positions.get(list.name_bytes()) {
                    Some(&position) => order[position] = record,
                    None => {
                        positions.insert(list.name_bytes(), order.len());
                        order.push(record);
                    }
                }
            }
        }

        order
    }

    /// 删除从未被合并过的等级列表
    ///
    /// 多路合并结束后调用：只在一个来源中出现过的列表不需要合并，留下的只有
    /// 真正合并过的列表。重复调用结果不变。返回删除的数量。
    pub fn post_merge(&mut self) -> usize {
        let before = self.records.len();

        self.records.retain(|record| match record.leveled() {
            Some(list) => list.is_merged(),
            None => true,
        });

        let removed = before - self.records.len();
        tracing::debug!(removed, remaining = self.records.len(), "移除未合并的等级列表");
        removed
    }
}
