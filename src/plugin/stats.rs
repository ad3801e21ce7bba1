use super::Plugin;
use crate::leveled::ListKind;

/// 插件统计信息
pub struct PluginStats {
    pub name: String,
    pub plugin_type: String,
    pub is_master: bool,
    pub version: f32,
    pub author: String,
    pub description: String,
    pub masters: Vec<(String, i64)>,
    /// 头部声明的记录数
    pub declared_record_count: i32,
    /// 实际记录数（不含头部）
    pub record_count: usize,
    pub creature_lists: usize,
    pub item_lists: usize,
}

impl std::fmt::Display for PluginStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== 插件统计信息 ===")?;
        writeln!(f, "名称: {}", self.name)?;
        writeln!(f, "类型: {}", self.plugin_type)?;
        writeln!(f, "主文件: {}", if self.is_master { "是" } else { "否" })?;
        writeln!(f, "版本: {:.2}", self.version)?;
        writeln!(f, "作者: {}", self.author)?;
        writeln!(f, "描述: {}", self.description)?;
        writeln!(f, "依赖主文件数: {}", self.masters.len())?;
        for (name, size) in &self.masters {
            writeln!(f, "  - {} ({} bytes)", name, size)?;
        }
        writeln!(f, "声明记录数: {}", self.declared_record_count)?;
        writeln!(f, "实际记录数: {}", self.record_count)?;
        writeln!(f, "生物等级列表 (LEVC): {}", self.creature_lists)?;
        writeln!(f, "物品等级列表 (LEVI): {}", self.item_lists)?;
        Ok(())
    }
}

impl Plugin {
    /// 获取统计信息
    pub fn get_stats(&self) -> PluginStats {
        let header = self.header();

        PluginStats {
            name: self.get_name(),
            plugin_type: self.get_type().to_string(),
            is_master: self.is_master(),
            version: header.version(),
            author: header.author(),
            description: header.description(),
            masters: header
                .masters()
                .iter()
                .map(|master| (master.name(), master.size()))
                .collect(),
            declared_record_count: header.record_count(),
            record_count: self.records.len(),
            creature_lists: self.leveled_lists(ListKind::Creature).count(),
            item_lists: self.leveled_lists(ListKind::Item).count(),
        }
    }

    /// 获取插件类型（按头部 fileType，而非扩展名）
    pub fn get_type(&self) -> &str {
        if self.is_master() {
            "主文件 (ESM)"
        } else {
            "插件 (ESP)"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leveled::LeveledList;
    use crate::record::Record;
    use std::path::PathBuf;

    #[test]
    fn test_stats_counts_lists() {
        let mut plugin = Plugin::new_empty(PathBuf::from("Lists.esp"));
        plugin.header_mut().add_master_entry("Morrowind.esm", 79837557).unwrap();
        plugin
            .push_record(Record::new_leveled(LeveledList::new(ListKind::Creature, "a")))
            .unwrap();
        plugin
            .push_record(Record::new_leveled(LeveledList::new(ListKind::Item, "b")))
            .unwrap();
        plugin
            .push_record(Record::new_leveled(LeveledList::new(ListKind::Item, "c")))
            .unwrap();

        let stats = plugin.get_stats();
        assert_eq!(stats.name, "Lists.esp");
        assert!(!stats.is_master);
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.creature_lists, 1);
        assert_eq!(stats.item_lists, 2);
        assert_eq!(stats.masters, vec![("Morrowind.esm".to_string(), 79837557)]);

        let text = stats.to_string();
        assert!(text.contains("Morrowind.esm"));
        assert!(text.contains("物品等级列表 (LEVI): 2"));
    }
}
