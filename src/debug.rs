use crate::plugin::Plugin;
use crate::record::{Record, RecordBody};
use crate::subrecord::Subrecord;
use crate::utils::EspError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// ESP文件结构调试器
pub struct EspDebugger;

impl EspDebugger {
    /// 生成详细的文件结构dump
    pub fn dump_file_structure(plugin: &mut Plugin, output_path: &Path) -> Result<(), EspError> {
        let mut output = File::create(output_path)?;
        Self::dump_to(plugin, &mut output)
    }

    /// 将结构dump写入任意输出
    pub fn dump_to(plugin: &mut Plugin, output: &mut dyn Write) -> Result<(), EspError> {
        Self::write_header_info(output, plugin)?;
        Self::write_masters_info(output, plugin)?;
        Self::write_records_info(output, plugin)?;
        Ok(())
    }

    /// 写入头部信息
    fn write_header_info(output: &mut dyn Write, plugin: &mut Plugin) -> Result<(), EspError> {
        writeln!(output, "=== ESP文件结构dump ===")?;
        writeln!(output, "文件: {}", plugin.get_name())?;
        writeln!(output, "类型: {}", plugin.get_type())?;
        writeln!(output, "主文件: {}", if plugin.is_master() { "是" } else { "否" })?;
        writeln!(output)?;

        writeln!(output, "=== 头部记录 ===")?;
        Self::dump_record(plugin.header_record_mut(), output, 0)?;
        writeln!(output)?;

        Ok(())
    }

    /// 写入主文件信息
    fn write_masters_info(output: &mut dyn Write, plugin: &Plugin) -> Result<(), EspError> {
        let masters = plugin.header().masters();
        writeln!(output, "=== 主文件列表 ({}) ===", masters.len())?;
        for (i, master) in masters.iter().enumerate() {
            writeln!(output, "  {}: {} ({} bytes)", i, master.name(), master.size())?;
        }
        writeln!(output)?;
        Ok(())
    }

    /// 写入记录信息
    fn write_records_info(output: &mut dyn Write, plugin: &mut Plugin) -> Result<(), EspError> {
        writeln!(output, "=== 记录 ({}) ===", plugin.records().len())?;
        for (i, record) in plugin.records_mut().iter_mut().enumerate() {
            writeln!(output, "记录 {}:", i)?;
            Self::dump_record(record, output, 0)?;
        }
        Ok(())
    }

    /// Dump 记录结构
    fn dump_record(record: &mut Record, output: &mut dyn Write, indent: usize) -> Result<(), EspError> {
        let prefix = "  ".repeat(indent);
        let subrecords = record.subrecords()?;
        let data_size = record.size()?;

        writeln!(output, "{}{} {{", prefix, record.tag_str())?;
        writeln!(output, "{}  原始类型字节: {:?}", prefix, record.tag())?;
        writeln!(output, "{}  数据大小: {} bytes", prefix, data_size)?;
        writeln!(output, "{}  删除标志: 0x{:08X}", prefix, record.delete_flag())?;
        writeln!(output, "{}  标志位: 0x{:08X}", prefix, record.record_flags())?;
        Self::dump_body(record.body(), output, &prefix)?;
        writeln!(output, "{}  子记录数: {}", prefix, subrecords.len())?;

        for (i, subrecord) in subrecords.iter().enumerate() {
            writeln!(output, "{}  子记录 {}:", prefix, i)?;
            Self::dump_subrecord(subrecord, output, indent + 2)?;
        }

        writeln!(output, "{}}}", prefix)?;
        Ok(())
    }

    /// 类型化记录的摘要
    fn dump_body(body: &RecordBody, output: &mut dyn Write, prefix: &str) -> Result<(), EspError> {
        match body {
            RecordBody::Header(header) => {
                writeln!(output, "{}  版本: {:.2}", prefix, header.version())?;
                writeln!(output, "{}  文件类型: {}", prefix, header.file_type())?;
                writeln!(output, "{}  作者: \"{}\"", prefix, header.author())?;
                writeln!(output, "{}  声明记录数: {}", prefix, header.record_count())?;
            }
            RecordBody::LeveledCreature(list) | RecordBody::LeveledItem(list) => {
                writeln!(output, "{}  列表ID: \"{}\"", prefix, list.name())?;
                writeln!(
                    output,
                    "{}  allLevels: {}, allItems: {}, chanceNone: {}",
                    prefix,
                    list.all_levels(),
                    list.all_items(),
                    list.chance_none()
                )?;
                for entry in list.entries() {
                    writeln!(output, "{}    [{}] {}", prefix, entry.level, entry.object_name())?;
                }
            }
            RecordBody::Opaque => {}
        }
        Ok(())
    }

    /// Dump 子记录结构
    fn dump_subrecord(subrecord: &Subrecord, output: &mut dyn Write, indent: usize) -> Result<(), EspError> {
        let prefix = "  ".repeat(indent);

        writeln!(output, "{}{} {{", prefix, subrecord.tag_str())?;
        writeln!(output, "{}  大小: {} bytes", prefix, subrecord.size())?;
        Self::dump_subrecord_data(output, &prefix, subrecord)?;
        writeln!(output, "{}}}", prefix)?;
        Ok(())
    }

    /// Dump子记录数据
    fn dump_subrecord_data(output: &mut dyn Write, prefix: &str, subrecord: &Subrecord) -> Result<(), EspError> {
        let data = subrecord.data();
        if data.is_empty() {
            return Ok(());
        }

        let preview_len = std::cmp::min(32, data.len());
        let hex_data: Vec<String> = data[..preview_len]
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        writeln!(
            output,
            "{}  数据预览: {}{}",
            prefix,
            hex_data.join(" "),
            if data.len() > 32 { "..." } else { "" }
        )?;

        if Self::is_likely_string_subrecord(subrecord.tag()) {
            let text = crate::datatypes::decode_text(crate::datatypes::trim_nul(data));
            if !text.is_empty() {
                writeln!(output, "{}  文本内容: \"{}\"", prefix, text)?;
            }
        }
        Ok(())
    }

    /// 判断是否可能是字符串类型的子记录
    fn is_likely_string_subrecord(tag: &[u8; 4]) -> bool {
        matches!(tag, b"NAME" | b"MAST" | b"CNAM" | b"INAM" | b"FNAM" | b"DESC")
    }

    /// 对比两个文件的结构
    pub fn compare_structures(
        original: &mut Plugin,
        rebuilt: &mut Plugin,
        output: &mut dyn Write,
    ) -> Result<usize, EspError> {
        writeln!(output, "=== ESP文件结构对比 ===")?;
        writeln!(output, "原始文件: {}", original.path().display())?;
        writeln!(output, "重建文件: {}", rebuilt.path().display())?;
        writeln!(
            output,
            "记录数: {} vs {}",
            original.records().len(),
            rebuilt.records().len()
        )?;

        let mut mismatches =
            Self::compare_records(original.header_record_mut(), rebuilt.header_record_mut(), output, "头部")?;

        for (i, (left, right)) in original
            .records_mut()
            .iter_mut()
            .zip(rebuilt.records_mut().iter_mut())
            .enumerate()
        {
            mismatches += Self::compare_records(left, right, output, &format!("记录 {}", i))?;
        }

        if original.records().len() != rebuilt.records().len() {
            writeln!(output, "⚠ 记录数量不匹配！")?;
            mismatches += 1;
        }

        Ok(mismatches)
    }

    /// 对比两个记录，返回差异数
    fn compare_records(
        original: &mut Record,
        rebuilt: &mut Record,
        output: &mut dyn Write,
        name: &str,
    ) -> Result<usize, EspError> {
        let mut mismatches = 0;
        if original.tag() != rebuilt.tag() {
            writeln!(output, "  ⚠ {} 记录类型不匹配: {} vs {}", name, original.tag_str(), rebuilt.tag_str())?;
            mismatches += 1;
        }
        if original.delete_flag() != rebuilt.delete_flag() || original.record_flags() != rebuilt.record_flags() {
            writeln!(
                output,
                "  ⚠ {} 标志位不匹配: 0x{:08X}/0x{:08X} vs 0x{:08X}/0x{:08X}",
                name,
                original.delete_flag(),
                original.record_flags(),
                rebuilt.delete_flag(),
                rebuilt.record_flags()
            )?;
            mismatches += 1;
        }
        if original.payload()? != rebuilt.payload()? {
            writeln!(
                output,
                "  ⚠ {} 数据不一致: {} vs {} bytes",
                name,
                original.size()?,
                rebuilt.size()?
            )?;
            mismatches += 1;
        }
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leveled::{LeveledEntry, LeveledList, ListKind};
    use std::path::PathBuf;

    fn sample_plugin() -> Plugin {
        let mut plugin = Plugin::new_empty(PathBuf::from("Sample.esp"));
        let mut list = LeveledList::new(ListKind::Item, "random_gold");
        list.push_entry(LeveledEntry::new(1, "Gold_001"));
        plugin.push_record(Record::new_leveled(list)).unwrap();
        plugin
    }

    #[test]
    fn test_dump_contains_records() {
        let mut plugin = sample_plugin();
        let mut output = Vec::new();
        EspDebugger::dump_to(&mut plugin, &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("TES3 {"));
        assert!(text.contains("LEVI {"));
        assert!(text.contains("文本内容: \"random_gold\""));
        assert!(text.contains("[1] Gold_001"));
    }

    #[test]
    fn test_compare_identical_and_different() {
        let mut left = sample_plugin();
        let mut right = sample_plugin();
        let mut output = Vec::new();
        assert_eq!(EspDebugger::compare_structures(&mut left, &mut right, &mut output).unwrap(), 0);

        right.push_record(Record::new_leveled(LeveledList::new(ListKind::Creature, "rats"))).unwrap();
        let mut output = Vec::new();
        assert_eq!(EspDebugger::compare_structures(&mut left, &mut right, &mut output).unwrap(), 1);
    }
}
