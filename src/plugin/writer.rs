use super::Plugin;
use crate::io::{DefaultEspWriter, EspWriter, RawEspData};
use crate::utils::EspError;
use std::path::Path;

impl Plugin {
    /// 序列化整个文件：头部记录，然后按顺序写出其余记录
    ///
    /// 脏记录在这里重新打包，未修改的记录原样输出。
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, EspError> {
        let mut output = Vec::new();

        self.header.write_to(&mut output)?;

        for record in &mut self.records {
            record.write_to(&mut output)?;
        }

        Ok(output)
    }

    /// 写入文件
    pub fn write_to_file(&mut self, path: &Path) -> Result<(), EspError> {
        self.write_with_writer(path, &DefaultEspWriter)
    }

    /// 使用自定义 Writer 写入
    pub fn write_with_writer(&mut self, path: &Path, writer: &dyn EspWriter) -> Result<(), EspError> {
        let bytes = self.to_bytes()?;

        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            records = self.records.len(),
            "写入插件"
        );

        writer.write(&RawEspData { bytes }, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leveled::{LeveledEntry, LeveledList, ListKind};
    use crate::record::Record;
    use std::path::PathBuf;

    #[test]
    fn test_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("Merged_Lists.esp");

        let mut plugin = Plugin::new_empty(PathBuf::from("Merged_Lists.esp"));
        plugin.header_mut().set_author("Orcax").unwrap();
        let mut list = LeveledList::new(ListKind::Creature, "ex_rats");
        list.push_entry(LeveledEntry::new(1, "rat"));
        plugin.push_record(Record::new_leveled(list)).unwrap();
        plugin.write_to_file(&path).unwrap();

        let reloaded = Plugin::load(path.clone()).unwrap();
        assert_eq!(reloaded.header().author(), "Orcax");
        assert_eq!(reloaded.records().len(), 1);
        assert_eq!(
            reloaded.find_list(ListKind::Creature, "ex_rats").unwrap().entries(),
            &[LeveledEntry::new(1, "rat")]
        );
        assert_eq!(std::fs::read(&path).unwrap(), plugin.to_bytes().unwrap());
    }
}
