use crate::header::HeaderRecord;
use crate::io::EspReader;
use crate::leveled::{LeveledList, ListKind};
use crate::record::{Record, HEADER_TAG};
use crate::utils::EspError;
use memmap2::Mmap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

mod merge;
mod stats;
mod writer;

pub use merge::{ListDiff, MergeDiff};
pub use stats::PluginStats;

/// ESM/ESP 文件容器
///
/// 一个 TES3 头部记录加上按文件顺序排列的其他记录。
/// 容器独占其记录，合并时只从源容器复制字段，不共享记录对象。
#[derive(Debug, Clone)]
pub struct Plugin {
    /// 文件路径
    path: PathBuf,
    /// 头部记录（始终为 TES3）
    header: Record,
    /// 其他记录
    records: Vec<Record>,
    /// 解析时的文件字节数（新建插件为 0）
    file_size: u64,
}

impl Plugin {
    /// 加载插件文件
    ///
    /// 使用内存映射读取。任何解析错误都会使整个加载失败，不会返回部分解析的容器。
    pub fn load(path: PathBuf) -> Result<Self, EspError> {
        let file = std::fs::File::open(&path).map_err(|e| EspError::from_io(e, &path))?;
        if file.metadata()?.len() == 0 {
            return Self::from_bytes(path, &[]);
        }

        // SAFETY: 映射只在本函数内读取，解析结果全部复制到自有缓冲区
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(path, &mmap[..])
    }

    /// 使用自定义 Reader 加载插件文件
    pub fn load_with_reader(path: PathBuf, reader: &dyn EspReader) -> Result<Self, EspError> {
        let raw = reader.read(&path)?;
        Self::from_bytes(path, &raw.bytes)
    }

    /// 从字节解析；数据必须恰好在最后一个记录处结束
    pub fn from_bytes(path: PathBuf, data: &[u8]) -> Result<Self, EspError> {
        let mut cursor = Cursor::new(data);

        let header = Self::parse_header(&mut cursor)?;

        let mut records = Vec::new();
        while (cursor.position() as usize) < data.len() {
            let record = Record::parse(&mut cursor)?;
            if record.tag() == HEADER_TAG {
                return Err(EspError::MalformedHeader(format!(
                    "second TES3 record at record index {}",
                    records.len() + 1
                )));
            }
            records.push(record);
        }

        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "插件解析完成"
        );

        Ok(Plugin {
            path,
            header,
            records,
            file_size: data.len() as u64,
        })
    }

    fn parse_header(cursor: &mut Cursor<&[u8]>) -> Result<Record, EspError> {
        let data = *cursor.get_ref();
        if data.len() < 4 || &data[..4] != HEADER_TAG {
            return Err(EspError::MalformedHeader("file does not start with TES3".to_string()));
        }
        Record::parse(cursor)
    }

    /// 新建空插件（用作合并的初始累加器）
    pub fn new_empty(path: PathBuf) -> Self {
        Plugin {
            path,
            header: Record::new_header(HeaderRecord::new_plugin()),
            records: Vec::new(),
            file_size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载时读取的字节数，添加依赖主文件时用作 DATA 大小
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// 获取插件名称
    pub fn get_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn header(&self) -> &HeaderRecord {
        match self.header.header() {
            Some(header) => header,
            None => unreachable!("plugin header record always carries a TES3 body"),
        }
    }

    pub fn header_mut(&mut self) -> &mut HeaderRecord {
        match self.header.header_mut() {
            Some(header) => header,
            None => unreachable!("plugin header record always carries a TES3 body"),
        }
    }

    /// 头部记录本身（含信封字段）
    pub fn header_record(&self) -> &Record {
        &self.header
    }

    pub(crate) fn header_record_mut(&mut self) -> &mut Record {
        &mut self.header
    }

    /// 是否为主文件（fileType 非 0）
    pub fn is_master(&self) -> bool {
        !self.header().is_plugin()
    }

    /// 头部之后的所有记录
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// 追加记录到末尾
    pub fn push_record(&mut self, record: Record) -> Result<(), EspError> {
        if record.tag() == HEADER_TAG {
            return Err(EspError::InvalidOperation(
                "a plugin holds exactly one TES3 record".to_string(),
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// 按记录类型查找
    pub fn find_records(&self, tag: &[u8; 4]) -> Vec<&Record> {
        self.records.iter().filter(|record| record.tag() == tag).collect()
    }

    /// 指定类型的所有等级列表（文件顺序）
    pub fn leveled_lists(&self, kind: ListKind) -> impl Iterator<Item = &LeveledList> {
        self.records.iter().filter_map(move |record| record.as_list(kind))
    }

    /// 按列表 ID 查找（同名多个时取最后一个，与合并时的选择一致）
    pub fn find_list(&self, kind: ListKind, name: &str) -> Option<&LeveledList> {
        self.leveled_lists(kind)
            .filter(|list| list.name() == name)
            .last()
    }
}
