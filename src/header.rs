// TES3 文件头记录
//
// HEDR 布局：version(f32) fileType(i32) author(32) description(256) recordCount(i32)
// 之后每个依赖主文件一对 MAST + DATA。

use crate::datatypes::{
    decode_text, encode_text, pack_fixed, pack_zstring, read_f32, read_i32, read_i64, trim_nul,
    write_f32, write_i32, write_i64,
};
use crate::subrecord::Subrecord;
use crate::utils::EspError;
use std::io::Cursor;
use std::path::Path;

pub const AUTHOR_LEN: usize = 32;
pub const DESCRIPTION_LEN: usize = 256;
/// HEDR 子记录数据的固定长度
pub const HEDR_SIZE: usize = 4 + 4 + AUTHOR_LEN + DESCRIPTION_LEN + 4;
/// 新建插件使用的格式版本
pub const DEFAULT_VERSION: f32 = 1.3;
/// fileType 为 0 表示插件（ESP）
pub const FILE_TYPE_PLUGIN: i32 = 0;

/// MAST 后 DATA 的宽度
///
/// 游戏和官方编辑器写 8 字节；部分旧工具写 4 字节。读取时记住宽度，
/// 保证未修改的头部重新打包后不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterSizeWidth {
    Four,
    Eight,
}

/// 依赖主文件条目
#[derive(Debug, Clone, PartialEq)]
pub struct MasterEntry {
    /// 主文件名（不含 NUL）
    name: Vec<u8>,
    /// 主文件字节大小
    size: i64,
    width: MasterSizeWidth,
}

impl MasterEntry {
    pub fn new(name: Vec<u8>, size: i64) -> Self {
        MasterEntry {
            name,
            size,
            width: MasterSizeWidth::Eight,
        }
    }

    pub fn name(&self) -> String {
        decode_text(&self.name)
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn width(&self) -> MasterSizeWidth {
        self.width
    }
}

/// 文件头记录（TES3）
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    version: f32,
    file_type: i32,
    author: Vec<u8>,
    description: Vec<u8>,
    record_count: i32,
    masters: Vec<MasterEntry>,
    /// 字段被修改，payload 需要重新打包
    changed: bool,
}

impl HeaderRecord {
    /// 创建空插件头部（版本 1.3，ESP，无依赖）
    pub fn new_plugin() -> Self {
        HeaderRecord {
            version: DEFAULT_VERSION,
            file_type: FILE_TYPE_PLUGIN,
            author: Vec::new(),
            description: Vec::new(),
            record_count: 0,
            masters: Vec::new(),
            changed: true,
        }
    }

    /// 从子记录解析头部
    pub fn unpack(subrecords: &[Subrecord]) -> Result<Self, EspError> {
        let mut hedr: Option<&Subrecord> = None;
        let mut masters = Vec::new();
        let mut pending_master: Option<Vec<u8>> = None;

        for sub in subrecords {
            match sub.tag() {
                b"HEDR" => hedr = Some(sub),
                b"MAST" => {
                    if let Some(name) = pending_master.take() {
                        return Err(EspError::MalformedHeader(format!(
                            "MAST {} has no DATA subrecord",
                            decode_text(&name)
                        )));
                    }
                    pending_master = Some(trim_nul(sub.data()).to_vec());
                }
                b"DATA" => {
                    let name = pending_master.take().ok_or_else(|| {
                        EspError::MalformedHeader("DATA subrecord without preceding MAST".to_string())
                    })?;
                    let (size, width) = Self::unpack_master_size(sub.data())?;
                    masters.push(MasterEntry { name, size, width });
                }
                _ => {
                    tracing::warn!(subrecord = %sub.tag_str(), "忽略头部中的未知子记录");
                }
            }
        }

        if let Some(name) = pending_master {
            return Err(EspError::MalformedHeader(format!(
                "MAST {} has no DATA subrecord",
                decode_text(&name)
            )));
        }

        let hedr = hedr.ok_or_else(|| EspError::MalformedHeader("missing HEDR subrecord".to_string()))?;
        if hedr.size() != HEDR_SIZE {
            return Err(EspError::MalformedHeader(format!(
                "HEDR is {} bytes, expected {}",
                hedr.size(),
                HEDR_SIZE
            )));
        }

        let data = hedr.data();
        let mut cursor = Cursor::new(data);
        let version = read_f32(&mut cursor)?;
        let file_type = read_i32(&mut cursor)?;
        let author_start = cursor.position() as usize;
        let description_start = author_start + AUTHOR_LEN;
        let count_start = description_start + DESCRIPTION_LEN;
        let author = trim_nul(&data[author_start..description_start]).to_vec();
        let description = trim_nul(&data[description_start..count_start]).to_vec();
        cursor.set_position(count_start as u64);
        let record_count = read_i32(&mut cursor)?;

        Ok(HeaderRecord {
            version,
            file_type,
            author,
            description,
            record_count,
            masters,
            changed: false,
        })
    }

    fn unpack_master_size(data: &[u8]) -> Result<(i64, MasterSizeWidth), EspError> {
        let mut cursor = Cursor::new(data);
        match data.len() {
            8 => Ok((read_i64(&mut cursor)?, MasterSizeWidth::Eight)),
            4 => Ok((read_i32(&mut cursor)? as i64, MasterSizeWidth::Four)),
            other => Err(EspError::MalformedHeader(format!(
                "master DATA is {} bytes, expected 4 or 8",
                other
            ))),
        }
    }

    /// 重新打包为子记录序列：HEDR，然后按顺序每个主文件一对 MAST + DATA
    pub fn to_subrecords(&self) -> Result<Vec<Subrecord>, EspError> {
        let mut subrecords = Vec::with_capacity(1 + self.masters.len() * 2);

        let mut hedr = Vec::with_capacity(HEDR_SIZE);
        write_f32(&mut hedr, self.version)?;
        write_i32(&mut hedr, self.file_type)?;
        hedr.extend(pack_fixed(&self.author, AUTHOR_LEN));
        hedr.extend(pack_fixed(&self.description, DESCRIPTION_LEN));
        write_i32(&mut hedr, self.record_count)?;
        subrecords.push(Subrecord::new(*b"HEDR", hedr));

        for master in &self.masters {
            subrecords.push(Subrecord::new(*b"MAST", pack_zstring(&master.name)));
            let mut size = Vec::with_capacity(8);
            match master.width {
                MasterSizeWidth::Eight => write_i64(&mut size, master.size)?,
                MasterSizeWidth::Four => write_i32(&mut size, master.size as i32)?,
            }
            subrecords.push(Subrecord::new(*b"DATA", size));
        }

        Ok(subrecords)
    }

    /// 添加依赖主文件，名称取路径的文件名，大小取文件实际大小
    ///
    /// 只有插件（fileType 0）可以声明主文件。
    pub fn add_master(&mut self, path: &Path) -> Result<(), EspError> {
        self.ensure_plugin()?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| EspError::InvalidOperation(format!("{:?} has no file name", path)))?;
        let metadata = std::fs::metadata(path).map_err(|e| EspError::from_io(e, path))?;

        self.add_master_entry(file_name, metadata.len() as i64)
    }

    /// 添加依赖主文件（已知名称和大小）
    pub fn add_master_entry(&mut self, name: &str, size: i64) -> Result<(), EspError> {
        self.ensure_plugin()?;

        let name = encode_text(name).ok_or_else(|| {
            EspError::InvalidOperation(format!("master name {} is not representable", name))
        })?;
        self.masters.push(MasterEntry::new(name, size));
        self.changed = true;
        Ok(())
    }

    fn ensure_plugin(&self) -> Result<(), EspError> {
        if self.file_type != FILE_TYPE_PLUGIN {
            return Err(EspError::InvalidOperation(format!(
                "only plugins can have masters (file type {})",
                self.file_type
            )));
        }
        Ok(())
    }

    pub fn set_author(&mut self, author: &str) -> Result<(), EspError> {
        self.author = Self::encode_field("author", author, AUTHOR_LEN)?;
        self.changed = true;
        Ok(())
    }

    pub fn set_description(&mut self, description: &str) -> Result<(), EspError> {
        self.description = Self::encode_field("description", description, DESCRIPTION_LEN)?;
        self.changed = true;
        Ok(())
    }

    fn encode_field(field: &'static str, text: &str, limit: usize) -> Result<Vec<u8>, EspError> {
        let encoded = encode_text(text).ok_or_else(|| {
            EspError::InvalidOperation(format!("{} contains characters outside Windows-1252", field))
        })?;
        if encoded.len() > limit {
            return Err(EspError::FieldTooLong {
                field,
                limit,
                actual: encoded.len(),
            });
        }
        Ok(encoded)
    }

    pub fn set_record_count(&mut self, count: i32) {
        self.record_count = count;
        self.changed = true;
    }

    pub fn version(&self) -> f32 {
        self.version
    }

    pub fn file_type(&self) -> i32 {
        self.file_type
    }

    pub fn is_plugin(&self) -> bool {
        self.file_type == FILE_TYPE_PLUGIN
    }

    pub fn author(&self) -> String {
        decode_text(&self.author)
    }

    pub fn description(&self) -> String {
        decode_text(&self.description)
    }

    pub fn record_count(&self) -> i32 {
        self.record_count
    }

    pub fn masters(&self) -> &[MasterEntry] {
        &self.masters
    }

    pub(crate) fn is_changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
    }
}
