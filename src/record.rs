use crate::datatypes::{read_i32, write_i32};
use crate::header::HeaderRecord;
use crate::leveled::{LeveledList, ListKind};
use crate::subrecord::Subrecord;
use crate::utils::EspError;
use std::io::{Cursor, Read};

/// 记录头部大小：tag(4) + payloadSize(4) + deleteFlag(4) + recordFlag(4)
pub const RECORD_HEADER_SIZE: usize = 16;
/// 文件头记录类型
pub const HEADER_TAG: &[u8; 4] = b"TES3";

/// 按记录类型区分的记录内容
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    /// TES3 文件头
    Header(HeaderRecord),
    /// LEVC
    LeveledCreature(LeveledList),
    /// LEVI
    LeveledItem(LeveledList),
    /// 其他记录，payload 原样保留
    Opaque,
}

/// 记录结构
///
/// `payload` 是派生缓存：类型化字段被修改后标记为脏，
/// 读取 `payload()`/`size()` 或序列化时才重新打包。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 记录类型（原始4字节）
    tag: [u8; 4],
    /// 删除标志
    delete_flag: i32,
    /// 记录标志（不解释，原样保存）
    record_flags: i32,
    /// 子记录拼接而成的数据
    payload: Vec<u8>,
    body: RecordBody,
}

impl Record {
    /// 解析记录
    ///
    /// 读取 16 字节头部和 payloadSize 字节数据，然后按类型分派。
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, EspError> {
        Self::validate_available(cursor, RECORD_HEADER_SIZE, "record header")?;

        let mut tag = [0u8; 4];
        cursor.read_exact(&mut tag)?;
        let tag_str = String::from_utf8_lossy(&tag).into_owned();

        let payload_size = read_i32(cursor)?;
        let delete_flag = read_i32(cursor)?;
        let record_flags = read_i32(cursor)?;

        let payload_size = usize::try_from(payload_size).map_err(|_| EspError::MalformedRecord {
            tag: tag_str.clone(),
            reason: format!("negative payload size {}", payload_size),
        })?;
        Self::validate_available(cursor, payload_size, &format!("{} record payload", tag_str))?;

        let mut payload = vec![0u8; payload_size];
        cursor.read_exact(&mut payload)?;

        Self::from_parts(tag, delete_flag, record_flags, payload)
    }

    /// 由已读取的各部分构造记录，按类型解码特殊记录
    pub fn from_parts(
        tag: [u8; 4],
        delete_flag: i32,
        record_flags: i32,
        payload: Vec<u8>,
    ) -> Result<Self, EspError> {
        let body = match &tag {
            HEADER_TAG => RecordBody::Header(HeaderRecord::unpack(&Subrecord::parse_all(&payload)?)?),
            b"LEVC" => RecordBody::LeveledCreature(LeveledList::unpack(
                ListKind::Creature,
                &Subrecord::parse_all(&payload)?,
            )?),
            b"LEVI" => RecordBody::LeveledItem(LeveledList::unpack(
                ListKind::Item,
                &Subrecord::parse_all(&payload)?,
            )?),
            _ => RecordBody::Opaque,
        };

        Ok(Record {
            tag,
            delete_flag,
            record_flags,
            payload,
            body,
        })
    }

    /// 新建文件头记录（payload 在首次读取时生成）
    pub fn new_header(header: HeaderRecord) -> Self {
        let mut header = header;
        header.mark_changed();
        Record {
            tag: *HEADER_TAG,
            delete_flag: 0,
            record_flags: 0,
            payload: Vec::new(),
            body: RecordBody::Header(header),
        }
    }

    /// 新建等级列表记录
    pub fn new_leveled(list: LeveledList) -> Self {
        let mut list = list;
        list.mark_changed();
        let tag = *list.kind().tag();
        let body = match list.kind() {
            ListKind::Creature => RecordBody::LeveledCreature(list),
            ListKind::Item => RecordBody::LeveledItem(list),
        };
        Record {
            tag,
            delete_flag: 0,
            record_flags: 0,
            payload: Vec::new(),
            body,
        }
    }

    fn validate_available(cursor: &Cursor<&[u8]>, needed: usize, context: &str) -> Result<(), EspError> {
        let available = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
        if needed > available {
            return Err(EspError::TruncatedInput {
                context: context.to_string(),
                expected: needed,
                available,
            });
        }
        Ok(())
    }

    /// 类型化字段是否被修改、payload 是否过期
    pub fn is_dirty(&self) -> bool {
        match &self.body {
            RecordBody::Header(header) => header.is_changed(),
            RecordBody::LeveledCreature(list) | RecordBody::LeveledItem(list) => list.is_changed(),
            RecordBody::Opaque => false,
        }
    }

    /// 若为脏则根据类型化字段重建 payload 并清除脏标记
    pub fn materialize(&mut self) -> Result<(), EspError> {
        if !self.is_dirty() {
            return Ok(());
        }

        let subrecords = match &mut self.body {
            RecordBody::Header(header) => {
                let subrecords = header.to_subrecords()?;
                header.clear_changed();
                subrecords
            }
            RecordBody::LeveledCreature(list) | RecordBody::LeveledItem(list) => {
                let subrecords = list.to_subrecords()?;
                list.clear_changed();
                subrecords
            }
            RecordBody::Opaque => return Ok(()),
        };

        let mut payload = Vec::with_capacity(self.payload.len());
        for subrecord in &subrecords {
            subrecord.write_to(&mut payload)?;
        }

        tracing::trace!(
            tag = %self.tag_str(),
            old_size = self.payload.len(),
            new_size = payload.len(),
            "重新打包记录"
        );

        self.payload = payload;
        Ok(())
    }

    /// 当前 payload（必要时先重新打包）
    pub fn payload(&mut self) -> Result<&[u8], EspError> {
        self.materialize()?;
        Ok(&self.payload)
    }

    /// 当前 payload 大小（必要时先重新打包）
    pub fn size(&mut self) -> Result<usize, EspError> {
        self.materialize()?;
        Ok(self.payload.len())
    }

    /// 将当前 payload 解析为子记录（每次重新解析，不缓存）
    pub fn subrecords(&mut self) -> Result<Vec<Subrecord>, EspError> {
        self.materialize()?;
        Subrecord::parse_all(&self.payload)
    }

    /// 写入记录：头部 + payload，payloadSize 始终等于实际写出的字节数
    pub fn write_to(&mut self, output: &mut Vec<u8>) -> Result<(), EspError> {
        self.materialize()?;

        output.extend_from_slice(&self.tag);
        write_i32(output, self.payload.len() as i32)?;
        write_i32(output, self.delete_flag)?;
        write_i32(output, self.record_flags)?;
        output.extend_from_slice(&self.payload);

        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, EspError> {
        let mut output = Vec::with_capacity(RECORD_HEADER_SIZE + self.payload.len());
        self.write_to(&mut output)?;
        Ok(output)
    }

    pub fn tag(&self) -> &[u8; 4] {
        &self.tag
    }

    /// 获取记录类型
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    pub fn delete_flag(&self) -> i32 {
        self.delete_flag
    }

    pub fn record_flags(&self) -> i32 {
        self.record_flags
    }

    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    pub fn header(&self) -> Option<&HeaderRecord> {
        match &self.body {
            RecordBody::Header(header) => Some(header),
            _ => None,
        }
    }

    pub fn header_mut(&mut self) -> Option<&mut HeaderRecord> {
        match &mut self.body {
            RecordBody::Header(header) => Some(header),
            _ => None,
        }
    }

    pub fn leveled(&self) -> Option<&LeveledList> {
        match &self.body {
            RecordBody::LeveledCreature(list) | RecordBody::LeveledItem(list) => Some(list),
            _ => None,
        }
    }

    pub fn leveled_mut(&mut self) -> Option<&mut LeveledList> {
        match &mut self.body {
            RecordBody::LeveledCreature(list) | RecordBody::LeveledItem(list) => Some(list),
            _ => None,
        }
    }

    /// 若为指定类型的等级列表则返回
    pub fn as_list(&self, kind: ListKind) -> Option<&LeveledList> {
        self.leveled().filter(|list| list.kind() == kind)
    }
}
