use crate::datatypes::{read_i32, write_i32};
use crate::utils::EspError;
use std::io::{Cursor, Read, Write};

/// 子记录头部大小：4字节类型 + 4字节长度
pub const SUBRECORD_HEADER_SIZE: usize = 8;

/// 子记录结构
///
/// 磁盘格式：`tag(4) || size(i32) || data(size)`。构造后不可变，
/// 记录需要重新打包时整体重建子记录列表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subrecord {
    /// 4字符子记录类型（原始字节）
    tag: [u8; 4],
    /// 原始数据
    data: Vec<u8>,
}

impl Subrecord {
    pub fn new(tag: [u8; 4], data: Vec<u8>) -> Self {
        Subrecord { tag, data }
    }

    /// 解析子记录
    ///
    /// 光标停在下一个子记录的开头。剩余字节不足声明长度时返回 `TruncatedInput`。
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, EspError> {
        let available = remaining(cursor);
        if available < SUBRECORD_HEADER_SIZE {
            return Err(EspError::TruncatedInput {
                context: "subrecord header".to_string(),
                expected: SUBRECORD_HEADER_SIZE,
                available,
            });
        }

        let mut tag = [0u8; 4];
        cursor.read_exact(&mut tag)?;

        let size = read_i32(cursor)?;
        let size = usize::try_from(size).map_err(|_| EspError::MalformedRecord {
            tag: String::from_utf8_lossy(&tag).into_owned(),
            reason: format!("negative subrecord size {}", size),
        })?;

        let available = remaining(cursor);
        if size > available {
            return Err(EspError::TruncatedInput {
                context: format!("{} subrecord", String::from_utf8_lossy(&tag)),
                expected: size,
                available,
            });
        }

        let mut data = vec![0u8; size];
        cursor.read_exact(&mut data)?;

        Ok(Subrecord { tag, data })
    }

    /// 将整个数据块解析为子记录序列，必须恰好消耗完所有字节
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>, EspError> {
        let mut subrecords = Vec::new();
        let mut cursor = Cursor::new(data);

        while (cursor.position() as usize) < data.len() {
            subrecords.push(Subrecord::parse(&mut cursor)?);
        }

        Ok(subrecords)
    }

    /// 序列化子记录：类型、数据的准确长度、数据
    pub fn write_to(&self, writer: &mut dyn Write) -> Result<(), EspError> {
        writer.write_all(&self.tag)?;
        write_i32(writer, self.data.len() as i32)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SUBRECORD_HEADER_SIZE + self.data.len());
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn tag(&self) -> &[u8; 4] {
        &self.tag
    }

    /// 获取子记录类型（用于日志和错误信息）
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// 获取数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 数据长度
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_subrecord() {
        let data = vec![
            b'N', b'A', b'M', b'E', 0x07, 0x00, 0x00, 0x00,
            b'r', b'a', b't', b'_', b'0', b'1', 0x00,
        ];

        let mut cursor = Cursor::new(&data[..]);
        let subrecord = Subrecord::parse(&mut cursor).unwrap();
        assert_eq!(subrecord.tag(), b"NAME");
        assert_eq!(subrecord.data(), b"rat_01\0");
        assert_eq!(cursor.position() as usize, data.len());
    }

    #[test]
    fn test_serialize_matches_input() {
        let data = vec![
            b'I', b'N', b'T', b'V', 0x02, 0x00, 0x00, 0x00,
            0x05, 0x00,
        ];
        let subrecords = Subrecord::parse_all(&data).unwrap();
        assert_eq!(subrecords.len(), 1);
        assert_eq!(subrecords[0].to_bytes(), data);

        let mut written = Vec::new();
        subrecords[0].write_to(&mut written).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn test_truncated_payload() {
        // 声明 10 字节，实际只有 3 字节
        let data = vec![
            b'N', b'A', b'M', b'E', 0x0A, 0x00, 0x00, 0x00,
            b'r', b'a', b't',
        ];

        let result = Subrecord::parse_all(&data);
        assert!(matches!(
            result,
            Err(EspError::TruncatedInput { expected: 10, available: 3, .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let data = vec![b'N', b'A', b'M', b'E', 0x01];
        let result = Subrecord::parse_all(&data);
        assert!(matches!(result, Err(EspError::TruncatedInput { .. })));
    }

    #[test]
    fn test_negative_size_rejected() {
        let data = vec![b'N', b'A', b'M', b'E', 0xFF, 0xFF, 0xFF, 0xFF];
        let result = Subrecord::parse_all(&data);
        assert!(matches!(result, Err(EspError::MalformedRecord { .. })));
    }

    #[test]
    fn test_multiple_subrecords() {
        let mut data = Subrecord::new(*b"NAME", b"list\0".to_vec()).to_bytes();
        data.extend(Subrecord::new(*b"NNAM", vec![50]).to_bytes());

        let subrecords = Subrecord::parse_all(&data).unwrap();
        assert_eq!(subrecords.len(), 2);
        assert_eq!(subrecords[1].tag_str(), "NNAM");
        assert_eq!(subrecords[1].size(), 1);
    }
}
