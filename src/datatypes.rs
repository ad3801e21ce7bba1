use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

// 基础整数类型读取函数
pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, std::io::Error> {
    cursor.read_u8()
}

pub fn read_i16(cursor: &mut Cursor<&[u8]>) -> Result<i16, std::io::Error> {
    cursor.read_i16::<LittleEndian>()
}

pub fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32, std::io::Error> {
    cursor.read_i32::<LittleEndian>()
}

pub fn read_i64(cursor: &mut Cursor<&[u8]>) -> Result<i64, std::io::Error> {
    cursor.read_i64::<LittleEndian>()
}

pub fn read_f32(cursor: &mut Cursor<&[u8]>) -> Result<f32, std::io::Error> {
    cursor.read_f32::<LittleEndian>()
}

// 基础整数类型写入函数
pub fn write_u8(writer: &mut dyn Write, value: u8) -> Result<(), std::io::Error> {
    writer.write_u8(value)
}

pub fn write_i16(writer: &mut dyn Write, value: i16) -> Result<(), std::io::Error> {
    writer.write_i16::<LittleEndian>(value)
}

pub fn write_i32(writer: &mut dyn Write, value: i32) -> Result<(), std::io::Error> {
    writer.write_i32::<LittleEndian>(value)
}

pub fn write_i64(writer: &mut dyn Write, value: i64) -> Result<(), std::io::Error> {
    writer.write_i64::<LittleEndian>(value)
}

pub fn write_f32(writer: &mut dyn Write, value: f32) -> Result<(), std::io::Error> {
    writer.write_f32::<LittleEndian>(value)
}

/// 去掉末尾所有 NUL 字节
///
/// 定长字段（作者、描述）和 Z 字符串（MAST、NAME、CNAM/INAM）读取时都经过这里。
pub fn trim_nul(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    &data[..end]
}

/// Z字符串打包（内容 + 一个 NUL 结尾）
pub fn pack_zstring(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.extend_from_slice(data);
    out.push(0);
    out
}

/// 定长字符串打包，不足部分以 NUL 填充
///
/// 调用方负责保证 `data.len() <= width`，超长部分会被截断。
pub fn pack_fixed(data: &[u8], width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];
    let len = data.len().min(width);
    out[..len].copy_from_slice(&data[..len]);
    out
}

/// 以 Windows-1252 解码（Morrowind 西文版本使用的代码页）
pub fn decode_text(data: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(data);
    decoded.into_owned()
}

/// 以 Windows-1252 编码，无法表示的字符返回 None
pub fn encode_text(text: &str) -> Option<Vec<u8>> {
    let (encoded, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    if had_errors {
        None
    } else {
        Some(encoded.into_owned())
    }
}

// 等级列表 DATA 子记录的选择标志位
//
// 两种列表的位含义不同。这里沿用 Wrye Mash / OpenMW-CS 的取值，与部分格式文档相反。
bitflags::bitflags! {
    /// LEVC（生物列表）标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CreatureListFlags: i32 {
        const ALL_LEVELS = 0x00000001;     // 对所有不高于玩家等级的条目计算
    }
}

bitflags::bitflags! {
    /// LEVI（物品列表）标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ItemListFlags: i32 {
        const ALL_ITEMS = 0x00000001;      // 每个物品单独计算
        const ALL_LEVELS = 0x00000002;     // 对所有不高于玩家等级的条目计算
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul(b"rat_01\0"), b"rat_01");
        assert_eq!(trim_nul(b"author\0\0\0\0"), b"author");
        assert_eq!(trim_nul(b"\0\0"), b"");
        assert_eq!(trim_nul(b"plain"), b"plain");
    }

    #[test]
    fn test_pack_fixed_pads_with_nul() {
        let packed = pack_fixed(b"abc", 6);
        assert_eq!(packed, b"abc\0\0\0");
        assert_eq!(pack_fixed(b"", 2), vec![0, 0]);
    }

    #[test]
    fn test_windows_1252_round_trip() {
        let bytes = encode_text("Caf\u{e9}").unwrap();
        assert_eq!(bytes, vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(decode_text(&bytes), "Caf\u{e9}");
        assert!(encode_text("铁剑").is_none());
    }

    #[test]
    fn test_little_endian_helpers() {
        let mut out = Vec::new();
        write_i16(&mut out, -2).unwrap();
        write_i32(&mut out, 300).unwrap();
        write_i64(&mut out, 1 << 40).unwrap();
        write_f32(&mut out, 1.3).unwrap();
        write_u8(&mut out, 50).unwrap();

        let mut cursor = Cursor::new(&out[..]);
        assert_eq!(read_i16(&mut cursor).unwrap(), -2);
        assert_eq!(read_i32(&mut cursor).unwrap(), 300);
        assert_eq!(read_i64(&mut cursor).unwrap(), 1 << 40);
        assert_eq!(read_f32(&mut cursor).unwrap(), 1.3);
        assert_eq!(read_u8(&mut cursor).unwrap(), 50);
    }
}
