//! IO 抽象层 - trait 定义
//!
//! 读写一次完成：打开、读完或写完、关闭，之后才进行下一个操作。

use std::path::Path;
use crate::utils::EspError;

/// ESP 文件原始数据
#[derive(Debug, Clone)]
pub struct RawEspData {
    /// 文件的原始字节数据
    pub bytes: Vec<u8>,
}

/// ESP 文件读取 trait
///
/// # 职责
/// - 从某处读取 ESM/ESP 文件的原始字节数据
/// - 不负责解析，仅负责 IO
pub trait EspReader {
    /// 读取 ESP 文件的原始数据
    ///
    /// 文件不存在时返回 `EspError::FileNotFound`。
    fn read(&self, path: &Path) -> Result<RawEspData, EspError>;
}

/// ESP 文件写入 trait
///
/// # 职责
/// - 将序列化后的数据写入目标位置
/// - 不负责序列化，仅负责 IO
pub trait EspWriter {
    /// 写入 ESP 文件数据
    ///
    /// # 参数
    /// * `data` - 要写入的原始数据
    /// * `path` - 目标文件路径
    fn write(&self, data: &RawEspData, path: &Path) -> Result<(), EspError>;
}
