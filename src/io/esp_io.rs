//! ESP 文件 IO 实现
//!
//! 提供基于文件系统的默认 ESP 文件读写实现
use std::path::Path;
use super::traits::{EspReader, EspWriter, RawEspData};
use crate::utils::EspError;

/// 默认的 ESP 文件读取器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultEspReader;

impl EspReader for DefaultEspReader {
    fn read(&self, path: &Path) -> Result<RawEspData, EspError> {
        let bytes = std::fs::read(path).map_err(|e| EspError::from_io(e, path))?;
        Ok(RawEspData { bytes })
    }
}

/// 默认的 ESP 文件写入器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultEspWriter;

impl EspWriter for DefaultEspWriter {
    fn write(&self, data: &RawEspData, path: &Path) -> Result<(), EspError> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, &data.bytes)?;
        Ok(())
    }
}
