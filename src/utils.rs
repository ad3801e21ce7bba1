use thiserror::Error;
use std::path::{Path, PathBuf};

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum EspError {
    /// 声明的长度超过剩余字节
    #[error("Truncated input while reading {context}: expected {expected} bytes, {available} available")]
    TruncatedInput {
        context: String,
        expected: usize,
        available: usize,
    },

    /// 等级列表中出现未知子记录（不跳过，直接报错）
    #[error("Unknown subrecord {subrecord} in {record} record")]
    UnknownSubrecord { record: String, subrecord: String },

    #[error("Malformed file header: {0}")]
    MalformedHeader(String),

    #[error("Malformed {tag} record: {reason}")]
    MalformedRecord { tag: String, reason: String },

    #[error("Cannot merge {left} record with {right} record")]
    TypeMismatch { left: String, right: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Field {field} is {actual} bytes long, limit is {limit}")]
    FieldTooLong {
        field: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// 合并过程中某个插件失败
    #[error("Failed to process {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: Box<EspError>,
    },
}

impl EspError {
    /// 包装某个源文件的错误
    pub fn in_source(self, path: &Path) -> Self {
        EspError::Source {
            path: path.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// 将打开文件时的 NotFound 转换为 FileNotFound，其余原样传递
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            EspError::FileNotFound(path.to_path_buf())
        } else {
            EspError::IoError(err)
        }
    }
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<PathBuf, EspError> {
    if !file_path.exists() {
        return Err(EspError::FileNotFound(file_path.to_path_buf()));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = file_path.with_extension(format!("{}.bak", timestamp));

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}

/// 判断文件名是否在黑名单中（ASCII 大小写不敏感）
pub fn is_blacklisted(file_name: &str, blacklist: &[String]) -> bool {
    blacklist
        .iter()
        .map(|name| name.trim())
        .any(|name| !name.is_empty() && name.eq_ignore_ascii_case(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_matching() {
        let blacklist = vec![
            "Morrowind.esm".to_string(),
            " Tribunal.esm".to_string(),
            "".to_string(),
        ];

        assert!(is_blacklisted("Morrowind.esm", &blacklist));
        assert!(is_blacklisted("morrowind.ESM", &blacklist));
        assert!(is_blacklisted("Tribunal.esm", &blacklist));
        assert!(!is_blacklisted("Bloodmoon.esm", &blacklist));
        assert!(!is_blacklisted("", &blacklist));
    }

    #[test]
    fn test_create_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Merged_Lists.esp");
        std::fs::write(&file, b"TES3").unwrap();

        let backup = create_backup(&file).unwrap();
        assert!(backup.exists());
        assert_eq!(std::fs::read(&backup).unwrap(), b"TES3");
        assert!(backup.to_string_lossy().ends_with(".bak"));
    }

    #[test]
    fn test_backup_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_backup(&dir.path().join("missing.esp"));
        assert!(matches!(result, Err(EspError::FileNotFound(_))));
    }

    #[test]
    fn test_not_found_conversion() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let path = Path::new("Missing.esp");
        assert!(matches!(EspError::from_io(err, path), EspError::FileNotFound(_)));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(EspError::from_io(err, path), EspError::IoError(_)));
    }
}
