use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::Serialize;

use crate::error::{QuoteError, Result};

/// 將物件以縮排後的 JSON 寫入檔案，常用來保存交易所的回應當作測試資料
///
/// 檔名必須以 `.json` 結尾，上層目錄不存在時會自動建立。
pub fn save_json<T: Serialize + ?Sized>(obj: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(QuoteError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("File name must end with .json, got {:?}", path),
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, obj).map_err(io::Error::from)?;
    writer.flush()?;

    Ok(())
}
