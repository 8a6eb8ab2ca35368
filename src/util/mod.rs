/// 檔案輸出
pub mod file;
/// HTTP 傳輸
pub mod http;
/// 文字與數值轉換
pub mod text;
