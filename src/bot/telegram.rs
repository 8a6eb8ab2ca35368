//! Telegram MarkdownV2 的跳脫處理
//!
//! <https://core.telegram.org/bots/api#markdownv2-style>

/// MarkdownV2 文字中必須以 `\` 跳脫的字元，`\` 本身也要跳脫
pub const MARKDOWN_V2_SPECIAL_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// 將文字中 MarkdownV2 的特殊字元加上 `\`
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `escape` 的反向操作，只移除特殊字元前的 `\`
pub fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.peek() {
                if MARKDOWN_V2_SPECIAL_CHARS.contains(next) {
                    unescaped.push(*next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(c);
    }
    unescaped
}
