use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 字母数字、下划线、`-`、`.`、空格和括号以外的字符都替换掉
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\-. ()]").expect("静态正则");
}

/// 文件名/目录名清洗：非法字符替换为 `_`，再去掉首尾空白
pub fn sanitize(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").trim().to_string()
}

pub struct FormatTool;

impl FormatTool {
    // 格式化剩余秒数：>=1小时显示时分，>=1分钟显示分秒，否则只显示秒
    pub fn format_seconds(seconds: f64) -> String {
        if !seconds.is_finite() || seconds <= 0.0 {
            return "∞".to_string();
        }

        let total = seconds as u64;
        let (mins, secs) = (total / 60, total % 60);
        let (hours, mins) = (mins / 60, mins % 60);

        if hours > 0 {
            format!("{}h {}m", hours, mins)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    // 格式化文件大小
    pub fn format_size(size: u64) -> String {
        if size == 0 {
            "0 MB".to_string()
        } else if size > 1024 * 1024 * 1024 {
            format!("{:.2} GB", size as f64 / 1024.0 / 1024.0 / 1024.0)
        } else if size > 1024 * 1024 {
            format!("{:.1} MB", size as f64 / 1024.0 / 1024.0)
        } else {
            format!("{:.1} KB", size as f64 / 1024.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize("Talk #1: Zen?.mp3"), "Talk _1_ Zen_.mp3");
        assert_eq!(sanitize("  Geeta Darshan (Vol-1).mp3 "), "Geeta Darshan (Vol-1).mp3");
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
    }

    #[test]
    fn sanitize_keeps_unicode_word_characters() {
        assert_eq!(sanitize("गीता दर्शन.mp3"), "गीता दर्शन.mp3");
    }

    #[test]
    fn format_seconds_picks_the_largest_unit() {
        assert_eq!(FormatTool::format_seconds(0.0), "∞");
        assert_eq!(FormatTool::format_seconds(-3.0), "∞");
        assert_eq!(FormatTool::format_seconds(f64::INFINITY), "∞");
        assert_eq!(FormatTool::format_seconds(42.7), "42s");
        assert_eq!(FormatTool::format_seconds(125.0), "2m 5s");
        assert_eq!(FormatTool::format_seconds(3600.0 * 2.0 + 61.0), "2h 1m");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(FormatTool::format_size(0), "0 MB");
        assert_eq!(FormatTool::format_size(2048), "2.0 KB");
        assert_eq!(FormatTool::format_size(5 * 1024 * 1024 + 1), "5.0 MB");
    }
}
