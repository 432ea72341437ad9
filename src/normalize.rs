use unicode_normalization::UnicodeNormalization;

/// 去掉重音、转小写，并把 `_` / `-` 统一成空格
///
/// 表头匹配和业务员匹配共用，"Ophélie"、"ophelie"、"OPHÉLIE" 视为相同。
pub fn normalize_text(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace(['_', '-'], " ")
}

/// `needle` 的归一化形式是否包含在 `haystack` 的归一化形式中
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    normalize_text(haystack).contains(&normalize_text(needle))
}
