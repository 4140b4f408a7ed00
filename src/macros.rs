/// 快速创建 String 对象的宏
///
/// # 示例
/// ```
/// let text = siteguard::s!("hello world");
/// assert_eq!(text, String::from("hello world"));
/// ```
#[macro_export]
macro_rules! s {
    ($s:expr) => {
        String::from($s)
    };
}

/// 将表达式转换为可选字符串 (to optional string)
///
/// # 示例
/// ```
/// let opt_str = siteguard::tos!(42);
/// assert_eq!(opt_str, Some("42".to_string()));
/// ```
#[macro_export]
macro_rules! tos {
    ($e:expr) => {
        Some($e.to_string())
    };
}
