// Layouted: 预设好的一些Layout快速方法
// ResultE<T> = Result<T, Erx>;
// ResultEX = ResultE<()>;
// fn amp<T: ToString>(additional: &str) -> impl Fn(T) -> Erx
use crate::conf;
use lazy_static::lazy_static;
use std::fmt::Display;

lazy_static! {
    static ref APP_SHORT: String = conf::settled().short.clone();
}

/// Zero
pub static LAYOUTED_C_ZERO: &'static str = "0000";

/// Undefined
pub static LAYOUTED_C_UNDF: &'static str = "UNDF";

/// ResultE<T> = Result<T, Erx>;
pub type ResultE<T> = Result<T, Erx>;

/// ResultEX = ResultE<()>;
pub type ResultEX = ResultE<()>;

/// amp: return a function that convert T: ToString to Erx
/// message format: "{additional} : {error}"
pub fn amp<T: ToString>(additional: &str) -> impl Fn(T) -> Erx {
    let additional = additional.to_string();
    move |err: T| Erx { code: Default::default(), message: format!("{} : {}", additional, err.to_string()) }
}

/// Layouted: Some predefined Layouted methods
pub struct Layouted;

impl Layouted {
    /// common: 通用错误
    pub fn common(category: &str, detail: &str) -> LayoutedC {
        LayoutedC::new("COMM", category, detail)
    }

    /// middleware: 中间件错误
    pub fn middleware(category: &str, detail: &str) -> LayoutedC {
        LayoutedC::new("MIDL", category, detail)
    }
}

/// Code code format
/// aaaa-xxxx-yyyy-zzzz
///
///    aaaa : 应用标示，建议4位长度
///    xxxx : 单词字母，建议4位长度，用于区分大类（功能域）
///    yyyy : 字母或者数字，建议4位长度，用于区分子类
///    zzzz : 字母或者数字，建议4位长度，具体错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutedC {
    pub application: String,
    pub domain: String,
    pub category: String,
    pub detail: String,
}

impl LayoutedC {
    pub fn okay() -> LayoutedC {
        LayoutedC::new(LAYOUTED_C_ZERO, LAYOUTED_C_ZERO, LAYOUTED_C_ZERO)
    }

    pub fn new(domain: &str, category: &str, detail: &str) -> LayoutedC {
        LayoutedC { application: APP_SHORT.clone(), domain: domain.into(), category: category.into(), detail: detail.into() }
    }

    pub fn is_okc(&self) -> bool {
        [&self.domain, &self.category, &self.detail].iter().all(|part| part.replace("0", "").is_empty())
    }

    pub fn layout_string(&self) -> String {
        format!("{}-{}-{}-{}", self.application, self.domain, self.category, self.detail)
    }
}

impl Default for LayoutedC {
    fn default() -> Self {
        LayoutedC::new(LAYOUTED_C_UNDF, LAYOUTED_C_UNDF, LAYOUTED_C_UNDF)
    }
}

impl From<LayoutedC> for String {
    fn from(value: LayoutedC) -> Self {
        value.layout_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Erx {
    code: LayoutedC,
    message: String,
}

impl Erx {
    pub fn new(message: &str) -> Erx {
        Erx { code: Default::default(), message: message.to_string() }
    }

    pub fn with_code(code: LayoutedC, message: &str) -> Erx {
        Erx { code, message: message.to_string() }
    }

    pub fn code(&self) -> &LayoutedC {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn description(&self) -> String {
        format!("{} {}", self.code.layout_string(), self.message)
    }
}

impl Display for Erx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Erx {}

impl From<&str> for Erx {
    fn from(s: &str) -> Self {
        Erx::new(s)
    }
}

impl axum::response::IntoResponse for Erx {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("{}", self.description());
        let out: crate::web::api::Out<()> = crate::web::api::Out::code_message(self.code, &self.message);
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, out).into_response()
    }
}
