use ::cookie::SameSite;
use axum::http::{HeaderMap, HeaderValue};

/// 简单的 Cookie 解析器
pub struct CookieJar {
    cookies: std::collections::HashMap<String, String>,
}

impl CookieJar {
    /// 从请求头创建 CookieJar
    /// every `Cookie` header is read, the first occurrence of a name wins
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = std::collections::HashMap::new();

        for cookie_header in headers.get_all(axum::http::header::COOKIE) {
            if let Ok(cookie_str) = cookie_header.to_str() {
                for cookie in cookie_str.split(';') {
                    if let Some((key, value)) = cookie.trim().split_once('=') {
                        cookies.entry(key.trim().to_string()).or_insert_with(|| value.trim().to_string());
                    }
                }
            }
        }

        Self { cookies }
    }

    /// 获取指定名称的 cookie
    pub fn get(&self, name: &str) -> Option<Cookie> {
        self.cookies.get(name).map(|value| Cookie { name: name.to_string(), value: value.clone() })
    }
}

/// Cookie 结构
pub struct Cookie {
    name: String,
    value: String,
}

impl Cookie {
    /// 获取 cookie 值
    pub fn value(&self) -> &str {
        &self.value
    }

    /// 获取 cookie 名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// response cookie scoped to the whole site, hidden from scripts, sent on top level navigation
pub fn response_cookie(name: &str, value: String) -> ::cookie::Cookie<'static> {
    ::cookie::Cookie::build((name.to_string(), value)).path("/").http_only(true).same_site(SameSite::Lax).build()
}

/// expires `name` on the client, attributes match `response_cookie` so the browser drops the same cookie
pub fn removal_cookie(name: &str) -> ::cookie::Cookie<'static> {
    let mut cookie = response_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

pub fn set_cookie_value(cookie: &::cookie::Cookie<'_>) -> Option<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string()).ok()
}
