use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use siteguard::conf;
use siteguard::prelude::*;
use siteguard::web::api::{Out, OutAny};
use siteguard::web::define::HttpMethod;
use siteguard::web::validation::Typed;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
struct LoginForm {
    #[validate(email(message = "a valid email is required"))]
    email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8 to 128 characters"))]
    password: String,
}

/// attribute and text escaping for the single value this page interpolates, not a template engine
fn escape(val: &str) -> String {
    let mut escaped = String::with_capacity(val.len());
    for c in val.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

async fn auth_page(flash: IncomingFlash) -> Html<String> {
    let flash_key = &conf::settled().gate.flash_key;
    let widget = match flash.get(flash_key) {
        Some(site_key) => format!(r#"<div class="g-recaptcha" data-sitekey="{}"></div>"#, escape(site_key)),
        None => String::new(),
    };

    Html(format!(
        r#"<!doctype html><html><body><form method="post" action="/login"><input name="email"><input name="password" type="password">{}<button>Sign in</button></form></body></html>"#,
        widget
    ))
}

async fn login() -> OutAny {
    Out::ok(serde_json::json!({ "login": "accepted" }))
}

async fn health() -> OutAny {
    Out::ok(serde_json::json!({ "status": "ok", "version": siteguard::VERSION }))
}

fn routes() -> Vec<Router> {
    vec![Router::new().route("/auth", get(auth_page)).route("/login", post(login)).route("/health", get(health))]
}

#[tokio::main]
async fn main() -> ResultEX {
    let settings = conf::settled();
    siteguard::log::logging_initialize(&settings.name, &settings.log.clone().unwrap_or_default()).await?;

    if conf::site_key().is_none() {
        tracing::warn!("{} is not configured, failed validations will flash an empty value", conf::SITE_KEY_ENV);
    }

    if settings.web.flash_secret_is_public() {
        tracing::warn!("web.flash_secret is a public default, set SITEGUARD__WEB__FLASH_SECRET or local.yml before deploying");
    }

    let validator = InputValidator::new(Rules::new().add(Typed::<LoginForm>::new())).include_method(HttpMethod::POST).include_prefix("/login");

    let gate = GateConfig::from_settings(&settings.gate).priority(10).include_method(HttpMethod::POST).include_prefix("/login");

    make_web(&settings.name, &settings.web.bind_addr(), siteguard::web_route_merge!(routes()), &settings.web.flash_secret)
        .middleware(validator)?
        .middleware(Gate::new(gate))?
        .serve()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("abc123"), "abc123");
        assert_eq!(escape(r#"a"b'c<d>&"#), "a&quot;b&#x27;c&lt;d&gt;&amp;");
    }
}
