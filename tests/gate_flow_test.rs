//! End to end flow: rules -> gate -> redirect with flash -> auth page reads the flash once.

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use siteguard::prelude::*;
use siteguard::web::define::HttpMethod;
use siteguard::web::flash::{FlashCodec, FlashLayer, FLASH_COOKIE};
use siteguard::web::middleware::gate::guard;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

mod helpers {
    use super::*;

    pub fn app(site_key: Option<&str>, hits: Arc<AtomicUsize>) -> Router {
        let routes = Router::new()
            .route(
                "/login",
                post(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "welcome"
                    }
                }),
            )
            .route("/auth", get(|flash: IncomingFlash| async move { format!("key=[{}]", flash.get("DataSiteKey").unwrap_or("<none>")) }));

        let rules = Rules::new().required("email").matches("email", r"^[^@\s]+@[^@\s]+$").unwrap().required("password");
        let validator = InputValidator::new(rules).include_method(HttpMethod::POST).include_prefix("/login");
        let gate = Gate::new(GateConfig::new(site_key.map(String::from)).include_method(HttpMethod::POST).include_prefix("/login"));

        make_web("test", "127.0.0.1:0", vec![routes], "integration-secret")
            .middleware(validator)
            .unwrap()
            .middleware(gate)
            .unwrap()
            .router()
    }

    pub fn login(body: &'static str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    pub fn flash_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(FLASH_COOKIE))
            .map(|v| v.to_string())
    }

    pub async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

#[tokio::test]
async fn valid_input_reaches_handler_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = helpers::app(Some("abc123"), hits.clone());

    let response = app.oneshot(helpers::login("email=a%40b.io&password=secret")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert!(helpers::flash_cookie(&response).is_none());
    assert_eq!(helpers::text(response).await, "welcome");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_input_redirects_with_site_key() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = helpers::app(Some("abc123"), hits.clone());

    let response = app.clone().oneshot(helpers::login("email=nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let set_cookie = helpers::flash_cookie(&response).expect("flash cookie");
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    // the next request sees the flash once, and the cookie is expired on the way back
    let auth = Request::builder().uri("/auth").header(header::COOKIE, cookie).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(auth).await.unwrap();
    let cleared = helpers::flash_cookie(&response).expect("removal cookie");
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(helpers::text(response).await, "key=[abc123]");

    let again = Request::builder().uri("/auth").body(Body::empty()).unwrap();
    let response = app.oneshot(again).await.unwrap();
    assert_eq!(helpers::text(response).await, "key=[<none>]");
}

#[tokio::test]
async fn unset_site_key_still_redirects_with_empty_flash() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = helpers::app(None, hits.clone());

    let response = app.clone().oneshot(helpers::login("password=x")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let cookie = helpers::flash_cookie(&response).unwrap().split(';').next().unwrap().to_string();
    let auth = Request::builder().uri("/auth").header(header::COOKIE, cookie).body(Body::empty()).unwrap();
    let response = app.oneshot(auth).await.unwrap();
    assert_eq!(helpers::text(response).await, "key=[]");
}

#[tokio::test]
async fn same_outcome_same_branch() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = helpers::app(Some("abc123"), hits.clone());

    for _ in 0..2 {
        let response = app.clone().oneshot(helpers::login("email=")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    for _ in 0..2 {
        let response = app.clone().oneshot(helpers::login("email=a%40b.io&password=p")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn tampered_flash_cookie_is_ignored() {
    let app = helpers::app(Some("abc123"), Arc::new(AtomicUsize::new(0)));
    let cookie = format!("{}=eyJEYXRhU2l0ZUtleSI6ImV2aWwifQ.00", FLASH_COOKIE);
    let auth = Request::builder().uri("/auth").header(header::COOKIE, cookie).body(Body::empty()).unwrap();

    let response = app.oneshot(auth).await.unwrap();
    assert!(helpers::flash_cookie(&response).unwrap().contains("Max-Age=0"));
    assert_eq!(helpers::text(response).await, "key=[<none>]");
}

async fn mark_invalid(mut request: Request, next: Next) -> Response {
    let fail = request.uri().query().is_some_and(|q| q.contains("fail"));
    let outcome = if fail { ValidationResult::invalid(vec![ValidationError::new("q", "bad")]) } else { ValidationResult::valid() };
    request.extensions_mut().insert(outcome);
    next.run(request).await
}

#[tokio::test]
async fn guard_function_as_axum_middleware() {
    let gate = Gate::new(GateConfig::new(Some("abc123".into())));
    let app: Router = Router::new()
        .route("/page", get(|| async { "page" }))
        .route("/auth", get(|flash: IncomingFlash| async move { format!("key=[{}]", flash.get("DataSiteKey").unwrap_or("<none>")) }))
        .layer(from_fn_with_state(gate, guard))
        .layer(from_fn(mark_invalid))
        .layer(FlashLayer::new(FlashCodec::new("guard-secret")));

    let ok = app.clone().oneshot(Request::builder().uri("/page").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert!(helpers::flash_cookie(&ok).is_none());

    let redirected = app.clone().oneshot(Request::builder().uri("/page?fail=1").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(redirected.status(), StatusCode::FOUND);
    assert_eq!(redirected.headers().get(header::LOCATION).unwrap(), "/auth");
    assert!(redirected.extensions().get::<Flash>().is_none());

    let cookie = helpers::flash_cookie(&redirected).expect("flash cookie").split(';').next().unwrap().to_string();
    let auth = Request::builder().uri("/auth").header(header::COOKIE, cookie).body(Body::empty()).unwrap();
    let response = app.oneshot(auth).await.unwrap();
    assert_eq!(helpers::text(response).await, "key=[abc123]");
}

#[tokio::test]
async fn guard_without_flash_layer_sets_no_cookie() {
    let gate = Gate::new(GateConfig::new(Some("abc123".into())));
    let app: Router = Router::new().route("/page", get(|| async { "page" })).layer(from_fn_with_state(gate, guard)).layer(from_fn(mark_invalid));

    let redirected = app.oneshot(Request::builder().uri("/page?fail=1").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(redirected.status(), StatusCode::FOUND);
    assert!(helpers::flash_cookie(&redirected).is_none());
    assert_eq!(redirected.extensions().get::<Flash>().and_then(|f| f.get("DataSiteKey")), Some("abc123"));
}

#[tokio::test]
async fn mixed_case_json_content_type_passes() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = helpers::app(Some("abc123"), hits.clone());

    for content_type in ["application/json", "Application/JSON", "APPLICATION/JSON; charset=UTF-8"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(r#"{"email": "a@b.io", "password": "secret"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "content type {}", content_type);
        assert!(response.headers().get(header::LOCATION).is_none());
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
