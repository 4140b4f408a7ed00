// 实现对axum middleware的抽象
pub mod gate;
pub mod input_validator;

use crate::erx::{Erx, Layouted, ResultE};
use crate::web::define::HttpMethod;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::request::Parts;
use axum::response::Response;
use futures_util::future::BoxFuture;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};
use tower::{Layer, Service};

static REGEX_CACHE: Lazy<Mutex<HashMap<String, regex::Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone)]
pub enum Pattern {
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(String),
}

#[derive(Debug, Clone)]
pub enum ApplyKind<T> {
    Include(T),
    Exclude(T),
}

/// per request chain state, handed from one middleware to the next
#[derive(Debug, Clone)]
pub struct Context {
    /// middlewares that let the request through, in order
    pub chains: Vec<&'static str>,
    /// set when a middleware halted the chain
    pub aborted_by: Option<&'static str>,
    born_micros: i64,
}

/// what a middleware decided
pub enum Flow {
    /// continue with the (possibly modified) request
    Next(Context, Request),
    /// stop here, the response goes back to the client
    Halt(Context, Response),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(&self, context: Context, request: Request) -> Flow;

    /// 可选：中间件优先级，数值越大优先级越高
    fn priority(&self) -> i32 {
        0
    }

    /// 可选：判断中间件是否应该处理这个请求
    /// 优先级 apply > methods > patterns
    /// - 如果 apply 返回不为 None，直接使用 apply 的返回值判定
    fn apply(&self, _parts: &Parts) -> Option<bool> {
        None
    }

    /// 可选：HTTP 方法过滤
    fn methods(&self) -> Option<Vec<ApplyKind<HttpMethod>>> {
        None
    }

    /// 可选：路径匹配模式
    fn patterns(&self) -> Option<Vec<ApplyKind<Pattern>>> {
        None
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_micros(&self) -> i64 {
        chrono::Utc::now().timestamp_micros() - self.born_micros
    }

    pub fn make_abort(&mut self, by: &'static str) -> &mut Self {
        self.aborted_by = Some(by);
        self
    }
}

impl Default for Context {
    fn default() -> Self {
        Self { chains: vec![], aborted_by: None, born_micros: chrono::Utc::now().timestamp_micros() }
    }
}

impl Pattern {
    pub fn check(&self, path: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => path.starts_with(prefix),
            Pattern::Suffix(suffix) => path.ends_with(suffix),
            Pattern::Contains(contains) => path.contains(contains),
            Pattern::Regex(regs) => {
                let compile = |regs: &str| match regex::Regex::new(regs) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        tracing::error!("Invalid regex pattern '{}': {}", regs, e);
                        None
                    },
                };

                match REGEX_CACHE.lock() {
                    Ok(mut cache) => {
                        if let Some(regex) = cache.get(regs) {
                            return regex.is_match(path);
                        }

                        match compile(regs) {
                            Some(regex) => {
                                let result = regex.is_match(path);
                                cache.insert(regs.clone(), regex);
                                result
                            },
                            None => false,
                        }
                    },
                    Err(e) => {
                        tracing::error!("Failed to acquire regex cache lock: {}", e);
                        compile(regs).is_some_and(|regex| regex.is_match(path))
                    },
                }
            },
        }
    }
}

/// excludes win, then any include must hit; no includes means everything not excluded
fn admits<T>(kinds: &[ApplyKind<T>], hit: impl Fn(&T) -> bool) -> bool {
    let mut has_include = false;
    let mut included = false;
    for kind in kinds {
        match kind {
            ApplyKind::Exclude(v) if hit(v) => return false,
            ApplyKind::Exclude(_) => {},
            ApplyKind::Include(v) => {
                has_include = true;
                included = included || hit(v);
            },
        }
    }
    !has_include || included
}

pub struct Manager {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Manager {
    pub fn new() -> Self {
        Self { middlewares: Vec::new() }
    }

    /// names must be unique, higher priority runs first
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) -> ResultE<&mut Self> {
        if self.middlewares.iter().any(|m| m.name() == middleware.name()) {
            return Err(Erx::with_code(Layouted::middleware("MNGR", "0001"), &format!("Middleware with name '{}' already exists", middleware.name())));
        }

        self.middlewares.push(middleware);
        self.middlewares.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub fn applys(&self, parts: &Parts) -> Vec<Arc<dyn Middleware>> {
        self.middlewares.iter().filter(|m| Self::should_apply_middleware(m, parts)).cloned().collect()
    }

    fn should_apply_middleware(middleware: &Arc<dyn Middleware>, parts: &Parts) -> bool {
        if let Some(apply) = middleware.apply(parts) {
            return apply;
        }

        if let Some(methods) = middleware.methods() {
            if !admits(&methods, |m| m.is(parts.method.as_str())) {
                return false;
            }
        }

        if let Some(patterns) = middleware.patterns() {
            let path = parts.uri.path();
            if !admits(&patterns, |p| p.check(path)) {
                return false;
            }
        }

        true
    }

    /// run the applicable middlewares in order, stop at the first halt
    pub async fn run(&self, request: Request) -> Flow {
        let (parts, body) = request.into_parts();
        let middles = self.applys(&parts);

        let mut request = Request::from_parts(parts, body);
        let mut context = Context::new();
        for m in middles {
            match m.on_request(context, request).await {
                Flow::Next(mut next_context, next_request) => {
                    next_context.chains.push(m.name());
                    context = next_context;
                    request = next_request;
                },
                Flow::Halt(mut halted, response) => {
                    halted.make_abort(m.name());
                    tracing::debug!("middleware [{}] halted after {:?}, {}us", m.name(), halted.chains, halted.elapsed_micros());
                    return Flow::Halt(halted, response);
                },
            }
        }

        Flow::Next(context, request)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ManagerLayer {
    pub manager: Arc<Manager>,
}

impl ManagerLayer {
    pub fn new(manager: Manager) -> Self {
        Self { manager: Arc::new(manager) }
    }
}

#[derive(Clone)]
pub struct ManagerService<S> {
    inner: S,
    manager: Arc<Manager>,
}

impl<S> Layer<S> for ManagerLayer {
    type Service = ManagerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ManagerService { inner, manager: Arc::clone(&self.manager) }
    }
}

impl<S> Service<Request> for ManagerService<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let manager = Arc::clone(&self.manager);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match manager.run(req).await {
                Flow::Next(_, request) => inner.call(request).await,
                Flow::Halt(_, response) => Ok(response),
            }
        })
    }
}
