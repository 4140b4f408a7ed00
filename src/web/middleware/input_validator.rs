use crate::web::define::HttpMethod;
use crate::web::middleware::{ApplyKind, Context, Flow, Middleware, Pattern};
use crate::web::request::{RequestCloner, BODY_LIMIT};
use crate::web::validation::{Input, Rules, ValidationError, ValidationResult};
use async_trait::async_trait;
use axum::extract::Request;
use std::sync::Arc;

/// runs the declared rules and stores the outcome on the request for the gate.
/// never halts; an outcome already on the request is extended, not replaced
#[derive(Clone)]
pub struct InputValidator {
    rules: Arc<Rules>,
    priority: i32,
    body_limit: usize,
    methods: Option<Vec<HttpMethod>>,
    prefixes: Option<Vec<String>>,
}

impl std::fmt::Debug for InputValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputValidator")
            .field("rules", &self.rules.len())
            .field("priority", &self.priority)
            .field("body_limit", &self.body_limit)
            .field("methods", &self.methods)
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

impl InputValidator {
    /// default priority is above the gate's so validation runs first
    pub fn new(rules: Rules) -> Self {
        Self { rules: Arc::new(rules), priority: 100, body_limit: BODY_LIMIT, methods: None, prefixes: None }
    }

    pub fn middleware_name() -> &'static str {
        "InputValidator"
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn include_method(mut self, method: HttpMethod) -> Self {
        self.methods.get_or_insert_with(Vec::new).push(method);
        self
    }

    pub fn include_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.get_or_insert_with(Vec::new).push(prefix.into());
        self
    }

    /// validate and hand back the request with the outcome attached
    pub async fn validate(&self, request: Request) -> Request {
        let cloner = RequestCloner::buffer(request, self.body_limit).await;

        let outcome = match cloner.read_error() {
            Some(e) => ValidationResult::invalid(vec![ValidationError::with_code("body", e.message(), "unreadable")]),
            None => self.rules.check(&Input::from_parts(cloner.parts(), cloner.body())),
        };

        let mut request = cloner.into_request();
        if !outcome.is_empty() {
            tracing::debug!("{} {} failed {} rule(s): {:?}", request.method(), request.uri().path(), outcome.len(), outcome.errors());
        }

        match request.extensions_mut().get_mut::<ValidationResult>() {
            Some(existing) => existing.merge(outcome),
            None => {
                request.extensions_mut().insert(outcome);
            },
        }
        request
    }
}

#[async_trait]
impl Middleware for InputValidator {
    fn name(&self) -> &'static str {
        InputValidator::middleware_name()
    }

    async fn on_request(&self, context: Context, request: Request) -> Flow {
        Flow::Next(context, self.validate(request).await)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn methods(&self) -> Option<Vec<ApplyKind<HttpMethod>>> {
        self.methods.as_ref().map(|ms| ms.iter().map(|m| ApplyKind::Include(*m)).collect())
    }

    fn patterns(&self) -> Option<Vec<ApplyKind<Pattern>>> {
        self.prefixes.as_ref().map(|ps| ps.iter().map(|p| ApplyKind::Include(Pattern::Prefix(p.clone()))).collect())
    }
}
