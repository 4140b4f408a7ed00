//! Validation gate.
//!
//! Looks at the [`ValidationResult`] collected for the request. Any error sends the caller to
//! the auth page with the site key flashed; otherwise the request continues untouched.

use crate::conf;
use crate::web::define::HttpMethod;
use crate::web::flash::Flash;
use crate::web::middleware::{ApplyKind, Context, Flow, Middleware, Pattern};
use crate::web::validation::ValidationResult;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::http::{header::LOCATION, StatusCode};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::sync::Arc;

pub const DEFAULT_REDIRECT_TO: &str = "/auth";
pub const DEFAULT_FLASH_KEY: &str = "DataSiteKey";

/// Gate configuration, loaded once at startup and never changed afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// flashed on failure, `None` flashes an empty value
    pub site_key: Option<String>,
    pub redirect_to: String,
    pub flash_key: String,
    pub priority: i32,
    pub methods: Option<Vec<HttpMethod>>,
    pub prefixes: Option<Vec<String>>,
}

impl GateConfig {
    pub fn new(site_key: Option<String>) -> Self {
        Self {
            site_key,
            redirect_to: DEFAULT_REDIRECT_TO.to_string(),
            flash_key: DEFAULT_FLASH_KEY.to_string(),
            priority: 0,
            methods: None,
            prefixes: None,
        }
    }

    /// from the `gate` config section, site key falls back to the `DataSiteKey` env var
    pub fn from_settings(gate: &conf::Gate) -> Self {
        let site_key = gate.site_key.clone().or_else(|| std::env::var(conf::SITE_KEY_ENV).ok());
        Self { redirect_to: gate.redirect_to.clone(), flash_key: gate.flash_key.clone(), ..Self::new(site_key) }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn flash_key(mut self, key: impl Into<String>) -> Self {
        self.flash_key = key.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
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
}

/// `302 Found` to `location` with the flash attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub location: String,
    pub flash: Flash,
}

impl IntoResponse for Redirection {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, self.flash, [(LOCATION, self.location)]).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect(Redirection),
}

#[derive(Debug, Clone)]
pub struct Gate {
    config: Arc<GateConfig>,
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn middleware_name() -> &'static str {
        "Gate"
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// pure, the outcome is only read
    pub fn decide(&self, outcome: &ValidationResult) -> Decision {
        if outcome.is_empty() {
            tracing::debug!("validation passed, continue");
            return Decision::Proceed;
        }

        tracing::info!(errors = outcome.len(), location = %self.config.redirect_to, "validation failed, redirecting");
        let flash = Flash::new().with(self.config.flash_key.clone(), self.config.site_key.clone());
        Decision::Redirect(Redirection { location: self.config.redirect_to.clone(), flash })
    }

    /// `next` runs exactly once when the outcome is empty and never otherwise
    pub async fn intercept<T, F, Fut>(&self, outcome: &ValidationResult, next: F) -> Result<T, Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.decide(outcome) {
            Decision::Proceed => Ok(next().await),
            Decision::Redirect(redirection) => Err(redirection.into_response()),
        }
    }

    /// the outcome a request carries, a missing one counts as failed
    fn outcome_of(request: &Request) -> ValidationResult {
        match request.extensions().get::<ValidationResult>() {
            Some(outcome) => outcome.clone(),
            None => {
                tracing::error!("no validation outcome on {} {}, input validator must run before the gate", request.method(), request.uri().path());
                ValidationResult::invalid(vec![crate::web::validation::ValidationError::with_code("request", "not validated", "unvalidated")])
            },
        }
    }
}

/// `axum::middleware::from_fn_with_state` entry
///
/// the redirect only carries a [`Flash`] response extension, a [`crate::web::flash::FlashLayer`]
/// must wrap this middleware to turn it into the flash cookie
pub async fn guard(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    let outcome = Gate::outcome_of(&request);
    match gate.intercept(&outcome, move || next.run(request)).await {
        Ok(response) => response,
        Err(redirect) => redirect,
    }
}

#[async_trait]
impl Middleware for Gate {
    fn name(&self) -> &'static str {
        Gate::middleware_name()
    }

    async fn on_request(&self, context: Context, request: Request) -> Flow {
        let outcome = Gate::outcome_of(&request);
        match self.intercept(&outcome, move || async move { request }).await {
            Ok(request) => Flow::Next(context, request),
            Err(redirect) => Flow::Halt(context, redirect),
        }
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn methods(&self) -> Option<Vec<ApplyKind<HttpMethod>>> {
        self.config.methods.as_ref().map(|ms| ms.iter().map(|m| ApplyKind::Include(*m)).collect())
    }

    fn patterns(&self) -> Option<Vec<ApplyKind<Pattern>>> {
        self.config.prefixes.as_ref().map(|ps| ps.iter().map(|p| ApplyKind::Include(Pattern::Prefix(p.clone()))).collect())
    }
}
