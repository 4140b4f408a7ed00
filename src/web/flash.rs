//! One-shot flash values carried in a signed cookie.
//!
//! A handler or middleware attaches a [`Flash`] to its response, [`FlashLayer`] writes it
//! into the `siteguard_flash` cookie, and the next request sees it as [`IncomingFlash`].
//! The cookie is expired on the response after that, so a value is readable exactly once.

use crate::erx::{amp, Erx, Layouted, ResultE};
use crate::web::cookie::{removal_cookie, response_cookie, set_cookie_value, CookieJar};
use axum::extract::{FromRequestParts, Request};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{IntoResponseParts, Response, ResponseParts};
use base64::Engine;
use futures_util::future::BoxFuture;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tower::{Layer, Service};

pub const FLASH_COOKIE: &str = "siteguard_flash";

type HmacSha256 = Hmac<Sha256>;

/// outgoing flash values, attach to a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flash {
    values: BTreeMap<String, String>,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` is stored as an empty string
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        self.values.insert(key.into(), value.unwrap_or_default());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl IntoResponseParts for Flash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// flash values delivered by the previous response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingFlash {
    values: BTreeMap<String, String>,
}

impl IncomingFlash {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<IncomingFlash>().cloned().unwrap_or_default())
    }
}

/// encodes flash values as `base64url(json).hex(hmac_sha256)`
#[derive(Clone)]
pub struct FlashCodec {
    secret: Arc<Vec<u8>>,
}

impl std::fmt::Debug for FlashCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashCodec").field("secret", &"***").finish()
    }
}

impl FlashCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: Arc::new(secret.as_ref().to_vec()) }
    }

    fn sign(&self, payload: &str) -> ResultE<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(amp("flash hmac key"))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn encode(&self, values: &BTreeMap<String, String>) -> ResultE<String> {
        let json = serde_json::to_vec(values).map_err(amp("flash encode"))?;
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.sign(&payload)?.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn decode(&self, raw: &str) -> ResultE<BTreeMap<String, String>> {
        let (payload, signature) = raw.split_once('.').ok_or_else(|| Erx::with_code(Layouted::middleware("FLSH", "0001"), "flash cookie malformed"))?;
        let signature = hex::decode(signature).map_err(amp("flash signature"))?;
        self.sign(payload)?
            .verify_slice(&signature)
            .map_err(|_| Erx::with_code(Layouted::middleware("FLSH", "0002"), "flash signature mismatch"))?;

        let json = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload).map_err(amp("flash payload"))?;
        serde_json::from_slice(&json).map_err(amp("flash payload json"))
    }
}

#[derive(Clone, Debug)]
pub struct FlashLayer {
    codec: FlashCodec,
}

impl FlashLayer {
    pub fn new(codec: FlashCodec) -> Self {
        Self { codec }
    }
}

impl<S> Layer<S> for FlashLayer {
    type Service = FlashService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FlashService { inner, codec: self.codec.clone() }
    }
}

#[derive(Clone, Debug)]
pub struct FlashService<S> {
    inner: S,
    codec: FlashCodec,
}

impl<S> FlashService<S> {
    fn incoming(&self, request: &Request) -> (bool, IncomingFlash) {
        let jar = CookieJar::from_headers(request.headers());
        let Some(cookie) = jar.get(FLASH_COOKIE) else {
            return (false, IncomingFlash::default());
        };

        match self.codec.decode(cookie.value()) {
            Ok(values) => (true, IncomingFlash { values }),
            Err(e) => {
                tracing::warn!("flash cookie ignored: {}", e);
                (true, IncomingFlash::default())
            },
        }
    }
}

impl<S> Service<Request> for FlashService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let (had_cookie, incoming) = self.incoming(&request);
        request.extensions_mut().insert(incoming);

        let codec = self.codec.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            let outgoing = response.extensions_mut().remove::<Flash>().filter(|flash| !flash.is_empty());
            let cookie = match outgoing {
                Some(flash) => match codec.encode(&flash.values) {
                    Ok(value) => Some(response_cookie(FLASH_COOKIE, value)),
                    Err(e) => {
                        tracing::error!("flash dropped: {}", e.message());
                        None
                    },
                },
                None if had_cookie => Some(removal_cookie(FLASH_COOKIE)),
                None => None,
            };

            if let Some(value) = cookie.as_ref().and_then(set_cookie_value) {
                response.headers_mut().append(SET_COOKIE, value);
            }

            Ok(response)
        })
    }
}
