pub mod api;
pub mod cookie;
pub mod define;
pub mod flash;
pub mod middleware;
pub mod request;
pub mod url;
pub mod validation;

use crate::erx::{amp, ResultE, ResultEX};
use crate::web::flash::{FlashCodec, FlashLayer};
use crate::web::middleware::{Manager, ManagerLayer, Middleware};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// merge web routes
#[macro_export]
macro_rules! web_route_merge {
    ( $( $x:expr ),* ) => {
        {
            let mut routes: Vec<axum::Router> = vec![];

            $(
                routes.extend($x);
            )*

            routes
        }
    };
}

pub struct Web {
    name: String,
    bind: String,
    routes: Vec<Router>,
    middleware_manager: Manager,
    flash_codec: FlashCodec,
}

///
pub fn make_web(name: &str, bind: &str, routes: Vec<Router>, flash_secret: &str) -> Web {
    Web {
        name: name.to_string(),
        bind: bind.to_string(),
        routes,
        middleware_manager: Manager::new(),
        flash_codec: FlashCodec::new(flash_secret),
    }
}

impl Web {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }

    /// register a middleware, names must be unique
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> ResultE<Self> {
        self.middleware_manager.add(Arc::new(middleware))?;
        Ok(self)
    }

    /// merged routes wrapped by the middleware chain, flash cookie handling outside of it
    pub fn router(self) -> Router {
        let mut router = Router::new();
        for route in self.routes {
            router = router.merge(route);
        }

        router
            .layer(ManagerLayer::new(self.middleware_manager))
            .layer(FlashLayer::new(self.flash_codec))
            .layer(TraceLayer::new_for_http())
    }

    /// serve until ctrl-c
    pub async fn serve(self) -> ResultEX {
        let name = self.name.clone();
        let bind = self.bind.clone();

        let listen = tokio::net::TcpListener::bind(bind.as_str()).await.map_err(amp(&format!("[{} - webserver] can't bind to {}", name, bind)))?;

        info!("WebMod[ {} ] try served : {}", name, bind);
        axum::serve(listen, self.router())
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("ctrl-c handler failed: {}", e);
                }
            })
            .await
            .map_err(amp(&format!("WebMod[ {} ] failed to served : {}", name, bind)))?;

        info!("WebMod[ {} ] terminated", name);
        Ok(())
    }
}
