//! The HTTP embedding: a POST-only endpoint in front of the dispatcher.
//!
//! Request handling is offloaded to the blocking pool, one handler task per
//! request; engine calls may block indefinitely without starving the
//! accept loop.

use crate::{
    engine::Engine,
    server::{Dispatcher, DispatchOutcome, ServerConfig, WireFormat},
    service::{MetaService, RequestContext},
    session::{Delegation, SessionStore},
    RelayError, RelayResult,
};
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Method, StatusCode,
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};

/// Header conveying the authenticated remote user.
///
/// The authentication handshake itself lives in front of the gateway; the
/// principal it established is handed through for the impersonation boundary.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// A running gateway endpoint.
#[derive(Debug)]
pub struct HttpServer {
    local_addr: SocketAddr,
    store: Arc<SessionStore>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl HttpServer {
    /// Binds and serves in a background thread; returns once the socket is
    /// bound.
    pub fn start(config: &ServerConfig, engine: Arc<dyn Engine>) -> RelayResult<HttpServer> {
        Self::start_inner(config, engine, None)
    }

    /// Like [`HttpServer::start`], with an impersonation boundary installed.
    pub fn start_with_delegation(
        config: &ServerConfig,
        engine: Arc<dyn Engine>,
        delegation: Arc<dyn Delegation>,
    ) -> RelayResult<HttpServer> {
        Self::start_inner(config, engine, Some(delegation))
    }

    fn start_inner(
        config: &ServerConfig,
        engine: Arc<dyn Engine>,
        delegation: Option<Arc<dyn Delegation>>,
    ) -> RelayResult<HttpServer> {
        let listener = std::net::TcpListener::bind(config.bind)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let mut store = SessionStore::new(engine, config.session_limits());
        if let Some(delegation) = delegation {
            store = store.with_delegation(delegation);
        }
        let store = Arc::new(store);
        store.start_sweeper(config.sweep_interval);

        let server_address =
            MetaService::server_address_for(&SocketAddr::new(config.bind.ip(), local_addr.port()));
        let service = Arc::new(MetaService::new(Arc::clone(&store), server_address));
        let dispatcher = Arc::new(Dispatcher::new(service));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("dbrelay-http")
            .build()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let max_header_bytes = config.max_header_bytes;

        let join = std::thread::Builder::new()
            .name("dbrelay-server".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let make_service = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
                        let remote_addr = conn.remote_addr();
                        let dispatcher = Arc::clone(&dispatcher);
                        async move {
                            Ok::<_, Infallible>(service_fn(move |request| {
                                handle(Arc::clone(&dispatcher), remote_addr, request)
                            }))
                        }
                    });
                    let server = match hyper::Server::from_tcp(listener) {
                        Ok(builder) => builder
                            .http1_max_buf_size(max_header_bytes.max(8_192))
                            .serve(make_service)
                            .with_graceful_shutdown(async {
                                shutdown_rx.await.ok();
                            }),
                        Err(e) => {
                            error!("handing the listener to the HTTP stack failed: {e}");
                            return;
                        }
                    };
                    info!("gateway listening on {local_addr}");
                    if let Err(e) = server.await {
                        error!("HTTP server terminated with {e}");
                    }
                });
            })?;

        Ok(HttpServer {
            local_addr,
            store,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }

    /// The bound socket address; useful with a configured port of `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The session store behind this endpoint, for diagnostics.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Stops accepting requests and waits for the server thread.
    pub fn shutdown(mut self) {
        self.shutdown_impl();
    }

    fn shutdown_impl(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }
        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown_impl();
    }
}

async fn handle(
    dispatcher: Arc<Dispatcher>,
    remote_addr: SocketAddr,
    request: hyper::Request<Body>,
) -> Result<hyper::Response<Body>, Infallible> {
    if request.method() != Method::POST {
        return Ok(hyper::Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::from("the gateway accepts POST only"))
            .unwrap(/* static response */));
    }
    let format = WireFormat::from_content_type(
        request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );
    let remote_user = request
        .headers()
        .get(REMOTE_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let outcome = match hyper::body::to_bytes(request.into_body()).await {
        Ok(body) => {
            let ctx = RequestContext {
                remote_user,
                remote_addr: Some(remote_addr),
            };
            let worker = Arc::clone(&dispatcher);
            let blocking =
                tokio::task::spawn_blocking(move || worker.dispatch(&ctx, format, &body)).await;
            match blocking {
                Ok(outcome) => outcome,
                Err(e) => dispatcher.error_outcome(
                    format,
                    &RelayError::ImplDetailed(format!("request handler failed: {e}")),
                ),
            }
        }
        Err(e) => dispatcher.error_outcome(
            format,
            &RelayError::Protocol(format!("reading the request body failed: {e}")),
        ),
    };
    Ok(respond(format, outcome))
}

fn respond(format: WireFormat, outcome: DispatchOutcome) -> hyper::Response<Body> {
    let status = if outcome.is_error {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    hyper::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, format.content_type())
        .body(Body::from(outcome.body))
        .unwrap(/* valid header values */)
}
