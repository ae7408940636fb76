//! gRPC server for the Pulumi resource provider protocol.
//!
//! [`ProviderService`] is the provider-facing API, expressed in JSON property
//! bags instead of protobuf structs. [`serve`] wraps an implementation in the
//! generated `pulumirpc.ResourceProvider` service, prints the handshake and
//! runs until the engine shuts the plugin down.
//!
//! # Handshake
//!
//! The engine starts the plugin as a subprocess and reads the port the server
//! listens on from the first line of stdout. Logs therefore go to stderr.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server stops accepting connections and waits up to
//! [`ServeOptions::shutdown_timeout`] for in-flight calls before it calls the
//! provider's [`ProviderService::cancel`] hook and returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated;
use crate::generated::resource_provider_server::{ResourceProvider, ResourceProviderServer};
use crate::properties::{struct_to_value, value_to_struct};
use crate::schema::PackageSchema;
use crate::types::{CheckResult, CreateResult, DiffResult, ReadResult, PLUGIN_VERSION};

/// The provider-facing side of the protocol.
///
/// Property bags arrive as `serde_json::Value` objects. `props` always means
/// the state the engine recorded after the last successful operation.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Config
    // =========================================================================

    /// The package schema returned by GetSchema.
    fn schema(&self) -> PackageSchema;

    /// Validate provider configuration.
    async fn check_config(&self, urn: &str, olds: Value, news: Value) -> Result<CheckResult, ProviderError> {
        let _ = (urn, olds);
        Ok(CheckResult::accept(news))
    }

    /// Decide whether a config change requires replacing resources.
    async fn diff_config(&self, urn: &str, olds: Value, news: Value) -> Result<DiffResult, ProviderError> {
        let _ = (urn, olds, news);
        Ok(DiffResult::no_change())
    }

    /// Apply provider configuration.
    async fn configure(&self, config: Value) -> Result<(), ProviderError>;

    /// Call a provider function.
    async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError> {
        let _ = args;
        Err(ProviderError::UnsupportedKind(token.to_string()))
    }

    // =========================================================================
    // Resource Lifecycle
    // =========================================================================

    /// Validate proposed inputs. `olds` are the engine's previous inputs.
    async fn check(&self, urn: &str, olds: Value, news: Value) -> Result<CheckResult, ProviderError>;

    /// Compute the changes between recorded state and proposed inputs.
    async fn diff(&self, urn: &str, id: &str, props: Value, news: Value) -> Result<DiffResult, ProviderError>;

    /// Create a resource.
    async fn create(&self, urn: &str, inputs: Value, preview: bool) -> Result<CreateResult, ProviderError>;

    /// Read a resource's live state. `None` when it no longer exists.
    async fn read(&self, urn: &str, id: &str, props: Value) -> Result<Option<ReadResult>, ProviderError>;

    /// Update a resource in place and return its new outputs.
    async fn update(
        &self,
        urn: &str,
        id: &str,
        olds: Value,
        news: Value,
        preview: bool,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, urn: &str, id: &str, props: Value) -> Result<(), ProviderError>;

    /// Abandon outstanding work. Also called once the server has shut down.
    async fn cancel(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Wrapper that implements the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> ResourceProvider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_plugin_info")]
    async fn get_plugin_info(
        &self,
        _request: tonic::Request<()>,
    ) -> Result<tonic::Response<generated::PluginInfo>, tonic::Status> {
        debug!("GetPluginInfo called");
        Ok(tonic::Response::new(generated::PluginInfo {
            version: PLUGIN_VERSION.to_string(),
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<generated::GetSchemaRequest>,
    ) -> Result<tonic::Response<generated::GetSchemaResponse>, tonic::Status> {
        debug!("GetSchema called");
        let schema = self.provider.schema();
        info!(
            resources = schema.resources.len(),
            functions = schema.functions.len(),
            "GetSchema completed"
        );
        let schema = serde_json::to_string(&schema.to_pulumi_json())
            .map_err(|e| tonic::Status::from(ProviderError::from(e)))?;
        Ok(tonic::Response::new(generated::GetSchemaResponse { schema }))
    }

    #[instrument(skip(self, request), name = "grpc.check_config")]
    async fn check_config(
        &self,
        request: tonic::Request<generated::CheckRequest>,
    ) -> Result<tonic::Response<generated::CheckResponse>, tonic::Status> {
        debug!("CheckConfig called");
        let req = request.into_inner();
        let result = self
            .provider
            .check_config(&req.urn, struct_to_value(req.olds), struct_to_value(req.news))
            .await
            .map_err(|e| {
                error!(error = %e, "CheckConfig failed");
                tonic::Status::from(e)
            })?;
        if !result.failures.is_empty() {
            warn!(failures = result.failures.len(), "CheckConfig found invalid config");
        }
        Ok(tonic::Response::new(result.into()))
    }

    #[instrument(skip(self, request), name = "grpc.diff_config")]
    async fn diff_config(
        &self,
        request: tonic::Request<generated::DiffRequest>,
    ) -> Result<tonic::Response<generated::DiffResponse>, tonic::Status> {
        debug!("DiffConfig called");
        let req = request.into_inner();
        let result = self
            .provider
            .diff_config(&req.urn, struct_to_value(req.olds), struct_to_value(req.news))
            .await
            .map_err(|e| {
                error!(error = %e, "DiffConfig failed");
                tonic::Status::from(e)
            })?;
        Ok(tonic::Response::new(result.into()))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<generated::ConfigureRequest>,
    ) -> Result<tonic::Response<generated::ConfigureResponse>, tonic::Status> {
        debug!("Configure called");
        let req = request.into_inner();
        let config = crate::config::merge_configure_inputs(&req.variables, struct_to_value(req.args));

        match self.provider.configure(config).await {
            Ok(()) => {
                info!("Configure completed successfully");
                Ok(tonic::Response::new(generated::ConfigureResponse {
                    accept_secrets: false,
                    supports_preview: true,
                    accept_resources: false,
                    accept_outputs: false,
                }))
            }
            Err(e) => {
                error!(error = %e, "Configure failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.invoke")]
    async fn invoke(
        &self,
        request: tonic::Request<generated::InvokeRequest>,
    ) -> Result<tonic::Response<generated::InvokeResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(token = %req.tok, "Invoke called");

        match self.provider.invoke(&req.tok, struct_to_value(req.args)).await {
            Ok(result) => Ok(tonic::Response::new(generated::InvokeResponse {
                r#return: Some(value_to_struct(&result)),
                failures: vec![],
            })),
            Err(e) => {
                error!(token = %req.tok, error = %e, "Invoke failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.check")]
    async fn check(
        &self,
        request: tonic::Request<generated::CheckRequest>,
    ) -> Result<tonic::Response<generated::CheckResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(urn = %req.urn, "Check called");

        match self
            .provider
            .check(&req.urn, struct_to_value(req.olds), struct_to_value(req.news))
            .await
        {
            Ok(result) => {
                if !result.failures.is_empty() {
                    warn!(urn = %req.urn, failures = result.failures.len(), "Check found invalid inputs");
                }
                Ok(tonic::Response::new(result.into()))
            }
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Check failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.diff")]
    async fn diff(
        &self,
        request: tonic::Request<generated::DiffRequest>,
    ) -> Result<tonic::Response<generated::DiffResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(urn = %req.urn, id = %req.id, "Diff called");

        match self
            .provider
            .diff(&req.urn, &req.id, struct_to_value(req.olds), struct_to_value(req.news))
            .await
        {
            Ok(result) => {
                debug!(
                    urn = %req.urn,
                    changes = result.detailed_diff.len(),
                    replace = result.requires_replace(),
                    "Diff completed"
                );
                Ok(tonic::Response::new(result.into()))
            }
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Diff failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<generated::CreateRequest>,
    ) -> Result<tonic::Response<generated::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(urn = %req.urn, preview = req.preview, "Create called");

        match self
            .provider
            .create(&req.urn, struct_to_value(req.properties), req.preview)
            .await
        {
            Ok(created) => {
                info!(urn = %req.urn, id = %created.id, "Create completed successfully");
                Ok(tonic::Response::new(generated::CreateResponse {
                    id: created.id,
                    properties: Some(value_to_struct(&created.outputs)),
                }))
            }
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Create failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<generated::ReadRequest>,
    ) -> Result<tonic::Response<generated::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(urn = %req.urn, id = %req.id, "Read called");

        match self
            .provider
            .read(&req.urn, &req.id, struct_to_value(req.properties))
            .await
        {
            Ok(Some(read)) => Ok(tonic::Response::new(generated::ReadResponse {
                id: read.id,
                properties: Some(value_to_struct(&read.outputs)),
                inputs: Some(value_to_struct(&read.inputs)),
            })),
            // An empty id tells the engine the resource is gone.
            Ok(None) => Ok(tonic::Response::new(generated::ReadResponse {
                id: String::new(),
                properties: None,
                inputs: None,
            })),
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Read failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<generated::UpdateRequest>,
    ) -> Result<tonic::Response<generated::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(urn = %req.urn, id = %req.id, preview = req.preview, "Update called");

        match self
            .provider
            .update(
                &req.urn,
                &req.id,
                struct_to_value(req.olds),
                struct_to_value(req.news),
                req.preview,
            )
            .await
        {
            Ok(outputs) => {
                info!(urn = %req.urn, "Update completed successfully");
                Ok(tonic::Response::new(generated::UpdateResponse {
                    properties: Some(value_to_struct(&outputs)),
                }))
            }
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Update failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, request), name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<generated::DeleteRequest>,
    ) -> Result<tonic::Response<()>, tonic::Status> {
        let req = request.into_inner();
        info!(urn = %req.urn, id = %req.id, "Delete called");

        match self
            .provider
            .delete(&req.urn, &req.id, struct_to_value(req.properties))
            .await
        {
            Ok(()) => {
                info!(urn = %req.urn, "Delete completed successfully");
                Ok(tonic::Response::new(()))
            }
            Err(e) => {
                error!(urn = %req.urn, error = %e, "Delete failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self, _request), name = "grpc.cancel")]
    async fn cancel(&self, _request: tonic::Request<()>) -> Result<tonic::Response<()>, tonic::Status> {
        info!("Cancel called");
        self.provider.cancel().await?;
        Ok(tonic::Response::new(()))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// After a shutdown signal, how long in-flight calls may take to finish.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the server runs until the engine kills
/// the process.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to install signal handlers");
                    return std::future::pending::<()>().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                warn!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints the port to stdout for the engine, then serves until a shutdown
/// signal. For custom configuration, use [`serve_with_options`].
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a specific address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    serve_on_listener(provider, listener, actual_addr, options).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    // Handshake: the engine reads the port from the first stdout line.
    println!("{}", addr.port());

    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let provider_for_shutdown = Arc::clone(&provider);

    let grpc_service = ProviderGrpcService { provider };
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();

    let server_future = Server::builder()
        .add_service(ResourceProviderServer::new(grpc_service))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                wait_for_shutdown_signal().await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server_future);

    // The drain deadline only starts once a signal arrived.
    let shutdown_timeout = options.shutdown_timeout;
    let drain_deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(shutdown_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = &mut server_future => match result {
            Ok(()) => info!("Server shutdown complete"),
            Err(e) => {
                error!(error = %e, "Server error during shutdown");
                return Err(e.into());
            }
        },
        _ = drain_deadline => {
            warn!(
                timeout = ?shutdown_timeout,
                "Shutdown timeout exceeded, forcing shutdown"
            );
        }
    }

    debug!("Calling provider cancel()");
    if let Err(e) = provider_for_shutdown.cancel().await {
        warn!(error = %e, "Provider cancel() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}
