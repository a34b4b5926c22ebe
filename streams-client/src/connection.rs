// SPDX-License-Identifier: Apache-2.0

//! Channel factory (C5): builds a configured `tonic` channel and the
//! per-call context (deadline, wait-for-ready, stream-name metadata, and
//! optional bearer auth) layered on top of it.

use std::time::Duration;

use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Request;

use streams_common::Status;

const STREAM_METADATA_KEY: &str = "stream";
const STREAMS_ENDPOINT_ENV: &str = "STREAMS_ENDPOINT";

/// Supplies a bearer token for each call. Acquisition (refreshing a Google
/// ID token, reading a service-account key, etc.) is the caller's concern;
/// this crate only consumes the result.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<String, Status>;
}

/// Configuration for the channel to a packet-streaming server. Build with
/// [`ConnectionOptionsBuilder`].
#[derive(Clone)]
pub struct ConnectionOptions {
    pub target: String,
    pub stream: String,
    pub use_insecure_channel: bool,
    pub ssl_domain_name: Option<String>,
    pub ssl_root_cert_path: Option<String>,
    pub token_provider: Option<std::sync::Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("target", &self.target)
            .field("stream", &self.stream)
            .field("use_insecure_channel", &self.use_insecure_channel)
            .field("ssl_domain_name", &self.ssl_domain_name)
            .field("ssl_root_cert_path", &self.ssl_root_cert_path)
            .field("token_provider", &self.token_provider.is_some())
            .finish()
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptionsBuilder::default().build()
    }
}

/// Per-call options layered on top of a connection.
#[derive(Debug, Clone, Copy)]
pub struct RpcOptions {
    pub wait_for_ready: bool,
    /// `None` means no deadline.
    pub timeout: Option<Duration>,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            wait_for_ready: false,
            timeout: None,
        }
    }
}

/// Builder for [`ConnectionOptions`], in the chained-setter-returning-`&mut
/// Self`-then-`build()` style.
#[derive(Default)]
pub struct ConnectionOptionsBuilder {
    target: Option<String>,
    stream: String,
    use_insecure_channel: bool,
    ssl_domain_name: Option<String>,
    ssl_root_cert_path: Option<String>,
    token_provider: Option<std::sync::Arc<dyn TokenProvider>>,
}

impl ConnectionOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&mut self, target: impl Into<String>) -> &mut Self {
        self.target = Some(target.into());
        self
    }

    pub fn stream(&mut self, stream: impl Into<String>) -> &mut Self {
        self.stream = stream.into();
        self
    }

    pub fn use_insecure_channel(&mut self, value: bool) -> &mut Self {
        self.use_insecure_channel = value;
        self
    }

    pub fn ssl_domain_name(&mut self, value: impl Into<String>) -> &mut Self {
        self.ssl_domain_name = Some(value.into());
        self
    }

    pub fn ssl_root_cert_path(&mut self, value: impl Into<String>) -> &mut Self {
        self.ssl_root_cert_path = Some(value.into());
        self
    }

    pub fn token_provider(&mut self, provider: std::sync::Arc<dyn TokenProvider>) -> &mut Self {
        self.token_provider = Some(provider);
        self
    }

    /// Seeds `target` from `STREAMS_ENDPOINT` when unset, the way
    /// `TraceExporterBuilder` seeds its agent URL from the environment.
    pub fn build(&self) -> ConnectionOptions {
        let target = self.target.clone().unwrap_or_else(|| {
            std::env::var(STREAMS_ENDPOINT_ENV).unwrap_or_else(|_| "http://localhost:50051".to_string())
        });
        ConnectionOptions {
            target,
            stream: self.stream.clone(),
            use_insecure_channel: self.use_insecure_channel,
            ssl_domain_name: self.ssl_domain_name.clone(),
            ssl_root_cert_path: self.ssl_root_cert_path.clone(),
            token_provider: self.token_provider.clone(),
        }
    }
}

#[derive(Clone)]
struct PerCallInterceptor {
    stream: AsciiMetadataValue,
    has_stream: bool,
    token_provider: Option<std::sync::Arc<dyn TokenProvider>>,
}

impl Interceptor for PerCallInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, tonic::Status> {
        if self.has_stream {
            request
                .metadata_mut()
                .insert(STREAM_METADATA_KEY, self.stream.clone());
        }
        if let Some(provider) = &self.token_provider {
            let token = provider
                .token()
                .map_err(crate::status_ext::StatusExt::into_tonic)?;
            let value: AsciiMetadataValue = format!("Bearer {token}")
                .try_into()
                .map_err(|_| tonic::Status::invalid_argument("token is not a valid header value"))?;
            request.metadata_mut().insert("authorization", value);
        }
        Ok(request)
    }
}

pub type StreamChannel = tonic::service::interceptor::InterceptedService<Channel, PerCallInterceptor>;

impl ConnectionOptions {
    /// Builds the underlying transport channel: insecure, or TLS with a
    /// root cert and SNI override when configured. Message size limits are
    /// left unbounded in both directions.
    async fn build_channel(&self) -> Result<Channel, Status> {
        let mut endpoint = Endpoint::from_shared(self.target.clone())
            .map_err(|e| Status::invalid_argument(e.to_string()))?
            .tcp_keepalive(Some(Duration::from_secs(60)));

        if !self.use_insecure_channel {
            let mut tls = ClientTlsConfig::new();
            if let Some(path) = &self.ssl_root_cert_path {
                let pem = std::fs::read_to_string(path)
                    .map_err(|e| Status::invalid_argument(format!("reading root cert: {e}")))?;
                tls = tls.ca_certificate(tonic::transport::Certificate::from_pem(pem));
            }
            if let Some(domain) = &self.ssl_domain_name {
                tls = tls.domain_name(domain.clone());
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
        }

        endpoint.connect().await.map_err(Status::from)
    }

    /// Builds the channel plus a per-call interceptor that stamps the
    /// stream-name metadata header and, when configured, bearer auth.
    pub async fn connect(&self) -> Result<StreamChannel, Status> {
        let channel = self.build_channel().await?;
        let interceptor = PerCallInterceptor {
            stream: AsciiMetadataValue::try_from(self.stream.as_str())
                .map_err(|e| Status::invalid_argument(e.to_string()))?,
            has_stream: !self.stream.is_empty(),
            token_provider: self.token_provider.clone(),
        };
        Ok(tonic::service::interceptor::InterceptedService::new(
            channel,
            interceptor,
        ))
    }
}

/// Derives a gRPC request deadline from `now + timeout` per [`RpcOptions`],
/// or leaves the request unbounded when `timeout` is absent.
pub fn apply_rpc_options<T>(mut request: Request<T>, options: RpcOptions) -> Request<T> {
    if let Some(timeout) = options.timeout {
        if !timeout.is_zero() {
            request.set_timeout(timeout);
        }
    }
    request
}
