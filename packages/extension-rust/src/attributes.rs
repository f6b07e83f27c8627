//! Per-request attribute store.
//!
//! One `RequestAttributes` is created per request and discarded with it.
//! Every getter queries the host at most once and memoizes the result for
//! the rest of the request, so all readers observe one consistent snapshot
//! even when the underlying host state keeps mutating. The store only
//! distinguishes "not yet computed" from "computed" — a missing host value
//! computes to the type's zero value, never an error.

use std::sync::Arc;

use meshlens_core::{resolve_destination_service, IdentityRecord};

use crate::direction::TrafficDirection;
use crate::host::{headers, paths, Host};
use crate::identity_cache::IdentityCache;
use crate::response_flag;

/// Content types classified as gRPC.
const GRPC_CONTENT_TYPES: [&str; 3] = [
    "application/grpc",
    "application/grpc+proto",
    "application/grpc+json",
];

const PROTOCOL_HTTP: &str = "http";
const PROTOCOL_GRPC: &str = "grpc";

/// How the service authenticated the caller on an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAuthenticationPolicy {
    /// Not applicable; outbound requests always report this.
    Unspecified,
    /// No verified client certificate on the connection.
    None,
    /// The connection carries a verified client certificate.
    MutualTls,
}

impl ServiceAuthenticationPolicy {
    /// Canonical telemetry string for this policy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::None => "none",
            Self::MutualTls => "mutual_tls",
        }
    }
}

/// One memoization slot per attribute. A slot set once never changes for
/// the remainder of the request.
#[derive(Default)]
struct Slots {
    direction: Option<TrafficDirection>,
    source_identity: Option<Arc<IdentityRecord>>,
    destination_identity: Option<Arc<IdentityRecord>>,
    request_timestamp: Option<i64>,
    response_timestamp: Option<i64>,
    duration: Option<i64>,
    response_duration: Option<i64>,
    request_size: Option<i64>,
    response_size: Option<i64>,
    response_code: Option<i64>,
    destination_port: Option<i64>,
    source_address: Option<String>,
    destination_address: Option<String>,
    requested_server_name: Option<String>,
    response_flag: Option<String>,
    request_protocol: Option<&'static str>,
    service_auth_policy: Option<ServiceAuthenticationPolicy>,
    source_principal: Option<String>,
    destination_principal: Option<String>,
    destination_service_host: Option<String>,
    destination_service_name: Option<String>,
    request_operation: Option<String>,
    request_host: Option<String>,
    request_scheme: Option<String>,
    url_path: Option<String>,
    referer: Option<String>,
    user_agent: Option<String>,
    request_id: Option<String>,
    b3_trace_id: Option<String>,
    b3_span_id: Option<String>,
    b3_trace_sampled: Option<bool>,
}

/// Lazily derived, request-scoped telemetry attributes.
///
/// Construct one per request with a direct handle to the worker's
/// [`IdentityCache`]; drop it when the request ends. There is no cleanup
/// protocol — partially filled slots are simply discarded.
pub struct RequestAttributes<'a, H: Host + ?Sized> {
    host: &'a H,
    identities: &'a IdentityCache,
    /// Whether the authority header may stand in for the destination host
    /// when the cluster identifier does not encode one. Safe within the
    /// mesh; pass `false` at ingress where the client controls the header.
    use_host_header_fallback: bool,
    slots: Slots,
}

impl<'a, H: Host + ?Sized> RequestAttributes<'a, H> {
    /// Creates an empty store bound to the worker's identity cache.
    #[must_use]
    pub fn new(host: &'a H, identities: &'a IdentityCache, use_host_header_fallback: bool) -> Self {
        Self {
            host,
            identities,
            use_host_header_fallback,
            slots: Slots::default(),
        }
    }

    // ---- Direction ----

    /// Listener traffic direction, fetched once.
    pub fn traffic_direction(&mut self) -> TrafficDirection {
        let host = self.host;
        *self
            .slots
            .direction
            .get_or_insert_with(|| TrafficDirection::from_host(host))
    }

    /// True when the request leaves toward an upstream service.
    pub fn is_outbound(&mut self) -> bool {
        self.traffic_direction().is_outbound()
    }

    // ---- Identity ----

    /// Identity of the workload the request came from: the local workload
    /// for outbound traffic, the downstream peer for inbound.
    pub fn source_identity(&mut self) -> Arc<IdentityRecord> {
        if let Some(record) = &self.slots.source_identity {
            return Arc::clone(record);
        }
        let record = if self.is_outbound() {
            self.identities.local()
        } else {
            self.identities.peer(self.host, TrafficDirection::Inbound)
        };
        self.slots.source_identity = Some(Arc::clone(&record));
        record
    }

    /// Identity of the workload the request is going to: the upstream peer
    /// for outbound traffic, the local workload for inbound.
    pub fn destination_identity(&mut self) -> Arc<IdentityRecord> {
        if let Some(record) = &self.slots.destination_identity {
            return Arc::clone(record);
        }
        let record = if self.is_outbound() {
            self.identities.peer(self.host, TrafficDirection::Outbound)
        } else {
            self.identities.local()
        };
        self.slots.destination_identity = Some(Arc::clone(&record));
        record
    }

    // ---- Time ----

    pub fn request_timestamp(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .request_timestamp
            .get_or_insert_with(|| host.scalar_i64(paths::REQUEST_TIME))
    }

    pub fn response_timestamp(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .response_timestamp
            .get_or_insert_with(|| host.scalar_i64(paths::RESPONSE_TIME))
    }

    pub fn duration(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .duration
            .get_or_insert_with(|| host.scalar_i64(paths::REQUEST_DURATION))
    }

    pub fn response_duration(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .response_duration
            .get_or_insert_with(|| host.scalar_i64(paths::RESPONSE_DURATION))
    }

    // ---- Size ----

    pub fn request_size(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .request_size
            .get_or_insert_with(|| host.scalar_i64(paths::REQUEST_TOTAL_SIZE))
    }

    pub fn response_size(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .response_size
            .get_or_insert_with(|| host.scalar_i64(paths::RESPONSE_TOTAL_SIZE))
    }

    // ---- Connection ----

    pub fn source_address(&mut self) -> &str {
        let host = self.host;
        self.slots
            .source_address
            .get_or_insert_with(|| host.scalar_string(paths::SOURCE_ADDRESS))
    }

    pub fn destination_address(&mut self) -> &str {
        let host = self.host;
        self.slots
            .destination_address
            .get_or_insert_with(|| host.scalar_string(paths::DESTINATION_ADDRESS))
    }

    /// Destination port: the upstream port for outbound traffic, the local
    /// destination port for inbound.
    pub fn destination_port(&mut self) -> i64 {
        let outbound = self.is_outbound();
        let host = self.host;
        *self.slots.destination_port.get_or_insert_with(|| {
            let path = if outbound { paths::UPSTREAM_PORT } else { paths::DESTINATION_PORT };
            host.scalar_i64(path)
        })
    }

    /// SNI the client requested on the connection.
    pub fn requested_server_name(&mut self) -> &str {
        let host = self.host;
        self.slots
            .requested_server_name
            .get_or_insert_with(|| host.scalar_string(paths::CONNECTION_REQUESTED_SERVER_NAME))
    }

    /// Response flags decoded into canonical short codes, once.
    pub fn response_flag(&mut self) -> &str {
        let host = self.host;
        self.slots
            .response_flag
            .get_or_insert_with(|| response_flag::decode(host.scalar_u64(paths::RESPONSE_FLAGS)))
    }

    // ---- HTTP ----

    /// `"grpc"` when the request content type is a gRPC one, else
    /// `"http"`. No finer HTTP-version classification is attempted.
    pub fn request_protocol(&mut self) -> &'static str {
        let host = self.host;
        *self.slots.request_protocol.get_or_insert_with(|| {
            let content_type = host.header_string(headers::CONTENT_TYPE);
            if GRPC_CONTENT_TYPES.contains(&content_type.as_str()) {
                PROTOCOL_GRPC
            } else {
                PROTOCOL_HTTP
            }
        })
    }

    pub fn response_code(&mut self) -> i64 {
        let host = self.host;
        *self
            .slots
            .response_code
            .get_or_insert_with(|| host.scalar_i64(paths::RESPONSE_CODE))
    }

    /// Destination service host; resolving it also fills the service name.
    pub fn destination_service_host(&mut self) -> &str {
        self.resolve_destination();
        self.slots.destination_service_host.as_deref().unwrap_or_default()
    }

    /// Destination service name; resolving it also fills the service host.
    pub fn destination_service_name(&mut self) -> &str {
        self.resolve_destination();
        self.slots.destination_service_name.as_deref().unwrap_or_default()
    }

    /// Request method.
    pub fn request_operation(&mut self) -> &str {
        let host = self.host;
        self.slots
            .request_operation
            .get_or_insert_with(|| host.header_string(headers::METHOD))
    }

    pub fn request_host(&mut self) -> &str {
        let host = self.host;
        self.slots
            .request_host
            .get_or_insert_with(|| host.scalar_string(paths::REQUEST_HOST))
    }

    pub fn request_scheme(&mut self) -> &str {
        let host = self.host;
        self.slots
            .request_scheme
            .get_or_insert_with(|| host.scalar_string(paths::REQUEST_SCHEME))
    }

    pub fn url_path(&mut self) -> &str {
        let host = self.host;
        self.slots
            .url_path
            .get_or_insert_with(|| host.scalar_string(paths::REQUEST_URL_PATH))
    }

    // ---- Auth ----

    /// Authentication mode of the service for this request. The notion only
    /// applies inbound; outbound requests always report `Unspecified`.
    pub fn service_authentication_policy(&mut self) -> ServiceAuthenticationPolicy {
        let outbound = self.is_outbound();
        let host = self.host;
        *self.slots.service_auth_policy.get_or_insert_with(|| {
            if outbound {
                ServiceAuthenticationPolicy::Unspecified
            } else if host.scalar_bool(paths::CONNECTION_MTLS) {
                ServiceAuthenticationPolicy::MutualTls
            } else {
                ServiceAuthenticationPolicy::None
            }
        })
    }

    /// Certificate URI identity of the calling workload. Direction flips
    /// which side of the connection is "source": outbound reads the local
    /// certificate on the upstream connection, inbound the peer certificate
    /// on the downstream connection.
    pub fn source_principal(&mut self) -> &str {
        let outbound = self.is_outbound();
        let host = self.host;
        self.slots.source_principal.get_or_insert_with(|| {
            let path = if outbound {
                paths::UPSTREAM_URI_SAN_LOCAL_CERTIFICATE
            } else {
                paths::CONNECTION_URI_SAN_PEER_CERTIFICATE
            };
            host.scalar_string(path)
        })
    }

    /// Certificate URI identity of the called workload; the mirror of
    /// [`Self::source_principal`].
    pub fn destination_principal(&mut self) -> &str {
        let outbound = self.is_outbound();
        let host = self.host;
        self.slots.destination_principal.get_or_insert_with(|| {
            let path = if outbound {
                paths::UPSTREAM_URI_SAN_PEER_CERTIFICATE
            } else {
                paths::CONNECTION_URI_SAN_LOCAL_CERTIFICATE
            };
            host.scalar_string(path)
        })
    }

    // ---- Headers ----

    pub fn referer(&mut self) -> &str {
        let host = self.host;
        self.slots
            .referer
            .get_or_insert_with(|| host.header_string(headers::REFERER))
    }

    pub fn user_agent(&mut self) -> &str {
        let host = self.host;
        self.slots
            .user_agent
            .get_or_insert_with(|| host.header_string(headers::USER_AGENT))
    }

    pub fn request_id(&mut self) -> &str {
        let host = self.host;
        self.slots
            .request_id
            .get_or_insert_with(|| host.header_string(headers::REQUEST_ID))
    }

    pub fn b3_trace_id(&mut self) -> &str {
        let host = self.host;
        self.slots
            .b3_trace_id
            .get_or_insert_with(|| host.header_string(headers::B3_TRACE_ID))
    }

    pub fn b3_span_id(&mut self) -> &str {
        let host = self.host;
        self.slots
            .b3_span_id
            .get_or_insert_with(|| host.header_string(headers::B3_SPAN_ID))
    }

    /// Whether the caller sampled this trace (`x-b3-sampled` of `1` or
    /// `true`).
    pub fn b3_trace_sampled(&mut self) -> bool {
        let host = self.host;
        *self.slots.b3_trace_sampled.get_or_insert_with(|| {
            matches!(host.header_string(headers::B3_SAMPLED).as_str(), "1" | "true")
        })
    }

    /// Resolves destination service host and name together. One resolver
    /// call fills both slots, so reading either attribute first costs the
    /// same.
    fn resolve_destination(&mut self) {
        if self.slots.destination_service_host.is_some() {
            return;
        }
        let destination_namespace = self.destination_identity().namespace.clone();
        let cluster_name = self.host.scalar_string(paths::CLUSTER_NAME);
        let route_name = self.host.scalar_string(paths::ROUTE_NAME);
        let authority = self.host.request_header(headers::AUTHORITY);
        let resolved = resolve_destination_service(
            &destination_namespace,
            &cluster_name,
            &route_name,
            authority.as_deref(),
            self.use_host_header_fallback,
        );
        self.slots.destination_service_host = Some(resolved.host);
        self.slots.destination_service_name = Some(resolved.name);
    }
}
