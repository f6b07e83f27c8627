//! Host accessor seam.
//!
//! The surrounding proxy runtime owns all request, connection, and node
//! state; this trait is the extension's read-only window onto it. Every
//! call is synchronous and returns immediately — `None` means the value is
//! absent right now, not that the call failed. Implementations must not
//! block or perform I/O that can suspend mid-operation.

use meshlens_core::Value;

/// Read-only access to proxy runtime state.
pub trait Host {
    /// Reads a primitive value at `path`.
    fn scalar(&self, path: &[&str]) -> Option<Value>;

    /// Reads a structured property tree at `path`.
    fn structured(&self, path: &[&str]) -> Option<Value>;

    /// Reads a request header by name.
    fn request_header(&self, name: &str) -> Option<String>;

    /// String scalar, defaulting to empty when absent or mistyped.
    fn scalar_string(&self, path: &[&str]) -> String {
        self.scalar(path)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Integer scalar, defaulting to `0` when absent or mistyped.
    fn scalar_i64(&self, path: &[&str]) -> i64 {
        self.scalar(path).and_then(|value| value.as_i64()).unwrap_or_default()
    }

    /// Non-negative integer scalar, defaulting to `0` when absent,
    /// mistyped, or negative.
    fn scalar_u64(&self, path: &[&str]) -> u64 {
        self.scalar(path).and_then(|value| value.as_u64()).unwrap_or_default()
    }

    /// Boolean scalar, defaulting to `false` when absent or mistyped.
    fn scalar_bool(&self, path: &[&str]) -> bool {
        self.scalar(path).and_then(|value| value.as_bool()).unwrap_or_default()
    }

    /// Request header, defaulting to empty when absent.
    fn header_string(&self, name: &str) -> String {
        self.request_header(name).unwrap_or_default()
    }
}

/// Logical host paths consumed by the extension.
pub mod paths {
    /// Traffic direction of the listener handling the connection.
    pub const LISTENER_DIRECTION: &[&str] = &["listener_direction"];
    /// Local node metadata tree.
    pub const NODE_METADATA: &[&str] = &["node", "metadata"];
    /// Upstream cluster identifier for the active request.
    pub const CLUSTER_NAME: &[&str] = &["cluster_name"];
    /// Name of the route the request matched.
    pub const ROUTE_NAME: &[&str] = &["route_name"];

    pub const REQUEST_TIME: &[&str] = &["request", "time"];
    pub const REQUEST_DURATION: &[&str] = &["request", "duration"];
    pub const REQUEST_TOTAL_SIZE: &[&str] = &["request", "total_size"];
    pub const REQUEST_URL_PATH: &[&str] = &["request", "url_path"];
    pub const REQUEST_HOST: &[&str] = &["request", "host"];
    pub const REQUEST_SCHEME: &[&str] = &["request", "scheme"];

    pub const RESPONSE_TIME: &[&str] = &["response", "time"];
    pub const RESPONSE_DURATION: &[&str] = &["response", "duration"];
    pub const RESPONSE_TOTAL_SIZE: &[&str] = &["response", "total_size"];
    pub const RESPONSE_CODE: &[&str] = &["response", "code"];
    pub const RESPONSE_FLAGS: &[&str] = &["response", "flags"];

    pub const SOURCE_ADDRESS: &[&str] = &["source", "address"];
    pub const DESTINATION_ADDRESS: &[&str] = &["destination", "address"];
    pub const DESTINATION_PORT: &[&str] = &["destination", "port"];
    pub const UPSTREAM_PORT: &[&str] = &["upstream", "port"];

    pub const CONNECTION_MTLS: &[&str] = &["connection", "mtls"];
    pub const CONNECTION_REQUESTED_SERVER_NAME: &[&str] =
        &["connection", "requested_server_name"];
    pub const CONNECTION_URI_SAN_LOCAL_CERTIFICATE: &[&str] =
        &["connection", "uri_san_local_certificate"];
    pub const CONNECTION_URI_SAN_PEER_CERTIFICATE: &[&str] =
        &["connection", "uri_san_peer_certificate"];
    pub const UPSTREAM_URI_SAN_LOCAL_CERTIFICATE: &[&str] =
        &["upstream", "uri_san_local_certificate"];
    pub const UPSTREAM_URI_SAN_PEER_CERTIFICATE: &[&str] =
        &["upstream", "uri_san_peer_certificate"];

    /// Namespace for connection-scoped filter-state entries.
    pub const FILTER_STATE: &str = "filter_state";
}

/// Request header names consumed by the extension.
pub mod headers {
    pub const AUTHORITY: &str = ":authority";
    pub const METHOD: &str = ":method";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const REFERER: &str = "referer";
    pub const USER_AGENT: &str = "user-agent";
    pub const REQUEST_ID: &str = "x-request-id";
    pub const B3_TRACE_ID: &str = "x-b3-traceid";
    pub const B3_SPAN_ID: &str = "x-b3-spanid";
    pub const B3_SAMPLED: &str = "x-b3-sampled";
}

/// Filter-state keys under which peers exchange identity metadata.
pub mod metadata_exchange {
    /// Peer id of the upstream connection.
    pub const UPSTREAM_ID: &str = "envoy.wasm.metadata_exchange.upstream_id";
    /// Metadata blob announced by the upstream peer.
    pub const UPSTREAM: &str = "envoy.wasm.metadata_exchange.upstream";
    /// Peer id of the downstream connection.
    pub const DOWNSTREAM_ID: &str = "envoy.wasm.metadata_exchange.downstream_id";
    /// Metadata blob announced by the downstream peer.
    pub const DOWNSTREAM: &str = "envoy.wasm.metadata_exchange.downstream";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeHost;
    use meshlens_core::Value;

    #[test]
    fn convenience_accessors_default_on_absence() {
        let host = FakeHost::new();
        assert_eq!(host.scalar_string(paths::SOURCE_ADDRESS), "");
        assert_eq!(host.scalar_i64(paths::RESPONSE_CODE), 0);
        assert_eq!(host.scalar_u64(paths::RESPONSE_FLAGS), 0);
        assert!(!host.scalar_bool(paths::CONNECTION_MTLS));
        assert_eq!(host.header_string(headers::USER_AGENT), "");
    }

    #[test]
    fn convenience_accessors_default_on_type_mismatch() {
        let host = FakeHost::new();
        host.set_scalar(paths::RESPONSE_CODE, Value::from("200"));
        host.set_scalar(paths::SOURCE_ADDRESS, Value::from(5i64));
        assert_eq!(host.scalar_i64(paths::RESPONSE_CODE), 0);
        assert_eq!(host.scalar_string(paths::SOURCE_ADDRESS), "");
    }
}
