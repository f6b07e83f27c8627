//! Destination service resolution.
//!
//! The proxy encodes the routing target as a cluster identifier,
//! conventionally `direction|subset|namespace|host`. A handful of reserved
//! sentinel names stand in for "no route matched" and "explicit
//! passthrough" rather than a real backend; those resolve to themselves.

/// Cluster receiving traffic for which no route matched.
pub const BLACK_HOLE_CLUSTER: &str = "BlackHoleCluster";
/// Cluster for traffic explicitly allowed past routing.
pub const PASS_THROUGH_CLUSTER: &str = "PassthroughCluster";
/// IPv4 variant of the inbound passthrough cluster.
pub const INBOUND_PASSTHROUGH_CLUSTER_IPV4: &str = "InboundPassthroughClusterIpv4";
/// IPv6 variant of the inbound passthrough cluster.
pub const INBOUND_PASSTHROUGH_CLUSTER_IPV6: &str = "InboundPassthroughClusterIpv6";
/// Route name that maps to [`BLACK_HOLE_CLUSTER`].
pub const BLACK_HOLE_ROUTE_NAME: &str = "block_all";
/// Route name that maps to [`PASS_THROUGH_CLUSTER`].
pub const PASS_THROUGH_ROUTE_NAME: &str = "allow_any";

const UNKNOWN_HOST: &str = "unknown";

/// Resolved destination service for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationService {
    /// Fully qualified destination host.
    pub host: String,
    /// Service name, shortened when the host's namespace matches the
    /// destination namespace.
    pub name: String,
}

/// Derives destination service host and name from the cluster identifier
/// and the request's authority header.
///
/// Reserved route names translate to their cluster sentinel first. A
/// sentinel cluster becomes the service name as-is; otherwise a 4-segment
/// cluster identifier supplies the host and the name is extracted from it.
/// When the cluster identifier supplies no host, the authority header is
/// used if `use_host_header_fallback` is set (safe within the mesh, not at
/// ingress where the client controls it), else the literal `"unknown"`.
///
/// Empty inputs propagate as empty/short values; this never fails.
#[must_use]
pub fn resolve_destination_service(
    destination_namespace: &str,
    cluster_name: &str,
    route_name: &str,
    authority: Option<&str>,
    use_host_header_fallback: bool,
) -> DestinationService {
    let cluster_name = match route_name {
        BLACK_HOLE_ROUTE_NAME => BLACK_HOLE_CLUSTER,
        PASS_THROUGH_ROUTE_NAME => PASS_THROUGH_CLUSTER,
        _ => cluster_name,
    };
    let fallback_host = || {
        if use_host_header_fallback {
            authority.unwrap_or_default().to_string()
        } else {
            UNKNOWN_HOST.to_string()
        }
    };

    if is_sentinel_cluster(cluster_name) {
        return DestinationService {
            host: fallback_host(),
            name: cluster_name.to_string(),
        };
    }

    let segments: Vec<&str> = cluster_name.split('|').collect();
    let host = if segments.len() == 4 {
        segments[3].to_string()
    } else {
        fallback_host()
    };
    let name = extract_service_name(&host, destination_namespace);
    DestinationService { host, name }
}

fn is_sentinel_cluster(cluster_name: &str) -> bool {
    matches!(
        cluster_name,
        BLACK_HOLE_CLUSTER
            | PASS_THROUGH_CLUSTER
            | INBOUND_PASSTHROUGH_CLUSTER_IPV4
            | INBOUND_PASSTHROUGH_CLUSTER_IPV6
    )
}

/// Extracts the service name from a destination host.
///
/// A host without separators is already a short name. `short-name:port`
/// keeps the part before the colon. A dotted host embeds its namespace as
/// the second label: when it matches the destination namespace the first
/// label is enough, otherwise the full host is kept (cross-namespace or
/// external destination).
fn extract_service_name(host: &str, destination_namespace: &str) -> String {
    let Some(name_end) = host.find(['.', ':']) else {
        return host.to_string();
    };
    if host.as_bytes()[name_end] == b':' {
        return host[..name_end].to_string();
    }

    let rest = &host[name_end + 1..];
    let service_namespace = match rest.find(['.', ':']) {
        Some(namespace_end) => &rest[..namespace_end],
        None => rest,
    };
    if service_namespace == destination_namespace {
        host[..name_end].to_string()
    } else {
        host.to_string()
    }
}
