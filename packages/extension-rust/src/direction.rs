//! Traffic direction of the active listener.

use crate::host::{paths, Host};

/// Which way traffic flows on the listener that accepted the connection.
///
/// Threaded explicitly through resolution functions; everything
/// direction-dependent (ports, principals, peer selection) branches on
/// this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficDirection {
    /// The host did not report a direction.
    Unspecified,
    /// Traffic arriving from a downstream client.
    Inbound,
    /// Traffic leaving toward an upstream service.
    Outbound,
}

impl TrafficDirection {
    /// Decodes the listener-direction scalar (`1` inbound, `2` outbound);
    /// anything else is `Unspecified`.
    #[must_use]
    pub fn from_host<H: Host + ?Sized>(host: &H) -> Self {
        match host.scalar(paths::LISTENER_DIRECTION).and_then(|value| value.as_i64()) {
            Some(1) => Self::Inbound,
            Some(2) => Self::Outbound,
            _ => Self::Unspecified,
        }
    }

    /// True only for [`TrafficDirection::Outbound`].
    #[must_use]
    pub fn is_outbound(self) -> bool {
        self == Self::Outbound
    }
}

#[cfg(test)]
mod tests {
    use meshlens_core::Value;

    use super::*;
    use crate::testutil::FakeHost;

    #[test]
    fn decodes_listener_direction_scalar() {
        let host = FakeHost::new();
        host.set_scalar(paths::LISTENER_DIRECTION, Value::from(1i64));
        assert_eq!(TrafficDirection::from_host(&host), TrafficDirection::Inbound);

        host.set_scalar(paths::LISTENER_DIRECTION, Value::from(2i64));
        assert_eq!(TrafficDirection::from_host(&host), TrafficDirection::Outbound);
        assert!(TrafficDirection::from_host(&host).is_outbound());
    }

    #[test]
    fn unknown_or_absent_direction_is_unspecified() {
        let host = FakeHost::new();
        assert_eq!(TrafficDirection::from_host(&host), TrafficDirection::Unspecified);

        host.set_scalar(paths::LISTENER_DIRECTION, Value::from(9i64));
        assert_eq!(TrafficDirection::from_host(&host), TrafficDirection::Unspecified);
    }
}
