use bridge_model::{AlertPriority, Protocol, RoutingRule};

/// Default routing table applied before any caller override.
pub fn default_routing_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule {
            priority: AlertPriority::Critical,
            protocol: Protocol::Both,
            escalation_timeout_seconds: 60,
            require_ack: true,
        },
        RoutingRule {
            priority: AlertPriority::High,
            protocol: Protocol::Mesh,
            escalation_timeout_seconds: 300,
            require_ack: true,
        },
        RoutingRule {
            priority: AlertPriority::Medium,
            protocol: Protocol::Mesh,
            escalation_timeout_seconds: 1800,
            require_ack: false,
        },
        RoutingRule {
            priority: AlertPriority::Low,
            protocol: Protocol::Secure,
            escalation_timeout_seconds: 0,
            require_ack: false,
        },
        RoutingRule {
            priority: AlertPriority::Info,
            protocol: Protocol::Secure,
            escalation_timeout_seconds: 0,
            require_ack: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_priority_exactly_once() {
        let rules = default_routing_rules();
        assert_eq!(rules.len(), 5);
        let critical = rules.iter().find(|r| r.priority == AlertPriority::Critical).unwrap();
        assert_eq!(critical.protocol, Protocol::Both);
        assert_eq!(critical.escalation_timeout_seconds, 60);
        assert!(critical.require_ack);
    }
}
