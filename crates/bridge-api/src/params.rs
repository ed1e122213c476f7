use bridge_model::{AlertPriority, Protocol};

pub fn parse_priority(raw: &str) -> Option<AlertPriority> {
    match raw.to_ascii_uppercase().as_str() {
        "CRITICAL" => Some(AlertPriority::Critical),
        "HIGH" => Some(AlertPriority::High),
        "MEDIUM" => Some(AlertPriority::Medium),
        "LOW" => Some(AlertPriority::Low),
        "INFO" => Some(AlertPriority::Info),
        _ => None,
    }
}

pub fn parse_protocol(raw: &str) -> Option<Protocol> {
    match raw.to_ascii_uppercase().as_str() {
        "MESH" => Some(Protocol::Mesh),
        "SECURE" => Some(Protocol::Secure),
        "BOTH" => Some(Protocol::Both),
        _ => None,
    }
}
