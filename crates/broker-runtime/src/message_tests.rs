//! Tests for queue name and message property types.

use super::*;

#[test]
fn test_queue_name_trims_whitespace() {
    let name = QueueName::new("  orders  ".to_string()).unwrap();
    assert_eq!(name.as_str(), "orders");
}

#[test]
fn test_queue_name_rejects_blank() {
    assert!(QueueName::new("   ".to_string()).is_err());
    assert!(QueueName::new(String::new()).is_err());
}

#[test]
fn test_queue_name_rejects_overly_long_names() {
    let name = "q".repeat(QueueName::MAX_LENGTH + 1);
    let result = QueueName::new(name);
    assert!(matches!(result, Err(BrokerError::InvalidQueueName { .. })));

    let name = "q".repeat(QueueName::MAX_LENGTH);
    assert!(QueueName::new(name).is_ok());
}

#[test]
fn test_queue_name_from_str() {
    let name: QueueName = "orders".parse().unwrap();
    assert_eq!(name.to_string(), "orders");
}

#[test]
fn test_delivery_mode_mapping() {
    assert_eq!(DeliveryMode::from_durable(true), DeliveryMode::Persistent);
    assert_eq!(DeliveryMode::from_durable(false), DeliveryMode::Transient);
    assert_eq!(DeliveryMode::Persistent.as_wire_value(), 2);
    assert_eq!(DeliveryMode::Transient.as_wire_value(), 1);
}

#[test]
fn test_message_properties_builder() {
    let properties = MessageProperties::new(
        "message-1".to_string(),
        "primary-connection".to_string(),
        DeliveryMode::Persistent,
    )
    .with_header("origin".to_string(), "tests".to_string());

    assert_eq!(properties.content_type, "application/json");
    assert_eq!(properties.message_id, "message-1");
    assert_eq!(properties.app_id, "primary-connection");
    assert_eq!(properties.headers.get("origin"), Some(&"tests".to_string()));
    assert!(properties.timestamp > 0);
}

#[test]
fn test_message_properties_replace_headers() {
    let mut headers = HashMap::new();
    headers.insert("tenant".to_string(), "acme".to_string());

    let properties = MessageProperties::new(
        "message-2".to_string(),
        "primary-connection".to_string(),
        DeliveryMode::Transient,
    )
    .with_header("dropped".to_string(), "yes".to_string())
    .with_headers(headers);

    assert_eq!(properties.headers.len(), 1);
    assert_eq!(properties.headers.get("tenant"), Some(&"acme".to_string()));
}
