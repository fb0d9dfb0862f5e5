use super::*;

#[test]
fn test_default_is_valid() {
    let config = StreamingConfig::default();
    assert!(config.validate().is_ok());
    assert!(config.worker_threads >= 1);
    assert!(config.transfer_max_size >= config.transfer_floor_size);
}

#[test]
fn test_compact_is_valid() {
    assert!(StreamingConfig::compact().validate().is_ok());
}

#[test]
fn test_zero_slab_rejected() {
    let config = StreamingConfig { slab_size: 0, ..StreamingConfig::default() };
    assert!(matches!(config.validate(), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_cap_below_floor_rejected() {
    let config = StreamingConfig {
        transfer_floor_size: 1024,
        transfer_max_size: 512,
        ..StreamingConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(format!("{}", err).contains("transfer_max_size"));
}

#[test]
fn test_zero_resource_slots_rejected() {
    let config = StreamingConfig { resource_slot_count: 0, ..StreamingConfig::default() };
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_destroy_queue_rejected() {
    let config = StreamingConfig { destroy_queue_capacity: 0, ..StreamingConfig::default() };
    assert!(config.validate().is_err());
}
