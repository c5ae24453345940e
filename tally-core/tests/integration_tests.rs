use std::time::SystemTime;
use tally_core::*;

fn q(s: &str) -> Quantity {
    Quantity::parse(s).unwrap()
}

#[test]
fn test_workload_id_validation() {
    // Valid IDs
    assert!(WorkloadId::new("a").is_ok());
    assert!(WorkloadId::new("7d1e2c4a-44aa-4b7e-9c1d-000000000001").is_ok());
    assert!(WorkloadId::new("default/nginx").is_ok());

    // Invalid IDs
    assert!(WorkloadId::new("").is_err());
    assert!(WorkloadId::new("pod\n1").is_err());
    assert!("".parse::<WorkloadId>().is_err());
}

#[test]
fn test_workload_id_serialization() {
    let id = WorkloadId::new("pod-123").unwrap();

    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"pod-123\"");

    let deserialized: WorkloadId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, deserialized);

    // Empty IDs are rejected on the way in too
    assert!(serde_json::from_str::<WorkloadId>("\"\"").is_err());
}

#[test]
fn test_cpu_quantities() {
    assert_eq!(q("100m").milli_value().unwrap(), 100);
    assert_eq!(q("0.1").milli_value().unwrap(), 100);
    assert_eq!(q("1.5").milli_value().unwrap(), 1500);
    assert_eq!(q("2").milli_value().unwrap(), 2000);

    // Sub-milli values round away from zero
    assert_eq!(q("1n").milli_value().unwrap(), 1);
    assert_eq!(q("100u").milli_value().unwrap(), 1);
}

#[test]
fn test_memory_quantities() {
    assert_eq!(q("100Mi").value().unwrap(), 104_857_600);
    assert_eq!(q("1Gi").value().unwrap(), 1_073_741_824);
    assert_eq!(q("128M").value().unwrap(), 128_000_000);
    assert_eq!(q("1e3").value().unwrap(), 1000);
    assert_eq!(q("1048576").value().unwrap(), 1_048_576);
}

#[test]
fn test_quantity_equality_is_by_value() {
    assert_eq!(q("100m"), q("0.1"));
    assert_eq!(q("1Ki"), q("1024"));
    assert_eq!(q("1k"), q("1000"));
    assert_ne!(q("1Ki"), q("1k"));
    assert!(q("100m") < q("1"));

    // Spelling is still kept
    assert_eq!(q("0.1").as_str(), "0.1");
}

#[test]
fn test_invalid_quantities() {
    for bad in ["", "abc", "1.2.3", "10Xi", "m", "1 Gi", "--1"] {
        let err = Quantity::parse(bad).unwrap_err();
        assert!(
            matches!(err, Error::InvalidQuantity { .. }),
            "{bad:?} gave {err}"
        );
    }

    assert!(q("-100m").is_negative());
    assert!(q("0").is_zero());
}

#[test]
fn test_quantity_serialization() {
    let spec = ResourceSpec::new()
        .with_request(ResourceName::Cpu, q("250m"))
        .with_limit(ResourceName::Memory, q("64Mi"));

    let json = serde_json::to_string(&spec).unwrap();
    assert!(json.contains("\"cpu\":\"250m\""));
    assert!(json.contains("\"memory\":\"64Mi\""));

    let back: ResourceSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
}

#[test]
fn test_allocation_record_from_json() {
    let json = r#"{
        "aggregate": {"limits": {"cpu": "1", "memory": "1Gi"}},
        "containers": {
            "app": {"requests": {"cpu": "500m"}},
            "sidecar": {}
        }
    }"#;

    let record: AllocationRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.aggregate.limit(ResourceName::Cpu), Some(&q("1000m")));
    assert_eq!(record.containers.len(), 2);
    assert!(record.containers["sidecar"].is_empty());
    assert!(record.containers["app"].specifies(ResourceName::Cpu));
    assert!(!record.containers["app"].specifies(ResourceName::Memory));
    assert!(!record.is_empty());
}

#[test]
fn test_events() {
    let workload = WorkloadId::new("pod-1").unwrap();

    let drift = AllocationEvent::Drift {
        workload: workload.clone(),
        container: Some("app".to_string()),
        file: "cpu.max".to_string(),
        expected: "10000 100000".to_string(),
        actual: Some("max 100000".to_string()),
        timestamp: SystemTime::now(),
    };
    assert!(drift.is_critical());
    assert_eq!(drift.workload(), &workload);

    let reclaimed = AllocationEvent::Reclaimed {
        workload: workload.clone(),
        timestamp: SystemTime::now(),
    };
    assert!(!reclaimed.is_critical());

    let json = serde_json::to_string(&drift).unwrap();
    assert!(json.contains("\"type\":\"drift\""));

    let back: AllocationEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back.workload(), &workload);
}

#[test]
fn test_error_display() {
    let err = Error::quantity("10Xi", "unknown suffix");
    assert!(err.to_string().contains("10Xi"));

    let err = Error::InvalidConfig {
        message: "bad".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid configuration: bad");
}
