//! DirClient integration tests against an in-process directory.
//!
//! The directory here is a small state machine behind `RpcServer`: it stores
//! mappings, service records and configurations per UUID and enforces the
//! optimistic-concurrency version check on writes, which is all the client
//! needs to be exercised end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use dirbeat_client::{methods, DirClient, DirectoryService};
use dirbeat_common::protocol::{
    AddressMapping, AddressMappingSet, Configuration, DirError, DirRequest, DirResponse,
    KeyValuePair, Service, ServiceDataMap, ServiceId, ServiceType, SCHEME_PBRPC,
};
use dirbeat_common::transport::RpcServer;

#[derive(Default)]
struct DirState {
    mappings: HashMap<String, AddressMappingSet>,
    services: HashMap<String, Service>,
    configurations: HashMap<String, Configuration>,
}

fn uuid_param(params: &Value) -> Result<String, DirError> {
    params["uuid"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| DirError::Remote("missing uuid".to_string()))
}

fn handle(state: &Mutex<DirState>, request: DirRequest) -> Result<DirResponse, DirError> {
    let mut state = state.lock().unwrap();
    let result = match request.method.as_str() {
        methods::ADDRESS_MAPPINGS_GET => {
            let uuid = uuid_param(&request.params)?;
            let set = state.mappings.get(&uuid).cloned().unwrap_or_default();
            serde_json::to_value(set)?
        }
        methods::ADDRESS_MAPPINGS_SET => {
            let mut set: AddressMappingSet = serde_json::from_value(request.params)?;
            let uuid = set
                .mappings
                .first()
                .map(|m| m.uuid.as_str().to_owned())
                .ok_or_else(|| DirError::Remote("empty mapping set".to_string()))?;
            let current = state
                .mappings
                .get(&uuid)
                .and_then(|s| s.mappings.first())
                .map(|m| m.version)
                .unwrap_or(0);
            if set.mappings[0].version != current {
                return Err(DirError::Remote(format!(
                    "version mismatch: sent {}, current {}",
                    set.mappings[0].version, current
                )));
            }
            for mapping in &mut set.mappings {
                mapping.version = current + 1;
            }
            state.mappings.insert(uuid, set);
            Value::Null
        }
        methods::SERVICE_GET_BY_UUID => {
            let uuid = uuid_param(&request.params)?;
            let services: Vec<Service> = state.services.get(&uuid).cloned().into_iter().collect();
            serde_json::json!({ "services": services })
        }
        methods::SERVICE_REGISTER => {
            let mut service: Service = serde_json::from_value(request.params)?;
            let current = state
                .services
                .get(service.uuid.as_str())
                .map(|s| s.version)
                .unwrap_or(0);
            if service.version != current {
                return Err(DirError::Remote(format!(
                    "version mismatch: sent {}, current {}",
                    service.version, current
                )));
            }
            service.version = current + 1;
            let version = service.version;
            state
                .services
                .insert(service.uuid.as_str().to_owned(), service);
            serde_json::json!({ "version": version })
        }
        methods::SERVICE_DEREGISTER => {
            let uuid = uuid_param(&request.params)?;
            state.services.remove(&uuid);
            Value::Null
        }
        methods::CONFIGURATION_GET => {
            let uuid = uuid_param(&request.params)?;
            let config = state
                .configurations
                .get(&uuid)
                .cloned()
                .unwrap_or(Configuration {
                    uuid: ServiceId::new(uuid),
                    version: 0,
                    parameters: Vec::new(),
                });
            serde_json::to_value(config)?
        }
        methods::CONFIGURATION_SET => {
            let config: Configuration = serde_json::from_value(request.params)?;
            let current = state
                .configurations
                .get(config.uuid.as_str())
                .map(|c| c.version)
                .unwrap_or(0);
            if config.version != current {
                return Err(DirError::Remote(format!(
                    "version mismatch: sent {}, current {}",
                    config.version, current
                )));
            }
            let mut stored = config;
            stored.version = current + 1;
            state
                .configurations
                .insert(stored.uuid.as_str().to_owned(), stored);
            Value::Null
        }
        other => return Err(DirError::Remote(format!("unknown operation: {}", other))),
    };

    Ok(DirResponse::success(request.id, result))
}

async fn start_dir() -> (String, Arc<Mutex<DirState>>) {
    let state = Arc::new(Mutex::new(DirState::default()));
    let server = RpcServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let handler_state = state.clone();
    tokio::spawn(async move {
        let _ = server
            .run_with_handler(move |req| {
                let state = handler_state.clone();
                async move { handle(&state, req) }
            })
            .await;
    });

    (addr, state)
}

#[tokio::test]
async fn test_mappings_roundtrip() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("osd-1");

    let empty = client.address_mappings_get(&uuid).await.unwrap();
    assert!(empty.mappings.is_empty());

    let set = AddressMappingSet {
        mappings: vec![AddressMapping::new(
            uuid.clone(),
            SCHEME_PBRPC,
            "10.0.0.5",
            32636,
        )],
    };
    client.address_mappings_set(&set).await.unwrap();

    let stored = client.address_mappings_get(&uuid).await.unwrap();
    assert_eq!(stored.mappings.len(), 1);
    assert_eq!(stored.mappings[0].uri, "pbrpc://10.0.0.5:32636");
    assert_eq!(stored.mappings[0].version, 1);
}

#[tokio::test]
async fn test_service_register_returns_new_version() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("osd-2");

    let mut service = Service::new(uuid.clone(), ServiceType::Osd, "osd two");
    let v1 = client.service_register(&service).await.unwrap();
    assert_eq!(v1, 1);

    // Echoing the fetched version makes the next write valid.
    let fetched = client.service_get_by_uuid(&uuid).await.unwrap();
    service.version = fetched.services[0].version;
    let v2 = client.service_register(&service).await.unwrap();
    assert_eq!(v2, 2);
}

#[tokio::test]
async fn test_stale_register_is_rejected() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("osd-3");

    let service = Service::new(uuid, ServiceType::Osd, "osd three");
    client.service_register(&service).await.unwrap();

    // Same version again is now stale.
    let result = client.service_register(&service).await;
    match result {
        Err(DirError::Remote(msg)) => assert!(msg.contains("version mismatch")),
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deregister_removes_record() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("mrc-1");

    let service = Service::new(uuid.clone(), ServiceType::Mrc, "mrc one");
    client.service_register(&service).await.unwrap();
    client.service_deregister(&uuid).await.unwrap();

    let fetched = client.service_get_by_uuid(&uuid).await.unwrap();
    assert!(fetched.services.is_empty());
}

#[tokio::test]
async fn test_configuration_roundtrip() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("osd-4");

    let initial = client.configuration_get(&uuid).await.unwrap();
    assert_eq!(initial.version, 0);

    let config = Configuration {
        uuid: uuid.clone(),
        version: initial.version,
        parameters: vec![KeyValuePair::new("listen.port", "32636")],
    };
    client.configuration_set(&config).await.unwrap();

    let stored = client.configuration_get(&uuid).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.parameters, config.parameters);
}

#[tokio::test]
async fn test_unknown_operation_surfaces_as_remote_error() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);

    // Issue an operation the directory does not implement, via the raw
    // transport so the method name is not constrained by the typed surface.
    use dirbeat_common::protocol::{DirRequest, UserCredentials};
    use dirbeat_common::transport::DirTransport;

    let transport = DirTransport::new();
    let mut stream = transport.connect(client.addr()).await.unwrap();
    let request = DirRequest::new(
        "service_flush",
        serde_json::json!({}),
        UserCredentials::heartbeat(),
    );
    let response = transport.send_request(&mut stream, &request).await.unwrap();
    assert!(!response.success);
    assert!(response.error.unwrap().contains("unknown operation"));
}

#[tokio::test]
async fn test_concurrent_calls_succeed() {
    let (addr, _state) = start_dir().await;
    let client = Arc::new(DirClient::new(addr));
    let uuid = ServiceId::from("osd-6");

    let calls = (0..8).map(|_| {
        let client = client.clone();
        let uuid = uuid.clone();
        async move { client.configuration_get(&uuid).await }
    });
    let results = futures::future::join_all(calls).await;

    for result in results {
        assert_eq!(result.unwrap().version, 0);
    }
}

#[tokio::test]
async fn test_calls_share_pooled_connections() {
    let (addr, _state) = start_dir().await;
    let client = DirClient::new(addr);
    let uuid = ServiceId::from("osd-5");

    let mut service = Service::new(uuid.clone(), ServiceType::Osd, "osd five");
    service.data = ServiceDataMap::from_iter([("free_bytes".to_owned(), "1000".to_owned())]);

    for _ in 0..5 {
        let fetched = client.service_get_by_uuid(&uuid).await.unwrap();
        service.version = fetched.first().map(|s| s.version).unwrap_or(0);
        client.service_register(&service).await.unwrap();
    }

    let fetched = client.service_get_by_uuid(&uuid).await.unwrap();
    assert_eq!(fetched.services[0].version, 5);
}
