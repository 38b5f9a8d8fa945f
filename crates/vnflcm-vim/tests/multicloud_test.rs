// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the multi-cloud HTTP driver against a mock server.

use std::time::Duration;

use serde_json::json;
use vnflcm_vim::{
    BootSource, MultiCloudDriver, NicRef, VimDriver, VimError, VmParams, VolumeParams,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn driver(server: &MockServer) -> MultiCloudDriver {
    MultiCloudDriver::new(format!("{}/api/multicloud/v0/", server.uri()), Duration::from_secs(5))
        .expect("Failed to build driver")
}

#[tokio::test]
async fn test_list_tenants() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/multicloud/v0/vim-1/tenants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vimId": "vim-1",
            "tenants": [
                {"id": "t-1", "name": "admin"},
                {"id": "t-2", "name": "vnf"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tenants = driver(&server).list_tenants("vim-1").await.unwrap();

    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[1].name, "vnf");
    assert_eq!(tenants[1].id, "t-2");
}

#[tokio::test]
async fn test_create_volume_sends_camel_case_without_nulls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/multicloud/v0/vim-1/t-1/volumes"))
        .and(body_json(json!({"name": "data", "volumeSize": 40})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "vol-9",
            "name": "data",
            "returnCode": 1,
            "vimId": "vim-1",
            "status": "creating"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = VolumeParams {
        name: "data".to_string(),
        volume_size: 40,
        image_name: None,
        volume_type: None,
        availability_zone: None,
    };
    let res = driver(&server)
        .create_volume("vim-1", "t-1", &params)
        .await
        .unwrap();

    assert_eq!(res.id, "vol-9");
    assert_eq!(res.status, "creating");
    assert!(!res.is_preexisting());
}

#[tokio::test]
async fn test_create_vm_and_poll() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/multicloud/v0/vim-1/t-1/servers"))
        .and(body_json(json!({
            "name": "vm-a",
            "flavorId": "f-1",
            "boot": {"type": 1, "volumeId": "vol-1"},
            "nicArray": [{"portId": "p-1"}],
            "contextArray": [],
            "volumeArray": [{"volumeId": "vol-1"}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "vm-7", "name": "vm-a", "returnCode": 1})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/multicloud/v0/vim-1/t-1/servers/vm-7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "vm-7", "status": "ACTIVE"})),
        )
        .mount(&server)
        .await;

    let driver = driver(&server);
    let params = VmParams {
        name: "vm-a".to_string(),
        flavor_id: "f-1".to_string(),
        boot: BootSource::volume("vol-1"),
        nic_array: vec![NicRef {
            port_id: "p-1".to_string(),
        }],
        context_array: vec![],
        volume_array: vec![vnflcm_vim::VolumeRef {
            volume_id: "vol-1".to_string(),
        }],
        availability_zone: None,
    };

    let created = driver.create_vm("vim-1", "t-1", &params).await.unwrap();
    let fetched = driver.get_vm("vim-1", "t-1", &created.id).await.unwrap();

    assert_eq!(fetched.status, "ACTIVE");
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/multicloud/v0/vim-1/t-1/ports/p-404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("port not found"))
        .mount(&server)
        .await;

    let err = driver(&server)
        .delete_port("vim-1", "t-1", "p-404")
        .await
        .unwrap_err();

    match err {
        VimError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "port not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_list_images() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/multicloud/v0/vim-1/t-1/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"id": "img-1", "name": "ubuntu-22.04", "status": "active"}]
        })))
        .mount(&server)
        .await;

    let images = driver(&server).list_images("vim-1", "t-1").await.unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].name, "ubuntu-22.04");
}
