// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use rand::random;
use serde_json::{json, Value};
use std::env::temp_dir;
use std::fs::{create_dir_all, read_to_string, File};
use std::io::Write;
use std::path::PathBuf;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, path_regex, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT_ID: &str = "contoso-tenant";
pub const ACCESS_TOKEN: &str = "mock-access-token";

/// Starts a mock Graph server that also serves the client-credentials token endpoint.
pub async fn graph_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": ACCESS_TOKEN
        })))
        .mount(&server)
        .await;

    server
}

/// Starts a mock server whose token endpoint rejects the client credentials.
pub async fn graph_server_rejecting_credentials() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Invalid client secret provided"
        })))
        .mount(&server)
        .await;

    server
}

pub fn graph_base_url(server: &MockServer) -> String {
    format!("{}/v1.0", server.uri())
}

/// Answers the lookup of `upn`, either with no match or with the given user id.
pub async fn mount_user_lookup(server: &MockServer, upn: &str, existing_id: Option<&str>) {
    let users: Vec<Value> = existing_id
        .map(|id| json!({ "id": id, "usageLocation": "US" }))
        .into_iter()
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .and(query_param("$filter", format!("userPrincipalName eq '{upn}'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": users })))
        .mount(server)
        .await;
}

pub async fn mount_group_lookup(server: &MockServer, display_name: &str, group_id: &str) {
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param(
            "$filter",
            format!("displayName eq '{display_name}'"),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": [{ "id": group_id }] })),
        )
        .mount(server)
        .await;
}

/// Answers the lookup of `display_name` with an empty result.
pub async fn mount_missing_group(server: &MockServer, display_name: &str) {
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param(
            "$filter",
            format!("displayName eq '{display_name}'"),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(server)
        .await;
}

pub async fn mount_subscribed_skus(server: &MockServer, skus: &[(&str, &str)]) {
    let value: Vec<Value> = skus
        .iter()
        .map(|(part_number, sku_id)| json!({ "skuPartNumber": part_number, "skuId": sku_id }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1.0/subscribedSkus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": value })))
        .mount(server)
        .await;
}

/// Accepts the creation of `upn`, expecting it to be requested `expected_calls` times.
pub async fn mount_user_creation(server: &MockServer, upn: &str, user_id: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1.0/users"))
        .and(body_partial_json(json!({
            "userPrincipalName": upn,
            "passwordProfile": { "forceChangePasswordNextSignIn": true }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": user_id,
            "userPrincipalName": upn
        })))
        .expect(expected_calls)
        .named(format!("create {upn}"))
        .mount(server)
        .await;
}

pub async fn mount_failing_user_creation(server: &MockServer, upn: &str) {
    Mock::given(method("POST"))
        .and(path("/v1.0/users"))
        .and(body_partial_json(json!({ "userPrincipalName": upn })))
        .respond_with(ResponseTemplate::new(400).set_body_string("Another object with the same value for property proxyAddresses already exists."))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_group_membership(server: &MockServer, group_id: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/v1.0/groups/{group_id}/members/$ref")))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected_calls)
        .named(format!("add member to {group_id}"))
        .mount(server)
        .await;
}

pub async fn mount_license_assignment(server: &MockServer, user_id: &str, sku_ids: &[&str], expected_calls: u64) {
    let add_licenses: Vec<Value> = sku_ids.iter().map(|sku_id| json!({ "skuId": sku_id })).collect();

    Mock::given(method("POST"))
        .and(path(format!("/v1.0/users/{user_id}/assignLicense")))
        .and(body_partial_json(json!({ "addLicenses": add_licenses, "removeLicenses": [] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user_id })))
        .expect(expected_calls)
        .named(format!("assign licenses to {user_id}"))
        .mount(server)
        .await;
}

/// Fails the test if any mutating request reaches the directory.
pub async fn forbid_mutations(server: &MockServer) {
    for verb in ["PATCH", "DELETE"] {
        Mock::given(method(verb))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(server)
            .await;
    }

    for directory_path in ["/v1.0/users", "/v1.0/groups"] {
        Mock::given(method("POST"))
            .and(path_regex(format!("^{directory_path}")))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .named(format!("POST below {directory_path}"))
            .mount(server)
            .await;
    }
}

pub fn write_string_to_tempfile(content: &str) -> String {
    let mut dir = temp_dir();
    let filename = format!("temp_file_{suffix}", suffix = random::<u64>());

    dir.push(filename);

    let mut file = File::create(dir.clone()).expect("Failed to create tmp file");

    file.write_all(content.as_bytes())
        .expect("Failed to write into tmp file");

    dir.to_string_lossy().to_string()
}

/// Creates a fresh directory holding a `.env` file with the given content.
pub fn write_dotenv_dir(content: &str) -> PathBuf {
    let mut dir = temp_dir();
    dir.push(format!("provisioner_env_{suffix}", suffix = random::<u64>()));

    create_dir_all(&dir).expect("Failed to create tmp directory");

    let mut file = File::create(dir.join(".env")).expect("Failed to create .env file");
    file.write_all(content.as_bytes())
        .expect("Failed to write into .env file");

    dir
}

/// Fresh report locations inside a not yet existing directory.
pub fn temp_report_paths() -> (PathBuf, PathBuf) {
    let mut dir = temp_dir();
    dir.push(format!("provisioner_{suffix}", suffix = random::<u64>()));

    (dir.join("report.csv"), dir.join("report.json"))
}

pub fn read_json_report(json_path: &PathBuf) -> Value {
    let content = read_to_string(json_path).expect("Failed to read JSON report");
    serde_json::from_str(&content).expect("Failed to parse JSON report")
}
