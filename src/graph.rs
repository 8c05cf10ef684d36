// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::collections::BTreeMap;

use log::{debug, info, trace};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::{Builder, Runtime};
use urlencoding::encode;

use crate::config::Config;
use crate::directory::{Directory, DirectoryUser, NewUser};
use crate::error::ProvisionError;

/// Outcome of a mutating Graph call.
#[derive(Debug)]
pub(crate) enum GraphResponse {
    Sent(Value),
    Simulated,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ODataList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Deserialize)]
struct GroupReference {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribedSku {
    sku_id: Option<String>,
    sku_part_number: Option<String>,
}

pub(crate) struct GraphClient {
    base_url: String,
    token: String,
    what_if: bool,
    client: Client,
    rt: Runtime,
}

impl GraphClient {
    /// Acquires an access token with the client credentials and keeps it for the whole run.
    pub(crate) fn connect(config: &Config, what_if: bool) -> Result<GraphClient, ProvisionError> {
        debug!("Connecting to Microsoft Graph at: {}", config.graph.base_url);

        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ProvisionError::Runtime)?;
        let client = Client::new();
        let token = rt.block_on(acquire_token(&client, config))?;

        Ok(GraphClient {
            base_url: config.graph.base_url.clone(),
            token,
            what_if,
            client,
            rt,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ProvisionError> {
        let url = self.url(path);
        trace!("GET {url} {query:?}");

        let request = self
            .client
            .get(url.as_str())
            .bearer_auth(&self.token)
            .query(query);
        let response = self.rt.block_on(request.send())?;

        self.read_json(Method::GET, url, response)
    }

    pub(crate) fn post(&self, path: &str, body: &Value) -> Result<GraphResponse, ProvisionError> {
        self.send(Method::POST, path, body)
    }

    pub(crate) fn patch(&self, path: &str, body: &Value) -> Result<GraphResponse, ProvisionError> {
        self.send(Method::PATCH, path, body)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<GraphResponse, ProvisionError> {
        let url = self.url(path);

        if self.what_if {
            info!("What-if: would {method} {url}");
            return Ok(GraphResponse::Simulated);
        }

        trace!("{method} {url}");

        let request = self
            .client
            .request(method.clone(), url.as_str())
            .bearer_auth(&self.token)
            .json(body);
        let response = self.rt.block_on(request.send())?;

        self.read_json(method, url, response).map(GraphResponse::Sent)
    }

    fn read_json(
        &self,
        method: Method,
        url: String,
        response: Response,
    ) -> Result<Value, ProvisionError> {
        let status = response.status();
        let body = self.rt.block_on(response.text())?;

        if status.is_client_error() || status.is_server_error() {
            return Err(ProvisionError::Http {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| ProvisionError::UnexpectedResponse {
            url,
            reason: e.to_string(),
        })
    }

    fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ProvisionError> {
        let url = self.url(path);
        let list: ODataList<T> = serde_json::from_value(self.get(path, query)?).map_err(|e| {
            ProvisionError::UnexpectedResponse {
                url,
                reason: e.to_string(),
            }
        })?;

        Ok(list.value)
    }
}

impl Directory for GraphClient {
    fn what_if(&self) -> bool {
        self.what_if
    }

    fn find_user(
        &self,
        user_principal_name: &str,
    ) -> Result<Option<DirectoryUser>, ProvisionError> {
        let filter = format!(
            "userPrincipalName eq '{}'",
            odata_literal(user_principal_name)
        );
        let users: Vec<DirectoryUser> = self.get_list(
            "/users",
            &[("$filter", filter.as_str()), ("$select", "id,usageLocation")],
        )?;

        Ok(users.into_iter().next())
    }

    fn create_user(&self, user: &NewUser) -> Result<Option<String>, ProvisionError> {
        match self.post("/users", &serde_json::to_value(user)?)? {
            GraphResponse::Simulated => Ok(None),
            GraphResponse::Sent(created) => match created.get("id").and_then(Value::as_str) {
                Some(id) => Ok(Some(id.to_string())),
                None => Err(ProvisionError::UnexpectedResponse {
                    url: self.url("/users"),
                    reason: "user creation response carried no id".to_string(),
                }),
            },
        }
    }

    fn update_usage_location(
        &self,
        user_id: &str,
        usage_location: &str,
    ) -> Result<(), ProvisionError> {
        self.patch(
            &format!("/users/{}", encode(user_id)),
            &json!({ "usageLocation": usage_location }),
        )?;
        Ok(())
    }

    fn find_group_id(&self, display_name: &str) -> Result<Option<String>, ProvisionError> {
        let filter = format!("displayName eq '{}'", odata_literal(display_name));
        let groups: Vec<GroupReference> = self.get_list(
            "/groups",
            &[("$filter", filter.as_str()), ("$select", "id")],
        )?;

        Ok(groups.into_iter().next().map(|group| group.id))
    }

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), ProvisionError> {
        let member = format!("{}/directoryObjects/{}", self.base_url, user_id);
        self.post(
            &format!("/groups/{}/members/$ref", encode(group_id)),
            &json!({ "@odata.id": member }),
        )?;
        Ok(())
    }

    fn subscribed_skus(&self) -> Result<BTreeMap<String, String>, ProvisionError> {
        let skus: Vec<SubscribedSku> = self.get_list("/subscribedSkus", &[])?;

        Ok(skus
            .into_iter()
            .filter_map(|sku| Some((sku.sku_part_number?, sku.sku_id?)))
            .collect())
    }

    fn assign_licenses(&self, user_id: &str, sku_ids: &[String]) -> Result<(), ProvisionError> {
        let add_licenses: Vec<Value> = sku_ids
            .iter()
            .map(|sku_id| json!({ "skuId": sku_id }))
            .collect();

        self.post(
            &format!("/users/{}/assignLicense", encode(user_id)),
            &json!({ "addLicenses": add_licenses, "removeLicenses": [] }),
        )?;
        Ok(())
    }
}

async fn acquire_token(client: &Client, config: &Config) -> Result<String, ProvisionError> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        config.graph.authority_host,
        encode(&config.credentials.tenant_id)
    );
    debug!("Requesting access token from: {url}");

    let params = [
        ("client_id", config.credentials.client_id.as_str()),
        ("client_secret", config.credentials.client_secret.as_str()),
        ("grant_type", "client_credentials"),
        ("scope", config.graph.scope.as_str()),
    ];

    let response = client.post(url.as_str()).form(&params).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProvisionError::Token(format!("{} {}", status.as_u16(), body)));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ProvisionError::Token(format!("unexpected token response: {e}")))?;

    Ok(token.access_token)
}

/// Escapes a value for use inside a single-quoted OData string literal.
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
