// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::env;
use std::fmt;

use log::debug;

use crate::error::ProvisionError;

const TENANT_ID: &str = "TENANT_ID";
const CLIENT_ID: &str = "CLIENT_ID";
const CLIENT_SECRET: &str = "CLIENT_SECRET";
const DEFAULT_USAGE_LOCATION: &str = "DEFAULT_USAGE_LOCATION";
const DEFAULT_DOMAIN: &str = "DEFAULT_DOMAIN";
const GRAPH_BASE_URL: &str = "GRAPH_BASE_URL";
const AUTHORITY_HOST: &str = "AUTHORITY_HOST";
const GRAPH_SCOPE: &str = "GRAPH_SCOPE";

#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) credentials: Credentials,
    pub(crate) defaults: DefaultsConfig,
    pub(crate) graph: GraphConfig,
}

#[derive(Clone)]
pub(crate) struct Credentials {
    pub(crate) tenant_id: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DefaultsConfig {
    pub(crate) usage_location: String,
    pub(crate) domain: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            usage_location: String::from("US"),
            domain: String::from("example.corp"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GraphConfig {
    pub(crate) base_url: String,
    pub(crate) authority_host: String,
    pub(crate) scope: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            base_url: String::from("https://graph.microsoft.com/v1.0"),
            authority_host: String::from("https://login.microsoftonline.com"),
            scope: String::from("https://graph.microsoft.com/.default"),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("credentials", &self.credentials)
            .field("defaults", &self.defaults)
            .field("graph", &self.graph)
            .finish()
    }
}

impl Config {
    /// Reads the configuration from the process environment. `main` has already merged a
    /// `.env` file from the working directory into it.
    pub(crate) fn from_env() -> Result<Config, ProvisionError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Config, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| value(key).ok_or(ProvisionError::MissingEnvironment(key));

        let credentials = Credentials {
            tenant_id: required(TENANT_ID)?,
            client_id: required(CLIENT_ID)?,
            client_secret: required(CLIENT_SECRET)?,
        };

        let defaults = DefaultsConfig::default();
        let graph = GraphConfig::default();

        let config = Config {
            credentials,
            defaults: DefaultsConfig {
                usage_location: value(DEFAULT_USAGE_LOCATION).unwrap_or(defaults.usage_location),
                domain: value(DEFAULT_DOMAIN).unwrap_or(defaults.domain),
            },
            graph: GraphConfig {
                base_url: value(GRAPH_BASE_URL)
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(graph.base_url),
                authority_host: value(AUTHORITY_HOST)
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(graph.authority_host),
                scope: value(GRAPH_SCOPE).unwrap_or(graph.scope),
            },
        };

        debug!("Using configuration: {:?}", config);

        Ok(config)
    }
}
