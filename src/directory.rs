// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// A user as found in the directory.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DirectoryUser {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) usage_location: Option<String>,
}

/// Body of a user creation request.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewUser {
    pub(crate) account_enabled: bool,
    pub(crate) display_name: String,
    pub(crate) mail_nickname: String,
    pub(crate) user_principal_name: String,
    pub(crate) given_name: String,
    pub(crate) surname: String,
    pub(crate) department: String,
    pub(crate) usage_location: String,
    pub(crate) password_profile: PasswordProfile,
}

#[derive(Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PasswordProfile {
    pub(crate) force_change_password_next_sign_in: bool,
    pub(crate) password: String,
}

impl std::fmt::Debug for PasswordProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordProfile")
            .field(
                "force_change_password_next_sign_in",
                &self.force_change_password_next_sign_in,
            )
            .field("password", &"***")
            .finish()
    }
}

/// The remote operations the provisioning workflow relies on.
///
/// Implementations decide how "what-if" mode is honored: mutating calls must not reach the
/// directory while [`Directory::what_if`] is `true`.
pub(crate) trait Directory {
    fn what_if(&self) -> bool;

    fn find_user(&self, user_principal_name: &str)
        -> Result<Option<DirectoryUser>, ProvisionError>;

    /// Returns the new user's identifier, or `None` if the creation was only simulated.
    fn create_user(&self, user: &NewUser) -> Result<Option<String>, ProvisionError>;

    fn update_usage_location(
        &self,
        user_id: &str,
        usage_location: &str,
    ) -> Result<(), ProvisionError>;

    fn find_group_id(&self, display_name: &str) -> Result<Option<String>, ProvisionError>;

    fn add_group_member(&self, group_id: &str, user_id: &str) -> Result<(), ProvisionError>;

    /// Subscribed SKUs of the tenant, keyed by part number.
    fn subscribed_skus(&self) -> Result<BTreeMap<String, String>, ProvisionError>;

    fn assign_licenses(&self, user_id: &str, sku_ids: &[String]) -> Result<(), ProvisionError>;
}
