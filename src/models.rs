//! Data models for Earth Engine API requests and responses.

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Kind of an Earth Engine asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Folder,
    ImageCollection,
    Image,
    Table,
    Classifier,
    FeatureView,
    #[serde(other)]
    Unknown,
}

impl AssetType {
    /// Folders and image collections may hold children; everything else is a leaf.
    pub fn is_container(self) -> bool {
        matches!(self, AssetType::Folder | AssetType::ImageCollection)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Folder => "FOLDER",
            AssetType::ImageCollection => "IMAGE_COLLECTION",
            AssetType::Image => "IMAGE",
            AssetType::Table => "TABLE",
            AssetType::Classifier => "CLASSIFIER",
            AssetType::FeatureView => "FEATURE_VIEW",
            AssetType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for an asset as returned by `get` and `listAssets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub quota: Option<Quota>,
}

/// The API encodes int64 fields as JSON strings.
fn deserialize_int64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Text(String),
        Number(u64),
    }

    match Option::<Int64>::deserialize(deserializer)? {
        Some(Int64::Text(s)) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        Some(Int64::Number(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}

/// Storage quota of an asset root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub max_size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub asset_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_int64")]
    pub max_assets: Option<u64>,
}

/// Response from the listAssets endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAssetsResponse {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a copy request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyAssetRequest<'a> {
    pub destination_name: &'a str,
    pub overwrite: bool,
}

/// Reader/writer/public-read permissions applied to an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    pub readers: Vec<String>,
    pub writers: Vec<String>,
    pub all_users_can_read: bool,
}

const PRINCIPAL_PREFIXES: [&str; 4] = ["user:", "group:", "serviceAccount:", "domain:"];

impl Acl {
    /// Build an ACL, rejecting principals without a recognised prefix.
    pub fn new(readers: Vec<String>, writers: Vec<String>, all_users_can_read: bool) -> Result<Self> {
        for principal in readers.iter().chain(writers.iter()) {
            let valid = PRINCIPAL_PREFIXES
                .iter()
                .any(|prefix| principal.len() > prefix.len() && principal.starts_with(prefix));
            if !valid {
                return Err(MigrateError::InvalidPrincipal(principal.clone()));
            }
        }

        Ok(Self {
            readers,
            writers,
            all_users_can_read,
        })
    }

    /// Convert to the IAM policy the REST API expects.
    pub fn to_policy(&self) -> IamPolicy {
        let mut bindings = Vec::new();

        if !self.writers.is_empty() {
            bindings.push(Binding {
                role: "roles/editor".to_string(),
                members: self.writers.clone(),
            });
        }

        let mut readers = self.readers.clone();
        if self.all_users_can_read {
            readers.push("allUsers".to_string());
        }
        if !readers.is_empty() {
            bindings.push(Binding {
                role: "roles/viewer".to_string(),
                members: readers,
            });
        }

        IamPolicy { bindings }
    }
}

/// IAM policy attached to an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
}

/// Body of a setIamPolicy request.
#[derive(Debug, Serialize)]
pub struct SetIamPolicyRequest<'a> {
    pub policy: &'a IamPolicy,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account key from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
