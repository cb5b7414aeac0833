//! Earth Engine asset API client.

use reqwest::{Client, RequestBuilder, Response};

use crate::asset_path::{split_asset_name, LEGACY_PROJECT};
use crate::auth::Authenticator;
use crate::error::{MigrateError, Result};
use crate::models::{
    Acl, ApiErrorResponse, Asset, AssetType, CopyAssetRequest, ListAssetsResponse, Quota,
    SetIamPolicyRequest,
};

/// Base URL for the Earth Engine REST API v1.
pub const DEFAULT_API_BASE: &str = "https://earthengine.googleapis.com/v1";

/// Remote asset operations the migration routines need.
///
/// Every call runs under the credential the implementor was built with, so a
/// value of this trait is one authenticated session.
#[allow(async_fn_in_trait)]
pub trait AssetService {
    /// Fetch metadata of a single asset.
    async fn get_asset(&self, name: &str) -> Result<Asset>;

    /// List the direct children of `parent`.
    async fn list_assets(&self, parent: &str) -> Result<Vec<Asset>>;

    /// Create an empty container at `name`.
    async fn create_asset(&self, name: &str, asset_type: AssetType) -> Result<()>;

    /// Copy a leaf asset to a new name.
    ///
    /// # Arguments
    /// * `source` - Absolute name of the asset to copy
    /// * `destination` - Absolute name of the copy; its parent must exist
    /// * `overwrite` - Replace an asset already at `destination` instead of
    ///   failing
    async fn copy_asset(&self, source: &str, destination: &str, overwrite: bool) -> Result<()>;

    /// Delete a single asset. Containers must be empty.
    ///
    /// # Arguments
    /// * `name` - Absolute name of the asset to delete
    async fn delete_asset(&self, name: &str) -> Result<()>;

    /// Replace the ACL of `name`.
    async fn set_asset_acl(&self, name: &str, acl: &Acl) -> Result<()>;

    /// Roots the session's account can write to.
    async fn get_asset_roots(&self) -> Result<Vec<Asset>>;

    /// Quota of an asset root. Fails unless the caller owns the root.
    async fn get_asset_root_quota(&self, root: &str) -> Result<Quota>;
}

/// HTTP client for the Earth Engine asset endpoints.
pub struct EarthEngineClient {
    base_url: String,
    auth: Authenticator,
    http: Client,
}

impl EarthEngineClient {
    /// Create a client against a custom endpoint.
    pub fn with_base_url(auth: Authenticator, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.get_access_token().await?;
        let response = request.bearer_auth(&token).send().await?;
        check_status(response).await
    }
}

/// Turn a non-success response into an API error.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(MigrateError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(MigrateError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

impl AssetService for EarthEngineClient {
    async fn get_asset(&self, name: &str) -> Result<Asset> {
        let response = self.send(self.http.get(self.url(name))).await?;
        Ok(response.json().await?)
    }

    async fn list_assets(&self, parent: &str) -> Result<Vec<Asset>> {
        let url = self.url(&format!("{}:listAssets", parent.trim_end_matches('/')));
        let mut all_assets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListAssetsResponse = self.send(request).await?.json().await?;
            all_assets.extend(page.assets);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all_assets)
    }

    async fn create_asset(&self, name: &str, asset_type: AssetType) -> Result<()> {
        let (project, asset_id) = split_asset_name(name)?;
        let request = self
            .http
            .post(self.url(&format!("{}/assets", project)))
            .query(&[("assetId", asset_id)])
            .json(&serde_json::json!({ "type": asset_type }));

        self.send(request).await?;
        Ok(())
    }

    async fn copy_asset(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        let request = self
            .http
            .post(self.url(&format!("{}:copy", source)))
            .json(&CopyAssetRequest {
                destination_name: destination,
                overwrite,
            });

        self.send(request).await?;
        Ok(())
    }

    async fn delete_asset(&self, name: &str) -> Result<()> {
        self.send(self.http.delete(self.url(name))).await?;
        Ok(())
    }

    async fn set_asset_acl(&self, name: &str, acl: &Acl) -> Result<()> {
        let policy = acl.to_policy();
        let request = self
            .http
            .post(self.url(&format!("{}:setIamPolicy", name)))
            .json(&SetIamPolicyRequest { policy: &policy });

        self.send(request).await?;
        Ok(())
    }

    async fn get_asset_roots(&self) -> Result<Vec<Asset>> {
        self.list_assets(LEGACY_PROJECT).await
    }

    async fn get_asset_root_quota(&self, root: &str) -> Result<Quota> {
        self.get_asset(root)
            .await?
            .quota
            .ok_or_else(|| MigrateError::NotARoot(root.to_string()))
    }
}
