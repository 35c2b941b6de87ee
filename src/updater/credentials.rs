//! Session cookie negotiation for regions that gate their CDN behind signed cookies.

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, COOKIE, SET_COOKIE, USER_AGENT,
};
use reqwest::Method;
use tracing::{info, warn};

use super::profile::ServerProfile;
use super::transport::AssetTransport;

const DEVICE_USER_AGENT: &str = "ProductName/134 CFNetwork/1408.0.4 Darwin/22.5.0";
const DEVICE_ACCEPT_LANGUAGE: &str = "zh-CN,zh-Hans;q=0.9";

/// Fixed header set that mimics the mobile client.
fn device_headers(unity_version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(USER_AGENT, HeaderValue::from_static(DEVICE_USER_AGENT));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEVICE_ACCEPT_LANGUAGE),
    );
    if let Ok(value) = HeaderValue::from_str(unity_version) {
        headers.insert("X-Unity-Version", value);
    }
    headers
}

/// Requests go through the run's transport, so they take the same proxy route as downloads.
pub struct CredentialNegotiator<'a> {
    transport: &'a dyn AssetTransport,
    profile: &'a ServerProfile,
}

impl<'a> CredentialNegotiator<'a> {
    pub fn new(transport: &'a dyn AssetTransport, profile: &'a ServerProfile) -> Self {
        Self { transport, profile }
    }

    /// Build the run's header template, adding a session cookie when the profile requires one.
    ///
    /// Failing to obtain the cookie is not fatal: the template is returned without it.
    pub async fn negotiate(&self) -> HeaderMap {
        let mut headers = self.profile.headers.clone();
        if !self.profile.required_cookies {
            return headers;
        }

        let url = &self.profile.cookie_signature_url;
        let result = self
            .transport
            .send(
                Method::POST,
                url,
                &device_headers(&self.profile.unity_version),
            )
            .await;

        match result {
            Ok(response) if response.status == 200 => {
                match response.headers.get(SET_COOKIE) {
                    Some(cookie) => {
                        headers.insert(COOKIE, cookie.clone());
                        info!("{} server session cookie acquired", self.profile.region);
                    }
                    None => warn!(
                        "{} server cookie endpoint returned no Set-Cookie header",
                        self.profile.region
                    ),
                }
            }
            Ok(response) => warn!(
                "{} server cookie endpoint returned status {}",
                self.profile.region, response.status
            ),
            Err(e) => warn!(
                "{} server failed to request session cookie: {}",
                self.profile.region, e
            ),
        }

        headers
    }
}
