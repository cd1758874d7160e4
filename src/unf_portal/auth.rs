use super::model::Location;
use super::BASE_URL;
use lazy_static::lazy_static;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

const LOGIN_URL: &str = "https://frivillig.unf.dk/login/?next=/events/kbh/";
const LOGIN_NEXT_PATH: &str = "/events/kbh/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) vagtkalender";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 5;

/// Any of these, case-insensitive, marks a page as rendered for a logged-in
/// user.
const LOGOUT_MARKERS: [&str; 3] = ["log ud", "logout", "/logout"];

lazy_static! {
    static ref CSRF_INPUT: Selector =
        Selector::parse(r#"input[name="csrfmiddlewaretoken"]"#).unwrap();
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("CSRF token not found on the login page")]
    CsrfNotFound,
    #[error("login failed, no logout marker on the listing page; check the credentials")]
    LoginRejected,
    #[error(transparent)]
    Request(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Cookie-holding portal session. Cloning shares the authenticated cookie
/// snapshot, which is how each crawl worker gets its own handle.
#[derive(Clone)]
pub struct PortalSession {
    client: ClientWithMiddleware,
    cookies: Arc<Jar>,
}

impl PortalSession {
    pub fn new() -> Result<Self, PortalError> {
        let cookies = Arc::new(Jar::default());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en,da;q=0.9"));

        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(MAX_RETRIES),
            ))
            .build();

        Ok(Self { client, cookies })
    }

    /// Django login handshake: fetch the CSRF token, post the credential
    /// form, then verify the session actually sticks.
    #[instrument(skip(self, username, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(), PortalError> {
        let token = self.fetch_csrf_token().await?;
        debug!("Got CSRF token");

        let form = [
            ("username", username),
            ("password", password),
            ("csrfmiddlewaretoken", token.as_str()),
            ("next", LOGIN_NEXT_PATH),
        ];
        self.client
            .post(LOGIN_URL)
            .header(REFERER, LOGIN_URL)
            .header(ORIGIN, BASE_URL)
            .form(&form)
            .send()
            .await?;

        self.verify_logged_in().await
    }

    /// One page fetch with the session's cookies; the caller decides what a
    /// non-success status means.
    pub async fn get(&self, url: &str) -> Result<(StatusCode, String), PortalError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn fetch_csrf_token(&self) -> Result<String, PortalError> {
        let body = self
            .client
            .get(LOGIN_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let field_token = Html::parse_document(&body)
            .select(&CSRF_INPUT)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::to_string);

        field_token
            .or_else(|| self.cookie_value("csrftoken"))
            .ok_or(PortalError::CsrfNotFound)
    }

    async fn verify_logged_in(&self) -> Result<(), PortalError> {
        let check_url = format!("{}{}", BASE_URL, Location::Kbh.listing_path());
        let (status, body) = self.get(&check_url).await?;
        let lowered = body.to_lowercase();

        if status == StatusCode::OK
            && LOGOUT_MARKERS.iter().any(|marker| lowered.contains(marker))
        {
            info!("Login verified");
            Ok(())
        } else {
            Err(PortalError::LoginRejected)
        }
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        let base = Url::parse(BASE_URL).ok()?;
        let header = self.cookies.cookies(&base)?;
        let prefix = format!("{name}=");
        header
            .to_str()
            .ok()?
            .split("; ")
            .find_map(|pair| pair.strip_prefix(&prefix).map(str::to_string))
    }
}
