//! Portal login.
//!
//! The portal embeds a 720-character form state in an inline script of its
//! landing page. Posting that state back together with the card number and
//! password to the form engine logs the session in; the session cookies end
//! up in the fetcher's cookie jar and travel with every later request.

use std::fmt;

use tracing::{info, instrument};

use super::ArchiveError;
use crate::config::CredentialsConfig;
use crate::fetch::{Fetcher, HttpMethod};
use crate::html::HtmlPage;

/// Script carrying the login form state.
pub const LOGIN_SCRIPT_SELECTOR: &str = "div#outer div#layer_overlay + script + script";

/// Length of the form state token.
pub const LOGIN_STATE_LEN: usize = 720;

/// Library card credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Complete credentials from the config section, if both parts are set.
    #[must_use]
    pub fn from_config(config: &CredentialsConfig) -> Option<Self> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(Self::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }

    /// Card number.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Pulls the form state token out of the login script text.
#[must_use]
pub fn extract_login_state(script: &str) -> Option<&str> {
    script
        .split('"')
        .find(|token| token.chars().count() == LOGIN_STATE_LEN)
}

fn login_state(landing_page: &str) -> Result<Option<String>, crate::html::LookupError> {
    let page = HtmlPage::parse(landing_page);
    let script = page.select_text(LOGIN_SCRIPT_SELECTOR)?;
    Ok(extract_login_state(&script).map(str::to_string))
}

/// Logs the fetcher's session in.
///
/// # Errors
///
/// Returns [`ArchiveError::Lookup`] when the landing page has no login script,
/// [`ArchiveError::MissingToken`] when the script has no form state and
/// [`ArchiveError::Fetch`] for request failures.
#[instrument(skip(fetcher, credentials), fields(user = %credentials.username()))]
pub async fn login(
    fetcher: &Fetcher,
    base_url: &str,
    credentials: &Credentials,
) -> Result<(), ArchiveError> {
    let landing_url = format!("{base_url}/");
    let landing = fetcher
        .fetch_text(&landing_url, HttpMethod::Get, &[])
        .await?;

    let state = login_state(&landing)
        .map_err(|error| ArchiveError::Lookup {
            url: landing_url.clone(),
            selector: error.selector().to_string(),
            snapshot: None,
        })?
        .ok_or(ArchiveError::MissingToken {
            url: landing_url,
            what: "login form state",
        })?;

    let action_url = format!("{base_url}/formEngine/doAction");
    let params = [
        ("bibLoginLayer.number", credentials.username.as_str()),
        ("bibLoginLayer.password", credentials.password.as_str()),
        ("bibLoginLayer.terms_cb", "1"),
        ("bibLoginLayer.terms", "1"),
        ("bibLoginLayer.gdpr_cb", "1"),
        ("bibLoginLayer.gdpr", "1"),
        ("eventHandler", "loginClicked"),
        ("EVT.srcId", "bibLoginLayer_c0"),
        ("EVT.scrollTop", "0"),
        ("state", state.as_str()),
    ];
    fetcher
        .fetch(&action_url, HttpMethod::Post, &params)
        .await?;
    info!("logged in to archive portal");
    Ok(())
}
