//! Anthropic OAuth (PKCE) login for Claude Pro/Max accounts.
//!
//! Tokens are stored in ~/.config/flowing/oauth.json with restricted
//! permissions (0o600) and refreshed automatically with a 5-minute
//! expiry buffer.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
const AUTHORIZE_URL: &str = "https://claude.ai/oauth/authorize";
const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
const REDIRECT_URI: &str = "https://console.anthropic.com/oauth/code/callback";
const SCOPES: &str = "org:create_api_key user:profile user:inference";

/// Stored OAuth tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub refresh: String,
    pub access: String,
    /// Expiry timestamp in milliseconds, buffer already applied
    pub expires: i64,
}

impl OAuthCredentials {
    fn new(refresh: String, access: String, expires_in_secs: i64) -> Self {
        // 5-minute buffer so a token is refreshed before it actually lapses
        let expires =
            chrono::Utc::now().timestamp_millis() + (expires_in_secs * 1000) - (5 * 60 * 1000);
        Self {
            refresh,
            access,
            expires,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() >= self.expires
    }
}

fn oauth_file() -> PathBuf {
    crate::config::Config::config_dir().join("oauth.json")
}

/// Load stored credentials, if any.
pub fn load_credentials() -> Option<OAuthCredentials> {
    let path = oauth_file();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(&path).ok()?;
    serde_json::from_str(&content).ok()
}

fn save_credentials(credentials: &OAuthCredentials) -> io::Result<()> {
    let dir = crate::config::Config::config_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    let path = oauth_file();
    let content = serde_json::to_string_pretty(credentials)?;
    fs::write(&path, content)?;

    // Owner read/write only
    #[cfg(unix)]
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Remove stored credentials.
pub fn logout() -> io::Result<()> {
    let path = oauth_file();
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Get a valid access token, refreshing if expired. Returns `None` when
/// there is no login or the refresh fails (stale credentials are removed).
pub async fn get_oauth_token() -> Option<String> {
    let credentials = load_credentials()?;

    if !credentials.is_expired() {
        return Some(credentials.access);
    }

    match refresh_token(&credentials.refresh).await {
        Ok(fresh) => {
            save_credentials(&fresh).ok()?;
            Some(fresh.access)
        }
        Err(e) => {
            tracing::warn!("failed to refresh OAuth token: {}", e);
            let _ = logout();
            None
        }
    }
}

/// Generate a PKCE verifier and its S256 challenge.
fn generate_pkce() -> (String, String) {
    let mut verifier_bytes = [0u8; 32];
    getrandom::fill(&mut verifier_bytes).expect("random bytes unavailable");
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    (verifier, challenge)
}

fn build_authorize_url(challenge: &str, state: &str) -> String {
    let params = [
        ("code", "true"),
        ("client_id", CLIENT_ID),
        ("response_type", "code"),
        ("redirect_uri", REDIRECT_URI),
        ("scope", SCOPES),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", AUTHORIZE_URL, query)
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

async fn exchange(request: serde_json::Value, action: &str) -> Result<OAuthCredentials, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_URL)
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("{} failed: {}", action, e))?;

    if !response.status().is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(format!("{} failed: {}", action, error_text));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| format!("failed to parse token response: {}", e))?;

    Ok(OAuthCredentials::new(
        token.refresh_token.unwrap_or_default(),
        token.access_token,
        token.expires_in,
    ))
}

async fn refresh_token(refresh: &str) -> Result<OAuthCredentials, String> {
    exchange(
        serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": CLIENT_ID,
            "refresh_token": refresh,
        }),
        "token refresh",
    )
    .await
}

/// Run the interactive PKCE login: open the authorize URL, read a pasted
/// `code#state` pair, exchange it for tokens, and persist them.
pub async fn login() -> Result<(), String> {
    let (verifier, challenge) = generate_pkce();
    let auth_url = build_authorize_url(&challenge, &verifier);

    println!("Opening browser to authorize...");
    println!();
    println!("If the browser doesn't open, visit this URL:");
    println!("  {}", auth_url);
    println!();
    open_browser(&auth_url);

    println!("After authorizing, paste the code below (format: code#state):");
    print!("> ");
    use std::io::Write;
    io::stdout().flush().ok();

    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();
    let pasted = input.trim();

    let (code, state) = pasted
        .split_once('#')
        .ok_or_else(|| "invalid authorization code format, expected: code#state".to_string())?;

    let credentials = exchange(
        serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": CLIENT_ID,
            "code": code,
            "state": state,
            "redirect_uri": REDIRECT_URI,
            "code_verifier": verifier,
        }),
        "code exchange",
    )
    .await?;

    save_credentials(&credentials).map_err(|e| format!("failed to save credentials: {}", e))
}

fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let _ = std::process::Command::new("open").arg(url).spawn();
    #[cfg(target_os = "linux")]
    let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    #[cfg(target_os = "windows")]
    let _ = std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn();
}
