//! Command handlers. Each one plays the part of a form submit: run the
//! session operation, then print the outcome or the error text verbatim.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use jobscout_core::models::GenerateImageRequest;
use jobscout_core::utils::{format_date, truncate_string};
use jobscout_core::{
    AccessToken, ApiClient, ApiError, Config, Profile, SessionError, SessionState, SessionStorage,
    SessionStore,
};

pub type Session = SessionStore<ApiClient, Box<dyn SessionStorage>>;

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "JOBSCOUT_PASSWORD";

/// Width of the description column in `image styles`
const STYLE_DESCRIPTION_WIDTH: usize = 60;

fn surface(e: SessionError) -> anyhow::Error {
    anyhow!(e.user_message())
}

fn print_profile(profile: &Profile) {
    println!("{} (id {}, member since {})", profile.username, profile.id, format_date(&profile.created_at));
}

// =========================================================================
// Credentials
// =========================================================================

/// Pick the username: explicit flag, then the last one used, else prompt.
fn resolve_username(arg: Option<String>, last: Option<&str>) -> Option<String> {
    arg.filter(|u| !u.is_empty())
        .or_else(|| last.filter(|u| !u.is_empty()).map(str::to_string))
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(prompt).context("Failed to read password")
}

fn username_or_prompt(arg: Option<String>, config: &Config) -> Result<String> {
    match resolve_username(arg, config.last_username.as_deref()) {
        Some(username) => Ok(username),
        None => prompt_username(),
    }
}

fn remember_username(config: &mut Config, username: &str) {
    config.last_username = Some(username.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

// =========================================================================
// Session commands
// =========================================================================

pub async fn login(session: &mut Session, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = username_or_prompt(username, config)?;
    let password = read_password("Password: ")?;

    let profile = session.login(&username, &password).await.map_err(surface)?;
    remember_username(config, &username);

    print!("Logged in as ");
    print_profile(&profile);
    Ok(())
}

pub async fn register(session: &mut Session, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.filter(|u| !u.is_empty()) {
        Some(username) => username,
        None => prompt_username()?,
    };
    let password = read_password("Choose a password: ")?;
    if std::env::var(PASSWORD_ENV).is_err() {
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if confirm != password {
            bail!("Passwords do not match");
        }
    }

    let profile = session.register(&username, &password).await.map_err(surface)?;
    remember_username(config, &username);

    print!("Account created. Logged in as ");
    print_profile(&profile);
    Ok(())
}

pub fn logout(session: &mut Session) -> Result<()> {
    session.logout().map_err(surface)?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(session: &mut Session, json: bool) -> Result<()> {
    if session.restore().map_err(surface)? {
        if let (Some(profile), Some(age)) = (session.display_profile(), session.display_profile_age()) {
            eprintln!("{} (cached {}, verifying...)", profile.username, age);
        }
    }

    match session.verify().await.map_err(surface)? {
        SessionState::Authenticated(profile) if json => {
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        SessionState::Authenticated(profile) => print_profile(&profile),
        SessionState::Anonymous | SessionState::Unknown => bail!("Not logged in"),
    }
    Ok(())
}

// =========================================================================
// Image commands
// =========================================================================

/// Restore the session and hand back its token, or explain why not.
async fn require_token(session: &mut Session) -> Result<AccessToken> {
    session.init().await.map_err(surface)?;
    session
        .token()
        .cloned()
        .ok_or_else(|| anyhow!("Not logged in. Run `jobscout login` first."))
}

/// Drop the session when the server rejects the token.
fn check_unauthorized<T>(session: &mut Session, result: Result<T, ApiError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => {
            session.handle_unauthorized().map_err(surface)?;
            bail!("{}", ApiError::Unauthorized)
        }
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

pub fn generate_request(
    prompt: String,
    style: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
) -> GenerateImageRequest {
    let mut request = GenerateImageRequest::new(prompt);
    if let Some(style) = style {
        request = request.with_style(style);
    }
    if let (Some(width), Some(height)) = (width, height) {
        request = request.with_size(width, height);
    }
    request
}

pub async fn image_styles(session: &mut Session) -> Result<()> {
    let token = require_token(session).await?;
    let result = session.gateway().image_styles(&token).await;
    let styles = check_unauthorized(session, result)?;

    if styles.styles.is_empty() {
        println!("No styles available");
    }
    for style in &styles.styles {
        match style.description {
            Some(ref description) => println!(
                "{:<16} {:<20} {}",
                style.id,
                style.name,
                truncate_string(description, STYLE_DESCRIPTION_WIDTH)
            ),
            None => println!("{:<16} {}", style.id, style.name),
        }
    }
    Ok(())
}

pub async fn image_status(session: &mut Session) -> Result<()> {
    let token = require_token(session).await?;
    let result = session.gateway().image_status(&token).await;
    let status = check_unauthorized(session, result)?;

    let availability = if status.available { "available" } else { "unavailable" };
    match status.model {
        Some(ref model) => println!("Image generation {} (model: {})", availability, model),
        None => println!("Image generation {}", availability),
    }
    if let Some(ref message) = status.message {
        println!("{}", message);
    }
    Ok(())
}

pub async fn image_generate(session: &mut Session, request: GenerateImageRequest, out: Option<PathBuf>) -> Result<()> {
    let token = require_token(session).await?;
    let result = session.gateway().generate_image(&token, &request).await;
    let image = check_unauthorized(session, result)?;

    let bytes = image.decode().context("Server returned an undecodable image")?;
    let path = out.unwrap_or_else(|| PathBuf::from(format!("image.{}", image.extension())));
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
