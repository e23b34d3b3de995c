//! Command handlers and their terminal output.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ecovision_api::{
    ApiError, EcoVisionApi, LeaderboardEntry, NewWasteBank, Prediction, TrashCan, WasteBank,
};
use ecovision_auth::{AuthClient, CredentialStore, expires_at};
use ecovision_settings::EcoVisionSettings;
use serde_json::Value;

/// Clients wired up from settings, shared by every command.
pub struct App {
    api: EcoVisionApi,
}

impl App {
    /// Open the credential file and build the clients from settings.
    pub fn from_settings(settings: &EcoVisionSettings) -> Result<Self> {
        let store = Arc::new(CredentialStore::open_file(settings.auth.credentials_file()));
        let auth = AuthClient::from_settings(settings, store)
            .context("failed to build HTTP client")?;
        auth.refresher().on_session_expired(|err| {
            eprintln!("Session expired ({err}). Run `ecovision login` to sign in again.");
        });
        Ok(Self {
            api: EcoVisionApi::new(auth),
        })
    }

    fn auth(&self) -> &AuthClient {
        self.api.auth()
    }

    /// `login`
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let login = self
            .auth()
            .login(email, password)
            .await
            .map_err(ApiError::from)?;
        println!("Signed in as {}.", profile_name(login.user.as_ref()).unwrap_or(email));
        Ok(())
    }

    /// `register`
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let outcome = self
            .auth()
            .register(username, email, password)
            .await
            .map_err(ApiError::from)?;
        if outcome.auto_login {
            println!("Account created. Signed in as {username}.");
        } else {
            println!("Account created. Run `ecovision login` to sign in.");
        }
        Ok(())
    }

    /// `logout`
    pub fn logout(&self) -> Result<()> {
        self.auth().logout().map_err(ApiError::from)?;
        println!("Signed out.");
        Ok(())
    }

    /// `whoami`
    pub fn whoami(&self) {
        println!("{}", describe_session(self.auth().store()));
    }

    /// `health`
    pub async fn health(&self) -> bool {
        let up = self.auth().health().await;
        if up {
            println!("Backend at {} is up.", self.auth().base_url());
        } else {
            println!("Backend at {} is not reachable.", self.auth().base_url());
        }
        up
    }

    /// `leaderboard`
    pub async fn leaderboard(&self) -> Result<()> {
        let rows = self.api.leaderboard().await?;
        print!("{}", format_leaderboard(&rows));
        Ok(())
    }

    /// `waste-banks list`
    pub async fn waste_banks(&self) -> Result<()> {
        let banks = self.api.waste_banks().await?;
        print!("{}", format_waste_banks(&banks));
        Ok(())
    }

    /// `waste-banks add`
    pub async fn add_waste_bank(&self, bank: &NewWasteBank) -> Result<()> {
        let created = self.api.add_waste_bank(bank).await?;
        match created.id {
            Some(id) => println!("Added waste bank {} (id {id}).", created.name),
            None => println!("Added waste bank {}.", created.name),
        }
        Ok(())
    }

    /// `trash-cans`
    pub async fn trash_cans(&self) -> Result<()> {
        let cans = self.api.trash_cans().await?;
        print!("{}", format_trash_cans(&cans));
        Ok(())
    }

    /// `classify`
    pub async fn classify(&self, image: &Path) -> Result<()> {
        let prediction = self.api.classify_path(image).await?;
        print!("{}", format_prediction(&prediction));
        Ok(())
    }
}

fn profile_name(profile: Option<&Value>) -> Option<&str> {
    let profile = profile?;
    profile
        .get("username")
        .or_else(|| profile.get("name"))
        .or_else(|| profile.get("email"))
        .and_then(Value::as_str)
}

/// Session summary for `whoami`.
pub fn describe_session(store: &CredentialStore) -> String {
    let Some(creds) = store.get() else {
        return "Not signed in.".to_string();
    };
    let mut out = match profile_name(creds.user_profile.as_ref()) {
        Some(name) => format!("Signed in as {name}."),
        None => "Signed in.".to_string(),
    };
    match expires_at(&creds.access_token) {
        Some(exp) => {
            let _ = write!(out, " Access token expires at unix time {exp}.");
        }
        None => out.push_str(" Access token expiry unknown."),
    }
    out
}

/// One line per leaderboard row.
pub fn format_leaderboard(rows: &[LeaderboardEntry]) -> String {
    if rows.is_empty() {
        return "No leaderboard data yet.\n".to_string();
    }
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} - level {} - {} pts",
            i + 1,
            row.display_name(),
            row.level_or_default(),
            row.points()
        );
    }
    out
}

/// Waste banks with accepted waste and opening hours.
pub fn format_waste_banks(banks: &[WasteBank]) -> String {
    if banks.is_empty() {
        return "No waste banks found.\n".to_string();
    }
    let mut out = String::new();
    for bank in banks {
        let _ = write!(out, "{}", bank.name);
        if let Some((lat, lng)) = bank.position() {
            let _ = write!(out, " ({lat:.5}, {lng:.5})");
        }
        out.push('\n');
        if let Some(address) = &bank.address {
            let _ = writeln!(out, "  {address}");
        }
        if !bank.waste_processed.is_empty() {
            let names: Vec<&str> = bank.waste_processed.iter().map(|w| w.name.as_str()).collect();
            let _ = writeln!(out, "  accepts: {}", names.join(", "));
        }
        for hours in &bank.opening_hours {
            let _ = writeln!(out, "  {hours}");
        }
    }
    out
}

/// Trash cans with position and accepted waste.
pub fn format_trash_cans(cans: &[TrashCan]) -> String {
    if cans.is_empty() {
        return "No trash cans found.\n".to_string();
    }
    let mut out = String::new();
    for can in cans {
        let id = can.id.map_or_else(|| "?".to_string(), |id| id.to_string());
        let position = can
            .position()
            .map_or_else(|| "unknown location".to_string(), |(lat, lng)| format!("{lat:.5}, {lng:.5}"));
        let accepts = if can.accepted_waste_types.is_empty() {
            "no waste type info".to_string()
        } else {
            can.accepted_waste_types
                .iter()
                .map(|w| w.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(out, "#{id} at {position}: {accepts}");
    }
    out
}

/// Classification result.
pub fn format_prediction(prediction: &Prediction) -> String {
    let mut out = format!(
        "Waste type: {}\n",
        prediction.prediction.as_deref().unwrap_or("unknown")
    );
    if let Some(percent) = prediction.confidence_percent() {
        let _ = writeln!(out, "Confidence: {percent}");
    }
    if let Some(advice) = &prediction.recommendation {
        let _ = writeln!(out, "{advice}");
    }
    if let Some(points) = prediction.points.filter(|p| *p != 0) {
        let _ = writeln!(out, "+{points} points");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
