//! Payment processor (Stripe) setup.
//!
//! Until a configuration is saved, checkout cannot work, so the other admin
//! actions are blocked (see [`AdminSession::setup_required`]).

use std::fmt;

use bytebazaar_core::StripeConfiguration;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::session::AdminSession;

/// Country list pre-filled in the setup form.
pub const DEFAULT_ALLOWED_COUNTRIES: &str = "IN";

const KEY_PREFIXES: [&str; 2] = ["sk_test_", "sk_live_"];

/// Payment setup form.
///
/// Implements `Debug` manually to redact the secret key.
pub struct StripeSetup {
    pub secret_key: SecretString,
    /// Comma-separated two-letter country codes.
    pub allowed_countries: String,
}

impl fmt::Debug for StripeSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeSetup")
            .field("secret_key", &"[REDACTED]")
            .field("allowed_countries", &self.allowed_countries)
            .finish()
    }
}

impl StripeSetup {
    #[must_use]
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::from(secret_key.into()),
            allowed_countries: DEFAULT_ALLOWED_COUNTRIES.to_string(),
        }
    }

    #[must_use]
    pub fn with_countries(mut self, countries: impl Into<String>) -> Self {
        self.allowed_countries = countries.into();
        self
    }

    /// Validate the form into the configuration sent to the backend.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if the key is empty or not a Stripe
    /// secret key, or if no valid country code remains.
    pub fn validate(&self) -> Result<StripeConfiguration, AdminError> {
        let secret_key = self.secret_key.expose_secret().trim();
        if secret_key.is_empty() {
            return Err(AdminError::validation(
                "Please enter your Stripe secret key",
            ));
        }
        if !KEY_PREFIXES.iter().any(|p| secret_key.starts_with(p)) {
            return Err(AdminError::validation(
                "Your secret key starts with \"sk_test_\" (test mode) or \"sk_live_\" (live mode)",
            ));
        }

        let allowed_countries = parse_countries(&self.allowed_countries);
        if allowed_countries.is_empty() {
            return Err(AdminError::validation(
                "Please enter at least one valid country code",
            ));
        }

        Ok(StripeConfiguration {
            secret_key: secret_key.to_string(),
            allowed_countries,
        })
    }
}

/// Split, trim and upper-case a country list, keeping two-letter codes.
#[must_use]
pub fn parse_countries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| c.chars().count() == 2)
        .collect()
}

impl AdminSession {
    /// Save the payment processor configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or the store error if saving fails.
    #[instrument(skip_all)]
    pub async fn configure_stripe(&self, setup: &StripeSetup) -> Result<(), AdminError> {
        let config = setup.validate()?;
        let countries = config.allowed_countries.join(",");
        self.store().set_stripe_configuration(config).await?;
        info!(countries = %countries, "Stripe configuration saved");
        Ok(())
    }
}
