//! Homepage hero banner and brand story editing.

use bytebazaar_core::{BrandStory, ExternalBlob, HeroBanner};
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::session::AdminSession;

/// Validate a hero banner form.
///
/// # Errors
///
/// Returns `AdminError::Validation` if the title or subtitle is empty.
pub fn hero_banner(
    title: &str,
    subtitle: &str,
    background_image: Option<ExternalBlob>,
) -> Result<HeroBanner, AdminError> {
    if title.trim().is_empty() || subtitle.trim().is_empty() {
        return Err(AdminError::validation("Please fill in all fields"));
    }
    Ok(HeroBanner {
        title: title.trim().to_string(),
        subtitle: subtitle.trim().to_string(),
        background_image,
    })
}

/// Validate a brand story form.
///
/// # Errors
///
/// Returns `AdminError::Validation` if the title or content is empty.
pub fn brand_story(
    title: &str,
    content: &str,
    hero_image: Option<ExternalBlob>,
) -> Result<BrandStory, AdminError> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(AdminError::validation("Please fill in all fields"));
    }
    Ok(BrandStory {
        title: title.trim().to_string(),
        content: content.to_string(),
        hero_image,
    })
}

impl AdminSession {
    /// # Errors
    ///
    /// Returns `SetupRequired` or the store error.
    #[instrument(skip_all)]
    pub async fn set_hero_banner(&self, banner: HeroBanner) -> Result<(), AdminError> {
        self.ensure_setup_complete().await?;
        self.store().set_hero_banner(banner).await?;
        info!("Hero banner saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SetupRequired` or the store error.
    #[instrument(skip_all)]
    pub async fn set_brand_story(&self, story: BrandStory) -> Result<(), AdminError> {
        self.ensure_setup_complete().await?;
        self.store().set_brand_story(story).await?;
        info!("Brand story saved");
        Ok(())
    }
}
