use anyhow::{Context, Result, ensure};
use recon_analysis::SpeedOptions;
use recon_analysis::collision::CollisionConfig;
use recon_linear::{HomographyOptions, MappingOptions};
use serde::{Deserialize, Serialize};

/// All tunables of a project run, passed explicitly into each call.
///
/// Every section falls back to its defaults when omitted from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub homography: HomographyOptions,
    pub mapping: MappingOptions,
    pub speed: SpeedOptions,
    pub collision: CollisionConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.homography.validate().context("homography options")?;
        ensure!(
            self.mapping.w_epsilon >= 0.0,
            "mapping options: w_epsilon must be non-negative, got {}",
            self.mapping.w_epsilon
        );
        self.speed.validate().context("speed options")?;
        self.collision.validate().context("collision config")?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parse analysis config")?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        assert_eq!(AnalysisConfig::from_json("{}").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn invalid_sections_are_named() {
        let err = AnalysisConfig::from_json(r#"{"collision":{"iou_threshold":2.0}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("collision config"), "{err:#}");

        let err = AnalysisConfig::from_json(r#"{"speed":{"min_frame_gap":0}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("speed options"), "{err:#}");
    }
}
