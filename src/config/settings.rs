use serde::{Deserialize, Serialize};

/// User settings, mirrored from the options page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Offer the picker even when exactly one rule matches
    #[serde(default, alias = "always_show_popup")]
    pub always_show_popup: bool,
    /// Re-run matching periodically on the active tab
    #[serde(default, alias = "reeval_rules")]
    pub reeval_rules: bool,
    #[serde(default = "default_jpeg_quality", alias = "jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            always_show_popup: false,
            reeval_rules: false,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    60
}

impl Settings {
    /// Flip a boolean setting by its wire name, returning the new value
    pub fn toggle(&mut self, name: &str) -> Option<bool> {
        let flag = match name {
            "alwaysShowPopup" => &mut self.always_show_popup,
            "reevalRules" => &mut self.reeval_rules,
            _ => return None,
        };
        *flag = !*flag;
        Some(*flag)
    }
}
