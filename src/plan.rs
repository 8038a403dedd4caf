use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentType {
    pub slug: String,
    pub label: String,
    pub fields: Vec<ContentField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPage {
    pub slug: String,
    pub title: String,
    pub content: String,
}

/// Theme overrides proposed by the model, layered over extracted tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignOverrides {
    pub colors: BTreeMap<String, String>,
    pub fonts: Vec<String>,
}

/// Typed build plan recovered from a model's structured response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildPlan {
    pub status: String,
    pub site_name: String,
    pub plugins: Vec<String>,
    pub content_types: Vec<ContentType>,
    pub pages: Vec<PlanPage>,
    pub design: Option<DesignOverrides>,
}

impl BuildPlan {
    /// Decode and validate. Rejects wrong shapes and unsafe identifiers
    /// before anything touches the target system.
    pub fn from_value(value: Value) -> Result<BuildPlan> {
        if !value.is_object() {
            return Err(Error::validation("build plan must be a JSON object"));
        }
        let plan: BuildPlan = serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("malformed build plan: {}", e)))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn is_ready(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("ready")
    }

    fn validate(&self) -> Result<()> {
        for plugin in &self.plugins {
            check_slug("plugin", plugin)?;
        }
        for ct in &self.content_types {
            check_slug("content type", &ct.slug)?;
        }
        for page in &self.pages {
            check_slug("page", &page.slug)?;
        }
        if let Some(design) = &self.design {
            for (role, hex) in &design.colors {
                if crate::design::tokens::color::parse_hex(hex).is_none() {
                    return Err(Error::validation(format!(
                        "color `{}` has invalid value `{}`",
                        role, hex
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_slug(what: &str, slug: &str) -> Result<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid {} slug `{}`", what, slug)))
    }
}
