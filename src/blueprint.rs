//! The per-page plan: a layout and what each panel should show.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::layout::LayoutStyle;

/// Description used when a blueprint panel arrives without one.
pub const GENERIC_DESCRIPTION: &str = "A generic scene.";

/// One panel of a blueprint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Page-local id, matched against slot ids
    pub id: u32,
    /// What the image model should draw
    pub description: String,
}

impl PanelSpec {
    /// Shorthand constructor.
    pub fn new(id: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// Why a fallback blueprint was used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackCause {
    /// The request failed or the reply had no content
    Transport,
    /// The reply came back but nothing could be parsed out of it
    Parse,
}

/// Structured plan for one page.
///
/// The panel count is expected to match the layout (1, 4 or 3) but nothing
/// enforces it; slots without a panel stay blank.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Chosen layout
    pub layout: LayoutStyle,
    /// The model's explanation of the choice
    pub reasoning: String,
    /// Ordered panel descriptions
    pub panels: Vec<PanelSpec>,
}

impl Blueprint {
    /// The deterministic grid blueprint used when the architect can't deliver.
    pub fn fallback(cause: FallbackCause) -> Self {
        let (reasoning, description) = match cause {
            FallbackCause::Transport => ("Fallback due to API error.", "Scene continue."),
            FallbackCause::Parse => (
                "Fallback due to AI error.",
                "A generic scene visualization.",
            ),
        };
        Self {
            layout: LayoutStyle::Grid,
            reasoning: reasoning.to_string(),
            panels: (1..=4).map(|id| PanelSpec::new(id, description)).collect(),
        }
    }

    /// Builds a blueprint out of loosely shaped JSON.
    ///
    /// Returns `None` when `value` isn't an object or is an empty one. Missing
    /// or odd fields get defaults: `splash` layout, empty reasoning, no panels.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object().filter(|object| !object.is_empty())?;

        let layout = match object.get("layout") {
            Some(Value::String(name)) => LayoutStyle::from_name_or_default(name),
            Some(other) => {
                warn!("Blueprint layout is not a string ({other}), using splash");
                LayoutStyle::Splash
            }
            None => LayoutStyle::Splash,
        };

        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let panels = match object.get("panels") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| panel_from_value(idx, item))
                .collect(),
            Some(other) => {
                warn!("Blueprint panels is not a list ({other}), ignoring it");
                Vec::new()
            }
            None => Vec::new(),
        };

        Some(Self {
            layout,
            reasoning,
            panels,
        })
    }

    /// Pretty JSON for display.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn panel_from_value(idx: usize, item: &Value) -> Option<PanelSpec> {
    let Some(object) = item.as_object() else {
        warn!("Skipping blueprint panel {} which is not an object", idx + 1);
        return None;
    };
    let position = u32::try_from(idx + 1).unwrap_or(u32::MAX);
    let id = match object.get("id") {
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or(position),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(position),
        _ => position,
    };
    let description = object
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(GENERIC_DESCRIPTION)
        .to_string();
    Some(PanelSpec { id, description })
}
