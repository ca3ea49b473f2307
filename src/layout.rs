//! Page geometry: where each panel goes on the canvas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{CANVAS_HEIGHT, CANVAS_WIDTH, PAGE_MARGIN, PANEL_GAP};

/// The page layouts a blueprint can ask for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    /// One panel filling the page
    #[default]
    Splash,
    /// Four panels, two by two
    Grid,
    /// Three wide panels stacked vertically
    Cinematic,
}

impl LayoutStyle {
    /// Looks a layout up by name, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "splash" => Some(Self::Splash),
            "grid" => Some(Self::Grid),
            "cinematic" => Some(Self::Cinematic),
            _ => None,
        }
    }

    /// Looks a layout up by name, using `splash` for anything unknown.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!("Unknown layout '{name}', defaulting to splash");
            Self::Splash
        })
    }

    /// Number of panels this layout has room for.
    pub fn panel_count(self) -> usize {
        match self {
            Self::Splash => 1,
            Self::Grid => 4,
            Self::Cinematic => 3,
        }
    }

    /// Lowercase name as used in blueprints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Splash => "splash",
            Self::Grid => "grid",
            Self::Cinematic => "cinematic",
        }
    }

    /// The slot rectangles for this layout, ordered by panel id.
    pub fn slots(self) -> Vec<Slot> {
        let available_width = CANVAS_WIDTH - 2 * PAGE_MARGIN;
        let available_height = CANVAS_HEIGHT - 2 * PAGE_MARGIN;

        match self {
            Self::Splash => vec![Slot {
                id: 1,
                x: PAGE_MARGIN,
                y: PAGE_MARGIN,
                width: available_width,
                height: available_height,
            }],
            Self::Grid => {
                let width = (available_width - PANEL_GAP) / 2;
                let height = (available_height - PANEL_GAP) / 2;
                let mut slots = Vec::with_capacity(4);
                for row in 0..2 {
                    for col in 0..2 {
                        slots.push(Slot {
                            id: row * 2 + col + 1,
                            x: PAGE_MARGIN + col * (width + PANEL_GAP),
                            y: PAGE_MARGIN + row * (height + PANEL_GAP),
                            width,
                            height,
                        });
                    }
                }
                slots
            }
            Self::Cinematic => {
                let height = (available_height - 2 * PANEL_GAP) / 3;
                (0..3)
                    .map(|row| Slot {
                        id: row + 1,
                        x: PAGE_MARGIN,
                        y: PAGE_MARGIN + row * (height + PANEL_GAP),
                        width: available_width,
                        height,
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for LayoutStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown layout '{s}'"))
    }
}

/// A rectangle on the page canvas reserved for one panel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Slot {
    /// Panel id this slot is filled from
    pub id: u32,
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Slot {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Translates a layout name into slot rectangles. Unknown names get the
/// splash layout, this never fails.
pub fn calculate_layout(name: &str) -> Vec<Slot> {
    LayoutStyle::from_name_or_default(name).slots()
}
