//! Color constants for the terminal user interface.

use ratatui::style::Color;

// One accent per priority level, used for row text
// and the filter indicator in the header.

/// Used for high priority
pub const HIGH_RED: Color = Color::Rgb(204, 54, 46);
/// Used for medium priority
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for low priority
pub const SEA_GREEN: Color = Color::Rgb(46, 139, 87);
