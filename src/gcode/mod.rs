//! G-code vocabulary spoken to the machine.
//!
//! The host only ever emits a handful of commands: absolute rapid moves,
//! the position query and two fixed sequences (startup and homing). Builders
//! here produce the exact text; [`protocol::GcodeLink`] frames and sends it.

pub mod protocol;
pub mod report;

pub use protocol::{GcodeLink, LinkTiming};
pub use report::{AxisReading, PositionReport};

use crate::motion::{quantize, Axis, Position};

/// Reserved token asking the firmware for its current position.
pub const POSITION_QUERY: &str = "M114";

/// Move token used for every motion command.
pub const RAPID_MOVE: &str = "G0";

/// Sent once after the link opens.
pub const STARTUP_SEQUENCE: &str = "
M107 P1 ; Turn off part fan
G28 ; Home all axes
";

/// Render a coordinate the way it is written on the wire: rounded to the
/// micron, without trailing zeros.
pub fn format_coord(value: f64) -> String {
    let text = format!("{:.3}", quantize(value));
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// `G0 X.. Y..` for the given axis words, in the order given.
pub fn move_command(words: &[(Axis, f64)]) -> String {
    let mut cmd = String::from(RAPID_MOVE);
    for (axis, value) in words {
        cmd.push(' ');
        cmd.push(axis.letter());
        cmd.push_str(&format_coord(*value));
    }
    cmd
}

pub fn move_axis(axis: Axis, value: f64) -> String {
    move_command(&[(axis, value)])
}

/// Raise to the scan height, return to the XY origin, then drop Z to zero.
pub fn homing_sequence(start: &Position) -> String {
    [
        move_axis(Axis::Z, start.z),
        move_command(&[(Axis::X, 0.0), (Axis::Y, 0.0)]),
        move_axis(Axis::Z, 0.0),
    ]
    .join("\n")
}

/// Code part of a line, without any `;` comment.
pub fn strip_comment(line: &str) -> &str {
    line.split(';').next().unwrap_or("").trim()
}
