//! Terminal rendering of pairing QR codes.

use qrcode::{Color, EcLevel, QrCode};
use wabridge_core::error::BridgeError;

/// Light modules added around the code so phone cameras can lock on.
const QUIET_ZONE: usize = 2;

/// Render pairing data as a QR code made of Unicode half blocks.
///
/// Two module rows share one text line, so the output stays roughly square
/// in a terminal. Dark modules are drawn as filled blocks on a blank
/// background framed by a quiet zone.
pub fn render_terminal(pairing_code: &str) -> Result<String, BridgeError> {
    let code = QrCode::with_error_correction_level(pairing_code.as_bytes(), EcLevel::L)
        .map_err(|e| BridgeError::Client(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors = code.into_colors();
    let framed = width + QUIET_ZONE * 2;

    let dark = |row: usize, col: usize| -> bool {
        let (Some(r), Some(c)) = (row.checked_sub(QUIET_ZONE), col.checked_sub(QUIET_ZONE))
        else {
            return false;
        };
        r < width && c < width && colors[r * width + c] == Color::Dark
    };

    let mut out = String::with_capacity((framed + 1) * framed.div_ceil(2));
    for row in (0..framed).step_by(2) {
        for col in 0..framed {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }

    Ok(out)
}
