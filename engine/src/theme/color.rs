//! Color math backing the engine's chrome styling decisions.
//!
//! All functions operate on `#rgb` / `#rrggbb` hex strings and degrade to
//! `None` on malformed input rather than failing the caller.

/// Luminosity scores below this value count as a dark background and get
/// light status-bar content (and vice versa).
pub const LUMINOSITY_DARK_THRESHOLD: f64 = 130.0;

/// Parse a `#rgb` or `#rrggbb` hex color into its channel values.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;

    let expanded: String;
    let digits = match digits.len() {
        3 => {
            expanded = digits.chars().flat_map(|c| [c, c]).collect();
            expanded.as_str()
        }
        6 => digits,
        _ => return None,
    };

    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Perceptual luminosity of a hex color, weighted per ITU-R BT.709.
///
/// Returns a score in `0.0..=255.0`.
pub fn luminosity(hex: &str) -> Option<f64> {
    let (r, g, b) = parse_hex(hex)?;
    Some(0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b))
}

/// Blend a color toward white (positive ratio) or black (negative ratio).
///
/// `ratio` is clamped to `-1.0..=1.0`; its magnitude is the blend strength.
pub fn shade_blend(ratio: f64, color: &str) -> Option<String> {
    let ratio = ratio.clamp(-1.0, 1.0);
    let (r, g, b) = parse_hex(color)?;
    let target = if ratio < 0.0 { 0.0 } else { 255.0 };
    let strength = ratio.abs();

    let blend = |channel: u8| -> u8 {
        let channel = f64::from(channel);
        ((target - channel) * strength + channel).round() as u8
    };

    Some(format!("#{:02x}{:02x}{:02x}", blend(r), blend(g), blend(b)))
}

/// Darken a color by the standard step used for pressed/secondary surfaces.
pub fn darken(color: &str) -> Option<String> {
    shade_blend(-0.15, color)
}

/// Lighten a color by the standard step used for highlights.
pub fn lighten(color: &str) -> Option<String> {
    shade_blend(0.25, color)
}

/// Convert a hex color to a CSS-style `rgba(r,g,b,a)` string.
pub fn hex_to_rgba(hex: &str, alpha: f64) -> Option<String> {
    let (r, g, b) = parse_hex(hex)?;
    Some(format!("rgba({r},{g},{b},{alpha})"))
}
