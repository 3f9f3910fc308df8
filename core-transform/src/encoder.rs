//! # Transformation Encoder
//!
//! Maps [`TransformationOptions`] to a delivery URL in the Transform
//! provider's grammar:
//!
//! ```text
//! https://res.cloudinary.com/<cloud>/image/upload/<token>,<token>,.../<id>
//! ```
//!
//! Tokens are `key_value` pairs emitted in a fixed field order, one per set
//! field. Overlay blocks are single composite tokens whose sub-parameters
//! trail the layer directive (target, position, size, opacity, then text
//! color). Each overlay block sits in its own `/` component, so its
//! sub-parameters never mix with the top-level tokens around it:
//!
//! ```text
//! w_800,g_auto/l_text:Arial_36:Hi,g_south,y_24/q_auto/<id>
//! ```
//!
//! Encoding is pure and total: any combination of fields produces a URL,
//! and identical options always produce identical bytes.

use crate::options::{
    ArtisticEffect, Gravity, ImageOverlay, Radius, Rotation, TextOverlay, TransformationOptions,
};
use tracing::trace;

pub const DELIVERY_HOST: &str = "https://res.cloudinary.com";
pub const TOKEN_SEPARATOR: &str = ",";
pub const COMPONENT_SEPARATOR: &str = "/";

/// One emitted token. Layers carry their own sub-parameters and are never
/// joined with neighbouring tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Param(String),
    Layer(String),
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Token::Param(token)
    }
}

impl Token {
    fn into_string(self) -> String {
        match self {
            Token::Param(token) | Token::Layer(token) => token,
        }
    }
}

/// Builds delivery URLs for one provider account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformEncoder {
    cloud_name: String,
}

impl TransformEncoder {
    pub fn new(cloud_name: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
        }
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    /// Upload base path, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}/{}/image/upload", DELIVERY_HOST, self.cloud_name)
    }

    /// Delivery URL of `id` with `options` applied.
    ///
    /// With no fields set this is the untransformed URL of the asset.
    pub fn encode(&self, id: &str, options: &TransformationOptions) -> String {
        let tokens = tokens(options);
        trace!(id, tokens = tokens.len(), "Encoded transformation");

        if tokens.is_empty() {
            format!("{}/{}", self.base_url(), id)
        } else {
            format!("{}/{}/{}", self.base_url(), components(tokens), id)
        }
    }
}

/// Ordered token list for `options`, one entry per set field.
///
/// Blank strings count as unset.
pub fn encode_tokens(options: &TransformationOptions) -> Vec<String> {
    tokens(options).into_iter().map(Token::into_string).collect()
}

/// Join runs of plain tokens with `,` and give each layer its own component
fn components(tokens: Vec<Token>) -> String {
    let mut components: Vec<String> = Vec::new();
    let mut run: Vec<String> = Vec::new();

    for token in tokens {
        match token {
            Token::Param(token) => run.push(token),
            Token::Layer(layer) => {
                if !run.is_empty() {
                    components.push(run.join(TOKEN_SEPARATOR));
                    run.clear();
                }
                components.push(layer);
            }
        }
    }
    if !run.is_empty() {
        components.push(run.join(TOKEN_SEPARATOR));
    }

    components.join(COMPONENT_SEPARATOR)
}

fn tokens(options: &TransformationOptions) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    if let Some(width) = options.width {
        tokens.push(format!("w_{}", width).into());
    }
    if let Some(height) = options.height {
        tokens.push(format!("h_{}", height).into());
    }
    if let Some(ratio) = non_blank(&options.aspect_ratio) {
        tokens.push(format!("ar_{}", escape_param(ratio)).into());
    }

    if let Some(crop) = options.crop {
        tokens.push(format!("c_{}", crop.as_str()).into());
    }
    if let Some(gravity) = options.gravity {
        tokens.push(format!("g_{}", gravity.as_str()).into());
    }
    if let Some(format) = non_blank(&options.format) {
        tokens.push(format!("f_{}", escape_param(&format.to_ascii_lowercase())).into());
    }
    if let Some(quality) = options.quality {
        tokens.push(format!("q_{}", quality.clamp(1, 100)).into());
    }
    if let Some(effect) = non_blank(&options.effect) {
        tokens.push(format!("e_{}", escape_param(effect)).into());
    }

    if let Some(radius) = options.radius {
        let token = match radius {
            Radius::Pixels(pixels) => format!("r_{}", pixels),
            Radius::Max => "r_max".to_string(),
        };
        tokens.push(token.into());
    }
    if let Some(angle) = options.angle {
        tokens.push(format!("a_{}", rotation_value(angle)).into());
    }
    if let Some(opacity) = options.opacity {
        tokens.push(format!("o_{}", opacity.min(100)).into());
    }
    if let Some(background) = non_blank(&options.background) {
        tokens.push(format!("b_{}", color_value(background)).into());
    }
    if let Some(color) = non_blank(&options.color) {
        tokens.push(format!("co_{}", color_value(color)).into());
    }
    if let Some(density) = options.density {
        tokens.push(format!("dn_{}", density).into());
    }

    for filter in &options.filters {
        tokens.push(format!("e_{}", filter.as_str()).into());
    }
    if let Some(layer) = options.text.as_ref().and_then(text_block) {
        tokens.push(Token::Layer(layer));
    }
    if let Some(layer) = options.overlay.as_ref().and_then(overlay_block) {
        tokens.push(Token::Layer(layer));
    }
    if let Some(token) = options.artistic.as_ref().and_then(artistic_block) {
        tokens.push(token.into());
    }

    let optimize = &options.optimize;
    if optimize.auto_format {
        tokens.push("f_auto".to_string().into());
    }
    if optimize.auto_quality {
        tokens.push("q_auto".to_string().into());
    }
    if optimize.progressive {
        tokens.push("fl_progressive".to_string().into());
    }
    if optimize.strip_profile {
        tokens.push("fl_strip_profile".to_string().into());
    }

    tokens
}

fn text_block(text: &TextOverlay) -> Option<String> {
    if text.text.trim().is_empty() {
        return None;
    }

    let mut style = format!(
        "{}_{}",
        escape_text(text.font_family.trim()),
        text.font_size
    );
    if let Some(font_style) = non_blank(&text.font_style) {
        style.push('_');
        style.push_str(&escape_param(font_style));
    }

    let mut parts = vec![format!("l_text:{}:{}", style, escape_text(&text.text))];
    push_position(&mut parts, text.gravity, text.x, text.y);
    if let Some(width) = text.width {
        parts.push(format!("w_{}", width));
    }
    if let Some(opacity) = text.opacity {
        parts.push(format!("o_{}", opacity.min(100)));
    }
    // Glyph color trails the layout parameters
    if let Some(color) = non_blank(&text.color) {
        parts.push(format!("co_{}", color_value(color)));
    }

    Some(parts.join(TOKEN_SEPARATOR))
}

fn overlay_block(overlay: &ImageOverlay) -> Option<String> {
    let public_id = overlay.public_id.trim().trim_matches('/');
    if public_id.is_empty() {
        return None;
    }

    // Layer ids use ':' as the folder separator
    let mut parts = vec![format!("l_{}", escape_param(&public_id.replace('/', ":")))];
    push_position(&mut parts, overlay.gravity, overlay.x, overlay.y);
    if let Some(width) = overlay.width {
        parts.push(format!("w_{}", width));
    }
    if let Some(height) = overlay.height {
        parts.push(format!("h_{}", height));
    }
    if let Some(opacity) = overlay.opacity {
        parts.push(format!("o_{}", opacity.min(100)));
    }

    Some(parts.join(TOKEN_SEPARATOR))
}

fn artistic_block(effect: &ArtisticEffect) -> Option<String> {
    let filter = effect.filter.trim();
    if filter.is_empty() {
        return None;
    }
    Some(format!("e_art:{}", escape_param(filter)))
}

fn push_position(
    parts: &mut Vec<String>,
    gravity: Option<Gravity>,
    x: Option<i32>,
    y: Option<i32>,
) {
    if let Some(gravity) = gravity {
        parts.push(format!("g_{}", gravity.as_str()));
    }
    if let Some(x) = x {
        parts.push(format!("x_{}", x));
    }
    if let Some(y) = y {
        parts.push(format!("y_{}", y));
    }
}

fn rotation_value(rotation: Rotation) -> String {
    match rotation {
        Rotation::Degrees(degrees) => degrees.to_string(),
        Rotation::AutoRight => "auto_right".to_string(),
        Rotation::AutoLeft => "auto_left".to_string(),
        Rotation::Hflip => "hflip".to_string(),
        Rotation::Vflip => "vflip".to_string(),
    }
}

/// `#rrggbb` becomes `rgb:rrggbb`; named colors pass through
fn color_value(color: &str) -> String {
    match color.strip_prefix('#') {
        Some(hex) => format!("rgb:{}", escape_param(&hex.to_ascii_lowercase())),
        None => escape_param(color),
    }
}

/// Percent-escape overlay text.
///
/// Commas and slashes are escaped twice since the provider splits on them
/// before decoding.
fn escape_text(text: &str) -> String {
    urlencoding::encode(text)
        .replace("%2C", "%252C")
        .replace("%2F", "%252F")
}

/// Escape a free-form parameter value.
///
/// Characters of the parameter grammar itself (alphanumerics, `:`, `.`,
/// `_`, `-`) pass through; anything else, separators included, is escaped
/// like overlay text.
fn escape_param(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, ':' | '.' | '_' | '-') {
            escaped.push(ch);
        } else {
            escaped.push_str(&escape_text(ch.encode_utf8(&mut [0; 4])));
        }
    }
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
