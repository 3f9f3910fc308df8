use core_transform::{encode_tokens, TransformEncoder, TransformationOptions};

const EDITOR_STATE: &str = r##"{
    "width": 800,
    "crop": "fill",
    "gravity": "auto",
    "format": "WEBP",
    "filters": ["vignette", "grayscale"],
    "text": {
        "text": "Summer 2024",
        "fontSize": 36,
        "color": "#ff8800",
        "gravity": "south",
        "y": 24
    },
    "optimize": {"autoQuality": true, "progressive": true}
}"##;

const EDITOR_STATE_REORDERED: &str = r##"{
    "optimize": {"progressive": true, "autoQuality": true},
    "text": {
        "y": 24,
        "gravity": "south",
        "color": "#ff8800",
        "fontSize": 36,
        "text": "Summer 2024"
    },
    "filters": ["grayscale", "vignette"],
    "format": "WEBP",
    "gravity": "auto",
    "crop": "fill",
    "width": 800
}"##;

fn parse(json: &str) -> TransformationOptions {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_encoding_is_deterministic_under_key_reordering() {
    let encoder = TransformEncoder::new("demo");

    let first = encoder.encode("photos/beach.jpg", &parse(EDITOR_STATE));
    let again = encoder.encode("photos/beach.jpg", &parse(EDITOR_STATE));
    let reordered = encoder.encode("photos/beach.jpg", &parse(EDITOR_STATE_REORDERED));

    assert_eq!(first, again);
    assert_eq!(first, reordered);
    assert_eq!(
        first,
        "https://res.cloudinary.com/demo/image/upload/\
         w_800,c_fill,g_auto,f_webp,e_grayscale,e_vignette/\
         l_text:Arial_36:Summer%202024,g_south,y_24,co_rgb:ff8800/\
         q_auto,fl_progressive/photos/beach.jpg"
    );
}

/// Split a delivery URL back into its tokens: layer components stay whole,
/// every other component splits on `,`.
fn url_tokens<'a>(url: &'a str, encoder: &TransformEncoder, id: &str) -> Vec<&'a str> {
    let transformation = url
        .strip_prefix(&format!("{}/", encoder.base_url()))
        .and_then(|rest| rest.strip_suffix(&format!("/{}", id)))
        .unwrap();

    transformation
        .split('/')
        .flat_map(|component| {
            if component.starts_with("l_") {
                vec![component]
            } else {
                component.split(',').collect()
            }
        })
        .collect()
}

fn key(token: &str) -> &str {
    token.split('_').next().unwrap_or_default()
}

#[test]
fn test_token_keys_recover_set_fields() {
    let tokens = encode_tokens(&parse(EDITOR_STATE));
    let keys: Vec<&str> = tokens.iter().map(|token| key(token)).collect();

    assert_eq!(keys, vec!["w", "c", "g", "f", "e", "e", "l", "q", "fl"]);
}

#[test]
fn test_url_tokens_map_one_to_one_to_set_fields() {
    let encoder = TransformEncoder::new("demo");
    let options = parse(EDITOR_STATE);
    let url = encoder.encode("photos/beach.jpg", &options);

    let from_url = url_tokens(&url, &encoder, "photos/beach.jpg");
    assert_eq!(from_url, encode_tokens(&options));

    // Top-level gravity appears once; the text layer keeps its own
    let gravity: Vec<&str> = from_url
        .iter()
        .copied()
        .filter(|token| key(token) == "g")
        .collect();
    assert_eq!(gravity, vec!["g_auto"]);
    assert!(from_url.iter().any(|token| token.starts_with("l_text:") && token.contains(",g_south")));
}

#[test]
fn test_url_round_trip_with_every_block() {
    let encoder = TransformEncoder::new("demo");
    let options = parse(
        r##"{
            "width": 640,
            "opacity": 70,
            "color": "#112233",
            "text": {"text": "Hi, there", "color": "white", "opacity": 50, "width": 200},
            "overlay": {"publicId": "brand/logo", "gravity": "north_east", "width": 64, "opacity": 80},
            "artistic": {"filter": "zorro"},
            "optimize": {"autoFormat": true}
        }"##,
    );

    let url = encoder.encode("a.png", &options);
    let from_url = url_tokens(&url, &encoder, "a.png");

    assert_eq!(from_url, encode_tokens(&options));
    let keys: Vec<&str> = from_url.iter().map(|token| key(token)).collect();
    assert_eq!(keys, vec!["w", "o", "co", "l", "l", "e", "f"]);
}

#[test]
fn test_empty_state_is_untransformed_url() {
    let encoder = TransformEncoder::new("acme");
    let options = parse("{}");

    assert!(encode_tokens(&options).is_empty());
    assert_eq!(
        encoder.encode("a.png", &options),
        format!("{}/a.png", encoder.base_url())
    );
}
