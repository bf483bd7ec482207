//! Camera/frame association from image names such as `out2_frame_0001.png`

use mvp_core::{Association, FrameIndex};

const CAMERA_PREFIX: &str = "out";
const FRAME_SEPARATOR: &str = "_frame_";
const FRAME_KEY_PREFIX: &str = "frame_";

/// Resolve `[...]out<camera>_frame_<frame>[...]` in the file's base name
pub fn parse_image_name(name: &str) -> Option<Association> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    base.rmatch_indices(CAMERA_PREFIX)
        .find_map(|(i, _)| parse_at(&base[i + CAMERA_PREFIX.len()..]))
}

fn parse_at(s: &str) -> Option<Association> {
    let (camera, rest) = split_digits(s)?;
    let rest = rest.strip_prefix(FRAME_SEPARATOR)?;
    let (frame, _) = split_digits(rest)?;
    Some(Association::new(camera.parse().ok()?, frame.parse().ok()?))
}

fn split_digits(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (end > 0).then(|| s.split_at(end))
}

/// Skeleton map key, `frame_0001`
pub fn frame_key(frame: FrameIndex) -> String {
    format!("{FRAME_KEY_PREFIX}{frame:04}")
}

pub fn parse_frame_key(key: &str) -> Option<FrameIndex> {
    key.strip_prefix(FRAME_KEY_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_name() {
        assert_eq!(parse_image_name("out2_frame_0001.png"), Some(Association::new(2, 1)));
        assert_eq!(parse_image_name("out13_frame_0420.jpg"), Some(Association::new(13, 420)));
    }

    #[test]
    fn test_parse_with_path_and_prefix() {
        assert_eq!(
            parse_image_name("videos/cam/clip_out8_frame_0007_png.rf.abc123.jpg"),
            Some(Association::new(8, 7))
        );
        assert_eq!(
            parse_image_name(r"C:\data\out5_frame_12.png"),
            Some(Association::new(5, 12))
        );
    }

    #[test]
    fn test_unresolvable_names() {
        assert_eq!(parse_image_name("frame_0001.png"), None);
        assert_eq!(parse_image_name("out_frame_0001.png"), None);
        assert_eq!(parse_image_name("out2_frame_.png"), None);
        assert_eq!(parse_image_name("out2-frame-0001.png"), None);
        assert_eq!(parse_image_name(""), None);
    }

    #[test]
    fn test_frame_key_round_trip() {
        assert_eq!(frame_key(1), "frame_0001");
        assert_eq!(frame_key(12345), "frame_12345");
        assert_eq!(parse_frame_key("frame_0042"), Some(42));
        assert_eq!(parse_frame_key("frame_x"), None);
        assert_eq!(parse_frame_key("0042"), None);
    }
}
