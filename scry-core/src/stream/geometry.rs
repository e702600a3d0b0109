//! Coordinate translation between viewport, stream, and screen space.
//!
//! The streamer always transmits a fixed canonical geometry, so both
//! sides can translate coordinates without negotiating: the controller
//! maps viewport clicks into stream space, the streamer maps stream
//! coordinates onto its real screen.

/// Map a click inside a letterboxed viewport back to stream space.
///
/// The `remote_width × remote_height` image is scaled uniformly by
/// `s = min(canvas_w/remote_w, canvas_h/remote_h)` and centered in the
/// `canvas_width × canvas_height` viewport. Clicks that land in the
/// letterbox bars are dropped (`None`).
pub fn viewport_to_stream(
    cx: i32,
    cy: i32,
    canvas_width: u32,
    canvas_height: u32,
    remote_width: u32,
    remote_height: u32,
) -> Option<(i32, i32)> {
    if canvas_width == 0 || canvas_height == 0 || remote_width == 0 || remote_height == 0 {
        return None;
    }

    let scale = f64::min(
        canvas_width as f64 / remote_width as f64,
        canvas_height as f64 / remote_height as f64,
    );
    let scaled_w = remote_width as f64 * scale;
    let scaled_h = remote_height as f64 * scale;
    let offset_x = (canvas_width as f64 - scaled_w) / 2.0;
    let offset_y = (canvas_height as f64 - scaled_h) / 2.0;

    let fx = cx as f64 - offset_x;
    let fy = cy as f64 - offset_y;
    if fx < 0.0 || fy < 0.0 || fx >= scaled_w || fy >= scaled_h {
        return None;
    }

    let rx = (fx / scale) as i32;
    let ry = (fy / scale) as i32;
    Some((
        rx.min(remote_width as i32 - 1),
        ry.min(remote_height as i32 - 1),
    ))
}

/// Scale a stream-space coordinate onto the real screen.
///
/// Plain proportional scaling — the stream frame covers the whole
/// screen, so no letterboxing is involved on this side.
pub fn stream_to_screen(
    x: i32,
    y: i32,
    stream_width: u32,
    stream_height: u32,
    screen_width: u32,
    screen_height: u32,
) -> (i32, i32) {
    let sx = x as i64 * screen_width as i64 / stream_width.max(1) as i64;
    let sy = y as i64 * screen_height as i64 / stream_height.max(1) as i64;
    (sx as i32, sy as i32)
}
