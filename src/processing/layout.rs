/// Largest size with the source aspect ratio that fits inside the canvas.
///
/// Small images are enlarged; nothing collapses below one pixel.
pub fn fit_within(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f64;
    let ih = src_h.max(1) as f64;
    let cw = canvas_w.max(1) as f64;
    let ch = canvas_h.max(1) as f64;
    let scale = (cw / iw).min(ch / ih);
    let scale = if scale.is_finite() { scale } else { 1.0 };
    let w = (iw * scale).floor().clamp(1.0, cw);
    let h = (ih * scale).floor().clamp(1.0, ch);
    (w as u32, h as u32)
}

/// Scale both dimensions by `factor`, never below one pixel.
pub fn scaled_extent(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let w = ((width as f64) * factor).floor().max(1.0) as u32;
    let h = ((height as f64) * factor).floor().max(1.0) as u32;
    (w.min(width.max(1)), h.min(height.max(1)))
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}
