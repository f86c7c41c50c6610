/// Display color for a track id, as `[r, g, b]`.
///
/// The same id always maps to the same color, so renderers can keep a
/// track's color across frames without storing it.
pub fn track_color(track_id: u64) -> [u8; 3] {
    // Reduced mod 255 first so large ids cannot overflow.
    let k = (track_id % 255 + 3) % 255;
    [
        (37 * k % 255) as u8,
        (17 * k % 255) as u8,
        (23 * k % 255) as u8,
    ]
}
