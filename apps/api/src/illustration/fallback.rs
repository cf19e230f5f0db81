//! Static theme-keyed illustrations served when the provider is quota-limited.

use crate::models::story::Theme;

const ADVENTURE: &str = "https://images.unsplash.com/photo-1519074069444-1ba4fff66d16?q=80&w=1024";
const SAFARI: &str = "https://images.unsplash.com/photo-1516426122078-c23e76319801?q=80&w=1024";
const FRIENDSHIP: &str = "https://images.unsplash.com/photo-1591035897819-f4bdf739f446?q=80&w=1024";
const KINDNESS: &str = "https://images.unsplash.com/photo-1516589178581-6cd7833ae3b2?q=80&w=1024";
const DEFAULT: &str = "https://images.unsplash.com/photo-1606819717115-9159c900370b?q=80&w=1024";

/// Fallback illustration for a theme; free-text or missing themes get the default.
pub fn fallback_image(theme: Option<&Theme>) -> &'static str {
    match theme {
        Some(Theme::Adventure) => ADVENTURE,
        Some(Theme::Safari) => SAFARI,
        Some(Theme::Friendship) => FRIENDSHIP,
        Some(Theme::Kindness) => KINDNESS,
        Some(Theme::Custom(_)) | None => DEFAULT,
    }
}
