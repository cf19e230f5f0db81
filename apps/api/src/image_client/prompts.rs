// Prompt fragments for illustration requests.

use crate::models::story::Theme;

/// Theme used in prompts when a request carries none.
pub const DEFAULT_PROMPT_THEME: &str = "adventure";

const REFERENCE_PHOTO_INSTRUCTION: &str =
    " The illustration should feature the child from the reference photo in the scene.";

/// Wraps page text in the storybook illustration instruction.
pub fn illustration_prompt(text: &str, theme: Option<&Theme>, has_reference_photo: bool) -> String {
    let theme = theme
        .map(Theme::key)
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| DEFAULT_PROMPT_THEME.to_string());
    let mut prompt = format!(
        "Create a child-friendly, storybook-style illustration that captures the essence of {theme}: {text}"
    );
    if has_reference_photo {
        prompt.push_str(REFERENCE_PHOTO_INSTRUCTION);
    }
    prompt
}

/// Source text for a story cover. Passed through `illustration_prompt` like any page.
pub fn cover_text(child_name: &str, theme: &Theme, custom_prompt: Option<&str>) -> String {
    let extra = custom_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!(" {p}"))
        .unwrap_or_default();
    format!(
        "A magical storybook cover featuring a child named {child_name} embarking on a {} journey.{extra} \
         The scene should be whimsical and enchanting, perfect for a children's bedtime story.",
        theme.key()
    )
}
