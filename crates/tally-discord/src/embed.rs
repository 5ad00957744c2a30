//! Embed colours and the small builders every command shares.

use serenity::builder::{CreateEmbed, CreateEmbedFooter};

pub const WORKING: u32 = 0xffaa00;
pub const ERROR: u32 = 0xff470f;
pub const SUCCESS: u32 = 0x43b581;
pub const NEUTRAL: u32 = 0x00b1ff;

/// Zero-width space; Discord rejects empty field values.
pub const BLANK: &str = "\u{200b}";

/// Plain status embed: title, description and an "Executed by" footer.
pub fn status(colour: u32, title: &str, description: &str, executed_by: &str) -> CreateEmbed {
    CreateEmbed::new()
        .colour(colour)
        .title(title)
        .description(description)
        .footer(CreateEmbedFooter::new(executed_by_footer(executed_by)))
}

pub fn executed_by_footer(tag: &str) -> String {
    format!("Executed by {tag}")
}

/// Wrap `text` in inline code, or `None` when there is nothing to show.
pub fn code_or_none(text: &str) -> String {
    if text.is_empty() {
        "None".to_string()
    } else {
        format!("`{text}`")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_or_none_formats() {
        assert_eq!(code_or_none(""), "None");
        assert_eq!(code_or_none("A-B"), "`A-B`");
    }

    #[test]
    fn footer_text() {
        assert_eq!(executed_by_footer("someone"), "Executed by someone");
    }
}
