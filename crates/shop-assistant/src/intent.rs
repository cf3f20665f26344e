//! Find-and-add intent detection
//!
//! Pure string rules, no model involved.

use agent_core::Message;

const FIND_WORDS: [&str; 2] = ["find", "search"];
const ADD_PHRASES: [&str; 2] = ["add to cart", "add it"];

/// True if a user message asks to find a product and put it in the cart.
///
/// Non-user messages never match.
pub fn classify(message: &Message) -> bool {
    match message {
        Message::User { content } => is_find_and_add(content),
        _ => false,
    }
}

pub fn is_find_and_add(text: &str) -> bool {
    let text = text.to_lowercase();
    FIND_WORDS.iter().any(|w| text.contains(w)) && ADD_PHRASES.iter().any(|p| text.contains(p))
}

/// Search query implied by a find-and-add message.
///
/// Lowercases, keeps the text before the first `" and "`, removes the first
/// `find` or `search for` together with the whitespace after it, and trims.
pub fn derive_query(text: &str) -> String {
    let text = text.to_lowercase();
    let head = text.split(" and ").next().unwrap_or_default();

    match find_verb(head) {
        Some((start, end)) => {
            let rest = head[end..].trim_start();
            format!("{}{rest}", &head[..start]).trim().to_string()
        }
        None => head.trim().to_string(),
    }
}

/// Byte range of the leftmost `find` or `search <ws> for`
fn find_verb(text: &str) -> Option<(usize, usize)> {
    text.char_indices().find_map(|(i, _)| {
        let rest = &text[i..];
        if rest.starts_with("find") {
            return Some((i, i + "find".len()));
        }
        let after = rest.strip_prefix("search")?;
        let gap = after.len() - after.trim_start().len();
        (gap > 0 && after[gap..].starts_with("for"))
            .then(|| (i, i + "search".len() + gap + "for".len()))
    })
}
