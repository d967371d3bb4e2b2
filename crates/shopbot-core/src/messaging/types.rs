use serde::{Deserialize, Serialize};

pub const MAX_BUTTONS: usize = 3;
pub const MAX_BUTTON_TITLE_LEN: usize = 20;
pub const MAX_LIST_BUTTON_LEN: usize = 20;
pub const MAX_ROW_TITLE_LEN: usize = 24;
pub const MAX_ROW_DESCRIPTION_LEN: usize = 72;

/// Inbound message after webhook normalization.
///
/// `text` is what the customer "said"; `selection_id` carries the id of a
/// tapped reply button or list row when there was one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub text: String,
    pub selection_id: Option<String>,
}

impl InboundMessage {
    pub fn text(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            selection_id: None,
        }
    }

    pub fn selection(
        from: impl Into<String>,
        title: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            text: title.into(),
            selection_id: Some(id.into()),
        }
    }
}

/// Interactive reply button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    pub fn new(id: impl Into<String>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: truncate_chars(title, MAX_BUTTON_TITLE_LEN),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: &str, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: truncate_chars(title, MAX_ROW_TITLE_LEN),
            description: description.map(|d| truncate_chars(&d, MAX_ROW_DESCRIPTION_LEN)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

/// Cut `s` to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_titles_are_cut_on_char_boundaries() {
        let b = Button::new("cart_add_more", "✅ Sí, agregar más productos ahora");
        assert_eq!(b.title.chars().count(), MAX_BUTTON_TITLE_LEN);
        assert!(b.title.starts_with("✅ Sí"));
    }

    #[test]
    fn short_titles_are_untouched() {
        let row = ListRow::new("product_1", "Gorra", Some("$45.000".into()));
        assert_eq!(row.title, "Gorra");
        assert_eq!(row.description.as_deref(), Some("$45.000"));
    }
}
