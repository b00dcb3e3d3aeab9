//! Localized reminder text.

use crate::domain::models::Language;

pub fn notification_title(language: Language, name: &str) -> String {
    match language {
        Language::El => format!("🎉 Γιορτάζει: {name}"),
        Language::En => format!("🎉 Celebrating: {name}"),
    }
}

pub fn notification_body(language: Language, name: &str, days_before: u32) -> String {
    match (language, days_before) {
        (Language::El, 0) => format!("Σήμερα γιορτάζει {name}! Μην ξεχάσετε να ευχηθείτε!"),
        (Language::En, 0) => format!("{name} is celebrating today! Don't forget to wish them!"),
        (Language::El, 1) => format!("Αύριο γιορτάζει {name}!"),
        (Language::En, 1) => format!("{name} is celebrating tomorrow!"),
        (Language::El, days) => format!("{name} γιορτάζει σε {days} μέρες!"),
        (Language::En, days) => format!("{name} is celebrating in {days} days!"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_match_both_languages() {
        assert_eq!(notification_title(Language::El, "Μαρία"), "🎉 Γιορτάζει: Μαρία");
        assert_eq!(notification_title(Language::En, "Maria"), "🎉 Celebrating: Maria");
    }

    #[test]
    fn body_varies_with_offset() {
        assert_eq!(
            notification_body(Language::En, "Maria", 0),
            "Maria is celebrating today! Don't forget to wish them!"
        );
        assert_eq!(
            notification_body(Language::El, "Μαρία", 0),
            "Σήμερα γιορτάζει Μαρία! Μην ξεχάσετε να ευχηθείτε!"
        );
        assert_eq!(notification_body(Language::En, "Maria", 1), "Maria is celebrating tomorrow!");
        assert_eq!(notification_body(Language::El, "Μαρία", 1), "Αύριο γιορτάζει Μαρία!");
        assert_eq!(
            notification_body(Language::En, "Maria", 7),
            "Maria is celebrating in 7 days!"
        );
        assert_eq!(notification_body(Language::El, "Μαρία", 14), "Μαρία γιορτάζει σε 14 μέρες!");
    }
}
