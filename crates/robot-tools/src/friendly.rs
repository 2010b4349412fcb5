//! Translation of raw motion errors into user-facing sentences.

/// Keyword-keyed translation table, checked in order; the first matching
/// keyword wins. Keep the more specific keywords first.
const TRANSLATIONS: &[(&str, &str)] = &[
    (
        "charging flap",
        "I can't move while my charging flap is open. Please close it and try again.",
    ),
    (
        "safety",
        "I can't do that right now because a safety check failed.",
    ),
    (
        "obstacle",
        "I stopped because something is blocking my way.",
    ),
    (
        "timeout",
        "That movement took too long, so I stopped it to be safe.",
    ),
    (
        "already in progress",
        "I'm still finishing another movement. Give me a moment.",
    ),
    (
        "busy",
        "I'm still finishing another movement. Give me a moment.",
    ),
    (
        "localiz",
        "I don't know where I am on the map yet. Please run localization first.",
    ),
    (
        "not connected",
        "I'm not connected to my conversation service right now.",
    ),
    (
        "failed to prepare",
        "I couldn't get ready to move. Please try again.",
    ),
    (
        "invalid command",
        "I can't execute that movement; the request is outside my limits.",
    ),
];

const FALLBACK: &str = "Sorry, I couldn't complete that movement.";

/// Turn a raw motion error into a sentence suitable for speaking back to the
/// user. Matching is case-insensitive substring search.
pub fn friendly_motion_error(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    for (keyword, message) in TRANSLATIONS {
        if lowered.contains(keyword) {
            return (*message).to_string();
        }
    }
    FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keywords_translate() {
        assert!(friendly_motion_error("timeout waiting for movement to complete")
            .contains("took too long"));
        assert!(friendly_motion_error("GoTo failed: Obstacle detected ahead")
            .contains("blocking my way"));
        assert!(
            friendly_motion_error("another movement is already in progress")
                .contains("finishing another movement")
        );
        assert!(friendly_motion_error("robot is not localized against a map")
            .contains("where I am on the map"));
        assert!(friendly_motion_error("safety check refused the motion")
            .contains("safety check failed"));
        assert!(friendly_motion_error("the charging flap is open")
            .contains("charging flap"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            friendly_motion_error("TIMEOUT"),
            friendly_motion_error("timeout")
        );
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_sentence() {
        assert_eq!(friendly_motion_error("qi future error 0x42"), FALLBACK);
    }

    #[test]
    fn specific_keywords_win_over_general_ones() {
        // "charging flap open triggers the safety guard" contains both
        // keywords; the flap message is the useful one.
        let message = friendly_motion_error("charging flap open triggers the safety guard");
        assert!(message.contains("charging flap"));
    }
}
