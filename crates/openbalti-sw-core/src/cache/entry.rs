use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Response;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(key: &str, response: Response) -> Self {
        Self {
            key: key.to_string(),
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry_aged(minutes: i64) -> CachedEntry {
        let mut entry = CachedEntry::new("https://openbalti.com/", Response::text(200, "OK", ""));
        entry.cached_at = Utc::now() - Duration::minutes(minutes);
        entry
    }

    #[test]
    fn test_age_display_just_now() {
        assert_eq!(entry_aged(0).age_display(), "just now");
        assert_eq!(entry_aged(-5).age_display(), "just now");
    }

    #[test]
    fn test_age_display_rounding() {
        assert_eq!(entry_aged(5).age_display(), "5m ago");
        assert_eq!(entry_aged(89).age_display(), "1h ago");
        assert_eq!(entry_aged(90).age_display(), "2h ago");
        assert_eq!(entry_aged(1440 + 11 * 60).age_display(), "1d ago");
        assert_eq!(entry_aged(1440 + 12 * 60).age_display(), "2d ago");
    }
}
