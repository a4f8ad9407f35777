use super::event::{LogEvent, LogLevel};
use super::glob::glob_match;

/// One ordered matcher rule (spec §4.5). `category` is `None` when the rule
/// has no `category` key (matches every category).
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub category: Option<String>,
    pub level: LogLevel,
}

impl MatchRule {
    pub fn new(category: Option<String>, level: LogLevel) -> Self {
        MatchRule { category, level }
    }

    fn category_matches(&self, category: &str) -> bool {
        match &self.category {
            None => true,
            Some(pattern) => glob_match(pattern, category),
        }
    }
}

/// Ordered list of rules; first matching rule wins (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    pub rules: Vec<MatchRule>,
}

impl Matcher {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Matcher { rules }
    }

    /// `true` if `event` should be handed to this handler's formatter/emitter.
    pub fn allows(&self, event: &LogEvent) -> bool {
        for rule in &self.rules {
            if !rule.category_matches(&event.category) {
                continue;
            }
            if rule.level == LogLevel::Off {
                return false;
            }
            if event.level >= rule.level {
                return true;
            }
            // Category matched but level threshold failed: this rule did
            // not match at all (condition (b) failed); keep scanning.
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueMap;

    fn ev(category: &str, level: LogLevel) -> LogEvent {
        LogEvent::new(0, level, category, "f", "file.rs", 1, "msg", ValueMap::new())
    }

    #[test]
    fn no_rules_drops_everything() {
        let m = Matcher::new(vec![]);
        assert!(!m.allows(&ev("ten:runtime", LogLevel::Error)));
    }

    #[test]
    fn first_matching_rule_wins_category_off_then_catch_all_debug() {
        // handler B from spec §8 scenario 4
        let m = Matcher::new(vec![
            MatchRule::new(Some("ten:runtime".into()), LogLevel::Off),
            MatchRule::new(None, LogLevel::Debug),
        ]);
        assert!(!m.allows(&ev("ten:runtime", LogLevel::Fatal)));
        assert!(m.allows(&ev("my_extension", LogLevel::Debug)));
        assert!(!m.allows(&ev("my_extension", LogLevel::Trace)));
    }

    #[test]
    fn category_glob_with_level_threshold() {
        let m = Matcher::new(vec![MatchRule::new(Some("ten:runtime".into()), LogLevel::Info)]);
        assert!(m.allows(&ev("ten:runtime", LogLevel::Warn)));
        assert!(!m.allows(&ev("ten:runtime", LogLevel::Debug)));
        assert!(!m.allows(&ev("other", LogLevel::Fatal)));
    }
}
