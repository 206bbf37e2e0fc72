use crate::tally_browser::stealth::StealthProfile;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
    pub timezone: String,
}

impl Default for UserAgentProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            viewport: (1920, 1080),
            platform: "Win32".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            timezone: "America/New_York".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
/// Maintains a small pool of plausible desktop fingerprint profiles.
///
/// One profile is pinned per browser session so the user agent passed on the
/// command line and the one reported by page scripts never disagree.
pub struct UserAgentManager {
    desktop_profiles: Vec<UserAgentProfile>,
    current_session_profile: Option<UserAgentProfile>,
}

impl Default for UserAgentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentManager {
    /// Create a new manager with built-in desktop profiles.
    pub fn new() -> Self {
        Self {
            desktop_profiles: vec![
                UserAgentProfile::default(),
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1440, 900),
                    platform: "MacIntel".to_string(),
                    languages: vec!["en-US".to_string(), "en".to_string()],
                    timezone: "America/Los_Angeles".to_string(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1366, 768),
                    platform: "Linux x86_64".to_string(),
                    languages: vec!["en-US".to_string(), "en".to_string()],
                    timezone: "America/Chicago".to_string(),
                },
            ],
            current_session_profile: None,
        }
    }

    /// Get (or lazily select) the current session profile.
    ///
    /// `Lightweight` sessions always use the first profile; the others pick
    /// one at random.
    pub fn session_profile(&mut self, stealth: &StealthProfile) -> UserAgentProfile {
        if let Some(p) = &self.current_session_profile {
            return p.clone();
        }
        let picked = match stealth {
            StealthProfile::Lightweight => self.desktop_profiles.first().cloned(),
            _ => self
                .desktop_profiles
                .choose(&mut rand::thread_rng())
                .cloned(),
        }
        .unwrap_or_default();
        self.current_session_profile = Some(picked.clone());
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_profile_is_pinned() {
        let mut manager = UserAgentManager::new();
        let first = manager.session_profile(&StealthProfile::Maximum);
        for _ in 0..10 {
            assert_eq!(manager.session_profile(&StealthProfile::Maximum), first);
        }
    }

    #[test]
    fn lightweight_uses_the_default_profile() {
        let mut manager = UserAgentManager::new();
        assert_eq!(
            manager.session_profile(&StealthProfile::Lightweight),
            UserAgentProfile::default()
        );
    }
}
