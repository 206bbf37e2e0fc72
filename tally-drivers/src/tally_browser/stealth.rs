use serde::{Deserialize, Serialize};
use tally_common::StealthLevel;

use super::fingerprint::UserAgentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Levels of stealth applied to the browser session.
pub enum StealthProfile {
    Lightweight,
    Balanced,
    Maximum,
}

impl From<StealthLevel> for StealthProfile {
    fn from(level: StealthLevel) -> Self {
        match level {
            StealthLevel::Lightweight => StealthProfile::Lightweight,
            StealthLevel::Balanced => StealthProfile::Balanced,
            StealthLevel::Maximum => StealthProfile::Maximum,
        }
    }
}

/// Construct Chrome command-line arguments for a given stealth profile
/// and fingerprint.
pub fn build_stealth_arguments(
    profile: &StealthProfile,
    user_profile: &UserAgentProfile,
    headless: bool,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-notifications".to_string(),
        "--disable-popup-blocking".to_string(),
        format!("--user-agent={}", user_profile.user_agent),
        format!(
            "--window-size={},{}",
            user_profile.viewport.0, user_profile.viewport.1
        ),
        format!("--lang={}", user_profile.languages.join(",")),
    ];
    if matches!(profile, StealthProfile::Maximum) {
        args.push("--disable-plugins-discovery".to_string());
    }
    if headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// JavaScript evasions applied after each navigation to reduce automation signals.
pub struct StealthScripts;

impl StealthScripts {
    pub fn get_core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }

    pub fn get_webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }

    pub fn get_canvas_evasions() -> &'static str {
        r#"
            const getContext = HTMLCanvasElement.prototype.getContext;
            HTMLCanvasElement.prototype.getContext = function(type,...args){
                const ctx = getContext.call(this,type,...args);
                if(type==='2d' && ctx) {
                    const origToDataURL=this.toDataURL;
                    this.toDataURL=function(...a){
                        const imgdata=ctx.getImageData(0,0,this.width,this.height);
                        for(let i=0;i<imgdata.data.length;i+=4){
                            if(Math.random()<0.001)imgdata.data[i]+=Math.random()<0.5?-1:1;
                        }
                        ctx.putImageData(imgdata,0,0);
                        return origToDataURL.call(this,...a);
                    };
                }
                return ctx;
            };
        "#
    }

    /// Override `navigator.platform` to match the pinned session profile.
    pub fn platform_override(platform: &str) -> String {
        let quoted = serde_json::to_string(platform).unwrap_or_else(|_| "\"\"".to_string());
        format!("Object.defineProperty(navigator, 'platform', {{ get: () => {quoted} }});")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_flags_are_appended() {
        let ua = UserAgentProfile::default();
        let args = build_stealth_arguments(&StealthProfile::Balanced, &ua, true);
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
        assert!(!args.iter().any(|a| a == "--disable-plugins-discovery"));
    }

    #[test]
    fn maximum_adds_extra_hardening() {
        let ua = UserAgentProfile::default();
        let args = build_stealth_arguments(&StealthProfile::Maximum, &ua, false);
        assert!(args.iter().any(|a| a == "--disable-plugins-discovery"));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn platform_override_quotes_value() {
        let js = StealthScripts::platform_override("Mac'Intel");
        assert!(js.contains(r#""Mac'Intel""#));
    }

    #[test]
    fn levels_map_onto_profiles() {
        assert_eq!(
            StealthProfile::from(StealthLevel::Maximum),
            StealthProfile::Maximum
        );
        assert_eq!(
            StealthProfile::from(StealthLevel::default()),
            StealthProfile::Balanced
        );
    }
}
