//! Anti-detection configuration for headless sessions.
//!
//! This module provides:
//! - The fixed set of fingerprint options a session is opened with
//! - The injection script that spoofs navigator/WebGL surfaces
//!
//! The pipeline forwards these values opaquely at session creation and never
//! interprets them; tuning happens here and nowhere else.

/// Fingerprint options applied to every fresh browser session.
///
/// Defaults match the profile the target site is served to: a Russian-locale
/// desktop Chrome on Windows with an Intel GPU.
#[derive(Debug, Clone)]
pub struct StealthConfig {
    pub languages: &'static [&'static str],
    pub vendor: &'static str,
    pub platform: &'static str,
    pub webgl_vendor: &'static str,
    pub renderer: &'static str,
    pub fix_hairline: bool,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            languages: &["ru-RU", "ru"],
            vendor: "Google Inc.",
            platform: "Win32",
            webgl_vendor: "Intel Inc.",
            renderer: "Intel Iris OpenGL Engine",
            fix_hairline: true,
        }
    }
}

impl StealthConfig {
    /// Accept-Language header value derived from the spoofed language list.
    pub fn accept_language(&self) -> String {
        self.languages.join(",")
    }
}

// Script template; __TOKENS__ are substituted per session so the spoofed
// values always agree with the active StealthConfig.
const STEALTH_TEMPLATE: &str = r#"
    // ========================================================================
    // Unmasking: remove the automation marker
    // ========================================================================
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
    });

    // ========================================================================
    // Navigator surface: languages / vendor / platform
    // ========================================================================
    Object.defineProperty(navigator, 'languages', {
        get: () => [__LANGUAGES__],
    });
    Object.defineProperty(navigator, 'vendor', {
        get: () => '__VENDOR__',
    });
    Object.defineProperty(navigator, 'platform', {
        get: () => '__PLATFORM__',
    });

    // ========================================================================
    // Chrome runtime mock (headless builds ship without window.chrome)
    // ========================================================================
    window.chrome = {
        runtime: {
            connect: function() {
                return {
                    onMessage: { addListener: function() {}, removeListener: function() {} },
                    postMessage: function() {},
                    disconnect: function() {}
                };
            },
            sendMessage: function() {},
            onMessage: { addListener: function() {}, removeListener: function() {} }
        },
        app: { isInstalled: false },
        csi: function() {},
        loadTimes: function() { return { navigationType: 'Other', connectionInfo: 'h2' }; }
    };

    // ========================================================================
    // Permission mock (headless reports 'prompt' for everything)
    // ========================================================================
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );

    // ========================================================================
    // Plugin spoof (empty PluginArray is a headless tell)
    // ========================================================================
    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const pdf = {
                0: { type: 'application/x-google-chrome-pdf', suffixes: 'pdf', description: 'Portable Document Format' },
                description: 'Portable Document Format',
                filename: 'internal-pdf-viewer',
                length: 1,
                name: 'Chrome PDF Plugin'
            };
            const p = [pdf, pdf, pdf];
            Object.setPrototypeOf(p, PluginArray.prototype);
            return p;
        }
    });

    // ========================================================================
    // WebGL vendor/renderer spoof
    // ========================================================================
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(parameter) {
        // UNMASKED_VENDOR_WEBGL
        if (parameter === 37445) return '__WEBGL_VENDOR__';
        // UNMASKED_RENDERER_WEBGL
        if (parameter === 37446) return '__RENDERER__';
        return getParameter.apply(this, [parameter]);
    };
"#;

// Modernizr's hairline probe measures a zero-height div; headless Chrome
// reports 0 where real Chrome reports 1.
const HAIRLINE_FIX: &str = r#"
    // ========================================================================
    // Hairline rendering quirk fix
    // ========================================================================
    const elementDescriptor = Object.getOwnPropertyDescriptor(HTMLElement.prototype, 'offsetHeight');
    Object.defineProperty(HTMLDivElement.prototype, 'offsetHeight', {
        ...elementDescriptor,
        get: function() {
            if (this.id === 'modernizr') { return 1; }
            return elementDescriptor.get.apply(this);
        },
    });
"#;

/// Render the injection script for one session. Runs before any page script
/// via `Page.addScriptToEvaluateOnNewDocument`.
pub fn build_stealth_script(config: &StealthConfig) -> String {
    let languages = config
        .languages
        .iter()
        .map(|lang| format!("'{lang}'"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut script = STEALTH_TEMPLATE
        .replace("__LANGUAGES__", &languages)
        .replace("__VENDOR__", config.vendor)
        .replace("__PLATFORM__", config.platform)
        .replace("__WEBGL_VENDOR__", config.webgl_vendor)
        .replace("__RENDERER__", config.renderer);

    if config.fix_hairline {
        script.push_str(HAIRLINE_FIX);
    }

    script
}
