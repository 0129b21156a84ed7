//! User agent selection.

/// Identifies the crawler; sent unless configured otherwise.
pub const USER_AGENT: &str = concat!(
    "mineralpedia/",
    env!("CARGO_PKG_VERSION"),
    " (mineral reference crawler)"
);

/// Config value that makes plain HTTP requests look like the browser renderer.
pub const IMPERSONATE: &str = "impersonate";

/// Desktop Chrome on Linux, the same engine the browser renderer drives.
const DESKTOP_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Agent for a configured value: unset or blank gives [`USER_AGENT`],
/// [`IMPERSONATE`] gives a desktop Chrome agent, anything else is sent as is.
pub fn resolve_user_agent(config: Option<&str>) -> &str {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT,
        Some(IMPERSONATE) => DESKTOP_CHROME,
        Some(custom) => custom,
    }
}
