//! User-Agent string sent to OAI-PMH endpoints.

/// Project URL advertised to repository operators.
const PROJECT_UA_URL: &str = "https://github.com/oai-harvester/oai-harvester";

/// User-Agent for harvest requests (tool name, version, contact URL).
#[must_use]
pub(crate) fn harvester_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("oai-harvester/{version} (metadata-harvester; +{PROJECT_UA_URL})")
}
