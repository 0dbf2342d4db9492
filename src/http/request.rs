//! Request inspection.

const USER_AGENT_PREFIX: &str = "User-Agent:";

/// Value of the first `User-Agent:` header line, trimmed.
///
/// The prefix match is case-insensitive. A missing header yields `""`,
/// which the request guard treats as no signal.
pub fn extract_user_agent(request: &str) -> &str {
    request
        .split('\n')
        .find_map(|line| {
            let prefix = line.get(..USER_AGENT_PREFIX.len())?;
            prefix
                .eq_ignore_ascii_case(USER_AGENT_PREFIX)
                .then(|| line[USER_AGENT_PREFIX.len()..].trim())
        })
        .unwrap_or("")
}
