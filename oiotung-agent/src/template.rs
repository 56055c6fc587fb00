//! Placeholder substitution for webhook message templates
//!
//! Placeholders look like `%[token]%` and match case-insensitively. All tokens
//! are resolved in a single pass over the template, so a substituted value is
//! never re-scanned and reserved tokens always win over sub-server tokens.
//! A token is closed by the first `]%` that yields a known key, so sub-server
//! names containing `]%` still resolve.

use std::collections::HashMap;

use crate::codec::StatusResult;

const OPEN: &str = "%[";
const CLOSE: &str = "]%";

/// Alternating decorative token exposed as `%[flash]%`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flash(bool);

impl Flash {
    pub fn token(self) -> &'static str {
        if self.0 {
            ":boar:"
        } else {
            ":pig:"
        }
    }

    pub fn flip(&mut self) {
        self.0 = !self.0;
    }
}

/// Render the online template against a decoded status
pub fn render(template: &str, result: &StatusResult, flash: Flash) -> String {
    let mut values: HashMap<String, String> = HashMap::new();
    values.insert("online".into(), result.online.to_string());
    values.insert("max".into(), result.max.to_string());
    values.insert("flash".into(), flash.token().into());

    for server in &result.servers {
        let name = server.name.to_lowercase();
        let counters = [
            ("offline_queue", server.offline_queue),
            ("deprecated_queue", server.deprecated_queue),
            ("online", server.players),
            ("max", server.cap),
            ("players", server.players),
            ("cap", server.cap),
        ];
        for (suffix, value) in counters {
            values
                .entry(format!("{name}_{suffix}"))
                .or_insert_with(|| value.to_string());
        }
    }

    substitute(template, &values)
}

/// Render the offline template; only `%[flash]%` is substituted
pub fn render_offline(template: &str, flash: Flash) -> String {
    let values = HashMap::from([("flash".to_string(), flash.token().to_string())]);
    substitute(template, &values)
}

/// `values` keys must already be lowercase
fn substitute(template: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        if !after_open.contains(CLOSE) {
            out.push_str(&rest[start..]);
            return out;
        }

        let hit = after_open
            .match_indices(CLOSE)
            .find_map(|(end, _)| values.get(&after_open[..end].to_lowercase()).map(|value| (end, value)));

        match hit {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                // A later `%[` inside this span may still open a real token
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SubServer;

    fn status(online: u16, max: u16, servers: Vec<SubServer>) -> StatusResult {
        StatusResult { online, max, servers }
    }

    fn server(name: &str, offline_queue: u16, deprecated_queue: u16, players: u16, cap: u16) -> SubServer {
        SubServer {
            name: name.into(),
            offline_queue,
            deprecated_queue,
            players,
            cap,
        }
    }

    #[test]
    fn test_global_counters() {
        let out = render("online: %[online]%/%[max]%", &status(42, 100, vec![]), Flash::default());
        assert_eq!(out, "online: 42/100");
    }

    #[test]
    fn test_server_counters() {
        let result = status(3, 10, vec![server("lobby", 1, 2, 3, 10)]);
        assert_eq!(render("%[lobby_players]%/%[lobby_max]%", &result, Flash::default()), "3/10");
        assert_eq!(render("%[lobby_online]%/%[lobby_cap]%", &result, Flash::default()), "3/10");
        assert_eq!(
            render("%[lobby_offline_queue]% %[lobby_deprecated_queue]%", &result, Flash::default()),
            "1 2"
        );
    }

    #[test]
    fn test_case_insensitive() {
        let result = status(5, 6, vec![server("Lobby", 0, 0, 7, 8)]);
        let out = render("%[ONLINE]% %[Max]% %[LOBBY_online]% %[lobby_MAX]%", &result, Flash::default());
        assert_eq!(out, "5 6 7 8");
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let template = r#"{"content":"nothing to see, 100% [sure]"}"#;
        assert_eq!(render(template, &status(1, 2, vec![]), Flash::default()), template);
        assert_eq!(render_offline(template, Flash::default()), template);
    }

    #[test]
    fn test_unknown_tokens_stay_verbatim() {
        let out = render("%[nope]% %[online]% %[unterminated", &status(9, 9, vec![]), Flash::default());
        assert_eq!(out, "%[nope]% 9 %[unterminated");
    }

    #[test]
    fn test_token_after_unmatched_open() {
        let out = render("%[x%[online]%", &status(4, 4, vec![]), Flash::default());
        assert_eq!(out, "%[x4");
    }

    #[test]
    fn test_server_named_like_reserved_token() {
        let result = status(1, 2, vec![server("flash", 0, 0, 50, 60)]);
        let out = render("%[flash]% %[flash_online]% %[online]%", &result, Flash::default());
        assert_eq!(out, ":pig: 50 1");
    }

    #[test]
    fn test_server_name_containing_close_marker() {
        let result = status(1, 2, vec![server("a]%b", 0, 0, 7, 9)]);
        let out = render("%[a]%b_online]%/%[A]%B_max]% %[online]%", &result, Flash::default());
        assert_eq!(out, "7/9 1");
    }

    #[test]
    fn test_shortest_known_token_wins() {
        let result = status(3, 4, vec![server("online]% x", 0, 0, 8, 8)]);
        assert_eq!(render("%[online]% x_max]%", &result, Flash::default()), "3 x_max]%");
    }

    #[test]
    fn test_duplicate_server_names_keep_first() {
        let result = status(0, 0, vec![server("hub", 0, 0, 1, 2), server("HUB", 0, 0, 3, 4)]);
        assert_eq!(render("%[hub_online]%", &result, Flash::default()), "1");
    }

    #[test]
    fn test_flash_alternates() {
        let mut flash = Flash::default();
        let first = render_offline("%[flash]%", flash);
        flash.flip();
        let second = render_offline("%[flash]%", flash);
        assert_ne!(first, second);
        assert_eq!(first, ":pig:");
        assert_eq!(second, ":boar:");
        flash.flip();
        assert_eq!(render_offline("%[FLASH]%", flash), first);
    }

    #[test]
    fn test_offline_ignores_counters() {
        let out = render_offline("%[online]% %[flash]%", Flash::default());
        assert_eq!(out, "%[online]% :pig:");
    }
}
