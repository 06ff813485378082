//! User-Agent assembly for RPC clients.
//!
//! The daemon identifies clients by a space-separated token list of
//! `name/version` pairs followed by the host platform and architecture,
//! e.g. `myapp/2.1.0 junction-client/0.1.0 linux x86_64`. Duplicate tokens
//! are removed, keeping the first occurrence.

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the User-Agent string for a client connection.
///
/// `app` tokens (usually `name/version`) lead; the client library token and
/// the platform/architecture tokens are appended.
pub fn build<I, S>(app: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |token: &str| {
        let token = token.trim();
        if !token.is_empty() && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    };

    for token in app {
        for part in token.as_ref().split_whitespace() {
            push(part);
        }
    }
    push(&format!("junction-client/{CLIENT_VERSION}"));
    push(std::env::consts::OS);
    push(std::env::consts::ARCH);

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_tokens_lead_and_the_stack_tokens_follow() {
        let ua = build(["myapp/2.1.0"]);
        let tokens: Vec<&str> = ua.split(' ').collect();
        assert_eq!(tokens[0], "myapp/2.1.0");
        assert_eq!(tokens[1], format!("junction-client/{CLIENT_VERSION}"));
        assert!(tokens.contains(&std::env::consts::OS));
        assert!(tokens.contains(&std::env::consts::ARCH));
    }

    #[test]
    fn duplicate_tokens_are_removed_keeping_the_first() {
        let ua = build(["a/1 b/2 a/1", "b/2"]);
        let tokens: Vec<&str> = ua.split(' ').collect();
        assert_eq!(tokens.iter().filter(|t| **t == "a/1").count(), 1);
        assert_eq!(tokens.iter().filter(|t| **t == "b/2").count(), 1);
        assert_eq!(&tokens[..2], &["a/1", "b/2"]);
    }

    #[test]
    fn empty_app_still_identifies_the_client() {
        let ua = build(Vec::<String>::new());
        assert!(ua.starts_with("junction-client/"));
    }
}
