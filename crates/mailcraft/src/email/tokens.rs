use crate::email::variables::VariableMap;

/// Token keys beginning with this prefix belong to the delivery provider's own
/// merge syntax (e.g. `{{UNSUBSCRIBE_URL}}`) and must reach the provider
/// untouched; it resolves them at send time.
pub const PROVIDER_RESERVED_PREFIX: &str = "UNSUBSCRIBE";

/// Replace every `{{UPPER_SNAKE_KEY}}` occurrence with the matching variable
/// value. Tokens with no matching key are left verbatim so a deleted variable
/// never breaks an already-written template, and provider-reserved tokens pass
/// through even when a company variable shadows them.
pub fn substitute(input: &str, variables: &VariableMap) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match after_open.find("}}") {
            Some(close) => {
                let key = &after_open[..close];
                if is_token_key(key) {
                    if !is_reserved(key) {
                        if let Some(value) = variables.get(key) {
                            output.push_str(value);
                            rest = &after_open[close + 2..];
                            continue;
                        }
                    }
                    // Reserved or undefined: keep the token verbatim.
                    output.push_str("{{");
                    output.push_str(key);
                    output.push_str("}}");
                    rest = &after_open[close + 2..];
                } else {
                    // Not a token at all; emit the braces and rescan after them.
                    output.push_str("{{");
                    rest = after_open;
                }
            }
            None => {
                output.push_str("{{");
                rest = after_open;
            }
        }
    }

    output.push_str(rest);
    output
}

fn is_reserved(key: &str) -> bool {
    key.starts_with(PROVIDER_RESERVED_PREFIX)
}

fn is_token_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
