use std::collections::HashMap;

/// Split a command line on unescaped whitespace, treating single- or
/// double-quoted spans as single tokens. Quotes are consumed, never
/// included in the token. Every interpreter goes through this so quoting
/// behaves identically system-wide.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => {
                    if let Some(&next) = chars.peek() {
                        current.push(next);
                        chars.next();
                        in_token = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Expand `$VAR` and `${VAR}` against an env map. Runs on the raw line
/// before tokenization, same as a real shell. Unknown variables expand to
/// the empty string.
pub fn expand_vars(line: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_single = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_single = !in_single;
            out.push(c);
            continue;
        }
        if c != '$' || in_single {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for nc in chars.by_ref() {
                    if nc == '}' {
                        break;
                    }
                    name.push(nc);
                }
                if let Some(v) = env.get(&name) {
                    out.push_str(v);
                }
            }
            Some(&p) if p.is_ascii_alphabetic() || p == '_' => {
                let mut name = String::new();
                while let Some(&nc) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || nc == '_' {
                        name.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(v) = env.get(&name) {
                    out.push_str(v);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        assert_eq!(tokenize("kubectl get pods"), vec!["kubectl", "get", "pods"]);
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(tokenize("  ls   -l  "), vec!["ls", "-l"]);
    }

    #[test]
    fn test_double_quotes() {
        assert_eq!(
            tokenize("echo \"hello world\" done"),
            vec!["echo", "hello world", "done"]
        );
    }

    #[test]
    fn test_single_quotes() {
        assert_eq!(tokenize("grep 'a b' file"), vec!["grep", "a b", "file"]);
    }

    #[test]
    fn test_empty_quoted_token() {
        assert_eq!(tokenize("echo ''"), vec!["echo", ""]);
    }

    #[test]
    fn test_adjacent_quotes_merge() {
        assert_eq!(tokenize("echo 'a'\"b\""), vec!["echo", "ab"]);
    }

    #[test]
    fn test_backslash_escape() {
        assert_eq!(tokenize("echo a\\ b"), vec!["echo", "a b"]);
    }

    #[test]
    fn test_expand_simple() {
        let mut env = HashMap::new();
        env.insert("NS".to_string(), "default".to_string());
        assert_eq!(
            expand_vars("kubectl get pods -n $NS", &env),
            "kubectl get pods -n default"
        );
    }

    #[test]
    fn test_expand_braced() {
        let mut env = HashMap::new();
        env.insert("HOME".to_string(), "/home/user".to_string());
        assert_eq!(expand_vars("ls ${HOME}/x", &env), "ls /home/user/x");
    }

    #[test]
    fn test_expand_unknown_is_empty() {
        let env = HashMap::new();
        assert_eq!(expand_vars("echo $NOPE!", &env), "echo !");
    }

    #[test]
    fn test_single_quotes_block_expansion() {
        let mut env = HashMap::new();
        env.insert("A".to_string(), "x".to_string());
        assert_eq!(expand_vars("echo '$A'", &env), "echo '$A'");
    }
}
