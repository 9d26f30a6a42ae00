//! Lexical scanner for predicate clauses
//!
//! Turns a clause such as `1.state = 'NY' and 1.quant > 10` into a flat
//! token list. Shapes are tried longest match first: grouping variable
//! attribute reference, quoted string, word, parenthesis, two-character
//! operator, then any other punctuation as a single character.

use std::fmt;

use super::error::{SqlError, SqlResult};

/// A single lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<digits>.<word>`, e.g. `2.quant`
    AttributeRef {
        grouping_var: String,
        attribute: String,
    },
    /// Single-quoted text, quotes removed
    Quoted(String),
    /// Identifier, number or keyword
    Word(String),
    LParen,
    RParen,
    /// Operators and any other punctuation
    Symbol(String),
}

impl Token {
    /// True for a word matching `keyword`, ignoring ASCII case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::AttributeRef {
                grouping_var,
                attribute,
            } => write!(f, "{}.{}", grouping_var, attribute),
            Token::Quoted(s) => write!(f, "'{}'", s),
            Token::Word(w) => write!(f, "{}", w),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Symbol(s) => write!(f, "{}", s),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split a predicate clause into tokens
pub fn tokenize(clause: &str) -> SqlResult<Vec<Token>> {
    let chars: Vec<char> = clause.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if let Some((token, next)) = scan_attribute_ref(&chars, pos) {
            tokens.push(token);
            pos = next;
            continue;
        }

        if c == '\'' {
            if let Some(end) = chars[pos + 1..].iter().position(|&ch| ch == '\'') {
                let text: String = chars[pos + 1..pos + 1 + end].iter().collect();
                tokens.push(Token::Quoted(text));
                pos += end + 2;
                continue;
            }
            // Unterminated quote falls through to single-character punctuation
        }

        if is_word_char(c) {
            let start = pos;
            while pos < chars.len() && is_word_char(chars[pos]) {
                pos += 1;
            }
            tokens.push(Token::Word(chars[start..pos].iter().collect()));
            continue;
        }

        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            _ => {
                let next = chars.get(pos + 1).copied();
                if matches!(c, '=' | '!' | '<' | '>') && next == Some('=') {
                    tokens.push(Token::Symbol(format!("{}=", c)));
                    pos += 2;
                    continue;
                }
                tokens.push(Token::Symbol(c.to_string()));
            }
        }
        pos += 1;
    }

    if tokens.is_empty() {
        return Err(SqlError::NoTokens(clause.to_string()));
    }

    Ok(tokens)
}

/// Try to read `<digits>.<word>` starting at `pos`
fn scan_attribute_ref(chars: &[char], pos: usize) -> Option<(Token, usize)> {
    // Must not start in the middle of a word such as `sum_1`
    if pos > 0 && is_word_char(chars[pos - 1]) {
        return None;
    }

    let mut end = pos;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end == pos || chars.get(end) != Some(&'.') {
        return None;
    }

    let attr_start = end + 1;
    let mut attr_end = attr_start;
    while attr_end < chars.len() && is_word_char(chars[attr_end]) {
        attr_end += 1;
    }
    if attr_end == attr_start {
        return None;
    }

    let token = Token::AttributeRef {
        grouping_var: chars[pos..end].iter().collect(),
        attribute: chars[attr_start..attr_end].iter().collect(),
    };
    Some((token, attr_end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    fn sym(s: &str) -> Token {
        Token::Symbol(s.to_string())
    }

    #[test]
    fn test_tokenize_attribute_comparison() {
        let tokens = tokenize("1.state = 'NY'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::AttributeRef {
                    grouping_var: "1".to_string(),
                    attribute: "state".to_string(),
                },
                sym("="),
                Token::Quoted("NY".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_two_char_operators() {
        let tokens = tokenize("a<=b>=c!=d==e<f").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("a"),
                sym("<="),
                word("b"),
                sym(">="),
                word("c"),
                sym("!="),
                word("d"),
                sym("=="),
                word("e"),
                sym("<"),
                word("f"),
            ]
        );
    }

    #[test]
    fn test_tokenize_parens_without_spaces() {
        let tokens = tokenize("(sum_1_quant+2)%3").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                word("sum_1_quant"),
                sym("+"),
                word("2"),
                Token::RParen,
                sym("%"),
                word("3"),
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_keeps_spaces() {
        let tokens = tokenize("'New York'").unwrap();
        assert_eq!(tokens, vec![Token::Quoted("New York".to_string())]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        let tokens = tokenize("'abc").unwrap();
        assert_eq!(tokens, vec![sym("'"), word("abc")]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(
            tokenize("   "),
            Err(SqlError::NoTokens("   ".to_string()))
        );
    }

    #[test]
    fn test_display_round_trip() {
        let tokens = tokenize("2.quant >= 'x'").unwrap();
        let text: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        assert_eq!(text, vec!["2.quant", ">=", "'x'"]);
    }

    #[test]
    fn test_keyword_case_insensitive() {
        assert!(word("AND").is_keyword("and"));
        assert!(!word("andy").is_keyword("and"));
    }
}
