//! Minimal selector engine used by free-form selector lookups
//!
//! Supported grammar:
//!
//! ```text
//! list      := complex ( ',' complex )*
//! complex   := compound ( combinator compound )*
//! combinator:= whitespace | '>'
//! compound  := ( tag | '*' )? ( '#' ident | '.' ident | '[' ident ( '=' value )? ']' )*
//! value     := ident | quoted string
//! ```

use crate::element::Element;
use crate::error::{LookupError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Hash,
    Dot,
    Star,
    LeftBracket,
    RightBracket,
    Equal,
    Greater,
    Comma,
    Space,
    Eof,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(&mut self) -> Result<Vec<(usize, Token)>> {
        let mut tokens = Vec::new();

        while self.position < self.input.len() {
            let start = self.position;
            let token = self.next_token()?;
            // Whitespace next to an explicit separator is insignificant
            let previous = tokens.last().map(|(_, t): &(usize, Token)| t.clone());
            match (&token, previous.as_ref()) {
                (Token::Space, None) => continue,
                (Token::Space, Some(Token::Greater | Token::Comma | Token::Space)) => continue,
                (Token::Greater | Token::Comma, Some(Token::Space)) => {
                    tokens.pop();
                }
                _ => {}
            }
            tokens.push((start, token));
        }

        if matches!(tokens.last(), Some((_, Token::Space))) {
            tokens.pop();
        }
        tokens.push((self.position, Token::Eof));
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let token = match ch {
            '#' => {
                self.advance();
                Token::Hash
            }
            '.' => {
                self.advance();
                Token::Dot
            }
            '*' => {
                self.advance();
                Token::Star
            }
            '[' => {
                self.advance();
                Token::LeftBracket
            }
            ']' => {
                self.advance();
                Token::RightBracket
            }
            '=' => {
                self.advance();
                Token::Equal
            }
            '>' => {
                self.advance();
                Token::Greater
            }
            ',' => {
                self.advance();
                Token::Comma
            }
            '\'' | '"' => self.read_string()?,
            _ if ch.is_whitespace() => {
                while self.position < self.input.len() && self.current_char().is_whitespace() {
                    self.advance();
                }
                Token::Space
            }
            _ if is_ident_char(ch) => self.read_identifier(),
            _ => {
                return Err(LookupError::Selector {
                    offset: self.position,
                    message: format!("Unexpected character '{}'", ch),
                });
            }
        };

        Ok(token)
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.position;
        let quote = self.current_char();
        self.advance();

        let mut value = String::new();
        while self.position < self.input.len() && self.current_char() != quote {
            value.push(self.current_char());
            self.advance();
        }

        if self.position >= self.input.len() {
            return Err(LookupError::Selector {
                offset: start,
                message: "Unterminated string".to_string(),
            });
        }

        self.advance(); // Skip closing quote
        Ok(Token::Str(value))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while self.position < self.input.len() && is_ident_char(self.current_char()) {
            ident.push(self.current_char());
            self.advance();
        }
        Token::Ident(ident)
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

#[derive(Debug, Clone, PartialEq)]
enum AttributeTest {
    Exists(String),
    Equals(String, String),
}

/// One compound selector such as `div#main.card[name=x]`
#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeTest>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if element.tag_name() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id().as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attributes.iter().all(|test| match test {
            AttributeTest::Exists(name) => element.has_attribute(name),
            AttributeTest::Equals(name, value) => {
                element.attribute(name).as_deref() == Some(value.as_str())
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds joined by combinators, stored right to left
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, element: &Element) -> bool {
        self.subject.matches(element) && Self::match_ancestors(element, &self.ancestors)
    }

    fn match_ancestors(element: &Element, rest: &[(Combinator, Compound)]) -> bool {
        let Some(((combinator, compound), tail)) = rest.split_first() else {
            return true;
        };
        match combinator {
            Combinator::Child => match element.parent() {
                Some(parent) => compound.matches(&parent) && Self::match_ancestors(&parent, tail),
                None => false,
            },
            Combinator::Descendant => {
                let mut current = element.parent();
                while let Some(ancestor) = current {
                    if compound.matches(&ancestor) && Self::match_ancestors(&ancestor, tail) {
                        return true;
                    }
                    current = ancestor.parent();
                }
                false
            }
        }
    }
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = SelectorParser {
            tokens,
            position: 0,
        };
        let alternatives = parser.parse_list()?;
        Ok(Self {
            source: input.to_string(),
            alternatives,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }

    /// Matches among `root` and its descendants, in document order
    pub fn select_all(&self, root: &Element) -> Vec<Element> {
        root.subtree()
            .into_iter()
            .filter(|el| self.matches(el))
            .collect()
    }
}

struct SelectorParser {
    tokens: Vec<(usize, Token)>,
    position: usize,
}

impl SelectorParser {
    fn parse_list(&mut self) -> Result<Vec<Complex>> {
        let mut list = vec![self.parse_complex()?];
        while self.peek() == &Token::Comma {
            self.advance();
            list.push(self.parse_complex()?);
        }
        match self.peek() {
            Token::Eof => Ok(list),
            other => Err(self.error(format!("Unexpected token {:?}", other))),
        }
    }

    fn parse_complex(&mut self) -> Result<Complex> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let combinator = match self.peek() {
                Token::Space => Combinator::Descendant,
                Token::Greater => Combinator::Child,
                _ => break,
            };
            self.advance();
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        let subject = compounds.pop().unwrap_or_default();
        let ancestors = combinators
            .into_iter()
            .rev()
            .zip(compounds.into_iter().rev())
            .collect();
        Ok(Complex { subject, ancestors })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek().clone() {
            Token::Ident(tag) => {
                self.advance();
                compound.tag = Some(tag.to_ascii_lowercase());
                any = true;
            }
            Token::Star => {
                self.advance();
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Token::Hash => {
                    self.advance();
                    compound.id = Some(self.expect_ident()?);
                }
                Token::Dot => {
                    self.advance();
                    compound.classes.push(self.expect_ident()?);
                }
                Token::LeftBracket => {
                    self.advance();
                    let name = self.expect_ident()?;
                    let test = if self.peek() == &Token::Equal {
                        self.advance();
                        let value = match self.peek().clone() {
                            Token::Ident(v) | Token::Str(v) => {
                                self.advance();
                                v
                            }
                            other => {
                                return Err(self.error(format!(
                                    "Expected attribute value, found {:?}",
                                    other
                                )))
                            }
                        };
                        AttributeTest::Equals(name, value)
                    } else {
                        AttributeTest::Exists(name)
                    };
                    if self.peek() != &Token::RightBracket {
                        return Err(self.error("Expected ']'".to_string()));
                    }
                    self.advance();
                    compound.attributes.push(test);
                }
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.error(format!("Expected selector, found {:?}", self.peek())));
        }
        Ok(compound)
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::Ident(ident) => {
                self.advance();
                Ok(ident)
            }
            other => Err(self.error(format!("Expected identifier, found {:?}", other))),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position].1
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, message: String) -> LookupError {
        LookupError::Selector {
            offset: self.tokens[self.position].0,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> (Element, Element, Element, Element) {
        // <html><div id=main class="card wide"><p name=intro/><span class=card/></div></html>
        let root = Element::new("html");
        let div = Element::new("div");
        div.set_attribute_raw("id", "main");
        div.set_attribute_raw("class", "card wide");
        let p = Element::new("p");
        p.set_attribute_raw("name", "intro");
        let span = Element::new("span");
        span.set_attribute_raw("class", "card");
        root.insert_child_raw(&div, None);
        div.insert_child_raw(&p, None);
        div.insert_child_raw(&span, None);
        (root, div, p, span)
    }

    #[test]
    fn test_compound_selectors() {
        let (root, div, p, span) = build();

        let sel = Selector::parse("div#main.card").unwrap();
        assert_eq!(sel.select_all(&root), vec![div.clone()]);

        let sel = Selector::parse(".card").unwrap();
        assert_eq!(sel.select_all(&root), vec![div.clone(), span.clone()]);

        let sel = Selector::parse("[name=intro]").unwrap();
        assert_eq!(sel.select_all(&root), vec![p.clone()]);

        let sel = Selector::parse("[name='intro']").unwrap();
        assert_eq!(sel.select_all(&root), vec![p]);

        let sel = Selector::parse("*").unwrap();
        assert_eq!(sel.select_all(&root).len(), 4);
    }

    #[test]
    fn test_combinators() {
        let (root, div, p, span) = build();

        let sel = Selector::parse("html span").unwrap();
        assert_eq!(sel.select_all(&root), vec![span.clone()]);

        let sel = Selector::parse("html > span").unwrap();
        assert!(sel.select_all(&root).is_empty());

        let sel = Selector::parse("#main>p").unwrap();
        assert_eq!(sel.select_all(&root), vec![p.clone()]);

        let sel = Selector::parse("p, .wide").unwrap();
        assert_eq!(sel.select_all(&root), vec![div, p]);
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let sel = Selector::parse("  div  >  p ,  span  ").unwrap();
        assert_eq!(sel.alternatives.len(), 2);
        assert_eq!(sel.alternatives[0].ancestors.len(), 1);
        assert_eq!(sel.alternatives[0].ancestors[0].0, Combinator::Child);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Selector::parse("div[name"),
            Err(LookupError::Selector { .. })
        ));
        assert!(Selector::parse("div,").is_err());
        assert!(Selector::parse("#").is_err());
        assert!(Selector::parse("a + b").is_err());
        assert!(Selector::parse("[x='open").is_err());
        assert!(Selector::parse("").is_err());
    }
}
