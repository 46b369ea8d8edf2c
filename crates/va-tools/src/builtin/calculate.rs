//! `calculate` — evaluates a small arithmetic expression. Pure, no shell-out.

use serde_json::Value;

use va_domain::{CancelToken, ToolDefinition};

use crate::registry::{Tool, ToolOutcome};

pub struct CalculateTool;

#[async_trait::async_trait]
impl Tool for CalculateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculate".into(),
            description: "Evaluates an arithmetic expression (+, -, *, /, parentheses) and returns the numeric result.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "expression": {"type": "string", "description": "e.g. '(2 + 3) * 4'"}
                },
                "required": ["expression"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _cancel: CancelToken) -> ToolOutcome {
        let Some(expr) = arguments.get("expression").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing required field 'expression'");
        };

        match evaluate(expr) {
            Ok(result) => ToolOutcome::ok(format!("{result}")),
            Err(e) => ToolOutcome::error(format!("could not evaluate '{expr}': {e}")),
        }
    }
}

/// Evaluate a small arithmetic expression: `+ - * / ( )` and floats.
fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let result = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input".into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Num(n));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".into());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some(Token::Num(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            _ => Err("expected a number or '('".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
    }

    #[test]
    fn evaluates_parentheses() {
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn division_by_zero_is_error() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn negative_numbers() {
        assert_eq!(evaluate("-5 + 2").unwrap(), -3.0);
    }

    #[tokio::test]
    async fn missing_expression_is_error() {
        let outcome = CalculateTool
            .invoke(serde_json::json!({}), CancelToken::new())
            .await;
        assert!(outcome.is_error);
    }

    #[tokio::test]
    async fn tool_invoke_roundtrip() {
        let outcome = CalculateTool
            .invoke(serde_json::json!({"expression": "10 / 2"}), CancelToken::new())
            .await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.text, "5");
    }
}
