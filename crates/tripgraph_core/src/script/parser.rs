//! Recursive-descent parser for the scoring language.
//!
//! Precedence, loosest to tightest:
//! `or` < `and` < comparison/`in` < `+ -` < `* / %` < unary < primary.
//! Comparison operators do not chain.

use crate::script::ast::{BinaryOp, Expr, Program, UnaryOp};
use crate::script::lexer::{tokenize, Spanned, Token};
use crate::script::ScriptError;

pub(crate) fn parse_program(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        source_len: source.len(),
    };

    let mut bindings = Vec::new();
    while parser.eat(&Token::Let) {
        let name = parser.expect_ident()?;
        parser.expect(&Token::Assign, "`=`")?;
        let value = parser.expression()?;
        parser.expect(&Token::Semi, "`;`")?;
        bindings.push((name, value));
    }

    let result = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error_at(extra.offset, "unexpected trailing input"));
    }

    Ok(Program { bindings, result })
}

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    source_len: usize,
}

impl Parser {
    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.additive()?;
        let op = match self.peek_token() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::In) => BinaryOp::In,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Not) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let Some(spanned) = self.peek().cloned() else {
            return Err(self.error_at(self.source_len, "unexpected end of input"));
        };

        match spanned.token {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            Token::Text(value) => {
                self.advance();
                Ok(Expr::Text(value))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Flag(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Flag(false))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::If => {
                self.advance();
                let cond = self.expression()?;
                self.expect(&Token::Then, "`then`")?;
                let then_branch = self.expression()?;
                self.expect(&Token::Else, "`else`")?;
                let else_branch = self.expression()?;
                Ok(Expr::If {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                })
            }
            Token::Ident(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::Comma) {
                                continue;
                            }
                            self.expect(&Token::RParen, "`)`")?;
                            break;
                        }
                    }
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            _ => Err(self.error_at(spanned.offset, "expected an expression")),
        }
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|spanned| &spanned.token)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, label: &str) -> Result<(), ScriptError> {
        if self.eat(token) {
            Ok(())
        } else {
            let offset = self.peek().map_or(self.source_len, |s| s.offset);
            Err(self.error_at(offset, &format!("expected {label}")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ScriptError> {
        match self.peek().cloned() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => {
                self.advance();
                Ok(name)
            }
            other => {
                let offset = other.map_or(self.source_len, |s| s.offset);
                Err(self.error_at(offset, "expected an identifier"))
            }
        }
    }

    fn error_at(&self, offset: usize, message: &str) -> ScriptError {
        ScriptError::Parse {
            offset,
            message: message.to_string(),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_program;
    use crate::script::ast::{BinaryOp, Expr};

    #[test]
    fn parses_let_bindings_then_result() {
        let program = parse_program(
            "let rating = attr(\"rating\", 0);\nif rating >= 4.5 then rating else 0",
        )
        .expect("parse");
        assert_eq!(program.bindings.len(), 1);
        assert_eq!(program.bindings[0].0, "rating");
        assert!(matches!(program.result, Expr::If { .. }));
    }

    #[test]
    fn respects_precedence() {
        let program = parse_program("1 + 2 * 3").expect("parse");
        let Expr::Binary { op, rhs, .. } = program.result else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            *rhs,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn parses_membership() {
        let program = parse_program("\"autumn\" in attr(\"seasons\")").expect("parse");
        assert!(matches!(
            program.result,
            Expr::Binary {
                op: BinaryOp::In,
                ..
            }
        ));
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse_program("1 2").is_err());
    }

    #[test]
    fn rejects_missing_else() {
        assert!(parse_program("if true then 1").is_err());
    }
}
