//! Lexer/parser/evaluator for the tiny arithmetic statement language used
//! by the `pnnx.Expression` kernel: `add`/`mul` composed over `@k` input
//! references, e.g. `mul(add(@0,@1), add(@2,@3))`.

mod token;

pub use token::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum PostfixNode {
    /// Reference to input index `k` (the `@k` leaf).
    Input(usize),
    Add,
    Mul,
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Input(usize),
    Add(Box<Ast>, Box<Ast>),
    Mul(Box<Ast>, Box<Ast>),
}

/// Lexes, parses, and flattens an expression statement to postfix (RPN)
/// order in one call. Any malformed statement is fatal: this runs once at
/// kernel-construction time over a string baked into the model, so there is
/// nothing a caller could usefully recover from.
pub fn compile(statement: &str) -> Vec<PostfixNode> {
    let stripped: String = statement.chars().filter(|c| !c.is_whitespace()).collect();
    let tokens = token::lex(&stripped);
    let mut pos = 0;
    let ast = parse_expr(&tokens, &mut pos);
    assert_eq!(pos, tokens.len(), "trailing tokens after expression: {statement:?}");
    let mut out = Vec::new();
    emit_postfix(&ast, &mut out);
    out
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Ast {
    match tokens.get(*pos) {
        Some(Token::InputOperand(k)) => {
            *pos += 1;
            Ast::Input(*k)
        }
        Some(Token::Add) | Some(Token::Mul) => {
            let is_add = matches!(tokens[*pos], Token::Add);
            *pos += 1;
            expect(tokens, pos, &Token::LParen);
            let lhs = parse_expr(tokens, pos);
            expect(tokens, pos, &Token::Comma);
            let rhs = parse_expr(tokens, pos);
            expect(tokens, pos, &Token::RParen);
            if is_add {
                Ast::Add(Box::new(lhs), Box::new(rhs))
            } else {
                Ast::Mul(Box::new(lhs), Box::new(rhs))
            }
        }
        other => panic!("unexpected token while parsing expression: {other:?}"),
    }
}

fn expect(tokens: &[Token], pos: &mut usize, want: &Token) {
    match tokens.get(*pos) {
        Some(t) if t == want => *pos += 1,
        other => panic!("expected {want:?}, found {other:?}"),
    }
}

fn emit_postfix(ast: &Ast, out: &mut Vec<PostfixNode>) {
    match ast {
        Ast::Input(k) => out.push(PostfixNode::Input(*k)),
        Ast::Add(l, r) => {
            emit_postfix(l, out);
            emit_postfix(r, out);
            out.push(PostfixNode::Add);
        }
        Ast::Mul(l, r) => {
            emit_postfix(l, out);
            emit_postfix(r, out);
            out.push(PostfixNode::Mul);
        }
    }
}
