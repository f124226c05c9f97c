// Parser for JAM source files.
//
// Parses a token stream (from the lexer) into an AST for one tier. The
// embedded-tier grammar (JAM-C) and the managed-tier grammar (JAM-JS) share
// the statement and expression rules; only the top-level item rules differ.
// Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an embedded-tier (JAM-C) source string.
pub fn parse_embedded(source: &str) -> ParseResult {
    parse(source, Tier::Embedded)
}

/// Parse a managed-tier (JAM-JS) source string.
pub fn parse_managed(source: &str) -> ParseResult {
    parse(source, Tier::Managed)
}

/// Parse a JAM source string under the grammar of `tier`. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str, tier: Tier) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = unit_parser(source, tier);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

/// Postfix operator collected while folding `a(b).c[d]++`.
#[derive(Debug, Clone)]
enum Postfix {
    Call(Vec<Expr>),
    Member(Ident, bool),
    Index(Expr),
    Step(&'static str),
}

fn slice(source: &str, span: SimpleSpan) -> String {
    source[span.start()..span.end()].to_string()
}

/// `f(void)` declares no parameters.
fn strip_void(params: Vec<Param>) -> Vec<Param> {
    match params.as_slice() {
        [Param { ty: None, name }] if name.name == "void" => Vec::new(),
        [Param { ty: Some(ty), .. }] if ty.is_void() => Vec::new(),
        _ => params,
    }
}

// Left-associative binary level over `$lower`.
macro_rules! binary_level {
    ($lower:expr, $ops:expr) => {
        $lower
            .clone()
            .foldl_with($ops.then($lower).repeated(), |lhs, (op, rhs), e| Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span: e.span(),
            })
    };
}

// ── Main parser builder ──
//
// All grammar rules are built inside `unit_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn unit_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
    tier: Tier,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Type name: IDENT '*'* ──

    let type_name = ident
        .clone()
        .then(just(Token::Star).repeated().collect::<Vec<_>>())
        .map_with(|(base, stars), e| TypeName {
            base: base.name,
            pointer: stars.len(),
            span: e.span(),
        });

    // ── Parameters ──

    let param = type_name
        .clone()
        .then(ident.clone())
        .map(|(ty, name)| Param { ty: Some(ty), name })
        .or(ident.clone().map(|name| Param { ty: None, name }));

    let params = param
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(strip_void);

    let proto_params = type_name
        .clone()
        .then_ignore(ident.clone().or_not())
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(|types: Vec<TypeName>| {
            if types.len() == 1 && types[0].is_void() {
                (Vec::new(), true)
            } else {
                (types, false)
            }
        });

    // ── jcond expression ──

    let jcond_expr = {
        let path = ident
            .clone()
            .separated_by(just(Token::Dot))
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|parts: Vec<Ident>, e| JcondOperand {
                text: parts
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join("."),
                is_literal: false,
                span: e.span(),
            });

        let literal = select! {
            Token::Number = e => e.span(),
            Token::Str = e => e.span(),
        }
        .map(move |span: SimpleSpan| JcondOperand {
            text: slice(source, span),
            is_literal: true,
            span,
        });

        let operand = literal.or(path);

        let cmp_op = choice((
            just(Token::EqEq).to("=="),
            just(Token::NotEq).to("!="),
            just(Token::Le).to("<="),
            just(Token::Ge).to(">="),
            just(Token::Lt).to("<"),
            just(Token::Gt).to(">"),
        ));

        let compare = operand
            .clone()
            .then(cmp_op)
            .then(operand)
            .map_with(|((lhs, op), rhs), e| JcondExpr::Compare {
                lhs,
                op: op.to_string(),
                rhs,
                span: e.span(),
            });

        let reference = ident
            .clone()
            .then(just(Token::Dot).ignore_then(ident.clone()).or_not())
            .map(|(first, second)| match second {
                Some(name) => JcondExpr::Ref {
                    namespace: Some(first),
                    name,
                },
                None => JcondExpr::Ref {
                    namespace: None,
                    name: first,
                },
            });

        recursive(|jexpr| {
            let paren = jexpr
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(|inner| JcondExpr::Paren(Box::new(inner)));

            let primary = choice((paren, compare, reference));

            let negated = just(Token::Bang)
                .repeated()
                .foldr(primary, |_, inner| JcondExpr::Not(Box::new(inner)));

            let op = choice((
                just(Token::AndAnd).to(JcondOp::And),
                just(Token::OrOr).to(JcondOp::Or),
            ));

            negated
                .clone()
                .foldl(op.then(negated).repeated(), |lhs, (op, rhs)| {
                    JcondExpr::Binary {
                        lhs: Box::new(lhs),
                        op,
                        rhs: Box::new(rhs),
                    }
                })
        })
    };

    let jcond_spec = jcond_expr
        .clone()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    // ── Statements and expressions ──

    let stmt = recursive(|stmt| {
        let block = stmt
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|stmts, e| Block {
                stmts,
                span: e.span(),
            });

        let expr = recursive(|expr| {
            let literal = select! {
                Token::Number = e => ExprKind::Number(slice(source, e.span())),
                Token::Str = e => ExprKind::Str(slice(source, e.span())),
                Token::Ident = e => ExprKind::Ident(slice(source, e.span())),
            };

            let function_expr = just(Token::Function)
                .ignore_then(ident.clone().or_not())
                .then(params.clone())
                .then(block.clone())
                .map(|((name, params), body)| {
                    ExprKind::Function(Box::new(FunctionDef {
                        ret: None,
                        name,
                        params,
                        body,
                    }))
                });

            let array = expr
                .clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(ExprKind::Array);

            let paren = expr
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(|inner| ExprKind::Paren(Box::new(inner)));

            let atom = choice((literal, function_expr, array, paren)).map_with(|kind, e| Expr {
                kind,
                span: e.span(),
            });

            let args = expr
                .clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen));

            let postfix_op = choice((
                args.map(Postfix::Call),
                just(Token::Dot)
                    .ignore_then(ident.clone())
                    .map(|field| Postfix::Member(field, false)),
                just(Token::Arrow)
                    .ignore_then(ident.clone())
                    .map(|field| Postfix::Member(field, true)),
                expr.clone()
                    .delimited_by(just(Token::LBracket), just(Token::RBracket))
                    .map(Postfix::Index),
                just(Token::PlusPlus).to(Postfix::Step("++")),
                just(Token::MinusMinus).to(Postfix::Step("--")),
            ));

            let postfix = atom.foldl_with(postfix_op.repeated(), |lhs, op, e| {
                let kind = match op {
                    Postfix::Call(args) => ExprKind::Call {
                        callee: Box::new(lhs),
                        args,
                    },
                    Postfix::Member(field, arrow) => ExprKind::Member {
                        object: Box::new(lhs),
                        field,
                        arrow,
                    },
                    Postfix::Index(index) => ExprKind::Index {
                        object: Box::new(lhs),
                        index: Box::new(index),
                    },
                    Postfix::Step(op) => ExprKind::Postfix {
                        op,
                        operand: Box::new(lhs),
                    },
                };
                Expr {
                    kind,
                    span: e.span(),
                }
            });

            let prefix_op = choice((
                just(Token::Bang).to("!"),
                just(Token::Minus).to("-"),
                just(Token::Plus).to("+"),
                just(Token::Tilde).to("~"),
                just(Token::PlusPlus).to("++"),
                just(Token::MinusMinus).to("--"),
                just(Token::Amp).to("&"),
                just(Token::Star).to("*"),
                just(Token::Await).to("await"),
                just(Token::New).to("new"),
            ))
            .map_with(|op, e| (op, e.span()));

            let unary = prefix_op
                .repeated()
                .foldr(postfix, |(op, op_span): (&'static str, SimpleSpan), operand: Expr| {
                    let span: SimpleSpan = (op_span.start()..operand.span.end()).into();
                    Expr {
                        kind: ExprKind::Unary {
                            op,
                            operand: Box::new(operand),
                        },
                        span,
                    }
                })
                .boxed();

            let product = binary_level!(
                unary,
                choice((
                    just(Token::Star).to("*"),
                    just(Token::Slash).to("/"),
                    just(Token::Percent).to("%"),
                ))
            )
            .boxed();
            let sum = binary_level!(
                product,
                choice((just(Token::Plus).to("+"), just(Token::Minus).to("-")))
            )
            .boxed();
            let relation = binary_level!(
                sum,
                choice((
                    just(Token::Le).to("<="),
                    just(Token::Ge).to(">="),
                    just(Token::Lt).to("<"),
                    just(Token::Gt).to(">"),
                ))
            )
            .boxed();
            let equality = binary_level!(
                relation,
                choice((
                    just(Token::StrictEq).to("==="),
                    just(Token::StrictNotEq).to("!=="),
                    just(Token::EqEq).to("=="),
                    just(Token::NotEq).to("!="),
                ))
            )
            .boxed();
            let bitwise = binary_level!(
                equality,
                choice((
                    just(Token::Amp).to("&"),
                    just(Token::Caret).to("^"),
                    just(Token::Pipe).to("|"),
                ))
            )
            .boxed();
            let conjunction = binary_level!(bitwise, just(Token::AndAnd).to("&&")).boxed();
            binary_level!(conjunction, just(Token::OrOr).to("||")).boxed()
        });

        let assign_op = choice((
            just(Token::Assign).to("="),
            just(Token::PlusAssign).to("+="),
            just(Token::MinusAssign).to("-="),
            just(Token::StarAssign).to("*="),
            just(Token::SlashAssign).to("/="),
        ));

        let initializer = just(Token::Assign).ignore_then(expr.clone()).or_not();

        let keyword_decl = choice((just(Token::Var).to("var"), just(Token::Let).to("let")))
            .map(DeclHead::Keyword)
            .then(ident.clone())
            .then(initializer.clone())
            .then_ignore(just(Token::Semi))
            .map(|((head, name), init)| StmtKind::VarDecl { head, name, init });

        let typed_decl = type_name
            .clone()
            .map(DeclHead::Typed)
            .then(ident.clone())
            .then(initializer)
            .then_ignore(just(Token::Semi))
            .map(|((head, name), init)| StmtKind::VarDecl { head, name, init });

        let function_stmt = just(Token::Function)
            .ignore_then(ident.clone())
            .then(params.clone())
            .then(block.clone())
            .map(|((name, params), body)| {
                StmtKind::Function(FunctionDef {
                    ret: None,
                    name: Some(name),
                    params,
                    body,
                })
            });

        let condition = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let if_stmt = just(Token::If)
            .ignore_then(condition.clone())
            .then(stmt.clone())
            .then(just(Token::Else).ignore_then(stmt.clone()).or_not())
            .map(|((cond, then), otherwise)| StmtKind::If {
                cond,
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            });

        let while_stmt = just(Token::While)
            .ignore_then(condition)
            .then(stmt.clone())
            .map(|(cond, body)| StmtKind::While {
                cond,
                body: Box::new(body),
            });

        let return_stmt = just(Token::Return)
            .ignore_then(expr.clone().or_not())
            .then_ignore(just(Token::Semi))
            .map(StmtKind::Return);

        let expr_stmt = expr
            .clone()
            .then(assign_op.then(expr).or_not())
            .then_ignore(just(Token::Semi))
            .map(|(target, assign)| match assign {
                Some((op, value)) => StmtKind::Assign { target, op, value },
                None => StmtKind::Expr(target),
            });

        choice((
            block.map(StmtKind::Block),
            just(Token::Semi).to(StmtKind::Empty),
            if_stmt,
            while_stmt,
            return_stmt,
            function_stmt,
            keyword_decl,
            typed_decl,
            expr_stmt,
        ))
        .map_with(|kind, e| Stmt {
            kind,
            span: e.span(),
        })
    });

    let block = stmt
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .map_with(|stmts, e| Block {
            stmts,
            span: e.span(),
        });

    // ── Embedded-tier items ──

    let embedded_item = {
        let directive = select! {
            Token::Directive = e => ItemKind::Directive(slice(source, e.span())),
        };

        let sync_activity = just(Token::Jsync)
            .ignore_then(type_name.clone())
            .then(jcond_spec.clone().or_not())
            .then(ident.clone())
            .then(params.clone())
            .then(block.clone())
            .map(|((((ret, jcond), name), params), body)| {
                ItemKind::Activity(ActivityDecl {
                    kind: ActivityKind::Sync,
                    ret: Some(ret),
                    jcond,
                    name,
                    params,
                    body,
                })
            });

        let async_activity = just(Token::Jasync)
            .ignore_then(jcond_spec.clone().or_not())
            .then(ident.clone())
            .then(params.clone())
            .then(block.clone())
            .map(|(((jcond, name), params), body)| {
                ItemKind::Activity(ActivityDecl {
                    kind: ActivityKind::Async,
                    ret: None,
                    jcond,
                    name,
                    params,
                    body,
                })
            });

        let prototype = type_name
            .clone()
            .then(ident.clone())
            .then(proto_params)
            .then_ignore(just(Token::Semi))
            .map(|((ret, name), (params, explicit_void))| {
                ItemKind::Prototype(Prototype {
                    ret,
                    name,
                    params,
                    explicit_void,
                })
            });

        let function = type_name
            .clone()
            .then(ident.clone())
            .then(params.clone())
            .then(block.clone())
            .map(|(((ret, name), params), body)| {
                ItemKind::Function(FunctionDef {
                    ret: Some(ret),
                    name: Some(name),
                    params,
                    body,
                })
            });

        choice((
            directive,
            sync_activity,
            async_activity,
            prototype,
            function,
            stmt.clone().map(ItemKind::Stmt),
        ))
        .boxed()
    };

    // ── Managed-tier items ──

    let managed_item = {
        let jcond_block = just(Token::Jcond)
            .ignore_then(ident.clone().or_not())
            .then(
                ident
                    .clone()
                    .then_ignore(just(Token::Colon))
                    .then(jcond_expr)
                    .then_ignore(just(Token::Semi))
                    .map_with(|(name, expr), e| JcondEntry {
                        name,
                        expr,
                        span: e.span(),
                    })
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .map(|(namespace, entries)| ItemKind::Jcond(JcondBlock { namespace, entries }));

        let jdata_block = just(Token::Jdata)
            .ignore_then(ident.clone().or_not())
            .then(
                type_name
                    .clone()
                    .then(ident.clone())
                    .then_ignore(just(Token::As))
                    .then(ident.clone())
                    .then_ignore(just(Token::Semi))
                    .map_with(|((ty, name), kind), e| JdataSpec {
                        ty,
                        name,
                        kind,
                        span: e.span(),
                    })
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .map(|(namespace, specs)| ItemKind::Jdata(JdataBlock { namespace, specs }));

        let activity = choice((
            just(Token::Jsync).to(ActivityKind::Sync),
            just(Token::Jasync).to(ActivityKind::Async),
        ))
        .then(jcond_spec.or_not())
        .then_ignore(just(Token::Function))
        .then(ident.clone())
        .then(params.clone())
        .then(block.clone())
        .map(|((((kind, jcond), name), params), body)| {
            ItemKind::Activity(ActivityDecl {
                kind,
                ret: None,
                jcond,
                name,
                params,
                body,
            })
        });

        let function = just(Token::Function)
            .ignore_then(ident.clone())
            .then(params)
            .then(block)
            .map(|((name, params), body)| {
                ItemKind::Function(FunctionDef {
                    ret: None,
                    name: Some(name),
                    params,
                    body,
                })
            });

        choice((
            jcond_block,
            jdata_block,
            activity,
            function,
            stmt.map(ItemKind::Stmt),
        ))
        .boxed()
    };

    // ── Program ──

    let item = match tier {
        Tier::Embedded => embedded_item,
        Tier::Managed => managed_item,
    };

    item.map_with(|kind, e| Item {
        kind,
        span: e.span(),
    })
    .repeated()
    .collect::<Vec<_>>()
    .then_ignore(end())
    .map_with(|items, e| Program {
        items,
        span: e.span(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str, tier: Tier) -> Program {
        let result = parse(source, tier);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.program.expect("expected program")
    }

    fn one_item(source: &str, tier: Tier) -> ItemKind {
        let prog = parse_ok(source, tier);
        assert_eq!(prog.items.len(), 1, "expected 1 item");
        prog.items.into_iter().next().unwrap().kind
    }

    fn body_stmt(source: &str) -> StmtKind {
        let src = format!("void f() {{ {} }}", source);
        match one_item(&src, Tier::Embedded) {
            ItemKind::Function(f) => f.body.stmts.into_iter().next().unwrap().kind,
            other => panic!("expected function, got {:?}", other),
        }
    }

    // ── Empty ──

    #[test]
    fn empty_program() {
        assert!(parse_ok("", Tier::Embedded).items.is_empty());
        assert!(parse_ok("", Tier::Managed).items.is_empty());
    }

    // ── Embedded items ──

    #[test]
    fn directive_kept_verbatim() {
        match one_item("#include <stdio.h>", Tier::Embedded) {
            ItemKind::Directive(text) => assert_eq!(text, "#include <stdio.h>"),
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn sync_activity_with_condition() {
        match one_item(
            "jsync int {fogonly} add(int a, int b) { return a + b; }",
            Tier::Embedded,
        ) {
            ItemKind::Activity(act) => {
                assert_eq!(act.kind, ActivityKind::Sync);
                assert_eq!(act.ret.as_ref().map(|t| t.spelling()), Some("int".into()));
                assert!(matches!(act.jcond, Some(JcondExpr::Ref { .. })));
                assert_eq!(act.name.name, "add");
                assert_eq!(act.params.len(), 2);
                assert_eq!(
                    act.params[1].ty.as_ref().map(|t| t.spelling()),
                    Some("int".into())
                );
            }
            other => panic!("expected activity, got {:?}", other),
        }
    }

    #[test]
    fn async_activity_without_condition() {
        match one_item("jasync ping(char* msg) { }", Tier::Embedded) {
            ItemKind::Activity(act) => {
                assert_eq!(act.kind, ActivityKind::Async);
                assert!(act.jcond.is_none());
                assert_eq!(
                    act.params[0].ty.as_ref().map(|t| t.spelling()),
                    Some("char*".into())
                );
            }
            other => panic!("expected activity, got {:?}", other),
        }
    }

    #[test]
    fn prototype_forms() {
        let prog = parse_ok(
            "int f(int, char* name); void g(void); int main();",
            Tier::Embedded,
        );
        let protos: Vec<&Prototype> = prog
            .items
            .iter()
            .filter_map(|i| match &i.kind {
                ItemKind::Prototype(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(protos.len(), 3);
        assert_eq!(protos[0].params.len(), 2);
        assert_eq!(protos[0].params[1].spelling(), "char*");
        assert!(protos[1].params.is_empty());
        assert!(protos[1].ret.is_void());
        assert!(protos[1].explicit_void);
        assert!(protos[2].params.is_empty());
        assert!(!protos[2].explicit_void);
    }

    #[test]
    fn function_definition_and_global() {
        let prog = parse_ok("int x = 3;\nint main(void) { x = 4; }", Tier::Embedded);
        assert!(matches!(prog.items[0].kind, ItemKind::Stmt(_)));
        match &prog.items[1].kind {
            ItemKind::Function(f) => {
                assert_eq!(f.name.as_ref().map(|n| n.name.as_str()), Some("main"));
                assert!(f.params.is_empty());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    // ── Managed items ──

    #[test]
    fn jcond_block_entries() {
        match one_item(
            "jcond app { fogonly: sys.type == \"fog\"; fast: !(sys.sync >= 1) || app.x; }",
            Tier::Managed,
        ) {
            ItemKind::Jcond(block) => {
                assert_eq!(block.namespace.map(|n| n.name), Some("app".into()));
                assert_eq!(block.entries.len(), 2);
                match &block.entries[0].expr {
                    JcondExpr::Compare { lhs, op, rhs, .. } => {
                        assert_eq!(lhs.text, "sys.type");
                        assert!(!lhs.is_literal);
                        assert_eq!(op, "==");
                        assert_eq!(rhs.text, "\"fog\"");
                        assert!(rhs.is_literal);
                    }
                    other => panic!("expected compare, got {:?}", other),
                }
                match &block.entries[1].expr {
                    JcondExpr::Binary { lhs, op, rhs } => {
                        assert_eq!(*op, JcondOp::Or);
                        assert!(matches!(**lhs, JcondExpr::Not(_)));
                        assert!(matches!(
                            &**rhs,
                            JcondExpr::Ref { namespace: Some(ns), .. } if ns.name == "app"
                        ));
                    }
                    other => panic!("expected binary, got {:?}", other),
                }
            }
            other => panic!("expected jcond block, got {:?}", other),
        }
    }

    #[test]
    fn jdata_block_specs() {
        match one_item(
            "jdata { int x as logger; char* name as broadcaster; }",
            Tier::Managed,
        ) {
            ItemKind::Jdata(block) => {
                assert!(block.namespace.is_none());
                assert_eq!(block.specs.len(), 2);
                assert_eq!(block.specs[1].ty.spelling(), "char*");
                assert_eq!(block.specs[1].kind.name, "broadcaster");
            }
            other => panic!("expected jdata block, got {:?}", other),
        }
    }

    #[test]
    fn managed_activity_and_function() {
        let prog = parse_ok(
            "jasync {fogonly} function notify(cb, x) { cb(x); }\nfunction h(a) { return a; }",
            Tier::Managed,
        );
        match &prog.items[0].kind {
            ItemKind::Activity(act) => {
                assert_eq!(act.kind, ActivityKind::Async);
                assert_eq!(act.params.len(), 2);
                assert!(act.params[0].ty.is_none());
            }
            other => panic!("expected activity, got {:?}", other),
        }
        assert!(matches!(prog.items[1].kind, ItemKind::Function(_)));
    }

    #[test]
    fn managed_statements() {
        let prog = parse_ok(
            "var x = 1;\nlet y;\nx = await add(x, 2);\nconsole.log(\"hi\");",
            Tier::Managed,
        );
        assert_eq!(prog.items.len(), 4);
        match &prog.items[2].kind {
            ItemKind::Stmt(Stmt {
                kind: StmtKind::Assign { value, .. },
                ..
            }) => assert!(matches!(value.kind, ExprKind::Unary { op: "await", .. })),
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    // ── Statements / expressions ──

    #[test]
    fn precedence_binds_product_tighter() {
        match body_stmt("x = 1 + 2 * 3;") {
            StmtKind::Assign { value, .. } => match value.kind {
                ExprKind::Binary { op: "+", rhs, .. } => {
                    assert!(matches!(rhs.kind, ExprKind::Binary { op: "*", .. }))
                }
                other => panic!("expected +, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn pointer_declaration() {
        match body_stmt("char *s = \"a\";") {
            StmtKind::VarDecl {
                head: DeclHead::Typed(ty),
                name,
                init,
            } => {
                assert_eq!(ty.spelling(), "char*");
                assert_eq!(name.name, "s");
                assert!(init.is_some());
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn if_else_and_while() {
        assert!(matches!(
            body_stmt("if (a < 3) { a++; } else a = 0;"),
            StmtKind::If {
                otherwise: Some(_),
                ..
            }
        ));
        assert!(matches!(
            body_stmt("while (i != 0) i--;"),
            StmtKind::While { .. }
        ));
    }

    #[test]
    fn member_and_arrow_access() {
        match body_stmt("cmd->args[0].val = app.x;") {
            StmtKind::Assign { target, value, .. } => {
                assert!(matches!(target.kind, ExprKind::Member { arrow: false, .. }));
                let (ns, field) = value.as_qualified().expect("qualified");
                assert_eq!((ns, field.name.as_str()), ("app", "x"));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn function_expression_argument() {
        match body_stmt("run(function() { go(); });") {
            StmtKind::Expr(Expr {
                kind: ExprKind::Call { args, .. },
                ..
            }) => assert!(matches!(args[0].kind, ExprKind::Function(_))),
            other => panic!("expected call, got {:?}", other),
        }
    }

    // ── Errors ──

    #[test]
    fn missing_semicolon_is_error() {
        let result = parse_embedded("int x = 3");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn jcond_block_rejected_by_embedded_grammar() {
        let result = parse_embedded("jcond { a: b; }");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn lex_errors_are_merged() {
        let result = parse_managed("var x = 1 @ 2;");
        assert!(!result.errors.is_empty());
    }
}
