//! Parser for the Weft input format.
//!
//! The input has two sections separated by a `%%` line: declarations,
//! then expressions, one per line. Blank lines and `//` comments are
//! skipped. The parser also collects the distinct types the declarations
//! mention, for seeding the conversion graph.
//!
//! Declaration: `(return-type )* name (-tag)? ( param-type)* (| assertion)*`
//! Types: a signed integer (primitive), `#name` with optional
//! `< t, u >` parameters (nominal), an uppercase identifier (variable),
//! or `[ return* : param* ]` (function).
//! Expression: a type literal, `&name`, or `name( subexpr* )`.

mod error;

use std::rc::Rc;

use rustc_hash::FxHashSet;
use weft_ast::decl::FuncDecl;
use weft_ast::expr::Expr;
use weft_ast::forall::Forall;
use weft_ast::ty::Ty;
use weft_resolve::func_table::FuncTable;

pub use error::{ParseError, ParseErrorKind};

/// A fully parsed input.
#[derive(Debug)]
pub struct Program {
    pub funcs: FuncTable,
    pub exprs: Vec<Rc<Expr>>,
    /// Distinct types seen in declarations, in display order; these seed
    /// the conversion graph.
    pub types: Vec<Ty>,
}

/// Parses a whole input text.
pub fn parse_input(src: &str) -> Result<Program, ParseError> {
    let mut funcs = FuncTable::new();
    let mut exprs = Vec::new();
    let mut types: FxHashSet<Ty> = FxHashSet::default();
    let mut in_decls = true;

    for (n, raw) in src.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line == "%%" {
            in_decls = false;
            continue;
        }

        if in_decls {
            match parse_decl(line, &mut types) {
                Some(decl) => funcs.insert(decl),
                None => {
                    return Err(ParseError::new(ParseErrorKind::InvalidDecl, n + 1, raw));
                }
            }
        } else {
            match parse_expr(line) {
                Some(expr) => exprs.push(expr),
                None => {
                    return Err(ParseError::new(ParseErrorKind::InvalidExpr, n + 1, raw));
                }
            }
        }
    }

    let mut types: Vec<Ty> = types.into_iter().collect();
    types.sort_by_key(|t| t.to_string());
    Ok(Program { funcs, exprs, types })
}

/// Byte cursor over one input line.
struct Cursor<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Cursor { s: line.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn match_char(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos == self.s.len()
    }

    /// A signed integer literal.
    fn parse_int(&mut self) -> Option<i32> {
        let save = self.pos;
        let negative = self.match_char(b'-');
        let digits = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == digits {
            self.pos = save;
            return None;
        }
        let text = std::str::from_utf8(&self.s[digits..self.pos]).ok()?;
        let value: i32 = text.parse().ok()?;
        Some(if negative { -value } else { value })
    }

    /// A function or tag name: lowercase start, lowercase-alphanumeric
    /// continuation.
    fn parse_name(&mut self) -> Option<String> {
        if !matches!(self.peek(), Some(b'a'..=b'z')) {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(), Some(b'a'..=b'z') | Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        String::from_utf8(self.s[start..self.pos].to_vec()).ok()
    }

    /// A type-variable name: uppercase start.
    fn parse_poly_name(&mut self) -> Option<String> {
        if !matches!(self.peek(), Some(b'A'..=b'Z')) {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(), Some(b'a'..=b'z') | Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        String::from_utf8(self.s[start..self.pos].to_vec()).ok()
    }

    /// A nominal type name: `#` then an identifier.
    fn parse_named_name(&mut self) -> Option<String> {
        let save = self.pos;
        if !self.match_char(b'#') {
            return None;
        }
        if !matches!(self.peek(), Some(b'A'..=b'Z') | Some(b'a'..=b'z') | Some(b'_')) {
            self.pos = save;
            return None;
        }
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'A'..=b'Z') | Some(b'a'..=b'z') | Some(b'0'..=b'9') | Some(b'_')
        ) {
            self.pos += 1;
        }
        String::from_utf8(self.s[start..self.pos].to_vec()).ok()
    }
}

/// Parses one type, appending it to `out`; type variables register in
/// the declaration's forall clause.
fn parse_type(
    cur: &mut Cursor,
    forall: &mut Option<Forall>,
    types: &mut FxHashSet<Ty>,
    out: &mut Vec<Ty>,
) -> bool {
    if let Some(id) = cur.parse_int() {
        let t = Ty::Conc(id);
        types.insert(t.clone());
        out.push(t);
        return true;
    }

    if let Some(name) = cur.parse_named_name() {
        let mut params = Vec::new();
        if cur.match_char(b'<') {
            cur.skip_ws();
            // parameters separated by commas or plain spaces
            loop {
                let mut sub = Vec::new();
                if !parse_type(cur, forall, types, &mut sub) {
                    return false;
                }
                params.extend(sub);
                cur.skip_ws();
                if cur.match_char(b',') {
                    cur.skip_ws();
                    continue;
                }
                if cur.match_char(b'>') {
                    break;
                }
            }
        }
        let t = Ty::Named(name, params);
        types.insert(t.clone());
        out.push(t);
        return true;
    }

    if let Some(name) = cur.parse_poly_name() {
        let f = forall.get_or_insert_with(Forall::new);
        out.push(Ty::Poly(f.add(&name)));
        return true;
    }

    if cur.match_char(b'[') {
        let mut rets = Vec::new();
        let mut params = Vec::new();
        cur.skip_ws();
        while parse_type(cur, forall, types, &mut rets) {
            cur.skip_ws();
        }
        if !cur.match_char(b':') {
            return false;
        }
        cur.skip_ws();
        while parse_type(cur, forall, types, &mut params) {
            cur.skip_ws();
        }
        if !cur.match_char(b']') {
            return false;
        }
        let t = Ty::Func(params, Box::new(Ty::from_list(rets)));
        types.insert(t.clone());
        out.push(t);
        return true;
    }

    false
}

/// Parses one declaration line.
fn parse_decl(line: &str, types: &mut FxHashSet<Ty>) -> Option<FuncDecl> {
    let mut cur = Cursor::new(line);
    let mut forall: Option<Forall> = None;

    let mut returns = Vec::new();
    cur.skip_ws();
    while parse_type(&mut cur, &mut forall, types, &mut returns) {
        cur.skip_ws();
    }

    let name = cur.parse_name()?;

    // the tag is optional, and `-` may instead start a negative type
    let mut tag = String::new();
    let save = cur.pos;
    if cur.match_char(b'-') {
        match cur.parse_name() {
            Some(t) => tag = t,
            None => cur.pos = save,
        }
    }

    let mut params = Vec::new();
    cur.skip_ws();
    while parse_type(&mut cur, &mut forall, types, &mut params) {
        cur.skip_ws();
    }

    loop {
        cur.skip_ws();
        if !cur.match_char(b'|') {
            break;
        }
        let mut a_rets = Vec::new();
        let mut a_params = Vec::new();
        cur.skip_ws();
        while parse_type(&mut cur, &mut forall, types, &mut a_rets) {
            cur.skip_ws();
        }
        let a_name = cur.parse_name()?;
        cur.skip_ws();
        while parse_type(&mut cur, &mut forall, types, &mut a_params) {
            cur.skip_ws();
        }
        forall
            .get_or_insert_with(Forall::new)
            .add_assertion(Rc::new(FuncDecl::new(a_name, a_params, Ty::from_list(a_rets))));
    }

    if !cur.at_end() {
        return None;
    }
    Some(FuncDecl::with_forall(name, tag, params, Ty::from_list(returns), forall))
}

fn parse_subexpr(cur: &mut Cursor) -> Option<Rc<Expr>> {
    cur.skip_ws();

    if let Some(id) = cur.parse_int() {
        return Some(Expr::val(Ty::Conc(id)));
    }

    if let Some(name) = cur.parse_named_name() {
        return Some(Expr::val(Ty::Named(name, Vec::new())));
    }

    if cur.match_char(b'&') {
        let name = cur.parse_name()?;
        return Some(Rc::new(Expr::Name(name)));
    }

    let name = cur.parse_name()?;
    cur.skip_ws();
    if !cur.match_char(b'(') {
        return None;
    }
    let mut args = Vec::new();
    loop {
        cur.skip_ws();
        if cur.match_char(b')') {
            break;
        }
        args.push(parse_subexpr(cur)?);
    }
    Some(Expr::call(name, args))
}

/// Parses one expression line.
fn parse_expr(line: &str) -> Option<Rc<Expr>> {
    let mut cur = Cursor::new(line);
    let e = parse_subexpr(&mut cur)?;
    if !cur.at_end() {
        return None;
    }
    Some(e)
}
