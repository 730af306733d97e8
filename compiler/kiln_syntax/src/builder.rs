//! Programmatic tree construction.
//!
//! There is no parser in this workspace; tools and tests build trees with
//! [`AstBuilder`]. Every token the builder creates is appended to a
//! synthesized source text (separated by a space), so token spans, source
//! hashes and line/column tracking all behave as they would for parsed input.
//! Call [`AstBuilder::newline`] to move subsequent tokens to the next line.

use crate::items::{
    Capture, ContainerDecl, ContainerField, ContainerKind, FnParam, FnProto, For, If, Layout,
    ParamType, PtrType, Switch, SwitchCase, VarDecl, While,
};
use crate::{
    Ast, AssignOp, BinaryOp, ContainerDeclIdx, ContainerFieldIdx, FnProtoIdx, ForIdx, IfIdx,
    ListRange, Node, NodeId, NodeKind, ParseError, PtrTypeIdx, Span, SwitchCaseIdx, SwitchIdx,
    Token, TokenIndex, TokenTag, UnaryOp, VarDeclIdx, WhileIdx,
};

/// Incremental builder for [`Ast`].
///
/// Node 0 is reserved for the root and filled in by [`AstBuilder::finish`].
pub struct AstBuilder {
    ast: Ast,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn to_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("syntax tree table exceeded u32::MAX entries"))
}

impl AstBuilder {
    pub fn new() -> Self {
        let mut builder = AstBuilder {
            ast: Ast::default(),
        };
        let placeholder = builder.token(TokenTag::Eof, "");
        builder.ast.nodes.push(Node {
            kind: NodeKind::Root {
                members: ListRange::EMPTY,
            },
            main_token: placeholder,
            first_token: placeholder,
            last_token: placeholder,
        });
        builder
    }

    // === Tokens ===

    /// Append a token with the given text; returns its index.
    pub fn token(&mut self, tag: TokenTag, text: &str) -> TokenIndex {
        let start = to_u32(self.ast.source.len());
        self.ast.source.push_str(text);
        let end = to_u32(self.ast.source.len());
        self.ast.source.push(' ');
        let index = TokenIndex::new(to_u32(self.ast.tokens.len()));
        self.ast.tokens.push(Token::new(tag, Span::new(start, end)));
        index
    }

    /// Start a new source line.
    pub fn newline(&mut self) {
        self.ast.source.push('\n');
    }

    pub fn ident_token(&mut self, name: &str) -> TokenIndex {
        self.token(TokenTag::Identifier, name)
    }

    pub fn keyword(&mut self, kw: &str) -> TokenIndex {
        self.token(TokenTag::Keyword, kw)
    }

    pub fn punct(&mut self, p: &str) -> TokenIndex {
        self.token(TokenTag::Punctuation, p)
    }

    /// A label token (`blk` in `blk: { .. }`).
    pub fn label(&mut self, name: &str) -> TokenIndex {
        self.ident_token(name)
    }

    /// `|name|` or `|*name|`.
    pub fn capture(&mut self, name: &str, by_ref: bool) -> Capture {
        if by_ref {
            self.punct("*");
        }
        Capture {
            name: self.ident_token(name),
            by_ref,
        }
    }

    /// A typed function parameter.
    pub fn param(&mut self, name: &str, ty: NodeId) -> FnParam {
        FnParam {
            name: Some(self.ident_token(name)),
            ty: ParamType::Expr(ty),
            is_comptime: false,
            is_noalias: false,
        }
    }

    /// A `comptime name: T` parameter.
    pub fn comptime_param(&mut self, name: &str, ty: NodeId) -> FnParam {
        self.keyword("comptime");
        FnParam {
            is_comptime: true,
            ..self.param(name, ty)
        }
    }

    /// A `name: anytype` parameter.
    pub fn anytype_param(&mut self, name: &str) -> FnParam {
        let name = self.ident_token(name);
        FnParam {
            name: Some(name),
            ty: ParamType::AnyType(self.keyword("anytype")),
            is_comptime: false,
            is_noalias: false,
        }
    }

    /// Record a parse error at a fresh token.
    pub fn parse_error(&mut self, message: &str) {
        let token = self.token(TokenTag::Punctuation, "?");
        self.ast.errors.push(ParseError {
            message: message.to_owned(),
            token,
        });
    }

    // === Low-level node creation ===

    fn push_list(&mut self, nodes: &[NodeId]) -> ListRange {
        let start = to_u32(self.ast.node_lists.len());
        self.ast.node_lists.extend_from_slice(nodes);
        ListRange::new(start, to_u32(nodes.len()))
    }

    /// Extent covering `tokens` and the extents of `children`.
    fn extent(&self, tokens: &[TokenIndex], children: &[NodeId]) -> (TokenIndex, TokenIndex) {
        let mut first: Option<TokenIndex> = None;
        let mut last: Option<TokenIndex> = None;
        let mut cover = |lo: TokenIndex, hi: TokenIndex| {
            first = Some(first.map_or(lo, |f| f.min(lo)));
            last = Some(last.map_or(hi, |l| l.max(hi)));
        };
        for &tok in tokens {
            cover(tok, tok);
        }
        for &child in children {
            let node = &self.ast.nodes[child.index()];
            cover(node.first_token, node.last_token);
        }
        let first = first.unwrap_or_default();
        (first, last.unwrap_or(first))
    }

    /// Add a node whose extent covers `tokens` and `children`.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        main_token: TokenIndex,
        tokens: &[TokenIndex],
        children: &[NodeId],
    ) -> NodeId {
        let (first_token, last_token) = {
            let mut all = Vec::with_capacity(tokens.len() + 1);
            all.push(main_token);
            all.extend_from_slice(tokens);
            self.extent(&all, children)
        };
        let id = NodeId::new(to_u32(self.ast.nodes.len()));
        self.ast.nodes.push(Node {
            kind,
            main_token,
            first_token,
            last_token,
        });
        id
    }

    fn leaf(&mut self, kind: NodeKind, tag: TokenTag, text: &str) -> NodeId {
        let tok = self.token(tag, text);
        self.add_node(kind, tok, &[], &[])
    }

    // === Leaves ===

    pub fn ident(&mut self, name: &str) -> NodeId {
        self.leaf(NodeKind::Identifier, TokenTag::Identifier, name)
    }

    pub fn number(&mut self, text: &str) -> NodeId {
        self.leaf(NodeKind::NumberLiteral, TokenTag::NumberLiteral, text)
    }

    /// A string literal; `contents` is the text between the quotes, escapes
    /// left as written.
    pub fn string(&mut self, contents: &str) -> NodeId {
        let text = format!("\"{contents}\"");
        self.leaf(NodeKind::StringLiteral, TokenTag::StringLiteral, &text)
    }

    /// A multiline string literal, one `\\` line per entry.
    pub fn multiline_string(&mut self, lines: &[&str]) -> NodeId {
        let mut first_line = None;
        let mut last_line = TokenIndex::default();
        for line in lines {
            self.newline();
            let tok = self.token(TokenTag::MultilineStringLine, &format!("\\\\{line}"));
            first_line.get_or_insert(tok);
            last_line = tok;
        }
        let first_line = first_line.unwrap_or(last_line);
        self.add_node(
            NodeKind::MultilineStringLiteral {
                first_line,
                last_line,
            },
            first_line,
            &[last_line],
            &[],
        )
    }

    /// A char literal; `contents` is the text between the quotes.
    pub fn char_lit(&mut self, contents: &str) -> NodeId {
        let text = format!("'{contents}'");
        self.leaf(NodeKind::CharLiteral, TokenTag::CharLiteral, &text)
    }

    /// `.name`
    pub fn enum_literal(&mut self, name: &str) -> NodeId {
        let dot = self.punct(".");
        let tok = self.ident_token(name);
        self.add_node(NodeKind::EnumLiteral, tok, &[dot], &[])
    }

    /// `error.Name`
    pub fn error_value(&mut self, name: &str) -> NodeId {
        let kw = self.keyword("error");
        self.punct(".");
        let name = self.ident_token(name);
        self.add_node(NodeKind::ErrorValue { name }, kw, &[name], &[])
    }

    pub fn unreachable(&mut self) -> NodeId {
        self.leaf(NodeKind::Unreachable, TokenTag::Keyword, "unreachable")
    }

    // === Operators ===

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let tag = match op {
            BinaryOp::BoolAnd | BinaryOp::BoolOr | BinaryOp::Orelse => TokenTag::Keyword,
            _ => TokenTag::Punctuation,
        };
        let tok = self.token(tag, op.symbol());
        self.add_node(NodeKind::Binary { op, lhs, rhs }, tok, &[], &[lhs, rhs])
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        let tag = if op == UnaryOp::Try {
            TokenTag::Keyword
        } else {
            TokenTag::Punctuation
        };
        let tok = self.token(tag, op.symbol());
        self.add_node(NodeKind::Unary { op, operand }, tok, &[], &[operand])
    }

    pub fn deref(&mut self, operand: NodeId) -> NodeId {
        let tok = self.punct(".*");
        self.add_node(NodeKind::Deref { operand }, tok, &[], &[operand])
    }

    pub fn unwrap_optional(&mut self, operand: NodeId) -> NodeId {
        let tok = self.punct(".?");
        self.add_node(NodeKind::UnwrapOptional { operand }, tok, &[], &[operand])
    }

    /// `lhs catch |capture| rhs`
    pub fn catch(&mut self, lhs: NodeId, capture: Option<&str>, rhs: NodeId) -> NodeId {
        let tok = self.keyword("catch");
        let capture = capture.map(|name| self.ident_token(name));
        let extra: Vec<TokenIndex> = capture.into_iter().collect();
        self.add_node(NodeKind::Catch { lhs, capture, rhs }, tok, &extra, &[lhs, rhs])
    }

    pub fn field_access(&mut self, lhs: NodeId, field: &str) -> NodeId {
        let dot = self.punct(".");
        let field = self.ident_token(field);
        self.add_node(NodeKind::FieldAccess { lhs, field }, dot, &[field], &[lhs])
    }

    pub fn array_access(&mut self, lhs: NodeId, index: NodeId) -> NodeId {
        let tok = self.punct("[");
        let close = self.punct("]");
        self.add_node(
            NodeKind::ArrayAccess { lhs, index },
            tok,
            &[close],
            &[lhs, index],
        )
    }

    pub fn slice(
        &mut self,
        lhs: NodeId,
        start: NodeId,
        end: Option<NodeId>,
        sentinel: Option<NodeId>,
    ) -> NodeId {
        let tok = self.punct("[");
        let close = self.punct("]");
        let mut children = vec![lhs, start];
        children.extend(end);
        children.extend(sentinel);
        self.add_node(
            NodeKind::Slice {
                lhs,
                start,
                end,
                sentinel,
            },
            tok,
            &[close],
            &children,
        )
    }

    pub fn grouped(&mut self, inner: NodeId) -> NodeId {
        let open = self.punct("(");
        let close = self.punct(")");
        self.add_node(NodeKind::Grouped { inner }, open, &[close], &[inner])
    }

    // === Calls ===

    pub fn call(&mut self, callee: NodeId, args: &[NodeId]) -> NodeId {
        let open = self.punct("(");
        let close = self.punct(")");
        let list = self.push_list(args);
        let mut children = vec![callee];
        children.extend_from_slice(args);
        self.add_node(
            NodeKind::Call { callee, args: list },
            open,
            &[close],
            &children,
        )
    }

    /// `@name(args)`; `name` includes the `@`.
    pub fn builtin_call(&mut self, name: &str, args: &[NodeId]) -> NodeId {
        let tok = self.token(TokenTag::Builtin, name);
        let close = self.punct(")");
        let list = self.push_list(args);
        self.add_node(NodeKind::BuiltinCall { args: list }, tok, &[close], args)
    }

    // === Aggregates ===

    /// `T{ .name = value, .. }` or `.{ .. }` without a type.
    pub fn struct_init(&mut self, ty: Option<NodeId>, fields: &[(&str, NodeId)]) -> NodeId {
        let open = self.punct("{");
        let mut inits = Vec::with_capacity(fields.len());
        for &(name, value) in fields {
            let dot = self.punct(".");
            let name = self.ident_token(name);
            inits.push(self.add_node(NodeKind::FieldInit { name, value }, name, &[dot], &[value]));
        }
        let close = self.punct("}");
        let list = self.push_list(&inits);
        let mut children = inits;
        children.extend(ty);
        self.add_node(
            NodeKind::StructInit { ty, fields: list },
            open,
            &[close],
            &children,
        )
    }

    /// `T{ a, b }` or `.{ a, b }` without a type.
    pub fn array_init(&mut self, ty: Option<NodeId>, elems: &[NodeId]) -> NodeId {
        let open = self.punct("{");
        let close = self.punct("}");
        let list = self.push_list(elems);
        let mut children = elems.to_vec();
        children.extend(ty);
        self.add_node(
            NodeKind::ArrayInit { ty, elems: list },
            open,
            &[close],
            &children,
        )
    }

    // === Types ===

    pub fn array_type(&mut self, len: NodeId, elem: NodeId, sentinel: Option<NodeId>) -> NodeId {
        let open = self.punct("[");
        let mut children = vec![len, elem];
        children.extend(sentinel);
        self.add_node(
            NodeKind::ArrayType {
                len,
                elem,
                sentinel,
            },
            open,
            &[],
            &children,
        )
    }

    pub fn ptr_type(&mut self, ptr: PtrType) -> NodeId {
        let tok = self.punct("*");
        let idx = PtrTypeIdx::new(to_u32(self.ast.ptr_types.len()));
        self.ast.ptr_types.push(ptr);
        let mut children = vec![ptr.elem];
        children.extend(ptr.sentinel);
        children.extend(ptr.align);
        self.add_node(NodeKind::PtrType(idx), tok, &[], &children)
    }

    pub fn optional_type(&mut self, child: NodeId) -> NodeId {
        self.unary(UnaryOp::OptionalType, child)
    }

    pub fn error_union_type(&mut self, error_set: NodeId, payload: NodeId) -> NodeId {
        let tok = self.punct("!");
        self.add_node(
            NodeKind::ErrorUnionType { error_set, payload },
            tok,
            &[],
            &[error_set, payload],
        )
    }

    /// `error{ A, B }`
    pub fn error_set(&mut self, names: &[&str]) -> NodeId {
        let kw = self.keyword("error");
        let start = to_u32(self.ast.token_lists.len());
        let mut toks = Vec::with_capacity(names.len());
        for name in names {
            let tok = self.ident_token(name);
            self.ast.token_lists.push(tok);
            toks.push(tok);
        }
        let close = self.punct("}");
        toks.push(close);
        let range = ListRange::new(start, to_u32(names.len()));
        self.add_node(NodeKind::ErrorSetDecl { names: range }, kw, &toks, &[])
    }

    // === Blocks and control flow ===

    /// `label: { stmts; tail }`
    pub fn block(
        &mut self,
        label: Option<TokenIndex>,
        stmts: &[NodeId],
        tail: Option<NodeId>,
    ) -> NodeId {
        let open = self.punct("{");
        let close = self.punct("}");
        let list = self.push_list(stmts);
        let mut toks = vec![close];
        toks.extend(label);
        let mut children = stmts.to_vec();
        children.extend(tail);
        self.add_node(
            NodeKind::Block {
                label,
                stmts: list,
                tail,
            },
            open,
            &toks,
            &children,
        )
    }

    pub fn if_expr(&mut self, node: If) -> NodeId {
        let kw = self.keyword("if");
        let idx = IfIdx::new(to_u32(self.ast.ifs.len()));
        self.ast.ifs.push(node);
        let mut toks = Vec::new();
        toks.extend(node.payload.map(|c| c.name));
        toks.extend(node.error);
        let mut children = vec![node.cond, node.then_expr];
        children.extend(node.else_expr);
        self.add_node(NodeKind::If(idx), kw, &toks, &children)
    }

    pub fn while_loop(&mut self, node: While) -> NodeId {
        let kw = self.keyword("while");
        let idx = WhileIdx::new(to_u32(self.ast.whiles.len()));
        self.ast.whiles.push(node);
        let mut toks = Vec::new();
        toks.extend(node.label);
        toks.extend(node.payload.map(|c| c.name));
        toks.extend(node.error);
        let mut children = vec![node.cond, node.body];
        children.extend(node.cont_expr);
        children.extend(node.else_expr);
        self.add_node(NodeKind::While(idx), kw, &toks, &children)
    }

    pub fn for_loop(
        &mut self,
        label: Option<TokenIndex>,
        is_inline: bool,
        inputs: &[NodeId],
        captures: &[Capture],
        body: NodeId,
        else_expr: Option<NodeId>,
    ) -> NodeId {
        let kw = self.keyword("for");
        let input_list = self.push_list(inputs);
        let cap_start = to_u32(self.ast.captures.len());
        self.ast.captures.extend_from_slice(captures);
        let capture_range = ListRange::new(cap_start, to_u32(captures.len()));
        let idx = ForIdx::new(to_u32(self.ast.fors.len()));
        self.ast.fors.push(For {
            label,
            is_inline,
            inputs: input_list,
            captures: capture_range,
            body,
            else_expr,
        });
        let mut toks: Vec<TokenIndex> = captures.iter().map(|c| c.name).collect();
        toks.extend(label);
        let mut children = inputs.to_vec();
        children.push(body);
        children.extend(else_expr);
        self.add_node(NodeKind::For(idx), kw, &toks, &children)
    }

    /// `start..end` as a `for` input.
    pub fn for_range(&mut self, start: NodeId, end: Option<NodeId>) -> NodeId {
        let tok = self.punct("..");
        let mut children = vec![start];
        children.extend(end);
        self.add_node(NodeKind::ForRange { start, end }, tok, &[], &children)
    }

    pub fn switch(&mut self, label: Option<TokenIndex>, operand: NodeId, cases: &[NodeId]) -> NodeId {
        let kw = self.keyword("switch");
        let list = self.push_list(cases);
        let idx = SwitchIdx::new(to_u32(self.ast.switches.len()));
        self.ast.switches.push(Switch {
            label,
            operand,
            cases: list,
        });
        let close = self.punct("}");
        let mut toks = vec![close];
        toks.extend(label);
        let mut children = vec![operand];
        children.extend_from_slice(cases);
        self.add_node(NodeKind::Switch(idx), kw, &toks, &children)
    }

    /// A switch prong. Empty `items` makes it the `else` prong.
    pub fn switch_case(
        &mut self,
        items: &[NodeId],
        body: NodeId,
        configure: impl FnOnce(&mut SwitchCase),
    ) -> NodeId {
        let arrow = self.punct("=>");
        let list = self.push_list(items);
        let mut case = SwitchCase {
            items: list,
            is_underscore: false,
            is_inline: false,
            payload: None,
            tag: None,
            body,
        };
        configure(&mut case);
        let idx = SwitchCaseIdx::new(to_u32(self.ast.switch_cases.len()));
        self.ast.switch_cases.push(case);
        let mut toks = Vec::new();
        toks.extend(case.payload.map(|c| c.name));
        toks.extend(case.tag);
        let mut children = items.to_vec();
        children.push(body);
        self.add_node(NodeKind::SwitchCase(idx), arrow, &toks, &children)
    }

    /// `start...end` as a switch item.
    pub fn switch_range(&mut self, start: NodeId, end: NodeId) -> NodeId {
        let tok = self.punct("...");
        self.add_node(NodeKind::SwitchRange { start, end }, tok, &[], &[start, end])
    }

    pub fn break_expr(&mut self, label: Option<&str>, value: Option<NodeId>) -> NodeId {
        let kw = self.keyword("break");
        let label = label.map(|l| self.label(l));
        let toks: Vec<TokenIndex> = label.into_iter().collect();
        let children: Vec<NodeId> = value.into_iter().collect();
        self.add_node(NodeKind::Break { label, value }, kw, &toks, &children)
    }

    pub fn continue_expr(&mut self, label: Option<&str>, value: Option<NodeId>) -> NodeId {
        let kw = self.keyword("continue");
        let label = label.map(|l| self.label(l));
        let toks: Vec<TokenIndex> = label.into_iter().collect();
        let children: Vec<NodeId> = value.into_iter().collect();
        self.add_node(NodeKind::Continue { label, value }, kw, &toks, &children)
    }

    pub fn return_expr(&mut self, value: Option<NodeId>) -> NodeId {
        let kw = self.keyword("return");
        let children: Vec<NodeId> = value.into_iter().collect();
        self.add_node(NodeKind::Return { value }, kw, &[], &children)
    }

    pub fn comptime(&mut self, expr: NodeId) -> NodeId {
        let kw = self.keyword("comptime");
        self.add_node(NodeKind::Comptime { expr }, kw, &[], &[expr])
    }

    pub fn nosuspend(&mut self, expr: NodeId) -> NodeId {
        let kw = self.keyword("nosuspend");
        self.add_node(NodeKind::Nosuspend { expr }, kw, &[], &[expr])
    }

    pub fn suspend(&mut self, body: NodeId) -> NodeId {
        let kw = self.keyword("suspend");
        self.add_node(NodeKind::Suspend { body }, kw, &[], &[body])
    }

    // === Statements ===

    pub fn defer(&mut self, body: NodeId) -> NodeId {
        let kw = self.keyword("defer");
        self.add_node(NodeKind::Defer { body }, kw, &[], &[body])
    }

    pub fn errdefer(&mut self, capture: Option<&str>, body: NodeId) -> NodeId {
        let kw = self.keyword("errdefer");
        let capture = capture.map(|name| self.ident_token(name));
        let toks: Vec<TokenIndex> = capture.into_iter().collect();
        self.add_node(NodeKind::ErrDefer { capture, body }, kw, &toks, &[body])
    }

    pub fn assign(&mut self, op: AssignOp, target: NodeId, value: NodeId) -> NodeId {
        let tok = self.punct(op.symbol());
        self.add_node(
            NodeKind::Assign { op, target, value },
            tok,
            &[],
            &[target, value],
        )
    }

    pub fn assign_destructure(&mut self, targets: &[NodeId], value: NodeId) -> NodeId {
        let tok = self.punct("=");
        let list = self.push_list(targets);
        let mut children = targets.to_vec();
        children.push(value);
        self.add_node(
            NodeKind::AssignDestructure {
                targets: list,
                value,
            },
            tok,
            &[],
            &children,
        )
    }

    // === Declarations ===

    /// `const`/`var` declaration; the main token is the name.
    pub fn var_decl(&mut self, decl: VarDecl) -> NodeId {
        let kw = self.keyword(if decl.is_const { "const" } else { "var" });
        let semi = self.punct(";");
        let idx = VarDeclIdx::new(to_u32(self.ast.var_decls.len()));
        self.ast.var_decls.push(decl);
        let mut children = Vec::new();
        children.extend(decl.ty);
        children.extend(decl.align);
        children.extend(decl.init);
        self.add_node(NodeKind::VarDecl(idx), decl.name, &[kw, semi], &children)
    }

    /// Function prototype. `configure` adjusts flags after the defaults.
    pub fn fn_proto(
        &mut self,
        name: Option<&str>,
        params: &[FnParam],
        return_type: NodeId,
        configure: impl FnOnce(&mut FnProto),
    ) -> NodeId {
        let kw = self.keyword("fn");
        let name = name.map(|n| self.ident_token(n));
        let start = to_u32(self.ast.fn_params.len());
        self.ast.fn_params.extend_from_slice(params);
        let mut proto = FnProto {
            name,
            params: ListRange::new(start, to_u32(params.len())),
            return_type,
            inferred_error_set: false,
            align: None,
            callconv: None,
            is_pub: false,
            is_extern: false,
            is_export: false,
            is_inline: false,
            is_var_args: false,
            lib_name: None,
        };
        configure(&mut proto);
        let idx = FnProtoIdx::new(to_u32(self.ast.fn_protos.len()));
        self.ast.fn_protos.push(proto);
        let mut toks: Vec<TokenIndex> = name.into_iter().collect();
        for param in params {
            toks.extend(param.name);
            if let ParamType::AnyType(tok) = param.ty {
                toks.push(tok);
            }
        }
        let mut children: Vec<NodeId> = params
            .iter()
            .filter_map(|p| match p.ty {
                ParamType::Expr(ty) => Some(ty),
                ParamType::AnyType(_) => None,
            })
            .collect();
        children.push(return_type);
        children.extend(proto.align);
        children.extend(proto.callconv);
        self.add_node(NodeKind::FnProto(idx), kw, &toks, &children)
    }

    pub fn fn_decl(&mut self, proto: NodeId, body: NodeId) -> NodeId {
        let main = self.ast.nodes[proto.index()].main_token;
        self.add_node(NodeKind::FnDecl { proto, body }, main, &[], &[proto, body])
    }

    /// Container type expression.
    pub fn container(
        &mut self,
        kind: ContainerKind,
        members: &[NodeId],
        configure: impl FnOnce(&mut ContainerDecl),
    ) -> NodeId {
        let kw = self.keyword(kind.keyword());
        let list = self.push_list(members);
        let mut decl = ContainerDecl {
            kind,
            layout: Layout::Auto,
            arg: None,
            auto_enum_tag: false,
            members: list,
        };
        configure(&mut decl);
        let idx = ContainerDeclIdx::new(to_u32(self.ast.container_decls.len()));
        self.ast.container_decls.push(decl);
        let close = self.punct("}");
        let mut children = members.to_vec();
        children.extend(decl.arg);
        self.add_node(NodeKind::ContainerDecl(idx), kw, &[close], &children)
    }

    /// Container field; the main token is the name, or the type's first
    /// token for tuple fields.
    pub fn container_field(
        &mut self,
        name: Option<&str>,
        ty: Option<NodeId>,
        configure: impl FnOnce(&mut ContainerField),
    ) -> NodeId {
        let name = name.map(|n| self.ident_token(n));
        let mut field = ContainerField {
            name,
            ty,
            align: None,
            value: None,
            is_comptime: false,
        };
        configure(&mut field);
        let idx = ContainerFieldIdx::new(to_u32(self.ast.container_fields.len()));
        self.ast.container_fields.push(field);
        let comma = self.punct(",");
        let mut children = Vec::new();
        children.extend(field.ty);
        children.extend(field.align);
        children.extend(field.value);
        let main = name
            .or_else(|| field.ty.map(|ty| self.ast.nodes[ty.index()].first_token))
            .unwrap_or(comma);
        self.add_node(NodeKind::ContainerField(idx), main, &[comma], &children)
    }

    /// `test "name" { .. }`
    pub fn test_decl(&mut self, name: Option<&str>, body: NodeId) -> NodeId {
        let kw = self.keyword("test");
        let name = name.map(|n| self.token(TokenTag::StringLiteral, &format!("\"{n}\"")));
        let toks: Vec<TokenIndex> = name.into_iter().collect();
        self.add_node(NodeKind::TestDecl { name, body }, kw, &toks, &[body])
    }

    /// `comptime { .. }` as a container member.
    pub fn comptime_decl(&mut self, body: NodeId) -> NodeId {
        self.comptime(body)
    }

    pub fn using_namespace(&mut self, expr: NodeId) -> NodeId {
        let kw = self.keyword("usingnamespace");
        self.add_node(NodeKind::UsingNamespace { expr }, kw, &[], &[expr])
    }

    /// Fill in the root with `members` and return the tree.
    pub fn finish(mut self, members: &[NodeId]) -> Ast {
        let list = self.push_list(members);
        let eof = self.token(TokenTag::Eof, "");
        let first = TokenIndex::new(0);
        self.ast.nodes[0] = Node {
            kind: NodeKind::Root { members: list },
            main_token: first,
            first_token: first,
            last_token: eof,
        };
        self.ast
    }
}
