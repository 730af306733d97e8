//! The syntax tree handed to the lowering pass.

use crate::items::{
    Capture, ContainerDecl, ContainerField, FnParam, FnProto, For, If, PtrType, Switch,
    SwitchCase, VarDecl, While,
};
use crate::{
    CaptureRange, ContainerDeclIdx, ContainerFieldIdx, FnProtoIdx, ForIdx, IfIdx, ListRange,
    Node, NodeId, NodeKind, NodeRange, PtrTypeIdx, Span, SwitchCaseIdx, SwitchIdx, Token,
    TokenIndex, TokenRange, VarDeclIdx, WhileIdx,
};

/// An error reported by the parser. Its presence suppresses lowering.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParseError {
    pub message: String,
    pub token: TokenIndex,
}

/// Flat syntax tree with side tables.
///
/// Built by the parser (out of scope here) or by [`AstBuilder`](crate::AstBuilder).
/// All accessors are read-only; the lowering pass never mutates the tree.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    pub(crate) source: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) node_lists: Vec<NodeId>,
    pub(crate) token_lists: Vec<TokenIndex>,
    pub(crate) captures: Vec<Capture>,
    pub(crate) container_decls: Vec<ContainerDecl>,
    pub(crate) container_fields: Vec<ContainerField>,
    pub(crate) fn_protos: Vec<FnProto>,
    pub(crate) fn_params: Vec<FnParam>,
    pub(crate) var_decls: Vec<VarDecl>,
    pub(crate) ptr_types: Vec<PtrType>,
    pub(crate) ifs: Vec<If>,
    pub(crate) whiles: Vec<While>,
    pub(crate) fors: Vec<For>,
    pub(crate) switches: Vec<Switch>,
    pub(crate) switch_cases: Vec<SwitchCase>,
    pub(crate) errors: Vec<ParseError>,
}

impl Ast {
    /// Full source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    #[inline]
    pub fn main_token(&self, id: NodeId) -> TokenIndex {
        self.nodes[id.index()].main_token
    }

    #[inline]
    pub fn first_token(&self, id: NodeId) -> TokenIndex {
        self.nodes[id.index()].first_token
    }

    #[inline]
    pub fn last_token(&self, id: NodeId) -> TokenIndex {
        self.nodes[id.index()].last_token
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn token(&self, tok: TokenIndex) -> Token {
        self.tokens[tok.index()]
    }

    /// Byte offset where a token starts.
    #[inline]
    pub fn token_start(&self, tok: TokenIndex) -> u32 {
        self.tokens[tok.index()].span.start
    }

    /// Source text of a token.
    #[inline]
    pub fn token_slice(&self, tok: TokenIndex) -> &str {
        &self.source[self.tokens[tok.index()].span.to_range()]
    }

    /// Byte extent of a node, from its first token to its last.
    pub fn node_span(&self, id: NodeId) -> Span {
        let node = self.node(id);
        self.token(node.first_token)
            .span
            .merge(self.token(node.last_token).span)
    }

    /// Source text covered by a node.
    pub fn node_source(&self, id: NodeId) -> &str {
        &self.source[self.node_span(id).to_range()]
    }

    #[inline]
    pub fn node_list(&self, range: NodeRange) -> &[NodeId] {
        &self.node_lists[range.to_range()]
    }

    #[inline]
    pub fn token_list(&self, range: TokenRange) -> &[TokenIndex] {
        &self.token_lists[range.to_range()]
    }

    #[inline]
    pub fn captures(&self, range: CaptureRange) -> &[Capture] {
        &self.captures[range.to_range()]
    }

    #[inline]
    pub fn container_decl(&self, idx: ContainerDeclIdx) -> &ContainerDecl {
        &self.container_decls[idx.index()]
    }

    #[inline]
    pub fn container_field(&self, idx: ContainerFieldIdx) -> &ContainerField {
        &self.container_fields[idx.index()]
    }

    #[inline]
    pub fn fn_proto(&self, idx: FnProtoIdx) -> &FnProto {
        &self.fn_protos[idx.index()]
    }

    #[inline]
    pub fn fn_params(&self, range: ListRange) -> &[FnParam] {
        &self.fn_params[range.to_range()]
    }

    #[inline]
    pub fn var_decl(&self, idx: VarDeclIdx) -> &VarDecl {
        &self.var_decls[idx.index()]
    }

    #[inline]
    pub fn ptr_type(&self, idx: PtrTypeIdx) -> &PtrType {
        &self.ptr_types[idx.index()]
    }

    #[inline]
    pub fn if_node(&self, idx: IfIdx) -> &If {
        &self.ifs[idx.index()]
    }

    #[inline]
    pub fn while_node(&self, idx: WhileIdx) -> &While {
        &self.whiles[idx.index()]
    }

    #[inline]
    pub fn for_node(&self, idx: ForIdx) -> &For {
        &self.fors[idx.index()]
    }

    #[inline]
    pub fn switch_node(&self, idx: SwitchIdx) -> &Switch {
        &self.switches[idx.index()]
    }

    #[inline]
    pub fn switch_case(&self, idx: SwitchCaseIdx) -> &SwitchCase {
        &self.switch_cases[idx.index()]
    }

    /// Members of the root container.
    pub fn root_members(&self) -> &[NodeId] {
        match self.nodes.first().map(|n| n.kind) {
            Some(NodeKind::Root { members }) => self.node_list(members),
            _ => &[],
        }
    }

    /// Parse errors recorded upstream.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Function prototype of a `FnDecl` or `FnProto` node.
    pub fn full_fn_proto(&self, id: NodeId) -> Option<&FnProto> {
        match self.kind(id) {
            NodeKind::FnProto(idx) => Some(self.fn_proto(idx)),
            NodeKind::FnDecl { proto, .. } => self.full_fn_proto(proto),
            _ => None,
        }
    }
}
