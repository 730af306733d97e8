//! The scope chain.
//!
//! Scopes live in a per-declaration arena and point at their parent by
//! [`ScopeId`]. Lookup walks outward: locals first, then namespaces. A name
//! found past one or more namespace boundaries from inside a function body
//! is tunneled through each crossed namespace's capture table and read with
//! `closure_get`.

use kiln_diagnostic::ErrorCode;
use kiln_ir::{Capture, InstData, InstIndex, InstTag, NullTerminatedString, Ref, Signedness};
use kiln_syntax::{NodeId, TokenIndex};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::block::BlockId;
use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;
use crate::result_loc::{ResultCtx, ResultInfo, ResultLoc};

/// Index into [`Lowerer::scopes`]. Scope 0 is the top of every chain.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const TOP: ScopeId = ScopeId(0);

    pub(crate) fn new(index: usize) -> LowerResult<Self> {
        Ok(ScopeId(to_u32(index)?))
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of binding a local is, for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IdCat {
    FnParam,
    LocalConst,
    LocalVar,
    SwitchTagCapture,
    Capture,
}

impl IdCat {
    pub const fn as_str(self) -> &'static str {
        match self {
            IdCat::FnParam => "function parameter",
            IdCat::LocalConst => "local constant",
            IdCat::LocalVar => "local variable",
            IdCat::SwitchTagCapture => "switch tag capture",
            IdCat::Capture => "capture",
        }
    }
}

/// A local bound to a value.
#[derive(Clone, Debug)]
pub struct LocalVal {
    pub parent: ScopeId,
    pub inst: Ref,
    pub token: TokenIndex,
    pub name: NullTerminatedString,
    pub id_cat: IdCat,
    /// Last reading use.
    pub used: Option<TokenIndex>,
    /// `_ = name;`
    pub discarded: Option<TokenIndex>,
}

/// A local bound to an allocation.
#[derive(Clone, Debug)]
pub struct LocalPtr {
    pub parent: ScopeId,
    pub ptr: Ref,
    pub token: TokenIndex,
    pub name: NullTerminatedString,
    pub id_cat: IdCat,
    pub used: Option<TokenIndex>,
    pub discarded: Option<TokenIndex>,
    /// Comptime-known, so closures may capture it.
    pub maybe_comptime: bool,
    /// Written through or had its address taken.
    pub used_as_lvalue: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DeferKind {
    Normal,
    Error,
}

/// A `defer`/`errdefer` whose body sits in `extra[index..index + len]`.
#[derive(Clone, Debug)]
pub struct DeferScope {
    pub kind: DeferKind,
    pub parent: ScopeId,
    pub index: u32,
    pub len: u32,
    /// The stand-in for `errdefer |err|`, replaced when the defer runs.
    pub remapped_err_code: Option<InstIndex>,
}

/// A container body.
#[derive(Clone, Debug)]
pub struct NamespaceScope {
    pub parent: ScopeId,
    pub node: NodeId,
    pub inst: InstIndex,
    /// Member name to declaring node, for shadowing and lookup.
    pub decls: FxHashMap<NullTerminatedString, NodeId>,
    /// Values tunneled in from enclosing scopes, in first-use order.
    pub captures: Vec<(Capture, NullTerminatedString)>,
    capture_index: FxHashMap<Capture, u32>,
}

impl NamespaceScope {
    pub fn new(parent: ScopeId, node: NodeId, inst: InstIndex) -> Self {
        NamespaceScope {
            parent,
            node,
            inst,
            decls: FxHashMap::default(),
            captures: Vec::new(),
            capture_index: FxHashMap::default(),
        }
    }

    /// Index of `capture`, added on first request.
    pub fn get_or_put_capture(&mut self, capture: Capture, name: NullTerminatedString) -> LowerResult<u32> {
        if let Some(&index) = self.capture_index.get(&capture) {
            self.captures[index as usize].1 = name;
            return Ok(index);
        }
        let index = to_u32(self.captures.len())?;
        self.captures.push((capture, name));
        self.capture_index.insert(capture, index);
        Ok(index)
    }
}

#[derive(Clone, Debug)]
pub enum Scope {
    Top,
    /// The scope a block builder contributes to the chain.
    Block { parent: ScopeId, block: BlockId },
    LocalVal(LocalVal),
    LocalPtr(LocalPtr),
    Defer(DeferScope),
    Namespace(NamespaceScope),
}

impl Scope {
    pub fn parent(&self) -> Option<ScopeId> {
        match self {
            Scope::Top => None,
            Scope::Block { parent, .. } => Some(*parent),
            Scope::LocalVal(local) => Some(local.parent),
            Scope::LocalPtr(local) => Some(local.parent),
            Scope::Defer(defer) => Some(defer.parent),
            Scope::Namespace(ns) => Some(ns.parent),
        }
    }
}

/// `u7`, `i129`: an integer type name outside the fixed primitive set.
pub(crate) fn parse_int_type(name: &[u8]) -> Option<(Signedness, u16)> {
    let (&first, digits) = name.split_first()?;
    let signedness = match first {
        b'u' => Signedness::Unsigned,
        b'i' => Signedness::Signed,
        _ => return None,
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // Leading zeros spell an ordinary identifier.
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    let bits = std::str::from_utf8(digits).ok()?.parse::<u16>().ok()?;
    Some((signedness, bits))
}

/// Names that resolve without lookup and may not be shadowed.
pub(crate) fn is_primitive(name: &[u8]) -> bool {
    std::str::from_utf8(name)
        .ok()
        .and_then(Ref::primitive)
        .is_some()
        || parse_int_type(name).is_some()
}

/// One step of an outward walk that stays inside the current namespace.
#[derive(Copy, Clone, Debug)]
pub(crate) enum ScopeStep {
    Block { parent: ScopeId, block: BlockId },
    Next(ScopeId),
    /// A namespace or the top of the chain.
    End,
}

impl Lowerer<'_> {
    pub(crate) fn scope_step(&self, id: ScopeId) -> ScopeStep {
        match &self.scopes[id.index()] {
            Scope::Block { parent, block } => ScopeStep::Block {
                parent: *parent,
                block: *block,
            },
            Scope::LocalVal(local) => ScopeStep::Next(local.parent),
            Scope::LocalPtr(local) => ScopeStep::Next(local.parent),
            Scope::Defer(defer) => ScopeStep::Next(defer.parent),
            Scope::Namespace(_) | Scope::Top => ScopeStep::End,
        }
    }

    /// Bind a value local on top of `parent`, after the shadowing check,
    /// and emit its debug variable into `gz`.
    pub(crate) fn push_local_val(
        &mut self,
        gz: BlockId,
        parent: ScopeId,
        token: TokenIndex,
        inst: Ref,
        id_cat: IdCat,
    ) -> LowerResult<ScopeId> {
        let (scope, name) = self.bind_local_val(parent, token, inst, id_cat)?;
        self.add_dbg_var(gz, InstTag::DbgVarVal, name, inst)?;
        Ok(scope)
    }

    /// [`Lowerer::push_local_val`] without the debug variable, for bindings
    /// made while their block is unstacked.
    pub(crate) fn bind_local_val(
        &mut self,
        parent: ScopeId,
        token: TokenIndex,
        inst: Ref,
        id_cat: IdCat,
    ) -> LowerResult<(ScopeId, NullTerminatedString)> {
        let name = self.ident_name(token)?;
        self.detect_local_shadowing(parent, name, token, id_cat)?;
        let scope = self.push_scope(Scope::LocalVal(LocalVal {
            parent,
            inst,
            token,
            name,
            id_cat,
            used: None,
            discarded: None,
        }))?;
        Ok((scope, name))
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) -> LowerResult<ScopeId> {
        let id = ScopeId::new(self.scopes.len())?;
        self.scopes.push(scope);
        Ok(id)
    }

    pub(crate) fn namespace(&self, id: ScopeId) -> Option<&NamespaceScope> {
        match &self.scopes[id.index()] {
            Scope::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// Reject `name` if it would shadow a local, a declaration or a
    /// primitive visible from `scope`.
    pub(crate) fn detect_local_shadowing(
        &mut self,
        scope: ScopeId,
        name: NullTerminatedString,
        name_token: TokenIndex,
        id_cat: IdCat,
    ) -> LowerResult<()> {
        let spelling = self.ast.token_slice(name_token).to_owned();
        if !spelling.starts_with('@') && is_primitive(spelling.as_bytes()) {
            let note = self.note_tok(
                name_token,
                format!("consider using @\"{spelling}\" to disambiguate"),
            );
            return self.fail_tok_notes(
                name_token,
                ErrorCode::E1005,
                format!("name shadows primitive '{spelling}'"),
                vec![note],
            );
        }
        let mut current = scope;
        let mut outer_scope = false;
        loop {
            let (local, next) = match &self.scopes[current.index()] {
                Scope::Top => return Ok(()),
                Scope::LocalVal(local) => (
                    (local.name == name).then_some((local.token, local.id_cat)),
                    local.parent,
                ),
                Scope::LocalPtr(local) => (
                    (local.name == name).then_some((local.token, local.id_cat)),
                    local.parent,
                ),
                Scope::Block { parent, .. } => {
                    outer_scope = true;
                    (None, *parent)
                }
                Scope::Defer(defer) => (None, defer.parent),
                Scope::Namespace(ns) => {
                    outer_scope = true;
                    if let Some(&decl_node) = ns.decls.get(&name) {
                        let text = self.name_text(name);
                        let note = self.note_node(decl_node, "declared here");
                        return self.fail_tok_notes(
                            name_token,
                            ErrorCode::E1004,
                            format!("{} shadows declaration of '{text}'", id_cat.as_str()),
                            vec![note],
                        );
                    }
                    (None, ns.parent)
                }
            };
            if let Some((prev_token, prev_cat)) = local {
                let text = self.name_text(name);
                let note = self.note_tok(prev_token, "previous declaration here");
                let message = if outer_scope {
                    format!(
                        "{} '{text}' shadows {} from outer scope",
                        id_cat.as_str(),
                        prev_cat.as_str()
                    )
                } else {
                    format!("redeclaration of {} '{text}'", prev_cat.as_str())
                };
                return self.fail_tok_notes(name_token, ErrorCode::E1003, message, vec![note]);
            }
            current = next;
        }
    }

    /// Lower an identifier expression.
    pub(crate) fn identifier(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
    ) -> LowerResult<Ref> {
        let ident_token = self.ast.main_token(node);
        let spelling = self.ast.token_slice(ident_token);
        if spelling == "_" {
            return self.fail_node(
                node,
                ErrorCode::E1010,
                "'_' used as an identifier without @\"_\" syntax",
            );
        }
        if !spelling.starts_with('@') {
            if let Some(constant) = Ref::primitive(spelling) {
                return self.rvalue(gz, ri, constant, node);
            }
            if let Some((signedness, bit_count)) = parse_int_type(spelling.as_bytes()) {
                let src_node = self.rel_node(gz, node);
                let ty = self.add(
                    gz,
                    InstTag::IntType,
                    InstData::IntType {
                        src_node,
                        signedness,
                        bit_count,
                    },
                )?;
                return self.rvalue(gz, ri, ty, node);
            }
        }
        let name = self.ident_name(ident_token)?;
        self.local_var_ref(gz, scope, ri, node, ident_token, name)
    }

    fn local_var_ref(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        ident_token: TokenIndex,
        name: NullTerminatedString,
    ) -> LowerResult<Ref> {
        let is_discard = ri.rl == ResultLoc::Discard && ri.ctx == ResultCtx::Assignment;
        let mut namespaces_out = 0u32;
        let mut capturing_namespace: Option<NodeId> = None;
        let mut found: SmallVec<[NodeId; 2]> = SmallVec::new();
        let mut current = scope;
        loop {
            let next = match &mut self.scopes[current.index()] {
                Scope::Top => break,
                Scope::LocalVal(local) => {
                    if local.name == name {
                        if is_discard {
                            local.discarded = Some(ident_token);
                        } else {
                            local.used = Some(ident_token);
                        }
                        let inst = local.inst;
                        let value = if namespaces_out == 0 {
                            inst
                        } else {
                            self.tunnel_through_closure(
                                gz,
                                node,
                                namespaces_out,
                                TunnelValue::Value(inst),
                                name,
                            )?
                        };
                        return self.rvalue_no_coerce_pre_ref(gz, ri, value, node);
                    }
                    local.parent
                }
                Scope::LocalPtr(local) => {
                    if local.name == name {
                        if is_discard {
                            local.discarded = Some(ident_token);
                        } else {
                            local.used = Some(ident_token);
                        }
                        let (ptr, token, maybe_comptime) = (local.ptr, local.token, local.maybe_comptime);
                        if ri.is_ref() {
                            local.used_as_lvalue = true;
                        }
                        if let Some(ns_node) = capturing_namespace.filter(|_| !maybe_comptime) {
                            if !self.blocks[gz.index()].is_typeof {
                                let text = self.name_text(name);
                                let notes = vec![
                                    self.note_tok(token, "declared mutable here"),
                                    self.note_node(ns_node, "crosses namespace boundary here"),
                                ];
                                return self.fail_node_notes(
                                    node,
                                    ErrorCode::E1006,
                                    format!("mutable '{text}' not accessible from here"),
                                    notes,
                                );
                            }
                        }
                        if ri.is_ref() {
                            return if namespaces_out == 0 {
                                Ok(ptr)
                            } else {
                                self.tunnel_through_closure(
                                    gz,
                                    node,
                                    namespaces_out,
                                    TunnelValue::Value(ptr),
                                    name,
                                )
                            };
                        }
                        let value = if namespaces_out == 0 {
                            self.add_un_node(gz, InstTag::Load, ptr, node)?
                        } else {
                            self.tunnel_through_closure(
                                gz,
                                node,
                                namespaces_out,
                                TunnelValue::Load(ptr),
                                name,
                            )?
                        };
                        return self.rvalue_no_coerce_pre_ref(gz, ri, value, node);
                    }
                    local.parent
                }
                Scope::Block { parent, .. } => *parent,
                Scope::Defer(defer) => defer.parent,
                Scope::Namespace(ns) => {
                    if let Some(&decl) = ns.decls.get(&name) {
                        found.push(decl);
                    }
                    namespaces_out += 1;
                    capturing_namespace = Some(ns.node);
                    ns.parent
                }
            };
            current = next;
        }

        match found.as_slice() {
            [] => {
                let text = self.name_text(name);
                self.fail_node(
                    node,
                    ErrorCode::E1001,
                    format!("use of undeclared identifier '{text}'"),
                )
            }
            [_] => {
                let tag = if ri.is_ref() {
                    InstTag::DeclRef
                } else {
                    InstTag::DeclVal
                };
                let result = self.add_str_tok(gz, tag, name, ident_token)?;
                if ri.is_ref() {
                    Ok(result)
                } else {
                    self.rvalue_no_coerce_pre_ref(gz, ri, result, node)
                }
            }
            [first, second, ..] => {
                let (first, second) = (*first, *second);
                let notes = vec![
                    self.note_node(first, "declared here"),
                    self.note_node(second, "also declared here"),
                ];
                self.fail_node_notes(node, ErrorCode::E1002, "ambiguous reference", notes)
            }
        }
    }

    /// Route `value` through the capture tables of the `namespaces_out`
    /// namespaces between `gz` and the binding, outermost first.
    fn tunnel_through_closure(
        &mut self,
        gz: BlockId,
        node: NodeId,
        namespaces_out: u32,
        value: TunnelValue,
        name: NullTerminatedString,
    ) -> LowerResult<Ref> {
        let root_capture = match value {
            TunnelValue::Value(inst) => match inst.to_inst() {
                Some(inst) => Capture::Value(inst),
                // Constants need no tunnel.
                None => return Ok(inst),
            },
            TunnelValue::Load(ptr) => match ptr.to_inst() {
                Some(inst) => Capture::Load(inst),
                None => return Ok(ptr),
            },
        };

        // Namespaces from the innermost outward.
        let mut crossed: SmallVec<[ScopeId; 4]> = SmallVec::new();
        let mut current = self.blocks[gz.index()].scope;
        while crossed.len() < namespaces_out as usize {
            if matches!(self.scopes[current.index()], Scope::Namespace(_)) {
                crossed.push(current);
            }
            match self.scopes[current.index()].parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let mut capture = root_capture;
        let mut index = 0;
        for &ns_id in crossed.iter().rev() {
            if let Scope::Namespace(ns) = &mut self.scopes[ns_id.index()] {
                index = ns.get_or_put_capture(capture, name)?;
            }
            capture = Capture::Nested(index);
        }
        tracing::trace!(?root_capture, index, namespaces_out, "tunneled capture");

        self.src_hasher.update_u32(index);
        let src_node = self.rel_node(gz, node);
        self.add(
            gz,
            InstTag::ClosureGet,
            InstData::ClosureGet {
                src_node,
                capture_index: index,
            },
        )
    }
}

/// What a tunneled capture carries.
#[derive(Copy, Clone, Debug)]
enum TunnelValue {
    Value(Ref),
    /// A pointer whose pointee is read at the capture point.
    Load(Ref),
}

#[cfg(test)]
mod tests;
