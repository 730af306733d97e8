//! Container and declaration assembly.
//!
//! Every container member other than a field becomes a `declaration`
//! instruction whose value, type and align bodies are lowered in their own
//! comptime blocks. A member whose lowering fails is rolled back to its mark
//! and replaced by a placeholder, so the declaration count of a container
//! never depends on which members had errors.
//!
//! Functions are `func` instructions inside the value body of their
//! declaration: parameters first, then the return, align and callconv
//! bodies, then the function body itself.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{ContainerDecl as ContainerPayload, DeclarationPayload, FieldRecord, Func, Param};
use kiln_ir::flags::{ContainerFlags, DeclFlags, FieldFlags, FuncFlags, ParamFlags};
use kiln_ir::{DeclKind, ExtraField, InstData, InstIndex, InstTag, NullTerminatedString, Ref};
use kiln_syntax::{
    ContainerDecl, ContainerDeclIdx, ContainerField, ContainerKind, FnParam, FnProto, FnProtoIdx, Layout, ListRange,
    NodeId, NodeKind, ParamType, TokenIndex, TokenTag, VarDecl,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::block::BlockId;
use crate::builtins::EvalToError;
use crate::control::{DefersToEmit, RestoreCond, RestoreTarget};
use crate::error::{to_u32, LowerError, LowerResult};
use crate::hash::SourceHasher;
use crate::lowerer::{FnContext, Lowerer};
use crate::result_loc::{ResultCtx, ResultInfo};
use crate::scope::{is_primitive, IdCat, NamespaceScope, Scope, ScopeId};
use crate::strings::{identifier_bytes, parse_string_literal};

/// A member expression: elided to its constant, or a body ending in a
/// `break_inline`.
#[derive(Clone, Debug)]
enum MemberBody {
    Direct(Ref),
    Body(Vec<u32>),
}

impl MemberBody {
    fn into_words(self) -> Vec<u32> {
        match self {
            MemberBody::Direct(_) => Vec::new(),
            MemberBody::Body(words) => words,
        }
    }
}

/// Everything a `declaration` payload needs besides its location and hash.
#[derive(Debug)]
struct DeclParts {
    kind: DeclKind,
    name: NullTerminatedString,
    flags: DeclFlags,
    value: Vec<u32>,
    ty: Vec<u32>,
    align: Vec<u32>,
}

impl DeclParts {
    fn value(kind: DeclKind, name: NullTerminatedString, value: Vec<u32>) -> Self {
        DeclParts {
            kind,
            name,
            flags: DeclFlags::empty(),
            value,
            ty: Vec::new(),
            align: Vec::new(),
        }
    }

    fn placeholder(name: NullTerminatedString) -> Self {
        DeclParts::value(DeclKind::Placeholder, name, Vec::new())
    }
}

/// The parts of a prototype `lower_func` reads.
#[derive(Copy, Clone, Debug)]
struct FnSig {
    node: NodeId,
    params: ListRange,
    /// `None` for tests, which return `!void`.
    ret: Option<NodeId>,
    align: Option<NodeId>,
    callconv: Option<NodeId>,
    flags: FuncFlags,
}

impl FnSig {
    fn from_proto(node: NodeId, proto: &FnProto) -> Self {
        let mut flags = FuncFlags::empty();
        flags.set(FuncFlags::IS_INFERRED_ERROR, proto.inferred_error_set);
        flags.set(FuncFlags::IS_VAR_ARGS, proto.is_var_args);
        flags.set(FuncFlags::IS_EXTERN, proto.is_extern);
        flags.set(FuncFlags::IS_EXPORT, proto.is_export);
        flags.set(FuncFlags::IS_INLINE, proto.is_inline);
        FnSig {
            node,
            params: proto.params,
            ret: Some(proto.return_type),
            align: proto.align,
            callconv: proto.callconv,
            flags,
        }
    }
}

/// Container-wide facts the field lowering consults.
#[derive(Copy, Clone, Debug)]
struct ContainerShape {
    node: NodeId,
    kind: ContainerKind,
    decl: ContainerDecl,
    decl_inst: InstIndex,
    decl_line: u32,
    ns_scope: ScopeId,
    /// The argument when it elided to a constant.
    arg_ty: Ref,
}

fn layout_code(layout: Layout) -> u32 {
    match layout {
        Layout::Auto => 0,
        Layout::Extern => 1,
        Layout::Packed => 2,
    }
}

fn layout_keyword(layout: Layout) -> &'static str {
    match layout {
        Layout::Auto => "auto",
        Layout::Extern => "extern",
        Layout::Packed => "packed",
    }
}

impl Lowerer<'_> {
    // === Root ===

    /// Lower the file as the root struct. Instruction 0 is always the root
    /// container, even when the root itself fails.
    pub(crate) fn lower_root(&mut self) -> LowerResult<()> {
        let ast = self.ast;
        let members = match ast.kind(NodeId::ROOT) {
            NodeKind::Root { members } => members,
            _ => ListRange::EMPTY,
        };
        let decl = ContainerDecl {
            kind: ContainerKind::Struct,
            layout: Layout::Auto,
            arg: None,
            auto_enum_tag: false,
            members,
        };
        let arena = self.arena_mark();
        let mark = self.store.mark();
        let gz = self.root_block(ScopeId::TOP, NodeId::ROOT, 0, true)?;
        match self.container_decl(gz, ScopeId::TOP, NodeId::ROOT, decl) {
            Ok(_) => {}
            Err(LowerError::AnalysisFail(_)) => {
                tracing::debug!("root container failed, emitting an empty struct");
                self.store.rollback(mark);
                self.empty_root()?;
            }
            Err(err) => return Err(err),
        }
        self.reset_arena(arena);
        Ok(())
    }

    fn empty_root(&mut self) -> LowerResult<()> {
        let inst = self.store.reserve()?;
        let payload_index = self.store.add_extra(&ContainerPayload {
            fields_hash_0: 0,
            fields_hash_1: 0,
            fields_hash_2: 0,
            fields_hash_3: 0,
            src_line: 0,
            src_node: 0,
            flags: ContainerFlags::empty(),
            layout: 0,
            captures_len: 0,
            fields_len: 0,
            decls_len: 0,
            arg: 0,
        })?;
        self.store.set(
            inst,
            InstTag::StructDecl,
            InstData::PlNode {
                src_node: 0,
                payload_index,
            },
        );
        Ok(())
    }

    // === Containers ===

    pub(crate) fn container_decl_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        idx: ContainerDeclIdx,
    ) -> LowerResult<Ref> {
        let decl = *self.ast.container_decl(idx);
        let inst = self.container_decl(gz, scope, node, decl)?;
        self.rvalue(gz, ri, inst.to_ref(), node)
    }

    /// Assemble a container; its instruction joins `gz`'s body.
    #[tracing::instrument(level = "debug", skip_all, fields(kind = decl.kind.keyword(), node = node.raw()))]
    fn container_decl(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        decl: ContainerDecl,
    ) -> LowerResult<InstIndex> {
        let decl_inst = self.store.reserve()?;
        self.instructions.push(decl_inst);
        let saved = std::mem::replace(&mut self.src_hasher, SourceHasher::new());
        let result = self.container_body(gz, scope, node, decl, decl_inst);
        self.src_hasher = saved;
        result?;
        Ok(decl_inst)
    }

    fn container_body(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        decl: ContainerDecl,
        decl_inst: InstIndex,
    ) -> LowerResult<()> {
        let ast = self.ast;
        let members: SmallVec<[NodeId; 16]> = ast.node_list(decl.members).iter().copied().collect();
        self.check_container_shape(node, decl)?;
        let is_tuple = self.check_tuple_fields(node, decl, &members)?;

        self.cursor.advance_to(ast.token_start(ast.first_token(node)));
        let src_line = self.cursor.line();

        let ns_scope = self.push_scope(Scope::Namespace(NamespaceScope::new(scope, node, decl_inst)))?;
        let member_names = self.scan_container(ns_scope, node, decl.kind, &members)?;

        self.src_hasher.update(decl.kind.keyword().as_bytes());
        self.src_hasher.update_u32(layout_code(decl.layout));
        self.src_hasher.update_bool(decl.auto_enum_tag);

        let mut flags = ContainerFlags::empty();
        flags.set(ContainerFlags::IS_TUPLE, is_tuple);
        flags.set(ContainerFlags::AUTO_ENUM_TAG, decl.auto_enum_tag);

        let mut arg_ty = Ref::NONE;
        let mut arg_word = 0;
        let mut arg_body = Vec::new();
        if let Some(arg) = decl.arg {
            flags |= ContainerFlags::HAS_ARG;
            self.src_hasher.update(ast.node_source(arg).as_bytes());
            let arg_gz = self.root_block(ns_scope, node, src_line, true)?;
            match self.finish_member_body(arg_gz, decl_inst, ResultInfo::TYPE, arg, true)? {
                MemberBody::Direct(ty) => {
                    flags |= ContainerFlags::ARG_IS_REF;
                    arg_ty = ty;
                    arg_word = ty.raw();
                }
                MemberBody::Body(words) => {
                    arg_word = to_u32(words.len())?;
                    arg_body = words;
                }
            }
        }

        let shape = ContainerShape {
            node,
            kind: decl.kind,
            decl,
            decl_inst,
            decl_line: src_line,
            ns_scope,
            arg_ty,
        };
        let mut decls: Vec<u32> = Vec::new();
        let mut fields: Vec<FieldRecord> = Vec::new();
        let mut field_bodies: Vec<u32> = Vec::new();
        for (i, &member) in members.iter().enumerate() {
            match ast.kind(member) {
                NodeKind::ContainerField(idx) => {
                    let field = *ast.container_field(idx);
                    self.src_hasher.update(ast.node_source(member).as_bytes());
                    if let Some(record) =
                        self.container_field(shape, &members[i + 1..], member, field, &mut flags, &mut field_bodies)?
                    {
                        fields.push(record);
                    }
                }
                _ => {
                    let name = member_names.get(i).copied().unwrap_or_default();
                    decls.push(self.member_decl(ns_scope, member, name)?.raw());
                }
            }
        }

        let fields_hash = self.src_hasher.finish();
        let captures = self
            .namespace(ns_scope)
            .map(|ns| ns.captures.clone())
            .unwrap_or_default();
        let src_node = self.rel_node(gz, node);
        let payload_index = self.store.add_extra(&ContainerPayload {
            fields_hash_0: fields_hash[0],
            fields_hash_1: fields_hash[1],
            fields_hash_2: fields_hash[2],
            fields_hash_3: fields_hash[3],
            src_line,
            src_node,
            flags,
            layout: layout_code(decl.layout),
            captures_len: to_u32(captures.len())?,
            fields_len: to_u32(fields.len())?,
            decls_len: to_u32(decls.len())?,
            arg: arg_word,
        })?;
        for (capture, name) in captures {
            self.store.push_extra(capture.to_u32())?;
            self.store.push_extra(name.raw())?;
        }
        self.store.extend_extra(&decls)?;
        self.store.extend_extra(&arg_body)?;
        for record in &fields {
            self.store.add_extra(record)?;
        }
        self.store.extend_extra(&field_bodies)?;

        let tag = match decl.kind {
            ContainerKind::Struct => InstTag::StructDecl,
            ContainerKind::Union => InstTag::UnionDecl,
            ContainerKind::Enum => InstTag::EnumDecl,
            ContainerKind::Opaque => InstTag::OpaqueDecl,
        };
        self.store.set(
            decl_inst,
            tag,
            InstData::PlNode {
                src_node,
                payload_index,
            },
        );
        tracing::trace!(
            fields = fields.len(),
            decls = decls.len(),
            tuple = is_tuple,
            "container assembled"
        );
        Ok(())
    }

    /// Layout and argument combinations the container kind allows.
    fn check_container_shape(&mut self, node: NodeId, decl: ContainerDecl) -> LowerResult<()> {
        let keyword = decl.kind.keyword();
        if matches!(decl.kind, ContainerKind::Enum | ContainerKind::Opaque) && decl.layout != Layout::Auto {
            return self.fail_node(
                node,
                ErrorCode::E4007,
                format!("{keyword} types cannot be {}", layout_keyword(decl.layout)),
            );
        }
        if decl.auto_enum_tag && decl.kind != ContainerKind::Union {
            return self.fail_node(node, ErrorCode::E4004, format!("{keyword} types cannot have an inferred tag"));
        }
        match (decl.kind, decl.arg) {
            (ContainerKind::Struct, Some(arg)) if decl.layout != Layout::Packed => self.fail_node(
                arg,
                ErrorCode::E4004,
                "non-packed struct does not support backing integer type",
            ),
            (ContainerKind::Opaque, Some(arg)) => {
                self.fail_node(arg, ErrorCode::E4004, "opaque types do not support a tag type")
            }
            _ => Ok(()),
        }
    }

    /// Whether a struct is a tuple: every field unnamed, no declarations.
    fn check_tuple_fields(&mut self, node: NodeId, decl: ContainerDecl, members: &[NodeId]) -> LowerResult<bool> {
        if decl.kind != ContainerKind::Struct {
            return Ok(false);
        }
        let ast = self.ast;
        let mut first_named: Option<NodeId> = None;
        let mut first_unnamed: Option<NodeId> = None;
        let mut first_decl: Option<NodeId> = None;
        for &member in members {
            match ast.kind(member) {
                NodeKind::ContainerField(idx) => {
                    let named = ast.container_field(idx).name.is_some();
                    match (named, first_named, first_unnamed) {
                        (true, _, Some(tuple_field)) => {
                            let note = self.note_node(tuple_field, "tuple field here");
                            return self.fail_node_notes(member, ErrorCode::E4005, "tuple field has a name", vec![note]);
                        }
                        (false, Some(named_field), _) => {
                            let note = self.note_node(named_field, "named field here");
                            return self.fail_node_notes(
                                member,
                                ErrorCode::E4005,
                                "tuple field has no name",
                                vec![note],
                            );
                        }
                        (true, None, None) => first_named = Some(member),
                        (false, None, None) => first_unnamed = Some(member),
                        _ => {}
                    }
                }
                NodeKind::TestDecl { .. } | NodeKind::Comptime { .. } => {}
                _ => {
                    first_decl.get_or_insert(member);
                }
            }
        }
        match (first_unnamed, first_decl) {
            (Some(_), Some(decl_node)) => {
                let note = self.note_node(node, "tuple declared here");
                self.fail_node_notes(
                    decl_node,
                    ErrorCode::E4005,
                    "tuple declarations cannot contain declarations",
                    vec![note],
                )
            }
            (tuple, _) => Ok(tuple.is_some()),
        }
    }

    /// Record member names in the namespace and report collisions. Returns
    /// each member's name (empty for unnamed members) for placeholders.
    fn scan_container(
        &mut self,
        ns_scope: ScopeId,
        node: NodeId,
        kind: ContainerKind,
        members: &[NodeId],
    ) -> LowerResult<Vec<NullTerminatedString>> {
        let ast = self.ast;
        let mut names = Vec::with_capacity(members.len());
        let mut seen: FxHashMap<NullTerminatedString, SmallVec<[TokenIndex; 2]>> = FxHashMap::default();
        let mut order: Vec<NullTerminatedString> = Vec::new();
        let mut tests: FxHashMap<(bool, NullTerminatedString), SmallVec<[TokenIndex; 2]>> = FxHashMap::default();
        let mut test_order: Vec<(bool, NullTerminatedString)> = Vec::new();

        for &member in members {
            let (name_tok, is_decl) = match ast.kind(member) {
                NodeKind::VarDecl(idx) => (Some(ast.var_decl(idx).name), true),
                NodeKind::FnDecl { .. } | NodeKind::FnProto(_) => {
                    (ast.full_fn_proto(member).and_then(|proto| proto.name), true)
                }
                NodeKind::ContainerField(idx) => (ast.container_field(idx).name, false),
                NodeKind::TestDecl { name: Some(tok), .. } => {
                    names.push(NullTerminatedString::EMPTY);
                    let is_decltest = ast.token(tok).tag != TokenTag::StringLiteral;
                    let bytes = if is_decltest {
                        identifier_bytes(ast.token_slice(tok))
                    } else {
                        parse_string_literal(ast.token_slice(tok))
                    };
                    // Malformed names are reported by the test itself.
                    if let Ok(bytes) = bytes {
                        if !bytes.is_empty() && !bytes.contains(&0) {
                            let key = (is_decltest, self.strings.intern(&bytes)?);
                            let entry = tests.entry(key).or_default();
                            if entry.is_empty() {
                                test_order.push(key);
                            }
                            entry.push(tok);
                        }
                    }
                    continue;
                }
                _ => (None, false),
            };
            let Some(tok) = name_tok else {
                names.push(NullTerminatedString::EMPTY);
                continue;
            };
            // Malformed identifiers are reported when the member is lowered.
            let Ok(bytes) = identifier_bytes(ast.token_slice(tok)) else {
                names.push(NullTerminatedString::EMPTY);
                continue;
            };
            let name = self.strings.intern(&bytes)?;
            names.push(name);

            if is_decl {
                let spelling = ast.token_slice(tok);
                if !spelling.starts_with('@') && is_primitive(spelling.as_bytes()) {
                    let note = self.note_tok(tok, format!("consider using @\"{spelling}\" to disambiguate"));
                    self.append_error_tok(
                        tok,
                        ErrorCode::E1005,
                        format!("name shadows primitive '{spelling}'"),
                        vec![note],
                    );
                }
                let outer = self.namespace(ns_scope).map(|ns| ns.parent);
                if let Some(outer) = outer {
                    if let Some((prev_tok, prev_cat)) = self.outer_local(outer, name) {
                        let text = self.name_text(name);
                        let note = self.note_tok(prev_tok, "previous declaration here");
                        self.append_error_tok(
                            tok,
                            ErrorCode::E1003,
                            format!("declaration '{text}' shadows {} from outer scope", prev_cat.as_str()),
                            vec![note],
                        );
                    }
                }
                if let Scope::Namespace(ns) = &mut self.scopes[ns_scope.index()] {
                    ns.decls.entry(name).or_insert(member);
                }
            }

            let entry = seen.entry(name).or_default();
            if entry.is_empty() {
                order.push(name);
            }
            entry.push(tok);
        }

        let keyword = kind.keyword();
        for name in order {
            let Some(toks) = seen.get(&name).filter(|toks| toks.len() > 1).cloned() else {
                continue;
            };
            let text = self.name_text(name);
            let mut notes: Vec<_> = toks[1..]
                .iter()
                .map(|&tok| self.note_tok(tok, "duplicate name here"))
                .collect();
            notes.push(self.note_node(node, format!("{keyword} declared here")));
            self.append_error_tok(
                toks[0],
                ErrorCode::E4001,
                format!("duplicate {keyword} member name '{text}'"),
                notes,
            );
        }
        for key in test_order {
            let Some(toks) = tests.get(&key).filter(|toks| toks.len() > 1).cloned() else {
                continue;
            };
            let text = self.name_text(key.1);
            let notes = toks[1..]
                .iter()
                .map(|&tok| self.note_tok(tok, "duplicate test here"))
                .collect();
            let message = if key.0 {
                format!("duplicate decltest '{text}'")
            } else {
                format!("duplicate test name '{text}'")
            };
            self.append_error_tok(toks[0], ErrorCode::E4002, message, notes);
        }
        Ok(names)
    }

    /// The local named `name` visible from `scope`, across namespaces.
    fn outer_local(&self, scope: ScopeId, name: NullTerminatedString) -> Option<(TokenIndex, IdCat)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            match &self.scopes[id.index()] {
                Scope::LocalVal(local) if local.name == name => return Some((local.token, local.id_cat)),
                Scope::LocalPtr(local) if local.name == name => return Some((local.token, local.id_cat)),
                other => current = other.parent(),
            }
        }
        None
    }

    /// Whether some namespace enclosing `scope` declares `name`.
    fn namespace_declares(&self, scope: ScopeId, name: NullTerminatedString) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = &self.scopes[id.index()];
            if let Scope::Namespace(ns) = entry {
                if ns.decls.contains_key(&name) {
                    return true;
                }
            }
            current = entry.parent();
        }
        false
    }

    /// Lower one field. `rest` are the members after it. The `_` marker
    /// of a non-exhaustive enum yields no record.
    fn container_field(
        &mut self,
        shape: ContainerShape,
        rest: &[NodeId],
        member: NodeId,
        field: ContainerField,
        flags: &mut ContainerFlags,
        bodies: &mut Vec<u32>,
    ) -> LowerResult<Option<FieldRecord>> {
        let ast = self.ast;
        let keyword = shape.kind.keyword();
        match shape.kind {
            ContainerKind::Opaque => {
                let note = self.note_node(shape.node, "opaque declared here");
                return self.fail_node_notes(member, ErrorCode::E4004, "opaque types cannot have fields", vec![note]);
            }
            ContainerKind::Enum => {
                if let Some(ty) = field.ty {
                    return self.fail_node(ty, ErrorCode::E4004, "enum fields do not have types");
                }
                if let Some(align) = field.align {
                    return self.fail_node(align, ErrorCode::E4004, "enum fields cannot be aligned");
                }
            }
            ContainerKind::Union => {
                if field.value.is_some() && !shape.decl.auto_enum_tag && shape.decl.arg.is_none() {
                    return self.fail_node(
                        member,
                        ErrorCode::E4004,
                        "explicitly valued union field requires an enum tag type",
                    );
                }
            }
            ContainerKind::Struct => {
                if field.ty.is_none() {
                    return self.fail_node(member, ErrorCode::E4004, "struct field missing type");
                }
            }
        }
        if field.is_comptime && shape.kind != ContainerKind::Struct {
            return self.fail_node(
                member,
                ErrorCode::E4004,
                format!("{keyword} fields cannot be marked comptime"),
            );
        }

        let mut field_flags = FieldFlags::empty();
        let name = match field.name {
            Some(tok) => {
                field_flags |= FieldFlags::HAS_NAME;
                self.ident_name(tok)?
            }
            None if shape.kind == ContainerKind::Struct => NullTerminatedString::EMPTY,
            None => return self.fail_node(member, ErrorCode::E4004, format!("{keyword} field missing name")),
        };

        if shape.kind == ContainerKind::Enum {
            if let Some(tok) = field.name.filter(|&tok| self.is_discard(tok)) {
                if let Some(value) = field.value {
                    return self.fail_node(
                        value,
                        ErrorCode::E4004,
                        "'_' is used to mark an enum as non-exhaustive and cannot be assigned a value",
                    );
                }
                let later_field = rest
                    .iter()
                    .any(|&other| matches!(ast.kind(other), NodeKind::ContainerField(_)));
                if later_field {
                    return self.fail_tok(tok, ErrorCode::E4004, "'_' field of non-exhaustive enum must be last");
                }
                if shape.decl.arg.is_none() {
                    let note = self.note_tok(tok, "marked non-exhaustive here");
                    return self.fail_node_notes(
                        shape.node,
                        ErrorCode::E4004,
                        "non-exhaustive enum missing integer tag type",
                        vec![note],
                    );
                }
                *flags |= ContainerFlags::NONEXHAUSTIVE;
                return Ok(None);
            }
        }

        if field.is_comptime {
            field_flags |= FieldFlags::IS_COMPTIME;
            *flags |= ContainerFlags::ANY_COMPTIME_FIELD;
        }

        let mut type_ref = match shape.kind {
            ContainerKind::Union => Ref::VOID_TYPE,
            _ => Ref::NONE,
        };
        let mut type_body_len = 0;
        if let Some(ty) = field.ty {
            let type_gz = self.root_block(shape.ns_scope, shape.node, shape.decl_line, true)?;
            match self.finish_member_body(type_gz, shape.decl_inst, ResultInfo::TYPE, ty, true)? {
                MemberBody::Direct(direct) => type_ref = direct,
                MemberBody::Body(words) => {
                    field_flags |= FieldFlags::HAS_TYPE_BODY;
                    type_ref = Ref::NONE;
                    type_body_len = to_u32(words.len())?;
                    bodies.extend(words);
                }
            }
        }

        let mut align_body_len = 0;
        if let Some(align) = field.align {
            field_flags |= FieldFlags::HAS_ALIGN;
            *flags |= ContainerFlags::ANY_ALIGNED_FIELD;
            let align_gz = self.root_block(shape.ns_scope, shape.node, shape.decl_line, true)?;
            let words = self
                .finish_member_body(align_gz, shape.decl_inst, ResultInfo::coerced_ty(Ref::U29_TYPE), align, false)?
                .into_words();
            align_body_len = to_u32(words.len())?;
            bodies.extend(words);
        }

        let mut value_body_len = 0;
        if let Some(value) = field.value {
            field_flags |= FieldFlags::HAS_VALUE;
            if shape.kind == ContainerKind::Struct {
                *flags |= ContainerFlags::ANY_DEFAULT_VALUE;
            }
            let value_ty = match shape.kind {
                ContainerKind::Enum => shape.arg_ty,
                _ => type_ref,
            };
            let ri = if value_ty == Ref::NONE || value_ty == Ref::VOID_TYPE {
                ResultInfo::NONE
            } else {
                ResultInfo::coerced_ty(value_ty)
            };
            let value_gz = self.root_block(shape.ns_scope, shape.node, shape.decl_line, true)?;
            let words = self
                .finish_member_body(value_gz, shape.decl_inst, ri, value, false)?
                .into_words();
            value_body_len = to_u32(words.len())?;
            bodies.extend(words);
        }

        Ok(Some(FieldRecord {
            name,
            flags: field_flags,
            type_ref,
            type_body_len,
            align_body_len,
            value_body_len,
        }))
    }

    /// Lower `node` into `gz` and close it with a `break_inline` to
    /// `target`. With `elide_constant`, an expression that emitted nothing
    /// is returned directly instead of as a one-break body.
    fn finish_member_body(
        &mut self,
        gz: BlockId,
        target: InstIndex,
        ri: ResultInfo,
        node: NodeId,
        elide_constant: bool,
    ) -> LowerResult<MemberBody> {
        let scope = self.block_scope(gz);
        let result = self.reachable_expr(gz, scope, ri, node, node)?;
        if elide_constant && self.is_empty_block(gz) {
            self.unstack(gz);
            return Ok(MemberBody::Direct(result));
        }
        if !self.ends_with_noreturn(gz) {
            self.add_break(gz, InstTag::BreakInline, target, result, Some(node))?;
        }
        Ok(MemberBody::Body(self.take_body(gz)?))
    }

    /// A body that only breaks `value` out to `target`.
    fn constant_body(
        &mut self,
        ns_scope: ScopeId,
        decl_node: NodeId,
        decl_line: u32,
        target: InstIndex,
        value: Ref,
        operand_node: NodeId,
    ) -> LowerResult<Vec<u32>> {
        let gz = self.root_block(ns_scope, decl_node, decl_line, true)?;
        self.add_break(gz, InstTag::BreakInline, target, value, Some(operand_node))?;
        self.take_body(gz)
    }

    // === Declarations ===

    /// Lower one non-field member into a `declaration`, or a placeholder
    /// when its lowering fails.
    fn member_decl(
        &mut self,
        ns_scope: ScopeId,
        member: NodeId,
        name_hint: NullTerminatedString,
    ) -> LowerResult<InstIndex> {
        let ast = self.ast;
        let decl_inst = self.store.reserve()?;
        let store_mark = self.store.mark();
        let sink_mark = self.sink.mark();
        let arena = self.arena_mark();
        let saved_fn_ctx = self.fn_ctx.take();
        let saved_hasher = std::mem::replace(&mut self.src_hasher, SourceHasher::new());
        self.src_hasher.update(ast.node_source(member).as_bytes());

        self.cursor.advance_to(ast.token_start(ast.first_token(member)));
        let src_line = self.cursor.line();
        let src_column = self.cursor.column();

        let result = self.member_decl_parts(ns_scope, member, decl_inst, src_line);

        self.fn_ctx = saved_fn_ctx;
        self.reset_arena(arena);
        let src_hash = std::mem::replace(&mut self.src_hasher, saved_hasher).finish();
        let parts = match result {
            Ok(parts) => parts,
            Err(LowerError::AnalysisFail(_)) => {
                self.store.rollback(store_mark);
                let errors = self.sink.errors_since(sink_mark);
                debug_assert!(errors > 0, "declaration failed without recording an error");
                tracing::debug!(member = member.raw(), errors, "declaration failed, emitting placeholder");
                DeclParts::placeholder(name_hint)
            }
            Err(err) => return Err(err),
        };

        let payload_index = self.store.add_extra(&DeclarationPayload {
            src_hash_0: src_hash[0],
            src_hash_1: src_hash[1],
            src_hash_2: src_hash[2],
            src_hash_3: src_hash[3],
            flags: parts.flags,
            kind: parts.kind as u32,
            name: parts.name,
            src_line,
            src_column,
            value_body_len: to_u32(parts.value.len())?,
            type_body_len: to_u32(parts.ty.len())?,
            align_body_len: to_u32(parts.align.len())?,
        })?;
        self.store.extend_extra(&parts.value)?;
        self.store.extend_extra(&parts.ty)?;
        self.store.extend_extra(&parts.align)?;
        self.store.set(
            decl_inst,
            InstTag::Declaration,
            InstData::Declaration {
                src_node: member.raw(),
                payload_index,
            },
        );
        Ok(decl_inst)
    }

    fn member_decl_parts(
        &mut self,
        ns_scope: ScopeId,
        member: NodeId,
        decl_inst: InstIndex,
        src_line: u32,
    ) -> LowerResult<DeclParts> {
        let ast = self.ast;
        match ast.kind(member) {
            NodeKind::VarDecl(idx) => self.global_var_decl(ns_scope, member, *ast.var_decl(idx), decl_inst, src_line),
            NodeKind::FnDecl { proto, body } => self.fn_decl(ns_scope, member, proto, Some(body), decl_inst, src_line),
            NodeKind::FnProto(_) => self.fn_decl(ns_scope, member, member, None, decl_inst, src_line),
            NodeKind::TestDecl { name, body } => self.test_decl(ns_scope, member, name, body, decl_inst, src_line),
            NodeKind::Comptime { expr } => {
                let decl_gz = self.root_block(ns_scope, member, src_line, true)?;
                let scope = self.block_scope(decl_gz);
                let result = self.expr(decl_gz, scope, ResultInfo::NONE, expr)?;
                if !self.ends_with_noreturn(decl_gz) && !self.ref_is_noreturn(result) {
                    self.add_break(decl_gz, InstTag::BreakInline, decl_inst, Ref::VOID_VALUE, None)?;
                }
                let value = self.take_body(decl_gz)?;
                Ok(DeclParts::value(DeclKind::Comptime, NullTerminatedString::EMPTY, value))
            }
            NodeKind::UsingNamespace { expr } => {
                let decl_gz = self.root_block(ns_scope, member, src_line, true)?;
                let value = self
                    .finish_member_body(decl_gz, decl_inst, ResultInfo::TYPE, expr, false)?
                    .into_words();
                Ok(DeclParts::value(DeclKind::UsingNamespace, NullTerminatedString::EMPTY, value))
            }
            _ => self.fail_node(member, ErrorCode::E9001, "expected container member"),
        }
    }

    fn global_var_decl(
        &mut self,
        ns_scope: ScopeId,
        member: NodeId,
        var: VarDecl,
        decl_inst: InstIndex,
        src_line: u32,
    ) -> LowerResult<DeclParts> {
        let name = self.ident_name(var.name)?;
        let keyword = if var.is_const { "const" } else { "var" };
        if var.is_comptime {
            return self.fail_node(
                member,
                ErrorCode::E4007,
                format!("'comptime {keyword}' is redundant in container scope"),
            );
        }
        if var.is_threadlocal && var.is_const {
            return self.fail_node(member, ErrorCode::E4007, "threadlocal variable cannot be constant");
        }
        if let Some(lib_name) = var.lib_name.filter(|_| !var.is_extern) {
            return self.fail_tok(lib_name, ErrorCode::E4007, "library name requires 'extern'");
        }
        match (var.init, var.is_extern) {
            (Some(init), true) => {
                return self.fail_node(init, ErrorCode::E4007, "extern variables have no initializers");
            }
            (None, false) => {
                return self.fail_node(member, ErrorCode::E4003, "variables must be initialized");
            }
            (None, true) if var.ty.is_none() => {
                return self.fail_node(member, ErrorCode::E4003, "unable to infer variable type");
            }
            _ => {}
        }

        let mut value_ri = ResultInfo::NONE;
        let ty = match var.ty {
            Some(ty) => {
                let type_gz = self.root_block(ns_scope, member, src_line, true)?;
                match self.finish_member_body(type_gz, decl_inst, ResultInfo::TYPE, ty, true)? {
                    MemberBody::Direct(direct) => {
                        value_ri = ResultInfo::coerced_ty(direct);
                        self.constant_body(ns_scope, member, src_line, decl_inst, direct, ty)?
                    }
                    MemberBody::Body(words) => words,
                }
            }
            None => Vec::new(),
        };
        let align = match var.align {
            Some(align) => {
                let align_gz = self.root_block(ns_scope, member, src_line, true)?;
                self.finish_member_body(align_gz, decl_inst, ResultInfo::coerced_ty(Ref::U29_TYPE), align, false)?
                    .into_words()
            }
            None => Vec::new(),
        };
        let value = match var.init {
            Some(init) => {
                let value_gz = self.root_block(ns_scope, member, src_line, true)?;
                let ri = value_ri.with_ctx(ResultCtx::ConstInit);
                self.finish_member_body(value_gz, decl_inst, ri, init, false)?
                    .into_words()
            }
            None => Vec::new(),
        };

        let mut flags = DeclFlags::empty();
        flags.set(DeclFlags::IS_PUB, var.is_pub);
        flags.set(DeclFlags::IS_EXTERN, var.is_extern);
        flags.set(DeclFlags::IS_EXPORT, var.is_export);
        flags.set(DeclFlags::IS_THREADLOCAL, var.is_threadlocal);
        flags.set(DeclFlags::HAS_LIB_NAME, var.lib_name.is_some());
        Ok(DeclParts {
            kind: if var.is_const { DeclKind::Const } else { DeclKind::Var },
            name,
            flags,
            value,
            ty,
            align,
        })
    }

    fn fn_decl(
        &mut self,
        ns_scope: ScopeId,
        member: NodeId,
        proto_node: NodeId,
        body: Option<NodeId>,
        decl_inst: InstIndex,
        src_line: u32,
    ) -> LowerResult<DeclParts> {
        let ast = self.ast;
        let Some(&proto) = ast.full_fn_proto(proto_node) else {
            return self.fail_node(member, ErrorCode::E9001, "expected function prototype");
        };
        let Some(name_tok) = proto.name else {
            return self.fail_node(member, ErrorCode::E4003, "missing function name");
        };
        let name = self.ident_name(name_tok)?;
        match body {
            Some(body) if proto.is_extern => {
                return self.fail_node(body, ErrorCode::E4007, "extern functions have no body");
            }
            None if !proto.is_extern => {
                return self.fail_node(member, ErrorCode::E4003, "non-extern function has no body");
            }
            _ => {}
        }
        if proto.is_var_args && !proto.is_extern {
            return self.fail_node(member, ErrorCode::E4006, "non-extern function is variadic");
        }
        if let Some(lib_name) = proto.lib_name.filter(|_| !proto.is_extern) {
            return self.fail_tok(lib_name, ErrorCode::E4007, "library name requires 'extern'");
        }

        let decl_gz = self.root_block(ns_scope, member, src_line, true)?;
        let mut sig = FnSig::from_proto(proto_node, &proto);
        if self.needs_result_ptr(proto_node) {
            sig.flags |= FuncFlags::RET_NEEDS_PTR;
        }
        let func = self.lower_func(decl_gz, sig, body, decl_inst)?;
        self.add_break(decl_gz, InstTag::BreakInline, decl_inst, func.to_ref(), None)?;
        let value = self.take_body(decl_gz)?;

        let mut flags = DeclFlags::empty();
        flags.set(DeclFlags::IS_PUB, proto.is_pub);
        flags.set(DeclFlags::IS_EXTERN, proto.is_extern);
        flags.set(DeclFlags::IS_EXPORT, proto.is_export);
        flags.set(DeclFlags::IS_INLINE, proto.is_inline);
        flags.set(DeclFlags::HAS_LIB_NAME, proto.lib_name.is_some());
        Ok(DeclParts {
            flags,
            ..DeclParts::value(DeclKind::Const, name, value)
        })
    }

    fn test_decl(
        &mut self,
        ns_scope: ScopeId,
        member: NodeId,
        name_tok: Option<TokenIndex>,
        body: NodeId,
        decl_inst: InstIndex,
        src_line: u32,
    ) -> LowerResult<DeclParts> {
        let ast = self.ast;
        let (kind, name) = match name_tok {
            None => (DeclKind::Test, NullTerminatedString::EMPTY),
            Some(tok) if ast.token(tok).tag == TokenTag::StringLiteral => {
                let bytes = match parse_string_literal(ast.token_slice(tok)) {
                    Ok(bytes) => bytes,
                    Err(err) => return self.fail_tok(tok, ErrorCode::E3005, err.message),
                };
                if bytes.is_empty() {
                    return self.fail_tok(tok, ErrorCode::E4003, "empty test name must be omitted");
                }
                if bytes.contains(&0) {
                    return self.fail_tok(tok, ErrorCode::E4003, "test name cannot contain null bytes");
                }
                (DeclKind::NamedTest, self.strings.intern(&bytes)?)
            }
            Some(tok) => {
                let name = self.ident_name(tok)?;
                let spelling = ast.token_slice(tok);
                if !spelling.starts_with('@') && is_primitive(spelling.as_bytes()) {
                    return self.fail_tok(tok, ErrorCode::E1005, "cannot test a primitive");
                }
                if !self.namespace_declares(ns_scope, name) {
                    let text = self.name_text(name);
                    return self.fail_tok(tok, ErrorCode::E1001, format!("use of undeclared identifier '{text}'"));
                }
                (DeclKind::DeclTest, name)
            }
        };

        let decl_gz = self.root_block(ns_scope, member, src_line, true)?;
        let sig = FnSig {
            node: member,
            params: ListRange::EMPTY,
            ret: None,
            align: None,
            callconv: None,
            flags: FuncFlags::IS_TEST | FuncFlags::IS_INFERRED_ERROR,
        };
        let func = self.lower_func(decl_gz, sig, Some(body), decl_inst)?;
        self.add_break(decl_gz, InstTag::BreakInline, decl_inst, func.to_ref(), None)?;
        let value = self.take_body(decl_gz)?;
        Ok(DeclParts::value(kind, name, value))
    }

    // === Functions ===

    /// A function type expression, `fn (u32) void`.
    pub(crate) fn fn_proto_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        idx: FnProtoIdx,
    ) -> LowerResult<Ref> {
        let proto = *self.ast.fn_proto(idx);
        if let Some(name) = proto.name {
            return self.fail_tok(name, ErrorCode::E4006, "function type cannot have a name");
        }
        if proto.inferred_error_set {
            return self.fail_node(
                proto.return_type,
                ErrorCode::E4006,
                "function type cannot have an inferred error set",
            );
        }
        if proto.is_extern || proto.is_export || proto.is_inline {
            return self.fail_node(node, ErrorCode::E4007, "function type cannot have modifiers");
        }
        let block_inst = self.make_block_inst(gz, InstTag::BlockInline, node)?;
        let block_scope = self.make_comptime_sub_block(gz, scope)?;
        let sig = FnSig::from_proto(node, &proto);
        let func = self.lower_func(block_scope, sig, None, block_inst)?;
        self.add_break(block_scope, InstTag::BreakInline, block_inst, func.to_ref(), Some(node))?;
        self.set_block_body(block_scope, block_inst)?;
        self.instructions.push(block_inst);
        self.rvalue(gz, ri, block_inst.to_ref(), node)
    }

    /// Emit the parameters of `sig` into `decl_gz`, then the `func`
    /// instruction itself.
    #[tracing::instrument(level = "debug", skip_all, fields(node = sig.node.raw(), has_body = body.is_some()))]
    fn lower_func(
        &mut self,
        decl_gz: BlockId,
        sig: FnSig,
        body: Option<NodeId>,
        param_block: InstIndex,
    ) -> LowerResult<InstIndex> {
        let ast = self.ast;
        let func_inst = self.store.reserve()?;

        let params_base = self.block_scope(decl_gz);
        let mut params_scope = params_base;
        let mut any_generic = false;
        let params: SmallVec<[FnParam; 8]> = ast.fn_params(sig.params).iter().copied().collect();
        for param in params {
            params_scope = self.fn_param(decl_gz, params_scope, param, &mut any_generic)?;
        }

        // The return type follows `align` and `callconv` in the source.
        let before_ret = self.cursor.save();
        let ret = match sig.ret {
            Some(ret_node) => {
                let ret_gz = self.make_comptime_sub_block(decl_gz, params_scope)?;
                self.finish_member_body(ret_gz, func_inst, ResultInfo::TYPE, ret_node, true)?
            }
            None => MemberBody::Direct(Ref::VOID_TYPE),
        };
        self.cursor.restore(before_ret);
        let align = match sig.align {
            Some(align) => {
                let align_gz = self.make_comptime_sub_block(decl_gz, params_scope)?;
                self.finish_member_body(align_gz, func_inst, ResultInfo::coerced_ty(Ref::U29_TYPE), align, false)?
                    .into_words()
            }
            None => Vec::new(),
        };
        let cc = match sig.callconv {
            Some(cc) => {
                let cc_gz = self.make_comptime_sub_block(decl_gz, params_scope)?;
                let ri = ResultInfo::coerced_ty(Ref::CALLING_CONVENTION_TYPE);
                self.finish_member_body(cc_gz, func_inst, ri, cc, false)?
                    .into_words()
            }
            None => Vec::new(),
        };

        let mut flags = sig.flags;
        flags.set(FuncFlags::HAS_ALIGN, !align.is_empty());
        flags.set(FuncFlags::HAS_CC, !cc.is_empty());
        flags.set(FuncFlags::IS_PROTO, body.is_none());

        let (body_words, lbrace, rbrace) = match body {
            Some(body) => {
                let direct_ret = match ret {
                    MemberBody::Direct(ty) if !flags.contains(FuncFlags::IS_INFERRED_ERROR) => Some(ty),
                    _ => None,
                };
                self.func_body(decl_gz, params_base, params_scope, sig.node, body, direct_ret)?
            }
            None => (Vec::new(), (0, 0), (0, 0)),
        };

        let proto_hash = {
            let mut hasher = SourceHasher::new();
            hasher.update(ast.node_source(sig.node).as_bytes());
            hasher.update_u32(flags.bits());
            hasher.finish()
        };
        let (ret_ty, ret_body) = match ret {
            MemberBody::Direct(ty) => (ty, Vec::new()),
            MemberBody::Body(words) => (Ref::NONE, words),
        };
        let payload_index = self.store.add_extra(&Func {
            param_block,
            flags,
            ret_ty,
            ret_body_len: to_u32(ret_body.len())?,
            align_body_len: to_u32(align.len())?,
            cc_body_len: to_u32(cc.len())?,
            body_len: to_u32(body_words.len())?,
            lbrace_line: lbrace.0,
            rbrace_line: rbrace.0,
            lbrace_column: lbrace.1,
            rbrace_column: rbrace.1,
            proto_hash_0: proto_hash[0],
            proto_hash_1: proto_hash[1],
            proto_hash_2: proto_hash[2],
            proto_hash_3: proto_hash[3],
        })?;
        self.store.extend_extra(&ret_body)?;
        self.store.extend_extra(&align)?;
        self.store.extend_extra(&cc)?;
        self.store.extend_extra(&body_words)?;

        let src_node = self.rel_node(decl_gz, sig.node);
        self.store.set(
            func_inst,
            InstTag::Func,
            InstData::PlNode {
                src_node,
                payload_index,
            },
        );
        self.instructions.push(func_inst);
        Ok(func_inst)
    }

    /// Emit one parameter into `decl_gz` and bind its name on top of
    /// `scope`.
    fn fn_param(
        &mut self,
        decl_gz: BlockId,
        scope: ScopeId,
        param: FnParam,
        any_generic: &mut bool,
    ) -> LowerResult<ScopeId> {
        let ast = self.ast;
        let binding = param.name.filter(|&tok| !self.is_discard(tok));
        let name = match binding {
            Some(tok) => self.ident_name(tok)?,
            None => NullTerminatedString::EMPTY,
        };

        let inst = match param.ty {
            ParamType::AnyType(tok) => {
                let tag = if param.is_comptime {
                    InstTag::ParamAnytypeComptime
                } else {
                    InstTag::ParamAnytype
                };
                self.add_str_tok(decl_gz, tag, name, param.name.unwrap_or(tok))?
            }
            ParamType::Expr(ty) => {
                let param_inst = self.store.reserve()?;
                let type_gz = self.make_comptime_sub_block(decl_gz, scope)?;
                let body = self
                    .finish_member_body(type_gz, param_inst, ResultInfo::TYPE, ty, false)?
                    .into_words();
                let mut flags = ParamFlags::empty();
                flags.set(ParamFlags::IS_NOALIAS, param.is_noalias);
                flags.set(ParamFlags::IS_GENERIC, *any_generic);
                let payload_index = self.store.add_extra(&Param {
                    name,
                    flags,
                    type_body_len: to_u32(body.len())?,
                })?;
                self.store.extend_extra(&body)?;
                let tag = if param.is_comptime {
                    InstTag::ParamComptime
                } else {
                    InstTag::Param
                };
                let src_tok = self.rel_tok(decl_gz, param.name.unwrap_or_else(|| ast.first_token(ty)));
                self.store.set(
                    param_inst,
                    tag,
                    InstData::PlTok {
                        src_tok,
                        payload_index,
                    },
                );
                self.instructions.push(param_inst);
                param_inst.to_ref()
            }
        };
        if param.is_comptime || matches!(param.ty, ParamType::AnyType(_)) {
            *any_generic = true;
        }

        match binding {
            Some(tok) => Ok(self.bind_local_val(scope, tok, inst, IdCat::FnParam)?.0),
            None => Ok(scope),
        }
    }

    /// Lower a function body. Returns the body and the relative positions
    /// of its braces.
    fn func_body(
        &mut self,
        decl_gz: BlockId,
        params_base: ScopeId,
        params_scope: ScopeId,
        proto_node: NodeId,
        body: NodeId,
        direct_ret: Option<Ref>,
    ) -> LowerResult<(Vec<u32>, (u32, u32), (u32, u32))> {
        let ast = self.ast;
        let decl_line = self.blocks[decl_gz.index()].decl_line;
        self.cursor.advance_to(ast.token_start(ast.first_token(body)));
        let lbrace = self.cursor.relative(decl_line);

        let fn_gz = self.make_sub_block(decl_gz, params_scope)?;
        self.blocks[fn_gz.index()].is_comptime = false;
        let ret_ty = match direct_ret {
            Some(ty) => ty,
            None => self.add_node(fn_gz, InstTag::RetType, proto_node)?,
        };
        let fn_scope = self.block_scope(fn_gz);
        let saved = self.fn_ctx.replace(FnContext {
            scope: fn_scope,
            ret_ty,
        });
        let result = self.fn_body(fn_gz, body, ret_ty);
        self.fn_ctx = saved;
        result?;
        self.check_used(params_base, params_scope)?;

        self.cursor.advance_to(ast.token_start(ast.last_token(body)));
        let rbrace = self.cursor.relative(decl_line);
        let words = self.take_body(fn_gz)?;
        Ok((words, lbrace, rbrace))
    }

    fn fn_body(&mut self, fn_gz: BlockId, body: NodeId, ret_ty: Ref) -> LowerResult<()> {
        let ast = self.ast;
        let base = self.block_scope(fn_gz);
        let ri = ResultInfo::ty(ret_ty).with_ctx(ResultCtx::Return);

        let (inner, tail, value) = match ast.kind(body) {
            NodeKind::Block {
                label: None,
                stmts,
                tail,
            } => {
                let stmts: SmallVec<[NodeId; 8]> = ast.node_list(stmts).iter().copied().collect();
                let (inner, diverted) = self.block_stmts(fn_gz, base, &stmts)?;
                let mut value = Ref::VOID_VALUE;
                if let Some(tail) = tail {
                    if let Some(diverted) = diverted {
                        let note = self.note_node(diverted, "control flow is diverted here");
                        self.append_error_node(tail, ErrorCode::E2004, "unreachable code", vec![note]);
                    }
                    self.emit_dbg_node(fn_gz, tail)?;
                    value = self.expr(fn_gz, inner, ri, tail)?;
                }
                (inner, tail, value)
            }
            _ => {
                let value = self.expr(fn_gz, base, ri, body)?;
                (base, Some(body), value)
            }
        };

        if !self.ends_with_noreturn(fn_gz) && !self.ref_is_noreturn(value) {
            self.gen_defers(fn_gz, base, inner, DefersToEmit::NormalOnly)?;
            match tail.map(|tail| self.node_may_eval_to_error(tail)) {
                Some(EvalToError::Maybe) => {
                    self.add_restore_err_ret_index(fn_gz, RestoreTarget::Ret, RestoreCond::IfNonError(value), body)?;
                }
                Some(EvalToError::Never | EvalToError::Always) => {}
                None => {
                    self.add_restore_err_ret_index(fn_gz, RestoreTarget::Ret, RestoreCond::Always, body)?;
                }
            }
            self.add_un_tok(fn_gz, InstTag::RetImplicit, value, ast.last_token(body))?;
        }
        self.check_used(base, inner)
    }
}

#[cfg(test)]
mod tests;
